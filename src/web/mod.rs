//! Server-rendered web interface.

pub mod auth;
pub mod handlers;
pub mod templates;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use chrono_tz::Tz;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::components::{EventStore, SessionHandle};
use crate::config::{Config, MonthFetch};
use auth::{route_guard, AuthService};
use handlers::{
    add_event, add_event_form, calendar, day, delete_event, fallback, health, login, login_form,
    logout, signup, signup_form, toggle_todo,
};

/// Directory served under `/assets`
pub const ASSETS_DIR: &str = "assets";

/// View settings taken from the config
#[derive(Debug, Clone, Copy)]
pub struct WebSettings {
    /// Zone that decides what "today" is
    pub tz: Tz,
    pub month_fetch: MonthFetch,
}

impl WebSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tz: config.tz(),
            month_fetch: config.month_fetch,
        }
    }
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            tz: chrono_tz::UTC,
            month_fetch: MonthFetch::default(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
    pub events: Arc<dyn EventStore>,
    /// Auth service for JWT operations
    pub auth_service: Arc<AuthService>,
    pub settings: WebSettings,
}

/// All routes behind the route guard, plus static assets
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(calendar))
        .route("/login", get(login_form).post(login))
        .route("/signup", get(signup_form).post(signup))
        .route("/logout", post(logout))
        .route("/add-event", get(add_event_form).post(add_event))
        .route("/day/{date}", get(day))
        .route("/day/{date}/todos/{todo_id}/toggle", post(toggle_todo))
        .route("/day/{date}/events/{event_id}/delete", post(delete_event))
        .route("/health", get(health))
        .fallback(fallback)
        .layer(from_fn_with_state(state.clone(), route_guard))
        .nest_service("/assets", ServeDir::new(ASSETS_DIR))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
