//! Page templates and the view models they render.
//!
//! Templates stay free of logic: every value they show is prepared by a handler.

use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use tracing::{error, warn};

use crate::components::events::Event;
use crate::error::Error;

/// Render `template`, or a bare 500 when rendering fails
pub fn render<T: Template>(template: &T) -> Response {
    render_with_status(StatusCode::OK, template)
}

pub fn render_with_status<T: Template>(status: StatusCode, template: &T) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!("Template error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub title: String,
    pub user_email: String,
    pub email: String,
    pub next: String,
    pub error: Option<String>,
    pub notice: Option<String>,
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    pub title: String,
    pub user_email: String,
    pub email: String,
    pub error: Option<String>,
}

/// One day slot of the calendar page
#[derive(Debug, Clone)]
pub struct CellView {
    pub day: u32,
    pub href: String,
    /// CSS classes: `cell`, plus `other-month` and/or `today`
    pub classes: String,
    /// At most three icons
    pub icons: Vec<String>,
    /// Events beyond the shown icons
    pub overflow: usize,
}

/// Entry of the month dropdown
#[derive(Debug, Clone)]
pub struct MonthOption {
    /// One-based
    pub value: u32,
    pub name: &'static str,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "calendar.html")]
pub struct CalendarTemplate {
    pub title: String,
    pub user_email: String,
    pub month_label: String,
    pub year: i32,
    pub weeks: Vec<Vec<CellView>>,
    pub months: Vec<MonthOption>,
    pub today_href: String,
    pub prev_month_href: Option<String>,
    pub next_month_href: Option<String>,
    pub prev_year_href: Option<String>,
    pub next_year_href: Option<String>,
    /// Shown above the grid when events could not be loaded
    pub notice: Option<String>,
}

/// Icon choice of the add-event form
#[derive(Debug, Clone)]
pub struct IconOption {
    pub icon: &'static str,
    pub selected: bool,
}

/// Checklist row of the add-event form
#[derive(Debug, Clone)]
pub struct TodoRowView {
    pub index: usize,
    pub text: String,
    pub completed: bool,
}

#[derive(Template)]
#[template(path = "add_event.html")]
pub struct AddEventTemplate {
    pub title: String,
    pub user_email: String,
    pub date: String,
    pub name: String,
    pub icons: Vec<IconOption>,
    pub todos: Vec<TodoRowView>,
    pub can_remove: bool,
    pub can_save: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TodoView {
    pub id: String,
    pub text: String,
    pub completed: bool,
    /// Value the toggle form submits
    pub toggle_to: bool,
}

#[derive(Debug, Clone)]
pub struct EventView {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub completed: usize,
    pub total: usize,
    pub percent: u32,
    pub todos: Vec<TodoView>,
}

impl From<&Event> for EventView {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id.to_string(),
            name: event.name.clone(),
            icon: event.icon.clone(),
            completed: event.completed_count(),
            total: event.total_count(),
            percent: event.completion_percent(),
            todos: event
                .todos
                .iter()
                .map(|todo| TodoView {
                    id: todo.id.to_string(),
                    text: todo.text.clone(),
                    completed: todo.completed,
                    toggle_to: !todo.completed,
                })
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "day.html")]
pub struct DayTemplate {
    pub title: String,
    pub user_email: String,
    pub heading: String,
    pub date: String,
    pub back_href: String,
    pub events: Vec<EventView>,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub title: String,
    pub user_email: String,
    pub status: u16,
    pub message: String,
    pub retry_href: Option<String>,
}

/// A failed page, rendered as the error template
#[derive(Debug)]
pub struct PageError {
    pub status: StatusCode,
    pub message: String,
    pub retry_href: Option<String>,
}

impl PageError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_href: None,
        }
    }

    pub fn with_retry(mut self, href: impl Into<String>) -> Self {
        self.retry_href = Some(href.into());
        self
    }
}

impl From<Error> for PageError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Auth(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!("Page failed: {}", err);
        Self::new(status, err.user_message())
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let template = ErrorTemplate {
            title: t!("error_title").to_string(),
            user_email: String::new(),
            status: self.status.as_u16(),
            message: self.message,
            retry_href: self.retry_href,
        };
        render_with_status(self.status, &template)
    }
}
