use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::components::backend::auth::check_credentials;
use crate::error::{validation_error, AppResult};
use crate::web::auth::{removal_cookie, safe_next};
use crate::web::templates::{render, LoginTemplate, SignupTemplate};
use crate::web::AppState;

/// Shortest password the sign-up form accepts
pub const MIN_PASSWORD_LEN: usize = 6;

/// Login page query: where to go afterwards, and a notice to show
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
    pub notice: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub next: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

fn login_page(email: &str, next: &str, error: Option<String>, notice: Option<String>) -> Response {
    render(&LoginTemplate {
        title: t!("login_title").to_string(),
        user_email: String::new(),
        email: email.to_string(),
        next: next.to_string(),
        error,
        notice,
    })
}

fn signup_page(email: &str, error: Option<String>) -> Response {
    render(&SignupTemplate {
        title: t!("signup_title").to_string(),
        user_email: String::new(),
        email: email.to_string(),
        error,
    })
}

/// Handler for the login form page
pub async fn login_form(Query(query): Query<LoginQuery>) -> Response {
    let notice = match query.notice.as_deref() {
        Some("confirm") => Some(t!("signup_confirm_notice").to_string()),
        Some("signed_out") => Some(t!("logout_notice").to_string()),
        _ => None,
    };
    let next = safe_next(query.next.as_deref()).to_string();
    login_page("", &next, None, notice)
}

/// Handler for login form submission
pub async fn login(State(state): State<AppState>, jar: CookieJar, Form(form): Form<LoginForm>) -> Response {
    let email = form.email.trim().to_string();
    let result: AppResult<_> = async {
        check_credentials(&email, &form.password)?;
        let user = state.session.sign_in(email.clone(), form.password.clone()).await?;
        state.auth_service.session_cookie(&user)
    }
    .await;

    match result {
        Ok(cookie) => {
            info!("Signed in");
            let target = safe_next(Some(&form.next)).to_string();
            (jar.add(cookie), Redirect::to(&target)).into_response()
        }
        Err(e) => {
            warn!("Sign-in failed: {}", e);
            login_page(&email, &form.next, Some(e.user_message()), None)
        }
    }
}

/// Check the sign-up form before anything is sent
pub fn check_signup(form: &SignupForm) -> AppResult<()> {
    check_credentials(form.email.trim(), &form.password)?;
    if form.password != form.confirm_password {
        return Err(validation_error(&t!("signup_password_mismatch")));
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(validation_error(&t!(
            "signup_password_too_short",
            min = MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Handler for the sign-up form page
pub async fn signup_form() -> Response {
    signup_page("", None)
}

/// Handler for sign-up form submission
pub async fn signup(State(state): State<AppState>, jar: CookieJar, Form(form): Form<SignupForm>) -> Response {
    let email = form.email.trim().to_string();
    if let Err(e) = check_signup(&form) {
        return signup_page(&email, Some(e.user_message()));
    }

    let outcome = match state.session.sign_up(email.clone(), form.password.clone()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Sign-up failed: {}", e);
            return signup_page(&email, Some(e.user_message()));
        }
    };

    if outcome.confirmation_required {
        return Redirect::to("/login?notice=confirm").into_response();
    }

    match state.auth_service.session_cookie(&outcome.user) {
        Ok(cookie) => (jar.add(cookie), Redirect::to("/")).into_response(),
        Err(e) => {
            error!("Could not issue session cookie: {}", e);
            signup_page(&email, Some(e.user_message()))
        }
    }
}

/// Handler for logout; the cookie goes even when the backend call fails
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Err(e) = state.session.sign_out().await {
        error!("Sign-out failed: {}", e);
    }
    (
        jar.remove(removal_cookie()),
        Redirect::to("/login?notice=signed_out"),
    )
        .into_response()
}
