mod calendar;
mod events;
mod session;

pub use calendar::calendar;
pub use events::{add_event, add_event_form, day, delete_event, toggle_todo};
pub use session::{login, login_form, logout, signup, signup_form};

use axum::response::{IntoResponse, Redirect};

/// Handler for health check
pub async fn health() -> impl IntoResponse {
    "OK"
}

/// Unknown paths land on the calendar
pub async fn fallback() -> impl IntoResponse {
    Redirect::to("/")
}

/// Link to the calendar page of a month; `month1` is one-based
pub(crate) fn month_href(year: i32, month1: u32) -> String {
    format!("/?year={}&month={}", year, month1)
}

pub(crate) fn day_href(date: &str) -> String {
    format!("/day/{}", date)
}
