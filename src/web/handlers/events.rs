use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use chrono::Datelike;
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{day_href, month_href};
use crate::components::events::{EventDraft, TodoDraft, AVAILABLE_ICONS, DEFAULT_ICON};
use crate::components::session::SessionUser;
use crate::error::AppResult;
use crate::utils::grid::parse_date_string;
use crate::utils::time::{long_date, today_in};
use crate::web::templates::{
    render, AddEventTemplate, DayTemplate, EventView, IconOption, PageError, TodoRowView,
};
use crate::web::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AddEventQuery {
    pub date: Option<String>,
}

/// The add-event form as submitted. Rows arrive as repeated `todo_text` fields; the
/// checked ones list their index in `todo_done`.
#[derive(Debug, Default, Deserialize)]
pub struct AddEventForm {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub todo_text: Vec<String>,
    #[serde(default)]
    pub todo_done: Vec<usize>,
    #[serde(default)]
    pub action: String,
}

impl AddEventForm {
    pub fn into_draft(self) -> EventDraft {
        let mut todos: Vec<TodoDraft> = self
            .todo_text
            .into_iter()
            .enumerate()
            .map(|(index, text)| TodoDraft {
                text,
                completed: self.todo_done.contains(&index),
            })
            .collect();
        if todos.is_empty() {
            todos.push(TodoDraft::default());
        }

        EventDraft {
            date: self.date,
            name: self.name,
            icon: if self.icon.trim().is_empty() {
                DEFAULT_ICON.to_string()
            } else {
                self.icon
            },
            todos,
        }
    }
}

/// Which button submitted the form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    Save,
    AddAfter(usize),
    Remove(usize),
    Toggle(usize),
}

impl FormAction {
    pub fn parse(action: &str) -> Option<Self> {
        let index = |prefix: &str| action.strip_prefix(prefix)?.parse::<usize>().ok();
        if action == "save" {
            Some(FormAction::Save)
        } else if let Some(i) = index("add:") {
            Some(FormAction::AddAfter(i))
        } else if let Some(i) = index("remove:") {
            Some(FormAction::Remove(i))
        } else {
            index("toggle:").map(FormAction::Toggle)
        }
    }
}

fn add_event_page(user: &SessionUser, draft: &EventDraft, error: Option<String>) -> Response {
    let icons = AVAILABLE_ICONS
        .iter()
        .map(|&icon| IconOption {
            icon,
            selected: icon == draft.icon,
        })
        .collect();
    let todos = draft
        .todos
        .iter()
        .enumerate()
        .map(|(index, todo)| TodoRowView {
            index,
            text: todo.text.clone(),
            completed: todo.completed,
        })
        .collect();

    render(&AddEventTemplate {
        title: t!("add_event_title").to_string(),
        user_email: user.email.clone(),
        date: draft.date.clone(),
        name: draft.name.clone(),
        icons,
        todos,
        can_remove: draft.todos.len() > 1,
        can_save: draft.can_save(),
        error,
    })
}

/// Handler for the empty add-event form; `?date=` preselects a day
pub async fn add_event_form(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Query(query): Query<AddEventQuery>,
) -> Response {
    let date = query
        .date
        .as_deref()
        .and_then(parse_date_string)
        .unwrap_or_else(|| today_in(state.settings.tz));
    add_event_page(&user, &EventDraft::new(date.to_string()), None)
}

/// Store the draft: the event first, then its todos
async fn save_draft(state: &AppState, user: &SessionUser, draft: &EventDraft) -> AppResult<String> {
    let new_event = draft.to_new_event()?;
    let event = state.events.create_event(&new_event, user.id).await?;
    info!("Saved event {} on {}", event.id, event.date);

    let todos = draft.valid_todos();
    if !todos.is_empty() {
        if let Err(e) = state.events.create_todos(&todos, event.id).await {
            // Drop the half-saved event so a resubmit does not duplicate it
            warn!("Saving todos failed, removing event {}", event.id);
            if let Err(cleanup) = state.events.delete_event(event.id).await {
                error!("Could not remove event {}: {}", event.id, cleanup);
            }
            return Err(e);
        }
    }
    Ok(event.date.to_string())
}

/// Handler for every button of the add-event form
pub async fn add_event(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    axum_extra::extract::Form(form): axum_extra::extract::Form<AddEventForm>,
) -> Response {
    let action = FormAction::parse(&form.action);
    let mut draft = form.into_draft();

    match action {
        Some(FormAction::Save) => match save_draft(&state, &user, &draft).await {
            Ok(date) => Redirect::to(&day_href(&date)).into_response(),
            Err(e) => {
                warn!("Could not save event: {}", e);
                add_event_page(&user, &draft, Some(e.user_message()))
            }
        },
        Some(FormAction::AddAfter(index)) => {
            draft.add_todo_after(index);
            add_event_page(&user, &draft, None)
        }
        Some(FormAction::Remove(index)) => {
            draft.remove_todo(index);
            add_event_page(&user, &draft, None)
        }
        Some(FormAction::Toggle(index)) => {
            draft.toggle_todo(index);
            add_event_page(&user, &draft, None)
        }
        None => add_event_page(&user, &draft, None),
    }
}

/// Handler for the day view
pub async fn day(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(date): Path<String>,
) -> Result<Response, PageError> {
    let date = parse_date_string(&date)
        .ok_or_else(|| PageError::new(StatusCode::BAD_REQUEST, t!("error_invalid_date")))?;

    let events = state
        .events
        .events_for_date(date, user.id)
        .await
        .map_err(|e| {
            error!("Failed to load events for {}: {}", date, e);
            PageError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                t!("day_load_failed", message = e.user_message()),
            )
            .with_retry(day_href(&date.to_string()))
        })?;

    Ok(render(&DayTemplate {
        title: long_date(date),
        user_email: user.email.clone(),
        heading: long_date(date),
        date: date.to_string(),
        back_href: month_href(date.year(), date.month()),
        events: events.iter().map(EventView::from).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ToggleForm {
    /// New completion state
    pub completed: bool,
}

/// Where to go after a change on a day page
fn back_to_day(date: &str) -> Redirect {
    match parse_date_string(date) {
        Some(date) => Redirect::to(&day_href(&date.to_string())),
        None => Redirect::to("/"),
    }
}

/// Handler for checking or unchecking a todo
pub async fn toggle_todo(
    State(state): State<AppState>,
    Path((date, todo_id)): Path<(String, Uuid)>,
    Form(form): Form<ToggleForm>,
) -> Redirect {
    if let Err(e) = state
        .events
        .update_todo_status(todo_id, form.completed)
        .await
    {
        error!("Failed to update todo {}: {}", todo_id, e);
    }
    back_to_day(&date)
}

/// Handler for deleting an event with its todos
pub async fn delete_event(
    State(state): State<AppState>,
    Path((date, event_id)): Path<(String, Uuid)>,
) -> Redirect {
    match state.events.delete_event(event_id).await {
        Ok(()) => info!("Deleted event {}", event_id),
        Err(e) => error!("Failed to delete event {}: {}", event_id, e),
    }
    back_to_day(&date)
}
