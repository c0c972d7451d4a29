use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{Event, EventRow, EventUpdate, NewEvent, NewTodo, Todo, TodoRow};
use super::EventStore;
use crate::components::backend::BackendClient;
use crate::error::{validation_error, AppResult, Error};

/// Table names on the backend
mod tables {
    pub const EVENTS: &str = "events";
    pub const TODOS: &str = "todos";
    /// Events with their todos nested
    pub const EVENTS_WITH_TODOS: &str = "*,todos(*)";
}

/// Event store backed by the hosted REST endpoint; row-level security on the backend
/// decides what the signed-in user may see and change
#[derive(Clone)]
pub struct RemoteEventStore {
    backend: BackendClient,
}

impl RemoteEventStore {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    async fn bearer(&self) -> AppResult<String> {
        self.backend.auth.bearer_token().await
    }
}

/// Take the single row a write returned
fn single<T>(mut rows: Vec<T>, what: &str) -> AppResult<T> {
    if rows.is_empty() {
        return Err(Error::NotFound(format!("{} not found", what)));
    }
    Ok(rows.swap_remove(0))
}

/// Reject events the form should never have let through
pub(crate) fn check_new_event(event: &NewEvent) -> AppResult<()> {
    if event.name.trim().is_empty() {
        return Err(validation_error(&t!("validation_name_required")));
    }
    if event.icon.trim().is_empty() {
        return Err(validation_error(&t!("validation_icon_required")));
    }
    Ok(())
}

#[async_trait]
impl EventStore for RemoteEventStore {
    async fn events_for_date(&self, date: NaiveDate, user_id: Uuid) -> AppResult<Vec<Event>> {
        let bearer = self.bearer().await?;
        let events: Vec<Event> = self
            .backend
            .rest
            .from(tables::EVENTS)
            .select(tables::EVENTS_WITH_TODOS)
            .eq("date", date)
            .eq("user_id", user_id)
            .order("created_at", true)
            .fetch(&bearer)
            .await?;
        debug!("Fetched {} events for {}", events.len(), date);
        Ok(events)
    }

    async fn events_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        user_id: Uuid,
    ) -> AppResult<Vec<Event>> {
        let bearer = self.bearer().await?;
        let events: Vec<Event> = self
            .backend
            .rest
            .from(tables::EVENTS)
            .select(tables::EVENTS_WITH_TODOS)
            .gte("date", from)
            .lte("date", to)
            .eq("user_id", user_id)
            .order("date", true)
            .order("created_at", true)
            .fetch(&bearer)
            .await?;
        debug!("Fetched {} events for {}..={}", events.len(), from, to);
        Ok(events)
    }

    async fn create_event(&self, event: &NewEvent, user_id: Uuid) -> AppResult<Event> {
        check_new_event(event)?;
        let bearer = self.bearer().await?;
        let row = EventRow {
            name: &event.name,
            icon: &event.icon,
            date: event.date,
            user_id,
        };
        let rows: Vec<Event> = self
            .backend
            .rest
            .from(tables::EVENTS)
            .insert(&[row], &bearer)
            .await?;
        let created = single(rows, "Created event")?;
        info!("Created event {} on {}", created.id, created.date);
        Ok(created)
    }

    async fn update_event(&self, event_id: Uuid, update: &EventUpdate) -> AppResult<Event> {
        if update.is_empty() {
            return Err(validation_error(&t!("validation_nothing_to_update")));
        }
        let bearer = self.bearer().await?;
        let rows: Vec<Event> = self
            .backend
            .rest
            .from(tables::EVENTS)
            .eq("id", event_id)
            .update(update, &bearer)
            .await?;
        single(rows, "Event")
    }

    async fn delete_event(&self, event_id: Uuid) -> AppResult<()> {
        let bearer = self.bearer().await?;
        self.backend
            .rest
            .from(tables::EVENTS)
            .eq("id", event_id)
            .delete(&bearer)
            .await?;
        info!("Deleted event {}", event_id);
        Ok(())
    }

    async fn create_todos(&self, todos: &[NewTodo], event_id: Uuid) -> AppResult<Vec<Todo>> {
        if todos.is_empty() {
            return Ok(Vec::new());
        }
        let bearer = self.bearer().await?;
        let rows: Vec<TodoRow<'_>> = todos
            .iter()
            .map(|todo| TodoRow {
                text: &todo.text,
                completed: todo.completed,
                event_id,
            })
            .collect();
        let created: Vec<Todo> = self
            .backend
            .rest
            .from(tables::TODOS)
            .insert(&rows, &bearer)
            .await?;
        debug!("Created {} todos for event {}", created.len(), event_id);
        Ok(created)
    }

    async fn update_todo_status(&self, todo_id: Uuid, completed: bool) -> AppResult<Todo> {
        let bearer = self.bearer().await?;
        let rows: Vec<Todo> = self
            .backend
            .rest
            .from(tables::TODOS)
            .eq("id", todo_id)
            .update(&serde_json::json!({ "completed": completed }), &bearer)
            .await?;
        single(rows, "Todo")
    }

    async fn delete_todo(&self, todo_id: Uuid) -> AppResult<()> {
        let bearer = self.bearer().await?;
        self.backend
            .rest
            .from(tables::TODOS)
            .eq("id", todo_id)
            .delete(&bearer)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_takes_first_row() {
        assert_eq!(single(vec![1, 2], "x").unwrap(), 1);
        assert!(matches!(single(Vec::<u8>::new(), "Todo"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_check_new_event() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let ok = NewEvent { name: "Trip".into(), icon: "✈️".into(), date };
        assert!(check_new_event(&ok).is_ok());

        let blank_name = NewEvent { name: "  ".into(), ..ok.clone() };
        assert!(matches!(check_new_event(&blank_name), Err(Error::Validation(_))));

        let blank_icon = NewEvent { icon: String::new(), ..ok };
        assert!(matches!(check_new_event(&blank_icon), Err(Error::Validation(_))));
    }
}
