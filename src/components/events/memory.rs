use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{Event, EventUpdate, NewEvent, NewTodo, Todo};
use super::remote::check_new_event;
use super::EventStore;
use crate::error::{validation_error, AppResult, Error};

#[derive(Debug, Default)]
struct Tables {
    /// Insertion order; a stable sort on `created_at` keeps it for ties
    events: Vec<Event>,
    todos: Vec<Todo>,
}

impl Tables {
    fn with_todos(&self, event: &Event) -> Event {
        let mut event = event.clone();
        event.todos = self
            .todos
            .iter()
            .filter(|t| t.event_id == event.id)
            .cloned()
            .collect();
        event
    }

    fn select(&self, keep: impl Fn(&Event) -> bool) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .events
            .iter()
            .filter(|e| keep(e))
            .map(|e| self.with_todos(e))
            .collect();
        events.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));
        events
    }
}

/// In-memory event store (for testing and offline use)
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
    reject_todos: AtomicBool,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail as if the backend were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Refuse todo inserts the way a row-level security policy would
    pub fn set_reject_todos(&self, reject: bool) {
        self.reject_todos.store(reject, Ordering::SeqCst);
    }

    pub async fn event_count(&self) -> usize {
        self.tables.read().await.events.len()
    }

    pub async fn todo_count(&self) -> usize {
        self.tables.read().await.todos.len()
    }

    fn check_available(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Backend {
                status: 503,
                message: "Service unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn events_for_date(&self, date: NaiveDate, user_id: Uuid) -> AppResult<Vec<Event>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.select(|e| e.date == date && e.user_id == user_id))
    }

    async fn events_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        user_id: Uuid,
    ) -> AppResult<Vec<Event>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.select(|e| e.date >= from && e.date <= to && e.user_id == user_id))
    }

    async fn create_event(&self, event: &NewEvent, user_id: Uuid) -> AppResult<Event> {
        self.check_available()?;
        check_new_event(event)?;
        let created = Event {
            id: Uuid::new_v4(),
            user_id,
            name: event.name.clone(),
            icon: event.icon.clone(),
            date: event.date,
            created_at: Utc::now(),
            todos: Vec::new(),
        };
        self.tables.write().await.events.push(created.clone());
        Ok(created)
    }

    async fn update_event(&self, event_id: Uuid, update: &EventUpdate) -> AppResult<Event> {
        self.check_available()?;
        if update.is_empty() {
            return Err(validation_error(&t!("validation_nothing_to_update")));
        }
        let mut tables = self.tables.write().await;
        let event = tables
            .events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| Error::NotFound("Event not found".to_string()))?;
        if let Some(name) = &update.name {
            event.name = name.clone();
        }
        if let Some(icon) = &update.icon {
            event.icon = icon.clone();
        }
        if let Some(date) = update.date {
            event.date = date;
        }
        Ok(event.clone())
    }

    async fn delete_event(&self, event_id: Uuid) -> AppResult<()> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        tables.events.retain(|e| e.id != event_id);
        tables.todos.retain(|t| t.event_id != event_id);
        Ok(())
    }

    async fn create_todos(&self, todos: &[NewTodo], event_id: Uuid) -> AppResult<Vec<Todo>> {
        if todos.is_empty() {
            return Ok(Vec::new());
        }
        self.check_available()?;
        if self.reject_todos.load(Ordering::SeqCst) {
            return Err(Error::Backend {
                status: 403,
                message: "new row violates row-level security policy".to_string(),
            });
        }
        let mut tables = self.tables.write().await;
        if !tables.events.iter().any(|e| e.id == event_id) {
            return Err(Error::Backend {
                status: 409,
                message: format!("Event {} does not exist", event_id),
            });
        }
        let created: Vec<Todo> = todos
            .iter()
            .map(|todo| Todo {
                id: Uuid::new_v4(),
                event_id,
                text: todo.text.clone(),
                completed: todo.completed,
            })
            .collect();
        tables.todos.extend(created.iter().cloned());
        Ok(created)
    }

    async fn update_todo_status(&self, todo_id: Uuid, completed: bool) -> AppResult<Todo> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let todo = tables
            .todos
            .iter_mut()
            .find(|t| t.id == todo_id)
            .ok_or_else(|| Error::NotFound("Todo not found".to_string()))?;
        todo.completed = completed;
        Ok(todo.clone())
    }

    async fn delete_todo(&self, todo_id: Uuid) -> AppResult<()> {
        self.check_available()?;
        self.tables.write().await.todos.retain(|t| t.id != todo_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn new_event(name: &str, day: u32) -> NewEvent {
        NewEvent {
            name: name.into(),
            icon: "📅".into(),
            date: date(day),
        }
    }

    #[tokio::test]
    async fn test_events_for_date_in_creation_order() {
        let store = InMemoryEventStore::new();
        let user = Uuid::new_v4();
        let first = store.create_event(&new_event("First", 10), user).await.unwrap();
        let second = store.create_event(&new_event("Second", 10), user).await.unwrap();
        store.create_event(&new_event("Other day", 11), user).await.unwrap();
        store.create_event(&new_event("Other user", 10), Uuid::new_v4()).await.unwrap();

        let events = store.events_for_date(date(10), user).await.unwrap();
        let ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_empty_date_is_empty_list() {
        let store = InMemoryEventStore::new();
        let events = store.events_for_date(date(1), Uuid::new_v4()).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_todos_nest_under_their_event() {
        let store = InMemoryEventStore::new();
        let user = Uuid::new_v4();
        let event = store.create_event(&new_event("Trip", 10), user).await.unwrap();
        let todos = store
            .create_todos(&[NewTodo::new("Pack bags"), NewTodo::new("Book hotel")], event.id)
            .await
            .unwrap();
        assert_eq!(todos.len(), 2);
        assert!(todos.iter().all(|t| t.event_id == event.id && !t.completed));

        store.update_todo_status(todos[0].id, true).await.unwrap();
        let events = store.events_for_date(date(10), user).await.unwrap();
        assert_eq!(events[0].completed_count(), 1);
        assert_eq!(events[0].completion_percent(), 50);
    }

    #[tokio::test]
    async fn test_create_todos_for_missing_event_fails() {
        let store = InMemoryEventStore::new();
        let result = store.create_todos(&[NewTodo::new("x")], Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::Backend { status: 409, .. })));
        assert!(store
            .create_todos(&[], Uuid::new_v4())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_delete_event_cascades() {
        let store = InMemoryEventStore::new();
        let user = Uuid::new_v4();
        let event = store.create_event(&new_event("Trip", 10), user).await.unwrap();
        store.create_todos(&[NewTodo::new("Pack bags")], event.id).await.unwrap();

        store.delete_event(event.id).await.unwrap();
        assert_eq!(store.event_count().await, 0);
        assert_eq!(store.todo_count().await, 0);
    }

    #[tokio::test]
    async fn test_delete_todo_leaves_siblings() {
        let store = InMemoryEventStore::new();
        let user = Uuid::new_v4();
        let event = store.create_event(&new_event("Trip", 10), user).await.unwrap();
        let todos = store
            .create_todos(&[NewTodo::new("Pack bags"), NewTodo::new("Book hotel")], event.id)
            .await
            .unwrap();

        store.delete_todo(todos[0].id).await.unwrap();
        let events = store.events_for_date(date(10), user).await.unwrap();
        assert_eq!(events[0].todos.len(), 1);
        assert_eq!(events[0].todos[0].text, "Book hotel");
    }

    #[tokio::test]
    async fn test_update_missing_todo_is_not_found() {
        let store = InMemoryEventStore::new();
        let result = store.update_todo_status(Uuid::new_v4(), true).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_event_fields() {
        let store = InMemoryEventStore::new();
        let user = Uuid::new_v4();
        let event = store.create_event(&new_event("Trip", 10), user).await.unwrap();
        let update = EventUpdate {
            date: Some(date(12)),
            ..EventUpdate::default()
        };
        let moved = store.update_event(event.id, &update).await.unwrap();
        assert_eq!(moved.date, date(12));
        assert_eq!(moved.name, "Trip");
        assert!(store.events_for_date(date(10), user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = InMemoryEventStore::new();
        store.set_unavailable(true);
        let result = store.events_for_date(date(10), Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::Backend { status: 503, .. })));

        store.set_unavailable(false);
        assert!(store.events_for_date(date(10), Uuid::new_v4()).await.is_ok());
    }
}
