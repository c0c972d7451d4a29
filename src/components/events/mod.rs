//! Event and todo access layer.
//!
//! Every operation is a single request against the store and reports failure through
//! `AppResult`; nothing is cached between calls.

pub mod draft;
mod memory;
pub mod models;
pub mod month;
mod remote;

pub use draft::{EventDraft, TodoDraft, AVAILABLE_ICONS, DEFAULT_ICON};
pub use memory::InMemoryEventStore;
pub use models::{Event, EventUpdate, NewEvent, NewTodo, Todo};
pub use month::{group_by_date, load_month_events};
pub use remote::RemoteEventStore;

use crate::error::AppResult;
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

/// Storage for events and their todos
#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Events of `user_id` on `date` with their todos, oldest first
    async fn events_for_date(&self, date: NaiveDate, user_id: Uuid) -> AppResult<Vec<Event>>;

    /// Events of `user_id` between `from` and `to` inclusive, ordered by date then creation
    async fn events_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        user_id: Uuid,
    ) -> AppResult<Vec<Event>>;

    /// Store a new event owned by `user_id`
    async fn create_event(&self, event: &NewEvent, user_id: Uuid) -> AppResult<Event>;

    /// Change name, icon or date of an event
    async fn update_event(&self, event_id: Uuid, update: &EventUpdate) -> AppResult<Event>;

    /// Delete an event together with its todos
    async fn delete_event(&self, event_id: Uuid) -> AppResult<()>;

    /// Store todos under `event_id`. An empty list is a no-op.
    async fn create_todos(&self, todos: &[NewTodo], event_id: Uuid) -> AppResult<Vec<Todo>>;

    /// Set the completion flag of one todo
    async fn update_todo_status(&self, todo_id: Uuid, completed: bool) -> AppResult<Todo>;

    /// Delete one todo
    async fn delete_todo(&self, todo_id: Uuid) -> AppResult<()>;
}
