use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A dated event with its checklist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    /// Single glyph shown in the calendar cell
    pub icon: String,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    /// Nested rows; empty when the query did not select them
    #[serde(default)]
    pub todos: Vec<Todo>,
}

impl Event {
    pub fn completed_count(&self) -> usize {
        self.todos.iter().filter(|t| t.completed).count()
    }

    pub fn total_count(&self) -> usize {
        self.todos.len()
    }

    /// Rounded percentage of completed todos; 0 for an event without todos
    pub fn completion_percent(&self) -> u32 {
        let total = self.total_count().max(1) as f64;
        ((self.completed_count() as f64 / total) * 100.0).round() as u32
    }
}

/// A checklist item of one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: Uuid,
    pub event_id: Uuid,
    pub text: String,
    pub completed: bool,
}

/// Fields of an event to be created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub name: String,
    pub icon: String,
    pub date: NaiveDate,
}

/// Fields of a todo to be created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTodo {
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

impl NewTodo {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            completed: false,
        }
    }
}

/// Partial update of an event; `None` fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl EventUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.icon.is_none() && self.date.is_none()
    }
}

/// Row shape sent when inserting an event
#[derive(Debug, Serialize)]
pub(crate) struct EventRow<'a> {
    pub name: &'a str,
    pub icon: &'a str,
    pub date: NaiveDate,
    pub user_id: Uuid,
}

/// Row shape sent when inserting a todo
#[derive(Debug, Serialize)]
pub(crate) struct TodoRow<'a> {
    pub text: &'a str,
    pub completed: bool,
    pub event_id: Uuid,
}
