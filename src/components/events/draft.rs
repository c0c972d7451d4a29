//! State of the add-event form between submits.

use serde::{Deserialize, Serialize};

use super::models::{NewEvent, NewTodo};
use crate::error::{validation_error, AppResult};
use crate::utils::grid::parse_date_string;

pub const DEFAULT_ICON: &str = "📅";

/// Icons offered by the picker
pub const AVAILABLE_ICONS: [&str; 32] = [
    "📅", "🎉", "💼", "🏠", "🚗", "✈️", "🏥", "🎓", "💪", "🍽️", "🛍️", "📱", "💻", "📚", "🎵", "🎨",
    "⚽", "🎮", "🎬", "📺", "🌟", "❤️", "🔔", "⏰", "🎯", "💡", "🔧", "🎪", "🎭", "🎸", "📷", "✍️",
];

/// One checklist row of the form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoDraft {
    pub text: String,
    pub completed: bool,
}

impl TodoDraft {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// The add-event form: a date, a name, an icon and at least one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    /// `YYYY-MM-DD`, as the date input submits it
    pub date: String,
    pub name: String,
    pub icon: String,
    pub todos: Vec<TodoDraft>,
}

impl Default for EventDraft {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl EventDraft {
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            name: String::new(),
            icon: DEFAULT_ICON.to_string(),
            todos: vec![TodoDraft::default()],
        }
    }

    /// Insert a blank row after `index`; only a filled-in row gets a successor.
    /// Returns whether a row was added.
    pub fn add_todo_after(&mut self, index: usize) -> bool {
        match self.todos.get(index) {
            Some(todo) if !todo.is_blank() => {
                self.todos.insert(index + 1, TodoDraft::default());
                true
            }
            _ => false,
        }
    }

    /// Remove row `index` unless it is the last one left
    pub fn remove_todo(&mut self, index: usize) -> bool {
        if self.todos.len() <= 1 || index >= self.todos.len() {
            return false;
        }
        self.todos.remove(index);
        true
    }

    pub fn toggle_todo(&mut self, index: usize) {
        if let Some(todo) = self.todos.get_mut(index) {
            todo.completed = !todo.completed;
        }
    }

    /// Rows with text, trimmed
    pub fn valid_todos(&self) -> Vec<NewTodo> {
        self.todos
            .iter()
            .filter(|t| !t.is_blank())
            .map(|t| NewTodo {
                text: t.text.trim().to_string(),
                completed: t.completed,
            })
            .collect()
    }

    pub fn can_save(&self) -> bool {
        !self.date.trim().is_empty()
            && !self.name.trim().is_empty()
            && !self.icon.trim().is_empty()
            && self.todos.iter().any(|t| !t.is_blank())
    }

    /// The insert payload, or the first problem with the form
    pub fn to_new_event(&self) -> AppResult<NewEvent> {
        let date = parse_date_string(self.date.trim())
            .ok_or_else(|| validation_error(&t!("validation_date_required")))?;
        if self.name.trim().is_empty() {
            return Err(validation_error(&t!("validation_name_required")));
        }
        if self.icon.trim().is_empty() {
            return Err(validation_error(&t!("validation_icon_required")));
        }
        if !self.todos.iter().any(|t| !t.is_blank()) {
            return Err(validation_error(&t!("validation_todo_required")));
        }
        Ok(NewEvent {
            name: self.name.trim().to_string(),
            icon: self.icon.clone(),
            date,
        })
    }
}
