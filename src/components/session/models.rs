use serde::Serialize;
use uuid::Uuid;

use crate::components::backend::User;

/// The signed-in user as views see it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
}

impl From<User> for SessionUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email.unwrap_or_default(),
        }
    }
}

/// Who is signed in, as far as the app knows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// The startup probe has not answered yet
    #[default]
    Unknown,
    Anonymous,
    Authenticated(SessionUser),
}

impl SessionState {
    pub fn user(&self) -> Option<&SessionUser> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, SessionState::Unknown)
    }
}

/// State plus whether a sign-in, sign-up or sign-out is running
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub in_progress: bool,
}

impl SessionSnapshot {
    pub fn user(&self) -> Option<&SessionUser> {
        self.state.user()
    }

    /// The startup probe is still running
    pub fn is_loading(&self) -> bool {
        !self.state.is_known()
    }
}

/// Result of a sign-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub user: SessionUser,
    /// The account exists but stays signed out until the email is confirmed
    pub confirmation_required: bool,
}
