use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::time::unix_now;

/// A user as returned by the auth endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// An authenticated session issued by the auth endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    /// Absolute expiry as a unix timestamp; derived from `expires_in` when the
    /// backend leaves it out
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub refresh_token: String,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl AuthSession {
    /// Fill in `expires_at` relative to now if the response did not carry it
    pub fn normalized(mut self) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = Some(unix_now() + self.expires_in.max(0));
        }
        self
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at.unwrap_or(0)
    }

    /// True when the token expires within `margin_secs`
    pub fn expires_within(&self, margin_secs: i64) -> bool {
        self.expires_at() - margin_secs <= unix_now()
    }
}

/// Sign-up either returns a session straight away or, when the project requires email
/// confirmation, only the new user
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SignUpResponse {
    Session(AuthSession),
    User(User),
}

/// Notifications pushed by the auth client when the session changes underneath its users
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChange {
    SignedIn(User),
    TokenRefreshed(User),
    SignedOut,
}

/// Error body shapes of both the REST and the auth endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl BackendErrorBody {
    /// Pick the most specific message the backend provided
    pub fn into_message(self) -> Option<String> {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
            .or(self.details)
            .or(self.hint)
    }
}
