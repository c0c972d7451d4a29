use miette::Diagnostic;
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Validation error: {0}")]
    #[diagnostic(code(daybook::validation))]
    Validation(String),

    #[error("Backend error ({status}): {message}")]
    #[diagnostic(code(daybook::backend))]
    Backend { status: u16, message: String },

    #[error("Request error: {0}")]
    #[diagnostic(code(daybook::request))]
    Request(#[from] reqwest::Error),

    #[error("Authentication error: {0}")]
    #[diagnostic(code(daybook::auth))]
    Auth(String),

    #[error("Not found: {0}")]
    #[diagnostic(code(daybook::not_found))]
    NotFound(String),

    #[error("Environment error: {0}")]
    #[diagnostic(code(daybook::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(daybook::config))]
    Config(String),

    #[error("Component error: {0}")]
    #[diagnostic(code(daybook::component))]
    Component(String),

    #[error(transparent)]
    #[diagnostic(code(daybook::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(daybook::serialization))]
    Serialization(String),

    #[error("Template error: {0}")]
    #[diagnostic(code(daybook::template))]
    Template(#[from] askama::Error),

    #[error("Other error: {0}")]
    #[diagnostic(code(daybook::other))]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Config(format!("Invalid URL: {}", err))
    }
}

impl Error {
    /// Message that is safe to show in a view.
    ///
    /// Validation, auth and backend messages are shown as-is; anything unexpected
    /// collapses to a generic failure message.
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation(message) | Error::Auth(message) | Error::NotFound(message) => {
                message.clone()
            }
            Error::Backend { message, .. } => message.clone(),
            Error::Request(_) => t!("error_network").to_string(),
            _ => t!("error_generic").to_string(),
        }
    }

    /// True for a backend response carrying the given HTTP status
    pub fn is_status(&self, code: u16) -> bool {
        matches!(self, Error::Backend { status, .. } if *status == code)
    }
}

/// Type alias for Result with our Error type
pub type AppResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create component errors
pub fn component_error(message: &str) -> Error {
    Error::Component(message.to_string())
}

/// Helper to create validation errors
pub fn validation_error(message: &str) -> Error {
    Error::Validation(message.to_string())
}

/// Helper to create auth errors
pub fn auth_error(message: &str) -> Error {
    Error::Auth(message.to_string())
}

/// Helper to create other errors
pub fn other_error(message: &str) -> Error {
    Error::Other(message.to_string())
}
