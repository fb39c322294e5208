//! Error Types

use thiserror::Error;

/// Result type alias for domain and store operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Domain error types
#[derive(Error, Debug)]
pub enum CoreError {
    /// Entity does not exist (or is not visible to the caller)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed or missing input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Request is well-formed but conflicts with current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// No usable session on the request
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated, but the role is not allowed here
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Uniqueness constraint hit
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backend storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(what) => format!("{what} not found."),
            Self::Validation(msg) | Self::InvalidState(msg) => msg.clone(),
            Self::Unauthenticated(_) => "Authentication required.".into(),
            Self::Forbidden(_) => "You are not allowed to perform this action.".into(),
            Self::Conflict(_) => "The resource already exists.".into(),
            Self::Config(_) => "Service configuration error.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("Row".into()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(db.message().to_string())
            }
            other => Self::Storage(other.to_string()),
        }
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::migrate::MigrateError> for CoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Storage(err.to_string())
    }
}
