//! Payment Error Types

use edu_core::CoreError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Provider credential missing; payments are switched off
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bad input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Input is fine but the course/enrollment state forbids the action
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// No session
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Role or ownership check failed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Course or purchase not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network, timeout or non-2xx from the payment provider
    #[error("Provider error: {0}")]
    Provider(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    Signature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PaymentError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::Storage(_))
    }

    /// Stable machine-readable code
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "PAYMENTS_UNAVAILABLE",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::Unauthenticated(_) => "UNAUTHENTICATED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Provider(_) => "PROVIDER_ERROR",
            Self::Signature(_) => "INVALID_SIGNATURE",
            Self::WebhookParse(_) => "INVALID_NOTIFICATION",
            Self::Storage(_) => "INTERNAL_ERROR",
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(_) => "Payments are temporarily unavailable.".into(),
            Self::Validation(msg) | Self::InvalidState(msg) => msg.clone(),
            Self::Unauthenticated(_) => "Authentication required.".into(),
            Self::Forbidden(_) => "You are not allowed to perform this action.".into(),
            Self::NotFound(what) => format!("{what} not found."),
            Self::Provider(_) => "Payment processing failed. Please try again.".into(),
            Self::Signature(_) => "Invalid signature.".into(),
            Self::WebhookParse(_) => "Invalid notification payload.".into(),
            Self::Storage(_) => "An error occurred processing your request.".into(),
        }
    }
}

impl From<CoreError> for PaymentError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(what) => Self::NotFound(what),
            CoreError::Validation(msg) => Self::Validation(msg),
            CoreError::InvalidState(msg) | CoreError::Conflict(msg) => Self::InvalidState(msg),
            CoreError::Unauthenticated(msg) => Self::Unauthenticated(msg),
            CoreError::Forbidden(msg) => Self::Forbidden(msg),
            CoreError::Config(msg) => Self::Config(msg),
            CoreError::Storage(msg) => Self::Storage(msg),
            CoreError::Json(e) => Self::Storage(e.to_string()),
        }
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Provider(format!("timeout: {err}"))
        } else {
            Self::Provider(err.to_string())
        }
    }
}
