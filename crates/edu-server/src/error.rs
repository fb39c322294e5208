//! HTTP Error Mapping

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use edu_core::CoreError;
use edu_payments::PaymentError;

/// Error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Handler error; renders a safe message and a stable code
#[derive(Debug)]
pub struct ApiError(pub PaymentError);

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match &self.0 {
            PaymentError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            PaymentError::Validation(_)
            | PaymentError::InvalidState(_)
            | PaymentError::WebhookParse(_) => StatusCode::BAD_REQUEST,
            PaymentError::Unauthenticated(_) | PaymentError::Signature(_) => {
                StatusCode::UNAUTHORIZED
            }
            PaymentError::Forbidden(_) => StatusCode::FORBIDDEN,
            PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
            PaymentError::Provider(_) | PaymentError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        Self(err)
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self.0 {
            PaymentError::Provider(_) => {
                tracing::error!(error_kind = "provider", error = %self.0, "Request failed");
            }
            PaymentError::Storage(_) => {
                tracing::error!(error_kind = "storage", error = %self.0, "Request failed");
            }
            PaymentError::Config(_) => {
                tracing::warn!(error_kind = "config", error = %self.0, "Payments unavailable");
            }
            PaymentError::Signature(_) => {
                tracing::warn!(error_kind = "signature", error = %self.0, "Rejected notification");
            }
            _ => tracing::debug!(status = %status, error = %self.0, "Request rejected"),
        }

        (
            status,
            Json(ErrorResponse {
                error: self.0.user_message(),
                code: self.0.code().into(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (PaymentError::Config("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (PaymentError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (PaymentError::InvalidState("x".into()), StatusCode::BAD_REQUEST),
            (PaymentError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (PaymentError::Signature("x".into()), StatusCode::UNAUTHORIZED),
            (PaymentError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (PaymentError::NotFound("Course".into()), StatusCode::NOT_FOUND),
            (PaymentError::Provider("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (PaymentError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }

    #[test]
    fn test_internal_details_not_exposed() {
        let err = ApiError(PaymentError::Storage("connection refused to 10.0.0.5".into()));
        assert!(!err.0.user_message().contains("10.0.0.5"));
    }
}
