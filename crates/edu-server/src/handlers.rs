//! HTTP Handlers

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use edu_core::{Enrollment, RequestContext};
use edu_payments::{
    CheckoutSession, Notification, PaymentError, PurchaseSnapshot, ReconcileOutcome, Verification,
};

use crate::auth::REQUEST_ID_HEADER;
use crate::error::ApiError;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-signature";

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: String,
    pub payments_configured: bool,
    pub webhook_secret_configured: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct CourseRequest {
    #[serde(default)]
    pub course_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncResponse {
    pub purchase_id: Uuid,
    pub outcomes: Vec<ReconcileOutcome>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
    pub verified: bool,
    #[serde(flatten)]
    pub outcome: ReconcileOutcome,
}

fn course_request(
    payload: Result<Json<CourseRequest>, JsonRejection>,
) -> Result<CourseRequest, ApiError> {
    payload.map(|Json(body)| body).map_err(|e| {
        PaymentError::Validation(format!("Invalid request body: {}", e.body_text())).into()
    })
}

// Malformed ids cannot name a purchase.
fn purchase_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| PaymentError::NotFound("Purchase".into()).into())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        store: state.store.kind().into(),
        payments_configured: state.checkout.is_configured(),
        webhook_secret_configured: state.verifier.has_secret(),
    })
}

/// Start a checkout for a paid course
pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<Json<CourseRequest>, JsonRejection>,
) -> Result<Json<CheckoutSession>, ApiError> {
    let body = course_request(payload)?;
    let session = state
        .checkout
        .create_checkout(&ctx.identity, body.course_id.as_deref())
        .await?;

    tracing::info!(
        request_id = %ctx.request_id,
        purchase_id = %session.purchase_id,
        "Checkout started"
    );
    Ok(Json(session))
}

/// Enroll directly into a free course
pub async fn enroll_free(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<Json<CourseRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Enrollment>), ApiError> {
    let body = course_request(payload)?;
    let enrollment = state
        .enrollments
        .enroll_free(&ctx.identity, body.course_id.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

/// Purchase status for its owner
pub async fn purchase_status(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<Json<PurchaseSnapshot>, ApiError> {
    let snapshot = state
        .status
        .purchase_status(&ctx.identity, purchase_id(&id)?)
        .await?;
    Ok(Json(snapshot))
}

/// Re-fetch a purchase's payments from the provider (admin)
pub async fn sync_purchase(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<Json<SyncResponse>, ApiError> {
    let purchase_id = purchase_id(&id)?;
    tracing::info!(
        request_id = %ctx.request_id,
        admin_id = %ctx.user_id(),
        purchase_id = %purchase_id,
        "Manual purchase sync"
    );
    let outcomes = state.reconciler.resync(purchase_id).await?;
    Ok(Json(SyncResponse {
        purchase_id,
        outcomes,
    }))
}

/// Provider payment notification.
///
/// 200 once processed (including no-ops), 401 on a bad signature, 5xx when
/// the provider or the database failed so the provider retries.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookAck>, ApiError> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let notification = Notification::parse(&body)?;
    let verification = state.verifier.verify(
        header(SIGNATURE_HEADER),
        header(REQUEST_ID_HEADER),
        &notification,
    )?;

    tracing::info!(
        kind = ?notification.kind,
        action = ?notification.action,
        data_id = %notification.data.id,
        request_id = ?header(REQUEST_ID_HEADER),
        "Payment notification received"
    );

    let outcome = state
        .reconciler
        .handle_notification(&notification)
        .await
        .inspect_err(|e| {
            if e.is_retryable() {
                tracing::warn!(
                    data_id = %notification.data.id,
                    error = %e,
                    "Notification not processed; provider will redeliver"
                );
            }
        })?;

    Ok(Json(WebhookAck {
        received: true,
        verified: verification == Verification::Verified,
        outcome,
    }))
}
