//! Router Assembly

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::authorize;
use crate::handlers::{
    create_checkout, enroll_free, health_check, payment_webhook, purchase_status, sync_purchase,
};
use crate::state::AppState;

/// Build the application router. Every route passes the policy middleware.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))
        // Checkout & enrollment
        .route("/api/checkout", post(create_checkout))
        .route("/api/enrollments", post(enroll_free))
        .route("/api/purchases/{id}/status", get(purchase_status))
        // Admin
        .route("/api/admin/purchases/{id}/sync", post(sync_purchase))
        // Provider callbacks
        .route("/webhook/payments", post(payment_webhook))
        .route_layer(middleware::from_fn_with_state(state.clone(), authorize))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
