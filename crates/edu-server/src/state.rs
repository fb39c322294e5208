//! Application State

use std::sync::Arc;

use edu_core::Store;
use edu_payments::{
    CheckoutService, CheckoutSettings, EnrollmentService, PaymentProvider, Reconciler,
    StatusService, WebhookVerifier,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Persistence (PostgreSQL or in-memory)
    pub store: Arc<dyn Store>,

    pub checkout: Arc<CheckoutService>,
    pub enrollments: Arc<EnrollmentService>,
    pub reconciler: Arc<Reconciler>,
    pub status: Arc<StatusService>,

    /// Webhook signature verifier
    pub verifier: Arc<WebhookVerifier>,
}

impl AppState {
    /// Wire the services around one store and an optional provider.
    /// Without a provider, payment endpoints answer 503.
    pub fn new(
        store: Arc<dyn Store>,
        provider: Option<Arc<dyn PaymentProvider>>,
        verifier: WebhookVerifier,
        settings: CheckoutSettings,
    ) -> Self {
        let enrollments = Arc::new(EnrollmentService::new(store.clone()));
        Self {
            checkout: Arc::new(CheckoutService::new(store.clone(), provider.clone(), settings)),
            reconciler: Arc::new(Reconciler::new(
                store.clone(),
                provider.clone(),
                enrollments.clone(),
            )),
            status: Arc::new(StatusService::new(store.clone(), provider)),
            enrollments,
            verifier: Arc::new(verifier),
            store,
        }
    }
}
