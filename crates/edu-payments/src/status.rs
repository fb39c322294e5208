//! Purchase Status Query

use edu_core::{Identity, Payment, Purchase, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{PaymentError, Result};
use crate::provider::PaymentProvider;

/// Snapshot returned to the purchase owner
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PurchaseSnapshot {
    pub purchase: Purchase,
    pub payments: Vec<Payment>,
    pub enrolled: bool,
    /// Status of the newest provider payment, when the live lookup worked
    pub live_status: Option<String>,
}

/// Status service
pub struct StatusService {
    store: Arc<dyn Store>,
    provider: Option<Arc<dyn PaymentProvider>>,
}

impl StatusService {
    pub fn new(store: Arc<dyn Store>, provider: Option<Arc<dyn PaymentProvider>>) -> Self {
        Self { store, provider }
    }

    /// Snapshot of a purchase owned by `identity` (admins see any purchase).
    ///
    /// The live provider lookup is best-effort: failures are logged and the
    /// stored state is returned alone.
    pub async fn purchase_status(
        &self,
        identity: &Identity,
        purchase_id: Uuid,
    ) -> Result<PurchaseSnapshot> {
        let purchase = self
            .store
            .get_purchase(purchase_id)
            .await?
            .filter(|p| p.user_id == identity.user_id || identity.is_admin())
            .ok_or_else(|| PaymentError::NotFound("Purchase".into()))?;

        let payments = self.store.list_payments(purchase.id).await?;
        let enrolled = self
            .store
            .find_enrollment(purchase.user_id, purchase.course_id)
            .await?
            .is_some();

        let live_status = match &self.provider {
            Some(provider) => match provider.latest_status(&purchase.external_reference).await {
                Ok(status) => status,
                Err(e) => {
                    tracing::warn!(
                        error_kind = "provider",
                        purchase_id = %purchase.id,
                        error = %e,
                        "Live status lookup failed; returning stored status"
                    );
                    None
                }
            },
            None => None,
        };

        Ok(PurchaseSnapshot {
            purchase,
            payments,
            enrolled,
            live_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockPaymentProvider, ProviderPayment};
    use edu_core::{Course, Enrollment, MemoryStore, PurchaseStatus, Role};
    use rust_decimal_macros::dec;

    async fn seeded() -> (Arc<MemoryStore>, Arc<MockPaymentProvider>, Purchase) {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(MockPaymentProvider::new());
        let course = Course {
            id: Uuid::new_v4(),
            title: "Observability 101".into(),
            description: None,
            price: dec!(79.90),
            is_free: false,
            instructor_id: None,
        };
        let purchase = Purchase::pending(Uuid::new_v4(), &course, "BRL");
        store.insert_purchase(&purchase).await.unwrap();
        (store, provider, purchase)
    }

    #[tokio::test]
    async fn test_owner_sees_snapshot_with_live_status() {
        let (store, provider, purchase) = seeded().await;
        provider
            .put_payment(ProviderPayment {
                id: "77".into(),
                status: "in_process".into(),
                status_detail: None,
                external_reference: Some(purchase.external_reference.clone()),
                preference_id: None,
                transaction_amount: None,
                date_created: None,
            })
            .unwrap();
        let live = Some(provider.clone() as Arc<dyn PaymentProvider>);
        let service = StatusService::new(store.clone(), live);
        let owner = Identity::new(purchase.user_id, Role::Student);

        let snapshot = service.purchase_status(&owner, purchase.id).await.unwrap();

        assert_eq!(snapshot.purchase.status, PurchaseStatus::Pending);
        assert_eq!(snapshot.live_status.as_deref(), Some("in_process"));
        assert!(!snapshot.enrolled);
    }

    #[tokio::test]
    async fn test_provider_failure_is_swallowed() {
        let (store, provider, purchase) = seeded().await;
        store
            .insert_enrollment(&Enrollment::new(purchase.user_id, purchase.course_id))
            .await
            .unwrap();
        provider.set_failing(true);
        let live = Some(provider.clone() as Arc<dyn PaymentProvider>);
        let service = StatusService::new(store.clone(), live);
        let owner = Identity::new(purchase.user_id, Role::Student);

        let snapshot = service.purchase_status(&owner, purchase.id).await.unwrap();

        assert!(snapshot.live_status.is_none());
        assert!(snapshot.enrolled);
    }

    #[tokio::test]
    async fn test_other_users_get_not_found() {
        let (store, _, purchase) = seeded().await;
        let service = StatusService::new(store.clone(), None);

        let stranger = Identity::new(Uuid::new_v4(), Role::Instructor);
        assert!(matches!(
            service.purchase_status(&stranger, purchase.id).await,
            Err(PaymentError::NotFound(_))
        ));

        let admin = Identity::new(Uuid::new_v4(), Role::Admin);
        assert!(service.purchase_status(&admin, purchase.id).await.is_ok());

        let owner = Identity::new(purchase.user_id, Role::Student);
        assert!(matches!(
            service.purchase_status(&owner, Uuid::new_v4()).await,
            Err(PaymentError::NotFound(_))
        ));
    }
}
