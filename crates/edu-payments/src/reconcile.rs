//! Payment Reconciliation
//!
//! Applies provider payment state to local records: one payment row per
//! observation, a one-way purchase status transition, and an enrollment on
//! approval. Safe to run any number of times for the same payment.

use edu_core::{ExternalReference, Payment, Purchase, PurchaseStatus, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::enrollment::{EnrollmentService, Grant};
use crate::error::{PaymentError, Result};
use crate::provider::{PaymentProvider, ProviderPayment};
use crate::webhook::Notification;

/// What reconciliation did with one payment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Nothing to do (non-payment topic, unknown purchase, ...)
    Ignored { reason: String },

    Applied {
        purchase_id: Uuid,
        provider_payment_id: String,
        provider_status: String,
        purchase_status: PurchaseStatus,
        /// Whether this call moved the purchase out of pending
        status_changed: bool,
        enrollment: Option<Grant>,
    },
}

/// Reconciliation service
pub struct Reconciler {
    store: Arc<dyn Store>,
    provider: Option<Arc<dyn PaymentProvider>>,
    enrollments: Arc<EnrollmentService>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Option<Arc<dyn PaymentProvider>>,
        enrollments: Arc<EnrollmentService>,
    ) -> Self {
        Self {
            store,
            provider,
            enrollments,
        }
    }

    fn provider(&self) -> Result<&Arc<dyn PaymentProvider>> {
        self.provider.as_ref().ok_or_else(|| {
            PaymentError::Config("payment provider access token not configured".into())
        })
    }

    /// Handle a verified webhook notification
    pub async fn handle_notification(
        &self,
        notification: &Notification,
    ) -> Result<ReconcileOutcome> {
        if !notification.is_payment() {
            tracing::debug!(kind = ?notification.kind, "Ignoring non-payment notification");
            return Ok(ReconcileOutcome::Ignored {
                reason: format!(
                    "unhandled topic {}",
                    notification.kind.as_deref().unwrap_or("<none>")
                ),
            });
        }

        let provider = self.provider()?;
        let payment = provider
            .get_payment(&notification.data.id)
            .await
            .map_err(|e| {
                tracing::error!(
                    error_kind = "provider",
                    provider = provider.name(),
                    payment_id = %notification.data.id,
                    error = %e,
                    "Payment lookup failed"
                );
                e
            })?;

        self.apply(&payment).await
    }

    /// Apply a provider payment to the purchase it belongs to
    pub async fn apply(&self, payment: &ProviderPayment) -> Result<ReconcileOutcome> {
        let Some(purchase) = self.locate(payment).await? else {
            tracing::warn!(
                payment_id = %payment.id,
                external_reference = ?payment.external_reference,
                "No purchase matches payment"
            );
            return Ok(ReconcileOutcome::Ignored {
                reason: format!("no purchase for payment {}", payment.id),
            });
        };

        self.apply_to(&purchase, payment).await
    }

    /// Re-fetch every provider payment for a purchase and apply them oldest
    /// first. Used when notifications were lost.
    pub async fn resync(&self, purchase_id: Uuid) -> Result<Vec<ReconcileOutcome>> {
        let purchase = self
            .store
            .get_purchase(purchase_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound("Purchase".into()))?;

        let mut payments = self
            .provider()?
            .search_payments(&purchase.external_reference)
            .await?;
        payments.reverse();

        tracing::info!(
            purchase_id = %purchase.id,
            payments = payments.len(),
            "Resyncing purchase from provider"
        );

        let mut outcomes = Vec::with_capacity(payments.len());
        for payment in &payments {
            outcomes.push(self.apply_to(&purchase, payment).await?);
        }
        Ok(outcomes)
    }

    async fn locate(&self, payment: &ProviderPayment) -> Result<Option<Purchase>> {
        if let Some(preference_id) = payment.preference_id.as_deref() {
            if let Some(purchase) = self.store.find_purchase_by_preference(preference_id).await? {
                return Ok(Some(purchase));
            }
        }

        let Some(raw) = payment.external_reference.as_deref() else {
            return Ok(None);
        };
        let Ok(reference) = raw.parse::<ExternalReference>() else {
            tracing::warn!(external_reference = %raw, "Unparseable external reference");
            return Ok(None);
        };

        Ok(self
            .store
            .find_latest_purchase(reference.user_id, reference.course_id)
            .await?)
    }

    async fn apply_to(
        &self,
        purchase: &Purchase,
        payment: &ProviderPayment,
    ) -> Result<ReconcileOutcome> {
        self.store
            .insert_payment(&Payment::new(
                purchase.id,
                &payment.id,
                &payment.status,
                payment.status_detail.clone(),
                payment.transaction_amount,
            ))
            .await?;

        if let Some(paid) = payment.transaction_amount {
            if paid != purchase.amount {
                tracing::warn!(
                    purchase_id = %purchase.id,
                    expected = %purchase.amount,
                    paid = %paid,
                    "Payment amount differs from purchase amount"
                );
            }
        }

        let mut status_changed = false;
        if let Some(target) = payment.settles_to() {
            status_changed = self.store.advance_purchase_status(purchase.id, target).await?;
            if !status_changed {
                tracing::info!(
                    purchase_id = %purchase.id,
                    provider_status = %payment.status,
                    "Purchase already settled; status left unchanged"
                );
            }
        }

        let enrollment = if payment.is_approved() {
            Some(self.enrollments.grant(purchase.user_id, purchase.course_id).await?)
        } else {
            None
        };

        let purchase_status = self
            .store
            .get_purchase(purchase.id)
            .await?
            .map_or(purchase.status, |p| p.status);

        tracing::info!(
            purchase_id = %purchase.id,
            payment_id = %payment.id,
            provider_status = %payment.status,
            purchase_status = %purchase_status,
            status_changed,
            enrollment = ?enrollment,
            "Payment reconciled"
        );

        Ok(ReconcileOutcome::Applied {
            purchase_id: purchase.id,
            provider_payment_id: payment.id.clone(),
            provider_status: payment.status.clone(),
            purchase_status,
            status_changed,
            enrollment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockPaymentProvider;
    use chrono::{Duration, Utc};
    use edu_core::{Course, MemoryStore};
    use rust_decimal_macros::dec;

    struct Fixture {
        store: Arc<MemoryStore>,
        provider: Arc<MockPaymentProvider>,
        reconciler: Reconciler,
        purchase: Purchase,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(MockPaymentProvider::new());
        let course = Course {
            id: Uuid::new_v4(),
            title: "Kubernetes in Practice".into(),
            description: None,
            price: dec!(199.90),
            is_free: false,
            instructor_id: None,
        };
        store.put_course(course.clone()).unwrap();

        let purchase = Purchase::pending(Uuid::new_v4(), &course, "BRL");
        store.insert_purchase(&purchase).await.unwrap();
        store.set_purchase_preference(purchase.id, "pref-1").await.unwrap();

        let enrollments = Arc::new(EnrollmentService::new(store.clone()));
        let reconciler = Reconciler::new(
            store.clone(),
            Some(provider.clone() as Arc<dyn PaymentProvider>),
            enrollments,
        );

        Fixture {
            store,
            provider,
            reconciler,
            purchase,
        }
    }

    fn payment(id: &str, status: &str, purchase: &Purchase) -> ProviderPayment {
        ProviderPayment {
            id: id.into(),
            status: status.into(),
            status_detail: None,
            external_reference: Some(purchase.external_reference.clone()),
            preference_id: None,
            transaction_amount: Some(purchase.amount),
            date_created: Some(Utc::now()),
        }
    }

    fn notification(id: &str) -> Notification {
        Notification::parse(&format!(r#"{{"type":"payment","data":{{"id":"{id}"}}}}"#)).unwrap()
    }

    #[tokio::test]
    async fn test_approved_twice_enrolls_once() {
        let f = fixture().await;
        f.provider.put_payment(payment("9001", "approved", &f.purchase)).unwrap();

        let first = f.reconciler.handle_notification(&notification("9001")).await.unwrap();
        let second = f.reconciler.handle_notification(&notification("9001")).await.unwrap();

        assert!(matches!(
            first,
            ReconcileOutcome::Applied { status_changed: true, enrollment: Some(Grant::Created), .. }
        ));
        assert!(matches!(
            second,
            ReconcileOutcome::Applied {
                status_changed: false,
                enrollment: Some(Grant::AlreadyEnrolled),
                ..
            }
        ));

        let purchase = f.store.get_purchase(f.purchase.id).await.unwrap().unwrap();
        assert_eq!(purchase.status, PurchaseStatus::Approved);
        assert_eq!(f.store.enrollment_count().unwrap(), 1);

        let enrollment = f
            .store
            .find_enrollment(f.purchase.user_id, f.purchase.course_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(enrollment.progress, 0);

        // Each delivery leaves an audit row
        assert_eq!(f.store.list_payments(f.purchase.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_does_not_enroll() {
        let f = fixture().await;
        f.provider.put_payment(payment("1", "rejected", &f.purchase)).unwrap();

        f.reconciler.handle_notification(&notification("1")).await.unwrap();

        let purchase = f.store.get_purchase(f.purchase.id).await.unwrap().unwrap();
        assert_eq!(purchase.status, PurchaseStatus::Rejected);
        assert_eq!(f.store.enrollment_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_approved_purchase_never_regresses() {
        let f = fixture().await;
        f.provider.put_payment(payment("1", "approved", &f.purchase)).unwrap();
        f.provider.put_payment(payment("2", "cancelled", &f.purchase)).unwrap();

        f.reconciler.handle_notification(&notification("1")).await.unwrap();
        f.reconciler.handle_notification(&notification("2")).await.unwrap();

        let purchase = f.store.get_purchase(f.purchase.id).await.unwrap().unwrap();
        assert_eq!(purchase.status, PurchaseStatus::Approved);
    }

    #[tokio::test]
    async fn test_in_process_stays_pending() {
        let f = fixture().await;
        f.provider.put_payment(payment("1", "in_process", &f.purchase)).unwrap();

        let outcome = f.reconciler.handle_notification(&notification("1")).await.unwrap();

        assert!(matches!(
            outcome,
            ReconcileOutcome::Applied {
                purchase_status: PurchaseStatus::Pending,
                enrollment: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_located_by_preference_id() {
        let f = fixture().await;
        let mut p = payment("1", "approved", &f.purchase);
        p.external_reference = None;
        p.preference_id = Some("pref-1".into());

        let outcome = f.reconciler.apply(&p).await.unwrap();
        assert!(matches!(
            outcome,
            ReconcileOutcome::Applied { purchase_id, .. } if purchase_id == f.purchase.id
        ));
    }

    #[tokio::test]
    async fn test_unknown_purchase_is_ignored() {
        let f = fixture().await;
        let mut p = payment("1", "approved", &f.purchase);
        p.external_reference = Some(format!("{}:{}", Uuid::new_v4(), Uuid::new_v4()));

        let outcome = f.reconciler.apply(&p).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Ignored { .. }));
        assert_eq!(f.store.enrollment_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_non_payment_topic_is_ignored() {
        let f = fixture().await;
        let n = Notification::parse(r#"{"type":"merchant_order","data":{"id":"1"}}"#).unwrap();

        let outcome = f.reconciler.handle_notification(&n).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Ignored { .. }));
    }

    #[tokio::test]
    async fn test_provider_outage_surfaces_error() {
        let f = fixture().await;
        f.provider.set_failing(true);

        let result = f.reconciler.handle_notification(&notification("1")).await;
        assert!(matches!(result, Err(PaymentError::Provider(_))));
        assert!(f.store.list_payments(f.purchase.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resync_applies_oldest_first() {
        let f = fixture().await;
        let mut rejected = payment("1", "rejected", &f.purchase);
        rejected.date_created = Some(Utc::now() - Duration::minutes(30));
        let approved = payment("2", "approved", &f.purchase);
        f.provider.put_payment(rejected).unwrap();
        f.provider.put_payment(approved).unwrap();

        let outcomes = f.reconciler.resync(f.purchase.id).await.unwrap();

        assert_eq!(outcomes.len(), 2);
        // The older rejection settles the purchase first; approval still enrolls.
        let purchase = f.store.get_purchase(f.purchase.id).await.unwrap().unwrap();
        assert_eq!(purchase.status, PurchaseStatus::Rejected);
        assert_eq!(f.store.enrollment_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_resync_unknown_purchase() {
        let f = fixture().await;
        let result = f.reconciler.resync(Uuid::new_v4()).await;
        assert!(matches!(result, Err(PaymentError::NotFound(_))));
    }
}
