//! Mock Payment Provider
//!
//! For testing and local development. Records the preferences it receives and
//! serves payments seeded with [`MockPaymentProvider::put_payment`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{PaymentProvider, Preference, PreferenceRequest, ProviderPayment};
use crate::error::{PaymentError, Result};

/// Mock provider with in-memory payments
#[derive(Default)]
pub struct MockPaymentProvider {
    preferences: RwLock<Vec<PreferenceRequest>>,
    payments: RwLock<HashMap<String, ProviderPayment>>,
    failing: AtomicBool,
}

fn poisoned() -> PaymentError {
    PaymentError::Provider("mock provider lock poisoned".into())
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a provider error (simulates an outage)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Seed or replace a payment
    pub fn put_payment(&self, payment: ProviderPayment) -> Result<()> {
        self.payments
            .write()
            .map_err(|_| poisoned())?
            .insert(payment.id.clone(), payment);
        Ok(())
    }

    /// Preferences created so far
    pub fn created_preferences(&self) -> Result<Vec<PreferenceRequest>> {
        Ok(self.preferences.read().map_err(|_| poisoned())?.clone())
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PaymentError::Provider("mock provider unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_preference(&self, request: &PreferenceRequest) -> Result<Preference> {
        self.check_available()?;
        let mut preferences = self.preferences.write().map_err(|_| poisoned())?;
        preferences.push(request.clone());
        let id = format!("pref-{}", preferences.len());

        Ok(Preference {
            init_point: format!("https://checkout.mock/redirect?pref_id={id}"),
            sandbox_init_point: None,
            id,
        })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<ProviderPayment> {
        self.check_available()?;
        self.payments
            .read()
            .map_err(|_| poisoned())?
            .get(payment_id)
            .cloned()
            .ok_or_else(|| PaymentError::Provider(format!("HTTP 404: payment {payment_id}")))
    }

    async fn search_payments(&self, external_reference: &str) -> Result<Vec<ProviderPayment>> {
        self.check_available()?;
        let mut found: Vec<ProviderPayment> = self
            .payments
            .read()
            .map_err(|_| poisoned())?
            .values()
            .filter(|p| p.external_reference.as_deref() == Some(external_reference))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.date_created.cmp(&a.date_created));
        Ok(found)
    }

    fn name(&self) -> &str {
        "MockProvider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn payment(id: &str, status: &str, minutes_ago: i64) -> ProviderPayment {
        ProviderPayment {
            id: id.into(),
            status: status.into(),
            status_detail: None,
            external_reference: Some("course:user".into()),
            preference_id: None,
            transaction_amount: None,
            date_created: Some(Utc::now() - Duration::minutes(minutes_ago)),
        }
    }

    #[tokio::test]
    async fn test_latest_status_is_newest() {
        let provider = MockPaymentProvider::new();
        provider.put_payment(payment("1", "rejected", 30)).unwrap();
        provider.put_payment(payment("2", "approved", 5)).unwrap();

        let status = provider.latest_status("course:user").await.unwrap();
        assert_eq!(status.as_deref(), Some("approved"));
    }

    #[tokio::test]
    async fn test_failing_mode() {
        let provider = MockPaymentProvider::new();
        provider.set_failing(true);
        assert!(matches!(
            provider.get_payment("1").await,
            Err(PaymentError::Provider(_))
        ));
    }
}
