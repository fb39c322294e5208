//! Payment Provider Integration
//!
//! Wire types for the provider's preferences/payments API and the
//! `PaymentProvider` trait the services call through.

mod http;
mod mock;

pub use http::{DEFAULT_API_BASE, HttpPaymentProvider};
pub use mock::MockPaymentProvider;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edu_core::PurchaseStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;

/// Checkout preference sent to the provider
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PreferenceRequest {
    pub items: Vec<PreferenceItem>,
    pub payer: Payer,
    /// `<course id>:<user id>`, echoed back on every payment
    pub external_reference: String,
    pub notification_url: String,
    pub back_urls: BackUrls,
    pub auto_return: String,
    pub expires: bool,
    pub expiration_date_from: DateTime<Utc>,
    pub expiration_date_to: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement_descriptor: Option<String>,
}

/// Line item
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PreferenceItem {
    pub id: String,
    pub title: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub currency_id: String,
}

/// Payer identity
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payer {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identification: Option<Identification>,
}

/// Tax identification document
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Identification {
    #[serde(rename = "type")]
    pub kind: String,
    pub number: String,
}

/// Redirect targets after checkout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

/// Provider's answer to a preference creation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Preference {
    pub id: String,
    pub init_point: String,
    #[serde(default)]
    pub sandbox_init_point: Option<String>,
}

/// Provider-side payment object (subset)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderPayment {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub status_detail: Option<String>,
    #[serde(default)]
    pub external_reference: Option<String>,
    #[serde(default)]
    pub preference_id: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub transaction_amount: Option<Decimal>,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
}

impl ProviderPayment {
    pub fn is_approved(&self) -> bool {
        self.status == "approved"
    }

    /// Local purchase status this payment settles to, if any.
    ///
    /// Anything other than approved/rejected/cancelled leaves the purchase
    /// pending.
    pub fn settles_to(&self) -> Option<PurchaseStatus> {
        match self.status.as_str() {
            "approved" => Some(PurchaseStatus::Approved),
            "rejected" | "cancelled" => Some(PurchaseStatus::Rejected),
            _ => None,
        }
    }
}

/// Provider ids arrive as JSON numbers on payments and as strings elsewhere.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// Payment provider trait (Strategy pattern)
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a checkout preference
    async fn create_preference(&self, request: &PreferenceRequest) -> Result<Preference>;

    /// Fetch a payment by provider id
    async fn get_payment(&self, payment_id: &str) -> Result<ProviderPayment>;

    /// Payments carrying an external reference, newest first
    async fn search_payments(&self, external_reference: &str) -> Result<Vec<ProviderPayment>>;

    /// Status of the newest payment for an external reference
    async fn latest_status(&self, external_reference: &str) -> Result<Option<String>> {
        Ok(self
            .search_payments(external_reference)
            .await?
            .into_iter()
            .next()
            .map(|p| p.status))
    }

    /// Provider name
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_payment_accepts_numeric_id() {
        let payment: ProviderPayment = serde_json::from_str(
            r#"{"id": 1234567890, "status": "approved", "status_detail": "accredited",
                "external_reference": "a:b", "transaction_amount": 199.9}"#,
        )
        .unwrap();

        assert_eq!(payment.id, "1234567890");
        assert_eq!(payment.transaction_amount, Some(dec!(199.9)));
        assert!(payment.is_approved());
    }

    #[test]
    fn test_status_mapping() {
        let mut payment: ProviderPayment =
            serde_json::from_str(r#"{"id": "1", "status": "rejected"}"#).unwrap();
        assert_eq!(payment.settles_to(), Some(PurchaseStatus::Rejected));

        payment.status = "cancelled".into();
        assert_eq!(payment.settles_to(), Some(PurchaseStatus::Rejected));

        payment.status = "in_process".into();
        assert_eq!(payment.settles_to(), None);

        payment.status = "approved".into();
        assert_eq!(payment.settles_to(), Some(PurchaseStatus::Approved));
    }

    #[test]
    fn test_unit_price_serialized_as_number() {
        let item = PreferenceItem {
            id: "c1".into(),
            title: "Course".into(),
            quantity: 1,
            unit_price: dec!(199.90),
            currency_id: "BRL".into(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert!(json["unit_price"].is_number());
    }
}
