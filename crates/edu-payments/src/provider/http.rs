//! HTTP Payment Provider
//!
//! Talks to a Mercado Pago compatible REST API with a bearer access token.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;

use super::{PaymentProvider, Preference, PreferenceRequest, ProviderPayment};
use crate::error::{PaymentError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.mercadopago.com";

/// HTTP provider client
pub struct HttpPaymentProvider {
    client: Client,
    base_url: String,
    access_token: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ProviderPayment>,
}

impl HttpPaymentProvider {
    /// Create a client; every request is bounded by `timeout`
    pub fn new(access_token: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        if access_token.trim().is_empty() {
            return Err(PaymentError::Config("payment access token is empty".into()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentError::Config(format!("http client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn non-2xx answers into provider errors, keeping the body for logs
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(PaymentError::Provider(format!("HTTP {status}: {body}")))
    }
}

/// Payment ids are numeric on the provider side; anything else never reaches
/// the URL path.
fn validate_payment_id(payment_id: &str) -> Result<()> {
    if payment_id.is_empty()
        || !payment_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(PaymentError::Validation(format!(
            "invalid payment id '{payment_id}'"
        )));
    }
    Ok(())
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    async fn create_preference(&self, request: &PreferenceRequest) -> Result<Preference> {
        tracing::debug!(
            external_reference = %request.external_reference,
            "Creating checkout preference"
        );

        let response = self
            .client
            .post(self.url("/checkout/preferences"))
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .await?;

        Ok(Self::check(response).await?.json::<Preference>().await?)
    }

    async fn get_payment(&self, payment_id: &str) -> Result<ProviderPayment> {
        validate_payment_id(payment_id)?;

        let response = self
            .client
            .get(self.url(&format!("/v1/payments/{payment_id}")))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        Ok(Self::check(response).await?.json::<ProviderPayment>().await?)
    }

    async fn search_payments(&self, external_reference: &str) -> Result<Vec<ProviderPayment>> {
        let response = self
            .client
            .get(self.url("/v1/payments/search"))
            .bearer_auth(&self.access_token)
            .query(&[
                ("external_reference", external_reference),
                ("sort", "date_created"),
                ("criteria", "desc"),
            ])
            .send()
            .await?;

        let search = Self::check(response).await?.json::<SearchResponse>().await?;
        Ok(search.results)
    }

    fn name(&self) -> &str {
        "mercadopago"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token_is_config_error() {
        let result = HttpPaymentProvider::new("  ", DEFAULT_API_BASE, Duration::from_secs(5));
        assert!(matches!(result, Err(PaymentError::Config(_))));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let timeout = Duration::from_secs(5);
        let provider =
            HttpPaymentProvider::new("APP_USR-1", "https://api.example.com/", timeout).unwrap();
        assert_eq!(
            provider.url("/v1/payments/1"),
            "https://api.example.com/v1/payments/1"
        );
    }

    #[test]
    fn test_payment_id_validation() {
        assert!(validate_payment_id("1234567890").is_ok());
        assert!(validate_payment_id("").is_err());
        assert!(validate_payment_id("../users").is_err());
        assert!(validate_payment_id("1?x=2").is_err());
    }
}
