//! Checkout Creation
//!
//! Builds a provider preference for a paid course and records the attempt as
//! a pending purchase before the provider is contacted.

use chrono::{DateTime, Duration, Utc};
use edu_core::{Course, Identity, Profile, Purchase, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{PaymentError, Result};
use crate::provider::{
    BackUrls, Identification, Payer, PaymentProvider, PreferenceItem, PreferenceRequest,
};

/// How long a preference stays payable
pub const PREFERENCE_TTL_HOURS: i64 = 24;

/// Static settings for preference building
#[derive(Clone, Debug)]
pub struct CheckoutSettings {
    /// Public origin of this service, used for callback and redirect URLs
    pub public_base_url: String,
    /// ISO currency code
    pub currency: String,
    /// Text on the payer's card statement
    pub statement_descriptor: Option<String>,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:3000".into(),
            currency: "BRL".into(),
            statement_descriptor: Some("EDUPLATFORM".into()),
        }
    }
}

/// Builds provider preferences from a course, a profile and the pending
/// purchase that tracks them
#[derive(Clone, Debug)]
pub struct PreferenceBuilder {
    settings: CheckoutSettings,
}

impl PreferenceBuilder {
    pub const fn new(settings: CheckoutSettings) -> Self {
        Self { settings }
    }

    pub const fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.public_base_url.trim_end_matches('/'), path)
    }

    /// Webhook callback URL given to the provider
    pub fn notification_url(&self) -> String {
        self.url("/webhook/payments")
    }

    pub fn build(
        &self,
        course: &Course,
        profile: &Profile,
        purchase: &Purchase,
    ) -> Result<PreferenceRequest> {
        self.build_at(course, profile, purchase, Utc::now())
    }

    /// Build with an explicit clock
    pub fn build_at(
        &self,
        course: &Course,
        profile: &Profile,
        purchase: &Purchase,
        now: DateTime<Utc>,
    ) -> Result<PreferenceRequest> {
        if !course.is_paid() {
            return Err(PaymentError::InvalidState(
                "This course is free; enroll directly instead of checking out.".into(),
            ));
        }

        let email = profile
            .email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| PaymentError::Validation("Your profile has no email address.".into()))?;

        let identification = profile.tax_id.as_deref().and_then(tax_identification);

        Ok(PreferenceRequest {
            items: vec![PreferenceItem {
                id: course.id.to_string(),
                title: course.title.clone(),
                quantity: 1,
                unit_price: course.price,
                currency_id: self.settings.currency.clone(),
            }],
            payer: Payer {
                email: email.to_string(),
                name: profile.full_name.clone(),
                identification,
            },
            external_reference: purchase.external_reference.clone(),
            notification_url: self.notification_url(),
            back_urls: BackUrls {
                success: self.url("/checkout/success"),
                failure: self.url("/checkout/failure"),
                pending: self.url("/checkout/pending"),
            },
            auto_return: "approved".into(),
            expires: true,
            expiration_date_from: now,
            expiration_date_to: now + Duration::hours(PREFERENCE_TTL_HOURS),
            statement_descriptor: self.settings.statement_descriptor.clone(),
        })
    }
}

/// Result of creating a checkout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider preference id
    pub preference_id: String,

    /// URL to redirect the user to
    pub init_point: String,

    /// Local purchase id, for status polling
    pub purchase_id: Uuid,
}

/// Checkout service
pub struct CheckoutService {
    store: Arc<dyn Store>,
    provider: Option<Arc<dyn PaymentProvider>>,
    builder: PreferenceBuilder,
}

impl CheckoutService {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Option<Arc<dyn PaymentProvider>>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            store,
            provider,
            builder: PreferenceBuilder::new(settings),
        }
    }

    /// Whether a provider credential is configured
    pub const fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Create a checkout for `course_id` on behalf of `identity`.
    ///
    /// The pending purchase is written before the provider call, so a failed
    /// call still leaves a record of the attempt.
    pub async fn create_checkout(
        &self,
        identity: &Identity,
        course_id: Option<&str>,
    ) -> Result<CheckoutSession> {
        let course_id = parse_course_id(course_id)?;

        let course = self
            .store
            .get_course(course_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound("Course".into()))?;

        if !course.is_paid() {
            return Err(PaymentError::InvalidState(
                "This course is free; enroll directly instead of checking out.".into(),
            ));
        }

        if self
            .store
            .find_enrollment(identity.user_id, course.id)
            .await?
            .is_some()
        {
            return Err(PaymentError::InvalidState(
                "You are already enrolled in this course.".into(),
            ));
        }

        let profile = self
            .store
            .get_profile(identity.user_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound("Profile".into()))?;

        let provider = self.provider.as_ref().ok_or_else(|| {
            PaymentError::Config("payment provider access token not configured".into())
        })?;

        let currency = &self.builder.settings().currency;
        let purchase = Purchase::pending(identity.user_id, &course, currency);
        let request = self.builder.build(&course, &profile, &purchase)?;

        self.store.insert_purchase(&purchase).await?;
        tracing::info!(
            purchase_id = %purchase.id,
            course_id = %course.id,
            user_id = %identity.user_id,
            amount = %purchase.amount,
            "Created pending purchase"
        );

        let preference = provider.create_preference(&request).await.map_err(|e| {
            tracing::error!(
                error_kind = "provider",
                provider = provider.name(),
                purchase_id = %purchase.id,
                error = %e,
                "Preference creation failed"
            );
            e
        })?;

        self.store
            .set_purchase_preference(purchase.id, &preference.id)
            .await?;

        tracing::info!(
            purchase_id = %purchase.id,
            preference_id = %preference.id,
            "Checkout preference created"
        );

        Ok(CheckoutSession {
            preference_id: preference.id,
            init_point: preference.init_point,
            purchase_id: purchase.id,
        })
    }
}

/// Brazilian tax id by digit count: 11 is a CPF, 14 a CNPJ. Anything else
/// is left off the preference.
fn tax_identification(raw: &str) -> Option<Identification> {
    let number: String = raw.chars().filter(char::is_ascii_digit).collect();
    let kind = match number.len() {
        11 => "CPF",
        14 => "CNPJ",
        _ => return None,
    };
    Some(Identification {
        kind: kind.into(),
        number,
    })
}

pub(crate) fn parse_course_id(course_id: Option<&str>) -> Result<Uuid> {
    let raw = course_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PaymentError::Validation("course_id is required.".into()))?;
    Uuid::parse_str(raw)
        .map_err(|_| PaymentError::Validation("course_id is not a valid id.".into()))
}
