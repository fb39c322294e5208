//! Payment Webhook Verification
//!
//! The provider signs every notification with a header of the form
//!
//! ```text
//! x-signature: ts=1704908010,v1=618c85345248dd820d5fd456117c2ab2ef8eda45a0282ff693eac24131a5e839
//! ```
//!
//! The signed manifest is `id:<data.id>;request-id:<x-request-id>;ts:<ts>;`,
//! MACed with HMAC-SHA256 under the shared webhook secret.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{PaymentError, Result};
use crate::provider::string_or_number;

type HmacSha256 = Hmac<Sha256>;

/// Default accepted clock skew between `ts` and now
pub const DEFAULT_TOLERANCE_SECS: u32 = 300;

/// Largest accepted tolerance (one day)
pub const MAX_TOLERANCE_SECS: u32 = 86_400;

/// Notification body posted by the provider
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notification {
    /// Topic, e.g. `payment`; older deliveries use `topic`
    #[serde(rename = "type", alias = "topic", default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub action: Option<String>,

    pub data: NotificationData,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationData {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

impl Notification {
    pub fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| PaymentError::WebhookParse(e.to_string()))
    }

    /// Whether this notification reports a payment change
    pub fn is_payment(&self) -> bool {
        self.kind.as_deref() == Some("payment")
            || self
                .action
                .as_deref()
                .is_some_and(|a| a.starts_with("payment."))
    }

    /// Id as it appears in the signed manifest (alphanumeric ids lowercased)
    pub fn manifest_id(&self) -> String {
        self.data.id.to_lowercase()
    }
}

/// Parsed `x-signature` header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureHeader {
    pub ts: String,
    pub v1: String,
}

impl SignatureHeader {
    /// Parse `key=value` pairs separated by commas. `ts` and `v1` are
    /// required; other keys are ignored.
    pub fn parse(header: &str) -> Result<Self> {
        let mut ts = None;
        let mut v1 = None;

        for part in header.split(',') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            match key.trim() {
                "ts" => ts = Some(value.trim().to_string()),
                "v1" => v1 = Some(value.trim().to_string()),
                _ => {}
            }
        }

        match (ts, v1) {
            (Some(ts), Some(v1)) if !ts.is_empty() && !v1.is_empty() => Ok(Self { ts, v1 }),
            _ => Err(PaymentError::Signature("signature header missing ts or v1".into())),
        }
    }

    /// Header timestamp as an instant; millisecond timestamps are accepted
    pub fn timestamp(&self) -> Result<DateTime<Utc>> {
        let raw: i64 = self
            .ts
            .parse()
            .map_err(|_| PaymentError::Signature("ts is not a unix timestamp".into()))?;
        let parsed = if raw > 100_000_000_000 {
            DateTime::from_timestamp_millis(raw)
        } else {
            DateTime::from_timestamp(raw, 0)
        };
        parsed.ok_or_else(|| PaymentError::Signature("ts out of range".into()))
    }
}

/// Build the exact string the provider signs
pub fn manifest(id: &str, request_id: &str, ts: &str) -> String {
    format!("id:{id};request-id:{request_id};ts:{ts};")
}

/// Hex HMAC-SHA256 of `manifest` under `secret`
pub fn sign(secret: &str, manifest: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::Config(format!("webhook secret: {e}")))?;
    mac.update(manifest.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Outcome of a successful verification
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verification {
    /// Signature checked and valid
    Verified,
    /// No secret configured and insecure mode explicitly enabled
    Skipped,
}

/// Webhook verifier
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Option<String>,
    insecure_skip_verify: bool,
    tolerance: Duration,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl WebhookVerifier {
    /// Verifier that checks every notification against `secret`
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            insecure_skip_verify: false,
            tolerance: Duration::seconds(i64::from(DEFAULT_TOLERANCE_SECS)),
        }
    }

    /// Build from optional configuration. Without a secret every notification
    /// is rejected unless `insecure_skip_verify` is set. The tolerance is
    /// capped at [`MAX_TOLERANCE_SECS`].
    pub fn from_config(
        secret: Option<String>,
        insecure_skip_verify: bool,
        tolerance_secs: u32,
    ) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            insecure_skip_verify,
            tolerance: Duration::seconds(i64::from(tolerance_secs.min(MAX_TOLERANCE_SECS))),
        }
    }

    pub const fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Verify a notification against its signature headers
    pub fn verify(
        &self,
        signature: Option<&str>,
        request_id: Option<&str>,
        notification: &Notification,
    ) -> Result<Verification> {
        self.verify_at(signature, request_id, &notification.manifest_id(), Utc::now())
    }

    /// Verify with an explicit data id and clock
    pub fn verify_at(
        &self,
        signature: Option<&str>,
        request_id: Option<&str>,
        data_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Verification> {
        let Some(secret) = self.secret.as_deref() else {
            if self.insecure_skip_verify {
                tracing::warn!(
                    data_id = %data_id,
                    "Webhook secret not configured; skipping signature check"
                );
                return Ok(Verification::Skipped);
            }
            return Err(PaymentError::Signature("webhook secret not configured".into()));
        };

        let header = SignatureHeader::parse(
            signature.ok_or_else(|| PaymentError::Signature("missing x-signature header".into()))?,
        )?;
        let request_id = request_id
            .filter(|r| !r.is_empty())
            .ok_or_else(|| PaymentError::Signature("missing x-request-id header".into()))?;

        let signed_at = header.timestamp()?;
        if (now - signed_at).abs() > self.tolerance {
            return Err(PaymentError::Signature(format!(
                "timestamp {} outside tolerance",
                header.ts
            )));
        }

        let expected = hex::decode(&header.v1)
            .map_err(|_| PaymentError::Signature("v1 is not hex".into()))?;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| PaymentError::Config(format!("webhook secret: {e}")))?;
        mac.update(manifest(data_id, request_id, &header.ts).as_bytes());

        // verify_slice compares in constant time
        mac.verify_slice(&expected)
            .map_err(|_| PaymentError::Signature("signature mismatch".into()))?;

        Ok(Verification::Verified)
    }

}
