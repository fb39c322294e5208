//! # edu-payments
//!
//! Course checkout, payment webhooks and reconciliation for EduPlatform.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────┐  checkout   ┌─────────────┐  redirect  ┌──────────────┐
//! │   User   │────────────▶│ This server │───────────▶│   Provider   │
//! └──────────┘             └─────────────┘            │ hosted page  │
//!       ▲                         ▲                   └──────┬───────┘
//!       │ status polling          │ signed webhook           │
//!       └─────────────────────────┴──────────────────────────┘
//! ```
//!
//! 1. [`CheckoutService`] writes a pending purchase, then creates a provider
//!    preference and stores its id on the purchase.
//! 2. The provider calls back asynchronously; [`WebhookVerifier`] checks the
//!    timestamped HMAC signature.
//! 3. [`Reconciler`] fetches the payment, appends a payment row, settles the
//!    purchase and grants the enrollment on approval.
//! 4. [`StatusService`] answers the user's polling, optionally refreshed from
//!    the provider.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use edu_payments::{CheckoutService, CheckoutSettings, HttpPaymentProvider};
//!
//! let provider = Arc::new(HttpPaymentProvider::new(token, DEFAULT_API_BASE, timeout)?);
//! let checkout = CheckoutService::new(store, Some(provider), CheckoutSettings::default());
//!
//! let session = checkout.create_checkout(&identity, Some(course_id)).await?;
//! // Redirect user to: session.init_point
//! ```

mod checkout;
mod enrollment;
mod error;
pub mod provider;
mod reconcile;
mod status;
pub mod webhook;

pub use checkout::{CheckoutService, CheckoutSession, CheckoutSettings, PreferenceBuilder};
pub use enrollment::{EnrollmentService, Grant};
pub use error::{PaymentError, Result};
pub use provider::{HttpPaymentProvider, MockPaymentProvider, PaymentProvider, ProviderPayment};
pub use reconcile::{ReconcileOutcome, Reconciler};
pub use status::{PurchaseSnapshot, StatusService};
pub use webhook::{Notification, Verification, WebhookVerifier};
