//! Persistent Store
//!
//! Abstraction over the tables the checkout flow touches. Implement this for
//! each backend: in-memory for development and tests, PostgreSQL for real
//! deployments.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Course, Enrollment, Payment, Profile, Purchase, PurchaseStatus};
use crate::session::{Identity, SessionToken};

/// Result of inserting an enrollment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnrollmentInsert {
    Created,
    /// The (student, course) uniqueness constraint already held a row
    AlreadyExists,
}

/// Store trait (Strategy pattern)
#[async_trait]
pub trait Store: Send + Sync {
    /// Resolve a bearer token to the caller's identity. Expired or unknown
    /// tokens resolve to `None`.
    async fn resolve_session(&self, token: &SessionToken) -> Result<Option<Identity>>;

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>>;

    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>>;

    async fn insert_purchase(&self, purchase: &Purchase) -> Result<()>;

    async fn get_purchase(&self, id: Uuid) -> Result<Option<Purchase>>;

    /// Record the provider's preference id on a purchase
    async fn set_purchase_preference(&self, id: Uuid, preference_id: &str) -> Result<()>;

    async fn find_purchase_by_preference(&self, preference_id: &str) -> Result<Option<Purchase>>;

    /// Most recent purchase for the pair, used when only the external
    /// reference is known
    async fn find_latest_purchase(&self, user_id: Uuid, course_id: Uuid)
    -> Result<Option<Purchase>>;

    /// Move a pending purchase to `to`. Returns `false` and changes nothing
    /// when the purchase is no longer pending.
    async fn advance_purchase_status(&self, id: Uuid, to: PurchaseStatus) -> Result<bool>;

    /// Append a payment row; rows are never updated
    async fn insert_payment(&self, payment: &Payment) -> Result<()>;

    async fn list_payments(&self, purchase_id: Uuid) -> Result<Vec<Payment>>;

    async fn find_enrollment(&self, student_id: Uuid, course_id: Uuid)
    -> Result<Option<Enrollment>>;

    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<EnrollmentInsert>;

    /// Backend name for health output
    fn kind(&self) -> &'static str;
}
