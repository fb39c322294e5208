//! Domain Models
//!
//! Records read and written by the checkout flow. Uses `rust_decimal` for all
//! monetary values.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Platform role stored on a user's profile
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl Role {
    pub const ALL: &'static [Self] = &[Self::Student, Self::Instructor, Self::Admin];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Instructor => "instructor",
            Self::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "instructor" => Ok(Self::Instructor),
            "admin" => Ok(Self::Admin),
            other => Err(CoreError::Validation(format!("unknown role '{other}'"))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A course in the catalog
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub is_free: bool,
    pub instructor_id: Option<Uuid>,
}

impl Course {
    /// A course is sold through checkout only when it is flagged paid and
    /// has a positive price.
    pub fn is_paid(&self) -> bool {
        !self.is_free && self.price > Decimal::ZERO
    }
}

/// A user's profile
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    /// Tax identifier (CPF) passed to the payment provider when present
    pub tax_id: Option<String>,
    pub role: Role,
}

/// Local status of a purchase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Approved,
    Rejected,
}

impl PurchaseStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(CoreError::Validation(format!("unknown purchase status '{other}'"))),
        }
    }

    /// Next status when moving to `to`, or `None` if the move is not allowed.
    ///
    /// Only `pending -> approved` and `pending -> rejected` exist.
    pub const fn transition(self, to: Self) -> Option<Self> {
        match (self, to) {
            (Self::Pending, Self::Approved | Self::Rejected) => Some(to),
            _ => None,
        }
    }
}

impl std::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque correlation value sent to the provider: `<course id>:<user id>`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExternalReference {
    pub course_id: Uuid,
    pub user_id: Uuid,
}

impl ExternalReference {
    pub const fn new(course_id: Uuid, user_id: Uuid) -> Self {
        Self { course_id, user_id }
    }
}

impl std::fmt::Display for ExternalReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.course_id, self.user_id)
    }
}

impl std::str::FromStr for ExternalReference {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let (course, user) = s
            .split_once(':')
            .ok_or_else(|| CoreError::Validation(format!("malformed external reference '{s}'")))?;
        let parse = |v: &str| {
            Uuid::parse_str(v)
                .map_err(|_| CoreError::Validation(format!("malformed external reference '{s}'")))
        };
        Ok(Self::new(parse(course)?, parse(user)?))
    }
}

/// Local record of a payment attempt
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: PurchaseStatus,
    pub preference_id: Option<String>,
    pub external_reference: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Purchase {
    /// New pending purchase for `course` by `user_id`
    pub fn pending(user_id: Uuid, course: &Course, currency: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            course_id: course.id,
            amount: course.price,
            currency: currency.into(),
            status: PurchaseStatus::Pending,
            preference_id: None,
            external_reference: ExternalReference::new(course.id, user_id).to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One provider-side payment event, appended per notification
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub provider_payment_id: String,
    /// Status exactly as reported by the provider
    pub status: String,
    pub status_detail: Option<String>,
    pub amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        purchase_id: Uuid,
        provider_payment_id: impl Into<String>,
        status: impl Into<String>,
        status_detail: Option<String>,
        amount: Option<Decimal>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            purchase_id,
            provider_payment_id: provider_payment_id.into(),
            status: status.into(),
            status_detail,
            amount,
            created_at: Utc::now(),
        }
    }
}

/// Access-granting link between a student and a course
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub enrolled_at: DateTime<Utc>,
    /// Completion percentage, 0 on creation
    pub progress: i32,
}

impl Enrollment {
    pub fn new(student_id: Uuid, course_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id,
            course_id,
            enrolled_at: Utc::now(),
            progress: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn course(price: Decimal, is_free: bool) -> Course {
        Course {
            id: Uuid::new_v4(),
            title: "Rust for Backend Engineers".into(),
            description: None,
            price,
            is_free,
            instructor_id: None,
        }
    }

    #[test]
    fn test_paid_course_requires_price_and_flag() {
        assert!(course(dec!(199.90), false).is_paid());
        assert!(!course(dec!(0), false).is_paid());
        assert!(!course(dec!(199.90), true).is_paid());
    }

    #[test]
    fn test_purchase_status_never_regresses() {
        use PurchaseStatus::*;

        assert_eq!(Pending.transition(Approved), Some(Approved));
        assert_eq!(Pending.transition(Rejected), Some(Rejected));
        assert_eq!(Approved.transition(Rejected), None);
        assert_eq!(Approved.transition(Pending), None);
        assert_eq!(Rejected.transition(Approved), None);
        assert_eq!(Pending.transition(Pending), None);
    }

    #[test]
    fn test_external_reference_parse() {
        let reference = ExternalReference::new(Uuid::new_v4(), Uuid::new_v4());
        let parsed: ExternalReference = reference.to_string().parse().unwrap();
        assert_eq!(parsed, reference);

        assert!("not-a-reference".parse::<ExternalReference>().is_err());
        assert!("abc:def".parse::<ExternalReference>().is_err());
    }

    #[test]
    fn test_pending_purchase_copies_course_price() {
        let c = course(dec!(199.90), false);
        let user = Uuid::new_v4();
        let purchase = Purchase::pending(user, &c, "BRL");

        assert_eq!(purchase.status, PurchaseStatus::Pending);
        assert_eq!(purchase.amount, dec!(199.90));
        assert_eq!(purchase.external_reference, format!("{}:{}", c.id, user));
        assert!(purchase.preference_id.is_none());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("Admin").unwrap(), Role::Admin);
        assert!(Role::parse("root").is_err());
    }
}
