//! Authorization Policy
//!
//! One table maps every route to the access it requires. The HTTP layer looks
//! up the matched route here and nowhere else.

use crate::error::{CoreError, Result};
use crate::model::Role;
use crate::session::Identity;

/// Named endpoints of the service
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Health,
    CreateCheckout,
    EnrollFree,
    PurchaseStatus,
    SyncPurchase,
    PaymentWebhook,
}

/// Access requirement for an endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// No credentials
    Public,
    /// Authenticated by a provider signature, checked by the handler
    Signed,
    /// Any role holding a valid session
    Authenticated,
    /// One of the listed roles
    Roles(&'static [Role]),
}

/// A single policy entry
#[derive(Clone, Copy, Debug)]
pub struct Rule {
    pub endpoint: Endpoint,
    pub method: &'static str,
    pub path: &'static str,
    pub access: Access,
}

pub const POLICY: &[Rule] = &[
    Rule {
        endpoint: Endpoint::Health,
        method: "GET",
        path: "/health",
        access: Access::Public,
    },
    Rule {
        endpoint: Endpoint::CreateCheckout,
        method: "POST",
        path: "/api/checkout",
        access: Access::Authenticated,
    },
    Rule {
        endpoint: Endpoint::EnrollFree,
        method: "POST",
        path: "/api/enrollments",
        access: Access::Authenticated,
    },
    Rule {
        endpoint: Endpoint::PurchaseStatus,
        method: "GET",
        path: "/api/purchases/{id}/status",
        access: Access::Authenticated,
    },
    Rule {
        endpoint: Endpoint::SyncPurchase,
        method: "POST",
        path: "/api/admin/purchases/{id}/sync",
        access: Access::Roles(&[Role::Admin]),
    },
    Rule {
        endpoint: Endpoint::PaymentWebhook,
        method: "POST",
        path: "/webhook/payments",
        access: Access::Signed,
    },
];

/// Find the rule for a matched route
pub fn lookup(method: &str, path: &str) -> Option<&'static Rule> {
    POLICY
        .iter()
        .find(|rule| rule.method.eq_ignore_ascii_case(method) && rule.path == path)
}

/// Rule for a named endpoint
pub fn rule_for(endpoint: Endpoint) -> Option<&'static Rule> {
    POLICY.iter().find(|rule| rule.endpoint == endpoint)
}

impl Access {
    /// Whether the caller must present a session
    pub const fn requires_session(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Roles(_))
    }

    /// Evaluate this requirement for the (possibly anonymous) caller
    pub fn check(&self, identity: Option<&Identity>) -> Result<()> {
        match self {
            Self::Public | Self::Signed => Ok(()),
            Self::Authenticated => identity
                .map(|_| ())
                .ok_or_else(|| CoreError::Unauthenticated("session required".into())),
            Self::Roles(roles) => {
                let identity = identity
                    .ok_or_else(|| CoreError::Unauthenticated("session required".into()))?;
                if roles.contains(&identity.role) {
                    Ok(())
                } else {
                    Err(CoreError::Forbidden(format!(
                        "role '{}' may not access this endpoint",
                        identity.role
                    )))
                }
            }
        }
    }
}
