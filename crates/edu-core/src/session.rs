//! Request-scoped Sessions
//!
//! The identity backend issues opaque bearer tokens. Each request resolves its
//! token once, at the boundary, into a [`RequestContext`] that is handed to
//! the services explicitly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Role;

/// Opaque bearer token
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Parse an `Authorization` header value (`Bearer <token>`)
    pub fn from_authorization(header: &str) -> Option<Self> {
        let (scheme, token) = header.trim().split_once(' ')?;
        let token = token.trim();
        if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
            return None;
        }
        Some(Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens never end up in logs.
impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// Authenticated user and role
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

impl Identity {
    pub const fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Stored session row
#[derive(Clone, Debug)]
pub struct Session {
    pub token: SessionToken,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Everything a handler knows about the caller
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub identity: Identity,
    pub request_id: String,
}

impl RequestContext {
    pub fn new(identity: Identity, request_id: Option<&str>) -> Self {
        Self {
            identity,
            request_id: request_id
                .map_or_else(|| Uuid::new_v4().to_string(), ToString::to_string),
        }
    }

    pub const fn user_id(&self) -> Uuid {
        self.identity.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_parsing() {
        let token = SessionToken::from_authorization("Bearer abc123").unwrap();
        assert_eq!(token.as_str(), "abc123");

        let token = SessionToken::from_authorization("bearer   xyz ").unwrap();
        assert_eq!(token.as_str(), "xyz");

        assert!(SessionToken::from_authorization("Basic abc").is_none());
        assert!(SessionToken::from_authorization("Bearer").is_none());
        assert!(SessionToken::from_authorization("Bearer   ").is_none());
    }

    #[test]
    fn test_token_is_redacted_in_debug() {
        let token = SessionToken::from_string("secret-token");
        assert!(!format!("{token:?}").contains("secret"));
    }

    #[test]
    fn test_context_generates_request_id() {
        let identity = Identity::new(Uuid::new_v4(), Role::Student);
        let ctx = RequestContext::new(identity.clone(), None);
        assert!(!ctx.request_id.is_empty());

        let ctx = RequestContext::new(identity, Some("req-1"));
        assert_eq!(ctx.request_id, "req-1");
    }
}
