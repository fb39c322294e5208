//! Authorization Middleware
//!
//! Every request is matched against the policy table before it reaches a
//! handler. Routes missing from the table are refused.

use axum::{
    extract::{MatchedPath, Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use edu_core::{CoreError, RequestContext, SessionToken, policy};

use crate::error::ApiError;
use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn authorize(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| req.uri().path().to_string(), |p| p.as_str().to_string());

    let rule = policy::lookup(req.method().as_str(), &path).ok_or_else(|| {
        tracing::warn!(method = %req.method(), path = %path, "Route has no access rule");
        CoreError::Forbidden(format!("no access rule for {path}"))
    })?;

    if !rule.access.requires_session() {
        return Ok(next.run(req).await);
    }

    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(SessionToken::from_authorization);

    let identity = match token {
        Some(token) => state.store.resolve_session(&token).await?,
        None => None,
    };
    rule.access.check(identity.as_ref())?;
    let identity = identity.ok_or_else(|| CoreError::Unauthenticated("session required".into()))?;

    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    let ctx = RequestContext::new(identity, request_id.as_deref());

    tracing::debug!(
        endpoint = ?rule.endpoint,
        user_id = %ctx.user_id(),
        request_id = %ctx.request_id,
        "Request authorized"
    );

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}
