//! Request extractors that resolve the caller from the session cookie
//!
//! They only look at request parts, so a refused caller is turned away
//! before any body is read.

use assist_core::{authorize, AccessDecision, Principal, Requirement};
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;
use std::sync::Arc;

use crate::gateway::GatewayState;
use crate::session::Session;
use crate::GatewayError;

/// The caller's live session, if any
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Option<Session>);

impl CurrentSession {
    pub fn principal(&self) -> Option<&Principal> {
        self.0.as_ref().map(|s| &s.principal)
    }
}

#[async_trait]
impl FromRequestParts<Arc<GatewayState>> for CurrentSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(session_of(parts, state)))
    }
}

fn session_of(parts: &Parts, state: &GatewayState) -> Option<Session> {
    state
        .signer
        .session_from_headers(&parts.headers)
        .and_then(|id| state.sessions.get_session(&id))
}

/// Any logged-in caller
#[derive(Debug, Clone)]
pub struct Authenticated(pub Principal);

/// A logged-in administrator
#[derive(Debug, Clone)]
pub struct Privileged(pub Principal);

fn require(
    parts: &Parts,
    state: &GatewayState,
    requirement: Requirement,
) -> Result<Principal, GatewayError> {
    let principal = session_of(parts, state).map(|s| s.principal);

    match authorize(principal.as_ref(), requirement) {
        AccessDecision::Allowed => principal.ok_or(GatewayError::Unauthenticated),
        AccessDecision::Unauthenticated => Err(GatewayError::Unauthenticated),
        AccessDecision::Unprivileged => {
            if let Some(p) = &principal {
                tracing::warn!(user = %p.username, path = %parts.uri.path(), "Privileged route refused");
            }
            Err(GatewayError::Forbidden)
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<GatewayState>> for Authenticated {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState>,
    ) -> Result<Self, Self::Rejection> {
        require(parts, state, Requirement::Authenticated).map(Self)
    }
}

#[async_trait]
impl FromRequestParts<Arc<GatewayState>> for Privileged {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState>,
    ) -> Result<Self, Self::Rejection> {
        require(parts, state, Requirement::Privileged).map(Self)
    }
}
