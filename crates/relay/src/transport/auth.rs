// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::RelayError;
use crate::state::RelayState;
use crate::store::{ValidatedToken, TOKEN_PREFIX};

/// Extract the bearer token from HTTP headers.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
}

/// Validate a plaintext token against the store. Every failure mode is
/// surfaced identically as `Unauthorized` so callers cannot probe which
/// tokens exist; logs carry the distinction.
pub async fn authenticate(
    state: &RelayState,
    plaintext: &str,
) -> Result<ValidatedToken, RelayError> {
    if !plaintext.starts_with(TOKEN_PREFIX) {
        tracing::debug!("rejected token with malformed prefix");
        return Err(RelayError::Unauthorized);
    }
    match state.store.validate(plaintext).await {
        Ok(Some(token)) => Ok(token),
        Ok(None) => Err(RelayError::Unauthorized),
        Err(e) => {
            tracing::error!(err = %e, "token store lookup failed");
            Err(RelayError::Internal)
        }
    }
}

/// Apply the per-token rate limit.
pub fn check_rate_limit(state: &RelayState, token: &ValidatedToken) -> Result<(), RelayError> {
    let decision = state.limiter.allow(token.id, token.rpm_limit);
    if decision.allowed {
        Ok(())
    } else {
        tracing::debug!(token_id = token.id, "rate limit exceeded");
        Err(RelayError::RateLimited { retry_after_secs: decision.retry_after_secs })
    }
}

/// Axum middleware that enforces bearer authentication and rate limiting
/// for the REST surface, attaching the validated token as a request
/// extension.
///
/// Exempt: health, screenshot serving, and the socket upgrade (`/ws`
/// authenticates in its own handler, where the token may arrive as a
/// query parameter).
pub async fn auth_layer(
    State(state): State<Arc<RelayState>>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let path = req.uri().path();
    if path == "/api/v1/health" || path.starts_with("/api/v1/screenshots/") || path == "/ws" {
        return next.run(req).await;
    }

    let Some(plaintext) = bearer_token(req.headers()).map(ToOwned::to_owned) else {
        return RelayError::Unauthorized.into_response();
    };
    let token = match authenticate(&state, &plaintext).await {
        Ok(token) => token,
        Err(e) => return e.into_response(),
    };
    if let Err(e) = check_rate_limit(&state, &token) {
        return e.into_response();
    }

    req.extensions_mut().insert(token);
    next.run(req).await
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
