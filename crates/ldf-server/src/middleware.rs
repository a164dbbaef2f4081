//! Request-scoped layers: bearer-token authentication and the sliding-window
//! rate limiter, both applied via `axum::middleware::from_fn_with_state`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use ldf_access::{authenticate, rate_limit_key, RateLimitOutcome, TokenClaims};
use ldf_types::LdfError;

use crate::error::ApiError;
use crate::state::AppState;

/// Extracts and validates the bearer token, if present, inserting
/// [`TokenClaims`] into the request extensions for handlers to pull out.
/// Does not itself reject unauthenticated requests — routes that require a
/// caller call `require_claims` or the role guards in `ldf_access::policy`.
pub async fn auth_layer(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let subject_token = request
        .headers()
        .get("x-subject-token")
        .and_then(|v| v.to_str().ok());
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if subject_token.is_some() || authorization.is_some() {
        let claims = authenticate(state.token_validator.as_ref(), subject_token, authorization).await?;
        request.extensions_mut().insert(claims);
    }

    Ok(next.run(request).await)
}

/// Pulls the claims `auth_layer` attached, if any, into `TokenClaims`.
pub fn require_claims(request: &Request) -> Result<TokenClaims, ApiError> {
    request
        .extensions()
        .get::<TokenClaims>()
        .cloned()
        .ok_or_else(|| LdfError::unauthorized("missing bearer token").into())
}

/// Gates every request through the general-API sliding-window bucket,
/// keyed by authenticated user id when available, else by remote IP.
pub async fn rate_limit_layer(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = request.extensions().get::<TokenClaims>().map(|c| c.user_id);
    let key = rate_limit_key(user_id, addr.ip());

    match state.rate_limiters.api.check(&key) {
        RateLimitOutcome::Allowed => Ok(next.run(request).await),
        RateLimitOutcome::Denied { retry_after_secs } => {
            Err(LdfError::rate_limited(format!("rate limit exceeded, retry after {retry_after_secs}s")).into())
        }
    }
}
