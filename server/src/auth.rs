//! Caller identity and batch-trigger authentication.
//!
//! Authentication happens upstream; the proxy in front of this service
//! sets `X-User-Id` on every authenticated request.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use secrecy::ExposeSecret;

use crate::error::ApiError;
use crate::state::CronAuth;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| CurrentUser(v.to_string()))
            .ok_or(ApiError::Unauthorized)
    }
}

/// Accepts the shared bearer secret or the trusted scheduler header. With
/// neither configured every request is refused.
pub fn authorize_cron(auth: &CronAuth, headers: &HeaderMap) -> Result<(), ApiError> {
    if let Some(name) = auth.trusted_header.as_deref() {
        if headers.contains_key(name) {
            return Ok(());
        }
    }

    let Some(expected) = auth.secret.as_deref() else {
        return Err(ApiError::Unauthorized);
    };
    let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return Err(ApiError::Unauthorized);
    };
    let Some(token) = value.strip_prefix("Bearer ").map(str::trim) else {
        return Err(ApiError::Unauthorized);
    };
    let expected = expected.expose_secret().as_bytes();
    if token.is_empty() || !constant_time_eq(token.as_bytes(), expected) {
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}

/// Compares without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
