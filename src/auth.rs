//! Shared-token gate for destructive operations.
//!
//! Handlers that take [`RequireAdmin`] only run when the request carries
//! `Authorization: Bearer <ADMIN_TOKEN>`.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::{error::AppError, state::AppState};

/// Extractor proving the caller presented the admin token.
pub struct RequireAdmin;

/// Compare a presented token against the configured one in constant time.
pub fn token_matches(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.admin_token.as_deref() else {
            warn!("Rejected admin request: ADMIN_TOKEN is not configured");
            return Err(AppError::Unauthorized("Admin access is disabled".into()));
        };

        match bearer_token(parts) {
            Some(presented) if token_matches(expected, presented) => Ok(RequireAdmin),
            Some(_) => {
                warn!("Rejected admin request with invalid token");
                Err(AppError::Unauthorized("Invalid admin token".into()))
            }
            None => {
                warn!("Rejected admin request without credentials");
                Err(AppError::Unauthorized("Missing admin token".into()))
            }
        }
    }
}
