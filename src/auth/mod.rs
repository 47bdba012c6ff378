//! Identification of the local user behind an inbound request.
//!
//! The host's identity layer hands the browser a bearer token that is the
//! partner-side user id. This module only parses it; whether the user exists
//! is decided by the user store.
//!
//! The token is not verified here: whoever sends `Bearer <id>` acts as that
//! user. The marketplace endpoints must only be reachable behind the host's
//! identity layer, which authenticates the caller and sets the header.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use thiserror::Error;

#[cfg(test)]
mod tests;

/// Bearer token parsing failures
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TokenError {
    #[error("Authorization header not provided")]
    Missing,
    #[error("Authorization header is not a Bearer token")]
    InvalidFormat,
    #[error("Bearer token is empty")]
    Empty,
}

/// Extract the user id from `Authorization: Bearer <user id>`.
///
/// The scheme is matched case-insensitively and surrounding whitespace of the
/// token is ignored.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, TokenError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(TokenError::Missing)?
        .to_str()
        .map_err(|_| TokenError::InvalidFormat)?;

    parse_bearer_token(value)
}

fn parse_bearer_token(value: &str) -> Result<String, TokenError> {
    let (scheme, token) = value.split_once(' ').ok_or(TokenError::InvalidFormat)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(TokenError::InvalidFormat);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(TokenError::Empty);
    }

    Ok(token.to_string())
}
