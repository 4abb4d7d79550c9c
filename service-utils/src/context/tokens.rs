//! Extraction of access and identity tokens from a [`TrustContext`].

use thiserror::Error;

use super::TrustContext;
use crate::constants::{
    AUTHORIZATION_HEADER_KEY, CONTEXT_ACCESS_TOKEN, CONTEXT_ENC_ID_TOKEN, COOKIE_ACCESS_TOKEN,
    COOKIE_ENC_ID_TOKEN, ENC_ID_TOKEN_HEADER_KEY, TRACING_SESSION_HEADER_KEY,
};

const BEARER_PREFIX: &str = "Bearer";

/// Token could not be found in the context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenExtractionError {
    /// No usable access token
    #[error("invalid bearer/cookie header")]
    InvalidAccessToken,

    /// No encrypted id token
    #[error("invalid enc-id-token header/cookie")]
    InvalidEncIdToken,
}

/// Access token of the current request.
///
/// Looks at `Authorization: Bearer <token>`, then the access token cookie,
/// then the plain-context attribute. A malformed header is skipped rather
/// than rejected so a valid cookie still authenticates the request.
///
/// # Errors
///
/// Returns [`TokenExtractionError::InvalidAccessToken`] when no source holds
/// a token.
pub fn access_token(ctx: &dyn TrustContext) -> Result<String, TokenExtractionError> {
    ctx.header(AUTHORIZATION_HEADER_KEY)
        .and_then(parse_bearer)
        .or_else(|| ctx.cookie(COOKIE_ACCESS_TOKEN))
        .or_else(|| ctx.attribute(CONTEXT_ACCESS_TOKEN))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or(TokenExtractionError::InvalidAccessToken)
}

/// Encrypted id token of the current request.
///
/// # Errors
///
/// Returns [`TokenExtractionError::InvalidEncIdToken`] when neither the
/// header, the cookie nor the attribute carries one.
pub fn encrypted_id_token(ctx: &dyn TrustContext) -> Result<String, TokenExtractionError> {
    ctx.header(ENC_ID_TOKEN_HEADER_KEY)
        .or_else(|| ctx.cookie(COOKIE_ENC_ID_TOKEN))
        .or_else(|| ctx.attribute(CONTEXT_ENC_ID_TOKEN))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or(TokenExtractionError::InvalidEncIdToken)
}

/// Session tracing id of the current request, if any.
#[must_use]
pub fn session_tracing_id(ctx: &dyn TrustContext) -> Option<String> {
    ctx.header(TRACING_SESSION_HEADER_KEY)
        .or_else(|| ctx.attribute(TRACING_SESSION_HEADER_KEY))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// `Bearer <token>` header value.
#[must_use]
pub fn form_bearer_authorization_header(token: &str) -> String {
    format!("{BEARER_PREFIX} {token}")
}

fn parse_bearer(value: &str) -> Option<&str> {
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(BEARER_PREFIX), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}
