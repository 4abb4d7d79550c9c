//! Id token helpers backed by the crypto service.
//!
//! Encrypted id tokens travel between services as opaque cookies. The crypto
//! service turns them back into a JWT, which is decoded here and checked
//! against the caller's access token through its `at_hash` claim.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{DecodingKey, Validation, decode};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::constants::{
    COOKIE_ENC_ID_TOKEN, COOKIE_ID_TOKEN, ERR_UNAUTHORIZED, TOKEN_DECRYPT_ROUTE,
    TOKEN_ENCRYPT_ROUTE,
};
use crate::context::{TrustContext, access_token, encrypted_id_token};
use crate::error::ApiError;
use crate::http::{Cookie, HttpRequestBuilder, find_cookie};
use crate::model::IdToken;

/// Id token handling failures.
#[derive(Error, Debug)]
pub enum TokenError {
    /// Token is not made of three segments
    #[error("invalid token format")]
    InvalidFormat,

    /// Payload could not be decoded
    #[error("id token decode failed: {0}")]
    Decode(#[from] jsonwebtoken::errors::Error),

    /// No encrypted id token in the context
    #[error("no enc_id_token present")]
    MissingEncIdToken,

    /// No access token in the context
    #[error("no access token present")]
    MissingAccessToken,

    /// Nothing to encrypt
    #[error("no id_token present")]
    MissingIdToken,

    /// Expected cookie missing from the crypto service response
    #[error("cookie not found")]
    CookieNotFound,

    /// Decoded id token carries no claims
    #[error("id_token not found")]
    IdTokenNotFound,

    /// Crypto service call failed while decrypting
    #[error("internal server error")]
    InternalServerError,

    /// Crypto service call failed while encrypting
    #[error("something went wrong")]
    EncryptionFailed,

    /// Id token was not issued with the presented access token
    #[error(transparent)]
    Unauthorized(ApiError),
}

impl TokenError {
    /// Whether the failure lies with a backing service rather than the token.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::InternalServerError | Self::EncryptionFailed)
    }
}

/// Id token operations used by the token middlewares.
#[async_trait]
pub trait OauthUtils: Send + Sync {
    /// Decrypt the context's encrypted id token and check it belongs to the
    /// context's access token.
    async fn decode_encrypted_id_token(&self, ctx: &dyn TrustContext) -> Result<IdToken, TokenError>;

    /// Encrypt `id_token`, returning the encrypted form.
    async fn encrypt_id_token(&self, ctx: &dyn TrustContext, id_token: &str) -> Result<String, TokenError>;

    /// Decode the claims of a JWT without verifying its signature.
    fn decode_id_token_from_jwt(&self, jwt: &str) -> Result<IdToken, TokenError> {
        decode_id_token_from_jwt(jwt)
    }
}

/// Decode the claims of a JWT without verifying its signature.
///
/// Signatures are checked by the issuer during introspection; this only reads
/// the payload.
///
/// # Errors
///
/// [`TokenError::InvalidFormat`] unless the token has three segments,
/// [`TokenError::Decode`] when the header or payload is not valid.
pub fn decode_id_token_from_jwt(jwt: &str) -> Result<IdToken, TokenError> {
    if jwt.split('.').count() != 3 {
        return Err(TokenError::InvalidFormat);
    }
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<IdToken>(jwt, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}

/// `at_hash` value for `access_token`: the base64url left half of its SHA-256.
#[must_use]
pub fn access_token_hash(access_token: &str) -> String {
    let digest = Sha256::digest(access_token.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
}

/// Check that `id_token` was issued together with `access_token`.
///
/// # Errors
///
/// [`TokenError::Unauthorized`] when the hashes differ.
pub fn ensure_associated(access_token: &str, id_token: IdToken) -> Result<IdToken, TokenError> {
    let expected = access_token_hash(access_token);
    if bool::from(expected.as_bytes().ct_eq(id_token.access_token_hash.as_bytes())) {
        Ok(id_token)
    } else {
        Err(TokenError::Unauthorized(ApiError::new(
            ERR_UNAUTHORIZED,
            "ID token not associated with Access token",
        )))
    }
}

/// [`OauthUtils`] over the crypto service.
#[derive(Debug, Clone)]
pub struct OauthTokenClient {
    builder: HttpRequestBuilder,
    crypto_service_url: String,
}

impl OauthTokenClient {
    /// Create a client for the crypto service at `crypto_service_url`.
    #[must_use]
    pub fn new(builder: HttpRequestBuilder, crypto_service_url: impl Into<String>) -> Self {
        Self {
            builder,
            crypto_service_url: crypto_service_url.into(),
        }
    }

    fn extract_id_token(cookies: &[Cookie]) -> Result<IdToken, TokenError> {
        let cookie = find_cookie(cookies, COOKIE_ID_TOKEN).ok_or(TokenError::CookieNotFound)?;
        let token = decode_id_token_from_jwt(&cookie.value)?;
        if token.is_empty() {
            return Err(TokenError::IdTokenNotFound);
        }
        Ok(token)
    }
}

#[async_trait]
impl OauthUtils for OauthTokenClient {
    #[instrument(skip_all)]
    async fn decode_encrypted_id_token(&self, ctx: &dyn TrustContext) -> Result<IdToken, TokenError> {
        let jwe = encrypted_id_token(ctx).map_err(|_| TokenError::MissingEncIdToken)?;
        let access = access_token(ctx).map_err(|_| TokenError::MissingAccessToken)?;

        let url = format!("{}{TOKEN_DECRYPT_ROUTE}", self.crypto_service_url);
        let mut body = String::new();
        let mut cookies = Vec::new();
        let result = self
            .builder
            .new_request()
            .with_context(ctx)
            .add_cookie(Cookie::new(COOKIE_ENC_ID_TOKEN, jwe))
            .response_as(&mut body)
            .response_cookies_as(&mut cookies)
            .get(&url)
            .await;
        if let Err(err) = result {
            error!(error = %err, "id token decryption call failed");
            return Err(TokenError::InternalServerError);
        }

        let id_token = Self::extract_id_token(&cookies)?;
        debug!("id token decrypted");
        ensure_associated(&access, id_token)
    }

    #[instrument(skip_all)]
    async fn encrypt_id_token(&self, ctx: &dyn TrustContext, id_token: &str) -> Result<String, TokenError> {
        if id_token.is_empty() {
            return Err(TokenError::MissingIdToken);
        }

        let url = format!("{}{TOKEN_ENCRYPT_ROUTE}", self.crypto_service_url);
        let mut body = String::new();
        let mut cookies = Vec::new();
        self.builder
            .new_request()
            .with_context(ctx)
            .add_cookie(Cookie::new(COOKIE_ID_TOKEN, id_token))
            .response_as(&mut body)
            .response_cookies_as(&mut cookies)
            .get(&url)
            .await
            .map_err(|err| {
                error!(error = %err, "id token encryption call failed");
                TokenError::EncryptionFailed
            })?;

        find_cookie(&cookies, COOKIE_ENC_ID_TOKEN)
            .map(|cookie| cookie.value.clone())
            .ok_or(TokenError::CookieNotFound)
    }
}
