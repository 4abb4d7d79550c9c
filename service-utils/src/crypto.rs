//! Text decryption through the crypto service.

use async_trait::async_trait;
use thiserror::Error;
use tracing::instrument;

use crate::constants::TEXT_DECRYPT_ROUTE;
use crate::context::TrustContext;
use crate::error::RequestError;
use crate::http::HttpRequestBuilder;
use crate::model::{CryptoRequest, CryptoResponse};

/// Decryption failures.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Nothing to decrypt
    #[error("text is empty")]
    EmptyText,

    /// Call to the crypto service failed
    #[error(transparent)]
    Request(#[from] RequestError),
}

/// Decrypts values encrypted by the crypto service.
#[async_trait]
pub trait CryptoUtil: Send + Sync {
    /// Decrypt `encrypted_text`.
    async fn decipher(&self, ctx: &dyn TrustContext, encrypted_text: &str) -> Result<String, CryptoError>;
}

/// [`CryptoUtil`] over the crypto service HTTP API.
#[derive(Debug, Clone)]
pub struct CryptoClient {
    builder: HttpRequestBuilder,
    crypto_service_url: String,
}

impl CryptoClient {
    /// Create a client for the crypto service at `crypto_service_url`.
    #[must_use]
    pub fn new(builder: HttpRequestBuilder, crypto_service_url: impl Into<String>) -> Self {
        Self {
            builder,
            crypto_service_url: crypto_service_url.into(),
        }
    }
}

#[async_trait]
impl CryptoUtil for CryptoClient {
    #[instrument(skip_all)]
    async fn decipher(&self, ctx: &dyn TrustContext, encrypted_text: &str) -> Result<String, CryptoError> {
        if encrypted_text.is_empty() {
            return Err(CryptoError::EmptyText);
        }

        let url = format!("{}{TEXT_DECRYPT_ROUTE}", self.crypto_service_url);
        let mut response = CryptoResponse::default();
        self.builder
            .new_request()
            .with_context(ctx)
            .with_json_body(&CryptoRequest {
                encrypted_text: encrypted_text.to_string(),
            })
            .response_as(&mut response)
            .post(&url)
            .await?;
        Ok(response.decrypted_text)
    }
}
