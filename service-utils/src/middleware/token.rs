//! Layer decoding the caller's encrypted id token.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::Json;
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use http::StatusCode;
use tower::{Layer, Service};

use crate::context::{FrameworkContext, access_token, encrypted_id_token};
use crate::error::ApiError;
use crate::logging::get_logger;
use crate::oauth::OauthUtils;

const INVALID_ACCESS_TOKEN_MESSAGE: &str = "Invalid access token";
const DECODE_FAILED_MESSAGE: &str = "Unable to decode id token";

fn respond_with_error(status: StatusCode, message: &str) -> Response {
    (status, Json(ApiError::new(message, message))).into_response()
}

/// Requires both an access token and an encrypted id token, and stores the
/// decoded [`IdToken`](crate::model::IdToken) in the request extensions.
#[derive(Clone)]
pub struct TokenLayer {
    oauth_utils: Arc<dyn OauthUtils>,
}

impl TokenLayer {
    /// Decode id tokens through `oauth_utils`.
    #[must_use]
    pub fn new(oauth_utils: Arc<dyn OauthUtils>) -> Self {
        Self { oauth_utils }
    }
}

impl<S> Layer<S> for TokenLayer {
    type Service = TokenMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TokenMiddleware {
            inner,
            oauth_utils: self.oauth_utils.clone(),
        }
    }
}

/// Service produced by [`TokenLayer`].
#[derive(Clone)]
pub struct TokenMiddleware<S> {
    inner: S,
    oauth_utils: Arc<dyn OauthUtils>,
}

impl<S> Service<Request> for TokenMiddleware<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let oauth_utils = self.oauth_utils.clone();

        Box::pin(async move {
            let ctx = FrameworkContext::from_request(&req);
            let logger = get_logger(Some(&ctx));
            logger.info("started decryption");

            if access_token(&ctx).is_err() || encrypted_id_token(&ctx).is_err() {
                logger.error("access or id token not available");
                return Ok(respond_with_error(StatusCode::UNAUTHORIZED, INVALID_ACCESS_TOKEN_MESSAGE));
            }

            match oauth_utils.decode_encrypted_id_token(&ctx).await {
                Ok(id_token) => {
                    logger.info("decryption successful");
                    req.extensions_mut().insert(id_token);
                    inner.call(req).await
                }
                Err(err) => {
                    logger.with_error(&err).error("unable to decode id token");
                    Ok(respond_with_error(StatusCode::INTERNAL_SERVER_ERROR, DECODE_FAILED_MESSAGE))
                }
            }
        })
    }
}
