//! Access token introspection for protected routes.
//!
//! For every request whose path is protected, [`IntrospectionLayer`] asks the
//! OAuth2 server whether the caller's access token is active. When id token
//! decryption is enabled and the request carries an encrypted id token, the
//! token is also decrypted and the resulting [`IdToken`] is stored in the
//! request extensions for handlers to read.

use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use axum::Json;
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use http::StatusCode;
use http::header::{ACCEPT, CONTENT_TYPE};
use thiserror::Error;
use tower::{Layer, Service};
use tracing::{debug, error, info, instrument};

use crate::constants::{ERR_INTERNAL_SERVER_ERROR, ERR_INVALID_ACCESS_TOKEN, ERR_INVALID_ID_TOKEN};
use crate::context::{FrameworkContext, TrustContext, access_token, encrypted_id_token};
use crate::error::{ApiError, RequestError};
use crate::http::{HttpConfig, HttpRequestBuilder};
use crate::logging::{ServiceLogger, get_logger};
use crate::model::{IdToken, IntrospectionResponse};
use crate::oauth::OauthUtils;

const INTROSPECTION_ROUTE: &str = "/oauth2/introspect";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";
const DECRYPTION_FAILED_MESSAGE: &str = "error in token decryption";

/// Decides which request paths require a valid access token.
#[cfg_attr(test, mockall::automock)]
pub trait ProtectedUrlService: Send + Sync {
    /// Whether `path` requires introspection.
    fn is_protected(&self, path: &str) -> bool;
}

impl<F> ProtectedUrlService for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_protected(&self, path: &str) -> bool {
        self(path)
    }
}

/// Introspection call failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrospectionError {
    /// The OAuth2 server failed with a 5xx status
    #[error("Internal error in Hydra")]
    HydraInternalServerError,

    /// The token is inactive or the call was rejected
    #[error("Invalid access token / not present")]
    AuthenticationError,
}

/// Error answered by the middleware instead of calling the route.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{status}: {body}")]
pub struct OAuthMiddlewareError {
    /// Response status
    pub status: StatusCode,
    /// Response body
    pub body: ApiError,
}

impl OAuthMiddlewareError {
    /// Missing, empty or inactive access token.
    #[must_use]
    pub fn invalid_access_token() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            body: ApiError::new(ERR_INVALID_ACCESS_TOKEN, "Invalid access token / not present"),
        }
    }

    /// Id token that could not be decrypted or does not match the access token.
    #[must_use]
    pub fn invalid_id_token() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            body: ApiError::new(ERR_INVALID_ID_TOKEN, "Id token invalid"),
        }
    }

    /// Failure of a backing service.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ApiError::new(ERR_INTERNAL_SERVER_ERROR, message),
        }
    }
}

/// Turns middleware errors into responses.
pub trait ResponseInterceptor: Send + Sync {
    /// Response answered for `err`.
    fn handle_service_error(&self, logger: &ServiceLogger, err: &OAuthMiddlewareError) -> Response;
}

/// Default [`ResponseInterceptor`].
///
/// Server errors are answered with an empty body. Other errors carry
/// `{"error", "errorCode", "errorMessage"}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorResponseInterceptor;

impl ResponseInterceptor for ErrorResponseInterceptor {
    fn handle_service_error(&self, logger: &ServiceLogger, err: &OAuthMiddlewareError) -> Response {
        logger.clone().with_error(err).error("service error");
        if err.status.is_server_error() {
            return err.status.into_response();
        }
        let body = serde_json::json!({
            "error": err.body.error_message,
            "errorCode": err.body.error_code,
            "errorMessage": err.body.error_message,
        });
        (err.status, Json(body)).into_response()
    }
}

/// Token introspection against an OAuth2 server.
#[async_trait]
pub trait IntrospectionService: Send + Sync {
    /// Introspect `access_token`, succeeding only for an active token.
    async fn introspect(
        &self,
        ctx: &dyn TrustContext,
        access_token: &str,
    ) -> Result<IntrospectionResponse, IntrospectionError>;
}

/// [`IntrospectionService`] over the Hydra admin API.
#[derive(Debug, Clone)]
pub struct IntrospectionClient {
    builder: HttpRequestBuilder,
    hydra_admin_url: String,
}

impl IntrospectionClient {
    /// Client for the admin API at `hydra_admin_url`.
    #[must_use]
    pub fn new(builder: HttpRequestBuilder, hydra_admin_url: impl Into<String>) -> Self {
        Self {
            builder,
            hydra_admin_url: hydra_admin_url.into(),
        }
    }

    /// Introspection endpoint URL.
    #[must_use]
    pub fn introspection_url(&self) -> String {
        format!("{}{INTROSPECTION_ROUTE}", self.hydra_admin_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl IntrospectionService for IntrospectionClient {
    #[instrument(skip_all)]
    async fn introspect(
        &self,
        ctx: &dyn TrustContext,
        access_token: &str,
    ) -> Result<IntrospectionResponse, IntrospectionError> {
        let url = self.introspection_url();
        info!(url = %url, "making introspect call");
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("token", access_token)
            .finish();

        let mut response = IntrospectionResponse::default();
        let result = self
            .builder
            .new_request()
            .with_context(ctx)
            .add_header(CONTENT_TYPE.as_str(), FORM_CONTENT_TYPE)
            .add_header(ACCEPT.as_str(), JSON_CONTENT_TYPE)
            .with_request_body_bytes(form.into_bytes())
            .request_trace_hook(|_| Ok("token=<redacted>".to_string()))
            .response_as(&mut response)
            .post(&url)
            .await;

        match result {
            Err(RequestError::Http(err)) if (500..=505).contains(&err.status_code) => {
                error!(status = err.status_code, "introspection server error");
                Err(IntrospectionError::HydraInternalServerError)
            }
            Err(err) => {
                error!(error = %err, "introspection call failed");
                Err(IntrospectionError::AuthenticationError)
            }
            Ok(()) if response.active => {
                info!("access token is active");
                Ok(response)
            }
            Ok(()) => {
                error!(client_id = ?response.client_id, "access token is not active");
                Err(IntrospectionError::AuthenticationError)
            }
        }
    }
}

/// Token checks run by [`IntrospectionLayer`].
#[async_trait]
pub trait TokenService: Send + Sync {
    /// Check that the context carries an active access token.
    async fn validate(&self, ctx: &dyn TrustContext) -> Result<(), OAuthMiddlewareError>;

    /// Decrypt the context's encrypted id token.
    async fn decrypt(&self, ctx: &dyn TrustContext) -> Result<IdToken, OAuthMiddlewareError>;
}

/// [`TokenService`] backed by introspection and, optionally, [`OauthUtils`].
#[derive(Clone)]
pub struct IntrospectionTokenService {
    introspection: Arc<dyn IntrospectionService>,
    oauth_utils: Option<Arc<dyn OauthUtils>>,
}

impl IntrospectionTokenService {
    /// Create the service.
    #[must_use]
    pub fn new(introspection: Arc<dyn IntrospectionService>, oauth_utils: Option<Arc<dyn OauthUtils>>) -> Self {
        Self {
            introspection,
            oauth_utils,
        }
    }
}

#[async_trait]
impl TokenService for IntrospectionTokenService {
    async fn validate(&self, ctx: &dyn TrustContext) -> Result<(), OAuthMiddlewareError> {
        let logger = get_logger(Some(ctx));
        let token = access_token(ctx).map_err(|err| {
            logger.clone().with_error(&err).error("could not fetch access token");
            OAuthMiddlewareError::invalid_access_token()
        })?;

        match self.introspection.introspect(ctx, &token).await {
            Ok(_) => Ok(()),
            Err(err @ IntrospectionError::HydraInternalServerError) => {
                logger.error("server error while introspecting token");
                Err(OAuthMiddlewareError::internal(err.to_string()))
            }
            Err(IntrospectionError::AuthenticationError) => {
                logger.error("access token is invalid");
                Err(OAuthMiddlewareError::invalid_access_token())
            }
        }
    }

    async fn decrypt(&self, ctx: &dyn TrustContext) -> Result<IdToken, OAuthMiddlewareError> {
        let Some(oauth_utils) = &self.oauth_utils else {
            return Err(OAuthMiddlewareError::internal(DECRYPTION_FAILED_MESSAGE));
        };
        oauth_utils.decode_encrypted_id_token(ctx).await.map_err(|err| {
            get_logger(Some(ctx)).with_error(&err).error("id token decryption error");
            if err.is_internal() {
                OAuthMiddlewareError::internal(DECRYPTION_FAILED_MESSAGE)
            } else {
                OAuthMiddlewareError::invalid_id_token()
            }
        })
    }
}

/// Layer rejecting requests to protected paths without an active access token.
#[derive(Clone)]
pub struct IntrospectionLayer {
    protected: Arc<dyn ProtectedUrlService>,
    tokens: Arc<dyn TokenService>,
    interceptor: Arc<dyn ResponseInterceptor>,
    skip_token_decrypt: bool,
}

impl IntrospectionLayer {
    /// Introspect against `hydra_admin_url` without id token decryption.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    pub fn new(
        protected: Arc<dyn ProtectedUrlService>,
        hydra_admin_url: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        Self::with_decryption(protected, hydra_admin_url, None)
    }

    /// Introspect against `hydra_admin_url`, decrypting id tokens through
    /// `oauth_utils` when given.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    pub fn with_decryption(
        protected: Arc<dyn ProtectedUrlService>,
        hydra_admin_url: impl Into<String>,
        oauth_utils: Option<Arc<dyn OauthUtils>>,
    ) -> Result<Self, reqwest::Error> {
        let builder = HttpRequestBuilder::from_config(&HttpConfig::default())?;
        let introspection = Arc::new(IntrospectionClient::new(builder, hydra_admin_url));
        let skip_token_decrypt = oauth_utils.is_none();
        let tokens = Arc::new(IntrospectionTokenService::new(introspection, oauth_utils));
        Ok(Self::from_services(protected, tokens, skip_token_decrypt))
    }

    /// Assemble from custom services.
    #[must_use]
    pub fn from_services(
        protected: Arc<dyn ProtectedUrlService>,
        tokens: Arc<dyn TokenService>,
        skip_token_decrypt: bool,
    ) -> Self {
        Self {
            protected,
            tokens,
            interceptor: Arc::new(ErrorResponseInterceptor),
            skip_token_decrypt,
        }
    }

    /// Answer errors through `interceptor`.
    #[must_use]
    pub fn with_interceptor(mut self, interceptor: Arc<dyn ResponseInterceptor>) -> Self {
        self.interceptor = interceptor;
        self
    }

    /// Whether id token decryption is disabled.
    #[must_use]
    pub const fn is_skip_token_decrypt(&self) -> bool {
        self.skip_token_decrypt
    }
}

impl<S> Layer<S> for IntrospectionLayer {
    type Service = IntrospectionMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IntrospectionMiddleware {
            inner,
            layer: self.clone(),
        }
    }
}

/// Service produced by [`IntrospectionLayer`].
#[derive(Clone)]
pub struct IntrospectionMiddleware<S> {
    inner: S,
    layer: IntrospectionLayer,
}

impl<S> Service<Request> for IntrospectionMiddleware<S>
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

        let path = req.uri().path().to_string();
        if !self.layer.protected.is_protected(&path) {
            debug!(path = %path, "url is not protected");
            return Box::pin(inner.call(req));
        }

        let layer = self.layer.clone();
        Box::pin(async move {
            let ctx = FrameworkContext::from_request(&req);
            let logger = get_logger(Some(&ctx));
            logger.debug(format!("url is protected: {path}"));

            if let Err(err) = layer.tokens.validate(&ctx).await {
                return Ok(layer.interceptor.handle_service_error(&logger, &err));
            }

            if !layer.skip_token_decrypt && encrypted_id_token(&ctx).is_ok() {
                match layer.tokens.decrypt(&ctx).await {
                    Ok(id_token) => {
                        req.extensions_mut().insert(id_token);
                    }
                    Err(err) => return Ok(layer.interceptor.handle_service_error(&logger, &err)),
                }
            } else {
                logger.debug("skipping id token decryption");
            }

            inner.call(req).await
        })
    }
}
