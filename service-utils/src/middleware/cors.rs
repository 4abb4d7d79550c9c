//! Origin check for cross-site requests.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, ready};
use http::header::{HOST, ORIGIN};
use http::{Request, Response, StatusCode};
use serde::Deserialize;
use tower::{Layer, Service};
use tracing::{error, info};

/// Allowed origins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CorsConfig {
    /// Origins accepted besides the request host itself
    pub allowed_origins: Vec<String>,
}

/// Answers `406 Not Acceptable` to requests whose `Origin` neither contains
/// the request host nor is in the allowed list.
#[derive(Debug, Clone, Default)]
pub struct CorsLayer {
    config: Arc<CorsConfig>,
}

impl CorsLayer {
    /// Create the layer.
    #[must_use]
    pub fn new(config: CorsConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for CorsLayer {
    type Service = CorsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorsService {
            inner,
            config: self.config.clone(),
        }
    }
}

/// Service produced by [`CorsLayer`].
#[derive(Debug, Clone)]
pub struct CorsService<S> {
    inner: S,
    config: Arc<CorsConfig>,
}

fn request_host<B>(req: &Request<B>) -> &str {
    req.uri()
        .host()
        .or_else(|| req.headers().get(HOST).and_then(|v| v.to_str().ok()))
        .unwrap_or_default()
}

fn is_allowed(origin: &str, host: &str, allowed_origins: &[String]) -> bool {
    origin.contains(host) || allowed_origins.iter().any(|allowed| allowed == origin)
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CorsService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let host = request_host(&req);
        if let Some(origin) = req.headers().get(ORIGIN).and_then(|v| v.to_str().ok()) {
            info!(host = %host, origin = %origin, "checking request origin");
            if !is_allowed(origin, host, &self.config.allowed_origins) {
                error!(origin = %origin, "origin not allowed");
                let mut response = Response::new(ResBody::default());
                *response.status_mut() = StatusCode::NOT_ACCEPTABLE;
                return Box::pin(ready(Ok(response)));
            }
        }
        Box::pin(self.inner.call(req))
    }
}
