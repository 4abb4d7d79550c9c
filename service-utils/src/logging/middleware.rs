//! Layer attaching a trace-id scoped [`ServiceLogger`] to each request.

use std::task::{Context, Poll};

use futures::future::BoxFuture;
use http::Request;
use tower::{Layer, Service};

use crate::constants::{JSON_FORMATTER_HTTP_HEADER, NO_TRACE_ID, TRACE_ID_HTTP_HEADER, TRACE_KEY};
use crate::context::TraceId;
use crate::logging::ServiceLogger;

/// Stores a logger tagged with the inbound trace id in request extensions,
/// together with the [`TraceId`] itself.
///
/// The trace id comes from `X-B3-Traceid`, or is `no-trace-id`. A non-empty
/// `JSON` header switches the logger to JSON rendering.
#[derive(Debug, Clone, Default)]
pub struct LoggingLayer {
    base: ServiceLogger,
}

impl LoggingLayer {
    /// Layer deriving request loggers from a default logger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer deriving request loggers from `base`, keeping its fields and level.
    #[must_use]
    pub const fn with_logger(base: ServiceLogger) -> Self {
        Self { base }
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingService {
            inner,
            base: self.base.clone(),
        }
    }
}

/// Service produced by [`LoggingLayer`].
#[derive(Debug, Clone)]
pub struct LoggingService<S> {
    inner: S,
    base: ServiceLogger,
}

impl<S, B> Service<Request<B>> for LoggingService<S>
where
    S: Service<Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let headers = req.headers();
        let trace_id = headers
            .get(TRACE_ID_HTTP_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(NO_TRACE_ID)
            .to_string();
        let json = headers
            .get(JSON_FORMATTER_HTTP_HEADER)
            .is_some_and(|v| !v.is_empty());

        let logger = self
            .base
            .clone()
            .with_json_format(json || self.base.is_json())
            .with_field(TRACE_KEY, &trace_id);
        req.extensions_mut().insert(logger);
        req.extensions_mut().insert(TraceId(trace_id));

        let mut inner = self.inner.clone();
        std::mem::swap(&mut self.inner, &mut inner);
        Box::pin(inner.call(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use tower::{ServiceExt, service_fn};

    use crate::context::{FrameworkContext, TrustContext};
    use crate::logging::get_logger;

    async fn echo_trace(req: Request<()>) -> Result<(String, bool), Infallible> {
        let ctx = FrameworkContext::from_request(&req);
        let logger = get_logger(Some(&ctx));
        Ok((logger.trace_id().to_string(), logger.is_json()))
    }

    #[tokio::test]
    async fn test_trace_id_from_header() {
        let svc = LoggingLayer::new().layer(service_fn(echo_trace));
        let req = Request::builder()
            .header(TRACE_ID_HTTP_HEADER, "abc123")
            .body(())
            .unwrap();
        let (trace_id, json) = svc.oneshot(req).await.unwrap();
        assert_eq!(trace_id, "abc123");
        assert!(!json);
    }

    #[tokio::test]
    async fn test_missing_trace_id_and_json_header() {
        let svc = LoggingLayer::new().layer(service_fn(echo_trace));
        let req = Request::builder()
            .header(JSON_FORMATTER_HTTP_HEADER, "true")
            .body(())
            .unwrap();
        let (trace_id, json) = svc.oneshot(req).await.unwrap();
        assert_eq!(trace_id, NO_TRACE_ID);
        assert!(json);
    }

    #[tokio::test]
    async fn test_trace_id_exposed_as_attribute() {
        let svc = LoggingLayer::new().layer(service_fn(|req: Request<()>| async move {
            let ctx = FrameworkContext::from_request(&req);
            Ok::<_, Infallible>(ctx.attribute(TRACE_KEY).map(str::to_string))
        }));
        let req = Request::builder()
            .header(TRACE_ID_HTTP_HEADER, "77")
            .body(())
            .unwrap();
        assert_eq!(svc.oneshot(req).await.unwrap().as_deref(), Some("77"));
    }
}
