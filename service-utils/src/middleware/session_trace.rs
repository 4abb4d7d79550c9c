//! Session tracing: client session headers recorded on the request span.

use std::task::{Context, Poll};

use futures::future::BoxFuture;
use http::header::HeaderName;
use http::{HeaderMap, HeaderValue, Request, Response};
use tower::{Layer, Service};
use tracing::{Instrument, Span, field, info_span};

use crate::constants::{
    TRACE_ID_HTTP_HEADER, TRACING_APP_VERSION, TRACING_APP_VERSION_HEADER_KEY, TRACING_CLIENT_PUBLIC_IP,
    TRACING_CLIENT_PUBLIC_IP_HEADER, TRACING_DEVICE_INFO, TRACING_DEVICE_INFO_HEADER_KEY, TRACING_SESSION_HEADER_KEY,
    TRACING_SESSION_ID,
};

/// Header to span field pairs recorded when present.
const SESSION_FIELDS: [(&str, &str); 4] = [
    (TRACING_SESSION_HEADER_KEY, TRACING_SESSION_ID),
    (TRACING_CLIENT_PUBLIC_IP_HEADER, TRACING_CLIENT_PUBLIC_IP),
    (TRACING_APP_VERSION_HEADER_KEY, TRACING_APP_VERSION),
    (TRACING_DEVICE_INFO_HEADER_KEY, TRACING_DEVICE_INFO),
];

/// Opens a `http.session` span carrying the session headers of the request
/// and echoes `X-B3-Traceid` onto the response.
///
/// The span is also stored in the request extensions, so outbound calls made
/// with a [`FrameworkContext`](crate::context::FrameworkContext) become its
/// children.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionTraceLayer;

impl SessionTraceLayer {
    /// Create the layer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for SessionTraceLayer {
    type Service = SessionTraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionTraceService { inner }
    }
}

/// Service produced by [`SessionTraceLayer`].
#[derive(Debug, Clone)]
pub struct SessionTraceService<S> {
    inner: S,
}

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

fn session_span(headers: &HeaderMap) -> Span {
    let span = info_span!(
        "http.session",
        session_tracing_id = field::Empty,
        client_public_ip = field::Empty,
        app_version = field::Empty,
        device_info = field::Empty,
    );
    for (header_name, field_name) in SESSION_FIELDS {
        if let Some(value) = header(headers, header_name) {
            span.record(field_name.replace('-', "_").as_str(), value);
        }
    }
    span
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for SessionTraceService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let span = session_span(req.headers());
        let trace_id = req
            .headers()
            .get(TRACE_ID_HTTP_HEADER)
            .filter(|v| !v.is_empty())
            .cloned();
        req.extensions_mut().insert(span.clone());

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(
            async move {
                let mut response = inner.call(req).await?;
                if let Some(value) = trace_id {
                    echo_trace_id(response.headers_mut(), value);
                }
                Ok(response)
            }
            .instrument(span),
        )
    }
}

fn echo_trace_id(headers: &mut HeaderMap, value: HeaderValue) {
    if let Ok(name) = HeaderName::from_bytes(TRACE_ID_HTTP_HEADER.as_bytes()) {
        headers.append(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use tower::{ServiceExt, service_fn};

    async fn ok(req: Request<()>) -> Result<Response<bool>, Infallible> {
        Ok(Response::new(req.extensions().get::<Span>().is_some()))
    }

    #[tokio::test]
    async fn test_trace_id_echoed() {
        let svc = SessionTraceLayer::new().layer(service_fn(ok));
        let req = Request::builder()
            .header("x-b3-traceid", "someTraceId")
            .header(TRACING_SESSION_HEADER_KEY, "12345")
            .body(())
            .unwrap();
        let response = svc.oneshot(req).await.unwrap();
        assert_eq!(
            response.headers().get(TRACE_ID_HTTP_HEADER).unwrap(),
            "someTraceId"
        );
        assert!(*response.body());
    }

    #[tokio::test]
    async fn test_no_trace_id_header_without_request_header() {
        let svc = SessionTraceLayer::new().layer(service_fn(ok));
        let response = svc.oneshot(Request::new(())).await.unwrap();
        assert!(response.headers().get(TRACE_ID_HTTP_HEADER).is_none());
    }

    #[test]
    fn test_session_fields_cover_headers() {
        let names: Vec<_> = SESSION_FIELDS.iter().map(|(h, _)| *h).collect();
        assert_eq!(
            names,
            ["Session-Tracing-ID", "X-Original-Forwarded-For", "App-Version", "Device-Info"]
        );
    }
}
