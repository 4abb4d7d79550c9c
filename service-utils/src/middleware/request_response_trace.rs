//! Request and response bodies recorded on a per-request span.
//!
//! Each request outside `/healthz` gets a `<uri> | request/response` span,
//! child of the inbound span. Its annotations carry the request and response
//! bodies unless an [`IgnoreRequestResponseLogs`] entry matching the URI
//! forbids it, in which case a fixed placeholder is recorded instead.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{Body, to_bytes};
use axum::extract::Request;
use axum::response::Response;
use futures::future::BoxFuture;
use serde::Deserialize;
use tower::{Layer, Service};
use tracing::{debug, error};

use crate::constants::{REQUEST_NOT_LOGGED_MESSAGE, RESPONSE_NOT_LOGGED_MESSAGE};
use crate::context::{FrameworkContext, TrustContext};
use crate::trace::{DispatchSpan, SpanParent, SpanTracer, Tracer, escape_special_chars};

const HEALTH_CHECK_PATH: &str = "/healthz";
const REQUEST_KEY: &str = "request";
const RESPONSE_KEY: &str = "response";

/// Body logging rule for URIs containing `partial_api_path`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoreRequestResponseLogs {
    /// Case-insensitive URI fragment
    pub partial_api_path: String,
    /// Whether the request body may be recorded
    pub request_log_allowed: bool,
    /// Whether the response body may be recorded
    pub response_log_allowed: bool,
}

impl IgnoreRequestResponseLogs {
    /// Rule for `partial_api_path`.
    #[must_use]
    pub fn new(partial_api_path: impl Into<String>, request_log_allowed: bool, response_log_allowed: bool) -> Self {
        Self {
            partial_api_path: partial_api_path.into(),
            request_log_allowed,
            response_log_allowed,
        }
    }
}

fn is_log_allowed(
    request_uri: &str,
    rules: &[IgnoreRequestResponseLogs],
    allowed: impl Fn(&IgnoreRequestResponseLogs) -> bool,
) -> bool {
    let uri = request_uri.to_lowercase();
    rules
        .iter()
        .find(|rule| uri.contains(&rule.partial_api_path.to_lowercase()))
        .is_none_or(allowed)
}

/// Layer recording request and response bodies on a span.
#[derive(Debug, Clone)]
pub struct RequestResponseTraceLayer {
    tracer: Arc<dyn Tracer>,
    rules: Arc<[IgnoreRequestResponseLogs]>,
}

impl Default for RequestResponseTraceLayer {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl RequestResponseTraceLayer {
    /// Trace every route, applying `rules`.
    #[must_use]
    pub fn new(rules: Vec<IgnoreRequestResponseLogs>) -> Self {
        Self {
            tracer: Arc::new(SpanTracer),
            rules: rules.into(),
        }
    }

    /// Open spans through `tracer`.
    #[must_use]
    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }
}

impl<S> Layer<S> for RequestResponseTraceLayer {
    type Service = RequestResponseTraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestResponseTraceService {
            inner,
            layer: self.clone(),
        }
    }
}

/// Service produced by [`RequestResponseTraceLayer`].
#[derive(Debug, Clone)]
pub struct RequestResponseTraceService<S> {
    inner: S,
    layer: RequestResponseTraceLayer,
}

impl<S> Service<Request> for RequestResponseTraceService<S>
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

    fn call(&mut self, req: Request) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let request_uri = req
            .uri()
            .path_and_query()
            .map_or_else(|| req.uri().path().to_string(), |pq| pq.as_str().to_string());
        if request_uri.contains(HEALTH_CHECK_PATH) {
            return Box::pin(inner.call(req));
        }

        let span_name = format!("{request_uri} | {REQUEST_KEY}/{RESPONSE_KEY}");
        let ctx = FrameworkContext::from_request(&req);
        let parent = SpanParent {
            span: ctx.span(),
            trace_context: ctx.trace_context(),
        };
        debug!(span = %span_name, "creating request/response span");
        let mut span = DispatchSpan::new(self.layer.tracer.start_span(&span_name, parent));
        let rules = self.layer.rules.clone();

        Box::pin(async move {
            let req = if is_log_allowed(&request_uri, &rules, |r| r.request_log_allowed) {
                let (parts, body) = req.into_parts();
                match to_bytes(body, usize::MAX).await {
                    Ok(bytes) => {
                        span.annotate(REQUEST_KEY, &escape_special_chars(&bytes), &request_uri);
                        Request::from_parts(parts, Body::from(bytes))
                    }
                    Err(err) => {
                        error!(error = %err, "error reading request body");
                        Request::from_parts(parts, Body::empty())
                    }
                }
            } else {
                debug!("request payload for api is not allowed to log");
                span.annotate(REQUEST_KEY, REQUEST_NOT_LOGGED_MESSAGE, &request_uri);
                req
            };

            let response = inner.call(req).await?;
            let status = response.status();
            span.set_int_attribute("http.status_code", i64::from(status.as_u16()));
            if status.as_u16() >= 400 {
                span.set_bool_attribute("error", true);
            }

            let response = if is_log_allowed(&request_uri, &rules, |r| r.response_log_allowed) {
                let (parts, body) = response.into_parts();
                match to_bytes(body, usize::MAX).await {
                    Ok(bytes) => {
                        span.annotate(RESPONSE_KEY, &escape_special_chars(&bytes), &request_uri);
                        Response::from_parts(parts, Body::from(bytes))
                    }
                    Err(err) => {
                        error!(error = %err, "error reading response body");
                        span.annotate(RESPONSE_KEY, &format!("Response body read Error: {err}"), &request_uri);
                        Response::from_parts(parts, Body::empty())
                    }
                }
            } else {
                debug!("response for api is not allowed to log");
                span.annotate(RESPONSE_KEY, RESPONSE_NOT_LOGGED_MESSAGE, &request_uri);
                response
            };

            span.end();
            Ok(response)
        })
    }
}
