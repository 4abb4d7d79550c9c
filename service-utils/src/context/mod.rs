//! Ambient request context read by the builder and the middlewares.
//!
//! Code runs either inside an HTTP handler, where the inbound request is at
//! hand, or in background code that only carries a few values. Both are seen
//! through [`TrustContext`]: [`FrameworkContext`] wraps the inbound request
//! parts and [`ValueContext`] is a plain key/value store.

pub mod tokens;

use std::collections::HashMap;
use std::convert::Infallible;

use axum::extract::FromRequestParts;
use http::header::COOKIE;
use http::request::Parts;
use http::{HeaderMap, Request};
use tracing::Span;

use crate::constants::TRACE_KEY;
use crate::logging::ServiceLogger;
use crate::trace::TraceContext;

pub use tokens::{
    TokenExtractionError, access_token, encrypted_id_token, form_bearer_authorization_header,
    session_tracing_id,
};

/// Read-only view of the values a request carries across a trust boundary.
pub trait TrustContext: Send + Sync {
    /// Inbound header value.
    fn header(&self, name: &str) -> Option<&str>;

    /// Inbound cookie value.
    fn cookie(&self, name: &str) -> Option<&str>;

    /// Request-scoped attribute.
    fn attribute(&self, key: &str) -> Option<&str>;

    /// Span the current work runs in.
    fn span(&self) -> Option<&Span>;

    /// Remote trace the current work continues.
    fn trace_context(&self) -> Option<&TraceContext>;

    /// Logger attached to the request.
    fn logger(&self) -> Option<&ServiceLogger>;
}

/// Trace id of the inbound request, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(pub String);

/// Free-form request attributes, stored in request extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestAttributes(pub HashMap<String, String>);

/// Context backed by an inbound HTTP request.
#[derive(Debug, Clone, Default)]
pub struct FrameworkContext {
    headers: HeaderMap,
    cookies: Vec<(String, String)>,
    attributes: HashMap<String, String>,
    span: Option<Span>,
    trace_context: Option<TraceContext>,
    logger: Option<ServiceLogger>,
}

impl FrameworkContext {
    /// Capture the context of an inbound request.
    #[must_use]
    pub fn from_parts(parts: &Parts) -> Self {
        Self::capture(&parts.headers, &parts.extensions)
    }

    /// Capture the context of an inbound request.
    #[must_use]
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self::capture(request.headers(), request.extensions())
    }

    fn capture(headers: &HeaderMap, extensions: &http::Extensions) -> Self {
        let mut attributes = extensions
            .get::<RequestAttributes>()
            .map(|attrs| attrs.0.clone())
            .unwrap_or_default();
        if let Some(TraceId(id)) = extensions.get::<TraceId>() {
            attributes.insert(TRACE_KEY.to_string(), id.clone());
        }

        Self {
            headers: headers.clone(),
            cookies: parse_cookies(headers),
            attributes,
            span: extensions.get::<Span>().cloned(),
            trace_context: TraceContext::from_headers(headers),
            logger: extensions.get::<ServiceLogger>().cloned(),
        }
    }

    /// Inbound headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl TrustContext for FrameworkContext {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    fn span(&self) -> Option<&Span> {
        self.span.as_ref()
    }

    fn trace_context(&self) -> Option<&TraceContext> {
        self.trace_context.as_ref()
    }

    fn logger(&self) -> Option<&ServiceLogger> {
        self.logger.as_ref()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for FrameworkContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

/// Context carrying plain values, for code running outside a handler.
#[derive(Debug, Clone, Default)]
pub struct ValueContext {
    values: HashMap<String, String>,
    span: Option<Span>,
    trace_context: Option<TraceContext>,
    logger: Option<ServiceLogger>,
}

impl ValueContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Attach the span work runs in.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Attach the remote trace to continue.
    #[must_use]
    pub fn with_trace_context(mut self, trace_context: TraceContext) -> Self {
        self.trace_context = Some(trace_context);
        self
    }

    /// Attach a logger.
    #[must_use]
    pub fn with_logger(mut self, logger: ServiceLogger) -> Self {
        self.logger = Some(logger);
        self
    }
}

impl TrustContext for ValueContext {
    fn header(&self, _name: &str) -> Option<&str> {
        None
    }

    fn cookie(&self, _name: &str) -> Option<&str> {
        None
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn span(&self) -> Option<&Span> {
        self.span.as_ref()
    }

    fn trace_context(&self) -> Option<&TraceContext> {
        self.trace_context.as_ref()
    }

    fn logger(&self) -> Option<&ServiceLogger> {
        self.logger.as_ref()
    }
}

fn parse_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let value = value.trim().trim_matches('"');
            Some((name.trim().to_string(), value.to_string()))
        })
        .filter(|(name, _)| !name.is_empty())
        .collect()
}
