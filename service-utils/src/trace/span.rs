//! Span abstraction used around outbound calls.
//!
//! [`Tracer`] and [`TraceSpan`] are the seam to the tracing backend. The
//! default [`SpanTracer`] records spans and annotations through the `tracing`
//! crate; an OpenTelemetry layer installed by
//! [`init_tracing`](crate::tracing_config::init_tracing) exports them.

use std::fmt;

use tracing::{Span, field};

use crate::constants::TRACE_CONFIG_MAX_ANNOTATIONS;
use crate::trace::context::{TraceContext, new_span_id};

/// Where a new span attaches.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanParent<'a> {
    /// In-process parent span
    pub span: Option<&'a Span>,
    /// Remote parent received from the caller
    pub trace_context: Option<&'a TraceContext>,
}

/// Tracing backend able to open spans.
pub trait Tracer: Send + Sync + fmt::Debug {
    /// Start a child span of `parent`.
    fn start_span(&self, name: &str, parent: SpanParent<'_>) -> Box<dyn TraceSpan>;
}

/// A single open span.
pub trait TraceSpan: Send {
    /// Add a string annotation.
    fn annotate(&mut self, key: &str, value: &str, description: &str);

    /// Set a numeric attribute.
    fn set_int_attribute(&mut self, key: &str, value: i64);

    /// Set a boolean attribute.
    fn set_bool_attribute(&mut self, key: &str, value: bool);

    /// Headers continuing this span on an outbound call.
    fn propagation_headers(&self) -> Vec<(String, String)>;

    /// Close the span.
    fn end(&mut self);
}

/// Default tracer backed by the `tracing` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanTracer;

impl Tracer for SpanTracer {
    fn start_span(&self, name: &str, parent: SpanParent<'_>) -> Box<dyn TraceSpan> {
        let span = match parent.span {
            Some(parent_span) => tracing::info_span!(
                parent: parent_span,
                "http.client",
                otel.name = %name,
                otel.kind = "client",
                http.status_code = field::Empty,
                error = field::Empty,
            ),
            None => tracing::info_span!(
                "http.client",
                otel.name = %name,
                otel.kind = "client",
                http.status_code = field::Empty,
                error = field::Empty,
            ),
        };
        let trace_context = parent
            .trace_context
            .filter(|ctx| ctx.is_valid())
            .map(|ctx| ctx.propagate(&new_span_id()));

        Box::new(TracingSpan {
            span,
            trace_context,
            annotations: 0,
        })
    }
}

struct TracingSpan {
    span: Span,
    trace_context: Option<TraceContext>,
    annotations: usize,
}

impl TraceSpan for TracingSpan {
    fn annotate(&mut self, key: &str, value: &str, description: &str) {
        if self.annotations >= TRACE_CONFIG_MAX_ANNOTATIONS {
            return;
        }
        self.annotations += 1;
        tracing::info!(
            parent: &self.span,
            annotation = key,
            description = description,
            value = value,
            "span annotation"
        );
    }

    fn set_int_attribute(&mut self, key: &str, value: i64) {
        self.span.record(key, value);
    }

    fn set_bool_attribute(&mut self, key: &str, value: bool) {
        self.span.record(key, value);
    }

    fn propagation_headers(&self) -> Vec<(String, String)> {
        self.trace_context
            .as_ref()
            .map(TraceContext::to_header_pairs)
            .unwrap_or_default()
    }

    fn end(&mut self) {
        self.span = Span::none();
    }
}

/// Scope guard closing a span exactly once.
///
/// Dropping the guard ends the span, so every exit path of a dispatch,
/// including cancellation, releases it.
#[derive(Default)]
pub struct DispatchSpan {
    inner: Option<Box<dyn TraceSpan>>,
}

impl fmt::Debug for DispatchSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchSpan")
            .field("open", &self.inner.is_some())
            .finish()
    }
}

impl DispatchSpan {
    /// Wrap an open span.
    #[must_use]
    pub fn new(span: Box<dyn TraceSpan>) -> Self {
        Self { inner: Some(span) }
    }

    /// Guard that records nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Whether a span is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Add a string annotation.
    pub fn annotate(&mut self, key: &str, value: &str, description: &str) {
        if let Some(span) = self.inner.as_mut() {
            span.annotate(key, value, description);
        }
    }

    /// Set a numeric attribute.
    pub fn set_int_attribute(&mut self, key: &str, value: i64) {
        if let Some(span) = self.inner.as_mut() {
            span.set_int_attribute(key, value);
        }
    }

    /// Set a boolean attribute.
    pub fn set_bool_attribute(&mut self, key: &str, value: bool) {
        if let Some(span) = self.inner.as_mut() {
            span.set_bool_attribute(key, value);
        }
    }

    /// Headers continuing the span on an outbound call.
    #[must_use]
    pub fn propagation_headers(&self) -> Vec<(String, String)> {
        self.inner
            .as_ref()
            .map(|span| span.propagation_headers())
            .unwrap_or_default()
    }

    /// End the span now.
    pub fn end(&mut self) {
        if let Some(mut span) = self.inner.take() {
            span.end();
        }
    }
}

impl Drop for DispatchSpan {
    fn drop(&mut self) {
        self.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSpan(Arc<AtomicUsize>);

    impl TraceSpan for CountingSpan {
        fn annotate(&mut self, _key: &str, _value: &str, _description: &str) {}
        fn set_int_attribute(&mut self, _key: &str, _value: i64) {}
        fn set_bool_attribute(&mut self, _key: &str, _value: bool) {}
        fn propagation_headers(&self) -> Vec<(String, String)> {
            Vec::new()
        }
        fn end(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_guard_ends_once() {
        let ended = Arc::new(AtomicUsize::new(0));
        let mut guard = DispatchSpan::new(Box::new(CountingSpan(ended.clone())));
        guard.end();
        guard.end();
        drop(guard);
        assert_eq!(ended.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_ends_on_drop() {
        let ended = Arc::new(AtomicUsize::new(0));
        {
            let _guard = DispatchSpan::new(Box::new(CountingSpan(ended.clone())));
        }
        assert_eq!(ended.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_span_tracer_propagates_remote_parent() {
        let remote = TraceContext::new("00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01");
        let parent = SpanParent {
            span: None,
            trace_context: Some(&remote),
        };
        let span = SpanTracer.start_span("/users | request/response", parent);
        let headers = span.propagation_headers();

        assert_eq!(headers.len(), 1);
        let propagated = TraceContext::new(headers[0].1.clone());
        assert_eq!(propagated.trace_id(), remote.trace_id());
        assert_ne!(propagated.parent_id(), remote.parent_id());
    }

    #[test]
    fn test_disabled_guard_is_noop() {
        let mut guard = DispatchSpan::disabled();
        guard.annotate("request", "body", "desc");
        assert!(!guard.is_open());
        assert!(guard.propagation_headers().is_empty());
    }
}
