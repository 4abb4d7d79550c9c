//! W3C Trace Context carried across service boundaries.

use http::HeaderMap;
use serde::{Deserialize, Serialize};

/// Header carrying the W3C trace parent.
pub const TRACEPARENT_HEADER: &str = "traceparent";
/// Header carrying vendor-specific trace state.
pub const TRACESTATE_HEADER: &str = "tracestate";

/// W3C Trace Context for distributed tracing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    /// W3C traceparent header value
    pub traceparent: String,
    /// Optional tracestate header value
    pub tracestate: Option<String>,
}

impl TraceContext {
    /// Create a new trace context.
    #[must_use]
    pub fn new(traceparent: impl Into<String>) -> Self {
        Self {
            traceparent: traceparent.into(),
            tracestate: None,
        }
    }

    /// Create with tracestate.
    #[must_use]
    pub fn with_tracestate(mut self, tracestate: impl Into<String>) -> Self {
        self.tracestate = Some(tracestate.into());
        self
    }

    /// Read a valid trace context from inbound headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let traceparent = headers.get(TRACEPARENT_HEADER)?.to_str().ok()?;
        let mut ctx = Self::new(traceparent.trim());
        if let Some(state) = headers
            .get(TRACESTATE_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            ctx = ctx.with_tracestate(state);
        }
        ctx.is_valid().then_some(ctx)
    }

    /// Check if traceparent is valid W3C format.
    /// Format: version-trace_id-parent_id-flags (00-{32hex}-{16hex}-{2hex})
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let parts: Vec<&str> = self.traceparent.split('-').collect();
        let expected = [2, 32, 16, 2];
        parts.len() == expected.len()
            && parts
                .iter()
                .zip(expected)
                .all(|(part, len)| part.len() == len && part.chars().all(|c| c.is_ascii_hexdigit()))
    }

    /// Get the trace ID from traceparent.
    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.traceparent.split('-').nth(1)
    }

    /// Get the parent span ID from traceparent.
    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        self.traceparent.split('-').nth(2)
    }

    /// Check if trace is sampled (flag bit 0 set).
    #[must_use]
    pub fn is_sampled(&self) -> bool {
        self.traceparent
            .split('-')
            .nth(3)
            .and_then(|f| u8::from_str_radix(f, 16).ok())
            .is_some_and(|f| f & 0x01 != 0)
    }

    /// Continue the trace with `span_id` as the new parent.
    #[must_use]
    pub fn propagate(&self, span_id: &str) -> Self {
        let parts: Vec<&str> = self.traceparent.split('-').collect();
        if parts.len() != 4 {
            return self.clone();
        }

        Self {
            traceparent: format!("{}-{}-{}-{}", parts[0], parts[1], span_id, parts[3]),
            tracestate: self.tracestate.clone(),
        }
    }

    /// Headers representing this context on an outbound call.
    #[must_use]
    pub fn to_header_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![(TRACEPARENT_HEADER.to_string(), self.traceparent.clone())];
        if let Some(state) = &self.tracestate {
            pairs.push((TRACESTATE_HEADER.to_string(), state.clone()));
        }
        pairs
    }
}

/// Generate a random 16-hex-digit span id.
#[must_use]
pub fn new_span_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}
