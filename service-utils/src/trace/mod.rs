//! Trace helpers shared by the request builder and the middlewares.

pub mod context;
pub mod span;

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::constants::{
    BASE64_ENCODED_CONTENT_PREFIX, NO_BODY_CONTENT, NO_TRACE_ID, SENSITIVE_PATH_FRAGMENT,
    TRACE_KEY,
};
use crate::context::TrustContext;

pub use context::TraceContext;
pub use span::{DispatchSpan, SpanParent, SpanTracer, TraceSpan, Tracer};

/// Error returned by a trace hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Transform applied to a body before it is attached to a span.
pub type TraceHook = Arc<dyn Fn(&[u8]) -> Result<String, HookError> + Send + Sync>;

/// Trace id of the current request with leading zeros trimmed.
///
/// Falls back to `no-trace-id` when the context carries none.
#[must_use]
pub fn get_trace_id(ctx: Option<&dyn TrustContext>) -> String {
    ctx.and_then(|ctx| ctx.attribute(TRACE_KEY))
        .map(|id| id.trim_start_matches('0'))
        .filter(|id| !id.is_empty())
        .map_or_else(|| NO_TRACE_ID.to_string(), str::to_string)
}

/// Render a body for a trace annotation.
///
/// Empty bodies become `NO BODY CONTENT`; bodies containing bytes outside
/// printable ASCII are base64 encoded behind a marker prefix.
#[must_use]
pub fn escape_special_chars(body: &[u8]) -> String {
    if body.is_empty() {
        return NO_BODY_CONTENT.to_string();
    }
    if body.iter().any(|b| *b > 126) {
        return format!("{BASE64_ENCODED_CONTENT_PREFIX}{}", STANDARD.encode(body));
    }
    String::from_utf8_lossy(body).into_owned()
}

/// Apply `hook` to `body`, falling back to [`escape_special_chars`] when
/// there is no hook or it fails.
#[must_use]
pub fn render_body(body: &[u8], hook: Option<&TraceHook>) -> String {
    match hook.map(|hook| hook(body)) {
        Some(Ok(rendered)) => rendered,
        Some(Err(err)) => {
            tracing::debug!(error = %err, "trace hook failed, using escaped body");
            escape_special_chars(body)
        }
        None => escape_special_chars(body),
    }
}

/// Whether bodies exchanged with `path` must stay out of traces.
#[must_use]
pub fn is_sensitive_path(path: &str) -> bool {
    path.contains(SENSITIVE_PATH_FRAGMENT)
}
