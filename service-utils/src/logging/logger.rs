//! Context-scoped logger carrying structured fields.

use std::collections::BTreeMap;
use std::fmt;

use crate::constants::{NO_TRACE_ID, TRACE_KEY};
use crate::context::TrustContext;
use crate::logging::LogLevel;

/// Logger bound to a request, carrying fields that accompany every record.
///
/// Records are emitted through `tracing`; the fields are rendered into a single
/// `fields` value, as `key=value` pairs or as a JSON object when JSON output
/// was requested for the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceLogger {
    fields: BTreeMap<String, String>,
    level: LogLevel,
    json: bool,
}

impl ServiceLogger {
    /// Create a logger with no fields at `info` level.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.fields.insert(key.into(), value.to_string());
        self
    }

    /// Attach several fields.
    #[must_use]
    pub fn with_fields<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: fmt::Display,
    {
        for (key, value) in fields {
            self.fields.insert(key.into(), value.to_string());
        }
        self
    }

    /// Attach an error under the `error` field.
    #[must_use]
    pub fn with_error(self, err: &(dyn std::error::Error + '_)) -> Self {
        self.with_field("error", err)
    }

    /// Set the minimum level this logger emits.
    #[must_use]
    pub const fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Render fields as a JSON object.
    #[must_use]
    pub const fn with_json_format(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Value of a field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Trace id attached to this logger.
    #[must_use]
    pub fn trace_id(&self) -> &str {
        self.field(TRACE_KEY).unwrap_or(NO_TRACE_ID)
    }

    /// Minimum level this logger emits.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }

    /// Whether fields are rendered as JSON.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        self.json
    }

    /// Fields rendered for output.
    #[must_use]
    pub fn render_fields(&self) -> String {
        if self.json {
            serde_json::to_string(&self.fields).unwrap_or_default()
        } else {
            self.fields
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(" ")
        }
    }

    /// Emit a record at `level`.
    pub fn log(&self, level: LogLevel, message: impl fmt::Display) {
        if !self.level.enables(level) {
            return;
        }
        let fields = self.render_fields();
        match level {
            LogLevel::Panic | LogLevel::Fatal | LogLevel::Error => {
                tracing::error!(fields = %fields, level_name = level.as_str(), "{message}");
            }
            LogLevel::Warn => tracing::warn!(fields = %fields, "{message}"),
            LogLevel::Info => tracing::info!(fields = %fields, "{message}"),
            LogLevel::Debug => tracing::debug!(fields = %fields, "{message}"),
            LogLevel::Trace => tracing::trace!(fields = %fields, "{message}"),
        }
    }

    /// Emit an error record.
    pub fn error(&self, message: impl fmt::Display) {
        self.log(LogLevel::Error, message);
    }

    /// Emit a warning record.
    pub fn warn(&self, message: impl fmt::Display) {
        self.log(LogLevel::Warn, message);
    }

    /// Emit an info record.
    pub fn info(&self, message: impl fmt::Display) {
        self.log(LogLevel::Info, message);
    }

    /// Emit a debug record.
    pub fn debug(&self, message: impl fmt::Display) {
        self.log(LogLevel::Debug, message);
    }
}

/// Logger attached to `ctx`, or a fresh one tagged with `traceID=no-trace-id`.
#[must_use]
pub fn get_logger(ctx: Option<&dyn TrustContext>) -> ServiceLogger {
    ctx.and_then(|ctx| ctx.logger())
        .cloned()
        .unwrap_or_else(|| ServiceLogger::new().with_field(TRACE_KEY, NO_TRACE_ID))
}
