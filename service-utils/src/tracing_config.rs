//! Process-wide tracing subscriber setup.
//!
//! [`init_tracing`] installs an env-filtered `fmt` layer, plain or JSON. With
//! the `otel` feature and an OTLP endpoint configured it also exports spans,
//! including the outbound spans opened by [`SpanTracer`](crate::trace::SpanTracer).

use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{ConfigError, env_or, parse_env};

/// Subscriber setup failures.
#[derive(Error, Debug)]
pub enum TracingInitError {
    /// Log level is not a valid filter directive
    #[error("invalid log level: {0}")]
    Filter(#[from] ParseError),

    /// A global subscriber is already installed
    #[error("tracing already initialized: {0}")]
    AlreadyInitialized(#[from] TryInitError),

    /// OTLP exporter could not be built
    #[cfg(feature = "otel")]
    #[error("otlp exporter: {0}")]
    Exporter(#[from] opentelemetry::trace::TraceError),
}

/// Tracing configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TracingConfig {
    /// Service name reported on exported spans
    pub service_name: String,
    /// Filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON lines instead of plain text
    pub json_output: bool,
    /// OTLP collector endpoint; spans are not exported without one
    pub otlp_endpoint: Option<String>,
    /// Fraction of traces sampled, between 0 and 1
    pub sampling_ratio: f64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "service".to_string(),
            log_level: "info".to_string(),
            json_output: false,
            otlp_endpoint: None,
            sampling_ratio: 1.0,
        }
    }
}

impl TracingConfig {
    /// Load from `SERVICE_NAME`, `LOG_LEVEL`, `LOG_FORMAT`,
    /// `OTEL_EXPORTER_OTLP_ENDPOINT` and `OTEL_SAMPLING_RATIO`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseEnv`] when the sampling ratio is not a number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            service_name: env_or("SERVICE_NAME", &defaults.service_name),
            log_level: env_or("LOG_LEVEL", &defaults.log_level),
            json_output: env_or("LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .ok()
                .filter(|e| !e.is_empty()),
            sampling_ratio: parse_env("OTEL_SAMPLING_RATIO", defaults.sampling_ratio)?,
        })
    }

    /// Set the service name.
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Set the fallback log level.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable JSON output.
    #[must_use]
    pub const fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }

    /// Export spans to `endpoint`.
    #[must_use]
    pub fn with_otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    /// Set the sampling ratio, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_sampling_ratio(mut self, ratio: f64) -> Self {
        self.sampling_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    fn env_filter(&self) -> Result<EnvFilter, ParseError> {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&self.log_level))
    }
}

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Fails when the log level does not parse, the exporter cannot be built, or
/// a subscriber is already installed.
pub fn init_tracing(config: &TracingConfig) -> Result<(), TracingInitError> {
    let filter = config.env_filter()?;
    let json = config
        .json_output
        .then(|| fmt::layer().json().with_target(true).with_current_span(true));
    let plain = (!config.json_output).then(fmt::layer);

    let registry = tracing_subscriber::registry().with(filter).with(json).with(plain);

    #[cfg(feature = "otel")]
    let registry = registry.with(otel::layer(config)?);

    registry.try_init()?;
    Ok(())
}

/// Flush and stop span export.
pub fn shutdown_tracing() {
    #[cfg(feature = "otel")]
    opentelemetry::global::shutdown_tracer_provider();
}

#[cfg(feature = "otel")]
mod otel {
    use opentelemetry::KeyValue;
    use opentelemetry::trace::{TraceError, TracerProvider as _};
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::propagation::TraceContextPropagator;
    use opentelemetry_sdk::trace::{Sampler, Tracer, TracerProvider};
    use opentelemetry_sdk::{Resource, runtime};
    use tracing::Subscriber;
    use tracing_opentelemetry::OpenTelemetryLayer;
    use tracing_subscriber::registry::LookupSpan;

    use super::TracingConfig;

    fn sampler(ratio: f64) -> Sampler {
        if ratio >= 1.0 {
            Sampler::AlwaysOn
        } else if ratio <= 0.0 {
            Sampler::AlwaysOff
        } else {
            Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(ratio)))
        }
    }

    pub(super) fn layer<S>(config: &TracingConfig) -> Result<Option<OpenTelemetryLayer<S, Tracer>>, TraceError>
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        let Some(endpoint) = config.otlp_endpoint.as_deref() else {
            return Ok(None);
        };

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()?;

        let provider = TracerProvider::builder()
            .with_batch_exporter(exporter, runtime::Tokio)
            .with_sampler(sampler(config.sampling_ratio))
            .with_resource(Resource::new(vec![
                KeyValue::new("service.name", config.service_name.clone()),
                KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            ]))
            .build();

        let tracer = provider.tracer(config.service_name.clone());
        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());
        opentelemetry::global::set_tracer_provider(provider);

        Ok(Some(tracing_opentelemetry::layer().with_tracer(tracer)))
    }
}
