//! Shared utilities for backend services.
//!
//! This crate provides centralized implementations for:
//! - A fluent outbound HTTP request builder with oauth forwarding, tracing
//!   spans and typed response decoding
//! - Trust context extraction from inbound requests or plain values
//! - Id token decryption and text decipher clients for the crypto service
//! - Email delivery through the email gateway
//! - A JSON-valued Redis store
//! - Configuration loading and validation
//! - Request-scoped logging and tracing subscriber setup
//! - Tower middlewares for introspection, tokens, tracing, caching and CORS

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod alert;
pub mod config;
pub mod constants;
pub mod context;
pub mod crypto;
pub mod error;
pub mod http;
pub mod logging;
pub mod mask;
pub mod middleware;
pub mod model;
pub mod oauth;
pub mod redis_store;
pub mod trace;
pub mod tracing_config;
pub mod validation;

pub use alert::email::{EmailClient, EmailDetails, EmailUtil};
pub use config::{ConfigError, load_config};
pub use context::{FrameworkContext, TrustContext, ValueContext};
pub use crypto::{CryptoClient, CryptoError, CryptoUtil};
pub use error::{ApiError, BuildError, HttpError, RequestError, RequestResult};
pub use http::{HttpClient, HttpConfig, HttpRequest, HttpRequestBuilder, build_http_client};
pub use logging::{LogLevel, LoggingLayer, ServiceLogger, get_logger};
pub use mask::mask_email;
pub use model::IdToken;
pub use oauth::{OauthTokenClient, OauthUtils, TokenError};
pub use redis_store::{RedisClient, RedisStore, RedisStoreConfig, RedisStoreExt, StoreError};
pub use trace::{SpanTracer, TraceSpan, Tracer};
pub use tracing_config::{TracingConfig, init_tracing};
pub use validation::{ValidationErrors, Validator};
