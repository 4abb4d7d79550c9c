//! Tower layers for inbound `axum` routes.
//!
//! Each layer is independent; a typical stack installs
//! [`LoggingLayer`](crate::logging::LoggingLayer) outermost, then
//! [`SessionTraceLayer`] and [`RequestResponseTraceLayer`], then the
//! authentication layers closest to the routes.

pub mod cache_control;
pub mod cors;
pub mod introspection;
pub mod request_response_trace;
pub mod session_trace;
pub mod token;

pub use cache_control::{CacheControlLayer, CacheControlService};
pub use cors::{CorsConfig, CorsLayer, CorsService};
pub use introspection::{
    ErrorResponseInterceptor, IntrospectionClient, IntrospectionError, IntrospectionLayer,
    IntrospectionMiddleware, IntrospectionService, IntrospectionTokenService, OAuthMiddlewareError,
    ProtectedUrlService, ResponseInterceptor, TokenService,
};
pub use request_response_trace::{
    IgnoreRequestResponseLogs, RequestResponseTraceLayer, RequestResponseTraceService,
};
pub use session_trace::{SessionTraceLayer, SessionTraceService};
pub use token::{TokenLayer, TokenMiddleware};
