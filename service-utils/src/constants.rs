//! Well-known header, cookie, attribute and route names.
//!
//! These are the defaults the builder, extractors and middlewares agree on.
//! Callers that need different names pass them through configuration.

/// Inbound header carrying the B3 trace id.
pub const TRACE_ID_HTTP_HEADER: &str = "X-B3-Traceid";
/// Attribute key under which a request-scoped logger is stored.
pub const LOGGER_KEY: &str = "logger";
/// Attribute key holding the trace id of the current request.
pub const TRACE_KEY: &str = "traceID";
/// Header whose presence asks for JSON formatted logs.
pub const JSON_FORMATTER_HTTP_HEADER: &str = "JSON";
/// Trace id used when none is present in the context.
pub const NO_TRACE_ID: &str = "no-trace-id";

/// Header propagating the caller's session tracing id.
pub const TRACING_SESSION_HEADER_KEY: &str = "Session-Tracing-ID";
/// Header carrying the original client address.
pub const TRACING_CLIENT_PUBLIC_IP_HEADER: &str = "X-Original-Forwarded-For";
/// Span field for the original client address.
pub const TRACING_CLIENT_PUBLIC_IP: &str = "client-public-ip";
/// Span field for the session tracing id.
pub const TRACING_SESSION_ID: &str = "session_tracing_id";
/// Header carrying the client application version.
pub const TRACING_APP_VERSION_HEADER_KEY: &str = "App-Version";
/// Span field for the client application version.
pub const TRACING_APP_VERSION: &str = "app_version";
/// Header carrying the client device description.
pub const TRACING_DEVICE_INFO_HEADER_KEY: &str = "Device-Info";
/// Span field for the client device description.
pub const TRACING_DEVICE_INFO: &str = "device_info";
/// Maximum annotations recorded on a single span.
pub const TRACE_CONFIG_MAX_ANNOTATIONS: usize = 128;

/// Authorization header name.
pub const AUTHORIZATION_HEADER_KEY: &str = "Authorization";
/// Header carrying the encrypted id token.
pub const ENC_ID_TOKEN_HEADER_KEY: &str = "Enc-Id-Token";
/// Cookie carrying the access token.
pub const COOKIE_ACCESS_TOKEN: &str = "access_token";
/// Cookie carrying the encrypted id token.
pub const COOKIE_ENC_ID_TOKEN: &str = "enc_id_token";
/// Cookie carrying the plain id token.
pub const COOKIE_ID_TOKEN: &str = "id_token";
/// Plain-context attribute holding the access token.
pub const CONTEXT_ACCESS_TOKEN: &str = "CONTEXT_ACCESS_TOKEN";
/// Plain-context attribute holding the encrypted id token.
pub const CONTEXT_ENC_ID_TOKEN: &str = "CONTEXT_ENC_ID_TOKEN";

/// Header sent with every request built by [`crate::HttpRequestBuilder`].
pub const X_REQUESTED_WITH_HEADER: &str = "X-Requested-With";
/// Value of the default `X-Requested-With` header.
pub const X_REQUESTED_WITH_VALUE: &str = "XMLHttpRequest";

/// Crypto service route decrypting an encrypted id token.
pub const TOKEN_DECRYPT_ROUTE: &str = "/api/crypto/v1/token/decrypt";
/// Crypto service route encrypting an id token.
pub const TOKEN_ENCRYPT_ROUTE: &str = "/api/crypto/v1/token/encrypt";
/// Crypto service route decrypting arbitrary text.
pub const TEXT_DECRYPT_ROUTE: &str = "/api/crypto/v1/text/decrypt";

/// Path fragment whose presence disables body logging in traces.
pub const SENSITIVE_PATH_FRAGMENT: &str = "crypto";
/// Annotation used instead of a request body that must not be logged.
pub const REQUEST_NOT_LOGGED_MESSAGE: &str = "Request payload not logged for security reasons";
/// Annotation used instead of a response body that must not be logged.
pub const RESPONSE_NOT_LOGGED_MESSAGE: &str = "Response body not logged for security reasons";
/// Annotation used for empty bodies.
pub const NO_BODY_CONTENT: &str = "NO BODY CONTENT";
/// Prefix of annotations carrying base64 encoded binary bodies.
pub const BASE64_ENCODED_CONTENT_PREFIX: &str = "BASE64_ENCODED_CONTENT: ";

/// Error code for generic server failures.
pub const ERR_INTERNAL_SERVER_ERROR: &str = "ERR_INTERNAL_SERVER_ERROR";
/// Error code for rejected credentials.
pub const ERR_UNAUTHORIZED: &str = "ERR_UNAUTHORIZED";
/// Error code for missing or inactive access tokens.
pub const ERR_INVALID_ACCESS_TOKEN: &str = "ERR_INVALID_ACCESS_TOKEN";
/// Error code for id tokens that fail decryption or verification.
pub const ERR_INVALID_ID_TOKEN: &str = "ERR_INVALID_ID_TOKEN";
/// Error code for unsupported request body shapes.
pub const ERR_INVALID_REQUEST_TYPE: &str = "ERR_INVALID_REQUEST_TYPE";
