//! Fluent HTTP request builder.
//!
//! [`HttpRequestBuilder`] holds what every request shares: the transport,
//! the tracer and the validator. Each call starts a fresh [`HttpRequest`]
//! from it, configures it through chained calls and sends it with one of
//! the dispatch methods:
//!
//! ```no_run
//! # async fn run(builder: service_utils::HttpRequestBuilder) -> Result<(), service_utils::RequestError> {
//! #[derive(serde::Deserialize)]
//! struct User { id: String }
//!
//! let mut user = User { id: String::new() };
//! let mut status = 0u16;
//! builder
//!     .new_request()
//!     .add_path_parameters([("id", "42")])
//!     .response_as(&mut user)
//!     .response_status_code_as(&mut status)
//!     .get("https://users.internal/api/users/{id}")
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! Configuration never fails on the spot. Body encoding errors are kept and
//! returned by the dispatch method before anything is sent.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use tracing::{debug, instrument, warn};
use url::{Position, Url};
use uuid::Uuid;

use crate::constants::{
    AUTHORIZATION_HEADER_KEY, ENC_ID_TOKEN_HEADER_KEY, NO_BODY_CONTENT, REQUEST_NOT_LOGGED_MESSAGE,
    RESPONSE_NOT_LOGGED_MESSAGE, TRACING_SESSION_HEADER_KEY, X_REQUESTED_WITH_HEADER,
    X_REQUESTED_WITH_VALUE,
};
use crate::context::{
    TrustContext, access_token, encrypted_id_token, form_bearer_authorization_header,
    session_tracing_id,
};
use crate::error::{BuildError, HttpError, RequestError, RequestResult};
use crate::http::client::{HttpClient, HttpConfig, build_http_client};
use crate::http::cookie::{Cookie, cookie_header};
use crate::http::decode::{ResponseTarget, decode_body, decode_multipart, expects_multipart};
use crate::http::multipart::{FormValue, encode_form};
use crate::http::url::{expand_template, normalize_url};
use crate::trace::{
    DispatchSpan, HookError, SpanParent, SpanTracer, TraceHook, Tracer, is_sensitive_path,
    render_body,
};
use crate::validation::Validator;

const JSON_CONTENT_TYPE: &str = "application/json";
const XML_CONTENT_TYPE: &str = "application/xml";
const XML_TEXT_CONTENT_TYPE: &str = "text/xml";

/// Factory for requests sharing a transport, tracer and validator.
#[derive(Clone)]
pub struct HttpRequestBuilder {
    client: Arc<dyn HttpClient>,
    tracer: Arc<dyn Tracer>,
    validator: Arc<Validator>,
    default_headers: BTreeMap<String, String>,
}

impl fmt::Debug for HttpRequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequestBuilder")
            .field("tracer", &self.tracer)
            .field("validator", &self.validator)
            .field("default_headers", &self.default_headers)
            .finish_non_exhaustive()
    }
}

impl HttpRequestBuilder {
    /// Create a builder over `client` with the default tracer and no
    /// validation rules.
    #[must_use]
    pub fn new(client: impl HttpClient + 'static) -> Self {
        Self::from_shared(Arc::new(client))
    }

    /// Create a builder over a shared transport.
    #[must_use]
    pub fn from_shared(client: Arc<dyn HttpClient>) -> Self {
        let mut default_headers = BTreeMap::new();
        default_headers.insert(
            X_REQUESTED_WITH_HEADER.to_ascii_lowercase(),
            X_REQUESTED_WITH_VALUE.to_string(),
        );
        Self {
            client,
            tracer: Arc::new(SpanTracer),
            validator: Arc::new(Validator::new()),
            default_headers,
        }
    }

    /// Create a builder over a `reqwest` client built from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built.
    pub fn from_config(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config)?))
    }

    /// Use `tracer` for requests that carry a trust context.
    #[must_use]
    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Validate structured responses with `validator`.
    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Send `name: value` with every request.
    #[must_use]
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Start a new request.
    #[must_use]
    pub fn new_request<'a>(&self) -> HttpRequest<'a> {
        HttpRequest {
            client: Arc::clone(&self.client),
            tracer: Arc::clone(&self.tracer),
            validator: Arc::clone(&self.validator),
            context: None,
            forward_auth_headers: false,
            headers: self.default_headers.clone(),
            query_parameters: BTreeMap::new(),
            path_parameters: BTreeMap::new(),
            cookies: Vec::new(),
            body: Bytes::new(),
            build_errors: Vec::new(),
            request_trace_hook: None,
            response_trace_hook: None,
            response_target: None,
            response_status_code: None,
            response_headers: None,
            response_cookies: None,
        }
    }

    /// Start a request reading trust values from `context`.
    #[must_use]
    pub fn new_request_with_context<'a>(&self, context: &'a dyn TrustContext) -> HttpRequest<'a> {
        self.new_request().with_context(context)
    }
}

/// A request being configured.
///
/// Borrowed outputs (`response_as` and friends) are written when the request
/// is dispatched, so they must outlive the returned future.
pub struct HttpRequest<'a> {
    client: Arc<dyn HttpClient>,
    tracer: Arc<dyn Tracer>,
    validator: Arc<Validator>,
    context: Option<&'a dyn TrustContext>,
    forward_auth_headers: bool,
    headers: BTreeMap<String, String>,
    query_parameters: BTreeMap<String, String>,
    path_parameters: BTreeMap<String, String>,
    cookies: Vec<Cookie>,
    body: Bytes,
    build_errors: Vec<BuildError>,
    request_trace_hook: Option<TraceHook>,
    response_trace_hook: Option<TraceHook>,
    response_target: Option<&'a mut dyn ResponseTarget>,
    response_status_code: Option<&'a mut u16>,
    response_headers: Option<&'a mut HeaderMap>,
    response_cookies: Option<&'a mut Vec<Cookie>>,
}

impl<'a> HttpRequest<'a> {
    fn set_body(&mut self, body: Vec<u8>, content_type: &str) {
        self.body = Bytes::from(body);
        self.headers
            .insert(CONTENT_TYPE.as_str().to_string(), content_type.to_string());
    }

    /// Send `body` encoded as JSON.
    #[must_use]
    pub fn with_json_body<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => self.set_body(bytes, JSON_CONTENT_TYPE),
            Err(err) => self.build_errors.push(BuildError::Json(err)),
        }
        self
    }

    /// Send `body` encoded as XML with `Content-Type: application/xml`.
    #[must_use]
    pub fn with_xml_body<T: Serialize + ?Sized>(self, body: &T) -> Self {
        self.xml_body(body, XML_CONTENT_TYPE)
    }

    /// Send `body` encoded as XML with `Content-Type: text/xml`.
    #[must_use]
    pub fn with_xml_body_text_header<T: Serialize + ?Sized>(self, body: &T) -> Self {
        self.xml_body(body, XML_TEXT_CONTENT_TYPE)
    }

    fn xml_body<T: Serialize + ?Sized>(mut self, body: &T, content_type: &str) -> Self {
        match quick_xml::se::to_string(body) {
            Ok(xml) => self.set_body(xml.into_bytes(), content_type),
            Err(err) => self.build_errors.push(BuildError::xml(err)),
        }
        self
    }

    /// Send `fields` as `multipart/form-data`.
    ///
    /// Text values become plain fields, byte vectors become JSON parts and
    /// files are read when this is called.
    #[must_use]
    pub fn with_form_url_encoded<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FormValue>,
    {
        let boundary = Uuid::new_v4().simple().to_string();
        let fields = fields.into_iter().map(|(k, v)| (k.into(), v.into()));
        match encode_form(fields, &boundary) {
            Ok(form) => self.set_body(form.body, &form.content_type),
            Err(err) => self.build_errors.push(err),
        }
        self
    }

    /// Send `body` as is.
    #[must_use]
    pub fn with_request_body_bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Read trust values and the parent span from `context`.
    #[must_use]
    pub fn with_context(mut self, context: &'a dyn TrustContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Forward the caller's access and id tokens.
    ///
    /// Requires [`with_context`](Self::with_context); dispatch fails otherwise.
    #[must_use]
    pub const fn with_oauth(mut self) -> Self {
        self.forward_auth_headers = true;
        self
    }

    /// Set a header, replacing a previous value for the same name.
    ///
    /// Names compare case-insensitively.
    #[must_use]
    pub fn add_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Set several headers.
    #[must_use]
    pub fn add_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers.extend(
            headers
                .into_iter()
                .map(|(k, v)| (k.into().to_ascii_lowercase(), v.into())),
        );
        self
    }

    /// Send a cookie.
    #[must_use]
    pub fn add_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    /// Add query parameters; the last value for a key wins.
    #[must_use]
    pub fn add_query_parameters<I, K, V>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: fmt::Display,
    {
        self.query_parameters
            .extend(parameters.into_iter().map(|(k, v)| (k.into(), v.to_string())));
        self
    }

    /// Add values for `{name}` expressions in the URL.
    #[must_use]
    pub fn add_path_parameters<I, K, V>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: fmt::Display,
    {
        self.path_parameters
            .extend(parameters.into_iter().map(|(k, v)| (k.into(), v.to_string())));
        self
    }

    /// Use `tracer` for this request.
    #[must_use]
    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Validate the response with `validator` instead of the shared one.
    #[must_use]
    pub fn with_custom_validator(mut self, validator: Arc<Validator>) -> Self {
        self.validator = validator;
        self
    }

    /// Transform the request body before it is attached to the trace.
    #[must_use]
    pub fn request_trace_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&[u8]) -> Result<String, HookError> + Send + Sync + 'static,
    {
        self.request_trace_hook = Some(Arc::new(hook));
        self
    }

    /// Transform the response body before it is attached to the trace.
    #[must_use]
    pub fn response_trace_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&[u8]) -> Result<String, HookError> + Send + Sync + 'static,
    {
        self.response_trace_hook = Some(Arc::new(hook));
        self
    }

    /// Decode a successful response into `target`.
    #[must_use]
    pub fn response_as<T: ResponseTarget>(mut self, target: &'a mut T) -> Self {
        self.response_target = Some(target);
        self
    }

    /// Store the response status code in `status`.
    #[must_use]
    pub fn response_status_code_as(mut self, status: &'a mut u16) -> Self {
        self.response_status_code = Some(status);
        self
    }

    /// Store the response headers in `headers`.
    #[must_use]
    pub fn response_headers_as(mut self, headers: &'a mut HeaderMap) -> Self {
        self.response_headers = Some(headers);
        self
    }

    /// Store the cookies of a successful response in `cookies`.
    #[must_use]
    pub fn response_cookies_as(mut self, cookies: &'a mut Vec<Cookie>) -> Self {
        self.response_cookies = Some(cookies);
        self
    }

    /// Send the request with `GET`.
    ///
    /// # Errors
    ///
    /// See [`RequestError`].
    pub async fn get(self, url: &str) -> RequestResult<()> {
        self.dispatch(Method::GET, url).await
    }

    /// Send the request with `POST`.
    ///
    /// # Errors
    ///
    /// See [`RequestError`].
    pub async fn post(self, url: &str) -> RequestResult<()> {
        self.dispatch(Method::POST, url).await
    }

    /// Send the request with `PUT`.
    ///
    /// # Errors
    ///
    /// See [`RequestError`].
    pub async fn put(self, url: &str) -> RequestResult<()> {
        self.dispatch(Method::PUT, url).await
    }

    /// Send the request with `DELETE`.
    ///
    /// # Errors
    ///
    /// See [`RequestError`].
    pub async fn delete(self, url: &str) -> RequestResult<()> {
        self.dispatch(Method::DELETE, url).await
    }

    fn trust_headers(&self) -> RequestResult<Vec<(&'static str, String)>> {
        let mut headers = Vec::new();
        if let Some(session_id) = self.context.and_then(|ctx| session_tracing_id(ctx)) {
            headers.push((TRACING_SESSION_HEADER_KEY, session_id));
        }
        if self.forward_auth_headers {
            let ctx = self.context.ok_or(RequestError::OauthContextMissing)?;
            match access_token(ctx) {
                Ok(token) => headers.push((
                    AUTHORIZATION_HEADER_KEY,
                    form_bearer_authorization_header(&token),
                )),
                Err(err) => debug!(error = %err, "no access token to forward"),
            }
            match encrypted_id_token(ctx) {
                Ok(token) => headers.push((ENC_ID_TOKEN_HEADER_KEY, token)),
                Err(err) => debug!(error = %err, "no encrypted id token to forward"),
            }
        }
        Ok(headers)
    }

    #[instrument(level = "debug", skip_all, fields(method = %method))]
    async fn dispatch(mut self, method: Method, url: &str) -> RequestResult<()> {
        if !self.build_errors.is_empty() {
            return Err(self.build_errors.swap_remove(0).into());
        }

        let mut target = Url::parse(&expand_template(&normalize_url(url)?, &self.path_parameters)?)?;
        append_query(&mut target, &self.query_parameters);

        let mut outbound = HeaderMap::new();
        for (name, value) in self.trust_headers()? {
            append_header(&mut outbound, name, &value)?;
        }
        for (name, value) in &self.headers {
            append_header(&mut outbound, name, value)?;
        }
        if !self.cookies.is_empty() {
            append_header(&mut outbound, COOKIE.as_str(), &cookie_header(&self.cookies))?;
        }

        let Self {
            client,
            tracer,
            validator,
            context,
            body,
            request_trace_hook,
            response_trace_hook,
            response_target,
            response_status_code,
            response_headers,
            response_cookies,
            ..
        } = self;

        let sensitive = is_sensitive_path(target.path());
        let description = target[Position::BeforeHost..Position::AfterQuery].to_string();
        let mut span = match context {
            Some(ctx) => {
                let parent = SpanParent {
                    span: ctx.span(),
                    trace_context: ctx.trace_context(),
                };
                let name = format!("{} | request/response", target.path());
                DispatchSpan::new(tracer.start_span(&name, parent))
            }
            None => DispatchSpan::disabled(),
        };
        for (name, value) in span.propagation_headers() {
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| RequestError::invalid_header(&name, e))?;
            let value = HeaderValue::from_str(&value).map_err(|e| RequestError::invalid_header(&name, e))?;
            outbound.insert(header, value);
        }
        if span.is_open() {
            let annotation = if sensitive {
                REQUEST_NOT_LOGGED_MESSAGE.to_string()
            } else {
                render_body(&body, request_trace_hook.as_ref())
            };
            span.annotate("request", &annotation, &description);
        }

        let mut request = reqwest::Request::new(method.clone(), target);
        *request.headers_mut() = outbound;
        if !body.is_empty() {
            *request.body_mut() = Some(body.into());
        }

        let response = match client.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                span.annotate("response", &format!("Some error occurred: {err}"), &description);
                span.end();
                warn!(error = %err, url = %description, "http request failed");
                return Err(RequestError::Transport(err));
            }
        };

        let status = response.status().as_u16();
        if let Some(slot) = response_status_code {
            *slot = status;
        }
        if let Some(slot) = response_headers {
            slot.clone_from(response.headers());
        }
        span.set_int_attribute("http.status_code", i64::from(status));
        if status >= 400 {
            span.set_bool_attribute("error", true);
        }

        let annotate_body = |span: &mut DispatchSpan, body: &[u8]| {
            if !span.is_open() {
                return;
            }
            let annotation = if sensitive {
                RESPONSE_NOT_LOGGED_MESSAGE.to_string()
            } else {
                render_body(body, response_trace_hook.as_ref())
            };
            span.annotate("response", &annotation, &description);
        };

        if !(200..400).contains(&status) {
            let error = match response.bytes().await {
                Ok(body) => {
                    annotate_body(&mut span, &body);
                    HttpError::new(status, body.to_vec())
                }
                Err(err) => {
                    let text = err.to_string();
                    span.annotate("response", &format!("Response body read Error: {text}"), &description);
                    HttpError::new(status, text.into_bytes())
                }
            };
            debug!(status, url = %description, "http request returned error status");
            return Err(error.into());
        }

        let cookies: Vec<Cookie> = if response_cookies.is_some() {
            response.cookies().map(Cookie::from).collect()
        } else {
            Vec::new()
        };
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        match response_target {
            Some(target) => {
                let body = match response.bytes().await {
                    Ok(body) => body,
                    Err(err) => {
                        span.annotate("response", &format!("Response body read Error: {err}"), &description);
                        return Err(RequestError::BodyRead(err));
                    }
                };
                if expects_multipart(target) {
                    if let Err(err) = decode_multipart(target, &content_type, &body) {
                        span.annotate("response", &format!("Response body -MIME- read Error: {err}"), &description);
                        return Err(err);
                    }
                    span.annotate("response", "MIME response received", &description);
                } else {
                    annotate_body(&mut span, &body);
                    decode_body(target, &content_type, &body, &validator)?;
                }
            }
            None => span.annotate("response", NO_BODY_CONTENT, &description),
        }

        if let Some(slot) = response_cookies {
            *slot = cookies;
        }
        span.end();
        debug!(status, url = %description, "http request completed");
        Ok(())
    }
}

fn append_header(headers: &mut HeaderMap, name: &str, value: &str) -> RequestResult<()> {
    let header = HeaderName::from_bytes(name.as_bytes()).map_err(|e| RequestError::invalid_header(name, e))?;
    let value = HeaderValue::from_str(value).map_err(|e| RequestError::invalid_header(name, e))?;
    headers.append(header, value);
    Ok(())
}

fn append_query(url: &mut Url, parameters: &BTreeMap<String, String>) {
    if parameters.is_empty() {
        return;
    }
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    pairs.retain(|(key, _)| !parameters.contains_key(key));
    pairs.extend(parameters.iter().map(|(k, v)| (k.clone(), v.clone())));
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    url.query_pairs_mut().clear().extend_pairs(&pairs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ValueContext;
    use crate::constants::CONTEXT_ACCESS_TOKEN;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Captured {
        calls: usize,
        url: Option<String>,
        headers: HeaderMap,
        body: Vec<u8>,
    }

    struct FakeClient {
        captured: Arc<Mutex<Captured>>,
        status: u16,
        content_type: &'static str,
        body: &'static str,
    }

    impl FakeClient {
        fn new(status: u16, content_type: &'static str, body: &'static str) -> (Self, Arc<Mutex<Captured>>) {
            let captured = Arc::new(Mutex::new(Captured::default()));
            let client = Self {
                captured: Arc::clone(&captured),
                status,
                content_type,
                body,
            };
            (client, captured)
        }
    }

    #[async_trait]
    impl HttpClient for FakeClient {
        async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, reqwest::Error> {
            let mut captured = self.captured.lock().unwrap();
            captured.calls += 1;
            captured.url = Some(request.url().to_string());
            captured.headers = request.headers().clone();
            captured.body = request
                .body()
                .and_then(reqwest::Body::as_bytes)
                .map(<[u8]>::to_vec)
                .unwrap_or_default();
            let response = http::Response::builder()
                .status(self.status)
                .header(CONTENT_TYPE, self.content_type)
                .header("Set-Cookie", "id_token=abc; Path=/")
                .body(self.body)
                .unwrap();
            Ok(reqwest::Response::from(response))
        }
    }

    #[derive(Debug, Default, serde::Deserialize, Serialize, PartialEq)]
    struct Payload {
        name: String,
    }

    #[tokio::test]
    async fn test_build_error_short_circuits() {
        let (client, captured) = FakeClient::new(200, JSON_CONTENT_TYPE, "{}");
        let err = HttpRequestBuilder::new(client)
            .new_request()
            .with_form_url_encoded([("n", serde_json::json!(1))])
            .post("https://svc/api")
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Build(BuildError::InvalidFormField { .. })));
        assert_eq!(captured.lock().unwrap().calls, 0);
    }

    #[tokio::test]
    async fn test_scheme_missing() {
        let (client, captured) = FakeClient::new(200, JSON_CONTENT_TYPE, "{}");
        let err = HttpRequestBuilder::new(client)
            .new_request()
            .get("svc/api")
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::UrlSchemeMissing));
        assert_eq!(captured.lock().unwrap().calls, 0);
    }

    #[tokio::test]
    async fn test_oauth_requires_context() {
        let (client, captured) = FakeClient::new(200, JSON_CONTENT_TYPE, "{}");
        let err = HttpRequestBuilder::new(client)
            .new_request()
            .with_oauth()
            .get("https://svc/api")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Context not set for forwarding oauth headers");
        assert_eq!(captured.lock().unwrap().calls, 0);
    }

    #[tokio::test]
    async fn test_request_shape() {
        let (client, captured) = FakeClient::new(200, JSON_CONTENT_TYPE, r#"{"name":"ok"}"#);
        let ctx = ValueContext::new()
            .with_value(CONTEXT_ACCESS_TOKEN, "tok")
            .with_value(TRACING_SESSION_HEADER_KEY, "sess");
        let mut payload = Payload::default();
        let mut status = 0;
        let mut cookies = Vec::new();

        HttpRequestBuilder::new(client)
            .new_request()
            .with_context(&ctx)
            .with_oauth()
            .with_json_body(&Payload { name: "in".to_string() })
            .add_header("X-Custom", "1")
            .add_cookie(Cookie::new("c", "v"))
            .add_query_parameters([("b", "2"), ("a", "1 1")])
            .add_path_parameters([("id", 7)])
            .response_as(&mut payload)
            .response_status_code_as(&mut status)
            .response_cookies_as(&mut cookies)
            .post("https://svc//users/{id}")
            .await
            .unwrap();

        assert_eq!(payload.name, "ok");
        assert_eq!(status, 200);
        assert_eq!(cookies[0].name, "id_token");

        let captured = captured.lock().unwrap();
        assert_eq!(captured.calls, 1);
        assert_eq!(captured.url.as_deref(), Some("https://svc/users/7?a=1+1&b=2"));
        assert_eq!(captured.headers["authorization"], "Bearer tok");
        assert_eq!(captured.headers["session-tracing-id"], "sess");
        assert_eq!(captured.headers["x-requested-with"], "XMLHttpRequest");
        assert_eq!(captured.headers["content-type"], JSON_CONTENT_TYPE);
        assert_eq!(captured.headers["cookie"], "c=v");
        assert!(captured.headers.get(ENC_ID_TOKEN_HEADER_KEY).is_none());
        assert_eq!(captured.body, br#"{"name":"in"}"#);
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let (client, _) = FakeClient::new(404, JSON_CONTENT_TYPE, "missing");
        let mut payload = Payload::default();
        let mut status = 0;
        let err = HttpRequestBuilder::new(client)
            .new_request()
            .response_as(&mut payload)
            .response_status_code_as(&mut status)
            .get("https://svc/api")
            .await
            .unwrap_err();
        assert_eq!(status, 404);
        match err {
            RequestError::Http(http) => {
                assert_eq!(http.status_code, 404);
                assert_eq!(http.response_body, b"missing");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_raw_string_target() {
        let (client, _) = FakeClient::new(200, "text/plain", "plain text");
        let mut text = String::new();
        HttpRequestBuilder::new(client)
            .new_request()
            .response_as(&mut text)
            .get("https://svc/api")
            .await
            .unwrap();
        assert_eq!(text, "plain text");
    }

    #[test]
    fn test_append_query_replaces_existing_key() {
        let mut url = Url::parse("https://svc/a?z=1&a=old").unwrap();
        let mut params = BTreeMap::new();
        params.insert("a".to_string(), "new".to_string());
        append_query(&mut url, &params);
        assert_eq!(url.query(), Some("a=new&z=1"));
    }
}
