//! Mock implementations for testing.
//!
//! [`ScriptedClient`] stands in for the HTTP transport and records every
//! request it receives. [`RecordingTracer`] records span activity.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use http::HeaderMap;
use service_utils::http::HttpClient;
use service_utils::trace::{SpanParent, TraceSpan, Tracer};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Canned response returned by [`ScriptedClient`].
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    /// Status code
    pub status: u16,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Vec<u8>,
}

impl ScriptedResponse {
    /// Response with `status` and an empty body.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// JSON response with `status`.
    #[must_use]
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status)
            .with_header("Content-Type", "application/json")
            .with_body(body.to_string())
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    fn into_response(self) -> reqwest::Response {
        let mut builder = http::Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder
            .body(self.body)
            .unwrap_or_else(|_| http::Response::new(Vec::new()));
        reqwest::Response::from(response)
    }
}

/// Request seen by [`ScriptedClient`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method
    pub method: String,
    /// Full URL
    pub url: String,
    /// Headers as sent
    pub headers: HeaderMap,
    /// Body bytes
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// Header value as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Transport answering from a script and recording requests.
///
/// Responses are served in order; once the script is exhausted the fallback
/// response is repeated. A client built with [`ScriptedClient::failing`]
/// records each request and then fails it with a transport error.
#[derive(Debug, Clone)]
pub struct ScriptedClient {
    script: Arc<Mutex<VecDeque<ScriptedResponse>>>,
    fallback: ScriptedResponse,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    failing: bool,
}

impl Default for ScriptedClient {
    fn default() -> Self {
        Self::new(ScriptedResponse::new(200))
    }
}

impl ScriptedClient {
    /// Client always answering `fallback`.
    #[must_use]
    pub fn new(fallback: ScriptedResponse) -> Self {
        Self {
            script: Arc::default(),
            fallback,
            requests: Arc::default(),
            failing: false,
        }
    }

    /// Client whose every request fails before a response arrives.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Queue `response` before the fallback.
    #[must_use]
    pub fn then(self, response: ScriptedResponse) -> Self {
        lock(&self.script).push_back(response);
        self
    }

    /// Number of requests received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Most recent request.
    #[must_use]
    pub fn last_request(&self) -> Option<RecordedRequest> {
        lock(&self.requests).last().cloned()
    }
}

#[async_trait]
impl HttpClient for ScriptedClient {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, reqwest::Error> {
        lock(&self.requests).push(RecordedRequest {
            method: request.method().to_string(),
            url: request.url().to_string(),
            headers: request.headers().clone(),
            body: request
                .body()
                .and_then(reqwest::Body::as_bytes)
                .map(<[u8]>::to_vec)
                .unwrap_or_default(),
        });
        if self.failing {
            // An empty host never parses, so this always yields a reqwest error.
            if let Err(err) = reqwest::Client::new().get("http://").build() {
                return Err(err);
            }
        }
        let next = lock(&self.script).pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()).into_response())
    }
}

/// Span activity captured by [`RecordingTracer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanEvent {
    /// Span opened with this name
    Started(String),
    /// Annotation key, value and description
    Annotated(String, String, String),
    /// Numeric attribute
    IntAttribute(String, i64),
    /// Boolean attribute
    BoolAttribute(String, bool),
    /// Span closed
    Ended,
}

/// Tracer recording every span event in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
    events: Arc<Mutex<Vec<SpanEvent>>>,
}

impl RecordingTracer {
    /// Create an empty tracer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<SpanEvent> {
        lock(&self.events).clone()
    }

    /// Annotation values recorded so far.
    #[must_use]
    pub fn annotations(&self) -> Vec<String> {
        lock(&self.events)
            .iter()
            .filter_map(|event| match event {
                SpanEvent::Annotated(_, value, _) => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of spans closed.
    #[must_use]
    pub fn ended_count(&self) -> usize {
        lock(&self.events)
            .iter()
            .filter(|event| **event == SpanEvent::Ended)
            .count()
    }
}

impl Tracer for RecordingTracer {
    fn start_span(&self, name: &str, _parent: SpanParent<'_>) -> Box<dyn TraceSpan> {
        lock(&self.events).push(SpanEvent::Started(name.to_string()));
        Box::new(RecordingSpan {
            events: Arc::clone(&self.events),
        })
    }
}

struct RecordingSpan {
    events: Arc<Mutex<Vec<SpanEvent>>>,
}

impl TraceSpan for RecordingSpan {
    fn annotate(&mut self, key: &str, value: &str, description: &str) {
        lock(&self.events).push(SpanEvent::Annotated(
            key.to_string(),
            value.to_string(),
            description.to_string(),
        ));
    }

    fn set_int_attribute(&mut self, key: &str, value: i64) {
        lock(&self.events).push(SpanEvent::IntAttribute(key.to_string(), value));
    }

    fn set_bool_attribute(&mut self, key: &str, value: bool) {
        lock(&self.events).push(SpanEvent::BoolAttribute(key.to_string(), value));
    }

    fn propagation_headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn end(&mut self) {
        lock(&self.events).push(SpanEvent::Ended);
    }
}
