//! Span lifecycle for dispatches that stop before a decoded response.

use std::sync::Arc;

use serde::Deserialize;
use service_utils::constants::{REQUEST_NOT_LOGGED_MESSAGE, RESPONSE_NOT_LOGGED_MESSAGE};
use service_utils::{HttpRequestBuilder, RequestError, ValueContext};
use test_utils::mocks::{RecordingTracer, ScriptedClient, ScriptedResponse, SpanEvent};

#[derive(Debug, Default, Deserialize)]
struct Account {
    id: u64,
}

fn traced(client: &ScriptedClient, tracer: &RecordingTracer) -> HttpRequestBuilder {
    HttpRequestBuilder::new(client.clone()).with_tracer(Arc::new(tracer.clone()))
}

#[tokio::test]
async fn test_transport_error_ends_span_once() {
    let client = ScriptedClient::failing();
    let tracer = RecordingTracer::new();
    let ctx = ValueContext::new();

    let err = traced(&client, &tracer)
        .new_request_with_context(&ctx)
        .get("https://accounts.internal/api/v1/accounts")
        .await
        .unwrap_err();

    assert!(matches!(err, RequestError::Transport(_)));
    assert!(!err.is_pre_dispatch());
    assert_eq!(client.call_count(), 1);
    assert_eq!(tracer.ended_count(), 1);
    let annotations = tracer.annotations();
    assert!(annotations.last().unwrap().starts_with("Some error occurred"));
    assert_eq!(tracer.events().last(), Some(&SpanEvent::Ended));
}

#[tokio::test]
async fn test_error_status_on_crypto_path_ends_span_once() {
    let client = ScriptedClient::new(ScriptedResponse::new(500).with_body("plain secret"));
    let tracer = RecordingTracer::new();
    let ctx = ValueContext::new();

    let err = traced(&client, &tracer)
        .new_request_with_context(&ctx)
        .with_json_body(&serde_json::json!({"encrypted_text": "cipher"}))
        .post("https://gw.internal/api/crypto/v1/text/decrypt")
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(500));
    assert_eq!(tracer.ended_count(), 1);
    assert_eq!(
        tracer.annotations(),
        vec![REQUEST_NOT_LOGGED_MESSAGE.to_string(), RESPONSE_NOT_LOGGED_MESSAGE.to_string()]
    );
    assert!(
        tracer
            .events()
            .contains(&SpanEvent::IntAttribute("http.status_code".to_string(), 500))
    );
}

#[tokio::test]
async fn test_decode_error_ends_span_once() {
    let client = ScriptedClient::new(
        ScriptedResponse::new(200)
            .with_header("Content-Type", "application/json")
            .with_body("{\"id\": "),
    );
    let tracer = RecordingTracer::new();
    let ctx = ValueContext::new();
    let mut account = Account::default();

    let err = traced(&client, &tracer)
        .new_request_with_context(&ctx)
        .response_as(&mut account)
        .get("https://accounts.internal/api/v1/accounts/1")
        .await
        .unwrap_err();

    assert!(matches!(err, RequestError::Json(_)));
    assert_eq!(account.id, 0);
    assert_eq!(tracer.ended_count(), 1);
    assert_eq!(tracer.events().last(), Some(&SpanEvent::Ended));
}
