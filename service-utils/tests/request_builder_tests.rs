//! Request builder tests against a local mock server.

use http::HeaderMap;
use serde::{Deserialize, Serialize};
use service_utils::constants::{CONTEXT_ACCESS_TOKEN, TRACING_SESSION_HEADER_KEY};
use service_utils::http::Cookie;
use service_utils::validation::ValidationErrors;
use service_utils::{HttpConfig, HttpRequestBuilder, RequestError, ValueContext, Validator};
use wiremock::matchers::{
    body_json, body_string_contains, header, header_regex, method, path, query_param,
    query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
struct User {
    id: u32,
    name: String,
}

fn builder() -> HttpRequestBuilder {
    HttpRequestBuilder::from_config(&HttpConfig::default()).unwrap()
}

#[tokio::test]
async fn test_get_decodes_json_and_expands_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/42"))
        .and(query_param("expand", "roles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 42, "name": "jane"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut user = User::default();
    let mut status = 0;
    builder()
        .new_request()
        .add_path_parameters([("id", "42")])
        .add_query_parameters([("expand", "roles")])
        .response_as(&mut user)
        .response_status_code_as(&mut status)
        .get(&format!("{}//users/{{id}}", server.uri()))
        .await
        .unwrap();

    assert_eq!(status, 200);
    assert_eq!(
        user,
        User {
            id: 42,
            name: "jane".to_string()
        }
    );
}

#[tokio::test]
async fn test_post_sends_json_body_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(header("x-request-source", "billing"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({"id": 7, "name": "sam"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let user = User {
        id: 7,
        name: "sam".to_string(),
    };
    builder()
        .new_request()
        .add_header("X-Request-Source", "billing")
        .with_json_body(&user)
        .post(&format!("{}/users", server.uri()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_form_body_is_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/settings"))
        .and(header_regex("content-type", "^multipart/form-data; boundary=[0-9a-f]+$"))
        .and(body_string_contains("Content-Disposition: form-data; name=\"theme\"\r\n\r\ndark mode\r\n"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    builder()
        .new_request()
        .with_form_url_encoded([("theme", "dark mode")])
        .put(&format!("{}/settings", server.uri()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_error_status_returns_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/users/1"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "errorCode": "ERR_NOT_FOUND",
                "errorMessage": "user not found"
            })),
        )
        .mount(&server)
        .await;

    let err = builder()
        .new_request()
        .delete(&format!("{}/users/1", server.uri()))
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(404));
    let RequestError::Http(http_error) = err else {
        panic!("expected http error");
    };
    let api_error = http_error.api_error().unwrap();
    assert_eq!(api_error.error_code, "ERR_NOT_FOUND");
    assert_eq!(api_error.error_message, "user not found");
}

#[tokio::test]
async fn test_xml_response_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/3"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<User><id>3</id><name>kim</name></User>", "application/xml"),
        )
        .mount(&server)
        .await;

    let mut user = User::default();
    builder()
        .new_request()
        .response_as(&mut user)
        .get(&format!("{}/users/3", server.uri()))
        .await
        .unwrap();
    assert_eq!(user.name, "kim");
    assert_eq!(user.id, 3);
}

#[tokio::test]
async fn test_cookies_sent_and_received() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/session"))
        .and(header("cookie", "session=abc; theme=dark"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "refreshed=xyz; Path=/")
                .append_header("x-trace", "t1"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut cookies = Vec::new();
    let mut headers = HeaderMap::new();
    builder()
        .new_request()
        .add_cookie(Cookie::new("session", "abc"))
        .add_cookie(Cookie::new("theme", "dark"))
        .response_cookies_as(&mut cookies)
        .response_headers_as(&mut headers)
        .get(&format!("{}/session", server.uri()))
        .await
        .unwrap();

    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].name, "refreshed");
    assert_eq!(cookies[0].value, "xyz");
    assert_eq!(headers.get("x-trace").unwrap(), "t1");
}

#[tokio::test]
async fn test_context_forwards_session_and_oauth_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(header("authorization", "Bearer token-1"))
        .and(header("session-tracing-id", "session-9"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = ValueContext::new()
        .with_value(CONTEXT_ACCESS_TOKEN, "token-1")
        .with_value(TRACING_SESSION_HEADER_KEY, "session-9");
    builder()
        .new_request()
        .with_context(&ctx)
        .with_oauth()
        .get(&format!("{}/orders", server.uri()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_request_started_with_context_forwards_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/profile"))
        .and(header("authorization", "Bearer token-2"))
        .and(header("session-tracing-id", "session-3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = ValueContext::new()
        .with_value(CONTEXT_ACCESS_TOKEN, "token-2")
        .with_value(TRACING_SESSION_HEADER_KEY, "session-3");
    builder()
        .new_request_with_context(&ctx)
        .with_oauth()
        .get(&format!("{}/profile", server.uri()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_validator_rejects_decoded_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 0, "name": ""})))
        .mount(&server)
        .await;

    let validator = Validator::new().with_rule::<User, _>(|user| {
        let mut errors = ValidationErrors::new();
        if user.name.is_empty() {
            errors.add("name", "must not be empty");
        }
        errors.into_result()
    });
    let mut user = User::default();
    let err = builder()
        .with_validator(validator)
        .new_request()
        .response_as(&mut user)
        .get(&format!("{}/users/0", server.uri()))
        .await
        .unwrap_err();

    let RequestError::Validation(errors) = err else {
        panic!("expected validation error");
    };
    assert_eq!(errors.errors()[0].field, "name");
}

#[tokio::test]
async fn test_unset_template_variables_are_left_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "shoes"))
        .and(query_param_is_missing("page"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    builder()
        .new_request()
        .add_path_parameters([("q", "shoes")])
        .get(&format!("{}/search{{?q,page}}", server.uri()))
        .await
        .unwrap();
    builder()
        .new_request()
        .get(&format!("{}/users/{{id}}", server.uri()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_malformed_template_fails_before_dispatch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = builder()
        .new_request()
        .add_path_parameters([("id", "1")])
        .get(&format!("{}/users/{{id", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, RequestError::InvalidPathTemplate(_)));
    assert!(err.is_pre_dispatch());
}
