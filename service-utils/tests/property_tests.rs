//! Property-based tests for the request builder and token extraction.
//!
//! Requests go through a scripted transport so every property can count the
//! calls that actually left the process.

use std::sync::Arc;

use proptest::prelude::*;
use service_utils::constants::{
    CONTEXT_ACCESS_TOKEN, CONTEXT_ENC_ID_TOKEN, REQUEST_NOT_LOGGED_MESSAGE, RESPONSE_NOT_LOGGED_MESSAGE,
};
use service_utils::context::{access_token, encrypted_id_token};
use service_utils::{FrameworkContext, HttpRequestBuilder, RequestError, ValueContext};
use test_utils::mocks::{RecordingTracer, ScriptedClient, ScriptedResponse};
use test_utils::{
    SamplePayload, error_status_strategy, header_pairs_strategy, http_url_strategy, query_pairs_strategy,
    sample_payload_strategy, success_status_strategy, token_strategy, url_without_scheme_strategy,
};

fn builder(client: &ScriptedClient) -> HttpRequestBuilder {
    HttpRequestBuilder::new(client.clone())
}

// A successful dispatch reaches the transport exactly once.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_one_transport_call_per_dispatch(
        url in http_url_strategy(),
        status in success_status_strategy(),
    ) {
        let client = ScriptedClient::new(ScriptedResponse::new(status));
        let result = tokio_test::block_on(builder(&client).new_request().get(&url));
        prop_assert!(result.is_ok());
        prop_assert_eq!(client.call_count(), 1);
    }

    #[test]
    fn prop_json_body_round_trips(payload in sample_payload_strategy()) {
        let echoed = serde_json::to_value(&payload).unwrap();
        let client = ScriptedClient::new(ScriptedResponse::json(200, &echoed));
        let mut decoded = SamplePayload {
            name: String::new(),
            count: 0,
            tags: Vec::new(),
            active: false,
        };
        let result = tokio_test::block_on(
            builder(&client)
                .new_request()
                .with_json_body(&payload)
                .response_as(&mut decoded)
                .post("https://echo.internal/payload"),
        );
        prop_assert!(result.is_ok());
        prop_assert_eq!(&decoded, &payload);

        let sent = client.last_request().unwrap();
        let sent: SamplePayload = serde_json::from_slice(&sent.body).unwrap();
        prop_assert_eq!(sent, payload);
    }
}

// Requests that cannot be sent never reach the transport.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_missing_scheme_is_rejected_before_dispatch(url in url_without_scheme_strategy()) {
        let client = ScriptedClient::default();
        let result = tokio_test::block_on(builder(&client).new_request().get(&url));
        prop_assert!(matches!(result, Err(RequestError::UrlSchemeMissing)));
        prop_assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn prop_oauth_without_context_is_rejected(url in http_url_strategy()) {
        let client = ScriptedClient::default();
        let result = tokio_test::block_on(builder(&client).new_request().with_oauth().post(&url));
        prop_assert!(matches!(result, Err(RequestError::OauthContextMissing)));
        prop_assert_eq!(client.call_count(), 0);
    }
}

// Error statuses surface with the exact status and body.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_error_status_carries_status_and_body(
        status in error_status_strategy(),
        body in "[a-zA-Z0-9 ]{0,40}",
    ) {
        let client = ScriptedClient::new(ScriptedResponse::new(status).with_body(body.clone()));
        let mut ignored = String::new();
        let result = tokio_test::block_on(
            builder(&client)
                .new_request()
                .response_as(&mut ignored)
                .get("https://api.internal/resource"),
        );
        match result {
            Err(RequestError::Http(err)) => {
                prop_assert_eq!(err.status_code, status);
                prop_assert_eq!(err.body_text(), body);
            }
            other => prop_assert!(false, "unexpected result: {:?}", other),
        }
        prop_assert!(ignored.is_empty());
    }
}

// Crypto routes never record bodies on the span.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_crypto_paths_use_placeholders(secret in "[a-z]{8,16}", status in success_status_strategy()) {
        let client = ScriptedClient::new(
            ScriptedResponse::new(status).with_header("Content-Type", "text/plain").with_body(secret.clone()),
        );
        let tracer = RecordingTracer::new();
        let ctx = ValueContext::new();
        let mut body = String::new();
        let result = tokio_test::block_on(
            builder(&client)
                .with_tracer(Arc::new(tracer.clone()))
                .new_request()
                .with_context(&ctx)
                .with_json_body(&serde_json::json!({ "secret": secret }))
                .response_as(&mut body)
                .post("https://gateway.internal/api/crypto/v1/text/decrypt"),
        );
        prop_assert!(result.is_ok());
        prop_assert_eq!(&body, &secret);
        let annotations = tracer.annotations();
        prop_assert_eq!(
            annotations,
            vec![REQUEST_NOT_LOGGED_MESSAGE.to_string(), RESPONSE_NOT_LOGGED_MESSAGE.to_string()]
        );
        prop_assert_eq!(tracer.ended_count(), 1);
    }
}

// Configuration order does not change the outgoing request.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_configuration_order_is_irrelevant(
        headers in header_pairs_strategy(),
        query in query_pairs_strategy(),
    ) {
        let forward = ScriptedClient::default();
        let reverse = ScriptedClient::default();

        tokio_test::block_on(
            builder(&forward)
                .new_request()
                .add_headers(headers.clone())
                .add_query_parameters(query.clone())
                .get("https://api.internal/items"),
        )
        .unwrap();
        tokio_test::block_on(
            builder(&reverse)
                .new_request()
                .add_query_parameters(query.into_iter().rev())
                .add_headers(headers.into_iter().rev())
                .get("https://api.internal/items"),
        )
        .unwrap();

        let a = forward.last_request().unwrap();
        let b = reverse.last_request().unwrap();
        prop_assert_eq!(a.url, b.url);
        prop_assert_eq!(a.headers, b.headers);
    }
}

// Tokens stored in a plain context are read back unchanged.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_token_extraction_symmetry(access in token_strategy(), enc_id in token_strategy()) {
        let ctx = ValueContext::new()
            .with_value(CONTEXT_ACCESS_TOKEN, access.clone())
            .with_value(CONTEXT_ENC_ID_TOKEN, enc_id.clone());
        prop_assert_eq!(access_token(&ctx).unwrap(), access);
        prop_assert_eq!(encrypted_id_token(&ctx).unwrap(), enc_id);
    }

    #[test]
    fn prop_header_tokens_extracted_independently(token in token_strategy()) {
        let bearer_only = http::Request::builder()
            .header("Authorization", format!("Bearer {token}"))
            .body(())
            .unwrap();
        let ctx = FrameworkContext::from_request(&bearer_only);
        prop_assert_eq!(access_token(&ctx).unwrap(), token.clone());
        prop_assert!(encrypted_id_token(&ctx).is_err());

        let id_only = http::Request::builder()
            .header("Enc-Id-Token", token.as_str())
            .body(())
            .unwrap();
        let ctx = FrameworkContext::from_request(&id_only);
        prop_assert_eq!(encrypted_id_token(&ctx).unwrap(), token);
        prop_assert!(access_token(&ctx).is_err());
    }

    #[test]
    fn prop_forwarded_tokens_match_context(access in token_strategy(), enc_id in token_strategy()) {
        let client = ScriptedClient::default();
        let ctx = ValueContext::new()
            .with_value(CONTEXT_ACCESS_TOKEN, access.clone())
            .with_value(CONTEXT_ENC_ID_TOKEN, enc_id.clone());
        tokio_test::block_on(
            builder(&client)
                .new_request()
                .with_context(&ctx)
                .with_oauth()
                .get("https://api.internal/me"),
        )
        .unwrap();

        let sent = client.last_request().unwrap();
        let expected = format!("Bearer {access}");
        prop_assert_eq!(sent.header("authorization"), Some(expected.as_str()));
        prop_assert_eq!(sent.header("enc-id-token"), Some(enc_id.as_str()));
    }
}
