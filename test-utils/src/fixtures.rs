//! Test fixtures with sample data.

use jsonwebtoken::{EncodingKey, Header, encode};
use service_utils::alert::email::{EmailAttachment, EmailDetails};
use service_utils::constants::{CONTEXT_ACCESS_TOKEN, CONTEXT_ENC_ID_TOKEN, TRACE_KEY};
use service_utils::context::ValueContext;
use service_utils::model::IdToken;
use service_utils::oauth::access_token_hash;

const SIGNING_SECRET: &[u8] = b"test-signing-secret";

/// Access token used by the fixtures.
pub const SAMPLE_ACCESS_TOKEN: &str = "sample-access-token";

/// Encrypted id token used by the fixtures.
pub const SAMPLE_ENC_ID_TOKEN: &str = "sample-enc-id-token";

/// Id token issued together with `access_token`.
#[must_use]
pub fn id_token_for(access_token: &str) -> IdToken {
    IdToken {
        user_id: "user-123".to_string(),
        username: "jane".to_string(),
        email: "jane@example.com".to_string(),
        subject: "jane@example.com".to_string(),
        access_token_hash: access_token_hash(access_token),
    }
}

/// `claims` signed as an HS256 JWT.
#[must_use]
pub fn signed_jwt(claims: &IdToken) -> String {
    encode(&Header::default(), claims, &EncodingKey::from_secret(SIGNING_SECRET)).unwrap_or_default()
}

/// Plain context carrying both tokens and a trace id.
#[must_use]
pub fn authenticated_context() -> ValueContext {
    ValueContext::new()
        .with_value(CONTEXT_ACCESS_TOKEN, SAMPLE_ACCESS_TOKEN)
        .with_value(CONTEXT_ENC_ID_TOKEN, SAMPLE_ENC_ID_TOKEN)
        .with_value(TRACE_KEY, "000abc")
}

/// Email with one attachment.
#[must_use]
pub fn sample_email() -> EmailDetails {
    EmailDetails {
        from: "noreply@example.com".to_string(),
        to: vec!["jane@example.com".to_string()],
        subject: "Welcome".to_string(),
        content: "<p>Hello Jane</p>".to_string(),
        attachments: vec![EmailAttachment {
            file_name: "terms.txt".to_string(),
            content: b"terms".to_vec(),
        }],
    }
}
