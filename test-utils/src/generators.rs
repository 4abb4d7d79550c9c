//! Shared proptest generators.

use proptest::prelude::*;
use serde::{Deserialize, Serialize};

/// Generate `https://` URLs with a host and a path.
pub fn http_url_strategy() -> impl Strategy<Value = String> {
    ("[a-z]{3,10}", prop::collection::vec("[a-z0-9]{1,8}", 0..4))
        .prop_map(|(host, segments)| format!("https://{host}.internal/{}", segments.join("/")))
}

/// Generate URLs without an `http(s)://` prefix.
pub fn url_without_scheme_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{3,10}\\.internal/[a-z]{1,8}",
        "ftp://[a-z]{3,10}/[a-z]{1,8}",
        "/[a-z]{1,8}/[a-z]{1,8}",
    ]
}

/// Generate status codes in `[200, 400)`.
pub fn success_status_strategy() -> impl Strategy<Value = u16> {
    200u16..400
}

/// Generate status codes outside `[200, 400)` that a server can send.
pub fn error_status_strategy() -> impl Strategy<Value = u16> {
    prop_oneof![100u16..200, 400u16..600]
}

/// Generate header name and value pairs with distinct names.
pub fn header_pairs_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::btree_map("x-[a-z]{1,10}", "[A-Za-z0-9]{1,16}", 0..5)
        .prop_map(|headers| headers.into_iter().collect())
}

/// Generate query parameter pairs with distinct keys.
pub fn query_pairs_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::btree_map("[a-z]{1,6}", "[a-z0-9 ]{0,8}", 0..5)
        .prop_map(|pairs| pairs.into_iter().collect())
}

/// Generate opaque token strings.
pub fn token_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_-]{16,48}"
}

/// Structured body used by round-trip properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePayload {
    /// Name
    pub name: String,
    /// Count
    pub count: i64,
    /// Tags
    pub tags: Vec<String>,
    /// Active flag
    pub active: bool,
}

/// Generate [`SamplePayload`] values.
pub fn sample_payload_strategy() -> impl Strategy<Value = SamplePayload> {
    (
        "\\PC{0,20}",
        any::<i64>(),
        prop::collection::vec("[a-z]{1,8}", 0..4),
        any::<bool>(),
    )
        .prop_map(|(name, count, tags, active)| SamplePayload {
            name,
            count,
            tags,
            active,
        })
}
