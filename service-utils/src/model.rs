//! Wire models shared by the service clients.

use serde::{Deserialize, Serialize};

/// Claims of a decoded id token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdToken {
    /// User id
    #[serde(rename = "id")]
    pub user_id: String,
    /// User name
    pub username: String,
    /// Email address
    pub email: String,
    /// Subject
    pub subject: String,
    /// Hash of the access token the id token was issued with
    #[serde(rename = "at_hash")]
    pub access_token_hash: String,
}

impl IdToken {
    /// Whether every claim is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Body of a text decryption request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoRequest {
    /// Cipher text
    pub encrypted_text: String,
}

/// Body of a text decryption response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoResponse {
    /// Plain text
    #[serde(default)]
    pub decrypted_text: String,
}

/// Answer of an OAuth2 token introspection endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntrospectionResponse {
    /// Whether the token is active
    pub active: bool,
    /// Granted scopes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Client the token was issued to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Subject of the token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Expiry as a unix timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}
