//! Error types surfaced by the request builder.
//!
//! Configuration mistakes are captured as [`BuildError`]s and only reported
//! when a request is dispatched. Everything that can go wrong during dispatch
//! is a [`RequestError`]; non-2xx responses become [`HttpError`] and the
//! service-facing error body is [`ApiError`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::multipart::MultipartError;
use crate::validation::ValidationErrors;

/// Result alias for dispatch operations.
pub type RequestResult<T> = Result<T, RequestError>;

/// Error body exchanged between services.
///
/// Serializes as `{"errorCode": .., "errorMessage": .., "additionalData": ..}`
/// with `additionalData` omitted when absent.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("ErrorCode: {error_code} ErrorMessage: {error_message}")]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine readable error code.
    pub error_code: String,
    /// Human readable message.
    pub error_message: String,
    /// Optional structured details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<serde_json::Value>,
}

impl ApiError {
    /// Create an error with a code and message.
    #[must_use]
    pub fn new(error_code: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            error_message: error_message.into(),
            additional_data: None,
        }
    }

    /// Attach structured details.
    #[must_use]
    pub fn with_additional_data(mut self, data: serde_json::Value) -> Self {
        self.additional_data = Some(data);
        self
    }
}

/// A response whose status code fell outside `[200, 400)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("StatusCode : {status_code}, ResponseBody : {}", String::from_utf8_lossy(response_body))]
pub struct HttpError {
    /// Status code returned by the server.
    pub status_code: u16,
    /// Raw response body, or the body read error text.
    pub response_body: Vec<u8>,
}

impl HttpError {
    /// Create an HTTP error.
    #[must_use]
    pub fn new(status_code: u16, response_body: impl Into<Vec<u8>>) -> Self {
        Self {
            status_code,
            response_body: response_body.into(),
        }
    }

    /// Response body decoded lossily as UTF-8.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.response_body).into_owned()
    }

    /// Decode the response body as an [`ApiError`], if it is one.
    #[must_use]
    pub fn api_error(&self) -> Option<ApiError> {
        serde_json::from_slice(&self.response_body).ok()
    }
}

/// Error recorded while configuring a request body.
#[derive(Error, Debug)]
pub enum BuildError {
    /// JSON body could not be serialized
    #[error("failed to encode JSON body: {0}")]
    Json(#[from] serde_json::Error),

    /// XML body could not be serialized
    #[error("failed to encode XML body: {0}")]
    Xml(String),

    /// Multipart field value of an unsupported kind
    #[error("only multipart files and strings are supported (field `{field}` is {kind})")]
    InvalidFormField {
        /// Form field name
        field: String,
        /// Kind of the rejected value
        kind: String,
    },

    /// Upload file could not be read
    #[error("failed to read upload file {path}: {source}")]
    File {
        /// Path of the file
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    /// Create an XML encoding error.
    #[must_use]
    pub fn xml(err: impl fmt::Display) -> Self {
        Self::Xml(err.to_string())
    }

    /// Error code reported to callers for this build failure.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidFormField { .. } => crate::constants::ERR_INVALID_REQUEST_TYPE,
            _ => crate::constants::ERR_INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error returned from dispatching a request.
#[derive(Error, Debug)]
pub enum RequestError {
    /// A configuration step failed before dispatch
    #[error("request build failed: {0}")]
    Build(#[from] BuildError),

    /// URL does not start with `http://` or `https://`
    #[error("Url scheme missing")]
    UrlSchemeMissing,

    /// Path template could not be parsed
    #[error("Invalid path template: {0}")]
    InvalidPathTemplate(String),

    /// Final URL was rejected
    #[error("invalid request url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Header name or value was rejected
    #[error("invalid header {name}: {reason}")]
    InvalidHeader {
        /// Header name
        name: String,
        /// Rejection reason
        reason: String,
    },

    /// Oauth forwarding requested without a trust context
    #[error("Context not set for forwarding oauth headers")]
    OauthContextMissing,

    /// Transport failed before a response arrived
    #[error(transparent)]
    Transport(reqwest::Error),

    /// Response body could not be read
    #[error("failed to read response body: {0}")]
    BodyRead(reqwest::Error),

    /// Response status outside `[200, 400)`
    #[error(transparent)]
    Http(#[from] HttpError),

    /// JSON response body could not be decoded
    #[error("failed to decode JSON response: {0}")]
    Json(#[from] serde_json::Error),

    /// XML response body could not be decoded
    #[error("failed to decode XML response: {0}")]
    Xml(#[from] quick_xml::DeError),

    /// Multipart response could not be split into parts
    #[error("failed to read multipart response: {0}")]
    Multipart(#[from] MultipartError),

    /// Decoded response failed validation
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

impl RequestError {
    /// Create an invalid header error.
    #[must_use]
    pub fn invalid_header(name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::InvalidHeader {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Status code of an HTTP error, if this is one.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http(err) => Some(err.status_code),
            _ => None,
        }
    }

    /// Check whether the error happened before any network call.
    #[must_use]
    pub const fn is_pre_dispatch(&self) -> bool {
        matches!(
            self,
            Self::Build(_)
                | Self::UrlSchemeMissing
                | Self::InvalidPathTemplate(_)
                | Self::InvalidUrl(_)
                | Self::InvalidHeader { .. }
                | Self::OauthContextMissing
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display() {
        let err = HttpError::new(500, b"boom".to_vec());
        assert_eq!(err.to_string(), "StatusCode : 500, ResponseBody : boom");
    }

    #[test]
    fn test_api_error_display_and_json() {
        let err = ApiError::new("ERR_X", "went wrong");
        assert_eq!(err.to_string(), "ErrorCode: ERR_X ErrorMessage: went wrong");

        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"errorCode": "ERR_X", "errorMessage": "went wrong"})
        );
    }

    #[test]
    fn test_api_error_from_http_error() {
        let body = br#"{"errorCode":"ERR_A","errorMessage":"m","additionalData":{"k":1}}"#;
        let err = HttpError::new(400, body.to_vec());
        let api = err.api_error().unwrap();
        assert_eq!(api.error_code, "ERR_A");
        assert_eq!(api.additional_data, Some(serde_json::json!({"k": 1})));
    }

    #[test]
    fn test_pre_dispatch_classification() {
        assert!(RequestError::UrlSchemeMissing.is_pre_dispatch());
        assert!(RequestError::OauthContextMissing.is_pre_dispatch());
        assert!(!RequestError::Http(HttpError::new(404, Vec::new())).is_pre_dispatch());
    }

    #[test]
    fn test_status_code_accessor() {
        let err = RequestError::from(HttpError::new(503, Vec::new()));
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(RequestError::UrlSchemeMissing.status_code(), None);
    }

    #[test]
    fn test_build_error_codes() {
        let err = BuildError::InvalidFormField {
            field: "n".to_string(),
            kind: "number".to_string(),
        };
        assert_eq!(err.error_code(), "ERR_INVALID_REQUEST_TYPE");
        assert!(err.to_string().starts_with("only multipart files and strings are supported"));
        assert_eq!(BuildError::xml("bad").error_code(), "ERR_INTERNAL_SERVER_ERROR");
    }
}
