//! Decoding of response bodies into caller-owned targets.

use std::any::Any;

use serde::de::DeserializeOwned;

use crate::error::{HttpError, RequestError, RequestResult};
use crate::http::multipart::{boundary_from_content_type, parse_parts};
use crate::validation::Validator;

/// Destination for a decoded response body.
///
/// Implemented for every deserializable type. The decoder checks the
/// concrete type first: `String` and `Vec<u8>` receive the raw body,
/// `Vec<Vec<u8>>` receives the parts of a multipart body, and anything else
/// is decoded as XML or JSON depending on the response content type.
pub trait ResponseTarget: Send {
    /// Access as [`Any`] for type checks.
    fn as_any(&self) -> &dyn Any;

    /// Mutable access as [`Any`] for raw assignment.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Replace the value with one decoded from JSON.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when `body` does not decode into the target type.
    fn decode_json(&mut self, body: &[u8]) -> Result<(), serde_json::Error>;

    /// Replace the value with one decoded from XML.
    ///
    /// # Errors
    ///
    /// Returns the XML error when `body` does not decode into the target type.
    fn decode_xml(&mut self, body: &[u8]) -> Result<(), quick_xml::DeError>;
}

impl<T> ResponseTarget for T
where
    T: DeserializeOwned + Send + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn decode_json(&mut self, body: &[u8]) -> Result<(), serde_json::Error> {
        *self = serde_json::from_slice(body)?;
        Ok(())
    }

    fn decode_xml(&mut self, body: &[u8]) -> Result<(), quick_xml::DeError> {
        *self = quick_xml::de::from_reader(body)?;
        Ok(())
    }
}

/// Whether the target receives multipart parts and needs the body split.
#[must_use]
pub fn expects_multipart(target: &dyn ResponseTarget) -> bool {
    target.as_any().is::<Vec<Vec<u8>>>()
}

/// Split a multipart body into the target's parts.
///
/// # Errors
///
/// - [`HttpError`] with status 500 when the content type is not multipart.
/// - [`RequestError::Multipart`] for the first malformed part.
pub fn decode_multipart(
    target: &mut dyn ResponseTarget,
    content_type: &str,
    body: &[u8],
) -> RequestResult<()> {
    let boundary = boundary_from_content_type(content_type)
        .ok_or_else(|| HttpError::new(500, Vec::new()))?;
    let parts = parse_parts(body, &boundary)?;
    if let Some(slot) = target.as_any_mut().downcast_mut::<Vec<Vec<u8>>>() {
        *slot = parts;
    }
    Ok(())
}

/// Decode a non-multipart body into `target` and validate it.
///
/// # Errors
///
/// Returns decode errors unchanged, or the validation failures reported by
/// `validator` for the target's type.
pub fn decode_body(
    target: &mut dyn ResponseTarget,
    content_type: &str,
    body: &[u8],
    validator: &Validator,
) -> RequestResult<()> {
    let any = target.as_any_mut();
    if let Some(text) = any.downcast_mut::<String>() {
        *text = String::from_utf8_lossy(body).into_owned();
        return Ok(());
    }
    if let Some(bytes) = any.downcast_mut::<Vec<u8>>() {
        *bytes = body.to_vec();
        return Ok(());
    }

    if is_xml(content_type) {
        target.decode_xml(body)?;
    } else {
        target.decode_json(body)?;
    }
    validator
        .validate_any(target.as_any())
        .map_err(RequestError::from)
}

fn is_xml(content_type: &str) -> bool {
    content_type.contains("application/xml") || content_type.contains("text/xml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationErrors;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Greeting {
        message: String,
    }

    #[test]
    fn test_string_target_receives_raw_body() {
        let mut target = String::new();
        decode_body(&mut target, "application/json", b"{\"raw\":true}", &Validator::new()).unwrap();
        assert_eq!(target, "{\"raw\":true}");
    }

    #[test]
    fn test_bytes_target_receives_raw_body() {
        let mut target: Vec<u8> = Vec::new();
        decode_body(&mut target, "", &[0, 159, 146], &Validator::new()).unwrap();
        assert_eq!(target, vec![0, 159, 146]);
    }

    #[test]
    fn test_json_and_xml_by_content_type() {
        let mut target = Greeting::default();
        decode_body(&mut target, "application/json; charset=utf-8", br#"{"message":"hi"}"#, &Validator::new())
            .unwrap();
        assert_eq!(target.message, "hi");

        let mut target = Greeting::default();
        decode_body(&mut target, "text/xml", b"<Greeting><message>yo</message></Greeting>", &Validator::new())
            .unwrap();
        assert_eq!(target.message, "yo");
    }

    #[test]
    fn test_malformed_json_is_decode_error() {
        let mut target = Greeting::default();
        let err = decode_body(&mut target, "application/json", b"{", &Validator::new()).unwrap_err();
        assert!(matches!(err, RequestError::Json(_)));
    }

    #[test]
    fn test_validation_runs_after_decode() {
        let validator = Validator::new().with_rule::<Greeting, _>(|g| {
            let mut errors = ValidationErrors::new();
            if g.message.len() < 3 {
                errors.add("message", "too short");
            }
            errors.into_result()
        });
        let mut target = Greeting::default();
        let err = decode_body(&mut target, "application/json", br#"{"message":"hi"}"#, &validator)
            .unwrap_err();
        assert!(matches!(err, RequestError::Validation(_)));
        assert_eq!(target.message, "hi");
    }

    #[test]
    fn test_multipart_target() {
        let mut target: Vec<Vec<u8>> = Vec::new();
        assert!(expects_multipart(&target));
        decode_multipart(&mut target, "multipart/mixed; boundary=b", b"--b\r\n\r\none\r\n--b\r\n\r\ntwo\r\n--b--")
            .unwrap();
        assert_eq!(target, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn test_multipart_bad_content_type_is_internal_error() {
        let mut target: Vec<Vec<u8>> = Vec::new();
        let err = decode_multipart(&mut target, "application/json", b"").unwrap_err();
        assert_eq!(err.status_code(), Some(500));
    }
}
