//! `multipart/form-data` request bodies and multipart response parsing.

use std::path::PathBuf;

use bytes::Bytes;
use thiserror::Error;

use crate::error::BuildError;

const CRLF: &[u8] = b"\r\n";

/// Multipart response could not be split into parts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MultipartError {
    /// Body does not contain the opening boundary
    #[error("multipart boundary not found in body")]
    MissingBoundary,

    /// A part is cut short or lacks its header terminator
    #[error("malformed multipart part {index}: {reason}")]
    MalformedPart {
        /// Zero-based part index
        index: usize,
        /// What was wrong
        reason: &'static str,
    },
}

/// File read from disk when the request body is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    /// Path of the file to send
    pub file_path: PathBuf,
    /// File name announced to the server
    pub file_name: String,
}

impl FileUpload {
    /// Create an upload of `file_path` named `file_name`.
    #[must_use]
    pub fn new(file_path: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            file_name: file_name.into(),
        }
    }
}

/// File already held in memory, such as one received in an inbound form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// File name announced to the server
    pub file_name: String,
    /// Content type of the file
    pub content_type: String,
    /// File content
    pub content: Bytes,
}

/// Value of a single form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    /// Plain text field
    Text(String),
    /// JSON document sent as an `application/json` part
    Json(Vec<u8>),
    /// File read from disk
    File(FileUpload),
    /// File held in memory
    Part(FilePart),
    /// Value that cannot be sent as a form field; rejected when the body is built
    Unsupported(String),
}

impl From<String> for FormValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for FormValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Json(value)
    }
}

impl From<FileUpload> for FormValue {
    fn from(value: FileUpload) -> Self {
        Self::File(value)
    }
}

impl From<FilePart> for FormValue {
    fn from(value: FilePart) -> Self {
        Self::Part(value)
    }
}

impl From<serde_json::Value> for FormValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::String(text) => Self::Text(text),
            Value::Null => Self::Unsupported("null".to_string()),
            Value::Bool(_) => Self::Unsupported("a boolean".to_string()),
            Value::Number(_) => Self::Unsupported("a number".to_string()),
            Value::Array(_) => Self::Unsupported("an array".to_string()),
            Value::Object(_) => Self::Unsupported("an object".to_string()),
        }
    }
}

/// Encoded multipart body and its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartBody {
    /// `multipart/form-data; boundary=...`
    pub content_type: String,
    /// Encoded body
    pub body: Vec<u8>,
}

/// Encode `fields` as `multipart/form-data` using `boundary`.
///
/// # Errors
///
/// Returns a [`BuildError`] for unsupported values or unreadable files.
pub fn encode_form<I>(fields: I, boundary: &str) -> Result<MultipartBody, BuildError>
where
    I: IntoIterator<Item = (String, FormValue)>,
{
    let mut body = Vec::new();
    for (name, value) in fields {
        let name = escape_quotes(&name);
        let (headers, content) = match value {
            FormValue::Text(text) => (
                vec![format!("Content-Disposition: form-data; name=\"{name}\"")],
                text.into_bytes(),
            ),
            FormValue::Json(bytes) => (
                vec![
                    format!("Content-Disposition: form-data; name=\"{name}\""),
                    "Content-Type: application/json".to_string(),
                ],
                bytes,
            ),
            FormValue::Part(part) => (
                vec![
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{}\"",
                        escape_quotes(&part.file_name)
                    ),
                    format!("Content-Type: {}", part.content_type),
                ],
                part.content.to_vec(),
            ),
            FormValue::File(upload) => {
                let content = std::fs::read(&upload.file_path).map_err(|source| BuildError::File {
                    path: upload.file_path.display().to_string(),
                    source,
                })?;
                (
                    vec![
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{}\"",
                            escape_quotes(&upload.file_name)
                        ),
                        "Content-Type: application/octet-stream".to_string(),
                    ],
                    content,
                )
            }
            FormValue::Unsupported(kind) => {
                return Err(BuildError::InvalidFormField { field: name, kind });
            }
        };

        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        for header in headers {
            body.extend_from_slice(header.as_bytes());
            body.extend_from_slice(CRLF);
        }
        body.extend_from_slice(CRLF);
        body.extend_from_slice(&content);
        body.extend_from_slice(CRLF);
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    Ok(MultipartBody {
        content_type: format!("multipart/form-data; boundary={boundary}"),
        body,
    })
}

/// Boundary parameter of a multipart content type.
///
/// Returns `None` when the content type does not parse or is not multipart.
#[must_use]
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    let media: mime::Mime = content_type.parse().ok()?;
    if media.type_() != mime::MULTIPART {
        return None;
    }
    media
        .get_param(mime::BOUNDARY)
        .map(|b| b.as_str().to_string())
        .filter(|b| !b.is_empty())
}

/// Split a multipart body into the content of its parts, in order.
///
/// # Errors
///
/// Returns the first framing problem encountered.
pub fn parse_parts(body: &[u8], boundary: &str) -> Result<Vec<Vec<u8>>, MultipartError> {
    let delimiter = format!("--{boundary}").into_bytes();
    let close = format!("\r\n--{boundary}").into_bytes();

    let mut position = find(body, &delimiter).ok_or(MultipartError::MissingBoundary)? + delimiter.len();
    let mut parts = Vec::new();

    loop {
        let index = parts.len();
        let rest = &body[position..];
        if rest.starts_with(b"--") {
            return Ok(parts);
        }
        let rest = rest.strip_prefix(CRLF).ok_or(MultipartError::MalformedPart {
            index,
            reason: "missing line break after boundary",
        })?;

        let content_start = if rest.starts_with(CRLF) {
            CRLF.len()
        } else {
            find(rest, b"\r\n\r\n").ok_or(MultipartError::MalformedPart {
                index,
                reason: "missing header terminator",
            })? + 4
        };
        let content = &rest[content_start..];
        let content_len = find(content, &close).ok_or(MultipartError::MalformedPart {
            index,
            reason: "unterminated part",
        })?;
        parts.push(content[..content_len].to_vec());

        let consumed = body.len() - content.len() + content_len + close.len();
        position = consumed;
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_text_and_json_parts() {
        let fields = vec![
            ("name".to_string(), FormValue::from("value")),
            ("meta".to_string(), FormValue::from(br#"{"a":1}"#.to_vec())),
        ];
        let encoded = encode_form(fields, "XYZ").unwrap();
        assert_eq!(encoded.content_type, "multipart/form-data; boundary=XYZ");

        let expected = "--XYZ\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nvalue\r\n\
             --XYZ\r\nContent-Disposition: form-data; name=\"meta\"\r\nContent-Type: application/json\r\n\r\n{\"a\":1}\r\n\
             --XYZ--\r\n";
        assert_eq!(String::from_utf8(encoded.body).unwrap(), expected);
    }

    #[test]
    fn test_encode_rejects_unsupported_value() {
        let fields = vec![("n".to_string(), FormValue::from(serde_json::json!(5)))];
        let err = encode_form(fields, "B").unwrap_err();
        assert!(matches!(err, BuildError::InvalidFormField { ref kind, .. } if kind == "a number"));
    }

    #[test]
    fn test_encode_missing_file() {
        let upload = FileUpload::new("/definitely/not/here.txt", "here.txt");
        let err = encode_form(vec![("f".to_string(), upload.into())], "B").unwrap_err();
        assert!(matches!(err, BuildError::File { .. }));
    }

    #[test]
    fn test_quotes_escaped() {
        let fields = vec![("a\"b".to_string(), FormValue::from("v"))];
        let encoded = encode_form(fields, "B").unwrap();
        assert!(String::from_utf8(encoded.body).unwrap().contains("name=\"a\\\"b\""));
    }

    #[test]
    fn test_encoded_form_parses_back() {
        let part = FilePart {
            file_name: "a.png".to_string(),
            content_type: "image/png".to_string(),
            content: Bytes::from_static(&[1, 2, 3]),
        };
        let fields = vec![
            ("text".to_string(), FormValue::from("hello")),
            ("file".to_string(), FormValue::from(part)),
        ];
        let encoded = encode_form(fields, "bnd").unwrap();
        let parts = parse_parts(&encoded.body, "bnd").unwrap();
        assert_eq!(parts, vec![b"hello".to_vec(), vec![1, 2, 3]]);
    }

    #[test]
    fn test_parse_with_preamble_and_bare_part() {
        let body = b"preamble\r\n--b\r\n\r\nraw\r\n--b--\r\n";
        assert_eq!(parse_parts(body, "b").unwrap(), vec![b"raw".to_vec()]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_parts(b"nothing", "b"), Err(MultipartError::MissingBoundary));
        assert!(matches!(
            parse_parts(b"--b\r\nContent-Type: text/plain\r\n\r\nunterminated", "b"),
            Err(MultipartError::MalformedPart { index: 0, .. })
        ));
        assert!(matches!(
            parse_parts(b"--b\r\n\r\nok\r\n--bX", "b"),
            Err(MultipartError::MalformedPart { index: 1, .. })
        ));
    }

    #[test]
    fn test_boundary_from_content_type() {
        assert_eq!(
            boundary_from_content_type("multipart/mixed; boundary=abc"),
            Some("abc".to_string())
        );
        assert_eq!(boundary_from_content_type("application/json"), None);
        assert_eq!(boundary_from_content_type(";;;"), None);
    }
}
