//! Outbound HTTP: transport, URL handling, body codecs and the request builder.

pub mod client;
pub mod cookie;
pub mod decode;
pub mod multipart;
pub mod request;
pub mod url;

pub use client::{HttpClient, HttpConfig, build_http_client};
pub use cookie::{Cookie, cookie_header, find_cookie};
pub use decode::ResponseTarget;
pub use multipart::{FilePart, FileUpload, FormValue, MultipartError};
pub use request::{HttpRequest, HttpRequestBuilder};
