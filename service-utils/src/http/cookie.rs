//! Cookies sent with and received from outbound requests.

use std::time::Duration;

/// An HTTP cookie.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Path attribute
    pub path: Option<String>,
    /// Domain attribute
    pub domain: Option<String>,
    /// Max-Age attribute
    pub max_age: Option<Duration>,
    /// Secure attribute
    pub secure: bool,
    /// HttpOnly attribute
    pub http_only: bool,
}

impl Cookie {
    /// Create a cookie with a name and value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    /// `name=value` as sent in a `Cookie` request header.
    #[must_use]
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

impl From<reqwest::cookie::Cookie<'_>> for Cookie {
    fn from(cookie: reqwest::cookie::Cookie<'_>) -> Self {
        Self {
            name: cookie.name().to_string(),
            value: cookie.value().to_string(),
            path: cookie.path().map(str::to_string),
            domain: cookie.domain().map(str::to_string),
            max_age: cookie.max_age(),
            secure: cookie.secure(),
            http_only: cookie.http_only(),
        }
    }
}

/// Value of the `Cookie` request header for `cookies`.
#[must_use]
pub fn cookie_header(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .map(Cookie::pair)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Find a cookie by name.
#[must_use]
pub fn find_cookie<'c>(cookies: &'c [Cookie], name: &str) -> Option<&'c Cookie> {
    cookies.iter().find(|cookie| cookie.name == name)
}
