//! HTTP transport configuration and the transport seam.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};

/// HTTP client configuration.
///
/// Provides sensible defaults for production use with connection pooling,
/// timeouts, and TLS configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout (default: none, the transport decides)
    pub timeout: Option<Duration>,
    /// Connection timeout (default: 50s)
    pub connect_timeout: Duration,
    /// Pool idle timeout (default: 90s)
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host (default: 10)
    pub pool_max_idle_per_host: usize,
    /// User agent string
    pub user_agent: String,
    /// Keep cookies between requests (default: false)
    pub cookie_store: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: Duration::from_secs(50),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 10,
            user_agent: concat!("service-utils/", env!("CARGO_PKG_VERSION")).to_string(),
            cookie_store: false,
        }
    }
}

impl HttpConfig {
    /// Set an overall request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set pool settings.
    #[must_use]
    pub const fn with_pool_config(mut self, idle_timeout: Duration, max_idle: usize) -> Self {
        self.pool_idle_timeout = idle_timeout;
        self.pool_max_idle_per_host = max_idle;
        self
    }

    /// Keep cookies set by servers between requests.
    #[must_use]
    pub const fn with_cookie_store(mut self) -> Self {
        self.cookie_store = true;
        self
    }
}

/// Build a configured HTTP client.
///
/// Creates a reqwest client with rustls TLS, connection pooling, and
/// the specified configuration.
///
/// # Errors
///
/// Returns an error if the client cannot be built (e.g., TLS initialization fails).
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    let mut builder = ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .user_agent(&config.user_agent)
        .cookie_store(config.cookie_store)
        .use_rustls_tls();
    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

/// Transport performing one HTTP exchange.
///
/// Implemented for [`reqwest::Client`]; tests substitute scripted fakes.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send `request` and return the response head with an unread body.
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, reqwest::Error>;
}

#[async_trait]
impl HttpClient for Client {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, reqwest::Error> {
        Client::execute(self, request).await
    }
}
