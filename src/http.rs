//! Centralized HTTP client configuration shared by the receiver's components.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// HTTP client configuration with sensible defaults for talking to an SSF
/// transmitter: connection pooling, timeouts, rustls TLS.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout (default: 30s).
    pub timeout: Duration,
    /// Connection timeout (default: 10s).
    pub connect_timeout: Duration,
    /// Pool idle timeout (default: 90s).
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host (default: 10).
    pub pool_max_idle_per_host: usize,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 10,
            user_agent: "ssf-client/1.0".to_string(),
        }
    }
}

impl HttpConfig {
    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the idle connection pool's timeout and per-host cap.
    #[must_use]
    pub fn with_pool_config(mut self, idle_timeout: Duration, max_idle: usize) -> Self {
        self.pool_idle_timeout = idle_timeout;
        self.pool_max_idle_per_host = max_idle;
        self
    }
}

/// Build a configured HTTP client (rustls TLS, connection pooling).
///
/// # Errors
///
/// Returns an error if the underlying TLS backend fails to initialize.
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    ClientBuilder::new()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .user_agent(&config.user_agent)
        .use_rustls_tls()
        .build()
}
