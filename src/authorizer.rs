//! Credential attachment for requests sent to an SSF transmitter.

use async_trait::async_trait;
use reqwest::RequestBuilder;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::instrument;

/// Attaches authorization to an outgoing request.
///
/// Implementations are shared across concurrent stream operations; they must
/// be safe to call from multiple tasks at once.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Attach credentials to `request`, returning the modified builder.
    ///
    /// # Errors
    ///
    /// Returns an error message if a credential could not be obtained or
    /// attached.
    async fn add_auth(&self, request: RequestBuilder) -> Result<RequestBuilder, String>;
}

/// A pre-obtained bearer token, attached to every request unconditionally.
/// Useful for tests and for schemes where the caller manages rotation
/// externally.
pub struct StaticBearerAuthorizer {
    token: String,
}

impl StaticBearerAuthorizer {
    /// Wrap a fixed bearer token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl Authorizer for StaticBearerAuthorizer {
    async fn add_auth(&self, request: RequestBuilder) -> Result<RequestBuilder, String> {
        Ok(request.bearer_auth(&self.token))
    }
}

/// Fetches an OAuth2 access token on demand and caches it until it expires.
#[async_trait]
pub trait TokenFetcher: Send + Sync {
    /// Fetch a fresh access token and the duration it remains valid for.
    async fn fetch(&self) -> Result<(String, Duration), String>;
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// An [`Authorizer`] backed by a cached OAuth2 bearer token. The token is
/// fetched on first use and refreshed transparently once it expires; callers
/// invoking [`Authorizer::add_auth`] concurrently during a refresh suspend
/// until the in-flight fetch completes, since the cache is guarded by a
/// single [`tokio::sync::RwLock`] rather than per-caller locks.
pub struct OAuth2BearerAuthorizer {
    fetcher: Arc<dyn TokenFetcher>,
    /// Subtracted from the fetched lifetime so a token is treated as expired
    /// slightly before the transmitter would reject it.
    expiry_skew: Duration,
    cache: RwLock<Option<CachedToken>>,
}

impl OAuth2BearerAuthorizer {
    /// Build an authorizer around `fetcher`, refreshing `expiry_skew` before
    /// the fetched token's reported lifetime elapses.
    #[must_use]
    pub fn new(fetcher: Arc<dyn TokenFetcher>, expiry_skew: Duration) -> Self {
        Self { fetcher, expiry_skew, cache: RwLock::new(None) }
    }

    #[instrument(skip(self))]
    async fn current_token(&self) -> Result<String, String> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Instant::now() {
                    return Ok(cached.value.clone());
                }
            }
        }
        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.value.clone());
            }
        }
        let (value, lifetime) = self.fetcher.fetch().await?;
        let expires_at = Instant::now() + lifetime.saturating_sub(self.expiry_skew);
        let token = value.clone();
        *cache = Some(CachedToken { value, expires_at });
        Ok(token)
    }
}

#[async_trait]
impl Authorizer for OAuth2BearerAuthorizer {
    async fn add_auth(&self, request: RequestBuilder) -> Result<RequestBuilder, String> {
        let token = self.current_token().await?;
        Ok(request.bearer_auth(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingFetcher {
        calls: AtomicU32,
    }

    #[async_trait]
    impl TokenFetcher for CountingFetcher {
        async fn fetch(&self) -> Result<(String, Duration), String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((format!("token-{n}"), Duration::from_secs(60)))
        }
    }

    #[tokio::test]
    async fn static_authorizer_attaches_given_token() {
        let authorizer = StaticBearerAuthorizer::new("fixed-token");
        let client = reqwest::Client::new();
        let req = authorizer.add_auth(client.get("https://example.test")).await.unwrap();
        let built = req.build().unwrap();
        let header = built.headers().get(reqwest::header::AUTHORIZATION).unwrap();
        assert_eq!(header, "Bearer fixed-token");
    }

    #[tokio::test]
    async fn oauth_authorizer_caches_token_across_calls() {
        let fetcher = Arc::new(CountingFetcher { calls: AtomicU32::new(0) });
        let authorizer = OAuth2BearerAuthorizer::new(fetcher.clone(), Duration::from_secs(5));
        let client = reqwest::Client::new();

        authorizer.add_auth(client.get("https://example.test")).await.unwrap();
        authorizer.add_auth(client.get("https://example.test")).await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn oauth_authorizer_refetches_after_expiry() {
        // expiry_skew equal to the fetched lifetime means every token is
        // already expired by the time it's cached, forcing a refetch on the
        // very next call.
        let fetcher = Arc::new(CountingFetcher { calls: AtomicU32::new(0) });
        let authorizer = OAuth2BearerAuthorizer::new(fetcher.clone(), Duration::from_secs(60));
        let client = reqwest::Client::new();

        authorizer.add_auth(client.get("https://example.test")).await.unwrap();
        authorizer.add_auth(client.get("https://example.test")).await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }
}
