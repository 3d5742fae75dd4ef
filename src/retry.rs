//! Retry/backoff for stream operations against an SSF transmitter.

use crate::error::{ReceiverError, ReceiverResult};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

/// Retry policy: exponential backoff with jitter, classified by HTTP status.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling applied to the computed delay before jitter.
    pub max_delay: Duration,
    /// Exponential backoff multiplier.
    pub multiplier: f64,
    /// HTTP status codes treated as transient and worth retrying.
    pub retryable_statuses: HashSet<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            retryable_statuses: HashSet::from([408, 429, 500, 502, 503, 504]),
        }
    }
}

impl RetryConfig {
    /// Override `max_retries`.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Override `initial_delay`.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Override `max_delay`.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }
}

/// Executes an operation with exponential backoff, retrying on transient
/// transport errors and on responses whose status is in
/// [`RetryConfig::retryable_statuses`].
#[derive(Debug, Clone)]
pub struct RetryEngine {
    config: RetryConfig,
}

impl RetryEngine {
    /// Build an engine around `config`.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Build an engine with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Delay before the given (zero-indexed) retry attempt, jittered
    /// uniformly in `[0.8, 1.0]` of the computed exponential backoff.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.config.initial_delay.as_millis() as f64 * self.config.multiplier.powi(attempt as i32);
        let capped_ms = base_ms.min(self.config.max_delay.as_millis() as f64);
        let jitter = 0.8 + rand::random::<f64>() * 0.2;
        Duration::from_millis((capped_ms * jitter) as u64)
    }

    /// True if `status` should trigger a retry.
    #[must_use]
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.config.retryable_statuses.contains(&status)
    }

    /// Execute `operation` with retries, with no cancellation path.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::MaxRetriesExceeded`] once the retry budget is
    /// exhausted on a retryable status, or [`ReceiverError::Transport`] on a
    /// non-retryable transport failure.
    #[instrument(skip(self, operation))]
    pub async fn execute<F, Fut>(&self, operation: F) -> ReceiverResult<reqwest::Response>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        self.execute_with_cancel(operation, &CancellationToken::new()).await
    }

    /// Execute `operation` with retries, where `operation` itself classifies
    /// non-transport failures (auth errors, decode errors) by returning
    /// `Err` directly — only a retryable HTTP status or a transport error is
    /// retried; any other error short-circuits immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::MaxRetriesExceeded`] once the retry budget is
    /// exhausted on a retryable status or transport error, or propagates
    /// `operation`'s error unchanged otherwise.
    #[instrument(skip(self, operation))]
    pub async fn execute_result<F, Fut>(&self, mut operation: F) -> ReceiverResult<reqwest::Response>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = ReceiverResult<reqwest::Response>>,
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(response) if self.is_retryable_status(response.status().as_u16()) => {
                    warn!(status = response.status().as_u16(), attempt, "retryable status, dropping response");
                    drop(response);
                    if attempt >= self.config.max_retries {
                        return Err(ReceiverError::MaxRetriesExceeded { attempts: attempt + 1 });
                    }
                }
                Ok(response) => return Ok(response),
                Err(ReceiverError::Transport(e)) => {
                    if attempt >= self.config.max_retries {
                        return Err(ReceiverError::Transport(e));
                    }
                }
                Err(other) => return Err(other),
            }
            tokio::time::sleep(self.delay_for_attempt(attempt)).await;
            attempt += 1;
        }
    }

    /// Execute `operation` with retries, short-circuiting the backoff wait
    /// (and returning [`ReceiverError::MaxRetriesExceeded`]) if `cancel` fires
    /// first.
    ///
    /// # Errors
    ///
    /// Same as [`RetryEngine::execute`].
    #[instrument(skip(self, operation, cancel))]
    pub async fn execute_with_cancel<F, Fut>(
        &self,
        mut operation: F,
        cancel: &CancellationToken,
    ) -> ReceiverResult<reqwest::Response>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(response) if self.is_retryable_status(response.status().as_u16()) => {
                    warn!(status = response.status().as_u16(), attempt, "retryable status, dropping response");
                    drop(response);
                    if attempt >= self.config.max_retries {
                        return Err(ReceiverError::MaxRetriesExceeded { attempts: attempt + 1 });
                    }
                }
                Ok(response) => return Ok(response),
                Err(error) => {
                    if attempt >= self.config.max_retries {
                        return Err(ReceiverError::Transport(error));
                    }
                }
            }
            let delay = self.delay_for_attempt(attempt);
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => {
                    return Err(ReceiverError::MaxRetriesExceeded { attempts: attempt + 1 });
                }
            }
            attempt += 1;
        }
    }
}

impl Default for RetryEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}
