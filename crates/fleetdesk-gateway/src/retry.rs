//! Bounded retry for transient request failures.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use fleetdesk_config::{RequestConfig, RetryBackoff};
use fleetdesk_protocols::RequestError;

/// Retry policy for gateway calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff: RetryBackoff,
    /// Statuses treated as transient. 401 is never retried, even if listed.
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RequestConfig::default())
    }
}

impl From<&RequestConfig> for RetryPolicy {
    fn from(config: &RequestConfig) -> Self {
        Self {
            max_retries: config.retry_attempts,
            base_delay: config.retry_delay(),
            backoff: config.retry_backoff,
            retryable_statuses: config.retryable_statuses.clone(),
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt + 1`, counting from zero.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self.backoff {
            RetryBackoff::Fixed => self.base_delay,
            RetryBackoff::Linear => self.base_delay.saturating_mul(attempt.saturating_add(1)),
        }
    }

    pub fn is_retryable(&self, error: &RequestError) -> bool {
        match error {
            RequestError::Status { status, .. } => {
                *status != 401 && self.retryable_statuses.contains(status)
            }
            other => is_retryable(other),
        }
    }

    /// Run `operation` until it succeeds, fails with a permanent error, or the
    /// retry budget is spent. The last error is returned as-is.
    pub async fn run<F, Fut, T>(&self, label: &str, operation: F) -> Result<T, RequestError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, RequestError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !self.is_retryable(&e) || attempt >= self.max_retries {
                        return Err(e);
                    }

                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}, retrying in {:?}",
                        label,
                        attempt + 1,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Network-level failures are transient. Status codes are judged by
/// [`RetryPolicy::is_retryable`] against the configured list.
pub fn is_retryable(error: &RequestError) -> bool {
    matches!(error, RequestError::Network(_) | RequestError::Timeout(_))
}
