//! Retry policy for query fetches.

use std::future::Future;
use std::time::Duration;

use super::QueryKey;
use crate::{Error, Result};

/// Exponential backoff for failed query fetches.
///
/// A fetch is attempted once and then retried up to `max_retries` times, so
/// the worst case is `max_retries + 1` calls. Errors that are not retryable
/// (see [`Error::is_retryable`]) fail on the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub const fn never() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (zero-based): `base * 2^attempt`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2_u32
            .checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Whether to retry after the `failures`-th consecutive failure.
    pub fn should_retry(&self, failures: u32, error: &Error) -> bool {
        failures <= self.max_retries && error.is_retryable()
    }

    pub async fn run<T, F, Fut>(&self, key: &QueryKey, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut failures = 0_u32;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    failures += 1;
                    if !self.should_retry(failures, &error) {
                        return Err(error);
                    }

                    let delay = self.delay_for(failures - 1);
                    tracing::warn!(
                        key = %key,
                        attempt = failures,
                        "Query fetch failed, retrying in {}ms: {}",
                        delay.as_millis(),
                        error
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
