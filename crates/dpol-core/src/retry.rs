//! Bounded retry for external calls.
//!
//! Only [`ApiError::Transient`] failures are retried. Authorization,
//! not-found, and decode failures are returned immediately because another
//! attempt cannot change the outcome.

use std::future::Future;
use std::time::Duration;

use crate::error::ApiError;

/// How many times to attempt a call and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_backoff: Duration,
    /// Factor applied to the delay after each retry. 1 gives a fixed delay.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    /// One retry after a fixed one-second pause.
    fn default() -> Self {
        Self::fixed(2, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// Fixed delay between attempts.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_backoff: delay,
            multiplier: 1,
        }
    }

    /// Doubling delay between attempts, starting at `base`.
    pub fn exponential(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts,
            base_backoff: base,
            multiplier: 2,
        }
    }

    /// A single attempt, no retry.
    pub fn none() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1).saturating_pow(attempt.saturating_sub(1));
        self.base_backoff.saturating_mul(factor)
    }

    /// Run `call` until it succeeds, fails non-transiently, or the attempt
    /// budget is spent. The last error is returned.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    let delay = self.backoff_for(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = attempts,
                        "transient failure, retrying in {delay:?}: {err}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
