//! Bounded retry with backoff.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff strategy for retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,
    /// Linear backoff: base * attempt
    Linear,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Linear
    }
}

/// Retry policy configuration.
///
/// Deliberately blind to *what* failed: whether an error is worth retrying is
/// the caller's decision. Deterministic rejections must be modeled as result
/// values so they never reach this policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts (1 = no retries).
    pub max_attempts: u32,
    /// Base delay between attempts.
    pub base_delay: Duration,
    /// Backoff strategy.
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            strategy: BackoffStrategy::Linear,
        }
    }
}

impl RetryPolicy {
    /// Linear backoff: wait `attempt * base_delay` after the nth failure.
    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            strategy: BackoffStrategy::Linear,
        }
    }

    /// Fixed delay between attempts.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Delay to wait after the given failed attempt (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        match self.strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Linear => self.base_delay.saturating_mul(attempt),
        }
    }

    /// Invoke `op` until it succeeds or `max_attempts` attempts are spent,
    /// sleeping between failures; the final error is returned as-is.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < max_attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    tracing::debug!(attempt, max_attempts, %error, ?delay, "attempt failed; backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
