//! Retry of model calls with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::VoxError;

/// How often and how patiently a failed call is repeated.
///
/// Only errors whose [`VoxError::is_retryable`] is true are repeated: rate
/// limits, server errors, network failures and timeouts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts including the first; never below one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default())
    }
}

impl RetryPolicy {
    /// Policy from the `[llm]` section: `max_retries` repeats after the first call.
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_attempts: config.max_retries.saturating_add(1),
            initial_backoff: Duration::from_millis(config.retry_backoff_ms),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }

    /// Backoff before attempt `attempt + 1`, without jitter.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_backoff.as_secs_f64()))
    }

    /// Run `call` until it succeeds, fails permanently or runs out of attempts.
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut call: F) -> Result<T, VoxError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, VoxError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(operation, attempt, "call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    // 75% to 125% of the nominal backoff
                    let delay = self.backoff_for(attempt).mul_f64(0.75 + jitter() * 0.5);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        category = ?error.category(),
                        %error,
                        "retrying failed call"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    if error.is_retryable() {
                        tracing::warn!(operation, attempts = attempt, %error, "giving up after retries");
                    }
                    return Err(error);
                }
            }
        }
    }
}

/// Uniform factor in `[0, 1)` drawn from a v4 UUID's random bits.
fn jitter() -> f64 {
    (uuid::Uuid::new_v4().as_u128() % 10_000) as f64 / 10_000.0
}
