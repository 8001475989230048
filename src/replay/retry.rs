//! Bounded exponential backoff.

use std::future::Future;
use std::time::Duration;

use super::error::ReplayError;
use crate::config::ReplayConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ReplayConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ReplayConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before the `attempt`-th retry (1-based), doubling each time and capped at
    /// `max_backoff`. `None` once retries are exhausted.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_retries {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        let delay = self
            .initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff);
        Some(delay.min(self.max_backoff))
    }
}

/// Run `f` until it succeeds, fails with a non-retryable error, or retries run out.
pub async fn retry_with_backoff<F, Fut, T>(policy: &RetryPolicy, mut f: F) -> Result<T, ReplayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ReplayError>>,
{
    let mut attempt = 0u32;
    loop {
        match f().await {
            Ok(val) => return Ok(val),
            Err(e) if e.is_retryable() => {
                attempt += 1;
                match policy.next_delay(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            attempt,
                            max_retries = policy.max_retries,
                            error = %e,
                            delay_ms = delay.as_millis() as u64,
                            "Replay request failed, retrying..."
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        tracing::error!(
                            attempts = attempt,
                            error = %e,
                            "Replay request failed, retries exhausted"
                        );
                        return Err(e);
                    }
                }
            }
            Err(e) => return Err(e),
        }
    }
}
