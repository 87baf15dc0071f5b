// ============================================
// MCPGATE - Retry Logic with Exponential Backoff
// ============================================

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use super::cancel::CancelSignal;
use super::error::McpError;

/// Retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (attempts = retries + 1)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            backoff_multiplier: 2,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no backoff
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay after the failed attempt `attempt` (0-based): `initial × multiplier^attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.saturating_pow(attempt);
        self.initial_delay.saturating_mul(factor)
    }

    /// Sum of every backoff delay when all retries are used.
    pub fn total_backoff(&self) -> Duration {
        (0..self.max_retries)
            .map(|attempt| self.delay_for_attempt(attempt))
            .sum()
    }
}

/// Execute an async operation, retrying transient failures.
///
/// Only errors for which [`McpError::is_transient`] holds are retried; the
/// first non-transient error is returned immediately. The operation receives
/// the 0-based attempt number.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    cancel: &CancelSignal,
    mut operation: F,
) -> Result<T, McpError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, McpError>>,
{
    let mut attempt = 0;
    loop {
        let err = match operation(attempt).await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        if !err.is_transient() {
            tracing::debug!("Permanent error, not retrying: {}", err);
            return Err(err);
        }
        if attempt >= config.max_retries {
            tracing::warn!("Giving up after {} attempts: {}", attempt + 1, err);
            return Err(err);
        }

        let delay = config.delay_for_attempt(attempt);
        tracing::warn!(
            "Attempt {} failed: {}. Retrying in {:?}...",
            attempt + 1,
            err,
            delay
        );

        let mut cancel = cancel.clone();
        tokio::select! {
            _ = sleep(delay) => {}
            _ = cancel.cancelled() => return Err(McpError::cancelled("retry backoff")),
        }
        attempt += 1;
    }
}
