//! Retry executor
//!
//! Wraps a single remote call in bounded exponential backoff. Transient
//! failures (rate limit, 5xx gateway errors, connection resets/refusals,
//! timeouts) are retried until the elapsed-time budget runs out; any other
//! failure returns at once. Backoff sleeps race the run's cancel flag.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::cancel::CancelFlag;
use crate::error::DriveError;

/// Backoff parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            multiplier: 1.5,
            max_interval: Duration::from_secs(30),
            max_elapsed: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let secs = self.initial_interval.as_secs_f64() * factor;
        Duration::from_secs_f64(secs.min(self.max_interval.as_secs_f64()))
    }

    /// Run `op` until it succeeds, fails permanently, exhausts the budget or
    /// the run is cancelled. `target` names the remote object in errors and logs.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancelFlag,
        target: &str,
        mut op: F,
    ) -> Result<T, DriveError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DriveError>>,
    {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(DriveError::Cancelled);
            }

            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }

            attempt += 1;
            let delay = self.delay_for(attempt);
            let elapsed = started.elapsed();
            if elapsed + delay > self.max_elapsed {
                tracing::error!(
                    target_id = target,
                    attempts = attempt,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %err,
                    "Retry budget exhausted"
                );
                return Err(DriveError::Exhausted {
                    target: target.to_string(),
                    elapsed,
                    source: Box::new(err),
                });
            }

            tracing::warn!(
                target_id = target,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient remote error, retrying"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(DriveError::Cancelled),
            }
        }
    }
}
