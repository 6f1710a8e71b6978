//! Spend ceiling and request spacing for AI calls

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;

use crate::error::ClassifyError;

/// USD per million tokens (input, output)
fn model_prices(model: &str) -> (f64, f64) {
    let model = model.to_lowercase();
    if model.contains("1.5-pro") || model.contains("2.5-pro") {
        (1.25, 5.00)
    } else if model.contains("2.5-flash") {
        (0.30, 2.50)
    } else if model.contains("1.5-flash") {
        (0.075, 0.30)
    } else {
        // gemini-2.0-flash and unknown models
        (0.10, 0.40)
    }
}

/// Estimates spend from reported token usage and refuses calls past the limit
#[derive(Debug)]
pub struct CostTracker {
    input_price: f64,
    output_price: f64,
    limit: f64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
}

impl CostTracker {
    /// A `limit` of zero or less disables the ceiling
    pub fn new(model: &str, limit: f64) -> Self {
        let (input_price, output_price) = model_prices(model);
        Self {
            input_price,
            output_price,
            limit,
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
        }
    }

    pub fn record(&self, input_tokens: u64, output_tokens: u64) {
        self.input_tokens.fetch_add(input_tokens, Ordering::Relaxed);
        self.output_tokens.fetch_add(output_tokens, Ordering::Relaxed);
        tracing::debug!(
            input_tokens,
            output_tokens,
            spent_usd = self.spent(),
            "AI usage recorded"
        );
    }

    /// Estimated USD spent so far
    pub fn spent(&self) -> f64 {
        let input = self.input_tokens.load(Ordering::Relaxed) as f64;
        let output = self.output_tokens.load(Ordering::Relaxed) as f64;
        (input * self.input_price + output * self.output_price) / 1_000_000.0
    }

    pub fn check(&self) -> Result<(), ClassifyError> {
        let spent = self.spent();
        if self.limit > 0.0 && spent >= self.limit {
            return Err(ClassifyError::BudgetExceeded { spent, limit: self.limit });
        }
        Ok(())
    }
}

/// Rate limiter for API requests: bounded concurrency plus a minimum gap
/// between request starts
pub struct RateLimiter {
    semaphore: Semaphore,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(max_concurrent: usize, requests_per_second: u32) -> Self {
        let min_interval = if requests_per_second == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(1.0 / f64::from(requests_per_second))
        };
        Self {
            semaphore: Semaphore::new(max_concurrent.max(1)),
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    pub async fn acquire(&self) {
        let Ok(_permit) = self.semaphore.acquire().await else {
            return;
        };

        let wait_time = {
            let mut last = self.last_request.lock().await;
            let now = Instant::now();
            let wait = match *last {
                Some(previous) => self.min_interval.saturating_sub(now.duration_since(previous)),
                None => Duration::ZERO,
            };
            *last = Some(now + wait);
            wait
        };

        if !wait_time.is_zero() {
            tokio::time::sleep(wait_time).await;
        }
    }
}
