//! Retry manager with exponential backoff
//!
//! Bounded retry for read-idempotent provider calls (embedding, vector
//! search). Permanent errors short-circuit; transient ones back off
//! exponentially with jitter up to a fixed attempt cap.

use crate::errors::{EngineError, Result};
use std::time::Duration;
use tokio::time::sleep;

/// Default maximum attempts for provider calls
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff
const BASE_DELAY_MS: u64 = 250;

/// Maximum delay cap
const MAX_DELAY_MS: u64 = 4000;

/// Retry manager with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryManager {
    /// Maximum attempts (including the first)
    max_attempts: u32,

    /// Base delay in milliseconds
    base_delay_ms: u64,

    /// Maximum delay cap in milliseconds
    max_delay_ms: u64,

    /// Enable jitter
    enable_jitter: bool,
}

impl Default for RetryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryManager {
    /// Create new retry manager with default settings
    pub fn new() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: BASE_DELAY_MS,
            max_delay_ms: MAX_DELAY_MS,
            enable_jitter: true,
        }
    }

    /// Create retry manager with custom settings
    pub fn with_config(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms: MAX_DELAY_MS,
            enable_jitter: true,
        }
    }

    /// Disable jitter (deterministic delays, used in tests)
    pub fn without_jitter(mut self) -> Self {
        self.enable_jitter = false;
        self
    }

    /// Execute operation with retry logic
    pub async fn execute_with_retry<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !e.is_retryable() {
                        return Err(e);
                    }

                    attempt += 1;

                    if attempt >= self.max_attempts {
                        tracing::warn!(attempts = attempt, error = %e, "retries exhausted");
                        return Err(e);
                    }

                    let delay = self.calculate_delay(attempt);
                    tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after transient failure");
                    sleep(delay).await;
                }
            }
        }
    }

    /// Calculate delay for given attempt number
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponential_delay = self.base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
        let delay_ms = exponential_delay.min(self.max_delay_ms);

        // ±25% jitter keeps concurrent retries from synchronizing
        let final_delay = if self.enable_jitter {
            let jitter = (delay_ms / 4) as i64;
            let random_jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter as f64;
            ((delay_ms as i64) + random_jitter as i64).max(0) as u64
        } else {
            delay_ms
        };

        Duration::from_millis(final_delay)
    }

    /// Get configured maximum attempts
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
