//! Bounded retry with exponential backoff
//!
//! Used only for payment session creation. Verification and consumption must
//! never be blindly retried: they have side effects and carry their own
//! idempotence guards instead.

use std::fmt::Display;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Delay before the retry following `attempt` (1-based): doubles from
    /// `base_delay`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` up to `max_attempts` times, reporting each failed attempt to
    /// `on_failure`. Returns the last error once attempts are exhausted.
    pub async fn run_with<T, E, F, Fut>(
        &self,
        mut op: F,
        on_failure: impl Fn(u32, &E),
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    on_failure(attempt, &e);
                    if attempt >= attempts {
                        return Err(e);
                    }
                    tokio::time::sleep(self.delay_for(attempt)).await;
                }
            }
        }
    }

    /// Convenience wrapper routing attempt failures to `tracing::warn!`.
    pub async fn run<T, E, F, Fut>(&self, label: &'static str, op: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_with(op, |attempt, e| {
            warn!(
                operation = label,
                attempt = attempt,
                max_attempts = self.max_attempts,
                error = %e,
                "Attempt failed"
            );
        })
        .await
    }
}
