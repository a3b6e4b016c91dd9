//! Retry policy and executor
//!
//! Exponential backoff over [`LlmError::is_retryable`] failures. The Gemini
//! transport uses [`RetryPolicy::gemini_default`]: three attempts in total,
//! waiting 1s then 2s between them.

use std::time::Duration;
use tokio::time::sleep;

use crate::error::LlmError;

/// Backoff schedule for non-streaming calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first
    pub max_attempts: u32,
    /// Wait before the first retry
    pub initial_delay: Duration,
    /// Upper bound on any single wait
    pub max_delay: Duration,
    /// Growth factor between consecutive waits
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::gemini_default()
    }
}

impl RetryPolicy {
    /// Three attempts, 1s then 2s.
    pub const fn gemini_default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }

    /// A single attempt, no retries.
    pub const fn none() -> Self {
        Self::gemini_default().with_max_attempts(1)
    }

    /// Zero is treated as one attempt.
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = if max_attempts == 0 { 1 } else { max_attempts };
        self
    }

    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub const fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Wait before retry number `attempt + 1` (`attempt` is zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let millis =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(millis as u64).min(self.max_delay)
    }
}

/// Runs an operation under a [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent. The last error is returned.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, LlmError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let error = match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => error,
            };

            if !error.is_retryable() || attempt + 1 >= max_attempts {
                return Err(error);
            }

            let delay = self.policy.delay_for(attempt);
            tracing::warn!(
                target: "gemini_chat::retry",
                attempt = attempt + 1,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                err = %error,
                "retrying after transient failure"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}
