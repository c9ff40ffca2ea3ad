//! Retry-with-backoff policy for unreliable network calls.

use std::time::Duration;

/// Decides whether a failed call is retried and how long to wait first.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every further retry.
    pub base_delay: Duration,
    /// Statuses that are retried. Transport errors are always retried.
    pub retryable_status: fn(u16) -> bool,
}

impl RetryPolicy {
    /// Never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Backoff before retry number `attempt + 1` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        (self.retryable_status)(status)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(400),
            retryable_status: is_server_error,
        }
    }
}

pub fn is_server_error(status: u16) -> bool {
    (500..600).contains(&status)
}
