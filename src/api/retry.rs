//! Transport-level retry policy.
//!
//! Network failures are always retried. Server errors (5xx) are retried
//! only for idempotent verbs. Client errors (4xx) are final.

use std::time::Duration;

use reqwest::Method;

use crate::config::ClientConfig;
use crate::error::{classify_status, ErrorCategory, TransportError, TransportErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.max_retries,
            config.retry_base_delay,
            config.retry_max_delay,
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (0-based), doubling each time.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let multiplier = 1_u32 << retry.min(20);
        self.base_delay
            .saturating_mul(multiplier)
            .min(self.max_delay)
    }

    /// Whether a failed attempt should be retried, given `retries_done` so far.
    pub fn should_retry(&self, method: &Method, error: &TransportError, retries_done: u32) -> bool {
        if retries_done >= self.max_retries {
            return false;
        }
        match error.kind {
            TransportErrorKind::Network => true,
            TransportErrorKind::Status => {
                is_idempotent(method)
                    && error.status.map(classify_status) == Some(ErrorCategory::Server)
            }
            TransportErrorKind::Decode => false,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::ZERO, Duration::from_secs(30))
    }
}

pub fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::PUT | Method::DELETE
    )
}
