//! Exponential backoff for failed sync attempts.

use crate::SyncError;
use core_runtime::config::SyncSettings;
use std::time::Duration;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive failures after which no retry is scheduled
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&SyncSettings::default())
    }
}

impl From<&SyncSettings> for RetryPolicy {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: settings.base_retry_delay,
            max_delay: settings.max_retry_delay,
        }
    }
}

impl RetryPolicy {
    /// `base_delay * 2^(consecutive_failures - 1)`, capped at `max_delay`.
    pub fn delay_for(&self, consecutive_failures: u32) -> Duration {
        let exponent = consecutive_failures.saturating_sub(1);
        2u32.checked_pow(exponent)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub fn should_retry(&self, error: &SyncError, consecutive_failures: u32) -> bool {
        error.is_retryable() && consecutive_failures < self.max_retries
    }
}
