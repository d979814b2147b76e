//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

use crate::config::VerificationConfig;

/// Bounds for one polling wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first probe.
    pub initial_delay: Duration,
    /// Maximum number of probes.
    pub max_attempts: u32,
    /// Base delay for exponential growth, in milliseconds.
    pub base_ms: u64,
    /// Cap for a single delay, in milliseconds.
    pub max_ms: u64,
    /// Overall deadline for the wait.
    pub timeout: Duration,
}

impl BackoffPolicy {
    /// Delay to sleep before probe number `attempt` (1-based).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            self.initial_delay
        } else {
            calculate_backoff(attempt - 1, self.base_ms, self.max_ms)
        }
    }
}

impl From<&VerificationConfig> for BackoffPolicy {
    fn from(config: &VerificationConfig) -> Self {
        Self {
            initial_delay: Duration::from_secs(config.initial_delay_secs),
            max_attempts: config.max_attempts,
            base_ms: config.base_delay_ms,
            max_ms: config.max_delay_ms,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Calculate exponential backoff delay with jitter.
///
/// `base_ms * 2^(attempt-1)`, capped at `max_ms`, plus 0-10% jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}
