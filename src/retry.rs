use std::time::Duration;

/// Bounded exponential backoff.
///
/// Shared by credential acquisition and media recovery so both paths retry
/// the same way: `base_delay` doubling per attempt, capped at `max_delay`,
/// giving up after `max_attempts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Ceiling for the doubled delays
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Delay to wait after `failures` attempts have already failed.
    ///
    /// `failures` is zero-based: the delay after the first failure is
    /// `base_delay`, then `base_delay * 2`, `base_delay * 4`, ...
    pub fn delay_for(&self, failures: u32) -> Duration {
        // Cap the shift so the multiplier can't overflow
        let factor = 1u32 << failures.min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// True once `failures` attempts have failed and no retry remains.
    pub fn exhausted(&self, failures: u32) -> bool {
        failures >= self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500), Duration::from_secs(5))
    }
}
