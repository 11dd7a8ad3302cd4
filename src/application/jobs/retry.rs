use std::time::Duration;

/// Delay before the first redelivery.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(30);
/// Upper bound for any redelivery delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60 * 60);
/// Deliveries allowed before a message is abandoned.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// What to do with a message whose work failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RequeueWithDelay(Duration),
    Abandon,
}

/// Exponential backoff with a ceiling.
///
/// Attempt `n` (zero-based) is delayed by `base * 2^n`, clamped to
/// `max_delay`. Once `attempt >= max_attempts` the message is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl From<&crate::config::JobsSettings> for RetryPolicy {
    fn from(settings: &crate::config::JobsSettings) -> Self {
        Self {
            base_delay: settings.base_delay,
            max_delay: settings.max_delay,
            max_attempts: settings.max_attempts,
        }
    }
}

impl RetryPolicy {
    pub fn decide(&self, attempt: u32, max_attempts: u32) -> RetryDecision {
        if attempt >= max_attempts {
            return RetryDecision::Abandon;
        }
        RetryDecision::RequeueWithDelay(self.delay_for(attempt))
    }

    /// [`decide`](Self::decide) against the policy's own attempt limit.
    pub fn decide_default(&self, attempt: u32) -> RetryDecision {
        self.decide(attempt, self.max_attempts)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}
