//! Retry policy for endpoint calls.

use std::time::Duration;

use crate::error::RetryClass;

/// Ceiling for a single transient backoff.
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = single attempt).
    pub max_retries: u32,
    /// Delay before the first retry of a transient failure.
    pub initial_backoff: Duration,
    /// Growth factor between consecutive transient backoffs.
    pub backoff_multiplier: f64,
    /// Fixed delay after a rate-limit signal.
    pub rate_limit_backoff: Duration,
}

impl RetryPolicy {
    /// Whether a failure on `attempt` (0-indexed) may be retried.
    pub fn should_retry(&self, class: RetryClass, attempt: u32) -> bool {
        class.is_retriable() && attempt < self.max_retries
    }

    /// Delay before retrying a failure of `class` that happened on `attempt`.
    ///
    /// Transient delays never exceed [`MAX_BACKOFF`], including when the
    /// multiplier overflows or is not a number.
    pub fn backoff(&self, class: RetryClass, attempt: u32) -> Duration {
        match class {
            RetryClass::RateLimit => self.rate_limit_backoff,
            RetryClass::Transient | RetryClass::Fatal => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let secs = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
                Duration::try_from_secs_f64(secs)
                    .unwrap_or(MAX_BACKOFF)
                    .min(MAX_BACKOFF)
            }
        }
    }

    /// No retries, no waiting.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
            rate_limit_backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    /// 3 retries, 2s doubling backoff, 60s after a rate limit.
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            rate_limit_backoff: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_backoff_doubles() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (0..3)
            .map(|a| policy.backoff(RetryClass::Transient, a).as_secs())
            .collect();
        assert_eq!(delays, vec![2, 4, 8]);
    }

    #[test]
    fn rate_limit_uses_fixed_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(RetryClass::RateLimit, 0), Duration::from_secs(60));
        assert_eq!(policy.backoff(RetryClass::RateLimit, 2), Duration::from_secs(60));
    }

    #[test]
    fn fatal_and_exhausted_are_not_retried() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(RetryClass::Fatal, 0));
        assert!(policy.should_retry(RetryClass::Transient, 2));
        assert!(!policy.should_retry(RetryClass::Transient, 3));
    }

    #[test]
    fn transient_backoff_saturates() {
        let policy = RetryPolicy {
            max_retries: u32::MAX,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(RetryClass::Transient, 8), MAX_BACKOFF);
        assert_eq!(policy.backoff(RetryClass::Transient, u32::MAX), MAX_BACKOFF);

        let nan = RetryPolicy {
            backoff_multiplier: f64::NAN,
            ..RetryPolicy::default()
        };
        assert_eq!(nan.backoff(RetryClass::Transient, 1), MAX_BACKOFF);
    }
}
