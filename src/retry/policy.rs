//! Retry policy and backoff math.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::classify::ErrorCategory;

// ============================================================================
// RetryPolicy
// ============================================================================

/// Policy governing how a failed operation is retried.
///
/// Delays grow exponentially: attempt *n* waits
/// `min(base_delay * multiplier^n, max_delay)`, optionally randomized by
/// `jitter`. With the default `jitter` of `0.0` the sequence is fully
/// deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries (not counting the initial attempt).
    #[serde(default = "RetryPolicy::default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "RetryPolicy::default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on any single delay in milliseconds.
    #[serde(default = "RetryPolicy::default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Growth factor applied after every attempt. Must be at least 1.0;
    /// exactly 1.0 degenerates to constant backoff.
    #[serde(default = "RetryPolicy::default_multiplier")]
    pub multiplier: f64,
    /// Randomization fraction in `[0.0, 1.0)`: a delay `d` becomes a
    /// uniform pick from `d * (1 - jitter) ..= d * (1 + jitter)`.
    #[serde(default)]
    pub jitter: f64,
    /// Error categories eligible for retry.
    #[serde(default = "RetryPolicy::default_retry_on")]
    pub retry_on: Vec<ErrorCategory>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: Self::default_max_retries(),
            base_delay_ms: Self::default_base_delay_ms(),
            max_delay_ms: Self::default_max_delay_ms(),
            multiplier: Self::default_multiplier(),
            jitter: 0.0,
            retry_on: Self::default_retry_on(),
        }
    }
}

impl RetryPolicy {
    fn default_max_retries() -> u32 {
        3
    }

    fn default_base_delay_ms() -> u64 {
        1000
    }

    fn default_max_delay_ms() -> u64 {
        30_000
    }

    fn default_multiplier() -> f64 {
        2.0
    }

    fn default_retry_on() -> Vec<ErrorCategory> {
        vec![
            ErrorCategory::Network,
            ErrorCategory::Timeout,
            ErrorCategory::RateLimit,
            ErrorCategory::Server,
        ]
    }

    /// Validate the policy invariants.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.max_delay_ms < self.base_delay_ms {
            return Err(PolicyError::DelayCapBelowBase {
                max: self.max_delay_ms,
                base: self.base_delay_ms,
            });
        }
        if self.multiplier < 1.0 {
            return Err(PolicyError::MultiplierTooSmall(self.multiplier));
        }
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(PolicyError::JitterOutOfRange(self.jitter));
        }
        Ok(())
    }

    /// Whether failures of `category` should be retried.
    pub fn retries(&self, category: ErrorCategory) -> bool {
        self.retry_on.contains(&category)
    }

    /// The delay to wait before retry number `attempt` (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let growth = self.multiplier.powi(attempt.min(64) as i32);
        let raw = (self.base_delay_ms as f64 * growth) as u64;
        let capped = raw.min(self.max_delay_ms);

        let delayed = if self.jitter > 0.0 {
            let factor = 1.0 - self.jitter + rand::random::<f64>() * 2.0 * self.jitter;
            (capped as f64 * factor) as u64
        } else {
            capped
        };

        Duration::from_millis(delayed)
    }
}

/// Errors from retry policy validation.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("max_delay_ms ({max}) is below base_delay_ms ({base})")]
    DelayCapBelowBase { max: u64, base: u64 },

    #[error("multiplier must be at least 1.0, got {0}")]
    MultiplierTooSmall(f64),

    #[error("jitter must be in [0.0, 1.0), got {0}")]
    JitterOutOfRange(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay_ms, 1000);
        assert_eq!(policy.max_delay_ms, 30_000);
        assert_eq!(policy.jitter, 0.0);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = RetryPolicy {
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            multiplier: 2.0,
            ..RetryPolicy::default()
        };

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(4000));
    }

    #[test]
    fn delay_is_capped_at_max() {
        let policy = RetryPolicy {
            base_delay_ms: 1000,
            max_delay_ms: 5000,
            multiplier: 2.0,
            ..RetryPolicy::default()
        };

        assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(5000));
        assert_eq!(policy.delay_for_attempt(63), Duration::from_millis(5000));
    }

    #[test]
    fn unit_multiplier_gives_constant_backoff() {
        let policy = RetryPolicy {
            base_delay_ms: 250,
            multiplier: 1.0,
            ..RetryPolicy::default()
        };
        for attempt in 0..5 {
            assert_eq!(policy.delay_for_attempt(attempt), Duration::from_millis(250));
        }
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            jitter: 0.2,
            ..RetryPolicy::default()
        };
        for _ in 0..50 {
            let delay = policy.delay_for_attempt(0).as_millis();
            assert!((800..=1200).contains(&delay), "delay {delay} out of range");
        }
    }

    #[test]
    fn validation_rejects_inverted_cap() {
        let policy = RetryPolicy {
            base_delay_ms: 5000,
            max_delay_ms: 1000,
            ..RetryPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::DelayCapBelowBase { .. })
        ));
    }

    #[test]
    fn validation_rejects_shrinking_multiplier() {
        let policy = RetryPolicy {
            multiplier: 0.5,
            ..RetryPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::MultiplierTooSmall(_))
        ));
    }
}
