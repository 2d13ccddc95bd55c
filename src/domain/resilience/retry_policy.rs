//! Retry policy value object.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::backoff::{clamp_secs, BackoffStrategy};
use crate::domain::foundation::ValidationError;

/// Immutable description of how an operation is retried.
///
/// Error classification is not part of the policy value; the executor
/// takes it from the error type (`ClassifyError`) or from an explicit
/// classifier supplied per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay unit fed into the backoff strategy.
    pub base_delay: Duration,
    /// Upper bound for any single delay, applied after jitter.
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
    /// Jitter amplitude as a fraction of the computed delay, in `[0, 1]`.
    pub jitter_factor: f64,
    /// Budget for the whole call, including backoff waits.
    pub overall_deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            strategy: BackoffStrategy::Exponential,
            jitter_factor: 0.2,
            overall_deadline: None,
        }
    }
}

impl RetryPolicy {
    /// Creates the default policy with a specific attempt count.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Sets the delay cap.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Sets the backoff strategy.
    pub fn with_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the jitter factor.
    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor;
        self
    }

    /// Disables jitter.
    pub fn without_jitter(self) -> Self {
        self.with_jitter(0.0)
    }

    /// Bounds the whole call, waits included.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.overall_deadline = Some(deadline);
        self
    }

    /// Backoff delay after failed attempt `n`, before jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.strategy
            .delay(attempt, self.base_delay, self.max_delay)
    }

    /// Backoff delay after failed attempt `n` with jitter applied.
    ///
    /// `sample` is drawn from `[-1, 1]`. Jitter scales the uncapped delay,
    /// and only the jittered value is clamped to `[0, max_delay]`.
    pub fn jittered_delay(&self, attempt: u32, sample: f64) -> Duration {
        let raw = self.base_delay.as_secs_f64() * self.strategy.multiplier(attempt);
        if !raw.is_finite() {
            return self.max_delay;
        }
        let sample = sample.clamp(-1.0, 1.0);
        let jittered = raw + sample * self.jitter_factor * raw;
        clamp_secs(jittered, self.max_delay)
    }

    /// Validates the policy parameters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::out_of_range(
                "max_attempts",
                1.0,
                f64::from(u32::MAX),
                0.0,
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ValidationError::out_of_range(
                "jitter_factor",
                0.0,
                1.0,
                self.jitter_factor,
            ));
        }
        if self.base_delay > self.max_delay {
            return Err(ValidationError::invalid_format(
                "base_delay",
                "must not exceed max_delay",
            ));
        }
        if self.overall_deadline == Some(Duration::ZERO) {
            return Err(ValidationError::invalid_format(
                "overall_deadline",
                "must be positive when set",
            ));
        }
        Ok(())
    }

    // ─── Presets ─────────────────────────────────────────────────────

    /// Model-inference backends: slow, often overloaded.
    pub fn inference_backend() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            strategy: BackoffStrategy::Exponential,
            jitter_factor: 0.2,
            overall_deadline: Some(Duration::from_secs(300)),
        }
    }

    /// Generic HTTP APIs.
    pub fn http_api() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            strategy: BackoffStrategy::Exponential,
            jitter_factor: 0.2,
            overall_deadline: None,
        }
    }

    /// Database calls: short waits, tight budget.
    pub fn database() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            strategy: BackoffStrategy::Exponential,
            jitter_factor: 0.2,
            overall_deadline: Some(Duration::from_secs(10)),
        }
    }

    /// Message queues: gentler Fibonacci growth.
    pub fn message_queue() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            strategy: BackoffStrategy::Fibonacci,
            jitter_factor: 0.2,
            overall_deadline: None,
        }
    }

    /// Idempotent operations that are safe to retry aggressively.
    pub fn idempotent_operation() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            strategy: BackoffStrategy::Exponential,
            jitter_factor: 0.2,
            overall_deadline: Some(Duration::from_secs(120)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(60));
        assert_eq!(policy.strategy, BackoffStrategy::Exponential);
        assert!(policy.overall_deadline.is_none());
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn presets_are_valid() {
        for policy in [
            RetryPolicy::inference_backend(),
            RetryPolicy::http_api(),
            RetryPolicy::database(),
            RetryPolicy::message_queue(),
            RetryPolicy::idempotent_operation(),
        ] {
            assert!(policy.validate().is_ok(), "{:?}", policy);
        }
        assert_eq!(
            RetryPolicy::message_queue().strategy,
            BackoffStrategy::Fibonacci
        );
    }

    #[test]
    fn jitter_is_applied_before_cap() {
        let policy = RetryPolicy::new(5)
            .with_max_delay(Duration::from_secs(10))
            .with_jitter(0.5);

        // 8s + 50% = 12s, capped to 10s
        assert_eq!(policy.jittered_delay(4, 1.0), Duration::from_secs(10));
        // 8s - 50% = 4s
        assert_eq!(policy.jittered_delay(4, -1.0), Duration::from_secs(4));
        assert_eq!(policy.jittered_delay(4, 0.0), Duration::from_secs(8));
    }

    #[test]
    fn negative_jitter_keeps_cap_when_raw_delay_exceeds_it() {
        let policy = RetryPolicy::new(10)
            .with_base_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(10))
            .with_jitter(0.2);

        // 16s - 20% = 12.8s, still above the cap
        assert_eq!(policy.jittered_delay(5, -1.0), Duration::from_secs(10));
        // 16s - 50% = 8s, below the cap
        assert_eq!(
            policy.clone().with_jitter(0.5).jittered_delay(5, -1.0),
            Duration::from_secs(8)
        );
    }

    #[test]
    fn overflowing_backoff_saturates_at_cap() {
        let policy = RetryPolicy::new(3).with_jitter(0.2);
        assert_eq!(policy.jittered_delay(u32::MAX, -1.0), policy.max_delay);
        assert_eq!(
            policy
                .with_strategy(BackoffStrategy::Fibonacci)
                .jittered_delay(5_000, -1.0),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn jitter_sample_outside_unit_range_is_clamped() {
        let policy = RetryPolicy::new(3).with_jitter(1.0);
        assert_eq!(policy.jittered_delay(1, -7.0), Duration::ZERO);
        assert_eq!(policy.jittered_delay(1, 7.0), Duration::from_secs(2));
    }

    #[test]
    fn without_jitter_ignores_sample() {
        let policy = RetryPolicy::new(3).without_jitter();
        assert_eq!(policy.jittered_delay(2, 1.0), Duration::from_secs(2));
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        assert!(RetryPolicy::new(0).validate().is_err());
    }

    #[test]
    fn validate_rejects_jitter_out_of_range() {
        assert!(RetryPolicy::new(3).with_jitter(1.5).validate().is_err());
        assert!(RetryPolicy::new(3).with_jitter(-0.1).validate().is_err());
    }

    #[test]
    fn validate_rejects_base_above_max() {
        let policy = RetryPolicy::new(3)
            .with_base_delay(Duration::from_secs(5))
            .with_max_delay(Duration::from_secs(1));
        assert!(policy.validate().is_err());
    }
}
