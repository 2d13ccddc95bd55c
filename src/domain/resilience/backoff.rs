//! Backoff strategies mapping a retry attempt to a wait duration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the wait between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay before every retry.
    Constant,
    /// `base * n`
    Linear,
    /// `base * 2^(n-1)`
    #[default]
    Exponential,
    /// `base * fib(n)` with `fib(1) = fib(2) = 1`
    Fibonacci,
}

impl BackoffStrategy {
    /// Multiplier applied to the base delay after failed attempt `n` (1-based).
    ///
    /// Attempt 0 has no preceding failure and yields 0.
    pub fn multiplier(&self, attempt: u32) -> f64 {
        if attempt == 0 {
            return 0.0;
        }
        match self {
            BackoffStrategy::Constant => 1.0,
            BackoffStrategy::Linear => attempt as f64,
            BackoffStrategy::Exponential => 2f64.powi((attempt - 1).min(1023) as i32),
            BackoffStrategy::Fibonacci => fibonacci(attempt),
        }
    }

    /// Delay before attempt `n + 1`, capped at `max_delay`.
    pub fn delay(&self, attempt: u32, base_delay: Duration, max_delay: Duration) -> Duration {
        let raw = base_delay.as_secs_f64() * self.multiplier(attempt);
        clamp_secs(raw, max_delay)
    }
}

/// Converts a delay in seconds to a `Duration`, clamped to `[0, max]`.
///
/// Non-finite inputs (overflowed products) collapse to `max`.
pub(crate) fn clamp_secs(secs: f64, max: Duration) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    if !secs.is_finite() || secs >= max.as_secs_f64() {
        return max;
    }
    Duration::from_secs_f64(secs)
}

fn fibonacci(n: u32) -> f64 {
    let (mut prev, mut curr) = (0.0_f64, 1.0_f64);
    for _ in 1..n {
        let next = prev + curr;
        prev = curr;
        curr = next;
        if !curr.is_finite() {
            break;
        }
    }
    curr
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SEC: Duration = Duration::from_secs(1);

    fn delays(strategy: BackoffStrategy, max: Duration, n: u32) -> Vec<u64> {
        (1..=n)
            .map(|attempt| strategy.delay(attempt, SEC, max).as_secs())
            .collect()
    }

    #[test]
    fn exponential_doubles_until_capped() {
        assert_eq!(
            delays(BackoffStrategy::Exponential, Duration::from_secs(10), 7),
            vec![1, 2, 4, 8, 10, 10, 10]
        );
    }

    #[test]
    fn constant_never_grows() {
        assert_eq!(
            delays(BackoffStrategy::Constant, Duration::from_secs(10), 4),
            vec![1, 1, 1, 1]
        );
    }

    #[test]
    fn linear_grows_by_base() {
        assert_eq!(
            delays(BackoffStrategy::Linear, Duration::from_secs(10), 5),
            vec![1, 2, 3, 4, 5]
        );
    }

    #[test]
    fn fibonacci_follows_sequence() {
        assert_eq!(
            delays(BackoffStrategy::Fibonacci, Duration::from_secs(100), 8),
            vec![1, 1, 2, 3, 5, 8, 13, 21]
        );
    }

    #[test]
    fn attempt_zero_has_no_delay() {
        assert_eq!(
            BackoffStrategy::Exponential.delay(0, SEC, Duration::from_secs(10)),
            Duration::ZERO
        );
    }

    #[test]
    fn huge_attempt_numbers_saturate_at_cap() {
        let max = Duration::from_secs(60);
        assert_eq!(BackoffStrategy::Exponential.delay(u32::MAX, SEC, max), max);
        assert_eq!(BackoffStrategy::Fibonacci.delay(5_000, SEC, max), max);
    }

    #[test]
    fn clamp_secs_handles_non_finite() {
        let max = Duration::from_secs(5);
        assert_eq!(clamp_secs(f64::INFINITY, max), max);
        assert_eq!(clamp_secs(f64::NAN, max), Duration::ZERO);
        assert_eq!(clamp_secs(-3.0, max), Duration::ZERO);
    }

    proptest! {
        #[test]
        fn delay_never_exceeds_max(
            attempt in 0u32..200,
            base_ms in 0u64..10_000,
            max_ms in 0u64..120_000,
        ) {
            let max = Duration::from_millis(max_ms);
            for strategy in [
                BackoffStrategy::Constant,
                BackoffStrategy::Linear,
                BackoffStrategy::Exponential,
                BackoffStrategy::Fibonacci,
            ] {
                let delay = strategy.delay(attempt, Duration::from_millis(base_ms), max);
                prop_assert!(delay <= max);
            }
        }

        #[test]
        fn delay_is_non_decreasing(attempt in 1u32..60, base_ms in 1u64..1_000) {
            let base = Duration::from_millis(base_ms);
            let max = Duration::from_secs(3600);
            for strategy in [
                BackoffStrategy::Constant,
                BackoffStrategy::Linear,
                BackoffStrategy::Exponential,
                BackoffStrategy::Fibonacci,
            ] {
                prop_assert!(strategy.delay(attempt, base, max) <= strategy.delay(attempt + 1, base, max));
            }
        }
    }
}
