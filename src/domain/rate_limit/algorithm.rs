//! Rate limiting algorithms and their parameters.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::foundation::ValidationError;

/// A rate limiting algorithm together with its parameters.
///
/// Rates are per second and windows are in seconds so that fractional
/// values round-trip through configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum RateLimitAlgorithm {
    /// Bucket of `capacity` tokens refilled continuously.
    TokenBucket { capacity: u32, refill_per_sec: f64 },

    /// At most `limit` units within any trailing window.
    SlidingWindow { limit: u32, window_secs: f64 },

    /// At most `limit` units per aligned window `floor(now / window)`.
    ///
    /// Cheaper than a sliding window, but a client can burst up to twice
    /// the limit across a window boundary.
    FixedWindow { limit: u32, window_secs: f64 },

    /// Queue of depth `capacity` draining at a fixed rate.
    LeakyBucket { capacity: u32, leak_per_sec: f64 },
}

impl RateLimitAlgorithm {
    /// Token bucket with `capacity` burst, refilled at `refill_per_sec`.
    pub fn token_bucket(capacity: u32, refill_per_sec: f64) -> Self {
        RateLimitAlgorithm::TokenBucket {
            capacity,
            refill_per_sec,
        }
    }

    /// Sliding log of `limit` units per `window`.
    pub fn sliding_window(limit: u32, window: Duration) -> Self {
        RateLimitAlgorithm::SlidingWindow {
            limit,
            window_secs: window.as_secs_f64(),
        }
    }

    /// Fixed counter of `limit` units per `window`.
    pub fn fixed_window(limit: u32, window: Duration) -> Self {
        RateLimitAlgorithm::FixedWindow {
            limit,
            window_secs: window.as_secs_f64(),
        }
    }

    /// Leaky bucket of depth `capacity` draining at `leak_per_sec`.
    pub fn leaky_bucket(capacity: u32, leak_per_sec: f64) -> Self {
        RateLimitAlgorithm::LeakyBucket {
            capacity,
            leak_per_sec,
        }
    }

    /// Maximum number of units admitted in a burst.
    pub fn limit(&self) -> u32 {
        match self {
            RateLimitAlgorithm::TokenBucket { capacity, .. }
            | RateLimitAlgorithm::LeakyBucket { capacity, .. } => *capacity,
            RateLimitAlgorithm::SlidingWindow { limit, .. }
            | RateLimitAlgorithm::FixedWindow { limit, .. } => *limit,
        }
    }

    /// Returns the string representation of the algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            RateLimitAlgorithm::TokenBucket { .. } => "token_bucket",
            RateLimitAlgorithm::SlidingWindow { .. } => "sliding_window",
            RateLimitAlgorithm::FixedWindow { .. } => "fixed_window",
            RateLimitAlgorithm::LeakyBucket { .. } => "leaky_bucket",
        }
    }

    /// Time after which an idle key's state carries no information.
    ///
    /// Shared stores use this as the key expiry.
    pub fn idle_ttl(&self) -> Duration {
        let secs = match self {
            RateLimitAlgorithm::TokenBucket {
                capacity,
                refill_per_sec,
            } => f64::from(*capacity) / refill_per_sec,
            RateLimitAlgorithm::LeakyBucket {
                capacity,
                leak_per_sec,
            } => f64::from(*capacity) / leak_per_sec,
            RateLimitAlgorithm::SlidingWindow { window_secs, .. }
            | RateLimitAlgorithm::FixedWindow { window_secs, .. } => *window_secs,
        };
        if secs.is_finite() && secs > 0.0 {
            Duration::from_secs_f64(secs.ceil() + 1.0)
        } else {
            Duration::from_secs(1)
        }
    }

    /// Validates the algorithm parameters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.limit() == 0 {
            return Err(ValidationError::out_of_range(
                "limit",
                1.0,
                f64::from(u32::MAX),
                0.0,
            ));
        }
        let (field, value) = match self {
            RateLimitAlgorithm::TokenBucket { refill_per_sec, .. } => {
                ("refill_per_sec", *refill_per_sec)
            }
            RateLimitAlgorithm::LeakyBucket { leak_per_sec, .. } => ("leak_per_sec", *leak_per_sec),
            RateLimitAlgorithm::SlidingWindow { window_secs, .. }
            | RateLimitAlgorithm::FixedWindow { window_secs, .. } => ("window_secs", *window_secs),
        };
        if !value.is_finite() || value <= 0.0 {
            return Err(ValidationError::invalid_format(
                field,
                "must be a positive finite number",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_reports_capacity_or_window_limit() {
        assert_eq!(RateLimitAlgorithm::token_bucket(10, 1.0).limit(), 10);
        assert_eq!(
            RateLimitAlgorithm::sliding_window(5, Duration::from_secs(60)).limit(),
            5
        );
        assert_eq!(RateLimitAlgorithm::leaky_bucket(3, 0.5).limit(), 3);
    }

    #[test]
    fn validate_rejects_zero_limit() {
        assert!(RateLimitAlgorithm::token_bucket(0, 1.0).validate().is_err());
    }

    #[test]
    fn validate_rejects_non_positive_rates() {
        assert!(RateLimitAlgorithm::token_bucket(10, 0.0).validate().is_err());
        assert!(RateLimitAlgorithm::leaky_bucket(10, f64::NAN).validate().is_err());
        assert!(RateLimitAlgorithm::fixed_window(10, Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn idle_ttl_covers_a_full_refill() {
        let ttl = RateLimitAlgorithm::token_bucket(10, 2.0).idle_ttl();
        assert_eq!(ttl, Duration::from_secs(6));

        let ttl = RateLimitAlgorithm::sliding_window(5, Duration::from_secs(60)).idle_ttl();
        assert_eq!(ttl, Duration::from_secs(61));
    }

    #[test]
    fn deserializes_from_tagged_json() {
        let json = r#"{"algorithm":"sliding_window","limit":5,"window_secs":60.0}"#;
        let algorithm: RateLimitAlgorithm = serde_json::from_str(json).unwrap();
        assert_eq!(
            algorithm,
            RateLimitAlgorithm::sliding_window(5, Duration::from_secs(60))
        );
        assert_eq!(algorithm.name(), "sliding_window");
    }
}
