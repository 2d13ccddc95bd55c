//! Per-key quota state and the pure evaluation of each algorithm.
//!
//! Time is passed in as seconds on a monotonic axis chosen by the store.
//! A clock that moves backwards is treated as zero elapsed time.

use std::collections::VecDeque;
use std::time::Duration;

use super::algorithm::RateLimitAlgorithm;

/// Mutable per-key state, one variant per algorithm.
#[derive(Debug, Clone, PartialEq)]
pub enum QuotaState {
    TokenBucket { tokens: f64, last_refill: f64 },
    /// One entry per admitted unit, oldest first.
    SlidingWindow { log: VecDeque<f64> },
    FixedWindow { window: i64, count: u32 },
    LeakyBucket { level: f64, last_leak: f64 },
}

impl QuotaState {
    /// State for a key that has never been seen.
    pub fn fresh(algorithm: &RateLimitAlgorithm, now: f64) -> Self {
        match algorithm {
            RateLimitAlgorithm::TokenBucket { capacity, .. } => QuotaState::TokenBucket {
                tokens: f64::from(*capacity),
                last_refill: now,
            },
            RateLimitAlgorithm::SlidingWindow { .. } => QuotaState::SlidingWindow {
                log: VecDeque::new(),
            },
            RateLimitAlgorithm::FixedWindow { window_secs, .. } => QuotaState::FixedWindow {
                window: window_index(now, *window_secs),
                count: 0,
            },
            RateLimitAlgorithm::LeakyBucket { .. } => QuotaState::LeakyBucket {
                level: 0.0,
                last_leak: now,
            },
        }
    }

    fn fits(&self, algorithm: &RateLimitAlgorithm) -> bool {
        matches!(
            (self, algorithm),
            (QuotaState::TokenBucket { .. }, RateLimitAlgorithm::TokenBucket { .. })
                | (QuotaState::SlidingWindow { .. }, RateLimitAlgorithm::SlidingWindow { .. })
                | (QuotaState::FixedWindow { .. }, RateLimitAlgorithm::FixedWindow { .. })
                | (QuotaState::LeakyBucket { .. }, RateLimitAlgorithm::LeakyBucket { .. })
        )
    }
}

/// Result of evaluating one request against a key's quota.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub limit: u32,
    /// Units still available after this request.
    pub remaining: u32,
    /// Zero when allowed; otherwise the wait before the same request fits.
    pub retry_after: Duration,
    /// Time until the quota is fully restored.
    pub reset_after: Duration,
}

impl RateLimitAlgorithm {
    /// Evaluates a request of `cost` units and updates `state` in place.
    ///
    /// A `cost` of zero inspects the quota without consuming anything.
    ///
    /// # Panics
    ///
    /// Panics if the state ends up with a negative token or queue count,
    /// which can only happen through a bug in this function.
    pub fn evaluate(&self, state: &mut QuotaState, now: f64, cost: u32) -> QuotaDecision {
        if !state.fits(self) {
            *state = QuotaState::fresh(self, now);
        }
        let cost_units = f64::from(cost);

        match (self, state) {
            (
                RateLimitAlgorithm::TokenBucket {
                    capacity,
                    refill_per_sec,
                },
                QuotaState::TokenBucket {
                    tokens,
                    last_refill,
                },
            ) => {
                let capacity = f64::from(*capacity);
                let elapsed = (now - *last_refill).max(0.0);
                *tokens = (*tokens + elapsed * refill_per_sec).min(capacity);
                *last_refill = last_refill.max(now);

                let allowed = *tokens >= cost_units;
                if allowed {
                    *tokens -= cost_units;
                }
                assert!(*tokens >= 0.0, "token count went negative: {}", tokens);

                QuotaDecision {
                    allowed,
                    limit: capacity as u32,
                    remaining: tokens.floor() as u32,
                    retry_after: if allowed {
                        Duration::ZERO
                    } else {
                        secs((cost_units - *tokens) / refill_per_sec)
                    },
                    reset_after: secs((capacity - *tokens) / refill_per_sec),
                }
            }

            (
                RateLimitAlgorithm::SlidingWindow { limit, window_secs },
                QuotaState::SlidingWindow { log },
            ) => {
                let window = *window_secs;
                let limit_units = *limit as usize;
                let now = log.back().map_or(now, |last| last.max(now));
                while log.front().is_some_and(|&ts| ts <= now - window) {
                    log.pop_front();
                }

                let count = log.len();
                let needed = cost as usize;
                let allowed = count + needed <= limit_units;
                if allowed {
                    log.extend(std::iter::repeat(now).take(needed));
                }

                let retry_after = if allowed {
                    Duration::ZERO
                } else {
                    // The request fits once enough of the oldest entries expire.
                    let index = (count + needed).saturating_sub(limit_units + 1);
                    log.get(index)
                        .or(log.back())
                        .map_or(secs(window), |ts| secs(ts + window - now))
                };

                QuotaDecision {
                    allowed,
                    limit: *limit,
                    remaining: limit_units.saturating_sub(log.len()) as u32,
                    retry_after,
                    reset_after: log.back().map_or(Duration::ZERO, |ts| secs(ts + window - now)),
                }
            }

            (
                RateLimitAlgorithm::FixedWindow { limit, window_secs },
                QuotaState::FixedWindow { window, count },
            ) => {
                let window_len = *window_secs;
                let index = window_index(now, window_len);
                if index > *window {
                    *window = index;
                    *count = 0;
                }

                let allowed = count.saturating_add(cost) <= *limit;
                if allowed {
                    *count += cost;
                }

                let window_end = (*window + 1) as f64 * window_len;
                let reset_after = secs((window_end - now).min(window_len));

                QuotaDecision {
                    allowed,
                    limit: *limit,
                    remaining: limit.saturating_sub(*count),
                    retry_after: if allowed { Duration::ZERO } else { reset_after },
                    reset_after,
                }
            }

            (
                RateLimitAlgorithm::LeakyBucket {
                    capacity,
                    leak_per_sec,
                },
                QuotaState::LeakyBucket { level, last_leak },
            ) => {
                let capacity = f64::from(*capacity);
                let elapsed = (now - *last_leak).max(0.0);
                *level = (*level - elapsed * leak_per_sec).max(0.0);
                *last_leak = last_leak.max(now);

                let allowed = *level + cost_units <= capacity;
                if allowed {
                    *level += cost_units;
                }
                assert!(*level >= 0.0, "queue depth went negative: {}", level);

                QuotaDecision {
                    allowed,
                    limit: capacity as u32,
                    remaining: (capacity - *level).max(0.0).floor() as u32,
                    retry_after: if allowed {
                        Duration::ZERO
                    } else {
                        secs((*level + cost_units - capacity) / leak_per_sec)
                    },
                    reset_after: secs(*level / leak_per_sec),
                }
            }

            _ => unreachable!("quota state is reset to match the algorithm above"),
        }
    }

    /// Evaluates without consuming quota or mutating the caller's state.
    pub fn peek(&self, state: &QuotaState, now: f64) -> QuotaDecision {
        let mut scratch = state.clone();
        self.evaluate(&mut scratch, now, 0)
    }
}

fn window_index(now: f64, window_secs: f64) -> i64 {
    (now / window_secs).floor() as i64
}

fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn run(algorithm: &RateLimitAlgorithm, state: &mut QuotaState, now: f64) -> QuotaDecision {
        algorithm.evaluate(state, now, 1)
    }

    // ─── Token Bucket ────────────────────────────────────────────────

    #[test]
    fn token_bucket_allows_burst_then_refills_one_per_second() {
        let algorithm = RateLimitAlgorithm::token_bucket(10, 1.0);
        let mut state = QuotaState::fresh(&algorithm, 0.0);

        for i in 0..10 {
            let decision = run(&algorithm, &mut state, 0.0);
            assert!(decision.allowed, "request {} should be allowed", i + 1);
            assert_eq!(decision.remaining, 9 - i);
        }

        let denied = run(&algorithm, &mut state, 0.0);
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after, Duration::from_secs(1));

        assert!(run(&algorithm, &mut state, 1.0).allowed);
        assert!(!run(&algorithm, &mut state, 1.0).allowed);
    }

    #[test]
    fn token_bucket_never_exceeds_capacity_after_idle() {
        let algorithm = RateLimitAlgorithm::token_bucket(5, 1.0);
        let mut state = QuotaState::fresh(&algorithm, 0.0);
        let decision = run(&algorithm, &mut state, 1_000.0);
        assert_eq!(decision.remaining, 4);
    }

    #[test]
    fn token_bucket_ignores_clock_moving_backwards() {
        let algorithm = RateLimitAlgorithm::token_bucket(2, 1.0);
        let mut state = QuotaState::fresh(&algorithm, 10.0);
        run(&algorithm, &mut state, 10.0);
        run(&algorithm, &mut state, 10.0);

        // Going back in time must not mint tokens.
        assert!(!run(&algorithm, &mut state, 5.0).allowed);
        assert!(!run(&algorithm, &mut state, 10.5).allowed);
        assert!(run(&algorithm, &mut state, 11.0).allowed);
    }

    #[test]
    fn token_bucket_cost_is_charged_in_full() {
        let algorithm = RateLimitAlgorithm::token_bucket(10, 2.0);
        let mut state = QuotaState::fresh(&algorithm, 0.0);

        let decision = algorithm.evaluate(&mut state, 0.0, 7);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 3);

        let denied = algorithm.evaluate(&mut state, 0.0, 5);
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after, Duration::from_secs(1));
        assert_eq!(denied.remaining, 3);
    }

    // ─── Sliding Window ──────────────────────────────────────────────

    #[test]
    fn sliding_window_denies_sixth_request_until_first_expires() {
        let algorithm = RateLimitAlgorithm::sliding_window(5, Duration::from_secs(60));
        let mut state = QuotaState::fresh(&algorithm, 0.0);

        for t in 0..5 {
            assert!(run(&algorithm, &mut state, t as f64).allowed);
        }
        let denied = run(&algorithm, &mut state, 10.0);
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after, Duration::from_secs(50));

        assert!(run(&algorithm, &mut state, 60.0).allowed);
        assert!(!run(&algorithm, &mut state, 60.5).allowed);
    }

    #[test]
    fn sliding_window_denied_requests_do_not_consume() {
        let algorithm = RateLimitAlgorithm::sliding_window(1, Duration::from_secs(10));
        let mut state = QuotaState::fresh(&algorithm, 0.0);
        assert!(run(&algorithm, &mut state, 0.0).allowed);
        for t in 1..10 {
            assert!(!run(&algorithm, &mut state, t as f64).allowed);
        }
        assert!(run(&algorithm, &mut state, 10.0).allowed);
    }

    // ─── Fixed Window ────────────────────────────────────────────────

    #[test]
    fn fixed_window_resets_at_boundary() {
        let algorithm = RateLimitAlgorithm::fixed_window(3, Duration::from_secs(10));
        let mut state = QuotaState::fresh(&algorithm, 0.0);

        for _ in 0..3 {
            assert!(run(&algorithm, &mut state, 9.0).allowed);
        }
        let denied = run(&algorithm, &mut state, 9.5);
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after, Duration::from_millis(500));

        // New window: full quota again (the documented boundary burst).
        let decision = run(&algorithm, &mut state, 10.0);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 2);
    }

    // ─── Leaky Bucket ────────────────────────────────────────────────

    #[test]
    fn leaky_bucket_drains_at_fixed_rate() {
        let algorithm = RateLimitAlgorithm::leaky_bucket(3, 1.0);
        let mut state = QuotaState::fresh(&algorithm, 0.0);

        for _ in 0..3 {
            assert!(run(&algorithm, &mut state, 0.0).allowed);
        }
        let denied = run(&algorithm, &mut state, 0.0);
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after, Duration::from_secs(1));
        assert_eq!(denied.reset_after, Duration::from_secs(3));

        assert!(run(&algorithm, &mut state, 1.0).allowed);
        assert!(!run(&algorithm, &mut state, 1.0).allowed);

        let decision = algorithm.peek(&state, 4.0);
        assert_eq!(decision.remaining, 3);
    }

    // ─── Shared Behaviour ────────────────────────────────────────────

    #[test]
    fn peek_does_not_consume() {
        let algorithm = RateLimitAlgorithm::token_bucket(2, 1.0);
        let mut state = QuotaState::fresh(&algorithm, 0.0);
        run(&algorithm, &mut state, 0.0);

        let before = state.clone();
        let decision = algorithm.peek(&state, 0.0);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
        assert_eq!(state, before);
    }

    #[test]
    fn mismatched_state_is_replaced() {
        let algorithm = RateLimitAlgorithm::sliding_window(2, Duration::from_secs(1));
        let mut state = QuotaState::TokenBucket {
            tokens: 0.0,
            last_refill: 0.0,
        };
        assert!(run(&algorithm, &mut state, 0.0).allowed);
        assert!(matches!(state, QuotaState::SlidingWindow { .. }));
    }

    proptest! {
        #[test]
        fn token_bucket_state_never_negative(
            capacity in 1u32..50,
            rate in 0.1f64..20.0,
            steps in proptest::collection::vec((0.0f64..5.0, 1u32..10), 1..60),
        ) {
            let algorithm = RateLimitAlgorithm::token_bucket(capacity, rate);
            let mut state = QuotaState::fresh(&algorithm, 0.0);
            let mut now = 0.0;
            for (advance, cost) in steps {
                now += advance;
                let decision = algorithm.evaluate(&mut state, now, cost);
                prop_assert!(decision.remaining <= capacity);
                if let QuotaState::TokenBucket { tokens, .. } = state {
                    prop_assert!(tokens >= 0.0);
                    prop_assert!(tokens <= f64::from(capacity));
                }
            }
        }

        #[test]
        fn sliding_window_never_admits_more_than_limit(
            limit in 1u32..20,
            times in proptest::collection::vec(0.0f64..1.0, 1..100),
        ) {
            let algorithm = RateLimitAlgorithm::sliding_window(limit, Duration::from_secs(10));
            let mut state = QuotaState::fresh(&algorithm, 0.0);
            let mut now = 0.0;
            let mut admitted = 0u32;
            for step in times {
                now += step;
                if algorithm.evaluate(&mut state, now, 1).allowed && now < 10.0 {
                    admitted += 1;
                }
            }
            prop_assert!(admitted <= limit);
        }
    }
}
