//! Integration tests for the rule-based rate limiter over the in-memory store.
//!
//! Each test shares one `ManualClock` between the store and the limiter so
//! window boundaries and refills happen exactly when the test says.

use std::sync::Arc;
use std::time::Duration;

use agent_guard::adapters::{
    BackendFailureMode, InMemoryRateLimitStore, ManualClock, RateLimitConfig, RuleRateLimiter,
};
use agent_guard::domain::rate_limit::{RateLimitAlgorithm, RateLimitRule, RateLimitScope};
use agent_guard::ports::{RateLimitKey, RateLimitResult, RateLimiter};

// =============================================================================
// Test Infrastructure
// =============================================================================

fn limiter_with(rules: Vec<RateLimitRule>) -> (RuleRateLimiter, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let store = InMemoryRateLimitStore::with_clock(clock.clone());
    let config = rules
        .into_iter()
        .fold(RateLimitConfig::new(BackendFailureMode::FailOpen), RateLimitConfig::with_rule);
    let limiter = RuleRateLimiter::with_clock(Arc::new(store), config, clock.clone());
    (limiter, clock)
}

fn ip_rule(algorithm: RateLimitAlgorithm) -> Vec<RateLimitRule> {
    vec![RateLimitRule::new(RateLimitScope::Ip, algorithm)]
}

fn denied_retry_after(result: &RateLimitResult) -> Duration {
    match result {
        RateLimitResult::Denied(denied) => denied.retry_after,
        RateLimitResult::Allowed(status) => panic!("expected denial, got {:?}", status),
    }
}

// =============================================================================
// Algorithms
// =============================================================================

#[tokio::test]
async fn token_bucket_bursts_then_refills() {
    let (limiter, clock) = limiter_with(ip_rule(RateLimitAlgorithm::token_bucket(10, 1.0)));
    let key = RateLimitKey::ip("10.0.0.1");

    for expected_remaining in (0..10).rev() {
        let result = limiter.check(key.clone()).await.unwrap();
        assert!(result.is_allowed());
        assert_eq!(result.remaining(), expected_remaining);
    }

    let denied = limiter.check(key.clone()).await.unwrap();
    assert_eq!(denied_retry_after(&denied), Duration::from_secs(1));

    clock.advance(Duration::from_secs(1));
    assert!(limiter.check(key).await.unwrap().is_allowed());
}

#[tokio::test]
async fn sliding_window_frees_slots_as_entries_age_out() {
    let (limiter, clock) = limiter_with(ip_rule(RateLimitAlgorithm::sliding_window(
        2,
        Duration::from_secs(10),
    )));
    let key = RateLimitKey::ip("10.0.0.2");

    assert!(limiter.check(key.clone()).await.unwrap().is_allowed());
    clock.advance(Duration::from_secs(4));
    assert!(limiter.check(key.clone()).await.unwrap().is_allowed());

    clock.advance(Duration::from_secs(1));
    let denied = limiter.check(key.clone()).await.unwrap();
    assert_eq!(denied_retry_after(&denied), Duration::from_secs(5));

    clock.advance(Duration::from_secs(5));
    assert!(limiter.check(key).await.unwrap().is_allowed());
}

#[tokio::test]
async fn fixed_window_resets_at_the_boundary() {
    let (limiter, clock) = limiter_with(ip_rule(RateLimitAlgorithm::fixed_window(
        3,
        Duration::from_secs(10),
    )));
    let key = RateLimitKey::ip("10.0.0.3");

    for _ in 0..3 {
        assert!(limiter.check(key.clone()).await.unwrap().is_allowed());
    }
    clock.advance(Duration::from_secs(6));
    let denied = limiter.check(key.clone()).await.unwrap();
    assert_eq!(denied_retry_after(&denied), Duration::from_secs(4));

    clock.advance(Duration::from_secs(4));
    let result = limiter.check(key).await.unwrap();
    assert!(result.is_allowed());
    assert_eq!(result.remaining(), 2);
}

#[tokio::test]
async fn leaky_bucket_drains_at_a_fixed_rate() {
    let (limiter, clock) = limiter_with(ip_rule(RateLimitAlgorithm::leaky_bucket(2, 1.0)));
    let key = RateLimitKey::ip("10.0.0.4");

    assert!(limiter.check(key.clone()).await.unwrap().is_allowed());
    assert!(limiter.check(key.clone()).await.unwrap().is_allowed());
    let denied = limiter.check(key.clone()).await.unwrap();
    assert_eq!(denied_retry_after(&denied), Duration::from_secs(1));

    clock.advance(Duration::from_secs(1));
    assert!(limiter.check(key.clone()).await.unwrap().is_allowed());
    assert!(limiter.check(key).await.unwrap().is_denied());
}

// =============================================================================
// Cost, status and reset
// =============================================================================

#[tokio::test]
async fn multi_unit_cost_is_charged_in_full_or_not_at_all() {
    let (limiter, _clock) = limiter_with(ip_rule(RateLimitAlgorithm::token_bucket(10, 1.0)));
    let key = RateLimitKey::ip("10.0.0.5");

    let result = limiter.check_cost(key.clone(), 8).await.unwrap();
    assert_eq!(result.remaining(), 2);

    let denied = limiter.check_cost(key.clone(), 5).await.unwrap();
    assert_eq!(denied_retry_after(&denied), Duration::from_secs(3));

    let status = limiter.status(key).await.unwrap();
    assert_eq!(status.remaining, 2);
}

#[tokio::test]
async fn status_does_not_consume_and_reset_restores() {
    let (limiter, _clock) = limiter_with(ip_rule(RateLimitAlgorithm::fixed_window(
        2,
        Duration::from_secs(60),
    )));
    let key = RateLimitKey::ip("10.0.0.6");

    for _ in 0..3 {
        assert_eq!(limiter.status(key.clone()).await.unwrap().remaining, 2);
    }
    limiter.check(key.clone()).await.unwrap();
    limiter.check(key.clone()).await.unwrap();
    assert!(limiter.check(key.clone()).await.unwrap().is_denied());

    limiter.reset(key.clone()).await.unwrap();
    assert_eq!(limiter.status(key.clone()).await.unwrap().remaining, 2);
    assert!(limiter.check(key).await.unwrap().is_allowed());
}

#[tokio::test]
async fn resource_rule_overrides_scope_rule() {
    let (limiter, _clock) = limiter_with(vec![
        RateLimitRule::new(
            RateLimitScope::User,
            RateLimitAlgorithm::fixed_window(100, Duration::from_secs(60)),
        ),
        RateLimitRule::new(
            RateLimitScope::User,
            RateLimitAlgorithm::fixed_window(1, Duration::from_secs(60)),
        )
        .for_resource("completions"),
    ]);

    let completions = RateLimitKey::user_resource("u1", "completions");
    assert!(limiter.check(completions.clone()).await.unwrap().is_allowed());
    assert!(limiter.check(completions).await.unwrap().is_denied());

    let general = RateLimitKey::user("u1");
    let result = limiter.check(general).await.unwrap();
    assert!(result.is_allowed());
    assert_eq!(result.limit(), 100);
}

#[tokio::test]
async fn denial_headers_include_retry_after() {
    let (limiter, _clock) = limiter_with(ip_rule(RateLimitAlgorithm::token_bucket(1, 0.5)));
    let key = RateLimitKey::ip("10.0.0.7");
    limiter.check(key.clone()).await.unwrap();

    let denied = limiter.check(key).await.unwrap();
    let headers = denied.rate_limit_headers();
    let retry_after = headers
        .iter()
        .find(|(name, _)| *name == "retry-after")
        .map(|(_, value)| value.as_str());
    assert_eq!(retry_after, Some("2"));
    assert!(headers.iter().any(|(name, value)| *name == "x-ratelimit-remaining" && value == "0"));
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checks_never_over_admit() {
    let (limiter, _clock) = limiter_with(ip_rule(RateLimitAlgorithm::fixed_window(
        20,
        Duration::from_secs(60),
    )));
    let limiter = Arc::new(limiter);

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                limiter
                    .check(RateLimitKey::ip("10.0.0.8"))
                    .await
                    .map(|result| result.is_allowed())
            })
        })
        .collect();

    let mut allowed = 0;
    for task in tasks {
        if task.await.unwrap().unwrap() {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 20);
}
