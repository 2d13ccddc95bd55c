//! Adapters - Implementations of port interfaces.
//!
//! - `circuit_breaker` - In-process breaker and named registry
//! - `rate_limiter` - Rule-based limiter over in-memory or Redis stores
//! - `health` - Probes over breakers, stores and closures
//! - `clock` / `jitter` - Time and randomness sources
//! - `http` - axum health routes and rate limit middleware (feature `http`)

pub mod circuit_breaker;
pub mod clock;
pub mod health;
#[cfg(feature = "http")]
pub mod http;
pub mod jitter;
pub mod rate_limiter;

pub use circuit_breaker::{CircuitBreakerRegistry, StateCircuitBreaker};
pub use clock::{ManualClock, SystemClock, TokioClock};
pub use health::{CircuitBreakerProbe, FnProbe, RateLimitStoreProbe};
pub use jitter::{FixedJitter, NoJitter, SeededJitter};
pub use rate_limiter::{
    BackendFailureMode, InMemoryRateLimitStore, RateLimitConfig, RedisRateLimitStore,
    RuleRateLimiter,
};
