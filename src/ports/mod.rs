//! Ports - Interfaces for the outside world.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the resilience core and its collaborators. Adapters implement these
//! ports.
//!
//! ## Admission Ports
//!
//! - `CircuitBreaker` - Per-dependency failure isolation
//! - `RateLimiter` - Per-key quota checks
//! - `RateLimitStore` - Backend holding rate limiter state
//!
//! ## Support Ports
//!
//! - `HealthProbe` - Typed check run by the health aggregator
//! - `Clock` - Monotonic and wall-clock time
//! - `JitterSource` - Randomness for backoff delays

mod circuit_breaker;
mod clock;
mod health_probe;
mod jitter;
mod rate_limit_store;
mod rate_limiter;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitEventListener,
    CircuitState, NoOpCircuitListener,
};
pub use clock::Clock;
pub use health_probe::{HealthProbe, ProbeResult, ProbeStatus};
pub use jitter::JitterSource;
pub use rate_limit_store::{RateLimitStore, StoreError};
pub use rate_limiter::{
    headers, RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitScope,
    RateLimitStatus, RateLimiter,
};
