//! Application layer - orchestration over the ports.
//!
//! - `RetryExecutor` - retries with backoff, reporting to a circuit breaker
//! - `HealthAggregator` - liveness, readiness and health reports
//! - `RequestGuard` - rate limit, breaker and retry in the canonical order

mod guard;
mod health;
mod retry_executor;

pub use guard::{GuardOutcome, RequestGuard};
pub use health::{
    HealthAggregator, HealthReport, HealthStatus, LivenessReport, ProbeReport, ReadinessReport,
};
pub use retry_executor::RetryExecutor;
