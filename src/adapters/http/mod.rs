//! HTTP adapters - thin axum surface over the health aggregator and the
//! rate limiter.

pub mod health;
pub mod middleware;

pub use health::{health_router, HealthState};
pub use middleware::{rate_limit_middleware, RateLimitRejection, RateLimiterState};
