//! HTTP middleware for axum.
//!
//! - `rate_limit` - Rate limit admission and headers

pub mod rate_limit;

pub use rate_limit::{rate_limit_middleware, RateLimitRejection, RateLimiterState};
