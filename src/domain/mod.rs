//! Domain layer containing the pure resilience logic.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (timestamps, state machine, errors)
//! - `resilience` - Circuit states, backoff, retry policies and outcomes
//! - `rate_limit` - Rate limiting rules and algorithm evaluation

pub mod foundation;
pub mod rate_limit;
pub mod resilience;
