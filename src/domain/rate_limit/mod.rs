//! Rate limiting domain - rules and pure quota arithmetic.
//!
//! Stores own the per-key state and the locking; everything here is a
//! deterministic function of (algorithm, state, now, cost).

mod algorithm;
mod quota;
mod rule;

pub use algorithm::RateLimitAlgorithm;
pub use quota::{QuotaDecision, QuotaState};
pub use rule::{RateLimitRule, RateLimitScope};
