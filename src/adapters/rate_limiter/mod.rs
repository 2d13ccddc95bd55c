//! Rate limiter adapters.
//!
//! `RuleRateLimiter` implements the `RateLimiter` port on top of any
//! `RateLimitStore`.
//!
//! ## Available Stores
//!
//! - `InMemoryRateLimitStore` - single process, per-key mutex
//! - `RedisRateLimitStore` - shared between processes, Lua scripts
//!
//! ## Usage
//!
//! ```ignore
//! use agent_guard::adapters::rate_limiter::{
//!     BackendFailureMode, InMemoryRateLimitStore, RateLimitConfig, RuleRateLimiter,
//! };
//!
//! let store = Arc::new(InMemoryRateLimitStore::new());
//! let limiter = RuleRateLimiter::new(store, RateLimitConfig::new(BackendFailureMode::FailOpen));
//! ```

mod config;
mod in_memory;
mod redis;
mod rule_limiter;

pub use config::{BackendFailureMode, RateLimitConfig};
pub use in_memory::InMemoryRateLimitStore;
pub use redis::RedisRateLimitStore;
pub use rule_limiter::RuleRateLimiter;
