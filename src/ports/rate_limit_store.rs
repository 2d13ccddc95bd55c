//! RateLimitStore port - where per-key quota state lives.
//!
//! A store applies one algorithm evaluation to one key atomically. The
//! in-memory store does this under a per-key lock; the Redis store runs
//! the evaluation as a Lua script.

use async_trait::async_trait;

use crate::domain::rate_limit::{QuotaDecision, RateLimitAlgorithm};

/// Backend holding rate limiter state.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Evaluate a request of `cost` units against `key` and persist the
    /// resulting state, atomically with respect to other calls on `key`.
    async fn get_and_update(
        &self,
        key: &str,
        algorithm: &RateLimitAlgorithm,
        cost: u32,
    ) -> Result<QuotaDecision, StoreError>;

    /// Evaluate `key` without consuming quota.
    async fn peek(&self, key: &str, algorithm: &RateLimitAlgorithm)
        -> Result<QuotaDecision, StoreError>;

    /// Drop all state for `key`.
    async fn clear(&self, key: &str) -> Result<(), StoreError>;

    /// Cheap reachability check for readiness probes.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Short backend name for logs and health reports.
    fn backend_name(&self) -> &'static str;
}

/// Errors raised by a rate limit store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the command.
    #[error("store backend error: {0}")]
    Backend(String),

    /// The backend replied with something the store cannot interpret.
    #[error("store script error: {0}")]
    Script(String),
}
