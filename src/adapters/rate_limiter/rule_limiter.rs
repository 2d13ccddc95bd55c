//! Rule-driven rate limiter over any `RateLimitStore`.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::adapters::clock::SystemClock;
use crate::domain::rate_limit::{QuotaDecision, RateLimitAlgorithm};
use crate::ports::{
    Clock, RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitStatus,
    RateLimitStore, RateLimiter, StoreError,
};

use super::config::{BackendFailureMode, RateLimitConfig};

/// Picks the rule for each key and evaluates it in the configured store.
///
/// Store failures never surface from `check`; they are resolved by the
/// configured `BackendFailureMode`. Every store call is bounded by
/// `RateLimitConfig::store_timeout`, and a call that overruns it is a
/// store failure.
pub struct RuleRateLimiter {
    store: Arc<dyn RateLimitStore>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl RuleRateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, config: RateLimitConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Uses `clock` for the wall time reported in `reset_at`.
    pub fn with_clock(
        store: Arc<dyn RateLimitStore>,
        config: RateLimitConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RateLimitStore> {
        &self.store
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let timeout = self.config.store_timeout;
        tokio::time::timeout(timeout, call).await.unwrap_or_else(|_| {
            Err(StoreError::Backend(format!(
                "{} store call timed out after {}ms",
                self.store.backend_name(),
                timeout.as_millis()
            )))
        })
    }

    fn algorithm_for(&self, key: &RateLimitKey) -> &RateLimitAlgorithm {
        self.config.algorithm_for(key.scope, key.resource.as_deref())
    }

    fn to_result(&self, key: &RateLimitKey, decision: QuotaDecision) -> RateLimitResult {
        let reset_at = self.clock.wall_time().plus(decision.reset_after);
        if decision.allowed {
            return RateLimitResult::Allowed(RateLimitStatus {
                limit: decision.limit,
                remaining: decision.remaining,
                reset_at,
                degraded: false,
            });
        }

        let mut denied = RateLimitDenied {
            limit: decision.limit,
            retry_after: decision.retry_after,
            reset_at,
            scope: key.scope,
            message: String::new(),
        };
        denied.message = format!(
            "Rate limit exceeded for {}. Retry after {} seconds.",
            key.scope,
            denied.retry_after_secs()
        );
        tracing::debug!(
            scope = %key.scope,
            identifier = %key.identifier,
            retry_after_ms = decision.retry_after.as_millis() as u64,
            "Rate limit denied"
        );
        RateLimitResult::Denied(denied)
    }

    fn on_store_failure(
        &self,
        key: &RateLimitKey,
        algorithm: &RateLimitAlgorithm,
        err: StoreError,
    ) -> RateLimitResult {
        let now = self.clock.wall_time();
        match self.config.failure_mode {
            BackendFailureMode::FailOpen => {
                tracing::warn!(
                    backend = self.store.backend_name(),
                    scope = %key.scope,
                    error = %err,
                    "Rate limit store failed, allowing request (fail-open)"
                );
                RateLimitResult::Allowed(RateLimitStatus {
                    limit: algorithm.limit(),
                    remaining: algorithm.limit(),
                    reset_at: now,
                    degraded: true,
                })
            }
            BackendFailureMode::FailClosed { retry_after } => {
                tracing::warn!(
                    backend = self.store.backend_name(),
                    scope = %key.scope,
                    error = %err,
                    "Rate limit store failed, denying request (fail-closed)"
                );
                RateLimitResult::Denied(RateLimitDenied {
                    limit: algorithm.limit(),
                    retry_after,
                    reset_at: now.plus(retry_after),
                    scope: key.scope,
                    message: "Rate limiting is temporarily unavailable.".to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl RateLimiter for RuleRateLimiter {
    async fn check_cost(
        &self,
        key: RateLimitKey,
        cost: u32,
    ) -> Result<RateLimitResult, RateLimitError> {
        key.validate()?;
        if cost == 0 {
            return Err(RateLimitError::InvalidCost(cost));
        }

        let algorithm = self.algorithm_for(&key);
        let storage_key = key.storage_key(&self.config.key_prefix);
        match self
            .bounded(self.store.get_and_update(&storage_key, algorithm, cost))
            .await
        {
            Ok(decision) => Ok(self.to_result(&key, decision)),
            Err(err) => Ok(self.on_store_failure(&key, algorithm, err)),
        }
    }

    /// Reads the quota without consuming it.
    ///
    /// Store failures are reported as `Unavailable` whatever the failure
    /// mode, since nothing is being admitted.
    async fn status(&self, key: RateLimitKey) -> Result<RateLimitStatus, RateLimitError> {
        key.validate()?;
        let algorithm = self.algorithm_for(&key);
        let storage_key = key.storage_key(&self.config.key_prefix);
        let decision = self
            .bounded(self.store.peek(&storage_key, algorithm))
            .await
            .map_err(|e| RateLimitError::Unavailable(e.to_string()))?;

        Ok(RateLimitStatus {
            limit: decision.limit,
            remaining: decision.remaining,
            reset_at: self.clock.wall_time().plus(decision.reset_after),
            degraded: false,
        })
    }

    async fn reset(&self, key: RateLimitKey) -> Result<(), RateLimitError> {
        key.validate()?;
        let storage_key = key.storage_key(&self.config.key_prefix);
        self.bounded(self.store.clear(&storage_key))
            .await
            .map_err(|e| RateLimitError::Unavailable(e.to_string()))?;
        tracing::info!(key = %storage_key, "Rate limit reset");
        Ok(())
    }
}

impl std::fmt::Debug for RuleRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRateLimiter")
            .field("backend", &self.store.backend_name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
