//! Request guard: rate limit, then circuit breaker, then retried call.

use std::future::Future;
use std::sync::Arc;

use crate::adapters::circuit_breaker::CircuitBreakerRegistry;
use crate::domain::resilience::{AbortReason, ClassifyError, RetryPolicy, RetryReport};
use crate::ports::{RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimiter};

use super::retry_executor::RetryExecutor;

/// What happened to a guarded call.
#[derive(Debug)]
pub enum GuardOutcome<T, E> {
    /// The client is over quota; the dependency was not touched.
    RateLimited(RateLimitDenied),
    /// The dependency's circuit refused the first attempt.
    CircuitOpen { dependency: String },
    /// At least one attempt ran; see the report for the result.
    Completed(RetryReport<T, E>),
}

impl<T, E> GuardOutcome<T, E> {
    pub fn is_completed(&self) -> bool {
        matches!(self, GuardOutcome::Completed(_))
    }

    /// The call's value, if it completed successfully.
    pub fn into_success(self) -> Option<T> {
        match self {
            GuardOutcome::Completed(report) => report.into_result().ok(),
            _ => None,
        }
    }
}

/// Applies admission control and resilience to downstream calls in the
/// canonical order: rate limiter, circuit breaker, retry executor.
#[derive(Clone)]
pub struct RequestGuard {
    limiter: Arc<dyn RateLimiter>,
    breakers: Arc<CircuitBreakerRegistry>,
    executor: RetryExecutor,
}

impl RequestGuard {
    pub fn new(
        limiter: Arc<dyn RateLimiter>,
        breakers: Arc<CircuitBreakerRegistry>,
        executor: RetryExecutor,
    ) -> Self {
        Self {
            limiter,
            breakers,
            executor,
        }
    }

    pub fn limiter(&self) -> &Arc<dyn RateLimiter> {
        &self.limiter
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    /// Runs `operation` against `dependency` on behalf of `client_key`.
    ///
    /// Fails only when the key itself is invalid; every other outcome is a
    /// `GuardOutcome`.
    pub async fn call<T, E, F, Fut>(
        &self,
        client_key: RateLimitKey,
        dependency: &str,
        policy: &RetryPolicy,
        operation: F,
    ) -> Result<GuardOutcome<T, E>, RateLimitError>
    where
        E: ClassifyError,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let RateLimitResult::Denied(denied) = self.limiter.check(client_key).await? {
            return Ok(GuardOutcome::RateLimited(denied));
        }

        // The executor asks the breaker before each attempt, so the guard
        // does not take a half-open permit of its own.
        let breaker = self.breakers.get(dependency);
        let report = self
            .executor
            .execute(policy, Some(breaker.as_ref()), operation)
            .await;

        let refused_up_front = report.attempts == 0
            && matches!(
                report.outcome.abort_reason(),
                Some(AbortReason::CircuitOpen { .. })
            );
        if refused_up_front {
            return Ok(GuardOutcome::CircuitOpen {
                dependency: dependency.to_string(),
            });
        }
        Ok(GuardOutcome::Completed(report))
    }
}

impl std::fmt::Debug for RequestGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGuard")
            .field("breakers", &self.breakers)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}
