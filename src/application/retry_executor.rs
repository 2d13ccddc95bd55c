//! Retry executor.
//!
//! Runs an async operation under a `RetryPolicy`, optionally guarded by a
//! circuit breaker. Every attempt's outcome is reported to the breaker,
//! waits are `tokio::time::sleep` suspension points, and no lock is held
//! across an await.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::adapters::jitter::{NoJitter, SeededJitter};
use crate::domain::resilience::{
    AbortReason, ClassifyError, ErrorClass, RetryOutcome, RetryPolicy, RetryReport,
};
use crate::ports::{CircuitBreaker, JitterSource};

/// Executes operations with retries, backoff and circuit breaking.
///
/// Cheap to clone; clones share the jitter source.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    jitter: Arc<dyn JitterSource>,
}

impl RetryExecutor {
    pub fn new(jitter: Arc<dyn JitterSource>) -> Self {
        Self { jitter }
    }

    /// Executor with reproducible jitter.
    pub fn seeded(seed: u64) -> Self {
        Self::new(Arc::new(SeededJitter::from_seed(seed)))
    }

    /// Executor whose delays follow the backoff strategy exactly.
    pub fn without_jitter() -> Self {
        Self::new(Arc::new(NoJitter))
    }

    /// Runs `operation` until it succeeds or the policy gives up.
    ///
    /// The operation receives the 1-based attempt number. Errors classify
    /// themselves through [`ClassifyError`].
    pub async fn execute<T, E, F, Fut>(
        &self,
        policy: &RetryPolicy,
        breaker: Option<&dyn CircuitBreaker>,
        operation: F,
    ) -> RetryReport<T, E>
    where
        E: ClassifyError,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(policy, breaker, None, classify_self, operation)
            .await
    }

    /// Like [`execute`](Self::execute), with an explicit classifier.
    ///
    /// Every error counts toward the breaker.
    pub async fn execute_classified<T, E, F, Fut, C>(
        &self,
        policy: &RetryPolicy,
        breaker: Option<&dyn CircuitBreaker>,
        classifier: C,
        operation: F,
    ) -> RetryReport<T, E>
    where
        C: Fn(&E) -> ErrorClass,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(policy, breaker, None, |e: &E| (classifier(e), true), operation)
            .await
    }

    /// Like [`execute`](Self::execute), stopping early once `cancel` is
    /// set to true.
    ///
    /// Cancellation is checked before every attempt and interrupts a
    /// backoff wait immediately. An attempt already running is allowed to
    /// finish.
    pub async fn execute_until_cancelled<T, E, F, Fut>(
        &self,
        policy: &RetryPolicy,
        breaker: Option<&dyn CircuitBreaker>,
        cancel: watch::Receiver<bool>,
        operation: F,
    ) -> RetryReport<T, E>
    where
        E: ClassifyError,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(policy, breaker, Some(cancel), classify_self, operation)
            .await
    }

    async fn run<T, E, F, Fut, C>(
        &self,
        policy: &RetryPolicy,
        breaker: Option<&dyn CircuitBreaker>,
        mut cancel: Option<watch::Receiver<bool>>,
        classify: C,
        mut operation: F,
    ) -> RetryReport<T, E>
    where
        C: Fn(&E) -> (ErrorClass, bool),
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let deadline = policy.overall_deadline.map(|budget| started + budget);
        let max_attempts = policy.max_attempts.max(1);
        let dependency = breaker.map_or("-", |b| b.name());

        let mut attempts = 0u32;
        let mut delays: Vec<Duration> = Vec::new();
        let mut last_error: Option<E> = None;

        let finish = |outcome, attempts, delays| RetryReport {
            outcome,
            attempts,
            delays,
            elapsed: started.elapsed(),
        };

        loop {
            if is_cancelled(cancel.as_ref()) {
                tracing::debug!(dependency, attempts, "Retry loop cancelled");
                let outcome = RetryOutcome::Aborted {
                    reason: AbortReason::Cancelled,
                    error: last_error,
                };
                return finish(outcome, attempts, delays);
            }

            if let Some(breaker) = breaker {
                if !breaker.can_execute() {
                    tracing::debug!(dependency, attempts, "Circuit open, not attempting call");
                    let outcome = RetryOutcome::Aborted {
                        reason: AbortReason::CircuitOpen {
                            dependency: breaker.name().to_string(),
                        },
                        error: last_error,
                    };
                    return finish(outcome, attempts, delays);
                }
            }
            let permit = AttemptPermit::new(breaker);

            attempts += 1;
            let result = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, operation(attempts)).await {
                        Ok(result) => result,
                        Err(_) => {
                            permit.failure();
                            tracing::warn!(dependency, attempts, "Attempt overran the retry deadline");
                            return finish(RetryOutcome::Timeout(last_error), attempts, delays);
                        }
                    }
                }
                None => operation(attempts).await,
            };

            let error = match result {
                Ok(value) => {
                    permit.success();
                    if attempts > 1 {
                        tracing::info!(dependency, attempts, "Call succeeded after retries");
                    }
                    return finish(RetryOutcome::Success(value), attempts, delays);
                }
                Err(error) => error,
            };

            let (class, circuit_relevant) = classify(&error);
            if circuit_relevant {
                permit.failure();
            } else {
                permit.ignored();
            }

            if !class.is_retryable() {
                tracing::debug!(dependency, attempts, "Non-retryable error, giving up");
                let outcome = RetryOutcome::Aborted {
                    reason: AbortReason::NonRetryable,
                    error: Some(error),
                };
                return finish(outcome, attempts, delays);
            }

            if attempts >= max_attempts {
                tracing::warn!(dependency, attempts, "Retries exhausted");
                return finish(RetryOutcome::Exhausted(error), attempts, delays);
            }

            let delay = policy.jittered_delay(attempts, self.jitter.sample());
            if let Some(deadline) = deadline {
                if Instant::now() + delay >= deadline {
                    tracing::warn!(
                        dependency,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Next backoff would overrun the retry deadline"
                    );
                    return finish(RetryOutcome::Timeout(Some(error)), attempts, delays);
                }
            }

            tracing::debug!(
                dependency,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "Retrying after backoff"
            );
            match cancel.as_mut() {
                Some(rx) => {
                    let cancelled = tokio::select! {
                        _ = tokio::time::sleep(delay) => false,
                        _ = wait_cancelled(rx) => true,
                    };
                    if cancelled {
                        tracing::debug!(dependency, attempts, "Retry loop cancelled during backoff");
                        let outcome = RetryOutcome::Aborted {
                            reason: AbortReason::Cancelled,
                            error: Some(error),
                        };
                        return finish(outcome, attempts, delays);
                    }
                }
                None => tokio::time::sleep(delay).await,
            }
            delays.push(delay);
            last_error = Some(error);
        }
    }
}

/// Outcome slot for one admitted attempt.
///
/// Dropping it unsettled (the caller abandoned the `execute` future while
/// the attempt was running) reports the attempt as ignored, so a half-open
/// trial permit is handed back instead of leaking.
struct AttemptPermit<'a> {
    breaker: Option<&'a dyn CircuitBreaker>,
}

impl<'a> AttemptPermit<'a> {
    fn new(breaker: Option<&'a dyn CircuitBreaker>) -> Self {
        Self { breaker }
    }

    fn success(mut self) {
        if let Some(breaker) = self.breaker.take() {
            breaker.record_success();
        }
    }

    fn failure(mut self) {
        if let Some(breaker) = self.breaker.take() {
            breaker.record_failure();
        }
    }

    fn ignored(mut self) {
        if let Some(breaker) = self.breaker.take() {
            breaker.record_ignored();
        }
    }
}

impl Drop for AttemptPermit<'_> {
    fn drop(&mut self) {
        if let Some(breaker) = self.breaker.take() {
            tracing::debug!(
                dependency = breaker.name(),
                "Attempt abandoned before completion, releasing breaker permit"
            );
            breaker.record_ignored();
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(Arc::new(SeededJitter::from_entropy()))
    }
}

fn classify_self<E: ClassifyError>(error: &E) -> (ErrorClass, bool) {
    (error.error_class(), error.is_circuit_relevant())
}

fn is_cancelled(cancel: Option<&watch::Receiver<bool>>) -> bool {
    cancel.is_some_and(|rx| *rx.borrow())
}

/// Resolves once the flag turns true. Never resolves if the sender is gone.
async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}
