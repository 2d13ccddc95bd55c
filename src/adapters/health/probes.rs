//! Health probes over the crate's own components.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::ports::{CircuitBreaker, CircuitState, HealthProbe, ProbeResult, RateLimitStore};

/// Reports a circuit breaker's state.
///
/// Open is unhealthy and half-open is degraded. Non-critical unless
/// marked otherwise.
pub struct CircuitBreakerProbe {
    name: String,
    breaker: Arc<dyn CircuitBreaker>,
    critical: bool,
}

impl CircuitBreakerProbe {
    pub fn new(breaker: Arc<dyn CircuitBreaker>) -> Self {
        Self {
            name: format!("circuit:{}", breaker.name()),
            breaker,
            critical: false,
        }
    }

    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }
}

#[async_trait]
impl HealthProbe for CircuitBreakerProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn critical(&self) -> bool {
        self.critical
    }

    async fn check(&self) -> ProbeResult {
        match self.breaker.state() {
            CircuitState::Closed => ProbeResult::healthy(),
            CircuitState::HalfOpen => ProbeResult::degraded("circuit half-open, probing recovery"),
            CircuitState::Open => {
                let metrics = self.breaker.metrics();
                let wait = metrics
                    .time_until_half_open
                    .map_or(0, |d| d.as_secs());
                ProbeResult::unhealthy(format!("circuit open, next trial in {}s", wait))
            }
        }
    }
}

/// Pings the rate limit store. Critical by default, since a shared store
/// that is down affects every request.
pub struct RateLimitStoreProbe {
    store: Arc<dyn RateLimitStore>,
    critical: bool,
    timeout: Option<Duration>,
}

impl RateLimitStoreProbe {
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            store,
            critical: true,
            timeout: None,
        }
    }

    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl HealthProbe for RateLimitStoreProbe {
    fn name(&self) -> &str {
        "rate_limit_store"
    }

    fn critical(&self) -> bool {
        self.critical
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn check(&self) -> ProbeResult {
        match self.store.ping().await {
            Ok(()) => ProbeResult::healthy(),
            Err(err) => ProbeResult::unhealthy(format!(
                "{} backend unreachable: {}",
                self.store.backend_name(),
                err
            )),
        }
    }
}

/// Probe backed by an async closure.
///
/// ```ignore
/// let probe = FnProbe::new("inference", true, || async {
///     if backend_reachable().await {
///         ProbeResult::healthy()
///     } else {
///         ProbeResult::unhealthy("no route to inference backend")
///     }
/// });
/// ```
pub struct FnProbe<F> {
    name: String,
    critical: bool,
    timeout: Option<Duration>,
    check: F,
}

impl<F, Fut> FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = ProbeResult> + Send,
{
    pub fn new(name: impl Into<String>, critical: bool, check: F) -> Self {
        Self {
            name: name.into(),
            critical,
            timeout: None,
            check,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl<F, Fut> HealthProbe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = ProbeResult> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn critical(&self) -> bool {
        self.critical
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn check(&self) -> ProbeResult {
        (self.check)().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::circuit_breaker::StateCircuitBreaker;
    use crate::adapters::rate_limiter::InMemoryRateLimitStore;
    use crate::ports::{CircuitBreakerConfig, ProbeStatus};

    #[tokio::test]
    async fn breaker_probe_tracks_state() {
        let breaker = Arc::new(StateCircuitBreaker::new(
            "llm",
            CircuitBreakerConfig::default(),
        ));
        let probe = CircuitBreakerProbe::new(breaker.clone());
        assert_eq!(probe.name(), "circuit:llm");
        assert!(!probe.critical());
        assert_eq!(probe.check().await.status, ProbeStatus::Healthy);

        breaker.force_open();
        let result = probe.check().await;
        assert_eq!(result.status, ProbeStatus::Unhealthy);
        assert!(result.message.unwrap().starts_with("circuit open"));
    }

    #[tokio::test]
    async fn store_probe_is_healthy_for_memory_backend() {
        let probe = RateLimitStoreProbe::new(Arc::new(InMemoryRateLimitStore::new()));
        assert!(probe.critical());
        assert_eq!(probe.check().await, ProbeResult::healthy());
    }

    #[tokio::test]
    async fn fn_probe_runs_closure() {
        let probe = FnProbe::new("disk", false, || async { ProbeResult::degraded("90% full") })
            .with_timeout(Duration::from_millis(50));
        assert_eq!(probe.timeout(), Some(Duration::from_millis(50)));
        assert_eq!(probe.check().await.status, ProbeStatus::Degraded);
    }
}
