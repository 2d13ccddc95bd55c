//! Registry of named circuit breakers.

use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::StateCircuitBreaker;
use crate::adapters::clock::SystemClock;
use crate::ports::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitEventListener,
    CircuitState, Clock, NoOpCircuitListener,
};

/// Hands out one shared breaker per dependency name.
///
/// Breakers are created on first use, with the per-name override when one
/// is configured and the registry default otherwise. Concurrent first
/// lookups of the same name always get the same instance.
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<StateCircuitBreaker>>,
    default_config: CircuitBreakerConfig,
    overrides: HashMap<String, CircuitBreakerConfig>,
    clock: Arc<dyn Clock>,
    listener: Arc<dyn CircuitEventListener>,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            default_config,
            overrides: HashMap::new(),
            clock: Arc::new(SystemClock),
            listener: Arc::new(NoOpCircuitListener),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn CircuitEventListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Uses `config` for the breaker called `name` instead of the default.
    pub fn with_override(mut self, name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        self.overrides.insert(name.into(), config);
        self
    }

    /// Returns the breaker for `name`, creating it if needed.
    pub fn get(&self, name: &str) -> Arc<StateCircuitBreaker> {
        let config = self
            .overrides
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.default_config.clone());
        self.get_with(name, config)
    }

    /// Returns the breaker for `name`, creating it with `config` if needed.
    ///
    /// An existing breaker keeps the configuration it was created with.
    pub fn get_with(&self, name: &str, config: CircuitBreakerConfig) -> Arc<StateCircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.clone();
        }
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(breaker = %name, "Creating circuit breaker");
                Arc::new(StateCircuitBreaker::with_parts(
                    name,
                    config,
                    self.clock.clone(),
                    self.listener.clone(),
                ))
            })
            .clone()
    }

    /// Returns the breaker for `name` without creating one.
    pub fn lookup(&self, name: &str) -> Option<Arc<StateCircuitBreaker>> {
        self.breakers.get(name).map(|entry| entry.clone())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Names of every breaker currently open.
    pub fn open_circuits(&self) -> Vec<String> {
        let mut open: Vec<String> = self
            .breakers
            .iter()
            .filter(|e| e.value().state() == CircuitState::Open)
            .map(|e| e.key().clone())
            .collect();
        open.sort();
        open
    }

    pub fn all_metrics(&self) -> BTreeMap<String, CircuitBreakerMetrics> {
        self.breakers
            .iter()
            .map(|e| (e.key().clone(), e.value().metrics()))
            .collect()
    }

    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }

    /// Drops the breaker for `name`. Returns false if none existed.
    pub fn remove(&self, name: &str) -> bool {
        self.breakers.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl std::fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("breakers", &self.names())
            .field("default_config", &self.default_config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn same_name_returns_same_instance() {
        let registry = CircuitBreakerRegistry::default();
        let a = registry.get("api-x");
        let b = registry.get("api-x");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn overrides_apply_by_name() {
        let registry = CircuitBreakerRegistry::default()
            .with_override("db", CircuitBreakerConfig::for_database());

        assert_eq!(registry.get("db").config().open_timeout, Duration::from_secs(10));
        assert_eq!(
            registry.get("other").config().open_timeout,
            CircuitBreakerConfig::default().open_timeout
        );
    }

    #[test]
    fn existing_breaker_keeps_its_config() {
        let registry = CircuitBreakerRegistry::default();
        registry.get_with("llm", CircuitBreakerConfig::for_inference_backend());
        let again = registry.get_with("llm", CircuitBreakerConfig::for_database());
        assert_eq!(again.config().open_timeout, Duration::from_secs(60));
    }

    #[test]
    fn lookup_does_not_create() {
        let registry = CircuitBreakerRegistry::default();
        assert!(registry.lookup("missing").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn open_circuits_lists_only_open_breakers() {
        let registry = CircuitBreakerRegistry::default();
        registry.get("a");
        registry.get("b").force_open();
        registry.get("c").force_open();

        assert_eq!(registry.open_circuits(), vec!["b".to_string(), "c".to_string()]);

        registry.reset_all();
        assert!(registry.open_circuits().is_empty());
    }

    #[test]
    fn all_metrics_covers_every_breaker() {
        let registry = CircuitBreakerRegistry::default();
        registry.get("a").record_success();
        registry.get("b").record_failure();

        let metrics = registry.all_metrics();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics["a"].total_successes, 1);
        assert_eq!(metrics["b"].total_failures, 1);
    }

    #[test]
    fn remove_drops_breaker() {
        let registry = CircuitBreakerRegistry::default();
        registry.get("a");
        assert!(registry.remove("a"));
        assert!(!registry.remove("a"));
        assert_eq!(registry.names(), Vec::<String>::new());
    }

    #[test]
    fn concurrent_first_use_creates_one_breaker() {
        let registry = Arc::new(CircuitBreakerRegistry::default());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.get("shared"))
            })
            .collect();
        let breakers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(registry.len(), 1);
        assert!(breakers.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
