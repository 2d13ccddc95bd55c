//! CircuitBreaker port - Interface for downstream dependency protection.
//!
//! The circuit breaker pattern stops cascading failures when a dependency
//! (model-inference backend, external API, database) becomes unavailable
//! or slow.
//!
//! ## States
//!
//! - **Closed**: Normal operation, calls flow through
//! - **Open**: Too many failures, calls rejected immediately
//! - **Half-Open**: Testing recovery, a bounded number of trial calls allowed
//!
//! ## Transitions
//!
//! ```text
//! Closed --[failure_threshold reached]--> Open
//! Open --[open_timeout elapsed]--> Half-Open
//! Half-Open --[success_threshold reached]--> Closed
//! Half-Open --[any relevant failure]--> Open
//! ```

use serde::Serialize;
use std::time::Duration;

pub use crate::domain::resilience::CircuitState;
use crate::domain::foundation::ValidationError;

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening circuit.
    ///
    /// Default: 5 failures
    pub failure_threshold: u32,

    /// Number of half-open successes needed to close the circuit.
    ///
    /// Default: 2 successes
    pub success_threshold: u32,

    /// Time to wait in Open before admitting a trial call.
    ///
    /// Default: 30 seconds
    pub open_timeout: Duration,

    /// Maximum concurrent trial calls in half-open state.
    ///
    /// Default: 1 call at a time
    pub half_open_max_requests: u32,

    /// Optional: failure ratio over the rolling window that also opens
    /// the circuit, even below `failure_threshold` consecutive failures.
    ///
    /// Default: None (consecutive failures only)
    pub failure_rate_threshold: Option<f64>,

    /// Number of recent outcomes considered by `failure_rate_threshold`.
    ///
    /// Default: 20 calls
    pub rolling_window: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout: Duration::from_secs(30),
            half_open_max_requests: 1,
            failure_rate_threshold: None,
            rolling_window: 20,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a config for model-inference backends (slow to recover).
    pub fn for_inference_backend() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            open_timeout: Duration::from_secs(60),
            ..Self::default()
        }
    }

    /// Create a config for third-party HTTP APIs (trip early).
    pub fn for_external_api() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 2,
            open_timeout: Duration::from_secs(30),
            ..Self::default()
        }
    }

    /// Create a config for databases (short recovery probe).
    pub fn for_database() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            open_timeout: Duration::from_secs(10),
            ..Self::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.failure_threshold == 0 {
            return Err(ValidationError::out_of_range(
                "failure_threshold",
                1.0,
                f64::from(u32::MAX),
                0.0,
            ));
        }
        if self.success_threshold == 0 {
            return Err(ValidationError::out_of_range(
                "success_threshold",
                1.0,
                f64::from(u32::MAX),
                0.0,
            ));
        }
        if self.half_open_max_requests == 0 {
            return Err(ValidationError::out_of_range(
                "half_open_max_requests",
                1.0,
                f64::from(u32::MAX),
                0.0,
            ));
        }
        if let Some(rate) = self.failure_rate_threshold {
            if !(rate > 0.0 && rate <= 1.0) {
                return Err(ValidationError::out_of_range(
                    "failure_rate_threshold",
                    0.0,
                    1.0,
                    rate,
                ));
            }
            if self.rolling_window == 0 {
                return Err(ValidationError::out_of_range(
                    "rolling_window",
                    1.0,
                    f64::from(u32::MAX),
                    0.0,
                ));
            }
        }
        Ok(())
    }
}

/// Port for circuit breaker functionality.
///
/// Protects callers from a failing dependency. Implementations must make
/// every method an atomic critical section per breaker.
///
/// # Example
///
/// ```ignore
/// let breaker = registry.get("inference");
/// if !breaker.can_execute() {
///     return fallback();
/// }
///
/// match backend.complete(request).await {
///     Ok(response) => {
///         breaker.record_success();
///         Ok(response)
///     }
///     Err(e) if e.is_circuit_relevant() => {
///         breaker.record_failure();
///         Err(e)
///     }
///     Err(e) => {
///         breaker.record_ignored();
///         Err(e)
///     }
/// }
/// ```
pub trait CircuitBreaker: Send + Sync {
    /// Name of the dependency this breaker protects.
    fn name(&self) -> &str;

    /// Get the current state of the circuit.
    ///
    /// Does not advance Open to HalfOpen; only `can_execute` does.
    fn state(&self) -> CircuitState;

    /// Ask permission for one call.
    ///
    /// Returns `true` if the circuit is closed, or if a half-open trial
    /// permit was granted. A granted half-open permit must be released by
    /// exactly one `record_*` call.
    fn can_execute(&self) -> bool;

    /// Record a successful call.
    ///
    /// In half-open state, this counts toward the success threshold.
    /// In closed state, this resets the consecutive failure count.
    fn record_success(&self);

    /// Record a failed call that reflects on the dependency's health.
    ///
    /// In closed state, this counts toward the failure threshold.
    /// In half-open state, this immediately reopens the circuit.
    fn record_failure(&self);

    /// Record a completed call whose error was the caller's fault.
    ///
    /// Leaves all counters alone and releases any half-open permit.
    fn record_ignored(&self);

    /// Force reset the circuit to closed state.
    ///
    /// Use sparingly - typically for administrative intervention.
    fn reset(&self);

    /// Force the circuit open, e.g. during dependency maintenance.
    fn force_open(&self);

    /// Get metrics about the circuit breaker.
    fn metrics(&self) -> CircuitBreakerMetrics;
}

/// Observer for breaker state changes.
pub trait CircuitEventListener: Send + Sync {
    fn on_state_change(&self, name: &str, from: CircuitState, to: CircuitState);
}

/// Listener that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCircuitListener;

impl CircuitEventListener for NoOpCircuitListener {
    fn on_state_change(&self, _name: &str, _from: CircuitState, _to: CircuitState) {}
}

/// Metrics about circuit breaker behavior.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerMetrics {
    /// Current state
    pub state: CircuitState,

    /// Total successful calls since creation
    pub total_successes: u64,

    /// Total circuit-relevant failures since creation
    pub total_failures: u64,

    /// Times the circuit has opened
    pub times_opened: u64,

    /// Calls refused by `can_execute`
    pub rejected_calls: u64,

    /// Current consecutive failure count (in closed state)
    pub current_failures: u32,

    /// Current success count (in half-open state)
    pub current_successes: u32,

    /// Trial permits currently handed out (in half-open state)
    pub half_open_in_flight: u32,

    /// Time until circuit admits a trial call (when open)
    pub time_until_half_open: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.success_threshold, 2);
        assert_eq!(config.open_timeout, Duration::from_secs(30));
        assert_eq!(config.half_open_max_requests, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn inference_backend_config() {
        let config = CircuitBreakerConfig::for_inference_backend();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.success_threshold, 3);
        assert_eq!(config.open_timeout, Duration::from_secs(60));
    }

    #[test]
    fn external_api_config() {
        let config = CircuitBreakerConfig::for_external_api();
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.open_timeout, Duration::from_secs(30));
    }

    #[test]
    fn database_config() {
        let config = CircuitBreakerConfig::for_database();
        assert_eq!(config.open_timeout, Duration::from_secs(10));
    }

    #[test]
    fn validate_rejects_zero_thresholds() {
        let config = CircuitBreakerConfig {
            failure_threshold: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CircuitBreakerConfig {
            half_open_max_requests: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_failure_rate_out_of_range() {
        let config = CircuitBreakerConfig {
            failure_rate_threshold: Some(1.5),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CircuitBreakerConfig {
            failure_rate_threshold: Some(0.5),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
