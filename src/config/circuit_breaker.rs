//! Circuit breaker configuration

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::circuit_breaker::CircuitBreakerRegistry;
use crate::ports::CircuitBreakerConfig;

/// Breaker thresholds for one dependency.
///
/// Fields left out fall back to the built-in breaker defaults.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BreakerSettings {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    /// Seconds spent open before a trial call is admitted
    #[serde(default = "default_open_timeout")]
    pub open_timeout_secs: u64,

    #[serde(default = "default_half_open_max_requests")]
    pub half_open_max_requests: u32,

    #[serde(default)]
    pub failure_rate_threshold: Option<f64>,

    #[serde(default = "default_rolling_window")]
    pub rolling_window: u32,
}

impl BreakerSettings {
    pub fn to_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            open_timeout: Duration::from_secs(self.open_timeout_secs),
            half_open_max_requests: self.half_open_max_requests,
            failure_rate_threshold: self.failure_rate_threshold,
            rolling_window: self.rolling_window,
        }
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            open_timeout_secs: default_open_timeout(),
            half_open_max_requests: default_half_open_max_requests(),
            failure_rate_threshold: None,
            rolling_window: default_rolling_window(),
        }
    }
}

/// Circuit breaker section: defaults plus per-dependency overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CircuitBreakerSettings {
    #[serde(default)]
    pub defaults: BreakerSettings,

    /// Keyed by dependency name (lowercase when read from the environment)
    #[serde(default)]
    pub overrides: HashMap<String, BreakerSettings>,
}

impl CircuitBreakerSettings {
    /// Build a registry that applies these settings to lazily created breakers.
    pub fn build_registry(&self) -> CircuitBreakerRegistry {
        self.overrides.iter().fold(
            CircuitBreakerRegistry::new(self.defaults.to_config()),
            |registry, (name, settings)| registry.with_override(name.clone(), settings.to_config()),
        )
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.defaults
            .to_config()
            .validate()
            .map_err(|e| ValidationError::section("circuit_breaker.defaults", e))?;
        for (name, settings) in &self.overrides {
            settings
                .to_config()
                .validate()
                .map_err(|e| ValidationError::section(format!("circuit_breaker.overrides.{name}"), e))?;
        }
        Ok(())
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_open_timeout() -> u64 {
    30
}

fn default_half_open_max_requests() -> u32 {
    1
}

fn default_rolling_window() -> u32 {
    20
}
