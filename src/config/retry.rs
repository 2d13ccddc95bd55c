//! Retry configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::resilience::{BackoffStrategy, RetryPolicy};

/// Default retry policy for guarded calls.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// constant, linear, exponential or fibonacci
    #[serde(default)]
    pub strategy: BackoffStrategy,

    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,

    /// Budget for the whole call including waits; unbounded when absent
    #[serde(default)]
    pub overall_deadline_ms: Option<u64>,
}

impl RetrySettings {
    pub fn to_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::new(self.max_attempts)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_strategy(self.strategy)
            .with_jitter(self.jitter_factor);
        match self.overall_deadline_ms {
            Some(ms) => policy.with_deadline(Duration::from_millis(ms)),
            None => policy,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.to_policy()
            .validate()
            .map_err(|e| ValidationError::section("retry", e))
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            strategy: BackoffStrategy::default(),
            jitter_factor: default_jitter_factor(),
            overall_deadline_ms: None,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1_000
}

fn default_max_delay() -> u64 {
    60_000
}

fn default_jitter_factor() -> f64 {
    0.2
}
