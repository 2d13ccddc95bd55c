//! Health check configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::HealthAggregator;

/// Health aggregator settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HealthSettings {
    /// Timeout for probes that do not set their own
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,

    /// Report not-ready while the aggregate is degraded
    #[serde(default)]
    pub fail_on_degraded: bool,

    /// Reported in health responses
    #[serde(default)]
    pub version: Option<String>,
}

impl HealthSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// An aggregator with these settings and no probes yet.
    pub fn to_aggregator(&self) -> HealthAggregator {
        let aggregator = HealthAggregator::new()
            .with_default_timeout(self.probe_timeout())
            .with_fail_on_degraded(self.fail_on_degraded);
        match &self.version {
            Some(version) => aggregator.with_version(version.clone()),
            None => aggregator,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.probe_timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout("health probe"));
        }
        Ok(())
    }
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout(),
            fail_on_degraded: false,
            version: None,
        }
    }
}

fn default_probe_timeout() -> u64 {
    5_000
}
