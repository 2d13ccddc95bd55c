//! Telemetry configuration

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use super::error::ValidationError;

/// Log output settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Filter directive; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub format: LogFormat,
}

/// Log line format.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output for development.
    #[default]
    Pretty,
    /// One JSON object per line for log shippers.
    Json,
}

impl TelemetryConfig {
    /// Validate the filter directive.
    pub fn validate(&self) -> Result<(), ValidationError> {
        EnvFilter::try_new(&self.log_level)
            .map(|_| ())
            .map_err(|_| ValidationError::InvalidLogFilter(self.log_level.clone()))
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info,agent_guard=debug,redis=warn".to_string()
}
