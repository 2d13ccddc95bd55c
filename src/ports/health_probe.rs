//! HealthProbe port - typed capability checked by the health aggregator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Status reported by a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Healthy,
    /// Working, but impaired (e.g. a breaker probing recovery).
    Degraded,
    Unhealthy,
    /// The probe could not determine the status. Counts as a failure.
    Unknown,
}

impl ProbeStatus {
    /// Returns true for statuses that count as a failed check.
    pub fn is_failure(&self) -> bool {
        matches!(self, ProbeStatus::Unhealthy | ProbeStatus::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Healthy => "healthy",
            ProbeStatus::Degraded => "degraded",
            ProbeStatus::Unhealthy => "unhealthy",
            ProbeStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one probe check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub status: ProbeStatus,
    pub message: Option<String>,
}

impl ProbeResult {
    pub fn healthy() -> Self {
        Self {
            status: ProbeStatus::Healthy,
            message: None,
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Degraded,
            message: Some(message.into()),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Unhealthy,
            message: Some(message.into()),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Unknown,
            message: Some(message.into()),
        }
    }
}

/// A named health check registered with the aggregator.
///
/// Critical probes make the whole service unhealthy when they fail;
/// non-critical probes only degrade it.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn name(&self) -> &str;

    fn critical(&self) -> bool;

    /// Per-probe timeout; `None` uses the aggregator default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn check(&self) -> ProbeResult;
}
