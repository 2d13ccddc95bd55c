//! Health aggregation for liveness, readiness and full health reports.
//!
//! Probes run concurrently, each in its own task under its own timeout, so
//! a panicking or hanging probe only affects its own result.

use futures::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::clock::SystemClock;
use crate::domain::foundation::Timestamp;
use crate::ports::{Clock, HealthProbe, ProbeResult, ProbeStatus};

/// Aggregate status of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

/// Result of one probe within a report.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub name: String,
    pub critical: bool,
    pub status: ProbeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub latency_ms: u64,
}

/// Full health report.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub probes: Vec<ProbeReport>,
    pub startup_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub checked_at: Timestamp,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    pub ready: bool,
    pub status: HealthStatus,
    pub report: HealthReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct LivenessReport {
    pub alive: bool,
    pub uptime_secs: u64,
}

/// Runs registered probes and folds them into one status.
///
/// - any critical probe failing → `Unhealthy`
/// - a non-critical failure, or any probe degraded → `Degraded`
/// - otherwise → `Healthy`
pub struct HealthAggregator {
    probes: Vec<Arc<dyn HealthProbe>>,
    startup_complete: AtomicBool,
    default_timeout: Duration,
    fail_on_degraded: bool,
    version: Option<String>,
    clock: Arc<dyn Clock>,
    started_at: std::time::Instant,
}

impl HealthAggregator {
    pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let started_at = clock.now();
        Self {
            probes: Vec::new(),
            startup_complete: AtomicBool::new(false),
            default_timeout: Self::DEFAULT_PROBE_TIMEOUT,
            fail_on_degraded: false,
            version: None,
            clock,
            started_at,
        }
    }

    /// Registers a probe.
    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probes.push(probe);
        self
    }

    /// Timeout for probes that do not set their own.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Makes a degraded service report not-ready.
    pub fn with_fail_on_degraded(mut self, fail_on_degraded: bool) -> Self {
        self.fail_on_degraded = fail_on_degraded;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn probe_names(&self) -> Vec<&str> {
        self.probes.iter().map(|p| p.name()).collect()
    }

    /// Flips readiness on. Until this is called the service is not ready.
    pub fn mark_startup_complete(&self) {
        if !self.startup_complete.swap(true, Ordering::SeqCst) {
            tracing::info!("Startup complete, service can become ready");
        }
    }

    pub fn is_startup_complete(&self) -> bool {
        self.startup_complete.load(Ordering::SeqCst)
    }

    /// Startup probe: true once startup has completed.
    pub fn startup(&self) -> bool {
        self.is_startup_complete()
    }

    /// Cheap check that the process is running. Runs no probes.
    pub fn liveness(&self) -> LivenessReport {
        LivenessReport {
            alive: true,
            uptime_secs: self
                .clock
                .now()
                .saturating_duration_since(self.started_at)
                .as_secs(),
        }
    }

    /// Runs every probe and aggregates the results.
    pub async fn check_health(&self) -> HealthReport {
        let checks = self.probes.iter().map(|probe| self.run_probe(probe.clone()));
        let probes = join_all(checks).await;
        let status = aggregate(&probes);

        HealthReport {
            status,
            probes,
            startup_complete: self.is_startup_complete(),
            version: self.version.clone(),
            checked_at: self.clock.wall_time(),
        }
    }

    pub async fn readiness(&self) -> ReadinessReport {
        let report = self.check_health().await;
        let ready = report.startup_complete
            && match report.status {
                HealthStatus::Healthy => true,
                HealthStatus::Degraded => !self.fail_on_degraded,
                HealthStatus::Unhealthy => false,
            };
        ReadinessReport {
            ready,
            status: report.status,
            report,
        }
    }

    async fn run_probe(&self, probe: Arc<dyn HealthProbe>) -> ProbeReport {
        let name = probe.name().to_string();
        let critical = probe.critical();
        let timeout = probe.timeout().unwrap_or(self.default_timeout);
        let started = tokio::time::Instant::now();

        let task = tokio::spawn(async move { probe.check().await });
        let abort = task.abort_handle();
        let result = match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => ProbeResult::unhealthy(format!("probe failed: {}", join_error)),
            Err(_) => {
                abort.abort();
                ProbeResult::unhealthy(format!("probe timed out after {}ms", timeout.as_millis()))
            }
        };

        if result.status.is_failure() {
            tracing::warn!(
                probe = %name,
                critical,
                status = %result.status,
                message = result.message.as_deref().unwrap_or(""),
                "Health probe failed"
            );
        }

        ProbeReport {
            name,
            critical,
            status: result.status,
            message: result.message,
            latency_ms: started.elapsed().as_millis() as u64,
        }
    }
}

impl Default for HealthAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HealthAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthAggregator")
            .field("probes", &self.probe_names())
            .field("startup_complete", &self.is_startup_complete())
            .field("default_timeout", &self.default_timeout)
            .field("fail_on_degraded", &self.fail_on_degraded)
            .finish_non_exhaustive()
    }
}

fn aggregate(probes: &[ProbeReport]) -> HealthStatus {
    let mut status = HealthStatus::Healthy;
    for probe in probes {
        if probe.status.is_failure() {
            if probe.critical {
                return HealthStatus::Unhealthy;
            }
            status = HealthStatus::Degraded;
        } else if probe.status == ProbeStatus::Degraded {
            status = HealthStatus::Degraded;
        }
    }
    status
}
