//! Rate limiting configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::rate_limiter::{BackendFailureMode, RateLimitConfig};
use crate::domain::rate_limit::{RateLimitAlgorithm, RateLimitRule};

/// Where rate limiter state is kept.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitBackendKind {
    /// Process-local; each replica enforces its own quota.
    #[default]
    Memory,
    /// Shared across replicas through `redis.url`.
    Redis,
}

/// Behaviour when the backend cannot be reached.
///
/// Defaults to `fail_open`: requests are admitted and flagged degraded.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailureModeSetting {
    #[default]
    FailOpen,
    FailClosed,
}

/// Rate limit section.
///
/// Rules use the algorithm's own field names:
///
/// ```toml
/// [rate_limit.default_rule]
/// algorithm = "sliding_window"
/// limit = 100
/// window_secs = 60.0
///
/// [[rate_limit.rules]]
/// scope = "api_key"
/// resource = "completions"
/// algorithm = "token_bucket"
/// capacity = 20
/// refill_per_sec = 0.5
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default)]
    pub backend: RateLimitBackendKind,

    #[serde(default)]
    pub failure_mode: FailureModeSetting,

    /// Retry-After returned to clients while failing closed
    #[serde(default = "default_fail_closed_retry_after")]
    pub fail_closed_retry_after_secs: u64,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Applied to keys no rule matches
    #[serde(default = "default_rule")]
    pub default_rule: RateLimitAlgorithm,

    #[serde(default)]
    pub rules: Vec<RateLimitRule>,
}

impl RateLimitSettings {
    pub fn failure_mode(&self) -> BackendFailureMode {
        match self.failure_mode {
            FailureModeSetting::FailOpen => BackendFailureMode::FailOpen,
            FailureModeSetting::FailClosed => BackendFailureMode::FailClosed {
                retry_after: Duration::from_secs(self.fail_closed_retry_after_secs),
            },
        }
    }

    /// Limiter configuration for `RuleRateLimiter`.
    pub fn to_limiter_config(&self) -> RateLimitConfig {
        self.rules.iter().cloned().fold(
            RateLimitConfig::new(self.failure_mode())
                .with_prefix(self.key_prefix.clone())
                .with_default(self.default_rule.clone()),
            RateLimitConfig::with_rule,
        )
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.failure_mode == FailureModeSetting::FailClosed
            && self.fail_closed_retry_after_secs == 0
        {
            return Err(ValidationError::InvalidTimeout("fail_closed_retry_after"));
        }
        self.to_limiter_config()
            .validate()
            .map_err(|e| ValidationError::section("rate_limit", e))
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            backend: RateLimitBackendKind::default(),
            failure_mode: FailureModeSetting::default(),
            fail_closed_retry_after_secs: default_fail_closed_retry_after(),
            key_prefix: default_key_prefix(),
            default_rule: default_rule(),
            rules: Vec::new(),
        }
    }
}

fn default_fail_closed_retry_after() -> u64 {
    60
}

fn default_key_prefix() -> String {
    "ratelimit".to_string()
}

fn default_rule() -> RateLimitAlgorithm {
    RateLimitAlgorithm::sliding_window(100, Duration::from_secs(60))
}
