//! Rate limit rule set and backend failure policy.
//!
//! One rule per scope (optionally narrowed to a resource) plus a default
//! applied to any key no rule covers.

use std::time::Duration;

use crate::domain::foundation::ValidationError;
use crate::domain::rate_limit::{RateLimitAlgorithm, RateLimitRule, RateLimitScope};

/// What to do when the rate limit store cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackendFailureMode {
    /// Let the request through, flagged as degraded.
    FailOpen,
    /// Deny the request and tell the client when to retry.
    FailClosed { retry_after: Duration },
}

/// Complete rate limit configuration for a `RuleRateLimiter`.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Prefix of every storage key.
    pub key_prefix: String,
    /// Algorithm for keys that no rule covers.
    pub default_algorithm: RateLimitAlgorithm,
    pub rules: Vec<RateLimitRule>,
    pub failure_mode: BackendFailureMode,
    /// Upper bound on a single store call; expiry counts as a store failure.
    pub store_timeout: Duration,
}

impl RateLimitConfig {
    /// Default prefix for storage keys.
    pub const DEFAULT_PREFIX: &'static str = "ratelimit";

    pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a rule set with no rules and a default of 100 requests per
    /// trailing minute.
    ///
    /// The failure mode has no default and must be chosen here.
    pub fn new(failure_mode: BackendFailureMode) -> Self {
        Self {
            key_prefix: Self::DEFAULT_PREFIX.to_string(),
            default_algorithm: RateLimitAlgorithm::sliding_window(100, Duration::from_secs(60)),
            rules: Vec::new(),
            failure_mode,
            store_timeout: Self::DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_default(mut self, algorithm: RateLimitAlgorithm) -> Self {
        self.default_algorithm = algorithm;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_rule(mut self, rule: RateLimitRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Finds the algorithm for a key.
    ///
    /// A rule for the exact scope and resource wins over a scope-wide rule,
    /// which wins over the default.
    pub fn algorithm_for(&self, scope: RateLimitScope, resource: Option<&str>) -> &RateLimitAlgorithm {
        let exact = resource.and_then(|res| {
            self.rules
                .iter()
                .find(|rule| rule.scope == scope && rule.resource.as_deref() == Some(res))
        });
        exact
            .or_else(|| {
                self.rules
                    .iter()
                    .find(|rule| rule.scope == scope && rule.resource.is_none())
            })
            .map_or(&self.default_algorithm, |rule| &rule.algorithm)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.key_prefix.trim().is_empty() {
            return Err(ValidationError::empty_field("key_prefix"));
        }
        if self.store_timeout.is_zero() {
            return Err(ValidationError::invalid_format(
                "store_timeout",
                "must be positive",
            ));
        }
        self.default_algorithm.validate()?;
        for rule in &self.rules {
            rule.validate()?;
        }
        Ok(())
    }
}
