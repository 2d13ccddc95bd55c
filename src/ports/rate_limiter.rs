//! Rate limiting port for admission control.
//!
//! This port defines the interface for rate limiting operations. The
//! algorithm is chosen per rule (token bucket, sliding window, fixed
//! window, leaky bucket); the state lives in a `RateLimitStore`, either
//! in process memory or in Redis.

use async_trait::async_trait;
use std::time::Duration;

pub use crate::domain::rate_limit::RateLimitScope;
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};

/// Port for rate limiting operations.
///
/// Implementations should be thread-safe and support concurrent access.
/// Checks for the same key must be atomic with respect to each other.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Check if a request is allowed, consuming one unit if so.
    ///
    /// Returns `Allowed` with remaining quota or `Denied` with retry info.
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError> {
        self.check_cost(key, 1).await
    }

    /// Check a request that consumes `cost` units (e.g. tokens of a prompt).
    async fn check_cost(
        &self,
        key: RateLimitKey,
        cost: u32,
    ) -> Result<RateLimitResult, RateLimitError>;

    /// Get current rate limit status without consuming quota.
    ///
    /// Useful for displaying quota information to clients.
    async fn status(&self, key: RateLimitKey) -> Result<RateLimitStatus, RateLimitError>;

    /// Reset rate limit for a key (admin operation).
    ///
    /// Clears the stored state, restoring full quota.
    async fn reset(&self, key: RateLimitKey) -> Result<(), RateLimitError>;
}

/// Key identifying what to rate limit.
///
/// Rate limits can be scoped globally, per-IP, per-user, per-API-key or
/// per-resource.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct RateLimitKey {
    /// The scope of this rate limit.
    pub scope: RateLimitScope,
    /// Identifier within the scope (e.g., IP address, user ID).
    pub identifier: String,
    /// Optional resource for finer-grained limits (e.g., "completions").
    pub resource: Option<String>,
}

impl RateLimitKey {
    /// Creates a global rate limit key.
    pub fn global() -> Self {
        Self::new(RateLimitScope::Global, "global")
    }

    /// Creates an IP-based rate limit key.
    pub fn ip(ip: &str) -> Self {
        Self::new(RateLimitScope::Ip, ip)
    }

    /// Creates a user-based rate limit key.
    pub fn user(user_id: &str) -> Self {
        Self::new(RateLimitScope::User, user_id)
    }

    /// Creates an API-key-based rate limit key.
    pub fn api_key(api_key: &str) -> Self {
        Self::new(RateLimitScope::ApiKey, api_key)
    }

    /// Creates a resource-wide rate limit key.
    pub fn resource(resource: &str) -> Self {
        Self::new(RateLimitScope::Resource, resource).with_resource(resource)
    }

    /// Creates a user-based rate limit key for a specific resource.
    pub fn user_resource(user_id: &str, resource: &str) -> Self {
        Self::user(user_id).with_resource(resource)
    }

    fn new(scope: RateLimitScope, identifier: &str) -> Self {
        Self {
            scope,
            identifier: identifier.to_string(),
            resource: None,
        }
    }

    /// Narrows the key to a resource.
    pub fn with_resource(mut self, resource: &str) -> Self {
        self.resource = Some(resource.to_string());
        self
    }

    /// Returns the storage key string for this rate limit key.
    pub fn storage_key(&self, prefix: &str) -> String {
        match &self.resource {
            Some(resource) => format!(
                "{}:{}:{}:{}",
                prefix,
                self.scope.as_str(),
                self.identifier,
                resource
            ),
            None => format!("{}:{}:{}", prefix, self.scope.as_str(), self.identifier),
        }
    }

    /// Rejects keys that cannot be stored unambiguously.
    pub fn validate(&self) -> Result<(), RateLimitError> {
        if self.identifier.trim().is_empty() {
            return Err(RateLimitError::InvalidKey(format!(
                "empty identifier for scope {}",
                self.scope
            )));
        }
        if matches!(&self.resource, Some(r) if r.trim().is_empty()) {
            return Err(RateLimitError::InvalidKey("empty resource".to_string()));
        }
        Ok(())
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub enum RateLimitResult {
    /// Request is allowed; includes current status.
    Allowed(RateLimitStatus),
    /// Request is denied; includes denial details.
    Denied(RateLimitDenied),
}

impl RateLimitResult {
    /// Returns true if the request was allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed(_))
    }

    /// Returns true if the request was denied.
    pub fn is_denied(&self) -> bool {
        matches!(self, RateLimitResult::Denied(_))
    }

    pub fn limit(&self) -> u32 {
        match self {
            RateLimitResult::Allowed(status) => status.limit,
            RateLimitResult::Denied(denied) => denied.limit,
        }
    }

    pub fn remaining(&self) -> u32 {
        match self {
            RateLimitResult::Allowed(status) => status.remaining,
            RateLimitResult::Denied(_) => 0,
        }
    }

    /// Zero for allowed requests.
    pub fn retry_after(&self) -> Duration {
        match self {
            RateLimitResult::Allowed(_) => Duration::ZERO,
            RateLimitResult::Denied(denied) => denied.retry_after,
        }
    }

    pub fn reset_at(&self) -> Timestamp {
        match self {
            RateLimitResult::Allowed(status) => status.reset_at,
            RateLimitResult::Denied(denied) => denied.reset_at,
        }
    }

    /// Standard rate limit header pairs for this result.
    ///
    /// `Retry-After` is only present on denials and is rounded up to
    /// whole seconds.
    pub fn rate_limit_headers(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            (headers::X_RATELIMIT_LIMIT, self.limit().to_string()),
            (headers::X_RATELIMIT_REMAINING, self.remaining().to_string()),
            (headers::X_RATELIMIT_RESET, self.reset_at().as_unix_secs().to_string()),
        ];
        if let RateLimitResult::Denied(denied) = self {
            pairs.push((headers::RETRY_AFTER, denied.retry_after_secs().to_string()));
        }
        pairs
    }
}

/// Standard rate limit header names.
pub mod headers {
    /// Maximum requests allowed in the window.
    pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
    /// Requests remaining in the current window.
    pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
    /// Unix timestamp when the quota is fully restored.
    pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";
    /// Seconds to wait before retrying (denials only).
    pub const RETRY_AFTER: &str = "retry-after";
}

/// Current rate limit status.
#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    /// Maximum units allowed in a burst.
    pub limit: u32,
    /// Remaining units right now.
    pub remaining: u32,
    /// When the quota is fully restored.
    pub reset_at: Timestamp,
    /// True when the backend failed and the request was let through
    /// under the fail-open policy.
    pub degraded: bool,
}

/// Details of a rate limit denial.
#[derive(Debug, Clone)]
pub struct RateLimitDenied {
    /// Maximum units allowed in a burst.
    pub limit: u32,
    /// How long the client should wait before retrying.
    pub retry_after: Duration,
    /// When the quota is fully restored.
    pub reset_at: Timestamp,
    /// The scope that triggered the denial.
    pub scope: RateLimitScope,
    /// Human-readable message explaining the denial.
    pub message: String,
}

impl RateLimitDenied {
    /// Retry delay in whole seconds, rounded up and at least 1.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        let rounded = if self.retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        };
        rounded.max(1)
    }
}

impl From<&RateLimitDenied> for DomainError {
    fn from(denied: &RateLimitDenied) -> Self {
        DomainError::new(ErrorCode::RateLimited, denied.message.clone())
            .with_detail("scope", denied.scope.as_str())
            .with_detail("retry_after_secs", denied.retry_after_secs().to_string())
    }
}

/// Errors that can occur during rate limiting operations.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// Rate limiter backend is unavailable.
    #[error("rate limiter unavailable: {0}")]
    Unavailable(String),

    /// Invalid rate limit key provided.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Requests must consume at least one unit.
    #[error("invalid cost: {0}")]
    InvalidCost(u32),
}

impl From<RateLimitError> for DomainError {
    fn from(err: RateLimitError) -> Self {
        let code = match &err {
            RateLimitError::Unavailable(_) => ErrorCode::BackendUnavailable,
            RateLimitError::InvalidKey(_) | RateLimitError::InvalidCost(_) => {
                ErrorCode::ValidationFailed
            }
        };
        DomainError::new(code, err.to_string())
    }
}
