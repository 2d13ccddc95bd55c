//! Rate limit scopes and rules.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::algorithm::RateLimitAlgorithm;
use crate::domain::foundation::ValidationError;

/// The scope at which rate limiting is applied.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitScope {
    /// Global rate limit across all requests.
    Global,
    /// Per-IP address rate limit.
    Ip,
    /// Per-authenticated-user rate limit.
    User,
    /// Per-API-key rate limit.
    ApiKey,
    /// Per-resource rate limit (e.g., a specific model endpoint).
    Resource,
}

impl RateLimitScope {
    /// Returns the string representation of the scope.
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitScope::Global => "global",
            RateLimitScope::Ip => "ip",
            RateLimitScope::User => "user",
            RateLimitScope::ApiKey => "api_key",
            RateLimitScope::Resource => "resource",
        }
    }
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configured limit for one scope, optionally narrowed to a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitRule {
    pub scope: RateLimitScope,

    /// When set, the rule only applies to keys carrying this resource.
    #[serde(default)]
    pub resource: Option<String>,

    #[serde(flatten)]
    pub algorithm: RateLimitAlgorithm,
}

impl RateLimitRule {
    /// Creates a rule covering a whole scope.
    pub fn new(scope: RateLimitScope, algorithm: RateLimitAlgorithm) -> Self {
        Self {
            scope,
            resource: None,
            algorithm,
        }
    }

    /// Narrows the rule to a single resource within its scope.
    pub fn for_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Returns true if this rule covers the given scope and resource.
    pub fn matches(&self, scope: RateLimitScope, resource: Option<&str>) -> bool {
        self.scope == scope
            && match &self.resource {
                Some(own) => resource == Some(own.as_str()),
                None => true,
            }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if matches!(&self.resource, Some(r) if r.trim().is_empty()) {
            return Err(ValidationError::empty_field("resource"));
        }
        self.algorithm.validate()
    }
}
