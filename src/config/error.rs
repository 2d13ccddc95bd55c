//! Configuration error types

use thiserror::Error;

use crate::ports::StoreError;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    #[error("Rate limit backend unavailable: {0}")]
    Backend(#[from] StoreError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Invalid {0} timeout")]
    InvalidTimeout(&'static str),

    #[error("Invalid log filter '{0}'")]
    InvalidLogFilter(String),

    #[error("Invalid {section} settings: {source}")]
    InvalidSection {
        section: String,
        #[source]
        source: crate::domain::foundation::ValidationError,
    },
}

impl ValidationError {
    /// Wraps a domain validation failure with the section it came from.
    pub fn section(
        section: impl Into<String>,
        source: crate::domain::foundation::ValidationError,
    ) -> Self {
        ValidationError::InvalidSection {
            section: section.into(),
            source,
        }
    }
}
