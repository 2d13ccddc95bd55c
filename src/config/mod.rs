//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! and an optional TOML file using the `config` and `dotenvy` crates. Configuration
//! is loaded with the `AGENT_GUARD` prefix and nested values use double underscores
//! as separators.
//!
//! # Example
//!
//! ```no_run
//! use agent_guard::config::AppConfig;
//!
//! # async fn run() -> Result<(), agent_guard::config::ConfigError> {
//! let config = AppConfig::load()?;
//! config.validate()?;
//!
//! let breakers = config.circuit_breaker.build_registry();
//! let limiter = config.build_rate_limiter().await?;
//! # Ok(())
//! # }
//! ```

mod circuit_breaker;
mod error;
mod health;
mod rate_limit;
mod redis;
mod retry;
mod telemetry;

pub use circuit_breaker::{BreakerSettings, CircuitBreakerSettings};
pub use error::{ConfigError, ValidationError};
pub use health::HealthSettings;
pub use rate_limit::{FailureModeSetting, RateLimitBackendKind, RateLimitSettings};
pub use redis::RedisConfig;
pub use retry::RetrySettings;
pub use telemetry::{LogFormat, TelemetryConfig};

use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use crate::adapters::rate_limiter::{InMemoryRateLimitStore, RateLimitConfig, RuleRateLimiter};
use crate::ports::RateLimitStore;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "AGENT_GUARD";

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a working
/// in-memory setup that fails open.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Log filter and format
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Breaker defaults and per-dependency overrides
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,

    /// Default retry policy
    #[serde(default)]
    pub retry: RetrySettings,

    /// Rate limit backend, failure mode and rules
    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    /// Redis connection (rate limit backend `redis`)
    #[serde(default)]
    pub redis: RedisConfig,

    /// Health aggregator settings
    #[serde(default)]
    pub health: HealthSettings,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `AGENT_GUARD` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `AGENT_GUARD__RATE_LIMIT__BACKEND=redis` -> `rate_limit.backend = "redis"`
    /// - `AGENT_GUARD__CIRCUIT_BREAKER__OVERRIDES__OPENAI__FAILURE_THRESHOLD=3`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(None)
    }

    /// Load a TOML file, with environment variables layered on top.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::build(Some(path.as_ref()))
    }

    fn build(file: Option<&Path>) -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(
                config::File::from(path).format(config::FileFormat::Toml),
            );
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// The Redis section is only checked when the rate limit backend uses it.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.telemetry.validate()?;
        self.circuit_breaker.validate()?;
        self.retry.validate()?;
        self.rate_limit.validate()?;
        if self.rate_limit.backend == RateLimitBackendKind::Redis {
            self.redis.validate()?;
        }
        self.health.validate()?;
        Ok(())
    }

    /// Build the configured rate limit store.
    ///
    /// Connecting to Redis is bounded by `redis.timeout_secs`.
    pub async fn build_rate_limit_store(&self) -> Result<Arc<dyn RateLimitStore>, ConfigError> {
        match self.rate_limit.backend {
            RateLimitBackendKind::Memory => Ok(Arc::new(InMemoryRateLimitStore::new())),
            RateLimitBackendKind::Redis => Ok(Arc::new(self.redis.connect().await?)),
        }
    }

    /// Rule set for the configured backend.
    ///
    /// With Redis, every store call is bounded by `redis.timeout_secs` so a
    /// stalled server trips the failure mode instead of hanging requests.
    pub fn rate_limit_config(&self) -> RateLimitConfig {
        let config = self.rate_limit.to_limiter_config();
        match self.rate_limit.backend {
            RateLimitBackendKind::Memory => config,
            RateLimitBackendKind::Redis => config.with_store_timeout(self.redis.timeout()),
        }
    }

    /// Build a `RuleRateLimiter` over the configured store.
    pub async fn build_rate_limiter(&self) -> Result<RuleRateLimiter, ConfigError> {
        let store = self.build_rate_limit_store().await?;
        Ok(RuleRateLimiter::new(store, self.rate_limit_config()))
    }
}
