//! Tracing subscriber setup.
//!
//! The library itself only emits `tracing` events; binaries embedding it
//! call [`init_tracing`] once at startup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, TelemetryConfig};

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `config.log_level` when set. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter(config));
    match config.format {
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
    }
}

fn env_filter(config: &TelemetryConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_fails_instead_of_panicking() {
        let config = TelemetryConfig {
            format: LogFormat::Json,
            ..Default::default()
        };
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }
}
