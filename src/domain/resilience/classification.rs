//! Error classification for retries and circuit accounting.

use std::time::Duration;
use thiserror::Error;

/// Whether a failed attempt is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient: timeouts, dropped connections, 5xx-equivalents.
    Retryable,
    /// Permanent: validation failures, 4xx-equivalents.
    NonRetryable,
}

impl ErrorClass {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorClass::Retryable)
    }
}

/// Implemented by error types the retry executor can classify on its own.
pub trait ClassifyError {
    /// Retry class of this error.
    fn error_class(&self) -> ErrorClass;

    /// Whether this error says something about the dependency's health.
    ///
    /// Errors caused by the caller (bad input) should return false so they
    /// do not count toward opening the circuit.
    fn is_circuit_relevant(&self) -> bool {
        true
    }
}

/// Errors from a downstream dependency call, in transport-neutral terms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownstreamError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("server error (status {status}): {message}")]
    Server { status: u16, message: String },

    #[error("rate limited by dependency")]
    RateLimited { retry_after: Option<Duration> },

    #[error("client error (status {status}): {message}")]
    Client { status: u16, message: String },

    #[error("validation failed: {0}")]
    Validation(String),
}

impl DownstreamError {
    /// Maps an HTTP-like status code to an error.
    ///
    /// 429 is treated as a rate limit, 5xx as a server failure and any
    /// other code as a client error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => DownstreamError::RateLimited { retry_after: None },
            500..=599 => DownstreamError::Server { status, message },
            _ => DownstreamError::Client { status, message },
        }
    }
}

impl ClassifyError for DownstreamError {
    fn error_class(&self) -> ErrorClass {
        match self {
            DownstreamError::Timeout(_)
            | DownstreamError::Connection(_)
            | DownstreamError::Server { .. }
            | DownstreamError::RateLimited { .. } => ErrorClass::Retryable,
            DownstreamError::Client { .. } | DownstreamError::Validation(_) => {
                ErrorClass::NonRetryable
            }
        }
    }

    fn is_circuit_relevant(&self) -> bool {
        !matches!(
            self,
            DownstreamError::Client { .. } | DownstreamError::Validation(_)
        )
    }
}
