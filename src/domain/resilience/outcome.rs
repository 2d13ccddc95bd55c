//! Typed outcomes of a retried call.
//!
//! Expected denial paths (open circuit, cancellation, exhausted retries)
//! are values here, never panics or hidden errors.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Why a retry loop stopped before running out of attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The dependency's breaker refused the attempt.
    CircuitOpen { dependency: String },
    /// The operation failed with a permanent error.
    NonRetryable,
    /// The caller cancelled the call.
    Cancelled,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::CircuitOpen { dependency } => {
                write!(f, "circuit '{}' is open", dependency)
            }
            AbortReason::NonRetryable => write!(f, "non-retryable error"),
            AbortReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Final outcome of a retried call.
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Success(T),
    /// Stopped early; carries the last operation error if one occurred.
    Aborted { reason: AbortReason, error: Option<E> },
    /// Every allowed attempt failed with a retryable error.
    Exhausted(E),
    /// The overall deadline ran out; carries the last error if one occurred.
    Timeout(Option<E>),
}

/// Discriminant of [`RetryOutcome`] for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    Aborted,
    Exhausted,
    Timeout,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Aborted => "aborted",
            OutcomeKind::Exhausted => "exhausted",
            OutcomeKind::Timeout => "timeout",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<T, E> RetryOutcome<T, E> {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            RetryOutcome::Success(_) => OutcomeKind::Success,
            RetryOutcome::Aborted { .. } => OutcomeKind::Aborted,
            RetryOutcome::Exhausted(_) => OutcomeKind::Exhausted,
            RetryOutcome::Timeout(_) => OutcomeKind::Timeout,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Success(_))
    }

    /// Abort reason, if the loop was aborted.
    pub fn abort_reason(&self) -> Option<&AbortReason> {
        match self {
            RetryOutcome::Aborted { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Outcome plus bookkeeping about how it was reached.
#[derive(Debug)]
pub struct RetryReport<T, E> {
    pub outcome: RetryOutcome<T, E>,
    /// Number of times the operation was actually invoked.
    pub attempts: u32,
    /// Backoff waits taken between attempts, in order.
    pub delays: Vec<Duration>,
    /// Wall time spent in the retry loop.
    pub elapsed: Duration,
}

impl<T, E> RetryReport<T, E> {
    /// Collapses the report into a `Result` for `?`-style callers.
    pub fn into_result(self) -> Result<T, RetryError<E>> {
        let attempts = self.attempts;
        match self.outcome {
            RetryOutcome::Success(value) => Ok(value),
            RetryOutcome::Aborted {
                reason: AbortReason::CircuitOpen { dependency },
                ..
            } => Err(RetryError::CircuitOpen { dependency }),
            RetryOutcome::Aborted {
                reason: AbortReason::Cancelled,
                ..
            } => Err(RetryError::Cancelled { attempts }),
            RetryOutcome::Aborted {
                reason: AbortReason::NonRetryable,
                error,
            } => match error {
                Some(error) => Err(RetryError::NonRetryable(error)),
                None => Err(RetryError::Aborted {
                    reason: AbortReason::NonRetryable,
                }),
            },
            RetryOutcome::Exhausted(error) => Err(RetryError::Exhausted { attempts, error }),
            RetryOutcome::Timeout(_) => Err(RetryError::Timeout { attempts }),
        }
    }
}

/// Error form of a failed [`RetryReport`].
#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("circuit '{dependency}' is open")]
    CircuitOpen { dependency: String },

    #[error("non-retryable failure: {0}")]
    NonRetryable(E),

    #[error("retry cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    #[error("retries exhausted after {attempts} attempts: {error}")]
    Exhausted { attempts: u32, error: E },

    #[error("deadline exceeded after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("aborted: {reason}")]
    Aborted { reason: AbortReason },
}

impl<E> RetryError<E> {
    pub fn code(&self) -> ErrorCode {
        match self {
            RetryError::CircuitOpen { .. } => ErrorCode::CircuitOpen,
            RetryError::NonRetryable(_) => ErrorCode::BackendUnavailable,
            RetryError::Cancelled { .. } => ErrorCode::Cancelled,
            RetryError::Exhausted { .. } => ErrorCode::RetryExhausted,
            RetryError::Timeout { .. } => ErrorCode::RetryTimeout,
            RetryError::Aborted { .. } => ErrorCode::InternalError,
        }
    }
}

impl<E: fmt::Display> From<RetryError<E>> for DomainError {
    fn from(err: RetryError<E>) -> Self {
        let error = DomainError::new(err.code(), err.to_string());
        match &err {
            RetryError::CircuitOpen { dependency } => {
                error.with_detail("dependency", dependency.clone())
            }
            RetryError::Cancelled { attempts }
            | RetryError::Exhausted { attempts, .. }
            | RetryError::Timeout { attempts } => {
                error.with_detail("attempts", attempts.to_string())
            }
            RetryError::NonRetryable(_) | RetryError::Aborted { .. } => error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report<T, E>(outcome: RetryOutcome<T, E>, attempts: u32) -> RetryReport<T, E> {
        RetryReport {
            outcome,
            attempts,
            delays: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn kind_matches_variant() {
        let success: RetryOutcome<u8, String> = RetryOutcome::Success(1);
        assert_eq!(success.kind(), OutcomeKind::Success);
        assert!(success.is_success());

        let timeout: RetryOutcome<u8, String> = RetryOutcome::Timeout(None);
        assert_eq!(timeout.kind(), OutcomeKind::Timeout);

        let aborted: RetryOutcome<u8, String> = RetryOutcome::Aborted {
            reason: AbortReason::Cancelled,
            error: None,
        };
        assert_eq!(aborted.abort_reason(), Some(&AbortReason::Cancelled));
    }

    #[test]
    fn into_result_maps_exhausted() {
        let err = report::<u8, String>(RetryOutcome::Exhausted("boom".into()), 3)
            .into_result()
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::RetryExhausted);
        assert_eq!(err.to_string(), "retries exhausted after 3 attempts: boom");
    }

    #[test]
    fn into_result_maps_circuit_open() {
        let err = report::<u8, String>(
            RetryOutcome::Aborted {
                reason: AbortReason::CircuitOpen {
                    dependency: "api-x".into(),
                },
                error: None,
            },
            0,
        )
        .into_result()
        .unwrap_err();
        assert!(matches!(err, RetryError::CircuitOpen { ref dependency } if dependency == "api-x"));
    }

    #[test]
    fn into_result_passes_success_value() {
        let value = report::<u8, String>(RetryOutcome::Success(7), 1)
            .into_result()
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn retry_error_converts_to_domain_error() {
        let err: RetryError<String> = RetryError::Timeout { attempts: 2 };
        let domain: DomainError = err.into();
        assert_eq!(domain.code, ErrorCode::RetryTimeout);
        assert_eq!(domain.details.get("attempts"), Some(&"2".to_string()));
    }
}
