//! Circuit breaker states and their legal transitions.
//!
//! ```text
//! Closed   --[failure threshold reached]--> Open
//! Open     --[open timeout elapsed]-------> HalfOpen
//! HalfOpen --[success threshold reached]--> Closed
//! HalfOpen --[any relevant failure]-------> Open
//! ```
//!
//! There is no Open -> Closed edge. Administrative resets go through
//! the breaker's own `reset`, which rebuilds the state from scratch.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

/// Circuit breaker states for downstream dependency protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - calls flow through to the dependency.
    Closed,

    /// Too many failures - calls rejected without reaching the dependency.
    Open,

    /// Probing recovery - a bounded number of trial calls are admitted.
    HalfOpen,
}

impl CircuitState {
    /// Check if the circuit may admit calls in this state.
    pub fn allows_requests(&self) -> bool {
        matches!(self, CircuitState::Closed | CircuitState::HalfOpen)
    }

    /// Returns the string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl StateMachine for CircuitState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use CircuitState::*;
        matches!(
            (self, target),
            (Closed, Open) | (Open, HalfOpen) | (HalfOpen, Closed) | (HalfOpen, Open)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use CircuitState::*;
        match self {
            Closed => vec![Open],
            Open => vec![HalfOpen],
            HalfOpen => vec![Closed, Open],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_state_allows_requests() {
        assert!(CircuitState::Closed.allows_requests());
        assert!(CircuitState::HalfOpen.allows_requests());
        assert!(!CircuitState::Open.allows_requests());
    }

    #[test]
    fn open_never_transitions_directly_to_closed() {
        assert!(!CircuitState::Open.can_transition_to(&CircuitState::Closed));
        assert!(CircuitState::Open
            .transition_to(CircuitState::Closed)
            .is_err());
    }

    #[test]
    fn defined_edges_are_accepted() {
        assert_eq!(
            CircuitState::Closed.transition_to(CircuitState::Open),
            Ok(CircuitState::Open)
        );
        assert_eq!(
            CircuitState::Open.transition_to(CircuitState::HalfOpen),
            Ok(CircuitState::HalfOpen)
        );
        assert_eq!(
            CircuitState::HalfOpen.transition_to(CircuitState::Closed),
            Ok(CircuitState::Closed)
        );
        assert_eq!(
            CircuitState::HalfOpen.transition_to(CircuitState::Open),
            Ok(CircuitState::Open)
        );
    }

    #[test]
    #[should_panic(expected = "state machine invariant violated")]
    fn advancing_along_undefined_edge_panics() {
        CircuitState::Closed.advance_to(CircuitState::HalfOpen);
    }

    #[test]
    fn no_state_is_terminal() {
        for state in [CircuitState::Closed, CircuitState::Open, CircuitState::HalfOpen] {
            assert!(!state.is_terminal());
        }
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&CircuitState::HalfOpen).unwrap();
        assert_eq!(json, "\"half_open\"");
        assert_eq!(CircuitState::HalfOpen.to_string(), "half_open");
    }
}
