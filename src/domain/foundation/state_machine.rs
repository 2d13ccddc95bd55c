//! State machine trait for status enums.
//!
//! Gives status enums (circuit state, probe lifecycle) one way to declare
//! their legal edges and to move along them.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// Implementors declare the legal edges; the provided methods perform
/// checked transitions.
///
/// # Example
///
/// ```ignore
/// impl StateMachine for CircuitState {
///     fn can_transition_to(&self, target: &Self) -> bool {
///         matches!((self, target), (Closed, Open) | (Open, HalfOpen) | ...)
///     }
///
///     fn valid_transitions(&self) -> Vec<Self> { ... }
/// }
///
/// let next = state.transition_to(CircuitState::HalfOpen)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Performs a transition that the caller's own logic guarantees is legal.
    ///
    /// An illegal edge here means internal state is corrupted, so this
    /// panics instead of returning an error.
    fn advance_to(&self, target: Self) -> Self {
        match self.transition_to(target) {
            Ok(next) => next,
            Err(err) => panic!("state machine invariant violated: {}", err),
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}
