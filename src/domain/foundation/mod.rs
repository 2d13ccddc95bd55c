//! Foundation module - Shared domain primitives.
//!
//! Contains the value objects, state machine trait and error types
//! that the resilience and rate limiting modules build on.

mod errors;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
