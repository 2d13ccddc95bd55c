//! Resilience domain - pure types for breakers and retries.
//!
//! Nothing in here touches clocks, locks or the runtime. The adapters and
//! the application layer own the mutable state and the waiting.

mod backoff;
mod circuit_state;
mod classification;
mod outcome;
mod retry_policy;

pub use backoff::BackoffStrategy;
pub use circuit_state::CircuitState;
pub use classification::{ClassifyError, DownstreamError, ErrorClass};
pub use outcome::{AbortReason, OutcomeKind, RetryError, RetryOutcome, RetryReport};
pub use retry_policy::RetryPolicy;
