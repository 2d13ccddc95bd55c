//! Clock port - time source for breakers and rate limiters.
//!
//! Components read time through this trait so tests can drive it by hand
//! instead of sleeping.

use std::fmt::Debug;
use std::time::Instant;

use crate::domain::foundation::Timestamp;

/// Source of monotonic and wall-clock time.
pub trait Clock: Send + Sync + Debug {
    /// Monotonic time, used for elapsed-time arithmetic.
    fn now(&self) -> Instant;

    /// Wall-clock time, used for reset timestamps and shared stores.
    fn wall_time(&self) -> Timestamp;
}
