//! Health probe adapters.

mod probes;

pub use probes::{CircuitBreakerProbe, FnProbe, RateLimitStoreProbe};
