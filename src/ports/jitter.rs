//! Jitter port - randomness for backoff delays.

use std::fmt::Debug;

/// Source of jitter samples for retry backoff.
///
/// Implementations return values in `[-1, 1]`; the retry policy scales
/// them by its jitter factor. Seedable implementations make delay
/// sequences reproducible.
pub trait JitterSource: Send + Sync + Debug {
    fn sample(&self) -> f64;
}
