//! Jitter sources for retry backoff.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

use crate::ports::JitterSource;

/// Uniform jitter in `[-1, 1]` from a seedable RNG.
#[derive(Debug)]
pub struct SeededJitter {
    rng: Mutex<StdRng>,
}

impl SeededJitter {
    /// Reproducible sequence for tests and simulations.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Seeded from OS entropy, for production use.
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl JitterSource for SeededJitter {
    fn sample(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(-1.0..=1.0)
    }
}

/// Always zero: delays follow the backoff strategy exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl JitterSource for NoJitter {
    fn sample(&self) -> f64 {
        0.0
    }
}

/// Always the same sample. Handy for asserting exact jittered delays.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn sample(&self) -> f64 {
        self.0.clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_gives_same_sequence() {
        let a = SeededJitter::from_seed(42);
        let b = SeededJitter::from_seed(42);
        let seq_a: Vec<f64> = (0..16).map(|_| a.sample()).collect();
        let seq_b: Vec<f64> = (0..16).map(|_| b.sample()).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn samples_stay_in_unit_range() {
        let jitter = SeededJitter::from_seed(7);
        for _ in 0..1_000 {
            let sample = jitter.sample();
            assert!((-1.0..=1.0).contains(&sample));
        }
    }

    #[test]
    fn fixed_jitter_is_clamped() {
        assert_eq!(FixedJitter(3.0).sample(), 1.0);
        assert_eq!(FixedJitter(-0.5).sample(), -0.5);
        assert_eq!(NoJitter.sample(), 0.0);
    }
}
