// Path: crates/api/src/random.rs
//! The injected randomness seam used by block selection.
//!
//! Block selection hashes the reservation context and may perturb the probe
//! start with a random draw. The draw is a scalability optimization only:
//! allocation correctness must hold with every draw pinned to zero, and the
//! test suite runs exactly that configuration.

use rand::RngCore;

/// A source of non-cryptographic randomness.
pub trait RandomSource: Send + Sync {
    /// Returns the next draw.
    fn next_u64(&self) -> u64;
}

/// The production source, backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_u64(&self) -> u64 {
        rand::thread_rng().next_u64()
    }
}
