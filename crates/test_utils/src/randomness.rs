// Path: crates/test_utils/src/randomness.rs
//! Pinnable randomness sources.

use attestor_api::random::RandomSource;

/// Always returns the same draw. Correctness tests pin this to 0: block
/// selection must remain correct with no randomness at all.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub u64);

impl RandomSource for FixedRandom {
    fn next_u64(&self) -> u64 {
        self.0
    }
}
