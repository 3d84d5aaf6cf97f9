//! Random source used for variant selection and variance jitter.

use rand::{rngs::StdRng, Rng, SeedableRng};

/// Uniform randomness consumed by the dispatcher.
///
/// Injected so tests can pin the outcome of a play call.
pub trait RandomSource {
    /// Uniform index in `0..len`. `len` is never zero.
    fn pick_index(&mut self, len: usize) -> usize;

    /// Uniform offset in `[-spread, spread]`. Returns 0 when `spread` is 0
    /// or not finite.
    fn jitter(&mut self, spread: f32) -> f32;
}

/// [`RandomSource`] backed by any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngSource<R>(R);

impl<R: Rng> RngSource<R> {
    /// Wrap an existing generator.
    pub fn new(rng: R) -> Self {
        Self(rng)
    }
}

impl RngSource<StdRng> {
    /// Reproducible source for replays and tests.
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }

    /// Source seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self(StdRng::from_entropy())
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn pick_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.0.gen_range(0..len)
    }

    fn jitter(&mut self, spread: f32) -> f32 {
        let spread = spread.abs();
        if spread == 0.0 || !spread.is_finite() {
            return 0.0;
        }
        // Sampling the unit range keeps huge spreads from overflowing the width.
        self.0.gen_range(-1.0f32..=1.0) * spread
    }
}
