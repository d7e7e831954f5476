//! Random operand generator.
//!
//! One generator is seeded when a harness is built and then shared by every
//! shape that harness runs, so a shape list produces the same operands on every
//! run with the same seed. Values are uniform in `[0, 1)` and drawn one element
//! at a time; the per-variant scaling lives in [`crate::operand`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seeded uniform `[0, 1)` source for operand fills.
#[derive(Debug, Clone)]
pub struct OperandRng {
    rng: StdRng,
}

impl OperandRng {
    pub fn seed_from_u64(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seed from another RNG (e.g. a caller-owned generator in tests).
    pub fn from_rng<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            rng: StdRng::seed_from_u64(rng.r#gen()),
        }
    }

    /// Next value, uniform in `[0, 1)`.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }
}
