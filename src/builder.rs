//! Harness builder.
//!
//! `HarnessBuilder` is the way to set up a run. Every setter validates its
//! input and returns `Result`, so an invalid configuration is rejected before
//! any buffer is allocated or kernel dispatched.
//!
//! The operand generator is seeded once at build time; every shape of the run
//! draws from that one stream.

use rand::Rng;

use crate::invoke::effective_tile_config;
use crate::rng::OperandRng;
use crate::{Dispatcher, Error, GemmConfig, Harness, Precision, Result, TargetProfile};

#[derive(Debug, Clone)]
/// Builder for a [`Harness`].
///
/// Example:
///
/// ```rust
/// use xgemm::{BatchMode, GemmConfig, HarnessBuilder, HostDispatcher, Precision, ProblemShape};
///
/// # fn main() -> xgemm::Result<()> {
/// let mut harness = HarnessBuilder::new(Precision::F64)
///     .config(GemmConfig {
///         batch: BatchMode::Strided,
///         batch_count: 4,
///         ..GemmConfig::default()
///     })?
///     .reps(2)?
///     .build_with_seed(HostDispatcher::new(), 0)?;
/// harness.run_shape(&ProblemShape::square(16))?;
/// assert!(harness.finish().passed);
/// # Ok(())
/// # }
/// ```
pub struct HarnessBuilder {
    precision: Precision,
    cfg: GemmConfig,
    reps: usize,
    run_check: bool,
    target: Option<TargetProfile>,
}

impl HarnessBuilder {
    /// Start a run for `precision` with the default configuration
    /// (alpha 1, beta 0, no batching, one repetition, checking on).
    pub fn new(precision: Precision) -> Self {
        Self {
            precision,
            cfg: GemmConfig::default(),
            reps: 1,
            run_check: true,
            target: None,
        }
    }

    /// Set the GEMM configuration. It is validated against the precision and
    /// normalised (batch count rules).
    pub fn config(mut self, cfg: GemmConfig) -> Result<Self> {
        cfg.validate(self.precision)?;
        self.cfg = cfg.normalize();
        Ok(self)
    }

    /// Kernel calls per shape.
    pub fn reps(mut self, reps: usize) -> Result<Self> {
        if reps == 0 {
            return Err(Error::InvalidConfig("reps must be > 0".to_owned()));
        }
        self.reps = reps;
        Ok(self)
    }

    /// Skip the reference and comparison when `false` (performance only).
    pub fn run_check(mut self, run_check: bool) -> Self {
        self.run_check = run_check;
        self
    }

    /// Target profile deciding tile-configuration eligibility.
    ///
    /// Defaults to [`TargetProfile::from_env`] at build time.
    pub fn target(mut self, target: TargetProfile) -> Self {
        self.target = Some(target);
        self
    }

    /// Build using a deterministic seed.
    pub fn build_with_seed<D: Dispatcher>(self, dispatcher: D, seed: u64) -> Result<Harness<D>> {
        self.build_inner(dispatcher, OperandRng::seed_from_u64(seed))
    }

    /// Build with the operand generator seeded from `rng`.
    pub fn build_with_rng<D: Dispatcher, R: Rng + ?Sized>(
        self,
        dispatcher: D,
        rng: &mut R,
    ) -> Result<Harness<D>> {
        self.build_inner(dispatcher, OperandRng::from_rng(rng))
    }

    fn build_inner<D: Dispatcher>(self, dispatcher: D, rng: OperandRng) -> Result<Harness<D>> {
        self.cfg.validate(self.precision)?;
        let target = self.target.unwrap_or_else(TargetProfile::from_env);
        let tile_config = effective_tile_config(self.cfg.tile_config, &target);
        Ok(Harness::new(
            dispatcher,
            self.precision,
            self.cfg,
            self.reps,
            self.run_check,
            tile_config,
            rng,
        ))
    }
}
