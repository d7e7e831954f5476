//! Driver.
//!
//! For every shape: allocate and fill operands, dispatch and time the kernel,
//! optionally run the reference and compare, then drop the buffers. Only the
//! [`ErrorAccumulator`] and the per-shape reports outlive a shape.
//!
//! The precision is resolved to a monomorphised runner once, when the harness
//! is built; running a shape is then a single indirect call.

use std::time::Instant;

use tracing::{debug, info};

use crate::invoke::run_kernel;
use crate::metrics::{MatDiff, max_abs_diff};
use crate::operand::OperandSet;
use crate::reference::reference;
use crate::report::{CheckReport, RunSummary, ShapeReport, gflops};
use crate::rng::OperandRng;
use crate::variant::{
    Bf16Bf16, Bf16Bf16Flat, Bf16F32, Bf16F32Flat, Dp, I16I32, Sp, Sui8I32, Sui8Ui8, Usi8I32,
    Variant,
};
use crate::{
    Dispatcher, Error, ErrorAccumulator, GemmConfig, HostDispatcher, Precision, ProblemShape,
    Result,
};

type RunFn<D> = fn(&mut Harness<D>, &ProblemShape) -> Result<ShapeReport>;

/// Monomorphised runner for `precision`.
fn runner_for<D: Dispatcher>(precision: Precision) -> RunFn<D> {
    match precision {
        Precision::F64 => run_variant::<D, Dp>,
        Precision::F32 => run_variant::<D, Sp>,
        Precision::I16I32 => run_variant::<D, I16I32>,
        Precision::U8I32 => run_variant::<D, Usi8I32>,
        Precision::S8I32 => run_variant::<D, Sui8I32>,
        Precision::S8U8 => run_variant::<D, Sui8Ui8>,
        Precision::Bf16F32 => run_variant::<D, Bf16F32>,
        Precision::Bf16Bf16 => run_variant::<D, Bf16Bf16>,
        Precision::Bf16F32Flat => run_variant::<D, Bf16F32Flat>,
        Precision::Bf16Bf16Flat => run_variant::<D, Bf16Bf16Flat>,
    }
}

/// A configured benchmark run. Build one with [`crate::HarnessBuilder`].
pub struct Harness<D: Dispatcher = HostDispatcher> {
    dispatcher: D,
    precision: Precision,
    cfg: GemmConfig,
    reps: usize,
    run_check: bool,
    tile_config: bool,
    rng: OperandRng,
    errors: ErrorAccumulator,
    reports: Vec<ShapeReport>,
    runner: RunFn<D>,
}

impl<D: Dispatcher> Harness<D> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        dispatcher: D,
        precision: Precision,
        cfg: GemmConfig,
        reps: usize,
        run_check: bool,
        tile_config: bool,
        rng: OperandRng,
    ) -> Self {
        info!(
            %precision,
            batch = %cfg.batch,
            batch_count = cfg.batch_count,
            reps,
            run_check,
            tile_config,
            "harness ready"
        );
        Self {
            dispatcher,
            precision,
            cfg,
            reps,
            run_check,
            tile_config,
            rng,
            errors: ErrorAccumulator::new(),
            reports: Vec::new(),
            runner: runner_for::<D>(precision),
        }
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn config(&self) -> &GemmConfig {
        &self.cfg
    }

    /// Tile configuration after the target downgrade.
    pub fn tile_config(&self) -> bool {
        self.tile_config
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn errors(&self) -> &ErrorAccumulator {
        &self.errors
    }

    pub fn reports(&self) -> &[ShapeReport] {
        &self.reports
    }

    /// Run one shape. Errors are fatal for the whole run.
    pub fn run_shape(&mut self, shape: &ProblemShape) -> Result<&ShapeReport> {
        let runner = self.runner;
        let report = runner(self, shape)?;
        if let Some(error) = report.max_error() {
            self.errors.record(error, self.cfg.batch);
        }
        let idx = self.reports.len();
        self.reports.push(report);
        Ok(&self.reports[idx])
    }

    /// Run shapes in order, stopping at the first error.
    pub fn run_all<I, F>(&mut self, shapes: I, mut on_report: F) -> Result<()>
    where
        I: IntoIterator<Item = Result<ProblemShape>>,
        F: FnMut(&ShapeReport),
    {
        for shape in shapes {
            let report = self.run_shape(&shape?)?;
            on_report(report);
        }
        Ok(())
    }

    /// Verdict over every shape run so far.
    pub fn finish(self) -> RunSummary {
        let summary = RunSummary {
            total_max_error: self.errors.max(),
            threshold: self.errors.threshold(),
            passed: self.errors.passed(),
            shapes: self.reports,
        };
        info!(
            shapes = summary.shapes.len(),
            total_max_error = summary.total_max_error,
            threshold = summary.threshold,
            passed = summary.passed,
            "run finished"
        );
        summary
    }
}

fn run_variant<D: Dispatcher, V: Variant>(
    h: &mut Harness<D>,
    shape: &ProblemShape,
) -> Result<ShapeReport> {
    let cfg = h.cfg;
    shape.validate(cfg.trans_b)?;
    let kb = V::PRECISION.k_block();
    if shape.k % kb != 0 {
        return Err(Error::InvalidShape(format!(
            "K={} must be a multiple of {kb} for {}",
            shape.k,
            V::PRECISION
        )));
    }
    shape.checked_lens(cfg.batch_count, cfg.trans_b)?;
    debug!(%shape, precision = %V::PRECISION, "shape start");

    let variant = V::from_config(&cfg);
    let count = cfg.batch_count;
    let mut ops = OperandSet::<V>::generate(shape, cfg.trans_b, count, &mut h.rng)?;

    let timing = run_kernel(
        &h.dispatcher,
        &variant,
        shape,
        &cfg,
        h.tile_config,
        h.reps,
        &mut ops,
    )?;

    let check = if h.run_check {
        let passes = cfg.reference_passes(h.reps);
        let start = Instant::now();
        reference(
            &variant,
            shape,
            cfg.trans_b,
            count,
            passes,
            &ops.a,
            &ops.b,
            &mut ops.c_gold,
        );
        let elapsed = start.elapsed();
        let max_error = max_abs_diff(shape, &ops.c_gold, &ops.c);
        let diff = V::PRECISION
            .is_real()
            .then(|| MatDiff::compute(shape, &ops.c_gold, &ops.c));
        debug!(%shape, max_error, "shape checked");
        Some(CheckReport {
            reference_secs: elapsed.as_secs_f64(),
            reference_gflops: gflops(shape, passes, count, elapsed),
            max_error,
            diff,
        })
    } else {
        None
    };

    Ok(ShapeReport {
        shape: *shape,
        precision: V::PRECISION,
        batch: cfg.batch,
        batch_count: count,
        batch_unroll: cfg.batch_unroll,
        trans_b: cfg.trans_b,
        reps: h.reps,
        dispatch_secs: timing.dispatch.as_secs_f64(),
        kernel_secs: timing.run.as_secs_f64(),
        kernel_gflops: gflops(shape, h.reps, count, timing.run),
        check,
    })
}
