//! Error metrics.
//!
//! Only the true `M x N` cells of C are compared; rows `M..LDC` of each column
//! are padding and ignored. Every variant gets [`max_abs_diff`]; `SP` and `DP`
//! additionally get the norm-wise statistics of [`MatDiff`].
//!
//! [`ErrorAccumulator`] carries the worst error across all shapes of one run
//! and makes the final pass/fail decision.

use crate::buffer::Element;
use crate::{BatchMode, ProblemShape};

/// Pass threshold when no batching mode was used.
pub const THRESHOLD_PLAIN: f64 = 5e-5;
/// Pass threshold once any batched mode was used.
pub const THRESHOLD_BATCHED: f64 = 5e-4;

/// Largest `|gold - test|` over the `M x N` cells, using `ldc` strides.
pub fn max_abs_diff<C: Element>(shape: &ProblemShape, gold: &[C], test: &[C]) -> f64 {
    let mut max = 0.0_f64;
    for j in 0..shape.n {
        let col = j * shape.ldc;
        for i in 0..shape.m {
            let diff = (gold[col + i].to_f64() - test[col + i].to_f64()).abs();
            // NaN propagates instead of being skipped by `max`.
            if diff.is_nan() || diff > max {
                max = diff;
            }
        }
    }
    max
}

/// Difference statistics between a reference and a test matrix.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatDiff {
    /// `max |ref - tst|`.
    pub linf_abs: f64,
    /// `max |ref - tst| / max |ref|`.
    pub linf_rel: f64,
    /// Frobenius norm of `ref - tst`.
    pub l2_abs: f64,
    /// `sqrt(sum ((ref - tst) / ref)^2)` over non-zero reference cells.
    pub l2_rel: f64,
    /// `sum |ref|`.
    pub l1_ref: f64,
    /// `sum |tst|`.
    pub l1_tst: f64,
    /// `||ref - tst||_F / ||ref||_F`.
    pub normf_rel: f64,
    /// Coefficient of determination of `tst` against `ref`.
    pub rsq: f64,
}

impl MatDiff {
    pub fn compute<C: Element>(shape: &ProblemShape, gold: &[C], test: &[C]) -> Self {
        let cells = (shape.m * shape.n) as f64;
        let mut d = MatDiff::default();
        let mut ref_max = 0.0_f64;
        let mut ref_sum = 0.0_f64;
        let mut ref_sq = 0.0_f64;
        let mut diff_sq = 0.0_f64;
        let mut rel_sq = 0.0_f64;

        for j in 0..shape.n {
            let col = j * shape.ldc;
            for i in 0..shape.m {
                let r = gold[col + i].to_f64();
                let t = test[col + i].to_f64();
                let diff = (r - t).abs();
                d.linf_abs = d.linf_abs.max(diff);
                ref_max = ref_max.max(r.abs());
                d.l1_ref += r.abs();
                d.l1_tst += t.abs();
                ref_sum += r;
                ref_sq += r * r;
                diff_sq += diff * diff;
                if r != 0.0 {
                    rel_sq += (diff / r) * (diff / r);
                }
            }
        }

        d.l2_abs = diff_sq.sqrt();
        d.l2_rel = rel_sq.sqrt();
        d.linf_rel = if ref_max > 0.0 { d.linf_abs / ref_max } else { d.linf_abs };
        d.normf_rel = if ref_sq > 0.0 {
            d.l2_abs / ref_sq.sqrt()
        } else {
            d.l2_abs
        };
        let mean = ref_sum / cells;
        let total = ref_sq - cells * mean * mean;
        d.rsq = if total > 0.0 {
            1.0 - diff_sq / total
        } else if diff_sq == 0.0 {
            1.0
        } else {
            0.0
        };
        d
    }
}

/// Worst error seen across all shapes of one run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorAccumulator {
    max: f64,
    batched: bool,
    shapes: usize,
}

impl ErrorAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one shape's error. A NaN error sticks and fails the run.
    pub fn record(&mut self, error: f64, batch: BatchMode) {
        if error.is_nan() || error > self.max {
            self.max = error;
        }
        self.batched |= batch.is_batched();
        self.shapes += 1;
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn shapes(&self) -> usize {
        self.shapes
    }

    pub fn threshold(&self) -> f64 {
        if self.batched {
            THRESHOLD_BATCHED
        } else {
            THRESHOLD_PLAIN
        }
    }

    pub fn passed(&self) -> bool {
        self.max < self.threshold()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bf16::truncate;

    #[test]
    fn padding_rows_are_ignored() {
        let shape = ProblemShape::new(2, 2, 1, 2, 1, 3);
        let gold = [1.0, 2.0, 100.0, 3.0, 4.0, -100.0];
        let test = [1.5, 2.0, 0.0, 3.0, 3.75, 0.0];
        assert_eq!(max_abs_diff(&shape, &gold, &test), 0.5);
    }

    #[test]
    fn bf16_cells_compare_widened() {
        let shape = ProblemShape::new(1, 1, 1, 1, 1, 1);
        let gold = [truncate(1.0)];
        let test = [truncate(1.5)];
        assert_eq!(max_abs_diff(&shape, &gold, &test), 0.5);
    }

    #[test]
    fn nan_is_never_hidden() {
        let shape = ProblemShape::new(2, 1, 1, 2, 1, 2);
        let gold = [f64::NAN, 1.0];
        let test = [0.0, 1.0];
        assert!(max_abs_diff(&shape, &gold, &test).is_nan());
    }

    #[test]
    fn matdiff_of_identical_matrices_is_zero() {
        let shape = ProblemShape::new(2, 2, 1, 2, 1, 2);
        let x = [1.0_f32, 2.0, 3.0, 4.0];
        let d = MatDiff::compute(&shape, &x, &x);
        assert_eq!(d.linf_abs, 0.0);
        assert_eq!(d.l2_abs, 0.0);
        assert_eq!(d.rsq, 1.0);
        assert_eq!(d.l1_ref, 10.0);
        assert_eq!(d.l1_tst, 10.0);
    }

    #[test]
    fn matdiff_linf_matches_scan() {
        let shape = ProblemShape::new(2, 2, 1, 3, 1, 3);
        let gold = [1.0, 2.0, 0.0, 3.0, 4.0, 0.0];
        let test = [1.0, 2.5, 9.0, 3.0, 4.0, 9.0];
        let d = MatDiff::compute(&shape, &gold, &test);
        assert_eq!(d.linf_abs, max_abs_diff(&shape, &gold, &test));
        assert_eq!(d.linf_abs, 0.5);
        assert_eq!(d.linf_rel, 0.5 / 4.0);
    }

    #[test]
    fn accumulator_keeps_worst_and_switches_threshold() {
        let mut acc = ErrorAccumulator::new();
        acc.record(1e-6, BatchMode::None);
        acc.record(1e-7, BatchMode::None);
        assert_eq!(acc.max(), 1e-6);
        assert_eq!(acc.threshold(), THRESHOLD_PLAIN);
        assert!(acc.passed());

        acc.record(1e-4, BatchMode::Strided);
        assert_eq!(acc.threshold(), THRESHOLD_BATCHED);
        assert!(acc.passed());
        assert_eq!(acc.shapes(), 3);

        acc.record(1e-3, BatchMode::Strided);
        assert!(!acc.passed());
    }

    #[test]
    fn nan_error_fails_the_run() {
        let mut acc = ErrorAccumulator::new();
        acc.record(f64::NAN, BatchMode::None);
        acc.record(0.0, BatchMode::None);
        assert!(!acc.passed());
    }
}
