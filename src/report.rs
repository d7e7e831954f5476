//! Per-shape results and their renderings.
//!
//! Two text forms: [`ShapeReport::verbose`] for a single explicit shape and
//! [`ShapeReport::line`] (one line per shape) for shape lists. With the `serde`
//! feature a whole run also renders as JSON through [`RunSummary::to_json`].

use std::fmt;
use std::time::Duration;

use crate::metrics::MatDiff;
use crate::{BatchMode, Precision, ProblemShape};

/// `2 * reps * M * N * K * batch_count / (secs * 1e9)`; zero for a zero duration.
pub fn gflops(shape: &ProblemShape, reps: usize, batch_count: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        shape.flops(reps, batch_count) / (secs * 1e9)
    } else {
        0.0
    }
}

/// Outcome of comparing the kernel against the reference.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CheckReport {
    pub reference_secs: f64,
    pub reference_gflops: f64,
    pub max_error: f64,
    /// Full statistics, `SP` and `DP` only.
    pub diff: Option<MatDiff>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShapeReport {
    pub shape: ProblemShape,
    pub precision: Precision,
    pub batch: BatchMode,
    pub batch_count: usize,
    pub batch_unroll: bool,
    pub trans_b: bool,
    pub reps: usize,
    pub dispatch_secs: f64,
    pub kernel_secs: f64,
    pub kernel_gflops: f64,
    /// `None` when the check was skipped.
    pub check: Option<CheckReport>,
}

impl ShapeReport {
    /// Error that counts toward the run verdict, if the shape was checked.
    pub fn max_error(&self) -> Option<f64> {
        self.check.map(|c| c.max_error)
    }

    pub fn verbose(&self) -> Verbose<'_> {
        Verbose(self)
    }

    pub fn line(&self) -> Line<'_> {
        Line(self)
    }
}

/// Multi-line rendering for a single shape.
pub struct Verbose<'a>(&'a ShapeReport);

impl fmt::Display for Verbose<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        let s = &r.shape;
        let rule = "------------------------------------------------";
        writeln!(f, "{rule}")?;
        write!(f, "RUNNING ({}x{}) X ({}x{})", s.m, s.k, s.k, s.n)?;
        if r.trans_b {
            write!(f, "^T")?;
        }
        writeln!(f, " = ({}x{}), {}, BR={}", s.m, s.n, r.precision, r.batch_count)?;
        writeln!(f, "{rule}")?;
        writeln!(f, "{:.6}s for dispatch", r.dispatch_secs)?;
        if let Some(check) = &r.check {
            writeln!(f, "{:.6}s for reference", check.reference_secs)?;
            writeln!(f, "{:.6} GFLOPS for reference", check.reference_gflops)?;
        }
        writeln!(f, "{:.6}s for kernel", r.kernel_secs)?;
        writeln!(f, "{:.6} GFLOPS for kernel", r.kernel_gflops)?;
        if let Some(check) = &r.check {
            writeln!(f, "max. error: {:.6}", check.max_error)?;
            if let Some(diff) = &check.diff {
                writeln!(f, "rel. error: {:e} (normf {:e})", diff.linf_rel, diff.normf_rel)?;
            }
        }
        Ok(())
    }
}

/// `M N K LDA LDB LDC BR BRTYPE UNROLL PREC GFLOPS [ERR]`.
pub struct Line<'a>(&'a ShapeReport);

impl fmt::Display for Line<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        write!(
            f,
            "{} {} {} {} {} {:.6}",
            r.shape,
            r.batch_count,
            r.batch.code(),
            u8::from(r.batch_unroll),
            r.precision,
            r.kernel_gflops
        )?;
        if let Some(check) = &r.check {
            write!(f, " {:.6}", check.max_error)?;
        }
        Ok(())
    }
}

/// All shape reports of one run plus the verdict.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunSummary {
    pub shapes: Vec<ShapeReport>,
    pub total_max_error: f64,
    pub threshold: f64,
    pub passed: bool,
}

impl RunSummary {
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::Error::InvalidData(format!("failed to serialize report: {e}")))
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Total Max Error {:.6}", self.total_max_error)
    }
}
