//! Problem shapes.
//!
//! All operands are column-major with a batch dimension. Element `(r, i, j)` of an
//! operand with leading dimension `ld` and second dimension `dim2` lives at
//! `r * ld * dim2 + j * ld + i`:
//!
//! - A: `ld = lda`, `dim2 = k`
//! - B: `ld = ldb`, `dim2 = n` (or `k` when B is transposed)
//! - C: `ld = ldc`, `dim2 = n`, no batch dimension (batches reduce into one C)

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProblemShape {
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub lda: usize,
    pub ldb: usize,
    pub ldc: usize,
}

impl ProblemShape {
    pub fn new(m: usize, n: usize, k: usize, lda: usize, ldb: usize, ldc: usize) -> Self {
        Self {
            m,
            n,
            k,
            lda,
            ldb,
            ldc,
        }
    }

    /// Square shape with tight leading dimensions.
    pub fn square(size: usize) -> Self {
        Self::new(size, size, size, size, size, size)
    }

    /// Check dimensions and leading dimensions.
    ///
    /// `lda >= m`, `ldc >= m`, and `ldb >= k` (or `ldb >= n` when B is transposed).
    pub fn validate(&self, trans_b: bool) -> Result<()> {
        if self.m == 0 || self.n == 0 || self.k == 0 {
            return Err(Error::InvalidShape(format!(
                "M, N, K must be > 0, got {}x{}x{}",
                self.m, self.n, self.k
            )));
        }
        if self.lda < self.m {
            return Err(Error::InvalidShape(format!(
                "lda {} must be >= m {}",
                self.lda, self.m
            )));
        }
        let (b_rows, b_rows_name) = if trans_b { (self.n, "n") } else { (self.k, "k") };
        if self.ldb < b_rows {
            return Err(Error::InvalidShape(format!(
                "ldb {} must be >= {b_rows_name} {b_rows}",
                self.ldb
            )));
        }
        if self.ldc < self.m {
            return Err(Error::InvalidShape(format!(
                "ldc {} must be >= m {}",
                self.ldc, self.m
            )));
        }
        Ok(())
    }

    /// Second (column) dimension of B's storage.
    #[inline]
    pub fn b_cols(&self, trans_b: bool) -> usize {
        if trans_b { self.k } else { self.n }
    }

    /// Elements in one batch entry of A.
    #[inline]
    pub fn a_batch_stride(&self) -> usize {
        self.lda * self.k
    }

    /// Elements in one batch entry of B.
    #[inline]
    pub fn b_batch_stride(&self, trans_b: bool) -> usize {
        self.ldb * self.b_cols(trans_b)
    }

    #[inline]
    pub fn a_len(&self, batch_count: usize) -> usize {
        self.a_batch_stride() * batch_count
    }

    #[inline]
    pub fn b_len(&self, batch_count: usize, trans_b: bool) -> usize {
        self.b_batch_stride(trans_b) * batch_count
    }

    #[inline]
    pub fn c_len(&self) -> usize {
        self.ldc * self.n
    }

    /// Element counts of A, B and C for `batch_count` entries.
    ///
    /// Fails when any of them does not fit in `usize`; once this succeeds the
    /// unchecked length and stride helpers cannot overflow.
    pub fn checked_lens(
        &self,
        batch_count: usize,
        trans_b: bool,
    ) -> Result<(usize, usize, usize)> {
        let too_large = || {
            Error::InvalidShape(format!(
                "shape {self} with {batch_count} batch entries is too large"
            ))
        };
        let a = self
            .lda
            .checked_mul(self.k)
            .and_then(|s| s.checked_mul(batch_count))
            .ok_or_else(too_large)?;
        let b = self
            .ldb
            .checked_mul(self.b_cols(trans_b))
            .and_then(|s| s.checked_mul(batch_count))
            .ok_or_else(too_large)?;
        let c = self.ldc.checked_mul(self.n).ok_or_else(too_large)?;
        Ok((a, b, c))
    }

    /// Floating-point operations for `reps` calls reducing `batch_count` products.
    pub fn flops(&self, reps: usize, batch_count: usize) -> f64 {
        2.0 * reps as f64 * self.m as f64 * self.n as f64 * self.k as f64 * batch_count as f64
    }
}

impl fmt::Display for ProblemShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.m, self.n, self.k, self.lda, self.ldb, self.ldc
        )
    }
}

/// Parses the shape-list line format: `M N K LDA LDB LDC`, whitespace separated.
impl FromStr for ProblemShape {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut dims = [0_usize; 6];
        let mut fields = s.split_whitespace();
        for (idx, dim) in dims.iter_mut().enumerate() {
            let field = fields.next().ok_or_else(|| {
                Error::InvalidData(format!(
                    "shape line {s:?} has {idx} fields, expected 6 (M N K LDA LDB LDC)"
                ))
            })?;
            *dim = field.parse().map_err(|e| {
                Error::InvalidData(format!("shape field {field:?} is not a size: {e}"))
            })?;
        }
        if let Some(extra) = fields.next() {
            return Err(Error::InvalidData(format!(
                "shape line {s:?} has trailing field {extra:?}"
            )));
        }
        let [m, n, k, lda, ldb, ldc] = dims;
        Ok(Self::new(m, n, k, lda, ldb, ldc))
    }
}
