//! Reference compute kernels.
//!
//! One loop nest serves every precision. Within a batch entry, A is addressed
//! as `s*lda*kb + i*kb + k2` (K-block `s`, row `i`, lane `k2`) and B as
//! `j*ldb + s*kb + k2`, or `(s*kb + k2)*ldb + j` when B is transposed. With
//! `kb == 1` these are the plain column-major forms.
//!
//! All batch entries reduce into the same C cells. How a cell is updated is
//! chosen by [`Variant::CELL`]:
//!
//! - [`CellMode::Direct`]: batch, column, K-block, row, lane; every product is
//!   added to C in place.
//! - [`CellMode::PerBatch`]: batch, column, row; the cell is loaded once per
//!   batch entry, reduced over K with [`Variant::after_block`] applied after
//!   each K-block, then stored.
//! - [`CellMode::Deferred`]: like `Direct` but into an M x N scratch seeded
//!   from C; C is stored once after the last batch entry.
//!
//! These functions panic on undersized slices (programmer error); shapes are
//! validated before buffers are allocated.

use crate::ProblemShape;
use crate::variant::{Accumulator, CellMode, Variant};

#[inline]
fn b_index(trans_b: bool, ldb: usize, j: usize, kk: usize) -> usize {
    if trans_b { kk * ldb + j } else { j * ldb + kk }
}

/// Reduce every `(A, B)` batch entry into `c`.
///
/// Each slice starts at its batch entry's first element. This is the shared
/// core of [`reference`] and the host kernels.
pub fn reduce_batches<'a, V, I>(
    variant: &V,
    shape: &ProblemShape,
    trans_b: bool,
    batches: I,
    c: &mut [V::C],
) where
    V: Variant,
    I: IntoIterator<Item = (&'a [V::A], &'a [V::B])>,
{
    let kb = V::PRECISION.k_block();
    let ProblemShape {
        m,
        n,
        k,
        lda,
        ldb,
        ldc,
    } = *shape;
    assert_eq!(k % kb, 0, "k={k} is not a multiple of the K-block {kb}");
    assert!(
        c.len() >= shape.c_len(),
        "C has {} elements, need {}",
        c.len(),
        shape.c_len()
    );
    let blocks = k / kb;

    match V::CELL {
        CellMode::Direct => {
            for (a, b) in batches {
                for j in 0..n {
                    for s in 0..blocks {
                        for i in 0..m {
                            let cell = &mut c[j * ldc + i];
                            let mut acc = variant.load(*cell);
                            for k2 in 0..kb {
                                let av = a[s * lda * kb + i * kb + k2];
                                let bv = b[b_index(trans_b, ldb, j, s * kb + k2)];
                                acc = acc.accumulate(variant.product(av, bv));
                            }
                            *cell = variant.store(acc);
                        }
                    }
                }
            }
        }
        CellMode::PerBatch => {
            for (a, b) in batches {
                for j in 0..n {
                    for i in 0..m {
                        let mut acc = variant.load(c[j * ldc + i]);
                        for s in 0..blocks {
                            for k2 in 0..kb {
                                let av = a[s * lda * kb + i * kb + k2];
                                let bv = b[b_index(trans_b, ldb, j, s * kb + k2)];
                                acc = acc.accumulate(variant.product(av, bv));
                            }
                            acc = variant.after_block(acc);
                        }
                        c[j * ldc + i] = variant.store(acc);
                    }
                }
            }
        }
        CellMode::Deferred => {
            let mut scratch = vec![V::Acc::default(); m * n];
            for j in 0..n {
                for i in 0..m {
                    scratch[j * m + i] = variant.load(c[j * ldc + i]);
                }
            }
            for (a, b) in batches {
                for j in 0..n {
                    for s in 0..blocks {
                        for i in 0..m {
                            let acc = &mut scratch[j * m + i];
                            for k2 in 0..kb {
                                let av = a[s * lda * kb + i * kb + k2];
                                let bv = b[b_index(trans_b, ldb, j, s * kb + k2)];
                                *acc = acc.accumulate(variant.product(av, bv));
                            }
                        }
                    }
                }
            }
            for j in 0..n {
                for i in 0..m {
                    c[j * ldc + i] = variant.store(scratch[j * m + i]);
                }
            }
        }
    }
}

/// Reference BRGEMM over contiguous batched operands.
///
/// Runs `passes` full reductions of `batch_count` entries into `c`; entry `r`
/// of A starts at `r*lda*k` and of B at `r*ldb*n` (`r*ldb*k` when transposed).
#[allow(clippy::too_many_arguments)]
pub fn reference<V: Variant>(
    variant: &V,
    shape: &ProblemShape,
    trans_b: bool,
    batch_count: usize,
    passes: usize,
    a: &[V::A],
    b: &[V::B],
    c: &mut [V::C],
) {
    let a_stride = shape.a_batch_stride();
    let b_stride = shape.b_batch_stride(trans_b);
    assert!(
        a.len() >= a_stride * batch_count,
        "A has {} elements, need {}",
        a.len(),
        a_stride * batch_count
    );
    assert!(
        b.len() >= b_stride * batch_count,
        "B has {} elements, need {}",
        b.len(),
        b_stride * batch_count
    );

    for _ in 0..passes {
        let batches = (0..batch_count).map(|r| (&a[r * a_stride..], &b[r * b_stride..]));
        reduce_batches(variant, shape, trans_b, batches, c);
    }
}
