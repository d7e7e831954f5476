//! Per-shape operand buffers.
//!
//! An [`OperandSet`] owns A, B, the kernel's C and the reference's C for one
//! shape. It is created, filled, used and dropped inside a single shape
//! iteration; nothing survives into the next shape.

use crate::buffer::{AlignedBuf, Element};
use crate::rng::OperandRng;
use crate::variant::Variant;
use crate::{ProblemShape, Result};

#[derive(Debug)]
pub struct OperandSet<V: Variant> {
    pub a: AlignedBuf<V::A>,
    pub b: AlignedBuf<V::B>,
    /// Written by the kernel under test.
    pub c: AlignedBuf<V::C>,
    /// Written by the reference.
    pub c_gold: AlignedBuf<V::C>,
}

impl<V: Variant> OperandSet<V> {
    /// Allocate zeroed buffers sized for `batch_count` A/B entries.
    pub fn allocate(shape: &ProblemShape, trans_b: bool, batch_count: usize) -> Result<Self> {
        let (a_len, b_len, c_len) = shape.checked_lens(batch_count, trans_b)?;
        Ok(Self {
            a: AlignedBuf::zeroed(a_len)?,
            b: AlignedBuf::zeroed(b_len)?,
            c: AlignedBuf::zeroed(c_len)?,
            c_gold: AlignedBuf::zeroed(c_len)?,
        })
    }

    /// Allocate and fill A then B from `rng`; both C buffers stay zero.
    pub fn generate(
        shape: &ProblemShape,
        trans_b: bool,
        batch_count: usize,
        rng: &mut OperandRng,
    ) -> Result<Self> {
        let mut set = Self::allocate(shape, trans_b, batch_count)?;
        fill(&mut set.a, rng, V::fill_a);
        fill(&mut set.b, rng, V::fill_b);
        Ok(set)
    }
}

/// Draw every element once in physical order: batch, column, then row
/// (including leading-dimension padding rows).
fn fill<T: Element>(buf: &mut [T], rng: &mut OperandRng, convert: fn(f64) -> T) {
    for x in buf.iter_mut() {
        *x = convert(rng.next_f64());
    }
}
