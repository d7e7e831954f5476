//! Bfloat16 codec.
//!
//! A bf16 value is the upper half of an IEEE-754 binary32 bit pattern:
//! 1 sign bit, 8 exponent bits, 7 mantissa bits. Storage uses [`half::bf16`],
//! but conversions go through the raw bits so they stay bit-exact:
//!
//! - [`truncate`] drops the low 16 bits (round toward zero, no rounding bias).
//!   `half::bf16::from_f32` rounds to nearest even, which is *not* what kernels
//!   under test do when they narrow.
//! - [`widen`] zero-extends the low 16 bits. NaN and infinity patterns pass
//!   through structurally (no quieting).
//!
//! `widen(truncate(x))` equals `x` with its low 16 mantissa bits cleared.

pub use half::bf16;

/// Narrow an `f32` to bf16 by keeping its upper 16 bits.
#[inline]
pub fn truncate(x: f32) -> bf16 {
    bf16::from_bits((x.to_bits() >> 16) as u16)
}

/// Widen a bf16 to `f32` by zero-filling the low 16 bits.
#[inline]
pub fn widen(v: bf16) -> f32 {
    f32::from_bits(u32::from(v.to_bits()) << 16)
}

/// Apply a bf16 round trip to an `f32` in place of keeping the narrow value.
///
/// Used where a running `f32` sum has to be re-truncated between reduction steps.
#[inline]
pub fn round_trip(x: f32) -> f32 {
    f32::from_bits(x.to_bits() & 0xFFFF_0000)
}
