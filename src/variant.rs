//! Precision variants as types.
//!
//! Every reference kernel is the same loop nest parameterised by a [`Variant`]:
//! element types for A, B and C, an accumulator type, the K-block factor, how a
//! product is formed, and how a C cell is loaded into and stored from the
//! accumulator. [`CellMode`] picks one of three loop shapes (see
//! [`crate::reference`]).

use std::fmt;

use crate::bf16::{self as codec, bf16};
use crate::buffer::Element;
use crate::matmul;
use crate::{GemmConfig, Precision, ProblemShape};

/// Accumulator arithmetic. Integer sums wrap like the hardware does.
pub trait Accumulator: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    fn accumulate(self, rhs: Self) -> Self;
}

impl Accumulator for i32 {
    #[inline]
    fn accumulate(self, rhs: Self) -> Self {
        self.wrapping_add(rhs)
    }
}

impl Accumulator for f32 {
    #[inline]
    fn accumulate(self, rhs: Self) -> Self {
        self + rhs
    }
}

impl Accumulator for f64 {
    #[inline]
    fn accumulate(self, rhs: Self) -> Self {
        self + rhs
    }
}

/// How the reference loop treats a C cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellMode {
    /// C is the accumulator; every product is added in place.
    Direct,
    /// Per batch entry: load C, reduce over K, store C.
    PerBatch,
    /// Accumulate every batch entry in an M x N scratch, store C once at the end.
    Deferred,
}

pub trait Variant: fmt::Debug + Clone + Send + Sync + 'static {
    type A: Element;
    type B: Element;
    type C: Element;
    type Acc: Accumulator;

    const PRECISION: Precision;
    const CELL: CellMode = CellMode::Direct;

    fn from_config(cfg: &GemmConfig) -> Self
    where
        Self: Sized;

    /// Convert a uniform `[0, 1)` draw into an A element.
    fn fill_a(x: f64) -> Self::A;

    /// Convert a uniform `[0, 1)` draw into a B element.
    fn fill_b(x: f64) -> Self::B;

    fn product(&self, a: Self::A, b: Self::B) -> Self::Acc;

    fn load(&self, c: Self::C) -> Self::Acc;

    fn store(&self, acc: Self::Acc) -> Self::C;

    /// Applied to the running sum after each K-block.
    #[inline]
    fn after_block(&self, acc: Self::Acc) -> Self::Acc {
        acc
    }

    /// Accumulate one batch entry `C += A * op(B)` with a dense GEMM.
    ///
    /// Returns `false` when the variant has no dense path; callers then fall
    /// back to the reference loop.
    #[inline]
    fn dense_accumulate(
        &self,
        _shape: &ProblemShape,
        _trans_b: bool,
        _a: &[Self::A],
        _b: &[Self::B],
        _c: &mut [Self::C],
    ) -> bool {
        false
    }
}

/// `DP`: f64 x f64 -> f64.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dp;

impl Variant for Dp {
    type A = f64;
    type B = f64;
    type C = f64;
    type Acc = f64;

    const PRECISION: Precision = Precision::F64;

    fn from_config(_cfg: &GemmConfig) -> Self {
        Dp
    }

    #[inline]
    fn fill_a(x: f64) -> f64 {
        x
    }

    #[inline]
    fn fill_b(x: f64) -> f64 {
        x
    }

    #[inline]
    fn product(&self, a: f64, b: f64) -> f64 {
        a * b
    }

    #[inline]
    fn load(&self, c: f64) -> f64 {
        c
    }

    #[inline]
    fn store(&self, acc: f64) -> f64 {
        acc
    }

    fn dense_accumulate(
        &self,
        shape: &ProblemShape,
        trans_b: bool,
        a: &[f64],
        b: &[f64],
        c: &mut [f64],
    ) -> bool {
        let (rsb, csb) = if trans_b { (shape.ldb, 1) } else { (1, shape.ldb) };
        matmul::gemm_f64(
            shape.m, shape.n, shape.k, 1.0, a, 1, shape.lda, b, rsb, csb, 1.0, c, 1, shape.ldc,
        );
        true
    }
}

/// `SP`: f32 x f32 -> f32.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sp;

impl Variant for Sp {
    type A = f32;
    type B = f32;
    type C = f32;
    type Acc = f32;

    const PRECISION: Precision = Precision::F32;

    fn from_config(_cfg: &GemmConfig) -> Self {
        Sp
    }

    #[inline]
    fn fill_a(x: f64) -> f32 {
        x as f32
    }

    #[inline]
    fn fill_b(x: f64) -> f32 {
        x as f32
    }

    #[inline]
    fn product(&self, a: f32, b: f32) -> f32 {
        a * b
    }

    #[inline]
    fn load(&self, c: f32) -> f32 {
        c
    }

    #[inline]
    fn store(&self, acc: f32) -> f32 {
        acc
    }

    fn dense_accumulate(
        &self,
        shape: &ProblemShape,
        trans_b: bool,
        a: &[f32],
        b: &[f32],
        c: &mut [f32],
    ) -> bool {
        let (rsb, csb) = if trans_b { (shape.ldb, 1) } else { (1, shape.ldb) };
        matmul::gemm_f32(
            shape.m, shape.n, shape.k, 1.0, a, 1, shape.lda, b, rsb, csb, 1.0, c, 1, shape.ldc,
        );
        true
    }
}

/// Integer variants with a plain widening product and an `i32` C.
macro_rules! int_variant {
    ($(#[$doc:meta])* $name:ident, $prec:expr, $a:ty, $b:ty, $scale:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Variant for $name {
            type A = $a;
            type B = $b;
            type C = i32;
            type Acc = i32;

            const PRECISION: Precision = $prec;

            fn from_config(_cfg: &GemmConfig) -> Self {
                $name
            }

            #[inline]
            fn fill_a(x: f64) -> $a {
                (x * $scale) as $a
            }

            #[inline]
            fn fill_b(x: f64) -> $b {
                (x * $scale) as $b
            }

            #[inline]
            fn product(&self, a: $a, b: $b) -> i32 {
                i32::from(a) * i32::from(b)
            }

            #[inline]
            fn load(&self, c: i32) -> i32 {
                c
            }

            #[inline]
            fn store(&self, acc: i32) -> i32 {
                acc
            }
        }
    };
}

int_variant!(
    /// `I16I32`: i16 x i16 -> i32, K-block 2.
    I16I32,
    Precision::I16I32,
    i16,
    i16,
    10.0
);
int_variant!(
    /// `USI8I32`: u8 x i8 -> i32, K-block 4.
    Usi8I32,
    Precision::U8I32,
    u8,
    i8,
    5.0
);
int_variant!(
    /// `SUI8I32`: i8 x u8 -> i32, K-block 4.
    Sui8I32,
    Precision::S8I32,
    i8,
    u8,
    5.0
);

/// `SUI8UI8`: i8 x u8 reduced in i32, scaled and narrowed to u8 per batch entry.
#[derive(Debug, Clone, Copy)]
pub struct Sui8Ui8 {
    pub scale: f32,
}

impl Default for Sui8Ui8 {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl Sui8Ui8 {
    /// Scale, truncate toward zero, keep the low byte.
    #[inline]
    pub fn narrow(acc: i32, scale: f32) -> u8 {
        ((acc as f32 * scale) as i32) as u8
    }
}

impl Variant for Sui8Ui8 {
    type A = i8;
    type B = u8;
    type C = u8;
    type Acc = i32;

    const PRECISION: Precision = Precision::S8U8;
    const CELL: CellMode = CellMode::PerBatch;

    fn from_config(cfg: &GemmConfig) -> Self {
        Self { scale: cfg.scale }
    }

    #[inline]
    fn fill_a(x: f64) -> i8 {
        (x * 2.0) as i8
    }

    #[inline]
    fn fill_b(x: f64) -> u8 {
        (x * 2.0) as u8
    }

    #[inline]
    fn product(&self, a: i8, b: u8) -> i32 {
        i32::from(a) * i32::from(b)
    }

    #[inline]
    fn load(&self, c: u8) -> i32 {
        i32::from(c)
    }

    #[inline]
    fn store(&self, acc: i32) -> u8 {
        Self::narrow(acc, self.scale)
    }
}

macro_rules! bf16_variant {
    ($(#[$doc:meta])* $name:ident, $prec:expr, $cell:expr, $c:ty, $load:expr, $store:expr, $after:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Variant for $name {
            type A = bf16;
            type B = bf16;
            type C = $c;
            type Acc = f32;

            const PRECISION: Precision = $prec;
            const CELL: CellMode = $cell;

            fn from_config(_cfg: &GemmConfig) -> Self {
                $name
            }

            #[inline]
            fn fill_a(x: f64) -> bf16 {
                codec::truncate(x as f32)
            }

            #[inline]
            fn fill_b(x: f64) -> bf16 {
                codec::truncate(x as f32)
            }

            #[inline]
            fn product(&self, a: bf16, b: bf16) -> f32 {
                codec::widen(a) * codec::widen(b)
            }

            #[inline]
            fn load(&self, c: $c) -> f32 {
                $load(c)
            }

            #[inline]
            fn store(&self, acc: f32) -> $c {
                $store(acc)
            }

            #[inline]
            fn after_block(&self, acc: f32) -> f32 {
                $after(acc)
            }
        }
    };
}

#[inline]
fn keep(x: f32) -> f32 {
    x
}

bf16_variant!(
    /// `BF16F32`: VNNI-packed bf16 inputs, f32 C.
    Bf16F32,
    Precision::Bf16F32,
    CellMode::Direct,
    f32,
    keep,
    keep,
    keep
);
bf16_variant!(
    /// `BF16`: VNNI-packed bf16 inputs, bf16 C, running sum truncated after every K-block.
    Bf16Bf16,
    Precision::Bf16Bf16,
    CellMode::PerBatch,
    bf16,
    codec::widen,
    codec::truncate,
    codec::round_trip
);
bf16_variant!(
    /// `BF16F32_FLAT`: flat bf16 inputs, f32 C.
    Bf16F32Flat,
    Precision::Bf16F32Flat,
    CellMode::Direct,
    f32,
    keep,
    keep,
    keep
);
bf16_variant!(
    /// `BF16_FLAT`: flat bf16 inputs, bf16 C truncated once after all batch entries.
    Bf16Bf16Flat,
    Precision::Bf16Bf16Flat,
    CellMode::Deferred,
    bf16,
    codec::widen,
    codec::truncate,
    keep
);
