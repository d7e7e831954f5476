//! Precision variants.
//!
//! A [`Precision`] names the storage types of A, B and C, the reduction-dimension
//! blocking (VNNI packing) the kernel expects, and which reference arithmetic
//! applies. The arithmetic itself lives in [`crate::variant`]; this module only
//! holds the tag and its static properties.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Precision {
    /// f64 x f64 -> f64.
    #[cfg_attr(feature = "serde", serde(rename = "DP"))]
    F64,
    /// f32 x f32 -> f32.
    #[cfg_attr(feature = "serde", serde(rename = "SP"))]
    F32,
    /// i16 x i16 -> i32, K-block 2.
    I16I32,
    /// u8 (A) x i8 (B) -> i32, K-block 4.
    #[cfg_attr(feature = "serde", serde(rename = "USI8I32"))]
    U8I32,
    /// i8 (A) x u8 (B) -> i32, K-block 4.
    #[cfg_attr(feature = "serde", serde(rename = "SUI8I32"))]
    S8I32,
    /// i8 (A) x u8 (B) -> u8 through a scaled, narrowed i32 sum, K-block 4.
    #[cfg_attr(feature = "serde", serde(rename = "SUI8UI8"))]
    S8U8,
    /// bf16 x bf16 -> f32, VNNI packed, K-block 2.
    #[cfg_attr(feature = "serde", serde(rename = "BF16F32"))]
    Bf16F32,
    /// bf16 x bf16 -> bf16, VNNI packed, K-block 2.
    #[cfg_attr(feature = "serde", serde(rename = "BF16"))]
    Bf16Bf16,
    /// bf16 x bf16 -> f32, flat layout.
    #[cfg_attr(feature = "serde", serde(rename = "BF16F32_FLAT", alias = "BF1632_FLAT"))]
    Bf16F32Flat,
    /// bf16 x bf16 -> bf16, flat layout.
    #[cfg_attr(feature = "serde", serde(rename = "BF16_FLAT"))]
    Bf16Bf16Flat,
}

impl Precision {
    pub const ALL: [Precision; 10] = [
        Precision::F64,
        Precision::F32,
        Precision::I16I32,
        Precision::U8I32,
        Precision::S8I32,
        Precision::S8U8,
        Precision::Bf16F32,
        Precision::Bf16Bf16,
        Precision::Bf16F32Flat,
        Precision::Bf16Bf16Flat,
    ];

    /// Name used on the command line and in report lines.
    pub fn name(self) -> &'static str {
        match self {
            Precision::F64 => "DP",
            Precision::F32 => "SP",
            Precision::I16I32 => "I16I32",
            Precision::U8I32 => "USI8I32",
            Precision::S8I32 => "SUI8I32",
            Precision::S8U8 => "SUI8UI8",
            Precision::Bf16F32 => "BF16F32",
            Precision::Bf16Bf16 => "BF16",
            Precision::Bf16F32Flat => "BF16F32_FLAT",
            Precision::Bf16Bf16Flat => "BF16_FLAT",
        }
    }

    /// Number of reduction-dimension elements packed together per row of A.
    #[inline]
    pub fn k_block(self) -> usize {
        match self {
            Precision::I16I32 | Precision::Bf16F32 | Precision::Bf16Bf16 => 2,
            Precision::U8I32 | Precision::S8I32 | Precision::S8U8 => 4,
            Precision::F64 | Precision::F32 | Precision::Bf16F32Flat | Precision::Bf16Bf16Flat => {
                1
            }
        }
    }

    /// Whether A is stored VNNI-packed (`k_block() > 1`).
    #[inline]
    pub fn vnni_packed(self) -> bool {
        self.k_block() > 1
    }

    /// Real-valued variants get the full [`crate::MatDiff`] statistics.
    #[inline]
    pub fn is_real(self) -> bool {
        matches!(self, Precision::F64 | Precision::F32)
    }

    /// Only the f32/f64 paths have a transposed-B reference.
    #[inline]
    pub fn supports_trans_b(self) -> bool {
        self.is_real()
    }

    /// Tile configuration bracketing applies to the low-precision kernels only.
    #[inline]
    pub fn uses_tile_config(self) -> bool {
        !self.is_real()
    }

    /// A holds unsigned bytes.
    #[inline]
    pub fn a_unsigned(self) -> bool {
        matches!(self, Precision::U8I32)
    }

    /// B holds unsigned bytes.
    #[inline]
    pub fn b_unsigned(self) -> bool {
        matches!(self, Precision::S8I32 | Precision::S8U8)
    }

    /// C holds unsigned bytes.
    #[inline]
    pub fn c_unsigned(self) -> bool {
        matches!(self, Precision::S8U8)
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Precision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "DP" => Ok(Precision::F64),
            "SP" => Ok(Precision::F32),
            "I16I32" => Ok(Precision::I16I32),
            "USI8I32" => Ok(Precision::U8I32),
            "SUI8I32" => Ok(Precision::S8I32),
            "SUI8UI8" => Ok(Precision::S8U8),
            "BF16F32" => Ok(Precision::Bf16F32),
            "BF16" => Ok(Precision::Bf16Bf16),
            // Older usage text spells this one without the F.
            "BF16F32_FLAT" | "BF1632_FLAT" => Ok(Precision::Bf16F32Flat),
            "BF16_FLAT" => Ok(Precision::Bf16Bf16Flat),
            other => Err(Error::InvalidData(format!(
                "unknown precision {other:?}, expected one of SP, DP, I16I32, USI8I32, \
                 SUI8I32, SUI8UI8, BF16F32, BF16, BF16F32_FLAT, BF16_FLAT"
            ))),
        }
    }
}
