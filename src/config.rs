//! Run configuration.
//!
//! [`GemmConfig`] holds the per-invocation GEMM settings. Construction is plain
//! (all fields are public); [`GemmConfig::validate`] enforces the preconditions
//! and [`GemmConfig::normalize`] applies the batch-count rules before a run.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Precision, Result};

/// Environment variable naming the target hardware profile.
pub const TARGET_ENV: &str = "XGEMM_TARGET";

/// How the batch of A/B pairs is described to the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BatchMode {
    /// Plain GEMM, one A/B pair.
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "nobr"))]
    None,
    /// A list of per-batch base addresses, rebuilt before every call.
    #[cfg_attr(feature = "serde", serde(rename = "addrbr"))]
    AddressList,
    /// Base pointers plus per-batch byte offsets, computed once.
    #[cfg_attr(feature = "serde", serde(rename = "offsbr"))]
    OffsetList,
    /// Base pointers plus a fixed byte stride fixed at dispatch time.
    #[cfg_attr(feature = "serde", serde(rename = "strdbr"))]
    Strided,
}

impl BatchMode {
    pub const ALL: [BatchMode; 4] = [
        BatchMode::None,
        BatchMode::AddressList,
        BatchMode::OffsetList,
        BatchMode::Strided,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BatchMode::None => "nobr",
            BatchMode::AddressList => "addrbr",
            BatchMode::OffsetList => "offsbr",
            BatchMode::Strided => "strdbr",
        }
    }

    /// Numeric code used in list-mode report lines.
    pub fn code(self) -> u8 {
        match self {
            BatchMode::None => 0,
            BatchMode::AddressList => 1,
            BatchMode::OffsetList => 2,
            BatchMode::Strided => 3,
        }
    }

    #[inline]
    pub fn is_batched(self) -> bool {
        self != BatchMode::None
    }
}

impl fmt::Display for BatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BatchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BatchMode::ALL
            .into_iter()
            .find(|mode| mode.name() == s)
            .ok_or_else(|| {
                Error::InvalidData(format!(
                    "unknown batch mode {s:?}, expected nobr, addrbr, offsbr or strdbr"
                ))
            })
    }
}

/// Software prefetch strategy requested from the kernel generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrefetchMode {
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "nopf"))]
    None,
    /// Prefetch-capable call signature without any prefetch instructions.
    #[cfg_attr(feature = "serde", serde(rename = "pfsigonly"))]
    SigOnly,
    #[cfg_attr(feature = "serde", serde(rename = "BL2viaC"))]
    BL2ViaC,
    AL2,
    #[cfg_attr(feature = "serde", serde(rename = "curAL2"))]
    CurAL2,
    #[cfg_attr(feature = "serde", serde(rename = "AL2_BL2viaC"))]
    AL2BL2ViaC,
    #[cfg_attr(feature = "serde", serde(rename = "curAL2_BL2viaC"))]
    CurAL2BL2ViaC,
}

impl PrefetchMode {
    pub const ALL: [PrefetchMode; 7] = [
        PrefetchMode::None,
        PrefetchMode::SigOnly,
        PrefetchMode::BL2ViaC,
        PrefetchMode::AL2,
        PrefetchMode::CurAL2,
        PrefetchMode::AL2BL2ViaC,
        PrefetchMode::CurAL2BL2ViaC,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PrefetchMode::None => "nopf",
            PrefetchMode::SigOnly => "pfsigonly",
            PrefetchMode::BL2ViaC => "BL2viaC",
            PrefetchMode::AL2 => "AL2",
            PrefetchMode::CurAL2 => "curAL2",
            PrefetchMode::AL2BL2ViaC => "AL2_BL2viaC",
            PrefetchMode::CurAL2BL2ViaC => "curAL2_BL2viaC",
        }
    }
}

impl fmt::Display for PrefetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PrefetchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PrefetchMode::ALL
            .into_iter()
            .find(|mode| mode.name() == s)
            .ok_or_else(|| {
                Error::InvalidData(format!(
                    "unknown prefetch mode {s:?}, expected nopf, pfsigonly, BL2viaC, AL2, \
                     curAL2, AL2_BL2viaC or curAL2_BL2viaC"
                ))
            })
    }
}

/// Hardware profile selected through [`TARGET_ENV`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TargetProfile {
    name: Option<String>,
}

impl TargetProfile {
    pub fn from_env() -> Self {
        Self::named(std::env::var(TARGET_ENV).ok())
    }

    pub fn named(name: Option<String>) -> Self {
        Self { name }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether the target has register tiles that need explicit configuration.
    pub fn supports_tile_config(&self) -> bool {
        self.name.as_deref().is_some_and(|name| {
            let name = name.to_ascii_lowercase();
            name.contains("spr") || name.contains("amx")
        })
    }
}

/// GEMM settings shared by every shape of one run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GemmConfig {
    pub alpha: f64,
    pub beta: f64,
    pub trans_a: bool,
    pub trans_b: bool,
    /// Kernel hint only.
    pub aligned_a: bool,
    /// Kernel hint only.
    pub aligned_c: bool,
    pub prefetch: PrefetchMode,
    pub batch: BatchMode,
    pub batch_count: usize,
    /// Kernel hint only.
    pub batch_unroll: bool,
    pub tile_config: bool,
    /// Output scale of the `SUI8UI8` variant.
    pub scale: f32,
}

impl Default for GemmConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 0.0,
            trans_a: false,
            trans_b: false,
            aligned_a: true,
            aligned_c: true,
            prefetch: PrefetchMode::None,
            batch: BatchMode::None,
            batch_count: 1,
            batch_unroll: false,
            tile_config: false,
            scale: 1.0,
        }
    }
}

impl GemmConfig {
    /// Check the preconditions for running `precision` with this configuration.
    pub fn validate(&self, precision: Precision) -> Result<()> {
        if self.alpha != 1.0 {
            return Err(Error::InvalidConfig(format!(
                "alpha must be 1, got {}",
                self.alpha
            )));
        }
        if self.beta != 0.0 && self.beta != 1.0 {
            return Err(Error::InvalidConfig(format!(
                "beta must be 0 or 1, got {}",
                self.beta
            )));
        }
        if self.trans_a {
            return Err(Error::InvalidConfig(format!(
                "transposed A is not supported ({precision})"
            )));
        }
        if self.trans_b && !precision.supports_trans_b() {
            return Err(Error::InvalidConfig(format!(
                "transposed B is only supported for SP and DP, got {precision}"
            )));
        }
        if !(self.scale.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "scale must be finite, got {}",
                self.scale
            )));
        }
        Ok(())
    }

    /// Apply the batch-count rules: at least one batch, exactly one without batching.
    pub fn normalize(mut self) -> Self {
        if self.batch_count < 1 {
            self.batch_count = 1;
        }
        if self.batch == BatchMode::None {
            self.batch_count = 1;
            self.batch_unroll = false;
        }
        self
    }

    /// Number of passes the reference makes to mirror `reps` kernel calls.
    #[inline]
    pub fn reference_passes(&self, reps: usize) -> usize {
        if self.beta == 0.0 { 1 } else { reps }
    }
}
