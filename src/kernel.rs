//! The kernel seam.
//!
//! The harness never computes the GEMM under test itself. It asks a
//! [`Dispatcher`] for a kernel matching a [`KernelDescriptor`], then calls it
//! through [`GemmKernel::invoke`] with one of the four batch descriptions in
//! [`KernelCall`]. A dispatcher returning `None` is the null-handle case and
//! aborts the run.
//!
//! Register-tile configuration (for targets with matrix tiles) is a separate,
//! optional pair of calls exposed through [`TileConfig`].

use crate::{BatchMode, GemmConfig, Precision, PrefetchMode, ProblemShape};
use crate::variant::Variant;

/// Generation flags passed to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KernelFlags {
    pub trans_a: bool,
    pub trans_b: bool,
    pub aligned_a: bool,
    pub aligned_c: bool,
    pub a_unsigned: bool,
    pub b_unsigned: bool,
    pub c_unsigned: bool,
    pub vnni_a: bool,
    /// Beta is zero: the kernel overwrites C instead of accumulating.
    pub beta_zero: bool,
    /// Do not configure tiles inside the kernel.
    pub no_setup_tile_config: bool,
    /// Do not release tiles inside the kernel.
    pub no_reset_tile_config: bool,
}

/// Everything a dispatcher needs to generate (or look up) a kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelDescriptor {
    pub precision: Precision,
    pub shape: ProblemShape,
    pub batch: BatchMode,
    /// Batch count hint used when unrolling the batch loop.
    pub batch_count: usize,
    pub unroll: bool,
    /// Byte distance between consecutive A batch entries (`Strided` only, else 0).
    pub a_stride_bytes: usize,
    /// Byte distance between consecutive B batch entries (`Strided` only, else 0).
    pub b_stride_bytes: usize,
    pub prefetch: PrefetchMode,
    pub flags: KernelFlags,
}

impl KernelDescriptor {
    /// Descriptor for the main kernel of one shape.
    pub fn new(
        precision: Precision,
        shape: &ProblemShape,
        cfg: &GemmConfig,
        element_sizes: (usize, usize),
        tile_config: bool,
    ) -> Self {
        let (a_size, b_size) = element_sizes;
        let (a_stride_bytes, b_stride_bytes) = if cfg.batch == BatchMode::Strided {
            (
                shape.a_batch_stride() * a_size,
                shape.b_batch_stride(cfg.trans_b) * b_size,
            )
        } else {
            (0, 0)
        };
        Self {
            precision,
            shape: *shape,
            batch: cfg.batch,
            batch_count: cfg.batch_count,
            unroll: cfg.batch_unroll,
            a_stride_bytes,
            b_stride_bytes,
            prefetch: cfg.prefetch,
            flags: KernelFlags {
                trans_a: cfg.trans_a,
                trans_b: cfg.trans_b,
                aligned_a: cfg.aligned_a,
                aligned_c: cfg.aligned_c,
                a_unsigned: precision.a_unsigned(),
                b_unsigned: precision.b_unsigned(),
                c_unsigned: precision.c_unsigned(),
                vnni_a: precision.vnni_packed(),
                beta_zero: cfg.beta == 0.0,
                no_setup_tile_config: tile_config,
                no_reset_tile_config: tile_config,
            },
        }
    }
}

/// Properties the kernel reports after dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KernelInfo {
    pub prefetch: PrefetchMode,
}

/// Addresses of the next operands, for kernels that prefetch.
///
/// Hints are never dereferenced by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchHint {
    pub a: *const u8,
    pub b: *const u8,
    pub c: *const u8,
}

/// One call's worth of A/B operands.
#[derive(Debug, Clone, Copy)]
pub enum KernelCall<'a, A, B> {
    /// A single A/B pair.
    Plain { a: &'a [A], b: &'a [B] },
    /// One slice per batch entry, each starting at that entry.
    Address { a: &'a [&'a [A]], b: &'a [&'a [B]] },
    /// Base slices plus per-batch byte offsets.
    Offset {
        a: &'a [A],
        b: &'a [B],
        a_offsets: &'a [u64],
        b_offsets: &'a [u64],
    },
    /// Base slices; per-batch byte strides were fixed in the descriptor.
    Strided { a: &'a [A], b: &'a [B] },
}

impl<A, B> KernelCall<'_, A, B> {
    pub fn batch_mode(&self) -> BatchMode {
        match self {
            KernelCall::Plain { .. } => BatchMode::None,
            KernelCall::Address { .. } => BatchMode::AddressList,
            KernelCall::Offset { .. } => BatchMode::OffsetList,
            KernelCall::Strided { .. } => BatchMode::Strided,
        }
    }
}

/// A dispatched GEMM kernel for variant `V`.
pub trait GemmKernel<V: Variant> {
    fn info(&self) -> KernelInfo;

    /// Reduce `count` A/B products into `c`.
    fn invoke(
        &self,
        call: KernelCall<'_, V::A, V::B>,
        count: usize,
        c: &mut [V::C],
        prefetch: Option<PrefetchHint>,
    );
}

/// Configure-only / release-only calls bracketing a timed kernel loop.
pub trait TileConfig {
    fn configure(&self);
    fn release(&self);
}

/// Source of kernels.
pub trait Dispatcher {
    /// `None` means no kernel can be produced for this descriptor.
    fn dispatch<V: Variant>(
        &self,
        variant: &V,
        desc: &KernelDescriptor,
    ) -> Option<Box<dyn GemmKernel<V>>>;

    /// Tile configuration calls matching the main kernel of `desc`.
    fn dispatch_tile_config(&self, desc: &KernelDescriptor) -> Option<Box<dyn TileConfig>>;
}

/// Byte offset of every batch entry, computed once per shape.
pub fn batch_offsets(count: usize, stride_elems: usize, elem_size: usize) -> Vec<u64> {
    (0..count)
        .map(|r| (r * stride_elems * elem_size) as u64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strided_descriptor_carries_byte_strides() {
        let shape = ProblemShape::new(4, 6, 8, 5, 9, 4);
        let cfg = GemmConfig {
            batch: BatchMode::Strided,
            batch_count: 3,
            ..GemmConfig::default()
        };
        let desc = KernelDescriptor::new(Precision::F32, &shape, &cfg, (4, 4), false);
        assert_eq!(desc.a_stride_bytes, 5 * 8 * 4);
        assert_eq!(desc.b_stride_bytes, 9 * 6 * 4);

        let cfg = GemmConfig {
            trans_b: true,
            ..cfg
        };
        let desc = KernelDescriptor::new(Precision::F32, &shape, &cfg, (4, 4), false);
        assert_eq!(desc.b_stride_bytes, 9 * 8 * 4);
    }

    #[test]
    fn non_strided_descriptor_has_no_strides() {
        let shape = ProblemShape::square(8);
        let cfg = GemmConfig {
            batch: BatchMode::OffsetList,
            batch_count: 2,
            ..GemmConfig::default()
        };
        let desc = KernelDescriptor::new(Precision::F64, &shape, &cfg, (8, 8), false);
        assert_eq!((desc.a_stride_bytes, desc.b_stride_bytes), (0, 0));
    }

    #[test]
    fn flags_follow_precision() {
        let shape = ProblemShape::square(8);
        let cfg = GemmConfig::default();
        let desc = KernelDescriptor::new(Precision::S8U8, &shape, &cfg, (1, 1), true);
        assert!(desc.flags.b_unsigned && desc.flags.c_unsigned && desc.flags.vnni_a);
        assert!(!desc.flags.a_unsigned);
        assert!(desc.flags.no_setup_tile_config && desc.flags.no_reset_tile_config);
        assert!(desc.flags.beta_zero);

        let desc = KernelDescriptor::new(Precision::Bf16Bf16Flat, &shape, &cfg, (2, 2), false);
        assert!(!desc.flags.vnni_a);
    }

    #[test]
    fn offsets_are_bytes() {
        assert_eq!(batch_offsets(3, 10, 2), vec![0, 20, 40]);
    }
}
