//! Portable host backend.
//!
//! [`HostDispatcher`] serves every precision on any CPU. Its kernels read the
//! batch descriptors exactly as a generated kernel would and compute with the
//! variant's arithmetic (`SP`/`DP` go through [`crate::matmul`]). It exists so
//! the harness runs end to end without an external kernel library.

use std::mem::size_of;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

use crate::kernel::{
    Dispatcher, GemmKernel, KernelCall, KernelDescriptor, KernelInfo, PrefetchHint, TileConfig,
};
use crate::reference::reduce_batches;
use crate::variant::Variant;
use crate::{BatchMode, ProblemShape};

/// Counts of tile configure/release calls made through one dispatcher.
#[derive(Debug, Default)]
pub struct TileCounters {
    configured: AtomicUsize,
    released: AtomicUsize,
}

impl TileCounters {
    pub fn configured(&self) -> usize {
        self.configured.load(Ordering::Relaxed)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct HostDispatcher {
    tiles: Arc<TileCounters>,
}

impl HostDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tile_counters(&self) -> &TileCounters {
        &self.tiles
    }
}

impl Dispatcher for HostDispatcher {
    fn dispatch<V: Variant>(
        &self,
        variant: &V,
        desc: &KernelDescriptor,
    ) -> Option<Box<dyn GemmKernel<V>>> {
        let precision = V::PRECISION;
        if desc.precision != precision {
            return None;
        }
        if desc.shape.k % precision.k_block() != 0 {
            return None;
        }
        if desc.flags.trans_a || (desc.flags.trans_b && !precision.supports_trans_b()) {
            return None;
        }
        if desc.shape.validate(desc.flags.trans_b).is_err() {
            return None;
        }
        Some(Box::new(HostKernel {
            variant: variant.clone(),
            shape: desc.shape,
            trans_b: desc.flags.trans_b,
            beta_zero: desc.flags.beta_zero,
            batch: desc.batch,
            a_stride: desc.a_stride_bytes / size_of::<V::A>(),
            b_stride: desc.b_stride_bytes / size_of::<V::B>(),
            info: KernelInfo {
                prefetch: desc.prefetch,
            },
        }))
    }

    fn dispatch_tile_config(&self, desc: &KernelDescriptor) -> Option<Box<dyn TileConfig>> {
        if !desc.precision.uses_tile_config() {
            return None;
        }
        Some(Box::new(HostTileConfig {
            tiles: Arc::clone(&self.tiles),
        }))
    }
}

struct HostTileConfig {
    tiles: Arc<TileCounters>,
}

impl TileConfig for HostTileConfig {
    fn configure(&self) {
        self.tiles.configured.fetch_add(1, Ordering::Relaxed);
        trace!("tile configure");
    }

    fn release(&self) {
        self.tiles.released.fetch_add(1, Ordering::Relaxed);
        trace!("tile release");
    }
}

struct HostKernel<V> {
    variant: V,
    shape: ProblemShape,
    trans_b: bool,
    beta_zero: bool,
    batch: BatchMode,
    a_stride: usize,
    b_stride: usize,
    info: KernelInfo,
}

impl<V: Variant> HostKernel<V> {
    fn run<'a, I>(&self, batches: I, c: &mut [V::C])
    where
        I: IntoIterator<Item = (&'a [V::A], &'a [V::B])>,
    {
        if self.beta_zero {
            let ProblemShape { m, n, ldc, .. } = self.shape;
            for j in 0..n {
                c[j * ldc..j * ldc + m].fill(V::C::default());
            }
        }
        // Batch entries without a dense path are reduced together, which keeps
        // deferred variants storing C once per call.
        let mut rest = Vec::new();
        for (a, b) in batches {
            if !self.variant.dense_accumulate(&self.shape, self.trans_b, a, b, c) {
                rest.push((a, b));
            }
        }
        if !rest.is_empty() {
            reduce_batches(&self.variant, &self.shape, self.trans_b, rest, c);
        }
    }
}

impl<V: Variant> GemmKernel<V> for HostKernel<V> {
    fn info(&self) -> KernelInfo {
        self.info
    }

    fn invoke(
        &self,
        call: KernelCall<'_, V::A, V::B>,
        count: usize,
        c: &mut [V::C],
        _prefetch: Option<PrefetchHint>,
    ) {
        debug_assert_eq!(call.batch_mode(), self.batch, "call does not match dispatch");
        trace!(batch = %self.batch, count, "host kernel");
        match call {
            KernelCall::Plain { a, b } => self.run([(a, b)], c),
            KernelCall::Address { a, b } => {
                assert!(a.len() >= count && b.len() >= count, "address list too short");
                self.run(a.iter().copied().zip(b.iter().copied()).take(count), c)
            }
            KernelCall::Offset {
                a,
                b,
                a_offsets,
                b_offsets,
            } => {
                let a_size = size_of::<V::A>() as u64;
                let b_size = size_of::<V::B>() as u64;
                let batches = a_offsets
                    .iter()
                    .zip(b_offsets)
                    .take(count)
                    .map(|(&ao, &bo)| {
                        (&a[(ao / a_size) as usize..], &b[(bo / b_size) as usize..])
                    });
                self.run(batches, c)
            }
            KernelCall::Strided { a, b } => {
                let batches =
                    (0..count).map(|r| (&a[r * self.a_stride..], &b[r * self.b_stride..]));
                self.run(batches, c)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::{Dp, I16I32};
    use crate::{GemmConfig, Precision};

    fn descriptor(
        precision: Precision,
        shape: &ProblemShape,
        cfg: &GemmConfig,
    ) -> KernelDescriptor {
        KernelDescriptor::new(precision, shape, cfg, (8, 8), false)
    }

    #[test]
    fn refuses_k_not_multiple_of_block() {
        let shape = ProblemShape::new(4, 4, 3, 4, 3, 4);
        let cfg = GemmConfig::default();
        let desc = KernelDescriptor::new(Precision::I16I32, &shape, &cfg, (2, 2), false);
        assert!(HostDispatcher::new().dispatch(&I16I32, &desc).is_none());
    }

    #[test]
    fn refuses_mismatched_precision() {
        let shape = ProblemShape::square(4);
        let desc = descriptor(Precision::F32, &shape, &GemmConfig::default());
        assert!(HostDispatcher::new().dispatch(&Dp, &desc).is_none());
    }

    #[test]
    fn beta_zero_overwrites_beta_one_accumulates() {
        let shape = ProblemShape::square(1);
        let host = HostDispatcher::new();

        let overwrite = descriptor(Precision::F64, &shape, &GemmConfig::default());
        let kernel = host.dispatch(&Dp, &overwrite).unwrap();
        let mut c = [100.0];
        kernel.invoke(KernelCall::Plain { a: &[2.0], b: &[3.0] }, 1, &mut c, None);
        kernel.invoke(KernelCall::Plain { a: &[2.0], b: &[3.0] }, 1, &mut c, None);
        assert_eq!(c, [6.0]);

        let cfg = GemmConfig {
            beta: 1.0,
            ..GemmConfig::default()
        };
        let accumulate = descriptor(Precision::F64, &shape, &cfg);
        let kernel = host.dispatch(&Dp, &accumulate).unwrap();
        kernel.invoke(KernelCall::Plain { a: &[2.0], b: &[3.0] }, 1, &mut c, None);
        assert_eq!(c, [12.0]);
    }

    #[test]
    fn offsets_and_strides_select_batch_entries() {
        let shape = ProblemShape::square(1);
        let a = [1.0, 2.0, 3.0];
        let b = [10.0, 20.0, 30.0];
        let host = HostDispatcher::new();

        let cfg = GemmConfig {
            batch: BatchMode::OffsetList,
            batch_count: 2,
            ..GemmConfig::default()
        };
        let kernel = host.dispatch(&Dp, &descriptor(Precision::F64, &shape, &cfg)).unwrap();
        let mut c = [0.0];
        let call = KernelCall::Offset {
            a: &a,
            b: &b,
            a_offsets: &[8, 16],
            b_offsets: &[0, 8],
        };
        kernel.invoke(call, 2, &mut c, None);
        assert_eq!(c, [2.0 * 10.0 + 3.0 * 20.0]);

        let cfg = GemmConfig {
            batch: BatchMode::Strided,
            batch_count: 3,
            ..GemmConfig::default()
        };
        let kernel = host.dispatch(&Dp, &descriptor(Precision::F64, &shape, &cfg)).unwrap();
        let mut c = [0.0];
        kernel.invoke(KernelCall::Strided { a: &a, b: &b }, 3, &mut c, None);
        assert_eq!(c, [10.0 + 40.0 + 90.0]);
    }

    #[test]
    fn tile_config_only_for_low_precision() {
        let host = HostDispatcher::new();
        let shape = ProblemShape::square(4);
        let cfg = GemmConfig::default();
        assert!(host
            .dispatch_tile_config(&descriptor(Precision::F64, &shape, &cfg))
            .is_none());
        let tiles = host
            .dispatch_tile_config(&descriptor(Precision::Bf16Bf16, &shape, &cfg))
            .unwrap();
        tiles.configure();
        tiles.release();
        assert_eq!(host.tile_counters().configured(), 1);
        assert_eq!(host.tile_counters().released(), 1);
    }
}
