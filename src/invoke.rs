//! Kernel invocation adapter.
//!
//! Turns a shape and configuration into the kernel's batch description and
//! calls it `reps` times. It never computes a GEMM itself.
//!
//! - `None`: one A/B pair at the buffer bases.
//! - `AddressList`: per-entry slices at `r*lda*k` and `r*ldb*n` (`r*ldb*k` when
//!   B is transposed), rebuilt before every call.
//! - `OffsetList`: byte offsets for the same positions, computed once per shape.
//! - `Strided`: base slices only; the byte strides went into the descriptor.
//!
//! When the kernel reports a prefetch mode other than `nopf`, every call also
//! passes the current operands as prefetch hints.

use std::mem::size_of;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::kernel::{Dispatcher, KernelCall, KernelDescriptor, PrefetchHint, batch_offsets};
use crate::operand::OperandSet;
use crate::variant::Variant;
use crate::{BatchMode, Error, GemmConfig, PrefetchMode, ProblemShape, Result, TargetProfile};

/// Wall-clock cost of one shape's kernel run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KernelTiming {
    /// Kernel (and tile-config) dispatch.
    pub dispatch: Duration,
    /// All `reps` kernel calls, excluding dispatch.
    pub run: Duration,
}

/// Whether tile configuration is used for this run.
///
/// A request on a target without register tiles is downgraded with a warning.
pub fn effective_tile_config(requested: bool, target: &TargetProfile) -> bool {
    if requested && !target.supports_tile_config() {
        warn!(
            target_profile = target.name().unwrap_or("<unset>"),
            "tile configuration requested but the target has no register tiles; disabled"
        );
        return false;
    }
    requested
}

/// Dispatch the kernel for `shape` and run it `reps` times on `ops`.
///
/// `tile_config` is the already-downgraded setting; it only takes effect for
/// precisions that use tiles.
#[allow(clippy::too_many_arguments)]
pub fn run_kernel<V: Variant, D: Dispatcher>(
    dispatcher: &D,
    variant: &V,
    shape: &ProblemShape,
    cfg: &GemmConfig,
    tile_config: bool,
    reps: usize,
    ops: &mut OperandSet<V>,
) -> Result<KernelTiming> {
    let precision = V::PRECISION;
    let tile_config = tile_config && precision.uses_tile_config();
    let desc = KernelDescriptor::new(
        precision,
        shape,
        cfg,
        (size_of::<V::A>(), size_of::<V::B>()),
        tile_config,
    );

    let start = Instant::now();
    let kernel = dispatcher
        .dispatch(variant, &desc)
        .ok_or(Error::DispatchFailed {
            precision,
            batch: cfg.batch,
        })?;
    let tiles = if tile_config {
        Some(
            dispatcher
                .dispatch_tile_config(&desc)
                .ok_or(Error::DispatchFailed {
                    precision,
                    batch: cfg.batch,
                })?,
        )
    } else {
        None
    };
    let dispatch = start.elapsed();

    let count = cfg.batch_count;
    let a_stride = shape.a_batch_stride();
    let b_stride = shape.b_batch_stride(cfg.trans_b);
    let prefetch = kernel.info().prefetch != PrefetchMode::None;
    debug!(
        %precision,
        batch = %cfg.batch,
        count,
        reps,
        prefetch,
        tile_config,
        "running kernel"
    );

    let (a_offsets, b_offsets) = if cfg.batch == BatchMode::OffsetList {
        (
            batch_offsets(count, a_stride, size_of::<V::A>()),
            batch_offsets(count, b_stride, size_of::<V::B>()),
        )
    } else {
        (Vec::new(), Vec::new())
    };

    let OperandSet { a, b, c, .. } = ops;
    let a: &[V::A] = a;
    let b: &[V::B] = b;
    let c: &mut [V::C] = c;

    if let Some(tiles) = &tiles {
        tiles.configure();
    }
    let start = Instant::now();
    for _ in 0..reps {
        let hint = prefetch.then(|| PrefetchHint {
            a: a.as_ptr().cast(),
            b: b.as_ptr().cast(),
            c: c.as_ptr().cast(),
        });
        match cfg.batch {
            BatchMode::None => kernel.invoke(KernelCall::Plain { a, b }, 1, c, hint),
            BatchMode::AddressList => {
                let a_list: Vec<&[V::A]> = (0..count).map(|r| &a[r * a_stride..]).collect();
                let b_list: Vec<&[V::B]> = (0..count).map(|r| &b[r * b_stride..]).collect();
                let call = KernelCall::Address {
                    a: &a_list,
                    b: &b_list,
                };
                kernel.invoke(call, count, c, hint);
            }
            BatchMode::OffsetList => {
                let call = KernelCall::Offset {
                    a,
                    b,
                    a_offsets: &a_offsets,
                    b_offsets: &b_offsets,
                };
                kernel.invoke(call, count, c, hint);
            }
            BatchMode::Strided => kernel.invoke(KernelCall::Strided { a, b }, count, c, hint),
        }
    }
    let run = start.elapsed();
    if let Some(tiles) = &tiles {
        tiles.release();
    }

    Ok(KernelTiming { dispatch, run })
}
