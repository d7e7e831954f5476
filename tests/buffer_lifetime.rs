use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

use xgemm::buffer::BUFFER_ALIGN;
use xgemm::kernel::{GemmKernel, KernelDescriptor, TileConfig};
use xgemm::variant::Variant;
use xgemm::{
    BatchMode, Dispatcher, Error, GemmConfig, HarnessBuilder, HostDispatcher, Precision,
    ProblemShape,
};

/// Tracks allocations with the operand-buffer alignment; nothing else in the
/// crate asks for it.
struct CountingAlloc {
    operand_allocs: AtomicUsize,
    operand_live: AtomicUsize,
    operand_bytes: AtomicUsize,
}

impl CountingAlloc {
    const fn new() -> Self {
        Self {
            operand_allocs: AtomicUsize::new(0),
            operand_live: AtomicUsize::new(0),
            operand_bytes: AtomicUsize::new(0),
        }
    }

    fn reset(&self) {
        self.operand_allocs.store(0, Ordering::Relaxed);
        self.operand_bytes.store(0, Ordering::Relaxed);
    }

    fn snapshot(&self) -> AllocSnapshot {
        AllocSnapshot {
            allocs: self.operand_allocs.load(Ordering::Relaxed),
            live: self.operand_live.load(Ordering::Relaxed),
            bytes: self.operand_bytes.load(Ordering::Relaxed),
        }
    }

    fn track(&self, layout: Layout) {
        if layout.align() == BUFFER_ALIGN {
            self.operand_allocs.fetch_add(1, Ordering::Relaxed);
            self.operand_live.fetch_add(1, Ordering::Relaxed);
            self.operand_bytes.fetch_add(layout.size(), Ordering::Relaxed);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AllocSnapshot {
    allocs: usize,
    live: usize,
    bytes: usize,
}

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.track(layout);
        unsafe { System.alloc(layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        self.track(layout);
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if layout.align() == BUFFER_ALIGN {
            self.operand_live.fetch_sub(1, Ordering::Relaxed);
        }
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static ALLOC: CountingAlloc = CountingAlloc::new();

struct NoKernels;

impl Dispatcher for NoKernels {
    fn dispatch<V: Variant>(
        &self,
        _variant: &V,
        _desc: &KernelDescriptor,
    ) -> Option<Box<dyn GemmKernel<V>>> {
        None
    }

    fn dispatch_tile_config(&self, _desc: &KernelDescriptor) -> Option<Box<dyn TileConfig>> {
        None
    }
}

// A single test so the global counters see no concurrent harness.
#[test]
fn operand_buffers_live_for_one_shape_only() {
    let cfg = GemmConfig {
        beta: 1.0,
        batch: BatchMode::OffsetList,
        batch_count: 4,
        ..GemmConfig::default()
    };
    let mut h = HarnessBuilder::new(Precision::I16I32)
        .config(cfg)
        .unwrap()
        .reps(3)
        .unwrap()
        .build_with_seed(HostDispatcher::new(), 0)
        .unwrap();

    // A, B and both C buffers per shape, all gone once the shape returns.
    let shape = ProblemShape::new(32, 16, 8, 40, 8, 32);
    let elems = shape.a_len(4) * 2 + shape.b_len(4, false) * 2 + shape.c_len() * 4 * 2;
    for _ in 0..3 {
        ALLOC.reset();
        h.run_shape(&shape).unwrap();
        let after = ALLOC.snapshot();
        assert_eq!(after.allocs, 4, "{after:?}");
        assert_eq!(after.live, 0, "{after:?}");
        assert!(after.bytes >= elems, "{after:?}");
    }
    assert!(h.finish().passed);

    // Dispatch fails after the operands exist; they must still be released.
    let mut h = HarnessBuilder::new(Precision::F64)
        .build_with_seed(NoKernels, 0)
        .unwrap();
    ALLOC.reset();
    let err = h.run_shape(&ProblemShape::square(16)).unwrap_err();
    assert!(matches!(err, Error::DispatchFailed { .. }), "{err}");
    let after = ALLOC.snapshot();
    assert_eq!(after.allocs, 4, "{after:?}");
    assert_eq!(after.live, 0, "{after:?}");
}
