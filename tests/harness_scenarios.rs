use xgemm::kernel::{GemmKernel, KernelDescriptor, TileConfig};
use xgemm::metrics::{THRESHOLD_BATCHED, THRESHOLD_PLAIN, max_abs_diff};
use xgemm::operand::OperandSet;
use xgemm::reference::reference;
use xgemm::variant::{Sui8Ui8, Variant};
use xgemm::{
    BatchMode, Dispatcher, Error, GemmConfig, HarnessBuilder, HostDispatcher, Precision,
    ProblemShape,
};

fn harness(precision: Precision, cfg: GemmConfig, reps: usize, seed: u64) -> xgemm::Harness {
    HarnessBuilder::new(precision)
        .config(cfg)
        .unwrap()
        .reps(reps)
        .unwrap()
        .build_with_seed(HostDispatcher::new(), seed)
        .unwrap()
}

#[test]
fn dp_single_shape_passes() {
    let mut h = harness(Precision::F64, GemmConfig::default(), 1, 0);
    let report = h.run_shape(&ProblemShape::square(64)).unwrap();
    let err = report.max_error().unwrap();
    assert!(err < THRESHOLD_PLAIN, "max error {err}");
    assert!(report.check.as_ref().unwrap().diff.is_some());

    let summary = h.finish();
    assert_eq!(summary.threshold, THRESHOLD_PLAIN);
    assert!(summary.passed);
}

#[test]
fn every_precision_passes_on_the_host_backend() {
    for precision in Precision::ALL {
        let cfg = GemmConfig {
            beta: 1.0,
            batch: BatchMode::Strided,
            batch_count: 3,
            ..GemmConfig::default()
        };
        let mut h = harness(precision, cfg, 2, 7);
        h.run_shape(&ProblemShape::new(16, 12, 8, 20, 8, 18)).unwrap();
        let summary = h.finish();
        assert_eq!(summary.threshold, THRESHOLD_BATCHED);
        assert!(summary.passed, "{precision}: {}", summary.total_max_error);
    }
}

#[test]
fn bf16_host_kernel_matches_reference_exactly() {
    // The host kernel shares the reference arithmetic, so this checks that the
    // descriptor and operand plumbing feed it the same entries.
    for precision in [Precision::Bf16Bf16, Precision::Bf16Bf16Flat] {
        let mut h = harness(precision, GemmConfig::default(), 1, 3);
        let report = h.run_shape(&ProblemShape::square(64)).unwrap();
        assert_eq!(report.max_error(), Some(0.0), "{precision}");
        assert!(report.check.as_ref().unwrap().diff.is_none());
    }
}

#[test]
fn sui8ui8_zero_operands_give_zero_output() {
    let shape = ProblemShape::square(16);
    let cfg = GemmConfig::default();
    let variant = Sui8Ui8::from_config(&cfg);
    let mut ops = OperandSet::<Sui8Ui8>::allocate(&shape, false, 1).unwrap();

    xgemm::invoke::run_kernel(
        &HostDispatcher::new(),
        &variant,
        &shape,
        &cfg,
        false,
        1,
        &mut ops,
    )
    .unwrap();
    reference(&variant, &shape, false, 1, 1, &ops.a, &ops.b, &mut ops.c_gold);

    assert!(ops.c.iter().all(|&x| x == 0));
    assert_eq!(max_abs_diff(&shape, &ops.c_gold, &ops.c), 0.0);
}

#[test]
fn same_seed_gives_same_errors() {
    let shapes = [ProblemShape::square(24), ProblemShape::new(8, 32, 16, 9, 16, 8)];
    let run = |seed| {
        let mut h = harness(Precision::F32, GemmConfig::default(), 1, seed);
        shapes
            .iter()
            .map(|s| h.run_shape(s).unwrap().max_error().unwrap())
            .collect::<Vec<_>>()
    };
    assert_eq!(run(42), run(42));
}

#[test]
fn repeated_shape_keeps_the_verdict() {
    let mut h = harness(Precision::F64, GemmConfig::default(), 1, 0);
    let shape = ProblemShape::square(32);
    h.run_shape(&shape).unwrap();
    let first = h.errors().max();
    h.run_shape(&shape).unwrap();
    assert_eq!(h.errors().shapes(), 2);
    assert!(h.errors().max() < THRESHOLD_PLAIN);
    assert!(h.errors().max() >= first);
    assert!(h.finish().passed);
}

#[test]
fn single_batch_entry_is_mode_independent() {
    let shape = ProblemShape::new(12, 10, 8, 14, 9, 12);
    for precision in [Precision::F64, Precision::I16I32, Precision::Bf16F32] {
        let errors: Vec<_> = BatchMode::ALL
            .into_iter()
            .map(|batch| {
                let cfg = GemmConfig {
                    batch,
                    batch_count: 1,
                    ..GemmConfig::default()
                };
                let mut h = harness(precision, cfg, 1, 9);
                h.run_shape(&shape).unwrap().max_error().unwrap()
            })
            .collect();
        assert!(
            errors.windows(2).all(|w| w[0] == w[1]),
            "{precision}: {errors:?}"
        );
    }
}

#[test]
fn list_run_without_check_records_nothing() {
    let mut h = HarnessBuilder::new(Precision::F32)
        .run_check(false)
        .build_with_seed(HostDispatcher::new(), 0)
        .unwrap();
    let shapes = vec![Ok(ProblemShape::square(8)), Ok(ProblemShape::square(16))];
    let mut seen = 0;
    h.run_all(shapes, |report| {
        assert!(report.check.is_none());
        seen += 1;
    })
    .unwrap();
    assert_eq!(seen, 2);
    assert_eq!(h.errors().shapes(), 0);

    let summary = h.finish();
    assert_eq!(summary.total_max_error, 0.0);
    assert!(summary.passed);
}

#[test]
fn bad_k_is_fatal() {
    let mut h = harness(Precision::S8U8, GemmConfig::default(), 1, 0);
    let err = h.run_shape(&ProblemShape::new(8, 8, 6, 8, 8, 8)).unwrap_err();
    assert!(matches!(err, Error::InvalidShape(_)), "{err}");
    assert!(h.reports().is_empty());
}

#[test]
fn list_stops_at_the_first_bad_shape() {
    let mut h = harness(Precision::F64, GemmConfig::default(), 1, 0);
    let shapes = vec![
        Ok(ProblemShape::square(8)),
        Ok(ProblemShape::new(8, 8, 8, 4, 8, 8)),
        Ok(ProblemShape::square(8)),
    ];
    assert!(h.run_all(shapes, |_| {}).is_err());
    assert_eq!(h.reports().len(), 1);
}

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

#[test]
fn failed_dispatch_aborts_the_shape() {
    let mut h = HarnessBuilder::new(Precision::Bf16F32)
        .build_with_seed(NoKernels, 0)
        .unwrap();
    let err = h.run_shape(&ProblemShape::square(16)).unwrap_err();
    assert!(
        matches!(
            err,
            Error::DispatchFailed {
                precision: Precision::Bf16F32,
                batch: BatchMode::None
            }
        ),
        "{err}"
    );
    assert_eq!(h.errors().shapes(), 0);
}

mod batching {
    use proptest::prelude::*;
    use xgemm::invoke::run_kernel;
    use xgemm::operand::OperandSet;
    use xgemm::rng::OperandRng;
    use xgemm::variant::{Bf16Bf16Flat, I16I32, Variant};
    use xgemm::{BatchMode, GemmConfig, HostDispatcher, ProblemShape};

    fn kernel_output<V: Variant>(shape: &ProblemShape, batch: BatchMode, seed: u64) -> Vec<V::C> {
        let cfg = GemmConfig {
            batch,
            batch_count: 1,
            ..GemmConfig::default()
        };
        let mut rng = OperandRng::seed_from_u64(seed);
        let mut ops = OperandSet::<V>::generate(shape, false, 1, &mut rng).unwrap();
        let variant = V::from_config(&cfg);
        run_kernel(&HostDispatcher::new(), &variant, shape, &cfg, false, 1, &mut ops).unwrap();
        ops.c.to_vec()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn single_entry_modes_match_unbatched(
            m in 1_usize..12,
            n in 1_usize..12,
            k_blocks in 1_usize..6,
            pad in 0_usize..3,
            seed in any::<u64>(),
        ) {
            let k = k_blocks * 2;
            let shape = ProblemShape::new(m, n, k, m + pad, k + pad, m + pad);
            let plain = kernel_output::<I16I32>(&shape, BatchMode::None, seed);
            let flat = kernel_output::<Bf16Bf16Flat>(&shape, BatchMode::None, seed);
            for batch in [BatchMode::AddressList, BatchMode::OffsetList, BatchMode::Strided] {
                prop_assert_eq!(&kernel_output::<I16I32>(&shape, batch, seed), &plain);
                prop_assert_eq!(&kernel_output::<Bf16Bf16Flat>(&shape, batch, seed), &flat);
            }
        }
    }
}
