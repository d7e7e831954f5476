use criterion::{Criterion, black_box, criterion_group, criterion_main};

use xgemm::operand::OperandSet;
use xgemm::reference::reference;
use xgemm::rng::OperandRng;
use xgemm::variant::{Bf16Bf16, Dp, Sui8Ui8, Variant};
use xgemm::{GemmConfig, ProblemShape};

fn bench_variant<V: Variant>(c: &mut Criterion, name: &str) {
    let shape = ProblemShape::square(64);
    let batch_count = 4;
    let variant = V::from_config(&GemmConfig::default());
    let mut rng = OperandRng::seed_from_u64(0);
    let mut ops = OperandSet::<V>::generate(&shape, false, batch_count, &mut rng).unwrap();

    c.bench_function(name, |b| {
        b.iter(|| {
            reference(
                &variant,
                black_box(&shape),
                false,
                batch_count,
                1,
                &ops.a,
                &ops.b,
                &mut ops.c_gold,
            );
            black_box(&ops.c_gold);
        })
    });
}

fn reference_bench(c: &mut Criterion) {
    bench_variant::<Dp>(c, "reference_dp_64_br4");
    bench_variant::<Bf16Bf16>(c, "reference_bf16_64_br4");
    bench_variant::<Sui8Ui8>(c, "reference_sui8ui8_64_br4");
}

criterion_group!(benches, reference_bench);
criterion_main!(benches);
