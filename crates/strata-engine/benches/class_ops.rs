use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use strata_engine::{ClassBuilder, Environment, SlotBuilder};

/// Linear chain C0 <- C1 <- ... with one slot per class
fn chain(depth: usize) -> Environment {
    let mut env = Environment::new();
    for i in 0..depth {
        let mut class = ClassBuilder::new(format!("C{}", i)).slot(SlotBuilder::new(format!("s{}", i)));
        if i > 0 {
            class = class.superclass(format!("C{}", i - 1));
        }
        env.define_class(class).unwrap();
    }
    env
}

fn bench_define(c: &mut Criterion) {
    let mut group = c.benchmark_group("define_chain");
    for depth in [8, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter(|| chain(black_box(depth)));
        });
    }
    group.finish();
}

fn bench_slot_lookup(c: &mut Criterion) {
    let env = chain(64);
    let leaf = "C63";
    c.bench_function("slot_exists_inherited", |b| {
        b.iter(|| env.slot_exists(black_box(leaf), black_box("s0"), true).unwrap());
    });
    c.bench_function("slot_facets", |b| {
        b.iter(|| env.slot_facets(black_box(leaf), black_box("s31")).unwrap());
    });
}

fn bench_image(c: &mut Criterion) {
    let env = chain(64);
    let mut bytes = Vec::new();
    env.save_image(&mut bytes).unwrap();

    c.bench_function("image_save", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(bytes.len());
            env.save_image(&mut out).unwrap();
            out
        });
    });
    c.bench_function("image_load", |b| {
        b.iter(|| {
            let mut loaded = Environment::new();
            loaded.load_image(&mut black_box(bytes.as_slice())).unwrap();
            loaded
        });
    });
}

criterion_group!(benches, bench_define, bench_slot_lookup, bench_image);
criterion_main!(benches);
