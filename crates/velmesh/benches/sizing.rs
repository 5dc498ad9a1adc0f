mod common;

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use velmesh::prelude::*;

const WORKERS: [usize; 3] = [1, 2, 4];

fn velocity(dims: GridDims) -> ScalarField {
    let bbox = BoundingBox::from_extents([-4000.0, 0.0, 0.0, 8000.0, 0.0, 8000.0]);
    let grid = GridSpec::new(bbox, dims).expect("valid grid");
    ScalarField::from_fn(grid, |p| {
        let depth = -p.x;
        1500.0 + 0.8 * depth + 400.0 * (p.y / 700.0).sin() * (p.z / 900.0).cos()
    })
}

fn sizing_build_benches(c: &mut Criterion) {
    let dims = GridDims::new(80, 80, 60);
    let field = velocity(dims);
    let mut group = c.benchmark_group("sizing/build");
    group.throughput(common::elements_throughput(dims.len()));

    for &workers in &WORKERS {
        let cfg = SizeFunctionConfig::new(*field.bbox(), dims)
            .with_hmin(25.0)
            .with_freq(4.0)
            .with_wl(10.0)
            .with_grade(0.1)
            .with_workers(workers);
        let builder = SizeFunctionBuilder::new(cfg);
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, _| {
            b.iter(|| {
                let size = builder.build(&field).expect("valid model");
                black_box(size.min_value());
            });
        });
    }
    group.finish();
}

fn sizing_eval_benches(c: &mut Criterion) {
    let dims = GridDims::new(40, 40, 30);
    let field = velocity(dims);
    let cfg = SizeFunctionConfig::new(*field.bbox(), dims)
        .with_hmin(25.0)
        .with_grade(0.1);
    let size = SizeFunctionBuilder::new(cfg)
        .build(&field)
        .expect("valid model");
    let bbox = *size.bbox();
    let queries: Vec<_> = (0..10_000)
        .map(|n| {
            let t = n as f64 / 10_000.0;
            bbox.min + bbox.extent() * glam::DVec3::new(t, (7.0 * t).fract(), (13.0 * t).fract())
        })
        .collect();

    let mut group = c.benchmark_group("sizing/eval");
    group.throughput(common::elements_throughput(queries.len()));
    group.bench_function("trilinear", |b| {
        b.iter(|| black_box(size.eval_many(&queries)));
    });
    group.finish();
}

criterion_group! {
    name = benches;
    config = common::default_criterion();
    targets = sizing_build_benches, sizing_eval_benches
}
criterion_main!(benches);
