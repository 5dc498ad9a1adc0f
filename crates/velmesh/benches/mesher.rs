mod common;

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::DVec3;
use velmesh::prelude::*;

fn mesher_box_benches(c: &mut Criterion) {
    let bbox = BoundingBox::new(DVec3::ZERO, DVec3::new(4.0, 1.0, 1.0));
    let size = SizeField::uniform(bbox, 0.15).expect("positive size");
    let options = BuildOptions::new(10).with_nscreen(0);

    let mut group = c.benchmark_group("mesher/box");
    for workers in [1usize, 2, 4] {
        let generator =
            MeshGenerator::new(&size).with_config(GeneratorConfig::new().with_workers(workers));
        let cells = generator.build(&options).expect("box meshes").cell_count();
        group.throughput(common::elements_throughput(cells));
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, _| {
            b.iter(|| {
                let mesh = generator.build(&options).expect("box meshes");
                black_box(mesh.cell_count());
            });
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = common::default_criterion();
    targets = mesher_box_benches
}
criterion_main!(benches);
