mod common;

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use velmesh::delaunay::tetrahedralize;

const COUNTS: [usize; 3] = [1_000, 5_000, 20_000];

fn random_points(count: usize, seed: u64) -> Vec<DVec3> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut unit = || rng.next_u32() as f64 / (u32::MAX as f64 + 1.0);
    (0..count)
        .map(|_| DVec3::new(unit(), unit(), unit()))
        .collect()
}

fn lattice_points(per_axis: usize) -> Vec<DVec3> {
    let mut points = Vec::with_capacity(per_axis.pow(3));
    for k in 0..per_axis {
        for j in 0..per_axis {
            for i in 0..per_axis {
                points.push(DVec3::new(i as f64, j as f64, k as f64));
            }
        }
    }
    points
}

fn delaunay_random_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("delaunay/random");
    for &count in &COUNTS {
        let points = random_points(count, 0xDE1A ^ count as u64);
        group.throughput(common::elements_throughput(count));
        group.bench_with_input(BenchmarkId::from_parameter(count), &points, |b, pts| {
            b.iter(|| {
                let tets = tetrahedralize(pts).expect("random points are not coplanar");
                black_box(tets.len());
            });
        });
    }
    group.finish();
}

fn delaunay_lattice_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("delaunay/lattice");
    for per_axis in [8usize, 16] {
        let points = lattice_points(per_axis);
        group.throughput(common::elements_throughput(points.len()));
        group.bench_with_input(
            BenchmarkId::from_parameter(points.len()),
            &points,
            |b, pts| {
                b.iter(|| {
                    let tets = tetrahedralize(pts).expect("lattice is not coplanar");
                    black_box(tets.len());
                });
            },
        );
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = common::default_criterion();
    targets = delaunay_random_benches, delaunay_lattice_benches
}
criterion_main!(benches);
