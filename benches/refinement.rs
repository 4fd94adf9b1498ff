//! Benchmarks for the refinement engine.
//!
//! - Full circumcenter refinement of a regular polygon at decreasing sizes
//! - Comparison of the four placement strategies on the same domain
//! - Circumcircle construction and the containment tests carving relies on

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use mesh2d::prelude::*;
use std::hint::black_box;

/// Regular polygon of radius 1 fanned from its first vertex.
fn polygon(sides: u32, size: f64) -> Mesh {
    let step = std::f64::consts::TAU / f64::from(sides);
    let contour = Contour::new(
        0,
        (0..sides)
            .map(|k| {
                let angle = step * f64::from(k);
                ContourPoint::new([angle.cos(), angle.sin()], size)
            })
            .collect(),
    );
    let last = usize::try_from(sides).expect("side count fits in usize") - 1;
    let seeds: Vec<SeedTriangle> = (1..last)
        .map(|k| SeedTriangle::new([0, k, k + 1], TrianglePosition::Intern))
        .collect();
    Mesh::from_contours(&[contour], &seeds).expect("polygon fixture is valid")
}

/// Regular polygon whose sides are no longer than `size`.
fn disk(size: f64) -> Mesh {
    let sides = (std::f64::consts::TAU / size).ceil();
    polygon(sides as u32, size)
}

fn refine(mesh: Mesh, size: f64, strategy: PlacementStrategy) -> RefinedMesh {
    let config = RefinementConfigBuilder::default()
        .strategy(strategy)
        .max_iterations(200_000)
        .build()
        .expect("benchmark config is valid");
    let mut refiner = Refiner::new(mesh, UniformSize(size), config).expect("refiner setup");
    match refiner.run() {
        Ok(refined) => refined,
        Err(failure) => *failure.partial,
    }
}

fn benchmark_circumcenter_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("circumcenter_refinement");
    group.sample_size(20);

    for size in [0.2, 0.1, 0.05] {
        let points = refine(disk(size), size, PlacementStrategy::Circumcenter).num_points();
        group.throughput(Throughput::Elements(points as u64));
        group.bench_with_input(BenchmarkId::new("disk", size), &size, |b, &size| {
            b.iter_batched(
                || disk(size),
                |mesh| black_box(refine(mesh, size, PlacementStrategy::Circumcenter)),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn benchmark_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("placement_strategies");
    group.sample_size(20);

    for strategy in [
        PlacementStrategy::Circumcenter,
        PlacementStrategy::Barycenter,
        PlacementStrategy::Voronoi,
        PlacementStrategy::SquareTri,
    ] {
        group.bench_with_input(
            BenchmarkId::new("disk_0.1", format!("{strategy:?}")),
            &strategy,
            |b, &strategy| {
                b.iter_batched(
                    || disk(0.1),
                    |mesh| black_box(refine(mesh, 0.1, strategy)),
                    BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

fn benchmark_circumcircle(c: &mut Criterion) {
    let queries: Vec<[f64; 2]> = (0..1000)
        .map(|i| {
            let t = f64::from(i) * 0.001;
            [t.mul_add(3.0, -1.5), (t * 17.0).sin()]
        })
        .collect();

    c.bench_function("circumcircle/through", |b| {
        b.iter(|| {
            black_box(Circumcircle::through(
                black_box([0.0, 0.0]),
                black_box([1.0, 0.1]),
                black_box([0.3, 0.9]),
            ))
        });
    });

    let circle = Circumcircle::through([0.0, 0.0], [1.0, 0.1], [0.3, 0.9])
        .expect("fixture triangle is not degenerate");
    c.bench_function("circumcircle/contains_1000_queries", |b| {
        b.iter(|| {
            for &q in &queries {
                black_box(circle.contains(black_box(q)));
            }
        });
    });

    let corners = [[0.0, 0.0], [1.0, 0.1], [0.3, 0.9]];
    c.bench_function("in_circumcircle/1000_queries", |b| {
        b.iter(|| {
            for &q in &queries {
                black_box(in_circumcircle(black_box(corners), black_box(q)));
            }
        });
    });
}

criterion_group!(
    benches,
    benchmark_circumcenter_scaling,
    benchmark_strategies,
    benchmark_circumcircle
);
criterion_main!(benches);
