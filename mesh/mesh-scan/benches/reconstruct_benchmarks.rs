//! Benchmarks for Delaunay tetrahedralization and alpha-shape meshing.
//!
//! Run with: cargo bench -p mesh-scan
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p mesh-scan -- --save-baseline main
//! 2. After changes: cargo bench -p mesh-scan -- --baseline main

#![allow(missing_docs, clippy::cast_precision_loss)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mesh_scan::pointcloud::PointCloud;
use mesh_scan::reconstruct::{compute_optimal_alpha, tetrahedralize, MeshBuildParams, MeshBuilder};
use nalgebra::{Point3, Vector3};

// =============================================================================
// Test Cloud Generation
// =============================================================================

/// Points on a unit sphere, evenly spread.
fn create_sphere(count: usize) -> PointCloud {
    let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    (0..count)
        .map(|i| {
            let y = 1.0 - 2.0 * (i as f64 + 0.5) / count as f64;
            let r = (1.0 - y * y).sqrt();
            let theta = golden * i as f64;
            Point3::from(Vector3::new(r * theta.cos(), y, r * theta.sin()))
        })
        .collect()
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_tetrahedralize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tetrahedralize");
    for count in [500, 2_000, 8_000] {
        let positions: Vec<Point3<f64>> = create_sphere(count).positions().copied().collect();
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &positions, |b, positions| {
            b.iter(|| tetrahedralize(black_box(positions), Some(1)));
        });
    }
    group.finish();
}

fn bench_alpha_mesh(c: &mut Criterion) {
    let mut group = c.benchmark_group("alpha_mesh");
    group.sample_size(20);
    for count in [500, 2_000] {
        let cloud = create_sphere(count);
        let builder = MeshBuilder::new(MeshBuildParams::default().with_seed(Some(1)));
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &cloud, |b, cloud| {
            b.iter(|| builder.build(black_box(cloud)));
        });
    }
    group.finish();
}

fn bench_optimal_alpha(c: &mut Criterion) {
    let cloud = create_sphere(8_000);
    c.bench_function("compute_optimal_alpha_8000", |b| {
        b.iter(|| compute_optimal_alpha(black_box(&cloud), 95.0));
    });
}

criterion_group!(benches, bench_tetrahedralize, bench_alpha_mesh, bench_optimal_alpha);
criterion_main!(benches);
