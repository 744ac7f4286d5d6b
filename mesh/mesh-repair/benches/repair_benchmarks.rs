//! Benchmarks for refining alpha-shape-sized meshes.
//!
//! Run with: cargo bench -p mesh-repair
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p mesh-repair -- --save-baseline main
//! 2. After changes: cargo bench -p mesh-repair -- --baseline main

#![allow(missing_docs, clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mesh_repair::{
    clean_mesh, fill_holes, smooth_laplacian, validate_mesh, CleanParams, MeshRefiner,
    RefineParams, SmoothParams,
};
use mesh_types::{IndexedMesh, Vertex};

// =============================================================================
// Mesh generation
// =============================================================================

/// Outward-wound latitude/longitude shell of radius 0.1, roughly the size
/// of a tabletop object.
fn shell(stacks: u32, slices: u32) -> IndexedMesh {
    use std::f64::consts::PI;

    let mut mesh = IndexedMesh::new();
    mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.1));
    for i in 1..stacks {
        let phi = PI * f64::from(i) / f64::from(stacks);
        for j in 0..slices {
            let theta = 2.0 * PI * f64::from(j) / f64::from(slices);
            mesh.vertices.push(Vertex::from_coords(
                0.1 * phi.sin() * theta.cos(),
                0.1 * phi.sin() * theta.sin(),
                0.1 * phi.cos(),
            ));
        }
    }
    let south = mesh.vertices.len() as u32;
    mesh.vertices.push(Vertex::from_coords(0.0, 0.0, -0.1));

    let ring = |i: u32, j: u32| 1 + (i - 1) * slices + j % slices;
    for j in 0..slices {
        mesh.faces.push([0, ring(1, j), ring(1, j + 1)]);
        mesh.faces
            .push([south, ring(stacks - 1, j + 1), ring(stacks - 1, j)]);
    }
    for i in 1..stacks - 1 {
        for j in 0..slices {
            let (a, b) = (ring(i, j), ring(i, j + 1));
            let (c, d) = (ring(i + 1, j + 1), ring(i + 1, j));
            mesh.faces.push([a, d, c]);
            mesh.faces.push([a, c, b]);
        }
    }
    mesh
}

/// What triangulating a thin scan tends to leave: scattered missing faces,
/// duplicated vertices along a seam, and a floating sliver.
fn scan_like(stacks: u32, slices: u32) -> IndexedMesh {
    let mut mesh = shell(stacks, slices);
    let mut n = 0usize;
    mesh.faces.retain(|_| {
        n += 1;
        n % 11 != 0
    });

    let seam: Vec<u32> = (0..mesh.vertices.len() as u32).step_by(slices as usize).collect();
    for &v in &seam {
        let copy = mesh.vertices[v as usize].clone();
        let index = mesh.vertices.len() as u32;
        mesh.vertices.push(copy);
        if let Some(face) = mesh.faces.iter_mut().find(|f| f[0] == v) {
            face[0] = index;
        }
    }

    let base = mesh.vertices.len() as u32;
    mesh.vertices.push(Vertex::from_coords(0.3, 0.0, 0.0));
    mesh.vertices.push(Vertex::from_coords(0.301, 0.0, 0.0));
    mesh.vertices.push(Vertex::from_coords(0.3, 0.001, 0.0));
    mesh.faces.push([base, base + 1, base + 2]);
    mesh
}

const SIZES: [(u32, u32); 3] = [(16, 32), (32, 64), (64, 128)];

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");
    for (stacks, slices) in SIZES {
        let mesh = shell(stacks, slices);
        group.throughput(Throughput::Elements(mesh.face_count() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(mesh.face_count()), &mesh, |b, mesh| {
            b.iter(|| validate_mesh(black_box(mesh)));
        });
    }
    group.finish();
}

fn bench_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("steps");
    for (stacks, slices) in SIZES {
        let mesh = scan_like(stacks, slices);
        let faces = mesh.face_count();
        group.throughput(Throughput::Elements(faces as u64));

        group.bench_with_input(BenchmarkId::new("clean", faces), &mesh, |b, mesh| {
            let params = CleanParams::default();
            b.iter(|| clean_mesh(&mut mesh.clone(), &params));
        });
        group.bench_with_input(BenchmarkId::new("fill_holes", faces), &mesh, |b, mesh| {
            b.iter(|| fill_holes(&mut mesh.clone(), None));
        });
        group.bench_with_input(BenchmarkId::new("smooth", faces), &mesh, |b, mesh| {
            let params = SmoothParams::default();
            b.iter(|| smooth_laplacian(&mut mesh.clone(), &params));
        });
    }
    group.finish();
}

fn bench_refine(c: &mut Criterion) {
    let mut group = c.benchmark_group("refine");
    group.sample_size(20);
    let refiner = MeshRefiner::new(RefineParams::gentle());
    for (stacks, slices) in SIZES {
        let mesh = scan_like(stacks, slices);
        group.throughput(Throughput::Elements(mesh.face_count() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(mesh.face_count()), &mesh, |b, mesh| {
            b.iter(|| refiner.refine(black_box(mesh.clone())));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_validate, bench_steps, bench_refine);
criterion_main!(benches);
