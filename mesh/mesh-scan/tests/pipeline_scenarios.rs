//! End-to-end scenarios for background removal, clustering and meshing.
//!
//! Run with: cargo test -p mesh-scan --test pipeline_scenarios

#![allow(clippy::unwrap_used, clippy::cast_precision_loss)]

use approx::assert_relative_eq;
use mesh_repair::validate_mesh;
use mesh_scan::background::{BackgroundParams, BackgroundRemover};
use mesh_scan::cluster::{cluster_and_select_largest, dbscan, ClusterParams};
use mesh_scan::complete::{CompletionParams, SurfaceCompleter};
use mesh_scan::pointcloud::PointCloud;
use mesh_scan::reconstruct::{generate_mesh, MeshBuilder};
use mesh_scan::segment::AdaptiveThreshold;
use nalgebra::{Point3, Vector3};
use rand::prelude::*;

// =============================================================================
// Synthetic scans
// =============================================================================

/// Fibonacci sphere: evenly spread, no repeated coordinates.
fn sphere(center: Point3<f64>, radius: f64, count: usize) -> PointCloud {
    let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    (0..count)
        .map(|i| {
            let y = 1.0 - 2.0 * (i as f64 + 0.5) / count as f64;
            let r = (1.0 - y * y).sqrt();
            let theta = golden * i as f64;
            center + Vector3::new(r * theta.cos(), r * theta.sin(), y) * radius
        })
        .collect()
}

/// Horizontal table at z = 0 with a little sensor noise.
fn table(count: usize, half_size: f64, seed: u64) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            Point3::new(
                rng.gen_range(-half_size..half_size),
                rng.gen_range(-half_size..half_size),
                rng.gen_range(-0.002..0.002),
            )
        })
        .collect()
}

fn column(height: f64) -> PointCloud {
    (0..40)
        .map(|i| {
            let t = f64::from(i) / 39.0;
            Point3::new((t * 9.0).sin() * 0.01, (t * 9.0).cos() * 0.01, t * height)
        })
        .collect()
}

// =============================================================================
// Background removal
// =============================================================================

#[test]
fn plane_removed_sphere_kept() {
    let mut scan = table(1000, 1.0, 17);
    scan.extend(sphere(Point3::new(0.0, 0.0, 1.0), 0.3, 500).points);
    let scan_centroid = scan.centroid().unwrap();

    let removal = BackgroundRemover::new(BackgroundParams::default().with_seed(Some(42)))
        .run(&scan)
        .unwrap();

    let remaining = removal.remaining.len();
    assert!((450..=550).contains(&remaining), "remaining {remaining}");

    // Back to scan coordinates.
    let centroid = removal.remaining.centroid().unwrap() + scan_centroid.coords;
    assert!((centroid.z - 1.0).abs() < 0.05, "centroid z {}", centroid.z);

    let plane = removal.plane.unwrap();
    assert!(plane.normal.z.abs() > 0.99);
    assert_relative_eq!(removal.threshold, 0.03, epsilon = 1e-12);

    // Final object is centered.
    assert!(removal.cloud.centroid().unwrap().coords.norm() < 1e-9);
    assert!(removal.cloud.has_normals());
}

#[test]
fn adaptive_threshold_interpolates_exactly() {
    let adaptive = AdaptiveThreshold::default();
    assert_relative_eq!(adaptive.threshold_for(&column(0.03)), 0.006, epsilon = 1e-12);
    assert_relative_eq!(adaptive.threshold_for(&column(0.20)), 0.03, epsilon = 1e-12);
    assert_relative_eq!(adaptive.threshold_for(&column(0.115)), 0.018, epsilon = 1e-12);
}

// =============================================================================
// Clustering
// =============================================================================

#[test]
fn two_blobs_two_clusters_largest_selected() {
    let small = sphere(Point3::new(-1.0, 0.0, 0.0), 0.05, 200);
    let large = sphere(Point3::new(1.0, 0.0, 0.0), 0.05, 350);
    let mut cloud = small.clone();
    cloud.extend(large.points.clone());

    let labels = dbscan(&cloud, 0.03, 5);
    assert!(labels[..200].iter().all(|&l| l == 0));
    assert!(labels[200..].iter().all(|&l| l == 1));

    let selection =
        cluster_and_select_largest(&cloud, &ClusterParams::default().with_eps(0.03).with_min_points(5));
    assert_eq!(selection.cloud, large);
}

// =============================================================================
// Completion and meshing
// =============================================================================

#[test]
fn completed_dome_meshes_watertight() {
    let dome: PointCloud = sphere(Point3::origin(), 0.1, 800)
        .points
        .into_iter()
        .filter(|p| p.position.z > 0.0)
        .collect();

    let completion = SurfaceCompleter::new(
        CompletionParams::default()
            .with_samples(2000)
            .with_iterations(200)
            .with_seed(Some(8)),
    )
    .complete(&dome)
    .unwrap();
    assert!(completion.has_bottom());

    let result = MeshBuilder::default().build(&completion.completed).unwrap();
    assert!(result.mesh.indices_valid());
    let report = validate_mesh(&result.mesh);
    assert_eq!(report.boundary_edge_count, 0, "{report}");
}

#[test]
fn generate_mesh_small_cloud() {
    let cloud = PointCloud::from_positions(&[
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.05, 0.0),
        Point3::new(0.05, 1.0, 0.02),
        Point3::new(0.1, 0.02, 1.0),
    ]);
    let mesh = generate_mesh(&cloud, 0.0).unwrap();
    assert_eq!(mesh.face_count(), 4);
    assert!(mesh.indices_valid());
    assert!(mesh.signed_volume() > 0.0);
}
