//! End-to-end texturing of reconstructed meshes.

#![allow(clippy::unwrap_used, clippy::cast_precision_loss)]

use mesh_scan::pointcloud::{CloudPoint, PointCloud};
use mesh_scan::reconstruct::MeshBuilder;
use mesh_texture::{TextureMapper, TextureParams};
use mesh_types::VertexColor;
use nalgebra::Point3;

const RED: VertexColor = VertexColor::new(220, 30, 30);
const BLUE: VertexColor = VertexColor::new(30, 30, 220);

/// Fibonacci sphere, red above the equator and blue below.
fn two_tone_sphere(n: usize) -> PointCloud {
    let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    let mut cloud = PointCloud::new();
    for i in 0..n {
        let z = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
        let r = (1.0 - z * z).sqrt();
        let theta = golden * i as f64;
        let color = if z > 0.0 { RED } else { BLUE };
        cloud.push(CloudPoint::with_color(
            Point3::new(r * theta.cos(), r * theta.sin(), z),
            color,
        ));
    }
    cloud
}

#[test]
fn sphere_colors_follow_the_cloud() {
    let cloud = two_tone_sphere(400);
    let built = MeshBuilder::default().build(&cloud).unwrap();
    let params = TextureParams::default().with_color_smoothing(0, 0.0);
    let textured = TextureMapper::new(params).map(&built.mesh, &cloud).unwrap();

    assert_eq!(textured.mesh.face_count(), built.mesh.face_count());
    assert!(textured.mesh.indices_valid());
    assert!(textured.charts >= 6);

    for v in &textured.mesh.vertices {
        let (u, w) = v.uv().unwrap();
        assert!((0.0..=1.0).contains(&u) && (0.0..=1.0).contains(&w));
        if v.position.z > 0.2 {
            assert_eq!(v.color(), Some(RED));
        } else if v.position.z < -0.2 {
            assert_eq!(v.color(), Some(BLUE));
        }
    }
}

#[test]
fn texture_grows_with_face_count() {
    let small = TextureParams::default().texture_size(100);
    let large = TextureParams::default().texture_size(40_000);
    assert_eq!(small, 256);
    assert_eq!(large, 4096);
}

#[test]
fn smoothing_softens_the_equator() {
    let cloud = two_tone_sphere(400);
    let built = MeshBuilder::default().build(&cloud).unwrap();
    let sharp = TextureMapper::new(TextureParams::default().with_color_smoothing(0, 0.0))
        .map(&built.mesh, &cloud)
        .unwrap();
    let soft = TextureMapper::new(TextureParams::default().with_color_smoothing(3, 0.5))
        .map(&built.mesh, &cloud)
        .unwrap();

    let mixed = |mesh: &mesh_types::IndexedMesh| {
        mesh.vertices
            .iter()
            .filter_map(mesh_types::Vertex::color)
            .filter(|c| *c != RED && *c != BLUE)
            .count()
    };
    assert_eq!(mixed(&sharp.mesh), 0);
    assert!(mixed(&soft.mesh) > 0);
}
