//! Per-vertex color transfer from a point cloud, and color smoothing.

use kiddo::SquaredEuclidean;
use mesh_scan::pointcloud::PointCloud;
use mesh_types::{IndexedMesh, VertexColor};
use tracing::{debug, warn};

/// Color given to every vertex when the cloud carries no colors.
pub const NEUTRAL_GREY: VertexColor = VertexColor::new(128, 128, 128);

/// Colors each mesh vertex with the color of its nearest colored cloud
/// point, as `[0, 1]` floats.
///
/// Points without a color are ignored. If no point has one, every vertex
/// gets [`NEUTRAL_GREY`].
#[must_use]
pub fn transfer_colors(mesh: &IndexedMesh, cloud: &PointCloud) -> Vec<[f32; 3]> {
    let mask: Vec<bool> = cloud.points.iter().map(|p| p.color.is_some()).collect();
    let colored = cloud.select_mask(&mask);
    if colored.is_empty() {
        warn!(
            points = cloud.len(),
            "Point cloud has no colors, using neutral grey"
        );
        return vec![NEUTRAL_GREY.to_float(); mesh.vertex_count()];
    }

    let tree = colored.kdtree();
    let colors: Vec<[f32; 3]> = mesh
        .vertices
        .iter()
        .map(|v| {
            let q = [v.position.x, v.position.y, v.position.z];
            let nearest = tree.nearest_one::<SquaredEuclidean>(&q);
            usize::try_from(nearest.item)
                .ok()
                .and_then(|i| colored.points.get(i))
                .and_then(|p| p.color)
                .unwrap_or(NEUTRAL_GREY)
                .to_float()
        })
        .collect();

    debug!(
        vertices = mesh.vertex_count(),
        sources = colored.len(),
        "Transferred vertex colors"
    );
    colors
}

/// Blends each vertex color toward the mean of its one-ring neighbors.
///
/// Each pass computes `c' = (1 - factor) * c + factor * mean(neighbors)`
/// from the previous pass's colors. Isolated vertices keep their color.
pub fn smooth_colors(mesh: &IndexedMesh, colors: &mut [[f32; 3]], iterations: usize, factor: f32) {
    if iterations == 0 || factor <= 0.0 {
        return;
    }

    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); colors.len()];
    for face in &mesh.faces {
        for k in 0..3 {
            let a = face[k] as usize;
            let b = face[(k + 1) % 3] as usize;
            if a < colors.len() && b < colors.len() {
                if !neighbors[a].contains(&b) {
                    neighbors[a].push(b);
                }
                if !neighbors[b].contains(&a) {
                    neighbors[b].push(a);
                }
            }
        }
    }

    for _ in 0..iterations {
        let previous = colors.to_vec();
        for (i, ring) in neighbors.iter().enumerate() {
            if ring.is_empty() {
                continue;
            }
            let mut mean = [0.0f32; 3];
            for &j in ring {
                for c in 0..3 {
                    mean[c] += previous[j][c];
                }
            }
            #[allow(clippy::cast_precision_loss)]
            let n = ring.len() as f32;
            for c in 0..3 {
                colors[i][c] = (1.0 - factor) * previous[i][c] + factor * mean[c] / n;
            }
        }
    }
}
