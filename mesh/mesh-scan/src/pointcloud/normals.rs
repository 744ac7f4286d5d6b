//! Normal estimation for point clouds.
//!
//! Normals come from PCA over a hybrid neighborhood: every neighbor within a
//! search radius, capped at a maximum count. The radius scales with the
//! cloud's own density (a multiple of the mean nearest-neighbor distance), so
//! the same parameters work for millimeter and meter scale scans.
//!
//! Orientation is not made consistent; downstream reconstruction does not
//! rely on it.
//!
//! # Example
//!
//! ```
//! use mesh_scan::pointcloud::{normals::estimate_normals, PointCloud};
//! use nalgebra::Point3;
//!
//! // A slightly jittered planar patch
//! let positions: Vec<_> = (0..20)
//!     .flat_map(|i| (0..20).map(move |j| {
//!         let z = f64::from(i * 20 + j) * 1e-5;
//!         Point3::new(f64::from(i) * 0.1, f64::from(j) * 0.1, z)
//!     }))
//!     .collect();
//! let cloud = PointCloud::from_positions(&positions);
//!
//! let with_normals = estimate_normals(&cloud, 20);
//! assert!(with_normals.has_normals());
//! ```

use kiddo::SquaredEuclidean;
use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{PointCloud, PointTree};

/// Parameters for normal estimation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct NormalParams {
    /// Maximum neighbors per point, including the point itself.
    pub max_neighbors: usize,

    /// Search radius as a multiple of the mean nearest-neighbor distance.
    pub radius_factor: f64,
}

impl Default for NormalParams {
    fn default() -> Self {
        Self {
            max_neighbors: 20,
            radius_factor: 10.0,
        }
    }
}

impl NormalParams {
    /// Sets the neighbor cap.
    #[must_use]
    pub const fn with_max_neighbors(mut self, max_neighbors: usize) -> Self {
        self.max_neighbors = max_neighbors;
        self
    }

    /// Sets the radius multiple.
    #[must_use]
    pub const fn with_radius_factor(mut self, radius_factor: f64) -> Self {
        self.radius_factor = radius_factor;
        self
    }
}

/// Returns a copy of `cloud` with a unit normal on every point.
///
/// The search radius is ten times the mean nearest-neighbor distance and at
/// most `max_neighbors` neighbors are used.
#[must_use]
pub fn estimate_normals(cloud: &PointCloud, max_neighbors: usize) -> PointCloud {
    estimate_normals_with(
        cloud,
        &NormalParams::default().with_max_neighbors(max_neighbors),
    )
}

/// Returns a copy of `cloud` with normals estimated using `params`.
///
/// Points with fewer than three neighbors in range get `+Z`.
#[must_use]
pub fn estimate_normals_with(cloud: &PointCloud, params: &NormalParams) -> PointCloud {
    if cloud.is_empty() {
        return PointCloud::new();
    }

    let spacing = cloud.nearest_neighbor_distances();
    #[allow(clippy::cast_precision_loss)]
    let mean_spacing = spacing.iter().sum::<f64>() / spacing.len() as f64;
    let radius = mean_spacing * params.radius_factor;
    debug!(
        points = cloud.len(),
        radius,
        max_neighbors = params.max_neighbors,
        "Estimating normals"
    );

    let tree = cloud.kdtree();
    let mut out = cloud.clone();
    for point in &mut out.points {
        point.normal = Some(estimate_point_normal(
            &point.coords(),
            &tree,
            cloud,
            radius,
            params.max_neighbors,
        ));
    }
    out
}

/// PCA normal for one query position.
fn estimate_point_normal(
    query: &[f64; 3],
    tree: &PointTree,
    cloud: &PointCloud,
    radius: f64,
    max_neighbors: usize,
) -> Vector3<f64> {
    let radius_sq = radius * radius;
    let neighbors: Vec<Vector3<f64>> = tree
        .nearest_n::<SquaredEuclidean>(query, max_neighbors)
        .into_iter()
        .filter(|n| n.distance <= radius_sq)
        .filter_map(|n| usize::try_from(n.item).ok())
        .filter_map(|i| cloud.points.get(i))
        .map(|p| p.position.coords)
        .collect();

    if neighbors.len() < 3 {
        return Vector3::z();
    }

    #[allow(clippy::cast_precision_loss)]
    let centroid = neighbors.iter().sum::<Vector3<f64>>() / neighbors.len() as f64;

    let mut cov = Matrix3::zeros();
    for p in &neighbors {
        let diff = p - centroid;
        cov += diff * diff.transpose();
    }

    let eigen = SymmetricEigen::new(cov);
    let eigenvalues = eigen.eigenvalues;
    let min_idx = if eigenvalues[0] <= eigenvalues[1] && eigenvalues[0] <= eigenvalues[2] {
        0
    } else if eigenvalues[1] <= eigenvalues[2] {
        1
    } else {
        2
    };

    let normal: Vector3<f64> = eigen.eigenvectors.column(min_idx).into_owned();
    let norm = normal.norm();
    if norm > 1e-10 {
        normal / norm
    } else {
        Vector3::z()
    }
}
