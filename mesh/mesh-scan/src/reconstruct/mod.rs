//! Surface reconstruction from point clouds.
//!
//! [`MeshBuilder`] turns an unorganized cloud into a triangle mesh with a
//! 3D alpha shape:
//!
//! 1. Delaunay tetrahedralization of the points ([`delaunay`])
//! 2. Keep tetrahedra with circumradius at most alpha ([`alpha`])
//! 3. Extract and clean the boundary surface
//!
//! Alpha is either supplied or chosen from the cloud's spacing and shape by
//! [`compute_optimal_alpha`].
//!
//! # Quick Start
//!
//! ```
//! use mesh_scan::reconstruct::{MeshBuilder, MeshBuildParams};
//! use mesh_scan::pointcloud::PointCloud;
//! use nalgebra::Point3;
//!
//! let cloud = PointCloud::from_positions(&[
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//!     Point3::new(0.0, 0.0, 1.0),
//! ]);
//!
//! let result = MeshBuilder::new(MeshBuildParams::default().with_alpha(Some(10.0)))
//!     .build(&cloud)
//!     .unwrap();
//! assert_eq!(result.mesh.face_count(), 4);
//! println!("{result}");
//! ```

pub mod alpha;
pub mod delaunay;

pub use alpha::{
    alpha_surface, compute_optimal_alpha, percentile, AlphaSurface, CUBE_LIKE_ALPHA_FACTOR,
    CUBE_LIKE_ASPECT_THRESHOLD, DEFAULT_ALPHA_PERCENTILE, IRREGULAR_ALPHA_FACTOR,
};
pub use delaunay::{tetrahedralize, Tetrahedralization, Tetrahedron};

use std::fmt;

use mesh_repair::{clean_mesh, CleanParams};
use mesh_types::IndexedMesh;
use nalgebra::Point3;
use tracing::info;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ScanError, ScanResult};
use crate::pointcloud::PointCloud;

/// Parameters for [`MeshBuilder`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct MeshBuildParams {
    /// Fixed alpha; `None` computes one per cloud. Default: `None`.
    pub alpha: Option<f64>,
    /// Nearest-neighbor percentile for the adaptive alpha. Default: 95.
    pub percentile: f64,
    /// Vertex welding distance for the output. Default: `1e-6`.
    pub weld_tolerance: f64,
    /// Seed for the tetrahedralization perturbation.
    pub seed: Option<u64>,
}

impl Default for MeshBuildParams {
    fn default() -> Self {
        Self {
            alpha: None,
            percentile: DEFAULT_ALPHA_PERCENTILE,
            weld_tolerance: 1e-6,
            seed: None,
        }
    }
}

impl MeshBuildParams {
    /// Sets a fixed alpha, or `None` for adaptive.
    #[must_use]
    pub const fn with_alpha(mut self, alpha: Option<f64>) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the adaptive-alpha percentile.
    #[must_use]
    pub const fn with_percentile(mut self, percentile: f64) -> Self {
        self.percentile = percentile;
        self
    }

    /// Sets the weld tolerance.
    #[must_use]
    pub const fn with_weld_tolerance(mut self, tolerance: f64) -> Self {
        self.weld_tolerance = tolerance;
        self
    }

    /// Sets the seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

/// Radius-ratio triangle quality over a mesh, each value in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeshQuality {
    /// Worst triangle.
    pub min: f64,
    /// Best triangle.
    pub max: f64,
    /// Mean over all triangles.
    pub mean: f64,
}

impl MeshQuality {
    /// Measures every triangle of `mesh`. An empty mesh gives all zeros.
    #[must_use]
    pub fn measure(mesh: &IndexedMesh) -> Self {
        let mut min = f64::INFINITY;
        let mut max: f64 = 0.0;
        let mut sum = 0.0;
        let mut count = 0usize;
        for tri in mesh.triangles() {
            let q = tri.quality();
            min = min.min(q);
            max = max.max(q);
            sum += q;
            count += 1;
        }
        if count == 0 {
            return Self::default();
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = sum / count as f64;
        Self { min, max, mean }
    }
}

impl fmt::Display for MeshQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "quality min {:.3}, max {:.3}, mean {:.3}",
            self.min, self.max, self.mean
        )
    }
}

/// Output of [`MeshBuilder::build`].
#[derive(Debug, Clone)]
pub struct MeshBuildResult {
    /// The cleaned surface mesh.
    pub mesh: IndexedMesh,
    /// Alpha actually used.
    pub alpha: f64,
    /// Triangle quality of `mesh`.
    pub quality: MeshQuality,
    /// Tetrahedra in the Delaunay triangulation.
    pub tetrahedra: usize,
    /// Tetrahedra kept by the alpha test.
    pub kept_tetrahedra: usize,
}

impl fmt::Display for MeshBuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Alpha shape (alpha {:.5}): {} vertices, {} triangles from {}/{} tetrahedra, {}",
            self.alpha,
            self.mesh.vertex_count(),
            self.mesh.face_count(),
            self.kept_tetrahedra,
            self.tetrahedra,
            self.quality
        )
    }
}

/// Alpha-shape surface reconstruction.
#[derive(Debug, Clone, Default)]
pub struct MeshBuilder {
    params: MeshBuildParams,
}

impl MeshBuilder {
    /// Creates a builder with the given parameters.
    #[must_use]
    pub const fn new(params: MeshBuildParams) -> Self {
        Self { params }
    }

    /// The parameters in use.
    #[must_use]
    pub const fn params(&self) -> &MeshBuildParams {
        &self.params
    }

    /// Reconstructs a surface from `cloud`.
    ///
    /// Output vertices carry the colors and normals of the points they came
    /// from.
    ///
    /// # Errors
    ///
    /// - [`ScanError::InsufficientPoints`] for fewer than 4 distinct points
    /// - [`ScanError::DegenerateGeometry`] if the points span no volume
    /// - [`ScanError::ReconstructionFailed`] if the surface ends up empty
    pub fn build(&self, cloud: &PointCloud) -> ScanResult<MeshBuildResult> {
        let p = &self.params;
        if cloud.len() < 4 {
            return Err(ScanError::InsufficientPoints {
                required: 4,
                actual: cloud.len(),
            });
        }

        let alpha = match p.alpha {
            Some(alpha) => alpha,
            None => compute_optimal_alpha(cloud, p.percentile)?,
        };

        let positions: Vec<Point3<f64>> = cloud.positions().copied().collect();
        let tets = tetrahedralize(&positions, p.seed)?;
        let surface = alpha_surface(&tets, alpha);

        let mut mesh = alpha::surface_mesh(cloud, &tets, &surface)?;
        let cleaned = clean_mesh(
            &mut mesh,
            &CleanParams::default().with_weld_tolerance(p.weld_tolerance),
        );
        if mesh.face_count() == 0 {
            return Err(ScanError::ReconstructionFailed {
                reason: format!("alpha {alpha} produced no triangles"),
            });
        }

        let quality = MeshQuality::measure(&mesh);
        let result = MeshBuildResult {
            mesh,
            alpha,
            quality,
            tetrahedra: tets.tetrahedra.len(),
            kept_tetrahedra: surface.kept,
        };
        info!(
            alpha,
            vertices = result.mesh.vertex_count(),
            faces = result.mesh.face_count(),
            tetrahedra = result.tetrahedra,
            kept = result.kept_tetrahedra,
            quality_min = quality.min,
            quality_max = quality.max,
            quality_mean = quality.mean,
            %cleaned,
            "Generated mesh"
        );
        Ok(result)
    }
}

/// Reconstructs a surface from `cloud` with a fixed `alpha`.
///
/// Shorthand for [`MeshBuilder::build`] with default parameters and the
/// given alpha; see there for errors.
///
/// # Example
///
/// ```
/// use mesh_scan::reconstruct::generate_mesh;
/// use mesh_scan::pointcloud::PointCloud;
/// use nalgebra::Point3;
///
/// let mut cloud = PointCloud::new();
/// for (i, p) in [[0.0, 0.0, 0.0], [1.0, 0.1, 0.0], [0.1, 1.0, 0.2], [0.3, 0.2, 1.0], [0.9, 0.8, 0.7]]
///     .iter()
///     .enumerate()
/// {
///     cloud.push_coords(p[0], p[1], p[2] + i as f64 * 1e-3);
/// }
/// let mesh = generate_mesh(&cloud, f64::INFINITY).unwrap();
/// assert!(mesh.indices_valid());
/// ```
pub fn generate_mesh(cloud: &PointCloud, alpha: f64) -> ScanResult<IndexedMesh> {
    MeshBuilder::new(MeshBuildParams::default().with_alpha(Some(alpha)))
        .build(cloud)
        .map(|result| result.mesh)
}
