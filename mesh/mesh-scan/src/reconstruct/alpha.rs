//! Alpha shapes over a Delaunay tetrahedralization.
//!
//! The alpha shape keeps every Delaunay tetrahedron whose circumradius is at
//! most `alpha` and reports the boundary of their union. Small alpha hugs
//! the points tightly and may fragment; infinite alpha is the convex hull.

use hashbrown::HashMap;
use mesh_types::IndexedMesh;
use tracing::{debug, warn};

use crate::error::{ScanError, ScanResult};
use crate::pointcloud::PointCloud;

use super::delaunay::Tetrahedralization;

/// Multiplier applied to the percentile distance for compact, cube-like
/// clouds, which otherwise fragment into disconnected facets.
pub const CUBE_LIKE_ALPHA_FACTOR: f64 = 25.2;

/// Multiplier applied to the percentile distance for elongated or irregular
/// clouds.
pub const IRREGULAR_ALPHA_FACTOR: f64 = 2.2;

/// A cloud is cube-like when every bounding-box extent exceeds this
/// fraction of the largest extent.
pub const CUBE_LIKE_ASPECT_THRESHOLD: f64 = 0.8;

/// Default nearest-neighbor percentile for [`compute_optimal_alpha`].
pub const DEFAULT_ALPHA_PERCENTILE: f64 = 95.0;

/// The `q`-th percentile of `values` with linear interpolation between
/// closest ranks. Returns `None` for an empty slice.
///
/// # Example
///
/// ```
/// use mesh_scan::reconstruct::percentile;
///
/// assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0], 50.0), Some(2.5));
/// assert_eq!(percentile(&[5.0, 1.0], 100.0), Some(5.0));
/// ```
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Chooses an alpha from the cloud's spacing and shape.
///
/// Takes the `percentile` of nearest-neighbor distances and scales it by
/// [`CUBE_LIKE_ALPHA_FACTOR`] when every bounding-box extent is above
/// [`CUBE_LIKE_ASPECT_THRESHOLD`] of the largest, else by
/// [`IRREGULAR_ALPHA_FACTOR`].
///
/// # Errors
///
/// - [`ScanError::InsufficientPoints`] for fewer than 2 points
/// - [`ScanError::InvalidParameter`] if `percentile` is outside [0, 100]
/// - [`ScanError::DegenerateGeometry`] if all points coincide
pub fn compute_optimal_alpha(cloud: &PointCloud, percentile_q: f64) -> ScanResult<f64> {
    if cloud.len() < 2 {
        return Err(ScanError::InsufficientPoints {
            required: 2,
            actual: cloud.len(),
        });
    }
    if !(0.0..=100.0).contains(&percentile_q) {
        return Err(ScanError::InvalidParameter {
            reason: format!("percentile must be within [0, 100], got {percentile_q}"),
        });
    }

    let distances = cloud.nearest_neighbor_distances();
    let base = percentile(&distances, percentile_q).unwrap_or(0.0);

    let size = cloud.bounds().map(|b| b.size()).unwrap_or_default();
    let max_extent = size.max();
    if max_extent <= 0.0 {
        return Err(ScanError::DegenerateGeometry {
            reason: "all points coincide".to_string(),
        });
    }
    let ratios = size / max_extent;
    let cube_like = ratios.iter().all(|&r| r > CUBE_LIKE_ASPECT_THRESHOLD);
    let factor = if cube_like {
        CUBE_LIKE_ALPHA_FACTOR
    } else {
        IRREGULAR_ALPHA_FACTOR
    };

    let alpha = base * factor;
    debug!(
        percentile = percentile_q,
        base,
        cube_like,
        aspect_x = ratios.x,
        aspect_y = ratios.y,
        aspect_z = ratios.z,
        alpha,
        "Computed alpha"
    );
    Ok(alpha)
}

/// Boundary of the alpha complex.
#[derive(Debug, Clone)]
pub struct AlphaSurface {
    /// Outward-wound boundary faces, indexing
    /// [`Tetrahedralization::positions`].
    pub faces: Vec<[usize; 3]>,
    /// Tetrahedra kept by the alpha test.
    pub kept: usize,
    /// Whether nothing passed the test and every tetrahedron was kept.
    pub fell_back: bool,
}

/// Keeps tetrahedra with circumradius at most `alpha` and extracts the
/// boundary of their union.
///
/// `alpha <= 0`, NaN or infinity keeps every tetrahedron. If no
/// tetrahedron passes, all are kept as well and `fell_back` is set.
#[must_use]
pub fn alpha_surface(tets: &Tetrahedralization, alpha: f64) -> AlphaSurface {
    let keep_all = !(alpha.is_finite() && alpha > 0.0);
    let mut kept: Vec<usize> = (0..tets.tetrahedra.len())
        .filter(|&i| keep_all || tets.tetrahedra[i].circumradius <= alpha)
        .collect();

    let fell_back = kept.is_empty() && !tets.tetrahedra.is_empty();
    if fell_back {
        warn!(alpha, tetrahedra = tets.tetrahedra.len(), "Alpha keeps no tetrahedra, using convex hull");
        kept = (0..tets.tetrahedra.len()).collect();
    }

    // Sorted vertex triple -> (count, first outward winding).
    let mut faces: HashMap<[usize; 3], (usize, [usize; 3])> = HashMap::new();
    let mut order = Vec::new();
    for &t in &kept {
        let tet = &tets.tetrahedra[t];
        for i in 0..4 {
            let face = tet.face(i);
            let mut key = face;
            key.sort_unstable();
            let entry = faces.entry(key).or_insert_with(|| {
                order.push(key);
                (0, face)
            });
            entry.0 += 1;
        }
    }

    let boundary: Vec<[usize; 3]> = order
        .iter()
        .filter_map(|key| faces.get(key))
        .filter(|(count, _)| *count == 1)
        .map(|(_, face)| *face)
        .collect();

    AlphaSurface {
        faces: boundary,
        kept: kept.len(),
        fell_back,
    }
}

/// Builds an indexed mesh from `surface`, taking vertex attributes from the
/// cloud points the tetrahedralization was built from.
pub(crate) fn surface_mesh(
    cloud: &PointCloud,
    tets: &Tetrahedralization,
    surface: &AlphaSurface,
) -> ScanResult<IndexedMesh> {
    let vertices = tets
        .source
        .iter()
        .map(|&i| cloud.points[i].to_vertex())
        .collect();
    let faces = surface
        .faces
        .iter()
        .map(|f| {
            let mut out = [0u32; 3];
            for (slot, &v) in out.iter_mut().zip(f) {
                *slot = u32::try_from(v).map_err(|_| ScanError::ReconstructionFailed {
                    reason: "too many vertices for 32-bit indices".to_string(),
                })?;
            }
            Ok(out)
        })
        .collect::<ScanResult<Vec<_>>>()?;
    Ok(IndexedMesh::from_parts(vertices, faces))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use crate::reconstruct::delaunay::tetrahedralize;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn lattice(nx: usize, ny: usize, nz: usize, spacing: f64) -> PointCloud {
        let mut cloud = PointCloud::new();
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    // Tiny shear keeps coordinates distinct.
                    let x = i as f64 * spacing + j as f64 * 1e-5;
                    let y = j as f64 * spacing + k as f64 * 1e-5;
                    let z = k as f64 * spacing + i as f64 * 1e-5;
                    cloud.push_coords(x, y, z);
                }
            }
        }
        cloud
    }

    #[test]
    fn test_percentile_linear() {
        let values = [0.0, 10.0, 20.0, 30.0, 40.0];
        assert_relative_eq!(percentile(&values, 0.0).unwrap(), 0.0);
        assert_relative_eq!(percentile(&values, 95.0).unwrap(), 38.0);
        assert_relative_eq!(percentile(&values, 100.0).unwrap(), 40.0);
        assert_relative_eq!(percentile(&[7.0], 42.0).unwrap(), 7.0);
        assert!(percentile(&[], 50.0).is_none());
    }

    #[test]
    fn test_cube_alpha_exceeds_rod_alpha() {
        let cube = lattice(6, 6, 6, 0.01);
        let rod = lattice(20, 3, 3, 0.01);
        let cube_alpha = compute_optimal_alpha(&cube, 95.0).unwrap();
        let rod_alpha = compute_optimal_alpha(&rod, 95.0).unwrap();

        assert!(cube_alpha > rod_alpha);
        assert_relative_eq!(cube_alpha / rod_alpha, CUBE_LIKE_ALPHA_FACTOR / IRREGULAR_ALPHA_FACTOR, epsilon = 0.05);
    }

    #[test]
    fn test_alpha_rejects_bad_input() {
        let mut one = PointCloud::new();
        one.push_coords(0.0, 0.0, 0.0);
        assert!(matches!(
            compute_optimal_alpha(&one, 95.0),
            Err(ScanError::InsufficientPoints { .. })
        ));
        assert!(matches!(
            compute_optimal_alpha(&lattice(2, 2, 2, 1.0), 120.0),
            Err(ScanError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_infinite_alpha_is_closed_hull() {
        let cloud = lattice(3, 3, 3, 1.0);
        let positions: Vec<Point3<f64>> = cloud.positions().copied().collect();
        let tets = tetrahedralize(&positions, Some(1)).unwrap();
        let surface = alpha_surface(&tets, f64::INFINITY);

        assert_eq!(surface.kept, tets.tetrahedra.len());
        assert!(!surface.fell_back);
        let mesh = surface_mesh(&cloud, &tets, &surface).unwrap();
        assert!(mesh.signed_volume() > 7.9);
    }

    #[test]
    fn test_tiny_alpha_falls_back() {
        let cloud = lattice(3, 3, 3, 1.0);
        let positions: Vec<Point3<f64>> = cloud.positions().copied().collect();
        let tets = tetrahedralize(&positions, Some(1)).unwrap();
        let surface = alpha_surface(&tets, 1e-6);
        assert!(surface.fell_back);
        assert_eq!(surface.kept, tets.tetrahedra.len());
        assert!(!surface.faces.is_empty());
    }
}
