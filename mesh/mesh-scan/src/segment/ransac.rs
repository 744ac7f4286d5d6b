//! RANSAC plane segmentation.
//!
//! Robustly finds the dominant plane in a point cloud by repeatedly
//! sampling minimal point sets and keeping the plane with the most
//! inliers. Every trial runs; there is no early exit, so a seeded run is
//! fully reproducible.

use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use rand::prelude::*;
use tracing::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::Plane;
use crate::error::{ScanError, ScanResult};
use crate::pointcloud::PointCloud;

/// Configuration for RANSAC plane segmentation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct RansacParams {
    /// Maximum point-to-plane distance for an inlier. Default: 0.01.
    pub distance_threshold: f64,
    /// Points sampled per trial, at least 3. Default: 3.
    pub sample_size: usize,
    /// Number of trials. Default: 1000.
    pub iterations: usize,
    /// Minimum inlier fraction for the plane to count as present.
    /// Default: 0.0 (always accept).
    pub min_plane_ratio: f64,
    /// Optional seed for reproducible results.
    pub seed: Option<u64>,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            distance_threshold: 0.01,
            sample_size: 3,
            iterations: 1000,
            min_plane_ratio: 0.0,
            seed: None,
        }
    }
}

impl RansacParams {
    /// Set the inlier distance threshold.
    #[must_use]
    pub const fn with_distance_threshold(mut self, threshold: f64) -> Self {
        self.distance_threshold = threshold;
        self
    }

    /// Set the number of points sampled per trial.
    #[must_use]
    pub const fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    /// Set the number of trials.
    #[must_use]
    pub const fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the minimum inlier fraction.
    #[must_use]
    pub const fn with_min_plane_ratio(mut self, ratio: f64) -> Self {
        self.min_plane_ratio = ratio;
        self
    }

    /// Set a random seed for reproducibility.
    #[must_use]
    pub const fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

/// Best plane found by RANSAC.
#[derive(Debug, Clone)]
pub struct PlaneSegmentation {
    /// The fitted plane.
    pub plane: Plane,
    /// Indices of inlier points, ascending.
    pub inliers: Vec<usize>,
}

impl PlaneSegmentation {
    /// Fraction of `total_points` that are inliers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn inlier_ratio(&self, total_points: usize) -> f64 {
        if total_points == 0 {
            return 0.0;
        }
        self.inliers.len() as f64 / total_points as f64
    }
}

/// Outcome of removing the dominant plane from a cloud.
#[derive(Debug, Clone)]
pub struct PlaneRemoval {
    /// Points not on the plane. The whole input when no plane was accepted.
    pub remaining: PointCloud,
    /// The accepted plane, `None` when the best candidate fell below
    /// `min_plane_ratio`.
    pub plane: Option<Plane>,
    /// Number of points removed as plane inliers.
    pub inlier_count: usize,
}

/// Finds the plane with the most inliers in `cloud`.
///
/// # Errors
///
/// Returns [`ScanError::PlaneSegmentationFailed`] if the cloud has fewer
/// than three points or every sampled set was degenerate, and
/// [`ScanError::InvalidParameter`] for a non-positive threshold.
///
/// # Example
///
/// ```
/// use mesh_scan::pointcloud::PointCloud;
/// use mesh_scan::segment::{segment_dominant_plane, RansacParams};
/// use nalgebra::Point3;
///
/// let positions: Vec<_> = (0..400)
///     .map(|i| {
///         let t = f64::from(i);
///         Point3::new((t * 0.618).fract(), (t * 0.382).fract(), 0.0)
///     })
///     .collect();
/// let cloud = PointCloud::from_positions(&positions);
///
/// let params = RansacParams::default().with_seed(Some(42));
/// let result = segment_dominant_plane(&cloud, &params).unwrap();
/// assert_eq!(result.inliers.len(), 400);
/// assert!(result.plane.normal.z.abs() > 0.99);
/// ```
pub fn segment_dominant_plane(
    cloud: &PointCloud,
    params: &RansacParams,
) -> ScanResult<PlaneSegmentation> {
    let n = cloud.len();
    if n < 3 {
        return Err(ScanError::PlaneSegmentationFailed {
            reason: format!("need at least 3 points, got {n}"),
        });
    }
    if !(params.distance_threshold.is_finite() && params.distance_threshold > 0.0) {
        return Err(ScanError::InvalidParameter {
            reason: format!(
                "distance threshold must be positive, got {}",
                params.distance_threshold
            ),
        });
    }

    let points: Vec<Vector3<f64>> = cloud.points.iter().map(|p| p.position.coords).collect();
    let sample_size = params.sample_size.clamp(3, n);

    let mut rng: Box<dyn RngCore> = if let Some(seed) = params.seed {
        Box::new(rand::rngs::StdRng::seed_from_u64(seed))
    } else {
        Box::new(rand::thread_rng())
    };

    let mut best: Option<(Plane, usize)> = None;
    let mut degenerate = 0usize;

    for _ in 0..params.iterations {
        let sample = rand::seq::index::sample(&mut rng, n, sample_size);
        let Some(candidate) = fit_sample(&points, &sample.into_vec()) else {
            degenerate += 1;
            continue;
        };

        let count = points
            .iter()
            .filter(|&&p| candidate.is_inlier(p, params.distance_threshold))
            .count();

        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((candidate, count));
        }
    }

    let Some((plane, _)) = best else {
        return Err(ScanError::PlaneSegmentationFailed {
            reason: format!("all {} samples were degenerate", params.iterations),
        });
    };

    let inliers: Vec<usize> = points
        .iter()
        .enumerate()
        .filter(|(_, p)| plane.is_inlier(**p, params.distance_threshold))
        .map(|(i, _)| i)
        .collect();

    debug!(
        iterations = params.iterations,
        degenerate,
        inliers = inliers.len(),
        %plane,
        "RANSAC plane"
    );

    Ok(PlaneSegmentation { plane, inliers })
}

/// Segments the dominant plane and returns the cloud without it.
///
/// When the best plane holds less than `min_plane_ratio` of the points the
/// cloud is treated as having no support plane and returned whole.
///
/// # Errors
///
/// Propagates the errors of [`segment_dominant_plane`].
pub fn remove_dominant_plane(cloud: &PointCloud, params: &RansacParams) -> ScanResult<PlaneRemoval> {
    let segmentation = segment_dominant_plane(cloud, params)?;
    let ratio = segmentation.inlier_ratio(cloud.len());

    if ratio < params.min_plane_ratio {
        info!(
            ratio,
            min_ratio = params.min_plane_ratio,
            "No dominant plane present, keeping full cloud"
        );
        return Ok(PlaneRemoval {
            remaining: cloud.clone(),
            plane: None,
            inlier_count: 0,
        });
    }

    let remaining = cloud.select_inverted(&segmentation.inliers);
    info!(
        inliers = segmentation.inliers.len(),
        remaining = remaining.len(),
        plane = %segmentation.plane,
        "Removed dominant plane"
    );
    Ok(PlaneRemoval {
        remaining,
        plane: Some(segmentation.plane),
        inlier_count: segmentation.inliers.len(),
    })
}

/// Plane through a sample: exact for three points, least squares beyond.
fn fit_sample(points: &[Vector3<f64>], sample: &[usize]) -> Option<Plane> {
    let picked: Vec<Vector3<f64>> = sample.iter().filter_map(|&i| points.get(i)).copied().collect();
    match picked.as_slice() {
        [p0, p1, p2] => Plane::from_points(*p0, *p1, *p2),
        _ => fit_least_squares(&picked),
    }
}

/// Least-squares plane via PCA. `None` if the points are (nearly) collinear.
fn fit_least_squares(points: &[Vector3<f64>]) -> Option<Plane> {
    if points.len() < 3 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let centroid = points.iter().sum::<Vector3<f64>>() / points.len() as f64;

    let mut cov = Matrix3::zeros();
    for p in points {
        let d = p - centroid;
        cov += d * d.transpose();
    }

    let eigen = SymmetricEigen::new(cov);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));

    // The middle eigenvalue vanishes when all points lie on one line.
    let spread = eigen.eigenvalues[order[2]];
    if spread <= 0.0 || eigen.eigenvalues[order[1]] <= spread * 1e-12 {
        return None;
    }

    Plane::new(centroid, eigen.eigenvectors.column(order[0]).into_owned())
}
