//! Background removal: isolate the scanned object from its surroundings.
//!
//! A raw scan of an object on a table contains the table, stray returns and
//! often other clutter. [`BackgroundRemover::run`] removes them in a fixed
//! order:
//!
//! 1. Center the cloud on its centroid
//! 2. Loose statistical outlier removal
//! 3. Voxel downsampling
//! 4. Normal estimation
//! 5. RANSAC removal of the dominant (support) plane
//! 6. DBSCAN, keeping the largest cluster
//! 7. Tight statistical outlier removal
//! 8. Re-center
//! 9. Normal estimation with a tighter neighbor cap
//!
//! # Example
//!
//! ```no_run
//! use mesh_scan::background::{BackgroundParams, BackgroundRemover};
//! use mesh_scan::pointcloud::PointCloud;
//!
//! let scan = PointCloud::load("scan.ply").unwrap();
//! let removal = BackgroundRemover::new(BackgroundParams::default().with_seed(Some(7)))
//!     .run(&scan)
//!     .unwrap();
//! println!("{removal}");
//! ```

use std::fmt;

use nalgebra::Vector3;
use tracing::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::cleanup::{remove_statistical_outliers, voxel_downsample, OutlierParams, DEFAULT_VOXEL_SIZE};
use crate::cluster::{cluster_and_select_largest, ClusterParams};
use crate::error::{ScanError, ScanResult};
use crate::pointcloud::normals::estimate_normals;
use crate::pointcloud::PointCloud;
use crate::segment::{remove_dominant_plane, Plane, PlaneThreshold, RansacParams};

/// Translates `cloud` so its centroid is at the origin.
///
/// Returns the centered cloud and the translation applied, so that
/// `original = centered - offset`. An empty cloud comes back unchanged with
/// a zero offset.
///
/// # Example
///
/// ```
/// use mesh_scan::background::center_point_cloud;
/// use mesh_scan::pointcloud::PointCloud;
///
/// let mut cloud = PointCloud::new();
/// cloud.push_coords(1.0, 2.0, 3.0);
/// cloud.push_coords(3.0, 2.0, 1.0);
///
/// let (centered, offset) = center_point_cloud(&cloud);
/// assert!(centered.centroid().unwrap().coords.norm() < 1e-12);
/// assert_eq!(offset.x, -2.0);
/// ```
#[must_use]
pub fn center_point_cloud(cloud: &PointCloud) -> (PointCloud, Vector3<f64>) {
    let Some(centroid) = cloud.centroid() else {
        return (cloud.clone(), Vector3::zeros());
    };
    let offset = -centroid.coords;
    let mut centered = cloud.clone();
    centered.translate(offset);
    (centered, offset)
}

/// Parameters for [`BackgroundRemover`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct BackgroundParams {
    /// Fewer input points than this is an error. Default: 4.
    pub min_input_points: usize,
    /// First outlier pass. Default: [`OutlierParams::loose`].
    pub loose_outliers: OutlierParams,
    /// Voxel edge for downsampling. Default: 0.002.
    pub voxel_size: f64,
    /// Neighbor cap for the first normal estimate. Default: 30.
    pub normals_max_neighbors: usize,
    /// How the plane inlier distance is chosen. Default: adaptive.
    pub plane_threshold: PlaneThreshold,
    /// RANSAC settings; its `distance_threshold` is replaced by
    /// `plane_threshold`.
    pub ransac: RansacParams,
    /// Foreground clustering.
    pub cluster: ClusterParams,
    /// Second outlier pass. Default: [`OutlierParams::tight`].
    pub tight_outliers: OutlierParams,
    /// Neighbor cap for the final normal estimate. Default: 20.
    pub final_normals_max_neighbors: usize,
}

impl Default for BackgroundParams {
    fn default() -> Self {
        Self {
            min_input_points: 4,
            loose_outliers: OutlierParams::loose(),
            voxel_size: DEFAULT_VOXEL_SIZE,
            normals_max_neighbors: 30,
            plane_threshold: PlaneThreshold::default(),
            ransac: RansacParams::default(),
            cluster: ClusterParams::default(),
            tight_outliers: OutlierParams::tight(),
            final_normals_max_neighbors: 20,
        }
    }
}

impl BackgroundParams {
    /// Sets the voxel size.
    #[must_use]
    pub const fn with_voxel_size(mut self, voxel_size: f64) -> Self {
        self.voxel_size = voxel_size;
        self
    }

    /// Sets the plane threshold mode.
    #[must_use]
    pub const fn with_plane_threshold(mut self, threshold: PlaneThreshold) -> Self {
        self.plane_threshold = threshold;
        self
    }

    /// Sets the clustering parameters.
    #[must_use]
    pub const fn with_cluster(mut self, cluster: ClusterParams) -> Self {
        self.cluster = cluster;
        self
    }

    /// Sets the RANSAC parameters.
    #[must_use]
    pub const fn with_ransac(mut self, ransac: RansacParams) -> Self {
        self.ransac = ransac;
        self
    }

    /// Seeds the RANSAC sampler.
    #[must_use]
    pub const fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.ransac.seed = seed;
        self
    }
}

/// Everything [`BackgroundRemover::run`] produced.
#[derive(Debug, Clone)]
pub struct BackgroundRemoval {
    /// The isolated, centered object with normals.
    pub cloud: PointCloud,
    /// Total translation applied; `original = cloud - offset`.
    pub offset: Vector3<f64>,
    /// The removed support plane, in the coordinates of `original`.
    pub plane: Option<Plane>,
    /// Plane inlier distance used.
    pub threshold: f64,
    /// Clusters found in the non-plane points.
    pub cluster_count: usize,
    /// Input after the first centering.
    pub original: PointCloud,
    /// After the loose outlier pass and downsampling.
    pub filtered: PointCloud,
    /// Non-plane points.
    pub remaining: PointCloud,
    /// Largest cluster, before the tight outlier pass.
    pub foreground: PointCloud,
}

impl fmt::Display for BackgroundRemoval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Background removal:")?;
        writeln!(f, "  Input:      {} points", self.original.len())?;
        writeln!(f, "  Filtered:   {} points", self.filtered.len())?;
        match &self.plane {
            Some(plane) => writeln!(
                f,
                "  Plane:      {plane} (threshold {:.4})",
                self.threshold
            )?,
            None => writeln!(f, "  Plane:      none (threshold {:.4})", self.threshold)?,
        }
        writeln!(f, "  Remaining:  {} points", self.remaining.len())?;
        writeln!(
            f,
            "  Foreground: {} points ({} clusters)",
            self.foreground.len(),
            self.cluster_count
        )?;
        write!(f, "  Output:     {} points", self.cloud.len())
    }
}

/// Removes the support plane and clutter around a scanned object.
#[derive(Debug, Clone, Default)]
pub struct BackgroundRemover {
    params: BackgroundParams,
}

impl BackgroundRemover {
    /// Creates a remover with the given parameters.
    #[must_use]
    pub const fn new(params: BackgroundParams) -> Self {
        Self { params }
    }

    /// The parameters in use.
    #[must_use]
    pub const fn params(&self) -> &BackgroundParams {
        &self.params
    }

    /// Runs the full sequence on `scan`.
    ///
    /// # Errors
    ///
    /// - [`ScanError::EmptyPointCloud`] for an empty scan
    /// - [`ScanError::InsufficientPoints`] below `min_input_points`
    /// - [`ScanError::PlaneSegmentationFailed`] when no plane can be fitted
    ///   at all (too few points after filtering, or all collinear)
    /// - [`ScanError::InvalidParameter`] for a bad voxel size
    pub fn run(&self, scan: &PointCloud) -> ScanResult<BackgroundRemoval> {
        let p = &self.params;
        if scan.is_empty() {
            return Err(ScanError::EmptyPointCloud);
        }
        if scan.len() < p.min_input_points {
            return Err(ScanError::InsufficientPoints {
                required: p.min_input_points,
                actual: scan.len(),
            });
        }

        let (original, first_offset) = center_point_cloud(scan);
        debug!(points = original.len(), "Centered scan");

        let cleaned = remove_statistical_outliers(&original, &p.loose_outliers);
        let filtered = voxel_downsample(&cleaned, p.voxel_size)?;
        info!(
            input = original.len(),
            after_outliers = cleaned.len(),
            after_downsample = filtered.len(),
            "Filtered scan"
        );

        let with_normals = estimate_normals(&filtered, p.normals_max_neighbors);

        let threshold = p.plane_threshold.resolve(&with_normals);
        let ransac = p.ransac.with_distance_threshold(threshold);
        let plane_removal = remove_dominant_plane(&with_normals, &ransac)?;
        let remaining = plane_removal.remaining;

        let selection = cluster_and_select_largest(&remaining, &p.cluster);
        let foreground = selection.cloud;

        let object = remove_statistical_outliers(&foreground, &p.tight_outliers);
        let (object, second_offset) = center_point_cloud(&object);
        let cloud = estimate_normals(&object, p.final_normals_max_neighbors);

        let removal = BackgroundRemoval {
            cloud,
            offset: first_offset + second_offset,
            plane: plane_removal.plane,
            threshold,
            cluster_count: selection.cluster_count,
            original,
            filtered,
            remaining,
            foreground,
        };
        info!(
            input = scan.len(),
            output = removal.cloud.len(),
            threshold,
            clusters = removal.cluster_count,
            "Background removed"
        );
        Ok(removal)
    }
}
