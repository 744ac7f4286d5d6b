//! Statistical outlier removal (SOR).
//!
//! Every point is scored by its mean distance to its `k` nearest
//! neighbors. A point survives when its score is at most
//! `mean + std_multiplier * sigma`, where mean and sigma (population) are
//! taken over all scores. Scores are summed in sorted order so the kept
//! set is the same whatever order the points arrive in.
//!
//! ```
//! use mesh_scan::cleanup::outlier::{remove_statistical_outliers, OutlierParams};
//! use mesh_scan::pointcloud::PointCloud;
//! use nalgebra::Point3;
//!
//! let mut rail: Vec<_> = (0..100)
//!     .map(|i| Point3::new(f64::from(i) * 0.01, f64::from(i) * 1e-4, f64::from(i) * 3e-4))
//!     .collect();
//! rail.push(Point3::new(0.5, 8.0, 0.0));
//!
//! let kept = remove_statistical_outliers(&PointCloud::from_positions(&rail), &OutlierParams::default());
//! assert_eq!(kept.len(), 100);
//! ```

use std::fmt;

use kiddo::SquaredEuclidean;
use tracing::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::pointcloud::PointCloud;

/// Neighborhood size and cutoff for one SOR pass.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct OutlierParams {
    /// Neighbors per score, not counting the point itself. Default: 20.
    pub k_neighbors: usize,

    /// Sigmas above the mean score before a point is dropped. Default: 2.0.
    pub std_multiplier: f64,
}

impl Default for OutlierParams {
    fn default() -> Self {
        Self {
            k_neighbors: 20,
            std_multiplier: 2.0,
        }
    }
}

impl OutlierParams {
    /// Replaces `k_neighbors`.
    #[must_use]
    pub const fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k;
        self
    }

    /// Replaces `std_multiplier`.
    #[must_use]
    pub const fn with_std_multiplier(mut self, sigmas: f64) -> Self {
        self.std_multiplier = sigmas;
        self
    }

    /// First pass on a raw scan: few neighbors, only gross outliers go.
    #[must_use]
    pub const fn loose() -> Self {
        Self {
            k_neighbors: 16,
            std_multiplier: 10.0,
        }
    }

    /// Final pass on an isolated object: wide neighborhood, tight cut.
    #[must_use]
    pub const fn tight() -> Self {
        Self {
            k_neighbors: 30,
            std_multiplier: 2.0,
        }
    }
}

/// What a pass kept and where it cut.
#[derive(Debug, Clone)]
pub struct OutlierReport {
    /// Surviving points, in input order.
    pub cloud: PointCloud,
    /// Input size.
    pub input_len: usize,
    /// Cutoff on the mean neighbor distance; `None` when the pass was skipped.
    pub cutoff: Option<f64>,
}

impl OutlierReport {
    /// Points dropped.
    #[must_use]
    pub fn removed(&self) -> usize {
        self.input_len - self.cloud.len()
    }
}

impl fmt::Display for OutlierReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SOR kept {}/{}", self.cloud.len(), self.input_len)?;
        match self.cutoff {
            Some(cutoff) => write!(f, " (cutoff {cutoff:.5})"),
            None => write!(f, " (skipped)"),
        }
    }
}

/// [`filter_outliers`] without the report.
#[must_use]
pub fn remove_statistical_outliers(cloud: &PointCloud, params: &OutlierParams) -> PointCloud {
    filter_outliers(cloud, params).cloud
}

/// Runs one SOR pass.
///
/// A cloud with `k_neighbors` points or fewer, or `k_neighbors == 0`,
/// comes back unchanged with no cutoff.
#[must_use]
pub fn filter_outliers(cloud: &PointCloud, params: &OutlierParams) -> OutlierReport {
    let input_len = cloud.len();
    let k = params.k_neighbors;

    if k == 0 || input_len <= k {
        warn!(points = input_len, k, "not enough points for SOR, skipping");
        return OutlierReport {
            cloud: cloud.clone(),
            input_len,
            cutoff: None,
        };
    }

    let scores = neighbor_scores(cloud, k);
    let cutoff = score_cutoff(&scores, params.std_multiplier);
    let keep: Vec<bool> = scores.iter().map(|&s| s <= cutoff).collect();
    let kept = cloud.select_mask(&keep);

    debug!(k, cutoff, removed = input_len - kept.len(), "SOR pass");
    OutlierReport {
        cloud: kept,
        input_len,
        cutoff: Some(cutoff),
    }
}

/// Mean distance from each point to its `k` nearest other points.
#[allow(clippy::cast_precision_loss)]
fn neighbor_scores(cloud: &PointCloud, k: usize) -> Vec<f64> {
    let tree = cloud.kdtree();
    cloud
        .points
        .iter()
        .enumerate()
        .map(|(i, point)| {
            // With exact duplicates the query point is not always first.
            let (sum, n) = tree
                .nearest_n::<SquaredEuclidean>(&point.coords(), k + 1)
                .into_iter()
                .filter(|hit| hit.item != i as u64)
                .take(k)
                .fold((0.0, 0usize), |(sum, n), hit| (sum + hit.distance.sqrt(), n + 1));
            if n == 0 {
                0.0
            } else {
                sum / n as f64
            }
        })
        .collect()
}

/// `mean + sigmas * std` over `scores`, accumulated in ascending order.
fn score_cutoff(scores: &[f64], sigmas: f64) -> f64 {
    let mut ordered = scores.to_vec();
    ordered.sort_by(f64::total_cmp);

    #[allow(clippy::cast_precision_loss)]
    let n = ordered.len() as f64;
    let mean = ordered.iter().sum::<f64>() / n;
    let var = ordered.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / n;
    sigmas.mul_add(var.sqrt(), mean)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    /// 10x10x10 grid at 0.1 spacing with a small deterministic shear.
    fn grid() -> PointCloud {
        let positions: Vec<_> = (0..1000)
            .map(|n: i32| {
                let (i, j, k) = (n / 100, (n / 10) % 10, n % 10);
                let s = f64::from(n) * 1e-6;
                Point3::new(
                    f64::from(i).mul_add(0.1, s),
                    f64::from(j).mul_add(0.1, 2.0 * s),
                    f64::from(k).mul_add(0.1, 3.0 * s),
                )
            })
            .collect();
        PointCloud::from_positions(&positions)
    }

    #[test]
    fn presets() {
        assert_eq!(OutlierParams::loose().k_neighbors, 16);
        assert_relative_eq!(OutlierParams::loose().std_multiplier, 10.0);
        assert_eq!(OutlierParams::tight().k_neighbors, 30);
        assert_relative_eq!(OutlierParams::tight().std_multiplier, 2.0);
    }

    #[test]
    fn strays_are_dropped() {
        let mut cloud = grid();
        cloud.push_coords(20.0, 20.0, 20.0);
        cloud.push_coords(-15.0, 3.0, 7.0);

        let report = filter_outliers(&cloud, &OutlierParams::tight());
        assert_eq!(report.removed(), 2);
        assert!(report.cloud.points.iter().all(|p| p.position.coords.norm() < 2.0));
        assert!(report.cutoff.is_some());
    }

    #[test]
    fn loose_pass_keeps_a_uniform_grid() {
        let cloud = grid();
        assert_eq!(remove_statistical_outliers(&cloud, &OutlierParams::loose()).len(), cloud.len());
    }

    #[test]
    fn skip_when_k_covers_the_cloud() {
        let mut cloud = PointCloud::new();
        for i in 0..16 {
            cloud.push_coords(f64::from(i), f64::from(i) * 0.5, 0.0);
        }
        cloud.push_coords(1000.0, 0.0, 0.0);

        assert!(filter_outliers(&cloud, &OutlierParams::loose()).cutoff.is_some());

        let skipped = filter_outliers(&cloud, &OutlierParams::tight());
        assert_eq!(skipped.cloud, cloud);
        assert!(skipped.cutoff.is_none());
        assert_eq!(skipped.removed(), 0);
        assert!(skipped.to_string().ends_with("(skipped)"));
    }

    #[test]
    fn cutoff_of_constant_scores_is_the_score() {
        assert_relative_eq!(score_cutoff(&[0.25; 8], 3.0), 0.25);
        // mean 2, population sigma 1
        assert_relative_eq!(score_cutoff(&[1.0, 3.0, 1.0, 3.0], 2.0), 4.0);
    }
}
