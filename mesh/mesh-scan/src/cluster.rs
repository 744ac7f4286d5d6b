//! Density-based clustering (DBSCAN) and foreground selection.
//!
//! After the support plane is gone, the object is normally the largest
//! dense blob; stray clutter and sensor noise form smaller clusters or no
//! cluster at all.
//!
//! # Example
//!
//! ```
//! use mesh_scan::cluster::{dbscan, NOISE};
//! use mesh_scan::pointcloud::PointCloud;
//!
//! let mut cloud = PointCloud::new();
//! for i in 0..10 {
//!     cloud.push_coords(f64::from(i) * 0.01, f64::from(i) * 0.001, 0.0);
//! }
//! cloud.push_coords(5.0, 5.0, 5.0);
//!
//! let labels = dbscan(&cloud, 0.02, 3);
//! assert!(labels[..10].iter().all(|&l| l == 0));
//! assert_eq!(labels[10], NOISE);
//! ```

use std::collections::VecDeque;
use std::fmt;

use kiddo::SquaredEuclidean;
use tracing::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::pointcloud::PointCloud;

/// Label for points that belong to no cluster.
pub const NOISE: i32 = -1;

const UNVISITED: i32 = -2;

/// DBSCAN parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ClusterParams {
    /// Neighborhood radius. Default: 0.02.
    pub eps: f64,
    /// Neighbors (including the point itself) needed for a core point.
    /// Default: 50.
    pub min_points: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            eps: 0.02,
            min_points: 50,
        }
    }
}

impl ClusterParams {
    /// Sets the neighborhood radius.
    #[must_use]
    pub const fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    /// Sets the core-point neighbor count.
    #[must_use]
    pub const fn with_min_points(mut self, min_points: usize) -> Self {
        self.min_points = min_points;
        self
    }
}

/// Result of [`cluster_and_select_largest`].
#[derive(Debug, Clone)]
pub struct ClusterSelection {
    /// The largest cluster, or the input when nothing clustered.
    pub cloud: PointCloud,
    /// Number of clusters found.
    pub cluster_count: usize,
    /// Label of the kept cluster, `None` when the input was returned as is.
    pub selected_label: Option<i32>,
    /// Points labelled as noise.
    pub noise_count: usize,
}

impl fmt::Display for ClusterSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.selected_label {
            Some(label) => write!(
                f,
                "{} clusters, kept #{label} with {} points ({} noise)",
                self.cluster_count,
                self.cloud.len(),
                self.noise_count
            ),
            None => write!(f, "no clusters, kept all {} points", self.cloud.len()),
        }
    }
}

/// Labels every point with a cluster id, or [`NOISE`].
///
/// Clusters are numbered from 0 in order of their lowest-index core point.
/// A border point reachable from two clusters joins the first to expand
/// into it.
#[must_use]
pub fn dbscan(cloud: &PointCloud, eps: f64, min_points: usize) -> Vec<i32> {
    let n = cloud.len();
    let mut labels = vec![UNVISITED; n];
    if n == 0 {
        return labels;
    }

    let tree = cloud.kdtree();
    let eps_sq = eps * eps;
    let region = |i: usize| -> Vec<usize> {
        tree.within_unsorted::<SquaredEuclidean>(&cloud.points[i].coords(), eps_sq)
            .into_iter()
            .filter_map(|nb| usize::try_from(nb.item).ok())
            .collect()
    };

    let mut cluster: i32 = 0;
    let mut queue = VecDeque::new();

    for i in 0..n {
        if labels[i] != UNVISITED {
            continue;
        }
        let neighbors = region(i);
        if neighbors.len() < min_points {
            labels[i] = NOISE;
            continue;
        }

        labels[i] = cluster;
        queue.extend(neighbors);

        while let Some(j) = queue.pop_front() {
            if labels[j] == NOISE {
                labels[j] = cluster;
            }
            if labels[j] != UNVISITED {
                continue;
            }
            labels[j] = cluster;

            let expansion = region(j);
            if expansion.len() >= min_points {
                queue.extend(expansion);
            }
        }

        cluster += 1;
    }

    debug!(eps, min_points, clusters = cluster, "DBSCAN");
    labels
}

/// Keeps the largest DBSCAN cluster of `cloud`.
///
/// Ties go to the lowest label. With no clusters at all the input is
/// returned unchanged.
#[must_use]
pub fn cluster_and_select_largest(cloud: &PointCloud, params: &ClusterParams) -> ClusterSelection {
    let labels = dbscan(cloud, params.eps, params.min_points);
    let noise_count = labels.iter().filter(|&&l| l == NOISE).count();

    let cluster_count = labels
        .iter()
        .copied()
        .max()
        .and_then(|max| usize::try_from(max + 1).ok())
        .unwrap_or(0);

    let mut sizes = vec![0usize; cluster_count];
    for &label in &labels {
        if let Ok(idx) = usize::try_from(label) {
            sizes[idx] += 1;
        }
    }

    // First maximum wins, so ties resolve to the lowest label.
    let largest = sizes
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, usize)>, (label, &size)| match best {
            Some((_, best_size)) if best_size >= size => best,
            _ => Some((label, size)),
        });

    let Some((label, size)) = largest else {
        info!(points = cloud.len(), "No clusters found, keeping full cloud");
        return ClusterSelection {
            cloud: cloud.clone(),
            cluster_count: 0,
            selected_label: None,
            noise_count,
        };
    };

    let label = i32::try_from(label).unwrap_or(0);
    let mask: Vec<bool> = labels.iter().map(|&l| l == label).collect();
    let selection = ClusterSelection {
        cloud: cloud.select_mask(&mask),
        cluster_count,
        selected_label: Some(label),
        noise_count,
    };
    info!(
        clusters = cluster_count,
        kept = size,
        noise = noise_count,
        "Selected largest cluster"
    );
    selection
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};

    /// Points on a Fibonacci sphere: no two share a coordinate.
    fn blob(center: Point3<f64>, radius: f64, count: usize) -> PointCloud {
        let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
        (0..count)
            .map(|i| {
                let y = 1.0 - 2.0 * (i as f64 + 0.5) / count as f64;
                let r = (1.0 - y * y).sqrt();
                let theta = golden * i as f64;
                center + Vector3::new(r * theta.cos(), y, r * theta.sin()) * radius
            })
            .collect()
    }

    #[test]
    fn test_two_blobs_get_two_labels() {
        let mut cloud = blob(Point3::origin(), 0.05, 300);
        cloud.extend(blob(Point3::new(1.0, 0.0, 0.0), 0.05, 150).points);

        let labels = dbscan(&cloud, 0.03, 5);
        assert!(labels[..300].iter().all(|&l| l == 0));
        assert!(labels[300..].iter().all(|&l| l == 1));
    }

    #[test]
    fn test_largest_blob_selected() {
        let mut cloud = blob(Point3::new(1.0, 0.0, 0.0), 0.05, 150);
        cloud.extend(blob(Point3::origin(), 0.05, 300).points);

        let selection = cluster_and_select_largest(&cloud, &ClusterParams::default().with_eps(0.03).with_min_points(5));
        assert_eq!(selection.cluster_count, 2);
        assert_eq!(selection.selected_label, Some(1));
        assert_eq!(selection.cloud.len(), 300);
        let c = selection.cloud.centroid().unwrap();
        assert!(c.coords.norm() < 0.01);
    }

    #[test]
    fn test_tie_goes_to_lowest_label() {
        let mut cloud = blob(Point3::new(-1.0, 0.0, 0.0), 0.05, 200);
        cloud.extend(blob(Point3::new(1.0, 0.0, 0.0), 0.05, 200).points);

        let selection = cluster_and_select_largest(&cloud, &ClusterParams::default().with_eps(0.03).with_min_points(5));
        assert_eq!(selection.selected_label, Some(0));
        assert!(selection.cloud.centroid().unwrap().x < 0.0);
    }

    #[test]
    fn test_no_clusters_returns_input() {
        let cloud = blob(Point3::origin(), 1.0, 40);
        let selection = cluster_and_select_largest(&cloud, &ClusterParams::default());
        assert_eq!(selection.cluster_count, 0);
        assert_eq!(selection.cloud, cloud);
        assert_eq!(selection.noise_count, 40);
        assert!(selection.to_string().starts_with("no clusters"));
    }

    #[test]
    fn test_min_points_counts_self() {
        let mut cloud = PointCloud::new();
        cloud.push_coords(0.0, 0.0, 0.0);
        cloud.push_coords(0.01, 0.001, 0.0);
        // Each point sees itself and the other: exactly 2.
        assert_eq!(dbscan(&cloud, 0.02, 2), vec![0, 0]);
        assert_eq!(dbscan(&cloud, 0.02, 3), vec![NOISE, NOISE]);
    }

    #[test]
    fn test_border_point_joins_cluster() {
        let mut cloud = PointCloud::new();
        for i in 0..6 {
            cloud.push_coords(f64::from(i) * 0.001, f64::from(i) * 0.0001, 0.0);
        }
        // Within eps of the last core point only.
        cloud.push_coords(0.019, 0.0007, 0.0);

        let labels = dbscan(&cloud, 0.015, 4);
        assert_eq!(labels, vec![0; 7]);
    }
}
