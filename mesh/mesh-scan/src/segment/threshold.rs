//! Plane distance thresholds that scale with the object.
//!
//! A fixed inlier distance either eats the bottom of short objects or
//! leaves a rim of table under tall ones. [`AdaptiveThreshold`] interpolates
//! the distance from the cloud's extent along the up axis.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::pointcloud::PointCloud;

/// Linear map from object height to RANSAC distance threshold.
///
/// `t = clamp((height - min_height) / (max_height - min_height), 0, 1)` and
/// the threshold is `min_distance + t * (max_distance - min_distance)`.
///
/// # Example
///
/// ```
/// use mesh_scan::segment::AdaptiveThreshold;
///
/// let adaptive = AdaptiveThreshold::default();
/// assert!((adaptive.threshold_for_height(0.03) - 0.006).abs() < 1e-12);
/// assert!((adaptive.threshold_for_height(0.20) - 0.03).abs() < 1e-12);
/// assert!((adaptive.threshold_for_height(0.115) - 0.018).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct AdaptiveThreshold {
    /// Height at or below which `min_distance` applies. Default: 0.03.
    pub min_height: f64,
    /// Height at or above which `max_distance` applies. Default: 0.20.
    pub max_height: f64,
    /// Threshold for short objects. Default: 0.006.
    pub min_distance: f64,
    /// Threshold for tall objects. Default: 0.03.
    pub max_distance: f64,
    /// Direction height is measured along. Default: +Z.
    pub up_axis: Vector3<f64>,
}

impl Default for AdaptiveThreshold {
    fn default() -> Self {
        Self {
            min_height: 0.03,
            max_height: 0.20,
            min_distance: 0.006,
            max_distance: 0.03,
            up_axis: Vector3::z(),
        }
    }
}

impl AdaptiveThreshold {
    /// Sets the height range.
    #[must_use]
    pub const fn with_height_range(mut self, min_height: f64, max_height: f64) -> Self {
        self.min_height = min_height;
        self.max_height = max_height;
        self
    }

    /// Sets the threshold range.
    #[must_use]
    pub const fn with_distance_range(mut self, min_distance: f64, max_distance: f64) -> Self {
        self.min_distance = min_distance;
        self.max_distance = max_distance;
        self
    }

    /// Sets the up axis.
    #[must_use]
    pub fn with_up_axis(mut self, up_axis: Vector3<f64>) -> Self {
        self.up_axis = up_axis;
        self
    }

    /// Threshold for an object of the given height.
    #[must_use]
    pub fn threshold_for_height(&self, height: f64) -> f64 {
        let span = self.max_height - self.min_height;
        let t = if span > 0.0 {
            ((height - self.min_height) / span).clamp(0.0, 1.0)
        } else if height >= self.max_height {
            1.0
        } else {
            0.0
        };
        t.mul_add(self.max_distance - self.min_distance, self.min_distance)
    }

    /// Extent of `cloud` along the up axis; zero for an empty cloud.
    #[must_use]
    pub fn height_of(&self, cloud: &PointCloud) -> f64 {
        let up = self.up_axis.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::z);
        let (lo, hi) = cloud
            .positions()
            .map(|p| p.coords.dot(&up))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), h| {
                (lo.min(h), hi.max(h))
            });
        if hi >= lo {
            hi - lo
        } else {
            0.0
        }
    }

    /// Threshold for `cloud`.
    #[must_use]
    pub fn threshold_for(&self, cloud: &PointCloud) -> f64 {
        self.threshold_for_height(self.height_of(cloud))
    }
}

/// How the plane inlier distance is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PlaneThreshold {
    /// Scale with the object's height.
    Adaptive(AdaptiveThreshold),
    /// Always use this distance.
    Fixed(f64),
}

impl Default for PlaneThreshold {
    fn default() -> Self {
        Self::Adaptive(AdaptiveThreshold::default())
    }
}

impl PlaneThreshold {
    /// The distance to use for `cloud`.
    #[must_use]
    pub fn resolve(&self, cloud: &PointCloud) -> f64 {
        match self {
            Self::Adaptive(adaptive) => adaptive.threshold_for(cloud),
            Self::Fixed(distance) => *distance,
        }
    }
}
