//! Support-plane model for RANSAC.

use std::fmt;

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Infinite plane through `point` with unit `normal`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Plane {
    /// Any point on the plane.
    pub point: Vector3<f64>,
    /// Unit normal.
    pub normal: Vector3<f64>,
}

impl Plane {
    /// Normalizes `normal`; `None` when it has no direction.
    #[must_use]
    pub fn new(point: Vector3<f64>, normal: Vector3<f64>) -> Option<Self> {
        normal
            .try_normalize(f64::EPSILON)
            .map(|normal| Self { point, normal })
    }

    /// Plane through three points, normal by the right-hand rule.
    /// `None` when the points are collinear.
    #[must_use]
    pub fn from_points(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) -> Option<Self> {
        Self::new(a, (b - a).cross(&(c - a)))
    }

    /// Positive on the side the normal points to.
    #[must_use]
    pub fn signed_distance(&self, p: Vector3<f64>) -> f64 {
        (p - self.point).dot(&self.normal)
    }

    /// Unsigned distance.
    #[must_use]
    pub fn distance(&self, p: Vector3<f64>) -> f64 {
        self.signed_distance(p).abs()
    }

    /// Within `threshold` of the plane, boundary included.
    #[must_use]
    pub fn is_inlier(&self, p: Vector3<f64>, threshold: f64) -> bool {
        self.distance(p) <= threshold
    }

    /// `d` such that every point `p` on the plane has `normal · p = d`.
    #[must_use]
    pub fn offset(&self) -> f64 {
        self.point.dot(&self.normal)
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.normal;
        write!(f, "n=({:.4}, {:.4}, {:.4}) d={:.4}", n.x, n.y, n.z, self.offset())
    }
}
