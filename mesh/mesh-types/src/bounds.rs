//! Axis-aligned bounds of clouds and meshes.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Axis-aligned box. The default box is empty (inverted) so that
/// [`Aabb::expand_to_include`] can grow it from nothing.
///
/// ```
/// use mesh_types::{Aabb, Point3};
///
/// let table = [Point3::new(-0.5, -0.4, 0.0), Point3::new(0.5, 0.4, 0.02)];
/// let aabb = Aabb::from_points(table.iter());
/// assert_eq!(aabb.center(), Point3::new(0.0, 0.0, 0.01));
/// assert!((aabb.size().z - 0.02).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aabb {
    /// Lowest corner.
    pub min: Point3<f64>,
    /// Highest corner.
    pub max: Point3<f64>,
}

impl Aabb {
    /// The box spanned by two opposite corners, given in any order.
    #[must_use]
    pub fn new(a: Point3<f64>, b: Point3<f64>) -> Self {
        Self {
            min: a.inf(&b),
            max: a.sup(&b),
        }
    }

    /// A box containing nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            min: Point3::from([f64::INFINITY; 3]),
            max: Point3::from([f64::NEG_INFINITY; 3]),
        }
    }

    /// Smallest box holding every point; empty for no points.
    #[must_use]
    pub fn from_points<'a>(points: impl Iterator<Item = &'a Point3<f64>>) -> Self {
        points.fold(Self::empty(), |mut aabb, p| {
            aabb.expand_to_include(p);
            aabb
        })
    }

    /// True when some axis has `min > max`.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }

    /// Width, depth and height.
    #[inline]
    #[must_use]
    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Midpoint.
    #[inline]
    #[must_use]
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Corner-to-corner length; zero for an empty box.
    #[inline]
    #[must_use]
    pub fn diagonal(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.size().norm()
        }
    }

    /// Grows the box to cover `point`.
    pub fn expand_to_include(&mut self, point: &Point3<f64>) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn corners_in_any_order() {
        let aabb = Aabb::new(Point3::new(0.3, -0.1, 0.2), Point3::new(-0.3, 0.1, 0.0));
        assert_eq!(aabb.min, Point3::new(-0.3, -0.1, 0.0));
        assert_eq!(aabb.max, Point3::new(0.3, 0.1, 0.2));
    }

    #[test]
    fn empty_box_has_no_extent() {
        let aabb = Aabb::from_points(std::iter::empty());
        assert!(aabb.is_empty());
        assert_relative_eq!(aabb.diagonal(), 0.0);
        assert_eq!(aabb, Aabb::default());
    }

    #[test]
    fn single_point_box_is_not_empty() {
        let p = Point3::new(1.0, 2.0, 3.0);
        let aabb = Aabb::from_points(std::iter::once(&p));
        assert!(!aabb.is_empty());
        assert_eq!(aabb.center(), p);
        assert_relative_eq!(aabb.diagonal(), 0.0);
    }

    #[test]
    fn diagonal_of_a_slab() {
        let aabb = Aabb::new(Point3::origin(), Point3::new(0.3, 0.4, 0.0));
        assert_relative_eq!(aabb.diagonal(), 0.5, epsilon = 1e-12);
    }
}
