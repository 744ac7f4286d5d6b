//! Resolved triangles and the shape measures used to reject slivers.

use nalgebra::{Point3, Vector3};

/// Three corner positions, counter-clockwise seen from the front.
///
/// ```
/// use mesh_types::{Point3, Triangle, Vector3};
///
/// let facet = Triangle::new(
///     Point3::new(0.0, 0.0, 0.2),
///     Point3::new(0.1, 0.0, 0.2),
///     Point3::new(0.0, 0.1, 0.2),
/// );
/// assert!((facet.area() - 0.005).abs() < 1e-12);
/// assert_eq!(facet.normal(), Some(Vector3::z()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// Corner 0.
    pub v0: Point3<f64>,
    /// Corner 1.
    pub v1: Point3<f64>,
    /// Corner 2.
    pub v2: Point3<f64>,
}

impl Triangle {
    /// A triangle from its corners.
    #[inline]
    #[must_use]
    pub const fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    /// `(v1 - v0) x (v2 - v0)`, twice the area in length.
    #[inline]
    #[must_use]
    pub fn normal_unnormalized(&self) -> Vector3<f64> {
        (self.v1 - self.v0).cross(&(self.v2 - self.v0))
    }

    /// Unit normal; `None` when the corners are collinear.
    #[must_use]
    pub fn normal(&self) -> Option<Vector3<f64>> {
        self.normal_unnormalized().try_normalize(f64::EPSILON)
    }

    /// Area.
    #[inline]
    #[must_use]
    pub fn area(&self) -> f64 {
        0.5 * self.normal_unnormalized().norm()
    }

    /// Side lengths opposite `v2`, `v0` and `v1`, in that order.
    #[must_use]
    pub fn edge_lengths(&self) -> [f64; 3] {
        [self.v0 - self.v1, self.v1 - self.v2, self.v2 - self.v0].map(|e| e.norm())
    }

    /// Circumscribed circle radius; infinite for a degenerate triangle.
    #[must_use]
    pub fn circumradius(&self) -> f64 {
        let area = self.area();
        if area <= f64::EPSILON {
            return f64::INFINITY;
        }
        let [a, b, c] = self.edge_lengths();
        a * b * c / (4.0 * area)
    }

    /// Inscribed circle radius.
    #[must_use]
    pub fn inradius(&self) -> f64 {
        let perimeter: f64 = self.edge_lengths().iter().sum();
        if perimeter <= f64::EPSILON {
            0.0
        } else {
            2.0 * self.area() / perimeter
        }
    }

    /// Radius ratio `2r / R`: 1 when equilateral, 0 when degenerate.
    ///
    /// ```
    /// use mesh_types::{Point3, Triangle};
    ///
    /// let sliver = Triangle::new(
    ///     Point3::new(0.0, 0.0, 0.0),
    ///     Point3::new(0.1, 0.0, 0.0),
    ///     Point3::new(0.05, 0.0005, 0.0),
    /// );
    /// assert!(sliver.quality() < 0.05);
    /// ```
    #[must_use]
    pub fn quality(&self) -> f64 {
        let circumradius = self.circumradius();
        if circumradius.is_finite() && circumradius > 0.0 {
            (2.0 * self.inradius() / circumradius).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tri(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> Triangle {
        Triangle::new(a.into(), b.into(), c.into())
    }

    #[test]
    fn three_four_five() {
        let t = tri([0.0; 3], [0.3, 0.0, 0.0], [0.0, 0.4, 0.0]);
        // The hypotenuse is a diameter of the circumcircle.
        assert_relative_eq!(t.circumradius(), 0.25, epsilon = 1e-12);
        assert_relative_eq!(t.inradius(), 0.1, epsilon = 1e-12);
        assert_relative_eq!(t.quality(), 0.8, epsilon = 1e-12);
    }

    #[test]
    fn equilateral_is_perfect() {
        let h = 3.0_f64.sqrt() / 2.0;
        let t = tri([0.0; 3], [1.0, 0.0, 0.0], [0.5, h, 0.0]);
        assert_relative_eq!(t.quality(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn collinear_has_no_normal_and_zero_quality() {
        let t = tri([0.0; 3], [0.1, 0.0, 0.0], [0.2, 0.0, 0.0]);
        assert!(t.normal().is_none());
        assert!(t.circumradius().is_infinite());
        assert_relative_eq!(t.quality(), 0.0);
    }

    #[test]
    fn normal_follows_winding() {
        let t = tri([0.0; 3], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]);
        assert_eq!(t.normal(), Some(-Vector3::z()));
    }
}
