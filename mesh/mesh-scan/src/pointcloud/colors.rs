//! Synthetic coloring for clouds captured without color.
//!
//! Scanners that only record geometry still need a color per point so the
//! texture stage has something to bake. [`generate_colors`] assigns one from
//! a [`ColorScheme`].

use mesh_types::VertexColor;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::PointCloud;

/// How synthetic colors are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ColorScheme {
    /// Blue at the lowest Z, red at the highest.
    #[default]
    Height,
    /// Blue at the centroid, red at the farthest point.
    Distance,
    /// Uniformly random RGB.
    Random,
}

/// Returns a copy of `cloud` with every point colored by `scheme`.
///
/// `seed` only affects [`ColorScheme::Random`]. Existing colors are
/// overwritten.
///
/// # Example
///
/// ```
/// use mesh_scan::pointcloud::colors::{generate_colors, ColorScheme};
/// use mesh_scan::pointcloud::PointCloud;
/// use mesh_types::VertexColor;
///
/// let mut cloud = PointCloud::new();
/// cloud.push_coords(0.0, 0.0, 0.0);
/// cloud.push_coords(0.0, 0.0, 1.0);
///
/// let colored = generate_colors(&cloud, ColorScheme::Height, None);
/// assert_eq!(colored.points[0].color, Some(VertexColor::new(0, 0, 255)));
/// assert_eq!(colored.points[1].color, Some(VertexColor::new(255, 0, 0)));
/// ```
#[must_use]
pub fn generate_colors(cloud: &PointCloud, scheme: ColorScheme, seed: Option<u64>) -> PointCloud {
    let mut out = cloud.clone();
    match scheme {
        ColorScheme::Height => {
            let heights: Vec<f64> = cloud.points.iter().map(|p| p.position.z).collect();
            paint_ramp(&mut out, &heights);
        }
        ColorScheme::Distance => {
            let center = cloud.centroid().unwrap_or_else(nalgebra::Point3::origin);
            let distances: Vec<f64> = cloud
                .points
                .iter()
                .map(|p| (p.position - center).norm())
                .collect();
            paint_ramp(&mut out, &distances);
        }
        ColorScheme::Random => {
            let mut rng: Box<dyn RngCore> = if let Some(seed) = seed {
                Box::new(StdRng::seed_from_u64(seed))
            } else {
                Box::new(rand::thread_rng())
            };
            for point in &mut out.points {
                point.color = Some(VertexColor::new(rng.gen(), rng.gen(), rng.gen()));
            }
        }
    }
    out
}

/// Red for the largest value, blue for the smallest. A constant field maps
/// to blue.
#[allow(clippy::cast_possible_truncation)]
fn paint_ramp(cloud: &mut PointCloud, values: &[f64]) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    for (point, &v) in cloud.points.iter_mut().zip(values) {
        let t = if range > 0.0 { (v - min) / range } else { 0.0 };
        let t = t as f32;
        point.color = Some(VertexColor::from_float(t, 0.0, 1.0 - t));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn column() -> PointCloud {
        let mut cloud = PointCloud::new();
        for i in 0..5 {
            cloud.push_coords(0.0, 0.0, f64::from(i));
        }
        cloud
    }

    #[test]
    fn test_height_ramp_midpoint() {
        let colored = generate_colors(&column(), ColorScheme::Height, None);
        assert!(colored.has_colors());
        assert_eq!(colored.points[2].color, Some(VertexColor::new(128, 0, 128)));
    }

    #[test]
    fn test_distance_ramp() {
        let colored = generate_colors(&column(), ColorScheme::Distance, None);
        // Centroid is the middle point; the ends are farthest.
        assert_eq!(colored.points[2].color, Some(VertexColor::new(0, 0, 255)));
        assert_eq!(colored.points[0].color, Some(VertexColor::new(255, 0, 0)));
        assert_eq!(colored.points[4].color, Some(VertexColor::new(255, 0, 0)));
    }

    #[test]
    fn test_flat_cloud_is_blue() {
        let mut cloud = PointCloud::new();
        cloud.push_coords(0.0, 0.0, 1.0);
        cloud.push_coords(1.0, 0.0, 1.0);
        let colored = generate_colors(&cloud, ColorScheme::Height, None);
        assert!(colored
            .points
            .iter()
            .all(|p| p.color == Some(VertexColor::new(0, 0, 255))));
    }

    #[test]
    fn test_random_is_seeded() {
        let a = generate_colors(&column(), ColorScheme::Random, Some(7));
        let b = generate_colors(&column(), ColorScheme::Random, Some(7));
        assert_eq!(a, b);
        assert!(a.has_colors());
    }

    #[test]
    fn test_empty_cloud() {
        assert!(generate_colors(&PointCloud::new(), ColorScheme::Height, None).is_empty());
    }
}
