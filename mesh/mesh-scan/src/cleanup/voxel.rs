//! Voxel grid downsampling.
//!
//! Space is divided into cubes of side `voxel_size`; every occupied cube
//! becomes a single point at the centroid of its members. Colors are
//! averaged, normals are averaged and renormalized. Output is sorted by
//! voxel key so the result does not depend on input order.

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use tracing::debug;

use mesh_types::VertexColor;

use crate::error::{ScanError, ScanResult};
use crate::pointcloud::{CloudPoint, PointCloud};

/// Default voxel edge length, in scan units (meters for most scanners).
pub const DEFAULT_VOXEL_SIZE: f64 = 0.002;

#[derive(Default)]
struct VoxelAccumulator {
    position: Vector3<f64>,
    normal: Vector3<f64>,
    normals: usize,
    colors: Vec<VertexColor>,
    count: usize,
}

/// Downsamples `cloud` to one point per occupied voxel.
///
/// # Errors
///
/// Returns [`ScanError::InvalidParameter`] if `voxel_size` is not a positive
/// finite number.
///
/// # Example
///
/// ```
/// use mesh_scan::cleanup::voxel_downsample;
/// use mesh_scan::pointcloud::PointCloud;
///
/// let mut cloud = PointCloud::new();
/// cloud.push_coords(0.0001, 0.0001, 0.0001);
/// cloud.push_coords(0.0003, 0.0003, 0.0003);
/// cloud.push_coords(1.0, 1.0, 1.0);
///
/// let down = voxel_downsample(&cloud, 0.002).unwrap();
/// assert_eq!(down.len(), 2);
/// ```
pub fn voxel_downsample(cloud: &PointCloud, voxel_size: f64) -> ScanResult<PointCloud> {
    if !(voxel_size.is_finite() && voxel_size > 0.0) {
        return Err(ScanError::InvalidParameter {
            reason: format!("voxel size must be positive, got {voxel_size}"),
        });
    }

    let mut cells: HashMap<[i64; 3], VoxelAccumulator> = HashMap::new();
    for point in &cloud.points {
        let cell = cells.entry(voxel_key(&point.position, voxel_size)).or_default();
        cell.position += point.position.coords;
        cell.count += 1;
        if let Some(n) = point.normal {
            cell.normal += n;
            cell.normals += 1;
        }
        if let Some(c) = point.color {
            cell.colors.push(c);
        }
    }

    let mut keys: Vec<[i64; 3]> = cells.keys().copied().collect();
    keys.sort_unstable();

    let mut out = PointCloud::with_capacity(keys.len());
    for key in keys {
        let Some(cell) = cells.remove(&key) else {
            continue;
        };
        #[allow(clippy::cast_precision_loss)]
        let position = Point3::from(cell.position / cell.count as f64);

        let normal = (cell.normals == cell.count)
            .then(|| cell.normal.try_normalize(1e-12))
            .flatten();
        let color = if cell.colors.len() == cell.count {
            VertexColor::mean(cell.colors)
        } else {
            None
        };

        out.push(CloudPoint {
            position,
            normal,
            color,
        });
    }

    debug!(
        voxel_size,
        before = cloud.len(),
        after = out.len(),
        "Voxel downsample"
    );
    Ok(out)
}

#[allow(clippy::cast_possible_truncation)]
fn voxel_key(p: &Point3<f64>, size: f64) -> [i64; 3] {
    [
        (p.x / size).floor() as i64,
        (p.y / size).floor() as i64,
        (p.z / size).floor() as i64,
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_centroid_and_color_average() {
        let mut cloud = PointCloud::new();
        cloud.push(CloudPoint {
            position: Point3::new(0.1, 0.1, 0.1),
            normal: Some(Vector3::x()),
            color: Some(VertexColor::new(0, 0, 0)),
        });
        cloud.push(CloudPoint {
            position: Point3::new(0.3, 0.3, 0.3),
            normal: Some(Vector3::y()),
            color: Some(VertexColor::new(100, 200, 50)),
        });

        let down = voxel_downsample(&cloud, 1.0).unwrap();
        assert_eq!(down.len(), 1);
        let p = &down.points[0];
        assert_relative_eq!(p.position.x, 0.2, epsilon = 1e-12);
        assert_eq!(p.color, Some(VertexColor::new(50, 100, 25)));
        let n = p.normal.unwrap();
        assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(n.x, n.y, epsilon = 1e-12);
    }

    #[test]
    fn test_negative_coordinates_use_floor() {
        let mut cloud = PointCloud::new();
        cloud.push_coords(-0.1, 0.0, 0.0);
        cloud.push_coords(0.1, 0.0, 0.0);
        assert_eq!(voxel_downsample(&cloud, 1.0).unwrap().len(), 2);
    }

    #[test]
    fn test_order_independent() {
        let mut a = PointCloud::new();
        for i in 0..50 {
            let t = f64::from(i) * 0.037;
            a.push_coords(t.sin(), t.cos(), t);
        }
        let mut b = a.clone();
        b.points.reverse();

        let da = voxel_downsample(&a, 0.1).unwrap();
        let db = voxel_downsample(&b, 0.1).unwrap();
        assert_eq!(da.len(), db.len());
        for (p, q) in da.points.iter().zip(&db.points) {
            assert_relative_eq!(p.position.x, q.position.x, epsilon = 1e-12);
            assert_relative_eq!(p.position.z, q.position.z, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_invalid_size() {
        let cloud = PointCloud::new();
        assert!(voxel_downsample(&cloud, 0.0).is_err());
        assert!(voxel_downsample(&cloud, f64::NAN).is_err());
        assert!(voxel_downsample(&cloud, 0.01).unwrap().is_empty());
    }
}
