//! 3D convex hull and uniform surface sampling.
//!
//! The hull is built incrementally: start from an extreme tetrahedron, then
//! repeatedly take the point farthest outside some face, delete every face
//! it can see and stitch the horizon to it. Distances are compared against a
//! tolerance proportional to the cloud's bounding-box diagonal, so the
//! result does not depend on the unit the scan was recorded in.
//!
//! # Example
//!
//! ```
//! use mesh_scan::hull::convex_hull;
//! use mesh_scan::pointcloud::PointCloud;
//! use nalgebra::Point3;
//!
//! let mut positions = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//!     Point3::new(0.0, 0.0, 1.0),
//! ];
//! positions.push(Point3::new(0.1, 0.1, 0.1)); // interior
//!
//! let hull = convex_hull(&PointCloud::from_positions(&positions)).unwrap();
//! assert_eq!(hull.vertex_count(), 4);
//! assert_eq!(hull.face_count(), 4);
//! ```

use hashbrown::HashSet;
use mesh_types::IndexedMesh;
use nalgebra::{Point3, Vector3};
use rand::distributions::{Distribution, WeightedIndex};
use rand::prelude::*;
use tracing::debug;

use crate::error::{ScanError, ScanResult};
use crate::pointcloud::{CloudPoint, PointCloud};

/// Relative tolerance for "outside a face", scaled by the bbox diagonal.
const HULL_TOLERANCE: f64 = 1e-9;

struct HullFace {
    v: [usize; 3],
    normal: Vector3<f64>,
    offset: f64,
    alive: bool,
    outside: Vec<usize>,
}

impl HullFace {
    fn new(v: [usize; 3], points: &[Point3<f64>]) -> Self {
        let [a, b, c] = v.map(|i| points[i]);
        let normal = (b - a).cross(&(c - a));
        let normal = normal.try_normalize(0.0).unwrap_or_else(Vector3::zeros);
        Self {
            v,
            normal,
            offset: normal.dot(&a.coords),
            alive: true,
            outside: Vec::new(),
        }
    }

    fn distance(&self, p: &Point3<f64>) -> f64 {
        self.normal.dot(&p.coords) - self.offset
    }
}

/// Computes the convex hull of `cloud` as an outward-wound triangle mesh.
///
/// Only hull vertices are kept; they carry the attributes of the cloud
/// points they came from.
///
/// # Errors
///
/// - [`ScanError::InsufficientPoints`] for fewer than 4 points
/// - [`ScanError::DegenerateGeometry`] if all points are collinear or
///   coplanar
pub fn convex_hull(cloud: &PointCloud) -> ScanResult<IndexedMesh> {
    let n = cloud.len();
    if n < 4 {
        return Err(ScanError::InsufficientPoints {
            required: 4,
            actual: n,
        });
    }

    let points: Vec<Point3<f64>> = cloud.positions().copied().collect();
    let diag = cloud.bounds().map_or(0.0, |b| b.diagonal());
    let eps = (diag * HULL_TOLERANCE).max(f64::MIN_POSITIVE);

    let [i0, i1, i2, i3] = initial_simplex(&points, eps)?;

    let mut faces: Vec<HullFace> = Vec::new();
    let centroid = Point3::from(
        (points[i0].coords + points[i1].coords + points[i2].coords + points[i3].coords) / 4.0,
    );
    for tri in [[i0, i1, i2], [i0, i2, i3], [i0, i3, i1], [i1, i3, i2]] {
        let mut face = HullFace::new(tri, &points);
        if face.distance(&centroid) > 0.0 {
            face = HullFace::new([tri[0], tri[2], tri[1]], &points);
        }
        faces.push(face);
    }

    for (i, p) in points.iter().enumerate() {
        if [i0, i1, i2, i3].contains(&i) {
            continue;
        }
        if let Some(face) = faces.iter_mut().find(|f| f.distance(p) > eps) {
            face.outside.push(i);
        }
    }

    while let Some(fi) = faces.iter().position(|f| f.alive && !f.outside.is_empty()) {
        // Farthest outside point of this face.
        let Some(&apex) = faces[fi].outside.iter().max_by(|&&a, &&b| {
            faces[fi]
                .distance(&points[a])
                .total_cmp(&faces[fi].distance(&points[b]))
        }) else {
            break;
        };
        let apex_pos = points[apex];

        let visible: Vec<usize> = faces
            .iter()
            .enumerate()
            .filter(|(_, f)| f.alive && f.distance(&apex_pos) > eps)
            .map(|(i, _)| i)
            .collect();

        let mut visible_edges: HashSet<(usize, usize)> = HashSet::new();
        for &f in &visible {
            let [a, b, c] = faces[f].v;
            visible_edges.extend([(a, b), (b, c), (c, a)]);
        }

        let mut orphans = Vec::new();
        let mut horizon = Vec::new();
        for &f in &visible {
            faces[f].alive = false;
            orphans.append(&mut faces[f].outside);
            let [a, b, c] = faces[f].v;
            for (u, w) in [(a, b), (b, c), (c, a)] {
                if !visible_edges.contains(&(w, u)) {
                    horizon.push((u, w));
                }
            }
        }

        let first_new = faces.len();
        for (u, w) in horizon {
            faces.push(HullFace::new([u, w, apex], &points));
        }

        for i in orphans {
            if i == apex {
                continue;
            }
            let p = &points[i];
            if let Some(face) = faces[first_new..].iter_mut().find(|f| f.distance(p) > eps) {
                face.outside.push(i);
            }
        }
    }

    // Compact to the vertices actually used.
    let mut remap = vec![u32::MAX; n];
    let mut mesh = IndexedMesh::new();
    for face in faces.iter().filter(|f| f.alive) {
        let mut tri = [0u32; 3];
        for (slot, &v) in tri.iter_mut().zip(&face.v) {
            if remap[v] == u32::MAX {
                remap[v] = u32::try_from(mesh.vertices.len()).map_err(|_| {
                    ScanError::ReconstructionFailed {
                        reason: "hull has too many vertices".to_string(),
                    }
                })?;
                mesh.vertices.push(cloud.points[v].to_vertex());
            }
            *slot = remap[v];
        }
        mesh.faces.push(tri);
    }

    debug!(
        points = n,
        hull_vertices = mesh.vertex_count(),
        hull_faces = mesh.face_count(),
        "Convex hull"
    );
    Ok(mesh)
}

/// Four affinely independent extreme points.
fn initial_simplex(points: &[Point3<f64>], eps: f64) -> ScanResult<[usize; 4]> {
    let degenerate = |reason: &str| ScanError::DegenerateGeometry {
        reason: reason.to_string(),
    };

    let i0 = argmax(points, |p| -p.x).ok_or_else(|| degenerate("no points"))?;
    let p0 = points[i0];

    let i1 = argmax(points, |p| (p - p0).norm_squared()).ok_or_else(|| degenerate("no points"))?;
    let p1 = points[i1];
    let dir = (p1 - p0).try_normalize(0.0).ok_or_else(|| degenerate("all points coincide"))?;

    let line_distance = |p: &Point3<f64>| {
        let d = p - p0;
        (d - dir * d.dot(&dir)).norm()
    };
    let i2 = argmax(points, line_distance).ok_or_else(|| degenerate("no points"))?;
    if line_distance(&points[i2]) <= eps {
        return Err(degenerate("all points are collinear"));
    }
    let p2 = points[i2];

    let normal = (p1 - p0).cross(&(p2 - p0)).normalize();
    let plane_distance = |p: &Point3<f64>| normal.dot(&(p - p0)).abs();
    let i3 = argmax(points, plane_distance).ok_or_else(|| degenerate("no points"))?;
    if plane_distance(&points[i3]) <= eps {
        return Err(degenerate("all points are coplanar"));
    }

    Ok([i0, i1, i2, i3])
}

fn argmax(points: &[Point3<f64>], key: impl Fn(&Point3<f64>) -> f64) -> Option<usize> {
    points
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| key(a).total_cmp(&key(b)))
        .map(|(i, _)| i)
}

/// Samples `count` points uniformly over the surface of `mesh`.
///
/// Triangles are chosen with probability proportional to area and points
/// are placed with uniform barycentric coordinates. Each sample carries the
/// unit normal of its triangle.
///
/// # Errors
///
/// Returns [`ScanError::DegenerateGeometry`] if the mesh has no triangle
/// with positive area.
///
/// # Example
///
/// ```
/// use mesh_scan::hull::sample_surface;
/// use mesh_types::unit_cube;
///
/// let samples = sample_surface(&unit_cube(), 600, Some(1)).unwrap();
/// assert_eq!(samples.len(), 600);
/// assert!(samples.has_normals());
/// ```
pub fn sample_surface(mesh: &IndexedMesh, count: usize, seed: Option<u64>) -> ScanResult<PointCloud> {
    let triangles: Vec<_> = mesh.triangles().collect();
    let areas: Vec<f64> = triangles.iter().map(mesh_types::Triangle::area).collect();
    let chooser = WeightedIndex::new(&areas).map_err(|e| ScanError::DegenerateGeometry {
        reason: format!("cannot sample surface: {e}"),
    })?;

    let mut rng: Box<dyn RngCore> = if let Some(seed) = seed {
        Box::new(StdRng::seed_from_u64(seed))
    } else {
        Box::new(rand::thread_rng())
    };

    let mut samples = PointCloud::with_capacity(count);
    for _ in 0..count {
        let tri = &triangles[chooser.sample(&mut rng)];
        let (mut u, mut v): (f64, f64) = (rng.gen(), rng.gen());
        if u + v > 1.0 {
            u = 1.0 - u;
            v = 1.0 - v;
        }
        let position = tri.v0 + (tri.v1 - tri.v0) * u + (tri.v2 - tri.v0) * v;
        samples.push(CloudPoint {
            position,
            normal: tri.normal(),
            color: None,
        });
    }
    Ok(samples)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_repair::validate_mesh;
    use mesh_types::Vertex;

    fn fibonacci_sphere(count: usize, radius: f64) -> PointCloud {
        let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
        (0..count)
            .map(|i| {
                let y = 1.0 - 2.0 * (i as f64 + 0.5) / count as f64;
                let r = (1.0 - y * y).sqrt();
                let theta = golden * i as f64;
                Point3::new(r * theta.cos() * radius, y * radius, r * theta.sin() * radius)
            })
            .collect()
    }

    #[test]
    fn test_sphere_hull_is_closed_and_outward() {
        let cloud = fibonacci_sphere(200, 1.0);
        let hull = convex_hull(&cloud).unwrap();

        // Every point of a sphere sample is extreme.
        assert_eq!(hull.vertex_count(), 200);
        assert_eq!(hull.face_count(), 2 * 200 - 4);
        let report = validate_mesh(&hull);
        assert!(report.is_closed_manifold(), "{report}");
        assert!(hull.signed_volume() > 0.0);
    }

    #[test]
    fn test_interior_points_are_dropped() {
        let mut cloud = fibonacci_sphere(100, 1.0);
        for i in 0..50 {
            let t = i as f64 * 0.1;
            cloud.push_coords(t.sin() * 0.3, t.cos() * 0.3, (t * 0.7).sin() * 0.3);
        }
        let hull = convex_hull(&cloud).unwrap();
        assert_eq!(hull.vertex_count(), 100);
    }

    #[test]
    fn test_cube_hull_volume() {
        let mut cloud = PointCloud::new();
        for &x in &[0.0, 2.0] {
            for &y in &[0.0, 2.0] {
                for &z in &[0.0, 2.0] {
                    cloud.push_coords(x, y, z);
                }
            }
        }
        cloud.push_coords(1.0, 1.0, 1.0);
        let hull = convex_hull(&cloud).unwrap();
        assert_relative_eq!(hull.signed_volume(), 8.0, epsilon = 1e-9);
        assert_relative_eq!(hull.surface_area(), 24.0, epsilon = 1e-9);
    }

    #[test]
    fn test_coplanar_is_degenerate() {
        let cloud: PointCloud = (0..20)
            .map(|i| Point3::new(f64::from(i).sin(), f64::from(i).cos(), 0.5))
            .collect();
        let err = convex_hull(&cloud).unwrap_err();
        assert!(matches!(err, ScanError::DegenerateGeometry { .. }), "{err}");
    }

    #[test]
    fn test_too_few_points() {
        let cloud = fibonacci_sphere(3, 1.0);
        assert!(matches!(
            convex_hull(&cloud),
            Err(ScanError::InsufficientPoints { .. })
        ));
    }

    #[test]
    fn test_samples_lie_on_surface() {
        let hull = convex_hull(&fibonacci_sphere(100, 1.0)).unwrap();
        let samples = sample_surface(&hull, 2000, Some(3)).unwrap();
        assert_eq!(samples.len(), 2000);
        for p in &samples.points {
            let r = p.position.coords.norm();
            assert!(r <= 1.0 + 1e-9 && r > 0.85, "radius {r}");
        }
    }

    #[test]
    fn test_sampling_is_area_weighted() {
        // Two triangles, the second nine times larger.
        let mut mesh = IndexedMesh::new();
        for [x, y] in [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [10.0, 0.0], [13.0, 0.0], [10.0, 3.0]] {
            mesh.vertices.push(Vertex::from_coords(x, y, 0.0));
        }
        mesh.faces.push([0, 1, 2]);
        mesh.faces.push([3, 4, 5]);

        let samples = sample_surface(&mesh, 5000, Some(11)).unwrap();
        let big = samples.points.iter().filter(|p| p.position.x >= 10.0).count();
        let ratio = big as f64 / 5000.0;
        assert!((ratio - 0.9).abs() < 0.03, "ratio {ratio}");
    }

    #[test]
    fn test_sampling_empty_mesh_fails() {
        assert!(sample_surface(&IndexedMesh::new(), 10, None).is_err());
    }
}
