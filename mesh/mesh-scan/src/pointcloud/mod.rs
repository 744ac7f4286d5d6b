//! Scanned points and the cloud that holds them.
//!
//! Colors and normals are stored per [`CloudPoint`]. A cloud counts as
//! colored (or oriented) only when every one of its points is.
//!
//! ```
//! use mesh_scan::pointcloud::PointCloud;
//! use nalgebra::Point3;
//!
//! let cloud: PointCloud = [[0.0, 0.0, 0.1], [0.2, 0.0, 0.1], [0.0, 0.2, 0.1]]
//!     .into_iter()
//!     .map(Point3::from)
//!     .collect();
//! assert_eq!(cloud.len(), 3);
//! assert!(!cloud.has_colors());
//! ```

pub mod colors;
pub mod io;
pub mod normals;
pub mod ply;

use kiddo::SquaredEuclidean;
use mesh_types::{Aabb, IndexedMesh, Vertex, VertexColor};
use nalgebra::{Point3, Vector3};

/// k-d tree over cloud positions, keyed by point index.
///
/// Buckets are larger than kiddo's default so scans quantized to a coarse
/// grid (many points sharing one coordinate) still build.
pub type PointTree = kiddo::float::kdtree::KdTree<f64, u64, 3, 256, u32>;

/// One scanned sample: a position, plus a normal and color when the
/// scanner (or a later stage) provides them.
///
/// ```
/// use mesh_scan::pointcloud::CloudPoint;
/// use mesh_types::VertexColor;
/// use nalgebra::{Point3, Vector3};
///
/// let bare = CloudPoint::from_coords(0.1, 0.2, 0.3);
/// let lit = CloudPoint::with_color(bare.position, VertexColor::new(200, 30, 30));
/// let oriented = CloudPoint::with_normal(bare.position, Vector3::z());
/// assert!(!bare.has_color() && lit.has_color() && oriented.has_normal());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CloudPoint {
    /// Where the sample lies.
    pub position: Point3<f64>,
    /// Unit surface normal.
    pub normal: Option<Vector3<f64>>,
    /// Sampled color.
    pub color: Option<VertexColor>,
}

impl CloudPoint {
    /// A sample with no attributes.
    #[must_use]
    pub const fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            normal: None,
            color: None,
        }
    }

    /// Shorthand for [`Self::new`] from raw coordinates.
    #[must_use]
    pub const fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }

    /// A sample carrying a normal.
    #[must_use]
    pub const fn with_normal(position: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self {
            normal: Some(normal),
            ..Self::new(position)
        }
    }

    /// A sample carrying a color.
    #[must_use]
    pub const fn with_color(position: Point3<f64>, color: VertexColor) -> Self {
        Self {
            color: Some(color),
            ..Self::new(position)
        }
    }

    /// The sample as a mesh vertex; normal and color carry over.
    #[must_use]
    pub fn to_vertex(&self) -> Vertex {
        let mut vertex = Vertex::new(self.position);
        vertex.attributes.normal = self.normal;
        vertex.attributes.color = self.color;
        vertex
    }

    /// Whether a normal is attached.
    #[must_use]
    pub const fn has_normal(&self) -> bool {
        self.normal.is_some()
    }

    /// Whether a color is attached.
    #[must_use]
    pub const fn has_color(&self) -> bool {
        self.color.is_some()
    }

    /// Position as a k-d tree query.
    #[must_use]
    pub fn coords(&self) -> [f64; 3] {
        [self.position.x, self.position.y, self.position.z]
    }
}

impl Default for CloudPoint {
    fn default() -> Self {
        Self::from_coords(0.0, 0.0, 0.0)
    }
}

/// An unordered set of [`CloudPoint`]s.
///
/// Every pipeline stage takes a cloud by reference and returns a new one;
/// indices into [`Self::points`] are what clustering and plane fitting
/// hand back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    /// Samples, in load order.
    pub points: Vec<CloudPoint>,
}

impl PointCloud {
    /// No points.
    #[must_use]
    pub const fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// No points, with room for `capacity`.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Attribute-free cloud over `positions`.
    #[must_use]
    pub fn from_positions(positions: &[Point3<f64>]) -> Self {
        positions.iter().copied().collect()
    }

    /// The vertices of `mesh` as a cloud, keeping normals and colors.
    #[must_use]
    pub fn from_mesh(mesh: &IndexedMesh) -> Self {
        mesh.vertices
            .iter()
            .map(|v| CloudPoint {
                position: v.position,
                normal: v.attributes.normal,
                color: v.attributes.color,
            })
            .collect()
    }

    /// Point count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether there are no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True when the cloud is non-empty and every point has a normal.
    #[must_use]
    pub fn has_normals(&self) -> bool {
        !self.is_empty() && self.points.iter().all(CloudPoint::has_normal)
    }

    /// True when the cloud is non-empty and every point has a color.
    #[must_use]
    pub fn has_colors(&self) -> bool {
        !self.is_empty() && self.points.iter().all(CloudPoint::has_color)
    }

    /// Appends `point`.
    pub fn push(&mut self, point: CloudPoint) {
        self.points.push(point);
    }

    /// Appends a bare point at `(x, y, z)`.
    pub fn push_coords(&mut self, x: f64, y: f64, z: f64) {
        self.push(CloudPoint::from_coords(x, y, z));
    }

    /// Positions in cloud order.
    pub fn positions(&self) -> impl Iterator<Item = &Point3<f64>> + '_ {
        self.points.iter().map(|p| &p.position)
    }

    /// Axis-aligned bounds, `None` for an empty cloud.
    ///
    /// ```
    /// use mesh_scan::pointcloud::PointCloud;
    /// use nalgebra::Point3;
    ///
    /// let cloud = PointCloud::from_positions(&[
    ///     Point3::new(-0.5, 0.0, 0.02),
    ///     Point3::new(0.5, 0.25, 0.3),
    /// ]);
    /// let aabb = cloud.bounds().unwrap();
    /// assert_eq!((aabb.min.x, aabb.max.z), (-0.5, 0.3));
    /// ```
    #[must_use]
    pub fn bounds(&self) -> Option<Aabb> {
        (!self.is_empty()).then(|| Aabb::from_points(self.positions()))
    }

    /// Mean position, `None` for an empty cloud.
    #[must_use]
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.len() as f64;
        let total = self
            .positions()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords);
        Some(Point3::from(total / n))
    }

    /// Shifts every point by `offset`.
    pub fn translate(&mut self, offset: Vector3<f64>) {
        self.points
            .iter_mut()
            .for_each(|p| p.position += offset);
    }

    /// Average color over all colored points, or `None` if no point has one.
    #[must_use]
    pub fn mean_color(&self) -> Option<VertexColor> {
        VertexColor::mean(self.points.iter().filter_map(|p| p.color))
    }

    /// Sets every point's color.
    pub fn paint_uniform(&mut self, color: VertexColor) {
        for point in &mut self.points {
            point.color = Some(color);
        }
    }

    /// New cloud holding the points at `indices`, in that order.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_scan::pointcloud::PointCloud;
    ///
    /// let mut cloud = PointCloud::new();
    /// for i in 0..5 {
    ///     cloud.push_coords(f64::from(i), 0.0, 0.0);
    /// }
    /// let picked = cloud.select(&[4, 1]);
    /// assert_eq!(picked.points[0].position.x, 4.0);
    /// assert_eq!(cloud.select_inverted(&[4, 1]).len(), 3);
    /// ```
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        indices
            .iter()
            .filter_map(|&i| self.points.get(i).cloned())
            .collect()
    }

    /// New cloud holding every point *not* in `indices`, in cloud order.
    #[must_use]
    pub fn select_inverted(&self, indices: &[usize]) -> Self {
        let mut excluded = vec![false; self.points.len()];
        for &i in indices {
            if let Some(flag) = excluded.get_mut(i) {
                *flag = true;
            }
        }
        self.points
            .iter()
            .zip(excluded)
            .filter_map(|(p, skip)| (!skip).then(|| p.clone()))
            .collect()
    }

    /// New cloud holding the points whose mask entry is true.
    #[must_use]
    pub fn select_mask(&self, mask: &[bool]) -> Self {
        self.points
            .iter()
            .zip(mask)
            .filter_map(|(p, &keep)| keep.then(|| p.clone()))
            .collect()
    }

    /// Builds a k-d tree over the positions; items are point indices.
    #[must_use]
    pub fn kdtree(&self) -> PointTree {
        let mut tree = PointTree::new();
        for (i, point) in self.points.iter().enumerate() {
            tree.add(&point.coords(), i as u64);
        }
        tree
    }

    /// Distance from every point to its nearest *other* point.
    ///
    /// A single-point cloud yields `[0.0]`.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_scan::pointcloud::PointCloud;
    ///
    /// let mut cloud = PointCloud::new();
    /// cloud.push_coords(0.0, 0.0, 0.0);
    /// cloud.push_coords(1.0, 0.1, 0.0);
    /// cloud.push_coords(3.0, 0.2, 0.0);
    ///
    /// let d = cloud.nearest_neighbor_distances();
    /// assert!((d[0] - 1.01_f64.sqrt()).abs() < 1e-12);
    /// ```
    #[must_use]
    pub fn nearest_neighbor_distances(&self) -> Vec<f64> {
        let tree = self.kdtree();
        self.points
            .iter()
            .enumerate()
            .map(|(i, point)| {
                tree.nearest_n::<SquaredEuclidean>(&point.coords(), 2)
                    .iter()
                    .find(|n| n.item != i as u64)
                    .map_or(0.0, |n| n.distance.sqrt())
            })
            .collect()
    }

    /// Converts the cloud to a face-less mesh whose vertices carry the
    /// point attributes.
    #[must_use]
    pub fn to_vertices(&self) -> Vec<Vertex> {
        self.points.iter().map(CloudPoint::to_vertex).collect()
    }
}

impl FromIterator<CloudPoint> for PointCloud {
    fn from_iter<I: IntoIterator<Item = CloudPoint>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl FromIterator<Point3<f64>> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point3<f64>>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().map(CloudPoint::new).collect(),
        }
    }
}

impl Extend<CloudPoint> for PointCloud {
    fn extend<I: IntoIterator<Item = CloudPoint>>(&mut self, iter: I) {
        self.points.extend(iter);
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line(n: u32) -> PointCloud {
        (0..n).map(|i| Point3::new(f64::from(i) * 0.1, 0.0, 0.05)).collect()
    }

    #[test]
    fn test_vertex_conversion_carries_attributes() {
        let mut point = CloudPoint::with_color(Point3::new(0.3, -0.1, 0.2), VertexColor::new(10, 20, 30));
        point.normal = Some(Vector3::y());
        let vertex = point.to_vertex();
        assert_eq!(vertex.position, point.position);
        assert_eq!(vertex.color(), point.color);
        assert_eq!(vertex.normal(), Some(Vector3::y()));

        let back = PointCloud::from_mesh(&IndexedMesh::from_parts(vec![vertex], vec![]));
        assert_eq!(back.points[0], point);
    }

    #[test]
    fn test_empty_cloud_has_nothing() {
        let cloud = PointCloud::default();
        assert!(cloud.is_empty());
        assert!(!cloud.has_colors() && !cloud.has_normals());
        assert!(cloud.bounds().is_none() && cloud.centroid().is_none());
        assert!(cloud.mean_color().is_none());
    }

    #[test]
    fn test_centroid_and_translate() {
        let mut cloud = line(5);
        let c = cloud.centroid().unwrap();
        assert_relative_eq!(c.x, 0.2, epsilon = 1e-12);
        assert_relative_eq!(c.z, 0.05);

        cloud.translate(Vector3::new(-0.2, 1.0, -0.05));
        let c = cloud.centroid().unwrap();
        assert_relative_eq!(c.coords, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(cloud.bounds().unwrap().max.x, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_one_uncolored_point_uncolors_the_cloud() {
        let mut cloud = line(3);
        cloud.paint_uniform(VertexColor::new(40, 80, 120));
        assert!(cloud.has_colors());
        assert_eq!(cloud.mean_color(), Some(VertexColor::new(40, 80, 120)));

        cloud.push_coords(9.0, 9.0, 9.0);
        assert!(!cloud.has_colors());
        // The mean only counts points that have a color.
        assert_eq!(cloud.mean_color(), Some(VertexColor::new(40, 80, 120)));
    }

    #[test]
    fn test_selection_helpers() {
        let cloud = line(4);
        let picked = cloud.select(&[3, 0, 42]);
        assert_eq!(picked.len(), 2);
        assert_relative_eq!(picked.points[0].position.x, 0.3, epsilon = 1e-12);

        let rest = cloud.select_inverted(&[0, 3]);
        assert_eq!(rest.len(), 2);
        assert_relative_eq!(rest.points[0].position.x, 0.1, epsilon = 1e-12);

        let masked = cloud.select_mask(&[false, true, false, true]);
        assert_eq!(masked, cloud.select(&[1, 3]));
    }

    #[test]
    fn test_nearest_neighbor_distances_skip_self() {
        let mut cloud = line(3);
        cloud.push_coords(5.0, 0.0, 0.05);
        let d = cloud.nearest_neighbor_distances();
        assert_relative_eq!(d[0], 0.1, epsilon = 1e-12);
        assert_relative_eq!(d[3], 4.8, epsilon = 1e-12);

        assert_eq!(line(1).nearest_neighbor_distances(), vec![0.0]);
    }

    #[test]
    fn test_kdtree_indexes_every_point() {
        let cloud = line(10);
        let tree = cloud.kdtree();
        let hit = tree.nearest_one::<SquaredEuclidean>(&[0.41, 0.0, 0.05]);
        assert_eq!(hit.item, 4);
        assert_eq!(cloud.to_vertices().len(), 10);

        let mut grown = cloud.clone();
        grown.extend(line(2).points);
        assert_eq!(grown.len(), 12);
    }
}
