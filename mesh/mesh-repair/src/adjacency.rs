//! Undirected edge to face incidence.

use hashbrown::HashMap;

/// Which faces use each undirected edge.
///
/// One incident face marks a boundary edge, two an interior manifold edge,
/// three or more a non-manifold edge.
///
/// ```
/// use mesh_repair::MeshAdjacency;
///
/// // Two triangles forming a quad.
/// let adjacency = MeshAdjacency::build(&[[0, 1, 2], [0, 2, 3]]);
/// assert_eq!(adjacency.edge_count(), 5);
/// assert_eq!(adjacency.boundary_edge_count(), 4);
/// assert_eq!(adjacency.faces_for_edge(2, 0), Some(&[0, 1][..]));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MeshAdjacency {
    edges: HashMap<(u32, u32), Vec<usize>>,
}

impl MeshAdjacency {
    /// Indexes `faces`.
    #[must_use]
    pub fn build(faces: &[[u32; 3]]) -> Self {
        let mut edges: HashMap<(u32, u32), Vec<usize>> = HashMap::with_capacity(faces.len() * 3 / 2);
        for (index, face) in faces.iter().enumerate() {
            for (a, b) in face_edges(*face) {
                edges.entry(normalize_edge(a, b)).or_default().push(index);
            }
        }
        Self { edges }
    }

    /// Faces using edge `a`-`b` in either direction, in face order.
    #[must_use]
    pub fn faces_for_edge(&self, a: u32, b: u32) -> Option<&[usize]> {
        self.edges.get(&normalize_edge(a, b)).map(Vec::as_slice)
    }

    /// Every edge, as `(low, high)`, with its faces.
    pub fn edges(&self) -> impl Iterator<Item = ((u32, u32), &[usize])> + '_ {
        self.edges.iter().map(|(&edge, faces)| (edge, faces.as_slice()))
    }

    /// Whether `a`-`b` exists and has a single face.
    #[must_use]
    pub fn is_boundary_edge(&self, a: u32, b: u32) -> bool {
        matches!(self.faces_for_edge(a, b), Some([_]))
    }

    fn count_where(&self, pred: impl Fn(usize) -> bool) -> usize {
        self.edges.values().filter(|f| pred(f.len())).count()
    }

    /// Edges with one face.
    #[must_use]
    pub fn boundary_edge_count(&self) -> usize {
        self.count_where(|n| n == 1)
    }

    /// Edges with three or more faces.
    #[must_use]
    pub fn non_manifold_edge_count(&self) -> usize {
        self.count_where(|n| n > 2)
    }

    /// No edge has more than two faces.
    #[must_use]
    pub fn is_manifold(&self) -> bool {
        self.non_manifold_edge_count() == 0
    }

    /// Every edge has exactly two faces.
    #[must_use]
    pub fn is_watertight(&self) -> bool {
        self.edges.values().all(|f| f.len() == 2)
    }

    /// Distinct undirected edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

/// Directed edges of `face` in winding order.
#[inline]
pub(crate) const fn face_edges([a, b, c]: [u32; 3]) -> [(u32, u32); 3] {
    [(a, b), (b, c), (c, a)]
}

/// `(min, max)` of an edge's endpoints.
#[inline]
pub(crate) const fn normalize_edge(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_types::unit_cube;

    #[test]
    fn lone_face_is_all_boundary() {
        let adjacency = MeshAdjacency::build(&[[4, 9, 7]]);
        assert_eq!(adjacency.edge_count(), 3);
        assert_eq!(adjacency.boundary_edge_count(), 3);
        assert!(adjacency.is_boundary_edge(7, 4));
        assert!(!adjacency.is_watertight() && adjacency.is_manifold());
    }

    #[test]
    fn edge_lookup_ignores_direction() {
        let adjacency = MeshAdjacency::build(&[[0, 1, 2], [0, 2, 3]]);
        assert_eq!(adjacency.faces_for_edge(0, 2), adjacency.faces_for_edge(2, 0));
        assert!(!adjacency.is_boundary_edge(0, 2));
        assert!(adjacency.faces_for_edge(1, 3).is_none());
        assert!(!adjacency.is_boundary_edge(1, 3));
    }

    #[test]
    fn three_faces_on_one_edge() {
        let adjacency = MeshAdjacency::build(&[[0, 1, 2], [1, 0, 3], [0, 1, 4]]);
        assert_eq!(adjacency.non_manifold_edge_count(), 1);
        assert_eq!(adjacency.faces_for_edge(1, 0).map(<[usize]>::len), Some(3));
        assert!(!adjacency.is_manifold());
    }

    #[test]
    fn closed_but_overloaded_is_not_watertight() {
        // A two-sided fin on the bottom diagonal of a closed cube.
        let mut faces = unit_cube().faces;
        faces.extend([[0, 2, 8], [2, 0, 8]]);
        let adjacency = MeshAdjacency::build(&faces);
        assert_eq!(adjacency.boundary_edge_count(), 0);
        assert_eq!(adjacency.non_manifold_edge_count(), 1);
        assert!(!adjacency.is_watertight());
    }

    #[test]
    fn cube_is_closed() {
        let adjacency = MeshAdjacency::build(&unit_cube().faces);
        assert!(adjacency.is_watertight() && adjacency.is_manifold());
        assert_eq!(adjacency.edge_count(), 18);
        assert!(adjacency.edges().all(|(_, faces)| faces.len() == 2));
    }

    #[test]
    fn face_edges_follow_winding() {
        assert_eq!(face_edges([3, 1, 2]), [(3, 1), (1, 2), (2, 3)]);
        assert_eq!(normalize_edge(9, 2), (2, 9));
    }
}
