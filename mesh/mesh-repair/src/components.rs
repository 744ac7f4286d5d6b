//! Connected component analysis.
//!
//! Faces are connected when they share a vertex. Scan meshes often carry
//! small floating fragments next to the main surface; these are found here
//! and discarded relative to the size of the largest component.

use mesh_types::IndexedMesh;
use tracing::debug;

use crate::clean::remove_unreferenced_vertices;

/// Component labelling of a mesh's faces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentAnalysis {
    /// Component id per face, parallel to `mesh.faces`.
    pub face_labels: Vec<usize>,
    /// Face count per component id.
    pub sizes: Vec<usize>,
}

impl ComponentAnalysis {
    /// Number of components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.sizes.len()
    }

    /// Id and face count of the largest component. Ties go to the lower id.
    #[must_use]
    pub fn largest(&self) -> Option<(usize, usize)> {
        self.sizes
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best, (id, size)| match best {
                Some((_, best_size)) if best_size >= size => best,
                _ => Some((id, size)),
            })
    }
}

/// Label the faces of a mesh by vertex-connected component.
///
/// Component ids are assigned in order of each component's first face.
///
/// # Example
///
/// ```
/// use mesh_repair::find_connected_components;
/// use mesh_types::{IndexedMesh, Vertex};
///
/// let mut mesh = IndexedMesh::new();
/// for i in 0..6 {
///     mesh.vertices.push(Vertex::from_coords(f64::from(i), 0.0, f64::from(i % 2)));
/// }
/// mesh.faces.push([0, 1, 2]);
/// mesh.faces.push([3, 4, 5]);
///
/// let analysis = find_connected_components(&mesh);
/// assert_eq!(analysis.component_count(), 2);
/// assert_eq!(analysis.face_labels, vec![0, 1]);
/// ```
#[must_use]
pub fn find_connected_components(mesh: &IndexedMesh) -> ComponentAnalysis {
    let mut sets = DisjointSet::new(mesh.vertices.len());
    for face in &mesh.faces {
        sets.union(face[0] as usize, face[1] as usize);
        sets.union(face[0] as usize, face[2] as usize);
    }

    let mut root_to_label = vec![usize::MAX; mesh.vertices.len()];
    let mut face_labels = Vec::with_capacity(mesh.faces.len());
    let mut sizes: Vec<usize> = Vec::new();

    for face in &mesh.faces {
        let root = sets.find(face[0] as usize);
        if root_to_label[root] == usize::MAX {
            root_to_label[root] = sizes.len();
            sizes.push(0);
        }
        let label = root_to_label[root];
        sizes[label] += 1;
        face_labels.push(label);
    }

    ComponentAnalysis { face_labels, sizes }
}

/// Remove components with fewer than `min_ratio` times the face count of
/// the largest component, then compact unreferenced vertices.
///
/// Returns the number of faces removed.
///
/// # Example
///
/// ```
/// use mesh_repair::remove_small_components;
/// use mesh_types::{unit_cube, Vertex};
///
/// let mut mesh = unit_cube();
/// mesh.vertices.push(Vertex::from_coords(5.0, 5.0, 5.0));
/// mesh.vertices.push(Vertex::from_coords(6.0, 5.0, 5.0));
/// mesh.vertices.push(Vertex::from_coords(5.0, 6.0, 5.0));
/// mesh.faces.push([8, 9, 10]);
///
/// // 1 face is below half of the cube's 12.
/// assert_eq!(remove_small_components(&mut mesh, 0.5), 1);
/// assert_eq!(mesh.vertex_count(), 8);
/// ```
#[allow(clippy::cast_precision_loss)]
pub fn remove_small_components(mesh: &mut IndexedMesh, min_ratio: f64) -> usize {
    let analysis = find_connected_components(mesh);
    let Some((_, largest)) = analysis.largest() else {
        return 0;
    };
    let min_faces = largest as f64 * min_ratio;
    let keep: Vec<bool> = analysis
        .sizes
        .iter()
        .map(|&size| size as f64 >= min_faces)
        .collect();

    let before = mesh.faces.len();
    let mut face_index = 0;
    mesh.faces.retain(|_| {
        let label = analysis.face_labels[face_index];
        face_index += 1;
        keep[label]
    });
    let removed = before - mesh.faces.len();

    if removed > 0 {
        remove_unreferenced_vertices(mesh);
        debug!(
            components = analysis.component_count(),
            kept = keep.iter().filter(|&&k| k).count(),
            faces_removed = removed,
            "Removed small components"
        );
    }
    removed
}

/// Union-find over vertex indices with path halving and union by size.
struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_types::{unit_cube, Vertex};

    fn cube_with_fragment() -> IndexedMesh {
        let mut mesh = unit_cube();
        let base = mesh.vertex_count() as u32;
        mesh.vertices.push(Vertex::from_coords(3.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(4.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(3.0, 1.0, 0.0));
        mesh.faces.push([base, base + 1, base + 2]);
        mesh
    }

    #[test]
    fn cube_is_one_component() {
        let analysis = find_connected_components(&unit_cube());
        assert_eq!(analysis.component_count(), 1);
        assert_eq!(analysis.largest(), Some((0, 12)));
    }

    #[test]
    fn fragment_is_separate() {
        let analysis = find_connected_components(&cube_with_fragment());
        assert_eq!(analysis.sizes, vec![12, 1]);
        assert_eq!(analysis.face_labels[12], 1);
    }

    #[test]
    fn shared_vertex_connects() {
        let mut mesh = IndexedMesh::new();
        for i in 0..5 {
            mesh.vertices
                .push(Vertex::from_coords(f64::from(i), f64::from(i * i), 0.0));
        }
        mesh.faces.push([0, 1, 2]);
        mesh.faces.push([2, 3, 4]);
        assert_eq!(find_connected_components(&mesh).component_count(), 1);
    }

    #[test]
    fn small_ratio_keeps_everything() {
        let mut mesh = cube_with_fragment();
        // 1 >= 12 * 0.01
        assert_eq!(remove_small_components(&mut mesh, 0.01), 0);
        assert_eq!(mesh.face_count(), 13);
    }

    #[test]
    fn fragment_removed_and_vertices_compacted() {
        let mut mesh = cube_with_fragment();
        assert_eq!(remove_small_components(&mut mesh, 0.1), 1);
        assert_eq!(mesh.face_count(), 12);
        assert_eq!(mesh.vertex_count(), 8);
        assert!(mesh.indices_valid());
    }

    #[test]
    fn empty_mesh_has_no_components() {
        let mut mesh = IndexedMesh::new();
        assert!(find_connected_components(&mesh).largest().is_none());
        assert_eq!(remove_small_components(&mut mesh, 0.5), 0);
    }
}
