//! Health checks for refined surfaces.
//!
//! [`validate_mesh`] never fails. Faces pointing at missing vertices are
//! counted and left out of every geometric check.

use std::borrow::Cow;
use std::fmt;

use mesh_types::IndexedMesh;

use crate::adjacency::MeshAdjacency;
use crate::clean::count_duplicate_faces;
use crate::components::find_connected_components;

/// Faces with less area than this are reported as degenerate.
pub const DEGENERATE_AREA: f64 = 1e-12;

/// What [`validate_mesh`] found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshReport {
    /// Vertices, referenced or not.
    pub vertex_count: usize,
    /// Faces, including invalid ones.
    pub face_count: usize,
    /// Distinct undirected edges.
    pub edge_count: usize,
    /// Vertex-connected pieces.
    pub component_count: usize,
    /// Edges used by exactly one face.
    pub boundary_edge_count: usize,
    /// Edges used by three or more faces.
    pub non_manifold_edge_count: usize,
    /// Faces under [`DEGENERATE_AREA`].
    pub degenerate_face_count: usize,
    /// Faces whose vertex set repeats an earlier face.
    pub duplicate_face_count: usize,
    /// Out-of-range vertex references.
    pub invalid_index_count: usize,
    /// Every edge borders exactly two faces.
    pub is_watertight: bool,
    /// No non-manifold edges.
    pub is_manifold: bool,
    /// Signed volume is negative.
    pub is_inside_out: bool,
    /// Sum of face areas.
    pub surface_area: f64,
}

impl MeshReport {
    /// A closed, manifold, outward-facing surface.
    #[must_use]
    pub const fn is_closed_manifold(&self) -> bool {
        self.is_watertight && self.is_manifold && !self.is_inside_out
    }

    /// Sum of every defect count.
    #[must_use]
    pub const fn issue_count(&self) -> usize {
        self.boundary_edge_count
            + self.non_manifold_edge_count
            + self.degenerate_face_count
            + self.duplicate_face_count
            + self.invalid_index_count
    }

    /// Whether any defect was found.
    #[must_use]
    pub const fn has_issues(&self) -> bool {
        self.issue_count() > 0
    }
}

impl fmt::Display for MeshReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vertices, {} faces, {} component(s), area {:.4}",
            self.vertex_count, self.face_count, self.component_count, self.surface_area
        )?;
        let flags = [
            (self.is_watertight, "watertight"),
            (self.is_manifold, "manifold"),
            (self.is_inside_out, "inside-out"),
        ];
        for (_, name) in flags.iter().filter(|(set, _)| *set) {
            write!(f, ", {name}")?;
        }
        for (count, name) in [
            (self.boundary_edge_count, "boundary edges"),
            (self.non_manifold_edge_count, "non-manifold edges"),
            (self.degenerate_face_count, "degenerate faces"),
            (self.duplicate_face_count, "duplicate faces"),
            (self.invalid_index_count, "invalid indices"),
        ] {
            if count > 0 {
                write!(f, ", {count} {name}")?;
            }
        }
        Ok(())
    }
}

/// Checks topology and geometry of `mesh`.
///
/// ```
/// use mesh_repair::validate_mesh;
/// use mesh_types::unit_cube;
///
/// let mut open = unit_cube();
/// open.faces.truncate(10);
/// let report = validate_mesh(&open);
/// assert!(!report.is_watertight);
/// assert_eq!(report.boundary_edge_count, 4);
/// ```
#[must_use]
pub fn validate_mesh(mesh: &IndexedMesh) -> MeshReport {
    let vertex_count = mesh.vertex_count();
    let in_range = |f: &[u32; 3]| f.iter().all(|&i| (i as usize) < vertex_count);

    let invalid_index_count = mesh
        .faces
        .iter()
        .flatten()
        .filter(|&&i| i as usize >= vertex_count)
        .count();
    let valid = if invalid_index_count == 0 {
        Cow::Borrowed(mesh)
    } else {
        Cow::Owned(IndexedMesh::from_parts(
            mesh.vertices.clone(),
            mesh.faces.iter().copied().filter(in_range).collect(),
        ))
    };

    let adjacency = MeshAdjacency::build(&valid.faces);
    MeshReport {
        vertex_count,
        face_count: mesh.face_count(),
        edge_count: adjacency.edge_count(),
        component_count: find_connected_components(&valid).component_count(),
        boundary_edge_count: adjacency.boundary_edge_count(),
        non_manifold_edge_count: adjacency.non_manifold_edge_count(),
        degenerate_face_count: valid
            .triangles()
            .filter(|t| t.area() < DEGENERATE_AREA)
            .count(),
        duplicate_face_count: count_duplicate_faces(&valid.faces),
        invalid_index_count,
        is_watertight: adjacency.is_watertight(),
        is_manifold: adjacency.is_manifold(),
        is_inside_out: !valid.faces.is_empty() && valid.signed_volume() < 0.0,
        surface_area: valid.surface_area(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_types::{unit_cube, Vertex};

    #[test]
    fn test_cube_is_healthy() {
        let report = validate_mesh(&unit_cube());
        assert!(report.is_closed_manifold());
        assert!(!report.has_issues());
        assert_eq!((report.edge_count, report.component_count), (18, 1));
        assert_relative_eq!(report.surface_area, 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_open_cube_reports_its_hole() {
        let mut cube = unit_cube();
        // Drop the +X side.
        cube.faces.truncate(10);
        let report = validate_mesh(&cube);
        assert!(!report.is_watertight);
        assert!(report.is_manifold);
        assert_eq!(report.boundary_edge_count, 4);
        assert_eq!(report.issue_count(), 4);
        assert!(report.to_string().contains("4 boundary edges"));
    }

    #[test]
    fn test_flipped_cube_is_inside_out() {
        let mut cube = unit_cube();
        cube.flip_winding();
        let report = validate_mesh(&cube);
        assert!(report.is_inside_out && report.is_watertight);
        assert!(!report.is_closed_manifold());
    }

    #[test]
    fn test_bad_faces_are_counted_separately() {
        let mut mesh = IndexedMesh::from_parts(
            vec![
                Vertex::from_coords(0.0, 0.0, 0.0),
                Vertex::from_coords(0.1, 0.0, 0.0),
                Vertex::from_coords(0.0, 0.1, 0.0),
                Vertex::from_coords(0.2, 0.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        mesh.faces.push([0, 1, 3]); // zero area
        mesh.faces.push([1, 2, 0]); // repeats face 0
        mesh.faces.push([0, 2, 7]); // dangling

        let report = validate_mesh(&mesh);
        assert_eq!(report.face_count, 4);
        assert_eq!(report.degenerate_face_count, 1);
        assert_eq!(report.duplicate_face_count, 1);
        assert_eq!(report.invalid_index_count, 1);
        // Edge 0-1 is shared by three valid faces.
        assert_eq!(report.non_manifold_edge_count, 1);
        assert!(!report.is_manifold && !report.is_watertight);
    }

    #[test]
    fn test_display_is_one_line() {
        let text = validate_mesh(&unit_cube()).to_string();
        assert!(text.starts_with("8 vertices, 12 faces, 1 component(s)"));
        assert!(text.contains("watertight, manifold"));
        assert!(!text.contains('\n'));
    }
}
