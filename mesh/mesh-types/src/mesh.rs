//! Shared-vertex triangle meshes.

use crate::{Triangle, Vertex, VertexColor};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Triangles over a shared vertex list.
///
/// Faces index into `vertices`; [`IndexedMesh::indices_valid`] checks that
/// they all resolve. Meshes between pipeline stages may be open or
/// non-manifold, only the refined output is expected to be closed.
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
///
/// let quad = IndexedMesh::from_parts(
///     [[0.0, 0.0, 0.0], [0.1, 0.0, 0.0], [0.1, 0.1, 0.0], [0.0, 0.1, 0.0]]
///         .map(Vertex::from)
///         .to_vec(),
///     vec![[0, 1, 2], [0, 2, 3]],
/// );
/// assert_eq!((quad.vertex_count(), quad.face_count()), (4, 2));
/// assert!((quad.surface_area() - 0.01).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexedMesh {
    /// Positions and per-vertex attributes.
    pub vertices: Vec<Vertex>,
    /// Vertex indices, counter-clockwise seen from outside.
    pub faces: Vec<[u32; 3]>,
}

impl IndexedMesh {
    /// No vertices, no faces.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Empty, with room reserved.
    #[inline]
    #[must_use]
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
        }
    }

    /// Wraps existing buffers without checking indices.
    #[inline]
    #[must_use]
    pub const fn from_parts(vertices: Vec<Vertex>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Vertex count.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Face count.
    #[inline]
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// True without vertices or without faces.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// True when every face index resolves to a vertex.
    #[must_use]
    pub fn indices_valid(&self) -> bool {
        let n = self.vertices.len();
        self.faces
            .iter()
            .all(|f| f.iter().all(|&i| (i as usize) < n))
    }

    /// Face `face_index` with its corners resolved; `None` if anything is
    /// out of range.
    #[must_use]
    pub fn triangle(&self, face_index: usize) -> Option<Triangle> {
        let [a, b, c] = *self.faces.get(face_index)?;
        Some(Triangle::new(
            self.vertices.get(a as usize)?.position,
            self.vertices.get(b as usize)?.position,
            self.vertices.get(c as usize)?.position,
        ))
    }

    /// Every resolvable face; faces with bad indices are skipped.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        (0..self.faces.len()).filter_map(|i| self.triangle(i))
    }

    /// Sum of face areas.
    #[must_use]
    pub fn surface_area(&self) -> f64 {
        self.triangles().map(|t| t.area()).sum()
    }

    /// Enclosed volume by the divergence theorem, positive for outward
    /// winding. Meaningless for open meshes.
    #[must_use]
    pub fn signed_volume(&self) -> f64 {
        self.triangles()
            .map(|t| t.v0.coords.dot(&t.v1.coords.cross(&t.v2.coords)))
            .sum::<f64>()
            / 6.0
    }

    /// Turns every face inside out, negating stored normals to match.
    pub fn flip_winding(&mut self) {
        self.faces.iter_mut().for_each(|f| f.swap(1, 2));
        for normal in self
            .vertices
            .iter_mut()
            .filter_map(|v| v.attributes.normal.as_mut())
        {
            *normal = -*normal;
        }
    }

    /// True when every vertex carries a color.
    #[must_use]
    pub fn has_colors(&self) -> bool {
        !self.vertices.is_empty() && self.vertices.iter().all(|v| v.color().is_some())
    }

    /// True when every vertex carries a texture coordinate.
    #[must_use]
    pub fn has_uvs(&self) -> bool {
        !self.vertices.is_empty() && self.vertices.iter().all(|v| v.uv().is_some())
    }

    /// Mean color over the vertices that carry one.
    #[must_use]
    pub fn average_color(&self) -> Option<VertexColor> {
        VertexColor::mean(self.vertices.iter().filter_map(Vertex::color))
    }
}

/// The closed cube `[0, 1]^3`: 8 vertices, 12 outward faces, two per side
/// in the order -Z, +Z, -Y, +Y, -X, +X.
#[must_use]
pub fn unit_cube() -> IndexedMesh {
    let vertices = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 0.0, 1.0],
        [1.0, 1.0, 1.0],
        [0.0, 1.0, 1.0],
    ]
    .into_iter()
    .map(Vertex::from)
    .collect();

    let faces = vec![
        [0, 2, 1],
        [0, 3, 2], // -Z
        [4, 5, 6],
        [4, 6, 7], // +Z
        [0, 1, 5],
        [0, 5, 4], // -Y
        [3, 7, 6],
        [3, 6, 2], // +Y
        [0, 4, 7],
        [0, 7, 3], // -X
        [1, 2, 6],
        [1, 6, 5], // +X
    ];

    IndexedMesh::from_parts(vertices, faces)
}
