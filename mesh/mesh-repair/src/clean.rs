//! Welding and removal of degenerate, duplicate and orphaned elements.

use std::fmt;

use hashbrown::{HashMap, HashSet};
use mesh_types::{IndexedMesh, Point3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tolerances for [`clean_mesh`].
///
/// ```
/// use mesh_repair::CleanParams;
///
/// let params = CleanParams::default().with_weld_tolerance(1e-4);
/// assert!((params.weld_tolerance - 1e-4).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct CleanParams {
    /// Vertices closer than this are merged. Default: `1e-6`.
    pub weld_tolerance: f64,

    /// Faces with area at or below this are dropped. Default: `1e-14`.
    pub degenerate_area: f64,
}

impl Default for CleanParams {
    fn default() -> Self {
        Self {
            weld_tolerance: 1e-6,
            degenerate_area: 1e-14,
        }
    }
}

impl CleanParams {
    /// Replaces `weld_tolerance`.
    #[must_use]
    pub const fn with_weld_tolerance(mut self, tolerance: f64) -> Self {
        self.weld_tolerance = tolerance;
        self
    }

    /// Replaces `degenerate_area`.
    #[must_use]
    pub const fn with_degenerate_area(mut self, area: f64) -> Self {
        self.degenerate_area = area;
        self
    }
}

/// Element counts removed by one [`clean_mesh`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanSummary {
    /// Vertices redirected onto a nearby vertex.
    pub welded: usize,
    /// Faces at or below the area threshold.
    pub degenerate: usize,
    /// Faces repeating an earlier face's corners.
    pub duplicate: usize,
    /// Vertices no face used.
    pub unreferenced: usize,
}

impl CleanSummary {
    /// Whether the pass touched the mesh at all.
    #[must_use]
    pub const fn had_changes(&self) -> bool {
        self.welded + self.degenerate + self.duplicate + self.unreferenced > 0
    }
}

impl fmt::Display for CleanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cleaned: welded {}, dropped {} degenerate + {} duplicate faces, {} orphan vertices",
            self.welded, self.degenerate, self.duplicate, self.unreferenced
        )
    }
}

/// Weld, then drop degenerate faces, duplicate faces and orphan vertices,
/// in that order. Faces welding collapses are dropped by the weld itself.
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::{clean_mesh, CleanParams};
///
/// let corners = [[0.0, 0.0, 0.0], [0.2, 0.0, 0.0], [0.0, 0.2, 0.0], [0.2, 0.0, 1e-9], [1.0, 1.0, 1.0]];
/// let mut mesh = IndexedMesh::from_parts(
///     corners.iter().map(|&[x, y, z]| Vertex::from_coords(x, y, z)).collect(),
///     vec![[0, 1, 2], [0, 3, 2]],
/// );
///
/// let summary = clean_mesh(&mut mesh, &CleanParams::default());
/// assert_eq!((summary.welded, summary.duplicate, summary.unreferenced), (1, 1, 2));
/// assert_eq!((mesh.vertex_count(), mesh.face_count()), (3, 1));
/// ```
pub fn clean_mesh(mesh: &mut IndexedMesh, params: &CleanParams) -> CleanSummary {
    CleanSummary {
        welded: weld_vertices(mesh, params.weld_tolerance),
        degenerate: remove_degenerate_faces(mesh, params.degenerate_area),
        duplicate: remove_duplicate_faces(mesh),
        unreferenced: remove_unreferenced_vertices(mesh),
    }
}

type Cell = [i64; 3];

#[allow(clippy::cast_possible_truncation)]
fn cell(p: &Point3<f64>, size: f64) -> Cell {
    [p.x, p.y, p.z].map(|c| (c / size).floor() as i64)
}

/// Redirects every vertex within `epsilon` of a lower-indexed survivor onto
/// that survivor and drops every face left with a repeated corner. Merged vertices
/// stay in the array until [`remove_unreferenced_vertices`].
///
/// Returns how many vertices were redirected. A non-positive or NaN
/// `epsilon` does nothing.
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::weld_vertices;
///
/// let mut mesh = IndexedMesh::from_parts(
///     vec![
///         Vertex::from_coords(0.0, 0.0, 0.0),
///         Vertex::from_coords(0.1, 0.0, 0.0),
///         Vertex::from_coords(0.0, 0.1, 0.0),
///         Vertex::from_coords(0.1002, 0.0, 0.0),
///     ],
///     vec![[0, 1, 2], [0, 3, 2]],
/// );
/// assert_eq!(weld_vertices(&mut mesh, 0.001), 1);
/// assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 1, 2]]);
/// ```
#[allow(clippy::cast_possible_truncation)]
pub fn weld_vertices(mesh: &mut IndexedMesh, epsilon: f64) -> usize {
    if mesh.vertices.is_empty() || epsilon.is_nan() || epsilon <= 0.0 {
        return 0;
    }

    // Cells twice the tolerance wide, so a match is at most one cell away.
    let size = 2.0 * epsilon;
    let mut buckets: HashMap<Cell, Vec<u32>> = HashMap::new();
    for (i, v) in mesh.vertices.iter().enumerate() {
        buckets.entry(cell(&v.position, size)).or_default().push(i as u32);
    }

    let mut target: Vec<u32> = (0..mesh.vertices.len() as u32).collect();
    let mut welded = 0;
    for (i, v) in mesh.vertices.iter().enumerate() {
        let keep = i as u32;
        if target[i] != keep {
            continue;
        }
        let [cx, cy, cz] = cell(&v.position, size);
        let nearby = (-1..=1)
            .flat_map(|dx| (-1..=1).flat_map(move |dy| (-1..=1).map(move |dz| [cx + dx, cy + dy, cz + dz])))
            .filter_map(|c| buckets.get(&c))
            .flatten();
        for &j in nearby {
            let slot = &mut target[j as usize];
            if j > keep
                && *slot == j
                && (mesh.vertices[j as usize].position - v.position).norm() < epsilon
            {
                *slot = keep;
                welded += 1;
            }
        }
    }

    if welded > 0 {
        for face in &mut mesh.faces {
            *face = face.map(|i| target[i as usize]);
        }
    }
    mesh.faces.retain(|&f| !collapsed(f));
    welded
}

#[inline]
const fn collapsed([a, b, c]: [u32; 3]) -> bool {
    a == b || b == c || a == c
}

/// Drops faces with a repeated corner or area at or below `min_area`.
/// Returns the number dropped.
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::remove_degenerate_faces;
///
/// let line = (0..3).map(|i| Vertex::from_coords(f64::from(i) * 0.05, 0.0, 0.0)).collect();
/// let mut mesh = IndexedMesh::from_parts(line, vec![[0, 1, 2], [0, 0, 1]]);
/// assert_eq!(remove_degenerate_faces(&mut mesh, 1e-12), 2);
/// assert!(mesh.faces.is_empty());
/// ```
pub fn remove_degenerate_faces(mesh: &mut IndexedMesh, min_area: f64) -> usize {
    let before = mesh.faces.len();
    let vertices = &mesh.vertices;
    mesh.faces.retain(|&face| {
        if collapsed(face) {
            return false;
        }
        let [a, b, c] = face.map(|i| vertices[i as usize].position);
        0.5 * (b - a).cross(&(c - a)).norm() > min_area
    });
    before - mesh.faces.len()
}

/// Keeps the first of every set of faces sharing the same three corners,
/// whatever their rotation or winding. Returns the number dropped.
///
/// ```
/// use mesh_repair::remove_duplicate_faces;
/// use mesh_types::unit_cube;
///
/// let mut cube = unit_cube();
/// let flipped = { let [a, b, c] = cube.faces[3]; [c, b, a] };
/// cube.faces.push(flipped);
/// assert_eq!(remove_duplicate_faces(&mut cube), 1);
/// assert_eq!(cube.face_count(), 12);
/// ```
pub fn remove_duplicate_faces(mesh: &mut IndexedMesh) -> usize {
    let before = mesh.faces.len();
    let mut seen = HashSet::with_capacity(before);
    mesh.faces.retain(|&f| seen.insert(corner_set(f)));
    before - mesh.faces.len()
}

/// [`remove_duplicate_faces`] as a dry run.
pub(crate) fn count_duplicate_faces(faces: &[[u32; 3]]) -> usize {
    let mut seen = HashSet::with_capacity(faces.len());
    faces.iter().filter(|&&f| !seen.insert(corner_set(f))).count()
}

#[inline]
pub(crate) fn corner_set(mut face: [u32; 3]) -> [u32; 3] {
    face.sort_unstable();
    face
}

/// Compacts away vertices no face uses, keeping the survivors' order, and
/// rewrites face indices. Returns the number removed.
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::remove_unreferenced_vertices;
///
/// let mut mesh = IndexedMesh::from_parts(
///     (0..4).map(|i| Vertex::from_coords(f64::from(i), f64::from(i % 2), 0.0)).collect(),
///     vec![[1, 2, 3]],
/// );
/// assert_eq!(remove_unreferenced_vertices(&mut mesh), 1);
/// assert_eq!(mesh.faces, vec![[0, 1, 2]]);
/// ```
#[allow(clippy::cast_possible_truncation)]
pub fn remove_unreferenced_vertices(mesh: &mut IndexedMesh) -> usize {
    let before = mesh.vertices.len();
    let mut new_index: Vec<Option<u32>> = vec![None; before];
    for &i in mesh.faces.iter().flatten() {
        new_index[i as usize] = Some(0);
    }
    if new_index.iter().all(Option::is_some) {
        return 0;
    }

    let mut next = 0u32;
    for slot in new_index.iter_mut().flatten() {
        *slot = next;
        next += 1;
    }

    let mut index = new_index.iter();
    mesh.vertices.retain(|_| matches!(index.next(), Some(Some(_))));
    for face in &mut mesh.faces {
        *face = face.map(|i| new_index[i as usize].unwrap_or(u32::MAX));
    }
    before - mesh.vertices.len()
}
