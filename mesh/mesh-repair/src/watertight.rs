//! Winding consistency, outward orientation and watertight closing.

use std::collections::VecDeque;

use hashbrown::HashMap;
use mesh_types::IndexedMesh;
use tracing::{debug, info};

use crate::adjacency::{face_edges, normalize_edge, MeshAdjacency};
use crate::clean::{clean_mesh, CleanParams};
use crate::components::find_connected_components;
use crate::error::RepairResult;
use crate::holes::fill_holes;

/// Outcome of [`ensure_watertight`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatertightSummary {
    /// Duplicate faces dropped.
    pub duplicates_removed: usize,
    /// Faces dropped from edges shared by more than two faces.
    pub non_manifold_removed: usize,
    /// Holes closed (ear clipping plus fan pass).
    pub holes_filled: usize,
    /// Faces flipped to agree with their neighbors.
    pub faces_reoriented: usize,
    /// Components flipped to face outward.
    pub components_flipped: usize,
    /// Degenerate faces dropped.
    pub degenerates_removed: usize,
    /// Whether every edge of the result has exactly two faces.
    pub is_watertight: bool,
}

/// Drop faces beyond the second on every edge.
///
/// Faces are visited in order; a face is kept only while each of its edges
/// has fewer than two kept faces. Returns the number of faces removed.
///
/// # Example
///
/// ```
/// use mesh_repair::remove_non_manifold_faces;
/// use mesh_types::{IndexedMesh, Vertex};
///
/// let mut mesh = IndexedMesh::new();
/// for p in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0]] {
///     mesh.vertices.push(Vertex::from(p));
/// }
/// mesh.faces = vec![[0, 1, 2], [1, 0, 3], [0, 1, 4]];
///
/// assert_eq!(remove_non_manifold_faces(&mut mesh), 1);
/// assert_eq!(mesh.face_count(), 2);
/// ```
pub fn remove_non_manifold_faces(mesh: &mut IndexedMesh) -> usize {
    let before = mesh.faces.len();
    let mut uses: HashMap<(u32, u32), u8> = HashMap::with_capacity(before * 3 / 2);
    mesh.faces.retain(|&face| {
        let edges = face_edges(face).map(|(a, b)| normalize_edge(a, b));
        if edges.iter().any(|e| uses.get(e).copied().unwrap_or(0) >= 2) {
            return false;
        }
        for e in edges {
            *uses.entry(e).or_insert(0) += 1;
        }
        true
    });
    before - mesh.faces.len()
}

/// Count manifold edges whose two faces traverse them in the same direction.
///
/// # Example
///
/// ```
/// use mesh_repair::count_inconsistent_faces;
/// use mesh_types::unit_cube;
///
/// let mut cube = unit_cube();
/// assert_eq!(count_inconsistent_faces(&cube), 0);
/// cube.faces[0].swap(1, 2);
/// assert_eq!(count_inconsistent_faces(&cube), 3);
/// ```
#[must_use]
pub fn count_inconsistent_faces(mesh: &IndexedMesh) -> usize {
    let adjacency = MeshAdjacency::build(&mesh.faces);
    adjacency
        .edges()
        .filter(|(_, faces)| faces.len() == 2)
        .filter(|&((a, b), faces)| {
            let forward = |f: usize| face_edges(mesh.faces[f]).contains(&(a, b));
            forward(faces[0]) == forward(faces[1])
        })
        .count()
}

/// Make winding consistent within each component.
///
/// Breadth-first from the first face of each component across manifold
/// edges: a neighbor that traverses the shared edge in the same direction
/// as the current face is flipped. Returns the number of faces flipped.
pub fn fix_winding_order(mesh: &mut IndexedMesh) -> usize {
    let adjacency = MeshAdjacency::build(&mesh.faces);
    let mut visited = vec![false; mesh.faces.len()];
    let mut flipped = 0;
    let mut queue = VecDeque::new();

    for seed in 0..mesh.faces.len() {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        queue.push_back(seed);

        while let Some(current) = queue.pop_front() {
            for (a, b) in face_edges(mesh.faces[current]) {
                let Some(&[f0, f1]) = adjacency.faces_for_edge(a, b) else {
                    continue;
                };
                let neighbor = if f0 == current { f1 } else { f0 };
                if visited[neighbor] {
                    continue;
                }
                visited[neighbor] = true;
                // Consistent neighbors traverse the shared edge as (b, a).
                if face_edges(mesh.faces[neighbor]).contains(&(a, b)) {
                    mesh.faces[neighbor].swap(1, 2);
                    flipped += 1;
                }
                queue.push_back(neighbor);
            }
        }
    }

    if flipped > 0 {
        debug!("Flipped {} faces to make winding consistent", flipped);
    }
    flipped
}

/// Flip each component whose signed volume is negative.
///
/// Meaningful once winding is consistent; open components are judged the
/// same way. Returns the number of components flipped.
///
/// # Example
///
/// ```
/// use mesh_repair::orient_outward;
/// use mesh_types::unit_cube;
///
/// let mut cube = unit_cube();
/// cube.flip_winding();
/// assert_eq!(orient_outward(&mut cube), 1);
/// assert!(cube.signed_volume() > 0.0);
/// ```
pub fn orient_outward(mesh: &mut IndexedMesh) -> usize {
    let analysis = find_connected_components(mesh);
    let mut volumes = vec![0.0_f64; analysis.component_count()];
    for (face_idx, &label) in analysis.face_labels.iter().enumerate() {
        let [a, b, c] = mesh.faces[face_idx].map(|i| mesh.vertices[i as usize].position.coords);
        volumes[label] += a.dot(&b.cross(&c)) / 6.0;
    }

    let flip: Vec<bool> = volumes.iter().map(|&v| v < 0.0).collect();
    for (face, &label) in mesh.faces.iter_mut().zip(&analysis.face_labels) {
        if flip[label] {
            face.swap(1, 2);
        }
    }
    flip.iter().filter(|&&f| f).count()
}

/// Cleaning and filling rounds [`ensure_watertight`] tries before giving up.
const CLOSING_ROUNDS: usize = 4;

/// Close the mesh as far as possible.
///
/// Each round drops faces beyond the second on any edge, runs
/// [`clean_mesh`] with `clean`, and stops once every edge has exactly two
/// faces. Otherwise it makes winding consistent, fills holes up to
/// `max_hole_edges` edges and goes again. Afterwards winding is made
/// consistent once more and each component oriented outward.
///
/// A round ends on the cleaning pass, so running [`clean_mesh`] with the
/// same parameters afterwards finds nothing to remove.
///
/// # Errors
///
/// Propagates hole filling errors.
pub fn ensure_watertight(
    mesh: &mut IndexedMesh,
    max_hole_edges: usize,
    clean: &CleanParams,
) -> RepairResult<WatertightSummary> {
    let mut summary = WatertightSummary::default();

    for round in 1..=CLOSING_ROUNDS {
        summary.non_manifold_removed += remove_non_manifold_faces(mesh);
        let cleaned = clean_mesh(mesh, clean);
        summary.duplicates_removed += cleaned.duplicate;
        summary.degenerates_removed += cleaned.degenerate;

        summary.is_watertight = MeshAdjacency::build(&mesh.faces).is_watertight();
        if summary.is_watertight || round == CLOSING_ROUNDS {
            break;
        }
        // Hole walks follow face winding.
        summary.faces_reoriented += fix_winding_order(mesh);
        let filled = fill_holes(mesh, Some(max_hole_edges))?;
        summary.holes_filled += filled.holes_filled + filled.holes_fanned;
        debug!(round, %filled, "closing round");
    }

    summary.faces_reoriented += fix_winding_order(mesh);
    summary.components_flipped = orient_outward(mesh);

    info!(
        non_manifold = summary.non_manifold_removed,
        holes = summary.holes_filled,
        reoriented = summary.faces_reoriented,
        watertight = summary.is_watertight,
        "Watertight pass"
    );
    Ok(summary)
}
