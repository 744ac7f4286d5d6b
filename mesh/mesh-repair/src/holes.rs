//! Finding and closing holes.
//!
//! A hole is a cycle of boundary edges, each used by exactly one face.
//! Cycles are walked against the direction their face uses the edge, so a
//! patch triangle listed in cycle order faces the same way as its
//! neighbors.
//!
//! Patching runs ear clipping over every cycle, then fans whatever is still
//! open (pinched or self-overlapping cycles) around its centroid. A patch
//! never repeats an existing face and never gives an edge a third face.
//!
//! ```
//! use mesh_repair::holes::{detect_holes, fill_holes};
//! use mesh_types::unit_cube;
//!
//! let mut tray = unit_cube();
//! tray.faces.truncate(10);
//! assert_eq!(detect_holes(&tray).len(), 1);
//!
//! let summary = fill_holes(&mut tray, None).unwrap();
//! assert_eq!((summary.holes_filled, summary.triangles_added), (1, 2));
//! assert!(detect_holes(&tray).is_empty());
//! ```

use std::fmt;

use hashbrown::{HashMap, HashSet};
use mesh_types::{IndexedMesh, Point3, Triangle, Vector3, Vertex, VertexAttributes, VertexColor};
use tracing::{debug, info, warn};

use crate::adjacency::{face_edges, normalize_edge, MeshAdjacency};
use crate::clean::corner_set;
use crate::error::{RepairError, RepairResult};

/// One hole: a closed cycle of boundary vertices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryLoop {
    /// Cycle order; the last vertex connects back to the first.
    pub vertices: Vec<u32>,
}

impl BoundaryLoop {
    /// Edges in the cycle, equal to its vertex count.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.vertices.len()
    }
}

/// Outcome of [`fill_holes`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HoleFillSummary {
    /// Holes closed by ear clipping.
    pub holes_filled: usize,
    /// Holes closed by the centroid-fan pass.
    pub holes_fanned: usize,
    /// Holes left open because they exceed the size limit.
    pub holes_skipped: usize,
    /// Triangles added.
    pub triangles_added: usize,
    /// Vertices added by the fan pass.
    pub vertices_added: usize,
}

impl fmt::Display for HoleFillSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "patched {} holes by ear clipping and {} by fan, left {} open, +{} faces",
            self.holes_filled, self.holes_fanned, self.holes_skipped, self.triangles_added
        )
    }
}

/// Every hole, starting from the lowest boundary vertex.
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::holes::detect_holes;
///
/// let corners = [(0.0, 0.0), (0.1, 0.0), (0.0, 0.1)];
/// let lone = IndexedMesh::from_parts(
///     corners.iter().map(|&(x, y)| Vertex::from_coords(x, y, 0.0)).collect(),
///     vec![[0, 1, 2]],
/// );
/// // Walked against the face's own winding.
/// assert_eq!(detect_holes(&lone)[0].vertices, vec![0, 2, 1]);
/// ```
#[must_use]
pub fn detect_holes(mesh: &IndexedMesh) -> Vec<BoundaryLoop> {
    let edges = MeshAdjacency::build(&mesh.faces);

    // Boundary half-edges flipped, from -> [to].
    let mut outgoing: HashMap<u32, Vec<u32>> = HashMap::new();
    let mut boundary_len = 0usize;
    for &face in &mesh.faces {
        for (a, b) in face_edges(face).into_iter().filter(|&(a, b)| edges.is_boundary_edge(a, b)) {
            outgoing.entry(b).or_default().push(a);
            boundary_len += 1;
        }
    }
    if boundary_len == 0 {
        return Vec::new();
    }
    debug!(boundary_edges = boundary_len, "tracing holes");

    let mut starts: Vec<u32> = outgoing.keys().copied().collect();
    starts.sort_unstable();

    let mut used: HashSet<(u32, u32)> = HashSet::with_capacity(boundary_len);
    let mut found = Vec::new();

    for &start in &starts {
        loop {
            let Some(first) = next_unused(&outgoing, &used, start) else {
                break;
            };
            used.insert((start, first));

            let mut vertices = vec![start];
            let mut current = first;
            let mut closed = false;
            while vertices.len() <= boundary_len {
                if current == start {
                    closed = true;
                    break;
                }
                vertices.push(current);
                // At a pinch, close the current cycle before wandering off.
                let next = outgoing
                    .get(&current)
                    .and_then(|targets| {
                        targets
                            .iter()
                            .copied()
                            .find(|&t| t == start && !used.contains(&(current, t)))
                    })
                    .or_else(|| next_unused(&outgoing, &used, current));
                let Some(next) = next else {
                    break;
                };
                used.insert((current, next));
                current = next;
            }

            if closed {
                vertices.push(start);
            } else {
                warn!(start, "boundary walk ended before returning to its start");
            }
            found.extend(
                simple_cycles(&vertices)
                    .into_iter()
                    .map(|vertices| BoundaryLoop { vertices }),
            );
        }
    }

    let sizes: Vec<usize> = found.iter().map(BoundaryLoop::edge_count).collect();
    info!(holes = found.len(), ?sizes, "holes detected");
    found
}

/// Cycles of three or more vertices closed by a repeated vertex in `walk`.
/// A tail that never returns to an earlier vertex is not a cycle.
fn simple_cycles(walk: &[u32]) -> Vec<Vec<u32>> {
    let mut cycles = Vec::new();
    let mut stack: Vec<u32> = Vec::with_capacity(walk.len());
    for &v in walk {
        if let Some(at) = stack.iter().position(|&u| u == v) {
            let cycle: Vec<u32> = stack.drain(at..).collect();
            if cycle.len() >= 3 {
                cycles.push(cycle);
            }
        }
        stack.push(v);
    }
    cycles
}

fn next_unused(
    outgoing: &HashMap<u32, Vec<u32>>,
    used: &HashSet<(u32, u32)>,
    from: u32,
) -> Option<u32> {
    outgoing
        .get(&from)?
        .iter()
        .copied()
        .find(|&to| !used.contains(&(from, to)))
}

/// Edges and faces a patch has to stay clear of.
#[derive(Debug, Default)]
struct Occupancy {
    edges: HashSet<(u32, u32)>,
    faces: HashSet<[u32; 3]>,
}

impl Occupancy {
    fn of(faces: &[[u32; 3]]) -> Self {
        let mut occupied = Self::default();
        occupied.extend(faces);
        occupied
    }

    fn extend(&mut self, faces: &[[u32; 3]]) {
        for &face in faces {
            self.edges
                .extend(face_edges(face).map(|(a, b)| normalize_edge(a, b)));
            self.faces.insert(corner_set(face));
        }
    }

    fn is_free(&self, a: u32, b: u32) -> bool {
        !self.edges.contains(&normalize_edge(a, b))
    }

    fn is_new(&self, face: [u32; 3]) -> bool {
        !self.faces.contains(&corner_set(face))
    }
}

/// Ear-clips one hole into faces wound in cycle order. If clipping runs out
/// of ears, the rest of the polygon is fanned from its first corner.
///
/// Every diagonal must be an edge the mesh does not have yet, and no patch
/// face may repeat an existing one. When that cannot be met the patch is
/// empty and the hole is left for [`fill_hole_centroid_fan`].
#[must_use]
pub fn fill_hole_ear_clipping(mesh: &IndexedMesh, boundary: &BoundaryLoop) -> Vec<[u32; 3]> {
    clip_hole(mesh, boundary, &Occupancy::of(&mesh.faces)).unwrap_or_default()
}

fn clip_hole(
    mesh: &IndexedMesh,
    boundary: &BoundaryLoop,
    occupied: &Occupancy,
) -> Option<Vec<[u32; 3]>> {
    let cycle = &boundary.vertices;
    if cycle.len() < 3 {
        return None;
    }

    let corners: Vec<Point3<f64>> = cycle.iter().map(|&v| mesh.vertices[v as usize].position).collect();
    let facing = newell_normal(&corners);

    let mut open: Vec<usize> = (0..cycle.len()).collect();
    let mut patch = Vec::with_capacity(cycle.len() - 2);
    let mut diagonals: HashSet<(u32, u32)> = HashSet::new();
    let around = |open: &[usize], i: usize| {
        let len = open.len();
        (open[(i + len - 1) % len], open[i], open[(i + 1) % len])
    };
    let admits = |(a, c): (u32, u32), face: [u32; 3], diagonals: &HashSet<(u32, u32)>| {
        occupied.is_free(a, c) && !diagonals.contains(&normalize_edge(a, c)) && occupied.is_new(face)
    };

    while open.len() > 3 {
        let ear = (0..open.len()).find(|&i| {
            let (a, b, c) = around(&open, i);
            let face = [cycle[a], cycle[b], cycle[c]];
            admits((cycle[c], cycle[a]), face, &diagonals) && is_ear(&corners, &open, (a, b, c), &facing)
        });
        let Some(i) = ear else {
            debug!(corners = open.len(), "no ear left, fanning the remainder");
            break;
        };
        let (a, b, c) = around(&open, i);
        diagonals.insert(normalize_edge(cycle[c], cycle[a]));
        patch.push([cycle[a], cycle[b], cycle[c]]);
        open.remove(i);
    }

    let hub = cycle[open[0]];
    let last = open.len() - 1;
    for (k, w) in open.windows(2).enumerate().skip(1) {
        let face = [hub, cycle[w[0]], cycle[w[1]]];
        // The closing spoke is a side of the remaining polygon.
        let fresh = if k + 1 == last {
            occupied.is_new(face)
        } else {
            admits((hub, cycle[w[1]]), face, &diagonals)
        };
        if !fresh {
            debug!(corners = open.len(), "remainder fan would overload an edge");
            return None;
        }
        diagonals.insert(normalize_edge(hub, cycle[w[1]]));
        patch.push(face);
    }
    Some(patch)
}

/// Area-weighted polygon normal; +Z for a degenerate polygon.
fn newell_normal(corners: &[Point3<f64>]) -> Vector3<f64> {
    let next = corners.iter().cycle().skip(1);
    corners
        .iter()
        .zip(next)
        .fold(Vector3::zeros(), |n, (p, q)| n + p.coords.cross(&q.coords))
        .try_normalize(f64::EPSILON)
        .unwrap_or_else(Vector3::z)
}

/// Convex at `b` relative to `facing` with no other open corner inside.
fn is_ear(
    corners: &[Point3<f64>],
    open: &[usize],
    (a, b, c): (usize, usize, usize),
    facing: &Vector3<f64>,
) -> bool {
    let ear = Triangle::new(corners[a], corners[b], corners[c]);
    if !ear.normal().is_some_and(|n| n.dot(facing) > 0.0) {
        return false;
    }
    open.iter()
        .filter(|&&k| k != a && k != b && k != c)
        .all(|&k| !covers(&ear, &corners[k], facing))
}

/// Whether `p` projects inside (or onto) `tri` along `facing`.
fn covers(tri: &Triangle, p: &Point3<f64>, facing: &Vector3<f64>) -> bool {
    let edges = [(tri.v0, tri.v1), (tri.v1, tri.v2), (tri.v2, tri.v0)];
    let sides = edges.map(|(u, v)| (v - u).cross(&(p - u)).dot(facing));
    sides.iter().all(|&s| s >= 0.0) || sides.iter().all(|&s| s <= 0.0)
}

/// Close a hole by adding a vertex at the loop centroid and fanning to it.
///
/// The new vertex carries the mean color of the loop when the loop vertices
/// have colors. Returns the number of triangles added.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn fill_hole_centroid_fan(mesh: &mut IndexedMesh, boundary: &BoundaryLoop) -> usize {
    let n = boundary.vertices.len();
    if n < 3 {
        return 0;
    }

    let centroid = Point3::from(
        boundary
            .vertices
            .iter()
            .map(|&i| mesh.vertices[i as usize].position.coords)
            .sum::<Vector3<f64>>()
            / n as f64,
    );
    let color = VertexColor::mean(
        boundary
            .vertices
            .iter()
            .filter_map(|&i| mesh.vertices[i as usize].color()),
    );

    let center = mesh.vertices.len() as u32;
    mesh.vertices.push(Vertex {
        position: centroid,
        attributes: VertexAttributes {
            color,
            ..VertexAttributes::empty()
        },
    });
    let ring = boundary.vertices.iter().zip(boundary.vertices.iter().cycle().skip(1));
    mesh.faces.extend(ring.map(|(&a, &b)| [a, b, center]));
    n
}

/// Fill holes up to `max_hole_edges` edges (`None` fills every hole).
///
/// First pass: ear clipping on every loop within the limit. Second pass:
/// loops still open afterwards, including those clipping had to give up on,
/// are closed with a centroid fan.
///
/// # Errors
///
/// Returns [`RepairError::InvalidIndex`] if a face references a missing
/// vertex.
pub fn fill_holes(
    mesh: &mut IndexedMesh,
    max_hole_edges: Option<usize>,
) -> RepairResult<HoleFillSummary> {
    check_indices(mesh)?;

    let within_limit = |hole: &BoundaryLoop| max_hole_edges.map_or(true, |m| hole.edge_count() <= m);
    let mut summary = HoleFillSummary::default();

    let (fillable, skipped): (Vec<_>, Vec<_>) =
        detect_holes(mesh).into_iter().partition(|h| within_limit(h));
    for hole in &skipped {
        warn!(edges = hole.edge_count(), limit = ?max_hole_edges, "hole too large, leaving it open");
    }
    summary.holes_skipped = skipped.len();

    let mut occupied = Occupancy::of(&mesh.faces);
    for hole in &fillable {
        let Some(patch) = clip_hole(mesh, hole, &occupied) else {
            continue;
        };
        occupied.extend(&patch);
        summary.triangles_added += patch.len();
        summary.holes_filled += 1;
        mesh.faces.extend(patch);
    }

    if !fillable.is_empty() {
        for hole in detect_holes(mesh).iter().filter(|h| within_limit(h)) {
            summary.triangles_added += fill_hole_centroid_fan(mesh, hole);
            summary.vertices_added += 1;
            summary.holes_fanned += 1;
        }
    }

    if summary.holes_filled + summary.holes_fanned > 0 {
        info!("{}", summary);
    }
    Ok(summary)
}

fn check_indices(mesh: &IndexedMesh) -> RepairResult<()> {
    let vertex_count = mesh.vertices.len();
    mesh.faces
        .iter()
        .flatten()
        .find(|&&i| i as usize >= vertex_count)
        .map_or(Ok(()), |&index| Err(RepairError::InvalidIndex { index, vertex_count }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mesh_types::unit_cube;

    /// Unit cube minus its +X pair of faces.
    fn tray() -> IndexedMesh {
        let mut cube = unit_cube();
        cube.faces.truncate(10);
        cube
    }

    #[test]
    fn tray_has_one_square_hole() {
        let holes = detect_holes(&tray());
        assert_eq!(holes.len(), 1);
        assert_eq!(holes[0].edge_count(), 4);
        assert!(detect_holes(&unit_cube()).is_empty());
    }

    #[test]
    fn patch_keeps_the_cube_outward() {
        let mut mesh = tray();
        let summary = fill_holes(&mut mesh, Some(100)).unwrap();

        assert_eq!((summary.holes_filled, summary.holes_fanned, summary.triangles_added), (1, 0, 2));
        assert!(MeshAdjacency::build(&mesh.faces).is_watertight());
        assert!((mesh.signed_volume() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn oversized_hole_stays_open() {
        let mut mesh = tray();
        let summary = fill_holes(&mut mesh, Some(3)).unwrap();
        assert_eq!((summary.holes_filled, summary.holes_skipped), (0, 1));
        assert_eq!(mesh.face_count(), 10);
        assert!(summary.to_string().contains("left 1 open"));
    }

    #[test]
    fn fan_adds_a_centroid() {
        let mut mesh = tray();
        let hole = detect_holes(&mesh).remove(0);
        assert_eq!(fill_hole_centroid_fan(&mut mesh, &hole), 4);

        assert_eq!(mesh.vertex_count(), 9);
        let center = mesh.vertices[8].position;
        assert!((center.x - 1.0).abs() < 1e-12 && (center.y - 0.5).abs() < 1e-12);
        assert!(detect_holes(&mesh).is_empty());
        assert!((mesh.signed_volume() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn reflex_corner_is_not_clipped() {
        // L-shaped outline in the XY plane, reflex at (0.1, 0.1).
        let outline = [(0.0, 0.0), (0.2, 0.0), (0.2, 0.1), (0.1, 0.1), (0.1, 0.2), (0.0, 0.2)];
        let mut mesh = IndexedMesh::from_parts(
            outline.iter().map(|&(x, y)| Vertex::from_coords(x, y, 0.0)).collect(),
            Vec::new(),
        );
        let patch = fill_hole_ear_clipping(&mesh, &BoundaryLoop { vertices: (0..6).collect() });
        assert_eq!(patch.len(), 4);

        mesh.faces = patch;
        let area: f64 = mesh.triangles().map(|t| t.area()).sum();
        assert!((area - 0.03).abs() < 1e-12);
        assert!(mesh.triangles().all(|t| t.normal().is_some_and(|n| n.z > 0.0)));
    }

    /// Unit square in the XY plane plus an apex; each pair in `spokes`
    /// becomes a face on the apex.
    fn square_with_spokes(spokes: &[(u32, u32)]) -> IndexedMesh {
        let corners = [(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (1.0, 1.0, 0.0), (0.0, 1.0, 0.0), (0.5, 0.5, 1.0)];
        IndexedMesh::from_parts(
            corners.iter().map(|&(x, y, z)| Vertex::from_coords(x, y, z)).collect(),
            spokes.iter().map(|&(a, b)| [a, b, 4]).collect(),
        )
    }

    #[test]
    fn existing_edges_are_not_reused_as_diagonals() {
        let hole = BoundaryLoop { vertices: vec![0, 1, 2, 3] };

        let patch = fill_hole_ear_clipping(&square_with_spokes(&[(1, 3)]), &hole);
        assert_eq!(patch, vec![[0, 1, 2], [0, 2, 3]]);

        let blocked = square_with_spokes(&[(1, 3), (2, 0)]);
        assert!(fill_hole_ear_clipping(&blocked, &hole).is_empty());
    }

    #[test]
    fn lone_face_is_fanned_not_mirrored() {
        let corners = [(0.0, 0.0), (0.3, 0.0), (0.0, 0.3)];
        let mut flap = IndexedMesh::from_parts(
            corners.iter().map(|&(x, y)| Vertex::from_coords(x, y, 0.0)).collect(),
            vec![[0, 1, 2]],
        );
        let hole = detect_holes(&flap).remove(0);
        assert!(fill_hole_ear_clipping(&flap, &hole).is_empty());

        let summary = fill_holes(&mut flap, None).unwrap();
        assert_eq!((summary.holes_filled, summary.holes_fanned), (0, 1));
        assert_eq!(crate::clean::count_duplicate_faces(&flap.faces), 0);
        assert!(MeshAdjacency::build(&flap.faces).is_watertight());
    }

    #[test]
    fn pinched_walks_split_into_simple_cycles() {
        assert_eq!(
            simple_cycles(&[0, 1, 2, 3, 1, 4, 5, 0]),
            vec![vec![1, 2, 3], vec![0, 1, 4, 5]]
        );
        assert!(simple_cycles(&[0, 1, 0]).is_empty());
        // An open chain is not a hole.
        assert_eq!(simple_cycles(&[0, 8, 2, 3, 6, 2]), vec![vec![2, 3, 6]]);
    }

    #[test]
    fn short_cycles_give_nothing() {
        let mesh = tray();
        assert!(fill_hole_ear_clipping(&mesh, &BoundaryLoop { vertices: vec![0, 1] }).is_empty());
    }

    #[test]
    fn dangling_index_is_an_error() {
        let mut mesh = tray();
        mesh.faces.push([0, 1, 42]);
        assert!(matches!(
            fill_holes(&mut mesh, None),
            Err(RepairError::InvalidIndex { index: 42, .. })
        ));
    }
}
