//! Laplacian smoothing with boundary and feature-edge constraints.
//!
//! Each iteration moves every free vertex a fraction `relaxation` of the way
//! toward the mean of its neighbors (Jacobi update). Boundary and feature
//! vertices are either fixed or restricted to their boundary/feature
//! neighbors, so the outline and sharp creases of a scan survive smoothing.

use hashbrown::HashMap;
use mesh_types::{IndexedMesh, Point3, Vector3};
use tracing::debug;

use crate::adjacency::MeshAdjacency;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters for [`smooth_laplacian`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct SmoothParams {
    /// Number of smoothing passes. Default: 3.
    pub iterations: usize,
    /// Fraction of the Laplacian applied per pass. Default: 0.01.
    pub relaxation: f64,
    /// Let boundary vertices slide along the boundary. When false they are
    /// fixed. Default: `true`.
    pub boundary_smoothing: bool,
    /// Let feature vertices slide along feature edges. When false they are
    /// fixed. Default: `false`.
    pub feature_smoothing: bool,
    /// Dihedral angle in degrees above which an edge is a feature edge.
    /// Default: 60.
    pub feature_angle_deg: f64,
    /// Turning angle in degrees above which a boundary or feature vertex is
    /// a corner and stays fixed. Default: 15.
    pub edge_angle_deg: f64,
}

impl Default for SmoothParams {
    fn default() -> Self {
        Self {
            iterations: 3,
            relaxation: 0.01,
            boundary_smoothing: true,
            feature_smoothing: false,
            feature_angle_deg: 60.0,
            edge_angle_deg: 15.0,
        }
    }
}

impl SmoothParams {
    /// Set the number of passes.
    #[must_use]
    pub const fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the relaxation factor.
    #[must_use]
    pub const fn with_relaxation(mut self, relaxation: f64) -> Self {
        self.relaxation = relaxation;
        self
    }

    /// Enable or disable boundary smoothing.
    #[must_use]
    pub const fn with_boundary_smoothing(mut self, enabled: bool) -> Self {
        self.boundary_smoothing = enabled;
        self
    }

    /// Enable or disable feature smoothing.
    #[must_use]
    pub const fn with_feature_smoothing(mut self, enabled: bool) -> Self {
        self.feature_smoothing = enabled;
        self
    }

    /// Set the feature angle in degrees.
    #[must_use]
    pub const fn with_feature_angle(mut self, degrees: f64) -> Self {
        self.feature_angle_deg = degrees;
        self
    }

    /// Set the corner angle in degrees.
    #[must_use]
    pub const fn with_edge_angle(mut self, degrees: f64) -> Self {
        self.edge_angle_deg = degrees;
        self
    }
}

/// How a vertex may move.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Constraint {
    Free,
    Fixed,
    /// Restricted to these neighbors (boundary or feature chain).
    Along(Vec<u32>),
}

/// Smooth vertex positions in place.
///
/// Returns the largest single-vertex displacement of the last pass, which
/// is zero when nothing moved.
///
/// # Example
///
/// ```
/// use mesh_repair::{smooth_laplacian, SmoothParams};
/// use mesh_types::unit_cube;
///
/// // Every cube edge is a 90° crease, so nothing moves with feature
/// // smoothing off.
/// let mut cube = unit_cube();
/// let moved = smooth_laplacian(&mut cube, &SmoothParams::default());
/// assert_eq!(moved, 0.0);
/// ```
#[allow(clippy::cast_precision_loss)]
pub fn smooth_laplacian(mesh: &mut IndexedMesh, params: &SmoothParams) -> f64 {
    if mesh.is_empty() || params.iterations == 0 || params.relaxation == 0.0 {
        return 0.0;
    }

    let neighbors = vertex_neighbors(mesh);
    let constraints = classify_vertices(mesh, params);

    let mut last_max = 0.0_f64;
    for _ in 0..params.iterations {
        let positions: Vec<Point3<f64>> = mesh.vertices.iter().map(|v| v.position).collect();
        last_max = 0.0;

        for (idx, vertex) in mesh.vertices.iter_mut().enumerate() {
            let targets: &[u32] = match &constraints[idx] {
                Constraint::Fixed => continue,
                Constraint::Free => &neighbors[idx],
                Constraint::Along(chain) => chain,
            };
            if targets.is_empty() {
                continue;
            }
            let sum = targets
                .iter()
                .fold(Vector3::zeros(), |acc, &n| acc + positions[n as usize].coords);
            let mean = sum / targets.len() as f64;
            let delta = (mean - positions[idx].coords) * params.relaxation;
            vertex.position = positions[idx] + delta;
            last_max = last_max.max(delta.norm());
        }
    }

    debug!(
        iterations = params.iterations,
        relaxation = params.relaxation,
        max_displacement = last_max,
        "Laplacian smoothing"
    );
    last_max
}

/// One-ring neighbors of every vertex, sorted and deduplicated.
fn vertex_neighbors(mesh: &IndexedMesh) -> Vec<Vec<u32>> {
    let mut neighbors: Vec<Vec<u32>> = vec![Vec::new(); mesh.vertices.len()];
    for &[a, b, c] in &mesh.faces {
        neighbors[a as usize].extend([b, c]);
        neighbors[b as usize].extend([a, c]);
        neighbors[c as usize].extend([a, b]);
    }
    for list in &mut neighbors {
        list.sort_unstable();
        list.dedup();
    }
    neighbors
}

fn classify_vertices(mesh: &IndexedMesh, params: &SmoothParams) -> Vec<Constraint> {
    let adjacency = MeshAdjacency::build(&mesh.faces);
    let cos_feature = params.feature_angle_deg.to_radians().cos();
    let face_normals: Vec<Option<Vector3<f64>>> = (0..mesh.faces.len())
        .map(|i| mesh.triangle(i).and_then(|t| t.normal()))
        .collect();

    let mut boundary: HashMap<u32, Vec<u32>> = HashMap::new();
    let mut feature: HashMap<u32, Vec<u32>> = HashMap::new();

    for ((a, b), faces) in adjacency.edges() {
        let target = match faces {
            [_] => &mut boundary,
            [f0, f1] => match (face_normals[*f0], face_normals[*f1]) {
                (Some(n0), Some(n1)) if n0.dot(&n1) < cos_feature => &mut feature,
                _ => continue,
            },
            // Non-manifold edges are treated as creases.
            _ => &mut feature,
        };
        target.entry(a).or_default().push(b);
        target.entry(b).or_default().push(a);
    }

    let cos_edge = params.edge_angle_deg.to_radians().cos();
    (0..mesh.vertices.len())
        .map(|v| {
            #[allow(clippy::cast_possible_truncation)]
            let key = v as u32;
            if let Some(chain) = boundary.get(&key) {
                chain_constraint(mesh, v, chain, params.boundary_smoothing, cos_edge)
            } else if let Some(chain) = feature.get(&key) {
                chain_constraint(mesh, v, chain, params.feature_smoothing, cos_edge)
            } else {
                Constraint::Free
            }
        })
        .collect()
}

/// A vertex in the middle of a chain (exactly two chain neighbors, turning
/// by at most the edge angle) may slide along it. Corners, chain ends and
/// branch points stay fixed.
fn chain_constraint(
    mesh: &IndexedMesh,
    vertex: usize,
    chain: &[u32],
    enabled: bool,
    cos_edge: f64,
) -> Constraint {
    let &[prev, next] = chain else {
        return Constraint::Fixed;
    };
    if !enabled {
        return Constraint::Fixed;
    }
    let p = mesh.vertices[vertex].position;
    let incoming = p - mesh.vertices[prev as usize].position;
    let outgoing = mesh.vertices[next as usize].position - p;
    match (
        incoming.try_normalize(f64::EPSILON),
        outgoing.try_normalize(f64::EPSILON),
    ) {
        (Some(a), Some(b)) if a.dot(&b) >= cos_edge => Constraint::Along(chain.to_vec()),
        _ => Constraint::Fixed,
    }
}
