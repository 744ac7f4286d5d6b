//! Box-projection UV unwrapping with shelf packing.
//!
//! Faces are grouped into charts: edge-connected regions whose normals
//! share a dominant axis (±X, ±Y, ±Z). Each chart is projected onto the
//! plane of its axis, which keeps distortion low for the mostly convex
//! shapes that come out of a scan. Charts are then packed into the unit
//! square on horizontal shelves, tallest first.
//!
//! UVs follow the OBJ convention: `v = 0` is the bottom row of the image.

use std::collections::VecDeque;

use hashbrown::HashMap;
use mesh_types::{IndexedMesh, Vertex};
use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::error::{TextureError, TextureResult};

/// Scale reductions tried per texture size before growing the texture.
const SHRINK_STEPS: usize = 24;
const SHRINK_FACTOR: f64 = 0.85;
/// Fraction of the texture the first packing attempt aims to fill.
const TARGET_FILL: f64 = 0.6;

/// Dominant-axis label of a face normal, 0..6 as +X, -X, +Y, -Y, +Z, -Z.
///
/// A degenerate face is labelled +Z.
#[must_use]
pub fn dominant_axis(normal: Option<Vector3<f64>>) -> usize {
    let Some(n) = normal else {
        return 4;
    };
    let axis = n.iamax();
    axis * 2 + usize::from(n[axis] < 0.0)
}

/// Orthographic projection onto the plane of `label`, mirrored on the
/// negative sides so that charts are not flipped in the texture.
fn project(p: &Point3<f64>, label: usize) -> [f64; 2] {
    match label {
        0 => [p.y, p.z],
        1 => [-p.y, p.z],
        2 => [-p.x, p.z],
        3 => [p.x, p.z],
        5 => [-p.x, p.y],
        _ => [p.x, p.y],
    }
}

/// One chart of an unwrap.
#[derive(Debug, Clone)]
pub struct Chart {
    /// Faces of the source mesh in this chart.
    pub faces: Vec<usize>,
    /// Dominant-axis label shared by the faces.
    pub axis: usize,
    min: [f64; 2],
    max: [f64; 2],
}

impl Chart {
    fn extent(&self) -> [f64; 2] {
        [self.max[0] - self.min[0], self.max[1] - self.min[1]]
    }
}

/// Splits the faces of `mesh` into charts.
#[must_use]
pub fn build_charts(mesh: &IndexedMesh) -> Vec<Chart> {
    let labels: Vec<usize> = mesh
        .triangles()
        .map(|t| dominant_axis(t.normal()))
        .collect();

    let mut edge_faces: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
    for (f, face) in mesh.faces.iter().enumerate() {
        for k in 0..3 {
            let (a, b) = (face[k], face[(k + 1) % 3]);
            edge_faces.entry((a.min(b), a.max(b))).or_default().push(f);
        }
    }

    let mut chart_of = vec![usize::MAX; mesh.faces.len()];
    let mut charts = Vec::new();
    for seed in 0..mesh.faces.len() {
        if chart_of[seed] != usize::MAX {
            continue;
        }
        let id = charts.len();
        let axis = labels[seed];
        let mut faces = Vec::new();
        let mut queue = VecDeque::from([seed]);
        chart_of[seed] = id;

        while let Some(f) = queue.pop_front() {
            faces.push(f);
            let face = mesh.faces[f];
            for k in 0..3 {
                let (a, b) = (face[k], face[(k + 1) % 3]);
                let Some(adjacent) = edge_faces.get(&(a.min(b), a.max(b))) else {
                    continue;
                };
                for &g in adjacent {
                    if chart_of[g] == usize::MAX && labels[g] == axis {
                        chart_of[g] = id;
                        queue.push_back(g);
                    }
                }
            }
        }

        let mut min = [f64::INFINITY; 2];
        let mut max = [f64::NEG_INFINITY; 2];
        for &f in &faces {
            for &v in &mesh.faces[f] {
                let uv = project(&mesh.vertices[v as usize].position, axis);
                for c in 0..2 {
                    min[c] = min[c].min(uv[c]);
                    max[c] = max[c].max(uv[c]);
                }
            }
        }
        charts.push(Chart {
            faces,
            axis,
            min,
            max,
        });
    }
    charts
}

/// Placement of a chart in texels.
#[derive(Debug, Clone, Copy)]
struct Placement {
    x: u32,
    y: u32,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn texel_extent(chart: &Chart, scale: f64, padding: u32) -> (u32, u32) {
    let [w, h] = chart.extent();
    let w = ((w * scale).ceil() as u32).max(1) + 2 * padding;
    let h = ((h * scale).ceil() as u32).max(1) + 2 * padding;
    (w, h)
}

/// Shelf-packs charts tallest first. `None` if they do not fit.
fn shelf_pack(charts: &[Chart], scale: f64, padding: u32, size: u32) -> Option<Vec<Placement>> {
    let extents: Vec<(u32, u32)> = charts
        .iter()
        .map(|c| texel_extent(c, scale, padding))
        .collect();
    let mut order: Vec<usize> = (0..charts.len()).collect();
    order.sort_by(|&a, &b| extents[b].1.cmp(&extents[a].1).then(a.cmp(&b)));

    let mut placements = vec![Placement { x: 0, y: 0 }; charts.len()];
    let (mut x, mut y, mut shelf_height) = (0u32, 0u32, 0u32);
    for i in order {
        let (w, h) = extents[i];
        if w > size {
            return None;
        }
        if x + w > size {
            y += shelf_height;
            x = 0;
            shelf_height = 0;
        }
        if y + h > size {
            return None;
        }
        placements[i] = Placement { x, y };
        x += w;
        shelf_height = shelf_height.max(h);
    }
    Some(placements)
}

/// Result of [`unwrap`].
#[derive(Debug, Clone)]
pub struct Unwrap {
    /// Mesh with vertices split at chart seams, every vertex carrying a UV.
    pub mesh: IndexedMesh,
    /// For each output vertex, the source vertex it was split from.
    pub source_vertex: Vec<usize>,
    /// Number of charts.
    pub charts: usize,
    /// Texture size the UVs were packed for.
    pub size: u32,
}

/// Unwraps `mesh` into a `size`×`size` texture with `padding` texels around
/// each chart. The size is doubled up to `max_size` if the charts cannot fit.
///
/// # Errors
///
/// - [`TextureError::EmptyMesh`] if the mesh has no faces
/// - [`TextureError::InvalidMesh`] for an out-of-range face index
/// - [`TextureError::PackingFailed`] if the charts do not fit in `max_size`
#[allow(clippy::cast_possible_truncation)]
pub fn unwrap(mesh: &IndexedMesh, size: u32, max_size: u32, padding: u32) -> TextureResult<Unwrap> {
    if mesh.faces.is_empty() {
        return Err(TextureError::EmptyMesh);
    }
    if let Some(face) = mesh
        .faces
        .iter()
        .position(|f| f.iter().any(|&v| v as usize >= mesh.vertices.len()))
    {
        return Err(TextureError::InvalidMesh { face });
    }

    let charts = build_charts(mesh);
    let area: f64 = charts
        .iter()
        .map(|c| {
            let [w, h] = c.extent();
            w.max(f64::EPSILON) * h.max(f64::EPSILON)
        })
        .sum();

    let mut size = size.max(1);
    let (scale, placements) = 'search: loop {
        let mut scale = (f64::from(size) * f64::from(size) * TARGET_FILL / area).sqrt();
        for _ in 0..SHRINK_STEPS {
            if let Some(p) = shelf_pack(&charts, scale, padding, size) {
                break 'search (scale, p);
            }
            scale *= SHRINK_FACTOR;
        }
        if size >= max_size {
            return Err(TextureError::PackingFailed {
                charts: charts.len(),
                size,
            });
        }
        size = (size * 2).min(max_size);
    };

    let texels = f64::from(size);
    let pad = f64::from(padding);
    let mut out = IndexedMesh::with_capacity(mesh.vertex_count(), mesh.face_count());
    let mut source_vertex = Vec::with_capacity(mesh.vertex_count());
    let mut faces = vec![[0u32; 3]; mesh.faces.len()];

    for (chart, place) in charts.iter().zip(&placements) {
        let mut split: HashMap<u32, u32> = HashMap::new();
        for &f in &chart.faces {
            for (k, &v) in mesh.faces[f].iter().enumerate() {
                let index = *split.entry(v).or_insert_with(|| {
                    let src = &mesh.vertices[v as usize];
                    let [pu, pv] = project(&src.position, chart.axis);
                    let x = f64::from(place.x) + pad + (pu - chart.min[0]) * scale;
                    let y = f64::from(place.y) + pad + (pv - chart.min[1]) * scale;
                    let mut vertex = Vertex::new(src.position);
                    vertex.attributes.normal = src.attributes.normal;
                    vertex.attributes.color = src.attributes.color;
                    vertex.attributes.uv = Some(((x / texels) as f32, (1.0 - y / texels) as f32));
                    out.vertices.push(vertex);
                    source_vertex.push(v as usize);
                    (out.vertices.len() - 1) as u32
                });
                faces[f][k] = index;
            }
        }
    }
    out.faces = faces;

    debug!(
        charts = charts.len(),
        size,
        scale,
        vertices_in = mesh.vertex_count(),
        vertices_out = out.vertex_count(),
        "UV unwrap"
    );
    Ok(Unwrap {
        mesh: out,
        source_vertex,
        charts: charts.len(),
        size,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mesh_types::unit_cube;

    #[test]
    fn test_dominant_axis_labels() {
        assert_eq!(dominant_axis(Some(Vector3::new(0.9, 0.1, 0.0))), 0);
        assert_eq!(dominant_axis(Some(Vector3::new(-0.9, 0.1, 0.0))), 1);
        assert_eq!(dominant_axis(Some(Vector3::new(0.1, -0.7, 0.2))), 3);
        assert_eq!(dominant_axis(Some(Vector3::new(0.0, 0.0, -1.0))), 5);
        assert_eq!(dominant_axis(None), 4);
    }

    #[test]
    fn test_cube_has_six_charts() {
        let charts = build_charts(&unit_cube());
        assert_eq!(charts.len(), 6);
        assert!(charts.iter().all(|c| c.faces.len() == 2));
        let mut axes: Vec<usize> = charts.iter().map(|c| c.axis).collect();
        axes.sort_unstable();
        assert_eq!(axes, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_cube_unwrap_splits_seams() {
        let cube = unit_cube();
        let result = unwrap(&cube, 256, 4096, 2).unwrap();

        assert_eq!(result.charts, 6);
        // Each face of the cube gets its own four corners.
        assert_eq!(result.mesh.vertex_count(), 24);
        assert_eq!(result.mesh.face_count(), 12);
        assert!(result.mesh.indices_valid());
        assert!(result.mesh.has_uvs());
        for v in &result.mesh.vertices {
            let (u, v) = v.uv().unwrap();
            assert!((0.0..=1.0).contains(&u) && (0.0..=1.0).contains(&v));
        }
        for (out, &src) in result.mesh.vertices.iter().zip(&result.source_vertex) {
            assert_eq!(out.position, cube.vertices[src].position);
        }
    }

    #[test]
    fn test_charts_do_not_overlap() {
        let result = unwrap(&unit_cube(), 256, 4096, 2).unwrap();
        let mut boxes = Vec::new();
        for tri in result.mesh.faces.chunks(2) {
            let (mut lo, mut hi) = ([f32::MAX; 2], [f32::MIN; 2]);
            for face in tri {
                for &v in face {
                    let (u, w) = result.mesh.vertices[v as usize].uv().unwrap();
                    lo = [lo[0].min(u), lo[1].min(w)];
                    hi = [hi[0].max(u), hi[1].max(w)];
                }
            }
            boxes.push((lo, hi));
        }
        for (i, a) in boxes.iter().enumerate() {
            for b in &boxes[i + 1..] {
                let apart = a.1[0] <= b.0[0] || b.1[0] <= a.0[0] || a.1[1] <= b.0[1] || b.1[1] <= a.0[1];
                assert!(apart, "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn test_empty_mesh_rejected() {
        assert!(matches!(
            unwrap(&IndexedMesh::new(), 256, 4096, 2),
            Err(TextureError::EmptyMesh)
        ));
    }

    #[test]
    fn test_invalid_index_rejected() {
        let mut mesh = unit_cube();
        mesh.faces.push([0, 1, 99]);
        assert!(matches!(
            unwrap(&mesh, 256, 4096, 2),
            Err(TextureError::InvalidMesh { face: 12 })
        ));
    }
}
