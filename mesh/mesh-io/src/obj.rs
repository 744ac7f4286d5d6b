//! Wavefront OBJ reading.
//!
//! Parsing is done by the `obj` crate's raw parser, which handles every
//! face form (`a`, `a/b`, `a//c`, `a/b/c`) and relative indices. Only
//! positions, texture coordinates and polygons are kept; polygons are
//! fan-triangulated.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use mesh_types::{IndexedMesh, Vertex};
use obj::raw::object::Polygon;
use obj::ObjError;
use tracing::debug;

use crate::error::{IoError, IoResult};

/// Reads an OBJ file into a mesh.
///
/// A vertex referenced with a texture coordinate takes the UV of its first
/// such reference.
///
/// # Errors
///
/// - [`IoError::FileNotFound`] if the file does not exist
/// - [`IoError::InvalidContent`] for malformed records or out-of-range
///   indices
/// - [`IoError::Io`] for read failures
pub fn read_obj<P: AsRef<Path>>(path: P) -> IoResult<IndexedMesh> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            IoError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            IoError::Io(e)
        }
    })?;
    parse_obj(BufReader::new(file))
}

/// Parses OBJ text from a reader. See [`read_obj`].
///
/// # Errors
///
/// Same as [`read_obj`], minus [`IoError::FileNotFound`].
pub fn parse_obj<R: BufRead>(reader: R) -> IoResult<IndexedMesh> {
    let raw = obj::raw::parse_obj(reader).map_err(|e| match e {
        ObjError::Io(e) => IoError::Io(e),
        other => IoError::invalid_content(other.to_string()),
    })?;

    let mut mesh = IndexedMesh::from_parts(
        raw.positions
            .iter()
            .map(|&(x, y, z, _)| Vertex::from_coords(f64::from(x), f64::from(y), f64::from(z)))
            .collect(),
        Vec::with_capacity(raw.polygons.len()),
    );
    let uvs: Vec<(f32, f32)> = raw.tex_coords.iter().map(|&(u, v, _)| (u, v)).collect();

    for (n, polygon) in raw.polygons.iter().enumerate() {
        let corners: Vec<(usize, Option<usize>)> = match polygon {
            Polygon::P(idx) => idx.iter().map(|&p| (p, None)).collect(),
            Polygon::PN(idx) => idx.iter().map(|&(p, _)| (p, None)).collect(),
            Polygon::PT(idx) => idx.iter().map(|&(p, t)| (p, Some(t))).collect(),
            Polygon::PTN(idx) => idx.iter().map(|&(p, t, _)| (p, Some(t))).collect(),
        };
        if corners.len() < 3 {
            return Err(IoError::invalid_content(format!(
                "face {n} has {} corners",
                corners.len()
            )));
        }

        let mut ring = Vec::with_capacity(corners.len());
        for (p, t) in corners {
            let vertex = mesh.vertices.get_mut(p).ok_or_else(|| {
                IoError::invalid_content(format!(
                    "face {n} references vertex {p} of {}",
                    raw.positions.len()
                ))
            })?;
            if let Some(t) = t {
                let uv = uvs.get(t).copied().ok_or_else(|| {
                    IoError::invalid_content(format!(
                        "face {n} references texture coordinate {t} of {}",
                        uvs.len()
                    ))
                })?;
                if vertex.attributes.uv.is_none() {
                    vertex.attributes.uv = Some(uv);
                }
            }
            ring.push(
                u32::try_from(p)
                    .map_err(|_| IoError::invalid_content("vertex index exceeds 32 bits"))?,
            );
        }
        mesh.faces
            .extend(ring.windows(2).skip(1).map(|w| [ring[0], w[0], w[1]]));
    }

    debug!(
        vertices = mesh.vertex_count(),
        uvs = uvs.len(),
        faces = mesh.face_count(),
        "Parsed OBJ"
    );
    Ok(mesh)
}
