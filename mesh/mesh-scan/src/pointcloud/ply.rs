//! PLY point cloud support.
//!
//! Reading accepts ASCII, binary little-endian and binary big-endian files
//! through `ply-rs`. Only the `vertex` element is used; faces, if any, are
//! ignored.
//!
//! # Supported Vertex Properties
//!
//! - `x`, `y`, `z` - required, any numeric type
//! - `nx`, `ny`, `nz` - optional normal
//! - `red`, `green`, `blue` (or `r`, `g`, `b`) - optional color, either
//!   8-bit integers or floats in `[0, 1]`
//!
//! Writing goes through the `ply-rs` writer and always produces binary
//! little-endian with double positions.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use mesh_types::VertexColor;
use nalgebra::{Point3, Vector3};
use ply_rs::parser::Parser;
use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
    ScalarType,
};
use ply_rs::writer::Writer;

use super::{CloudPoint, PointCloud};
use crate::error::{ScanError, ScanResult};

/// Loads a point cloud from a PLY file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid PLY, or its
/// vertices lack `x`, `y` or `z`.
pub fn load_ply<P: AsRef<Path>>(path: P) -> ScanResult<PointCloud> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ScanError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ScanError::Io(e)
        }
    })?;
    let mut reader = BufReader::new(file);

    let parser = Parser::<DefaultElement>::new();
    let header = parser
        .read_header(&mut reader)
        .map_err(|e| ScanError::PlyParse {
            reason: format!("failed to parse header: {e}"),
        })?;
    let payload = parser
        .read_payload(&mut reader, &header)
        .map_err(|e| ScanError::PlyParse {
            reason: format!("failed to read payload: {e}"),
        })?;

    let Some(vertices) = payload.get("vertex") else {
        return Ok(PointCloud::new());
    };

    let mut cloud = PointCloud::with_capacity(vertices.len());
    for (index, element) in vertices.iter().enumerate() {
        let coord = |key: &str| {
            scalar(element, key).ok_or_else(|| ScanError::PlyParse {
                reason: format!("vertex {index} has no numeric '{key}' property"),
            })
        };
        let position = Point3::new(coord("x")?, coord("y")?, coord("z")?);

        let normal = match (
            scalar(element, "nx"),
            scalar(element, "ny"),
            scalar(element, "nz"),
        ) {
            (Some(nx), Some(ny), Some(nz)) => Some(Vector3::new(nx, ny, nz)),
            _ => None,
        };

        let color = color_channel(element, "red", "r")
            .zip(color_channel(element, "green", "g"))
            .zip(color_channel(element, "blue", "b"))
            .map(|((r, g), b)| VertexColor::new(r, g, b));

        cloud.push(CloudPoint {
            position,
            normal,
            color,
        });
    }

    Ok(cloud)
}

/// Numeric property as `f64`, whatever its stored type.
fn scalar(element: &DefaultElement, key: &str) -> Option<f64> {
    Some(match element.get(key)? {
        Property::Char(v) => f64::from(*v),
        Property::UChar(v) => f64::from(*v),
        Property::Short(v) => f64::from(*v),
        Property::UShort(v) => f64::from(*v),
        Property::Int(v) => f64::from(*v),
        Property::UInt(v) => f64::from(*v),
        Property::Float(v) => f64::from(*v),
        Property::Double(v) => *v,
        _ => return None,
    })
}

/// 8-bit color channel; float channels are read as `[0, 1]`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn color_channel(element: &DefaultElement, key: &str, short_key: &str) -> Option<u8> {
    let prop = element.get(key).or_else(|| element.get(short_key))?;
    let quantize = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    match prop {
        Property::UChar(v) => Some(*v),
        Property::Float(v) => Some(quantize(f64::from(*v))),
        Property::Double(v) => Some(quantize(*v)),
        Property::UShort(v) => Some((v >> 8) as u8),
        _ => None,
    }
}

/// Saves a point cloud as binary little-endian PLY.
///
/// Normals and colors are written only when every point has them.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_ply<P: AsRef<Path>>(cloud: &PointCloud, path: P) -> ScanResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let mut ply = cloud_to_ply(cloud);
    Writer::new().write_ply(&mut writer, &mut ply)?;
    writer.flush()?;
    Ok(())
}

/// Vertex-only PLY document: double positions, then float normals and
/// uchar colors when the whole cloud carries them.
#[allow(clippy::cast_possible_truncation)]
fn cloud_to_ply(cloud: &PointCloud) -> Ply<DefaultElement> {
    let has_normals = cloud.has_normals();
    let has_colors = cloud.has_colors();

    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = Encoding::BinaryLittleEndian;
    ply.header.comments.push("written by mesh-scan".to_string());

    let mut vertex_def = ElementDef::new("vertex".to_string());
    let mut declare = |names: [&str; 3], scalar: ScalarType| {
        for name in names {
            vertex_def
                .properties
                .add(PropertyDef::new(name.to_string(), PropertyType::Scalar(scalar.clone())));
        }
    };
    declare(["x", "y", "z"], ScalarType::Double);
    if has_normals {
        declare(["nx", "ny", "nz"], ScalarType::Float);
    }
    if has_colors {
        declare(["red", "green", "blue"], ScalarType::UChar);
    }
    vertex_def.count = cloud.len();
    ply.header.elements.add(vertex_def);

    let vertices = cloud
        .points
        .iter()
        .map(|point| {
            let mut element = DefaultElement::new();
            let p = point.position;
            for (key, v) in [("x", p.x), ("y", p.y), ("z", p.z)] {
                element.insert(key.to_string(), Property::Double(v));
            }
            if has_normals {
                let n = point.normal.unwrap_or_else(Vector3::z);
                for (key, v) in [("nx", n.x), ("ny", n.y), ("nz", n.z)] {
                    element.insert(key.to_string(), Property::Float(v as f32));
                }
            }
            if has_colors {
                let c = point.color.unwrap_or(VertexColor::BLACK);
                for (key, v) in [("red", c.r), ("green", c.g), ("blue", c.b)] {
                    element.insert(key.to_string(), Property::UChar(v));
                }
            }
            element
        })
        .collect();
    ply.payload.insert("vertex".to_string(), vertices);
    ply
}
