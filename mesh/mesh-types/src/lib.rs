//! Value types shared by every reconstruction stage.
//!
//! | Type            | Role                                                 |
//! |-----------------|------------------------------------------------------|
//! | [`Vertex`]      | position plus optional normal, color and UV          |
//! | [`VertexColor`] | 8-bit RGB, as scans and textures store it            |
//! | [`IndexedMesh`] | triangles over a shared vertex list                  |
//! | [`Triangle`]    | one resolved face, with area and sliver measures     |
//! | [`Aabb`]        | axis-aligned bounds                                  |
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with zero Bevy dependencies.
//!
//! # Units and Axes
//!
//! Coordinates are unit-agnostic `f64`. Scanner output is usually in meters,
//! and the default thresholds downstream assume that scale.
//!
//! Right-handed, **Z up**. Face winding is counter-clockwise when viewed
//! from outside, so normals point outward by the right-hand rule.
//!
//! # Color Convention
//!
//! Vertex and point colors are 8-bit ([`VertexColor`]). Floating-point colors
//! in `[0, 1]` only appear at the texture raster and material boundaries, via
//! [`VertexColor::to_float`] and [`VertexColor::from_float`].
//!
//! ```
//! use mesh_types::{unit_cube, VertexColor};
//!
//! let mut cube = unit_cube();
//! cube.vertices[0].attributes.color = Some(VertexColor::new(200, 40, 40));
//! assert!(cube.indices_valid() && !cube.has_colors());
//! assert_eq!(cube.average_color(), Some(VertexColor::new(200, 40, 40)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod bounds;
mod mesh;
mod triangle;
mod vertex;

pub use bounds::Aabb;
pub use mesh::{unit_cube, IndexedMesh};
pub use triangle::Triangle;
pub use vertex::{Vertex, VertexAttributes, VertexColor};

pub use nalgebra::{Point3, Vector3};
