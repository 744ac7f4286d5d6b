//! Color baking from point clouds onto reconstructed meshes.
//!
//! Given a mesh and the colored cloud it was built from, this crate:
//!
//! - **Transfer** - Colors each vertex from its nearest cloud point
//! - **Smooth** - Blends vertex colors over the one-ring
//! - **Unwrap** - Splits the mesh into box-projected charts and packs them
//! - **Raster** - Bakes vertex colors into an RGB texture and dilates seams
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with zero Bevy dependencies. Textures are plain
//! `image::RgbImage` buffers.
//!
//! # Quick Start
//!
//! ```
//! use mesh_scan::pointcloud::{CloudPoint, PointCloud};
//! use mesh_texture::{TextureMapper, TextureParams};
//! use mesh_types::{unit_cube, VertexColor};
//!
//! let cube = unit_cube();
//! let mut cloud = PointCloud::new();
//! for v in &cube.vertices {
//!     cloud.push(CloudPoint::with_color(v.position, VertexColor::new(0, 160, 80)));
//! }
//!
//! let textured = TextureMapper::new(TextureParams::default())
//!     .map(&cube, &cloud)
//!     .unwrap();
//! assert!(textured.mesh.has_uvs());
//! assert_eq!(textured.texture.width(), 256);
//! ```
//!
//! UVs put `v = 0` at the bottom of the image, so they can be written to
//! OBJ files unchanged.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_const_for_fn)] // Not all functions benefit from const
#![allow(clippy::needless_range_loop)] // Channel loops read better indexed
#![allow(clippy::many_single_char_names)] // Geometry formulas

pub mod error;
pub mod image;
pub mod mapper;
pub mod raster;
pub mod transfer;
pub mod unwrap;

pub use error::{TextureError, TextureResult};
pub use image::TextureImage;
pub use mapper::{TextureMapper, TextureParams, TexturedMesh, MAX_TEXTURE_SIZE, MIN_TEXTURE_SIZE};
pub use transfer::{smooth_colors, transfer_colors, NEUTRAL_GREY};
