//! Mesh file I/O for textured reconstructions.
//!
//! - **Export** - Atomic OBJ + MTL + PNG output of a textured mesh
//! - **OBJ** - Reading OBJ geometry and texture coordinates back
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. It can be used in:
//! - CLI tools
//! - Batch reconstruction services
//! - Viewers that load the exported OBJ themselves
//!
//! # Example
//!
//! ```no_run
//! use image::RgbImage;
//! use mesh_io::{export_textured, read_obj};
//! # use mesh_types::IndexedMesh;
//! # let mesh = IndexedMesh::new();
//!
//! let texture = RgbImage::new(256, 256);
//! let paths = export_textured(&mesh, &texture, "out", "model").unwrap();
//! let reloaded = read_obj(&paths.obj).unwrap();
//! assert_eq!(reloaded.face_count(), mesh.face_count());
//! ```
//!
//! Texture coordinates are written as given. Callers produce them with
//! `v = 0` at the bottom of the image, as OBJ viewers expect.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]

mod error;
mod export;
mod obj;

pub use error::{Artifact, ExportError, ExportResult, IoError, IoResult};
pub use export::{
    export_textured, write_mtl, write_obj, write_png, ExportPaths, GROUP_NAME, MATERIAL_NAME,
};
pub use obj::{parse_obj, read_obj};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_extensions() {
        assert_eq!(Artifact::Obj.extension(), "obj");
        assert_eq!(Artifact::Mtl.extension(), "mtl");
        assert_eq!(Artifact::Texture.extension(), "png");
        assert_eq!(Artifact::Texture.to_string(), "texture");
    }

    #[test]
    fn export_paths_share_basename() {
        let paths = ExportPaths::new("/tmp/run", "cup");
        for artifact in [Artifact::Obj, Artifact::Mtl, Artifact::Texture] {
            let path = paths.get(artifact);
            assert_eq!(path.file_stem().and_then(|s| s.to_str()), Some("cup"));
            assert_eq!(
                path.extension().and_then(|s| s.to_str()),
                Some(artifact.extension())
            );
        }
    }
}
