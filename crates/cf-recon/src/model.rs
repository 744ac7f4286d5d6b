//! The record of a finished reconstruction.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use mesh_io::ExportPaths;
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::store::RunId;

/// A textured model on disk. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TexturedModel {
    /// Run that produced the model.
    pub id: RunId,
    /// Display name.
    pub name: String,
    /// Directory holding the three files.
    pub folder_path: PathBuf,
    /// Id of the persisted `completed` cloud, if a store was attached.
    pub point_cloud_id: Option<String>,
    /// Geometry file.
    pub obj_path: PathBuf,
    /// Material file.
    pub mtl_path: PathBuf,
    /// Texture image.
    pub texture_path: PathBuf,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl TexturedModel {
    pub(crate) fn new(
        id: RunId,
        name: &str,
        folder: &Path,
        point_cloud_id: Option<String>,
        paths: ExportPaths,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            folder_path: folder.to_path_buf(),
            point_cloud_id,
            obj_path: paths.obj,
            mtl_path: paths.mtl,
            texture_path: paths.texture,
            created_at: Utc::now(),
        }
    }

    /// The model's files.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        [&self.obj_path, &self.mtl_path, &self.texture_path]
            .into_iter()
            .map(PathBuf::as_path)
    }

    /// Removes the model's files. Files already gone are not an error.
    ///
    /// # Errors
    ///
    /// Returns the first removal failure; later files are still attempted.
    pub fn delete_files(&self) -> io::Result<()> {
        let mut first_err = None;
        for path in self.files() {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Deleted model file"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
