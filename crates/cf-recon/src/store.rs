//! Persistence of intermediate point clouds.
//!
//! A run hands each intermediate cloud to a [`PointCloudStore`] under its
//! run id and [`Stage`]. The store returns an id the caller can keep; the
//! id of the `completed` cloud ends up on the
//! [`TexturedModel`](crate::TexturedModel).

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use mesh_scan::{PointCloud, ScanError};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identity of one reconstruction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct RunId(Uuid);

impl RunId {
    /// A fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RunId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Pipeline stage an intermediate cloud comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "snake_case"))]
pub enum Stage {
    /// The loaded scan, centered.
    Original,
    /// After outlier removal and downsampling.
    Filtered,
    /// The isolated object.
    BackgroundRemoved,
    /// The synthetic bottom cap.
    Bottom,
    /// Object plus bottom, the triangulation input.
    Completed,
}

impl Stage {
    /// Every stage, in pipeline order.
    pub const ALL: [Self; 5] = [
        Self::Original,
        Self::Filtered,
        Self::BackgroundRemoved,
        Self::Bottom,
        Self::Completed,
    ];

    /// Stable snake-case name, also used as the file stem.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Filtered => "filtered",
            Self::BackgroundRemoved => "background_removed",
            Self::Bottom => "bottom",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from a [`PointCloudStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store's directory could not be created.
    #[error("cannot create {path}: {source}")]
    CreateDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing the cloud failed.
    #[error("cannot write {path}: {source}")]
    Write {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: ScanError,
    },

    /// Another thread panicked while holding the store.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Destination for intermediate clouds.
pub trait PointCloudStore: Send + Sync {
    /// Persists `cloud` for `stage` of `run` and returns its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the cloud cannot be stored.
    fn put(&self, run: RunId, stage: Stage, cloud: &PointCloud) -> Result<String, StoreError>;
}

/// Writes clouds as binary PLY to `<root>/<run_id>/<stage>.ply`.
#[derive(Debug, Clone)]
pub struct FsPointCloudStore {
    root: PathBuf,
}

impl FsPointCloudStore {
    /// A store rooted at `root`. Nothing is created until the first put.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `stage` of `run` is written.
    #[must_use]
    pub fn path_for(&self, run: RunId, stage: Stage) -> PathBuf {
        self.root
            .join(run.to_string())
            .join(format!("{}.ply", stage.as_str()))
    }
}

impl PointCloudStore for FsPointCloudStore {
    fn put(&self, run: RunId, stage: Stage, cloud: &PointCloud) -> Result<String, StoreError> {
        let path = self.path_for(run, stage);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| StoreError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        cloud.save(&path).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;
        debug!(%run, %stage, points = cloud.len(), path = %path.display(), "Stored cloud");
        Ok(format!("{run}/{stage}"))
    }
}

/// Keeps clouds in memory, keyed by run and stage.
#[derive(Debug, Default)]
pub struct MemoryPointCloudStore {
    clouds: Mutex<HashMap<(RunId, Stage), PointCloud>>,
}

impl MemoryPointCloudStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the cloud stored for `stage` of `run`.
    #[must_use]
    pub fn get(&self, run: RunId, stage: Stage) -> Option<PointCloud> {
        self.clouds.lock().ok()?.get(&(run, stage)).cloned()
    }

    /// Stages stored for `run`, in pipeline order.
    #[must_use]
    pub fn stages(&self, run: RunId) -> Vec<Stage> {
        let Ok(clouds) = self.clouds.lock() else {
            return Vec::new();
        };
        Stage::ALL
            .into_iter()
            .filter(|&s| clouds.contains_key(&(run, s)))
            .collect()
    }

    /// Number of stored clouds across all runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clouds.lock().map_or(0, |c| c.len())
    }

    /// Whether nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PointCloudStore for MemoryPointCloudStore {
    fn put(&self, run: RunId, stage: Stage, cloud: &PointCloud) -> Result<String, StoreError> {
        self.clouds
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .insert((run, stage), cloud.clone());
        Ok(format!("{run}/{stage}"))
    }
}
