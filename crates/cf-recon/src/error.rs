//! Error taxonomy for a reconstruction run.
//!
//! Stage errors are mapped into four categories at each stage boundary so
//! that callers can tell bad input from failed geometry from failed I/O.

use std::path::PathBuf;

use mesh_io::{Artifact, ExportError};
use mesh_scan::ScanError;
use thiserror::Error;

use crate::store::{Stage, StoreError};

/// Result type for reconstruction.
pub type ReconResult<T> = Result<T, ReconError>;

/// Why a reconstruction run failed.
#[derive(Debug, Error)]
pub enum ReconError {
    /// The input cloud is missing, unreadable, empty or too small.
    #[error("input is empty or invalid: {reason}")]
    InputEmptyOrInvalid {
        /// What was wrong with the input.
        reason: String,
    },

    /// Plane fitting could not run at all (too few or collinear points).
    #[error("plane segmentation failed: {reason}")]
    PlaneSegmentationFailed {
        /// Description of the failure.
        reason: String,
    },

    /// Triangulation or texturing produced no usable mesh.
    #[error("mesh generation failed: {reason}")]
    MeshGenerationFailed {
        /// Description of the failure.
        reason: String,
    },

    /// Writing one of the exported files failed.
    #[error("failed to export {artifact}: {source}")]
    ExportIoFailed {
        /// The artifact that failed.
        artifact: Artifact,
        /// Underlying export error.
        #[source]
        source: ExportError,
    },

    /// A diagnostic cloud could not be persisted.
    #[error("failed to store {stage} cloud: {source}")]
    Store {
        /// The stage whose cloud was being stored.
        stage: Stage,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
}

impl ReconError {
    /// Maps an error from loading or cleaning the input cloud.
    pub(crate) fn from_input(err: &ScanError) -> Self {
        match err {
            ScanError::PlaneSegmentationFailed { reason } => Self::PlaneSegmentationFailed {
                reason: reason.clone(),
            },
            other => Self::InputEmptyOrInvalid {
                reason: other.to_string(),
            },
        }
    }

    /// Maps an error from triangulation.
    pub(crate) fn from_meshing(err: &ScanError) -> Self {
        Self::MeshGenerationFailed {
            reason: err.to_string(),
        }
    }

    /// Maps an export error, attributing UV problems to the OBJ.
    pub(crate) fn from_export(source: ExportError) -> Self {
        Self::ExportIoFailed {
            artifact: source.artifact().unwrap_or(Artifact::Obj),
            source,
        }
    }

    /// Short category name, stable for logs and exit messages.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::InputEmptyOrInvalid { .. } => "input_empty_or_invalid",
            Self::PlaneSegmentationFailed { .. } => "plane_segmentation_failed",
            Self::MeshGenerationFailed { .. } => "mesh_generation_failed",
            Self::ExportIoFailed { .. } => "export_io_failed",
            Self::Store { .. } => "store",
        }
    }
}

/// Errors from loading a [`ReconConfig`](crate::ReconConfig) file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Config path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid configuration.
    #[cfg(feature = "serde")]
    #[error("invalid config {path}: {source}")]
    Parse {
        /// Config path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_errors_map_by_stage() {
        let plane = ScanError::PlaneSegmentationFailed {
            reason: "collinear".to_string(),
        };
        assert!(matches!(
            ReconError::from_input(&plane),
            ReconError::PlaneSegmentationFailed { .. }
        ));
        assert!(matches!(
            ReconError::from_input(&ScanError::EmptyPointCloud),
            ReconError::InputEmptyOrInvalid { .. }
        ));

        let few = ScanError::InsufficientPoints {
            required: 4,
            actual: 2,
        };
        let err = ReconError::from_meshing(&few);
        assert_eq!(err.category(), "mesh_generation_failed");
        assert!(err.to_string().contains("need at least 4"));
    }

    #[test]
    fn test_missing_uv_blames_obj() {
        let err = ReconError::from_export(ExportError::MissingUv { vertex: 3 });
        assert!(matches!(
            err,
            ReconError::ExportIoFailed {
                artifact: Artifact::Obj,
                ..
            }
        ));
    }
}
