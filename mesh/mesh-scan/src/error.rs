//! Failures of the cloud-side stages.

use std::path::PathBuf;

use thiserror::Error;

/// `Result` with [`ScanError`].
pub type ScanResult<T> = Result<T, ScanError>;

/// Why reading, segmenting, completing or triangulating a cloud failed.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The input had no points.
    #[error("point cloud is empty")]
    EmptyPointCloud,

    /// Fewer points than the operation needs.
    #[error("need at least {required} points, have {actual}")]
    InsufficientPoints {
        /// Lower bound.
        required: usize,
        /// What was given.
        actual: usize,
    },

    /// A parameter is out of range.
    #[error("invalid parameter: {reason}")]
    InvalidParameter {
        /// Which parameter and why.
        reason: String,
    },

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Input path does not exist.
    #[error("no such file: {}", path.display())]
    FileNotFound {
        /// Path as given.
        path: PathBuf,
    },

    /// Extension not among `.ply`, `.xyz` and `.csv`.
    #[error("unsupported point cloud format {format:?}")]
    UnsupportedFormat {
        /// Lowercased extension, or empty.
        format: String,
    },

    /// Bad row in a text cloud.
    #[error("{format} line {line}: {reason}")]
    Parse {
        /// `"XYZ"` or `"CSV"`.
        format: &'static str,
        /// 1-based.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// Malformed PLY header or vertex element.
    #[error("PLY: {reason}")]
    PlyParse {
        /// Parser message.
        reason: String,
    },

    /// RANSAC found no plane.
    #[error("plane segmentation failed: {reason}")]
    PlaneSegmentationFailed {
        /// Detail.
        reason: String,
    },

    /// Points are collinear or coplanar where volume is required.
    #[error("degenerate geometry: {reason}")]
    DegenerateGeometry {
        /// Detail.
        reason: String,
    },

    /// Triangulation or alpha filtering left no surface.
    #[error("reconstruction failed: {reason}")]
    ReconstructionFailed {
        /// Detail.
        reason: String,
    },
}

impl ScanError {
    pub(crate) fn parse(format: &'static str, line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            format,
            line,
            reason: reason.into(),
        }
    }
}
