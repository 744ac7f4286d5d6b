//! Error types for texture mapping.

use thiserror::Error;

/// Result type for texture mapping operations.
pub type TextureResult<T> = Result<T, TextureError>;

/// Errors that can occur while texturing a mesh.
#[derive(Debug, Error)]
pub enum TextureError {
    /// Mesh has no faces to unwrap.
    #[error("mesh has no faces")]
    EmptyMesh,

    /// A face references a vertex that does not exist.
    #[error("face {face} references a missing vertex")]
    InvalidMesh {
        /// Index of the offending face.
        face: usize,
    },

    /// Source point cloud is empty.
    #[error("source point cloud is empty")]
    EmptyPointCloud,

    /// Invalid parameter value.
    #[error("invalid parameter: {reason}")]
    InvalidParameter {
        /// Description of why the parameter is invalid.
        reason: String,
    },

    /// Charts do not fit in the largest allowed texture.
    #[error("cannot pack {charts} charts into a {size}x{size} texture")]
    PackingFailed {
        /// Number of charts.
        charts: usize,
        /// Largest texture size tried.
        size: u32,
    },
}
