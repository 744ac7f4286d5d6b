//! Error types for mesh I/O operations.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for mesh reading.
pub type IoResult<T> = Result<T, IoError>;

/// Result type for textured export.
pub type ExportResult<T> = Result<T, ExportError>;

/// Errors that can occur while reading a mesh file.
#[derive(Debug, Error)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was not found.
        path: PathBuf,
    },

    /// The parser rejected the file, or a face references a missing
    /// element.
    #[error("invalid file content: {message}")]
    InvalidContent {
        /// Description of what was invalid.
        message: String,
    },

    /// I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IoError {
    /// Create an `InvalidContent` error.
    #[must_use]
    pub fn invalid_content(message: impl Into<String>) -> Self {
        Self::InvalidContent {
            message: message.into(),
        }
    }
}

/// One of the files written by a textured export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    /// The Wavefront OBJ geometry.
    Obj,
    /// The material library.
    Mtl,
    /// The PNG texture.
    Texture,
}

impl Artifact {
    /// File extension of the artifact.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Obj => "obj",
            Self::Mtl => "mtl",
            Self::Texture => "png",
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Obj => f.write_str("OBJ"),
            Self::Mtl => f.write_str("MTL"),
            Self::Texture => f.write_str("texture"),
        }
    }
}

/// Errors that can occur during textured export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// A mesh vertex has no texture coordinate.
    #[error("vertex {vertex} has no texture coordinate")]
    MissingUv {
        /// Index of the first vertex without a UV.
        vertex: usize,
    },

    /// Writing or publishing one of the files failed. Nothing from this
    /// export is left at the final paths.
    #[error("failed to write {artifact} file {path}: {source}")]
    Write {
        /// The artifact that failed.
        artifact: Artifact,
        /// Its final path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    /// The artifact that failed to write, if any.
    #[must_use]
    pub const fn artifact(&self) -> Option<Artifact> {
        match self {
            Self::Write { artifact, .. } => Some(*artifact),
            Self::MissingUv { .. } => None,
        }
    }
}
