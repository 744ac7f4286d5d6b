//! Error types for mesh repair operations.

use thiserror::Error;

/// Result type for repair operations.
pub type RepairResult<T> = Result<T, RepairError>;

/// Errors that can occur during mesh repair.
#[derive(Debug, Error)]
pub enum RepairError {
    /// Mesh is empty (no vertices or faces).
    #[error("mesh is empty")]
    EmptyMesh,

    /// Mesh has invalid indices.
    #[error("invalid vertex index {index} (mesh has {vertex_count} vertices)")]
    InvalidIndex {
        /// The invalid index.
        index: u32,
        /// Total number of vertices in the mesh.
        vertex_count: usize,
    },
}

/// Failure of a single [`MeshRefiner`](crate::MeshRefiner) step.
///
/// A failed step never aborts refinement; the refiner logs it and carries
/// the last good mesh into the next step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    /// The step received a mesh without faces.
    #[error("{step}: input mesh is empty")]
    EmptyInput {
        /// Step name.
        step: &'static str,
    },

    /// The step would have removed every face.
    #[error("{step}: step would leave the mesh empty")]
    WouldEmpty {
        /// Step name.
        step: &'static str,
    },

    /// An underlying repair operation failed.
    #[error("{step}: {reason}")]
    Failed {
        /// Step name.
        step: &'static str,
        /// Description of the failure.
        reason: String,
    },
}

impl StepError {
    /// Name of the step that failed.
    #[must_use]
    pub const fn step(&self) -> &'static str {
        match self {
            Self::EmptyInput { step } | Self::WouldEmpty { step } | Self::Failed { step, .. } => {
                step
            }
        }
    }
}
