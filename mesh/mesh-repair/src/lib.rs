//! Mesh repair and refinement for reconstructed scan surfaces.
//!
//! Alpha-shape output is usually close to a closed surface but rarely
//! exactly one: slivers, duplicated faces, small holes where sampling was
//! thin, and inconsistent winding all occur. The pieces here fix those:
//!
//! - [`validate_mesh`] reports watertightness, manifoldness and winding
//! - [`clean_mesh`] welds vertices and drops degenerate, duplicate and
//!   unreferenced elements
//! - [`remove_small_components`] discards floating debris
//! - [`fill_holes`] closes boundary loops (ear clipping, centroid fan as
//!   a fallback)
//! - [`smooth_laplacian`] relaxes noise while keeping sharp edges
//! - [`fix_winding_order`], [`orient_outward`] and [`ensure_watertight`]
//!   settle orientation and closure
//!
//! [`MeshRefiner`] runs them in order. A step that fails leaves the mesh as
//! the previous step produced it.
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with zero Bevy dependencies.
//!
//! # Example
//!
//! ```
//! use mesh_repair::{validate_mesh, MeshRefiner, RefineParams};
//! use mesh_types::unit_cube;
//!
//! let mut mesh = unit_cube();
//! mesh.faces.pop();
//! assert!(!validate_mesh(&mesh).is_watertight);
//!
//! let report = MeshRefiner::new(RefineParams::gentle()).refine(mesh);
//! assert!(validate_mesh(&report.mesh).is_watertight);
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod adjacency;
mod clean;
pub mod components;
mod error;
pub mod holes;
mod refine;
mod smooth;
mod validate;
mod watertight;

pub use adjacency::MeshAdjacency;
pub use clean::{
    clean_mesh, remove_degenerate_faces, remove_duplicate_faces, remove_unreferenced_vertices,
    weld_vertices, CleanParams, CleanSummary,
};
pub use error::{RepairError, RepairResult, StepError};
pub use refine::{MeshRefiner, RefineParams, RefineReport, RefineStep, StepOutcome, StepStatus};
pub use smooth::{smooth_laplacian, SmoothParams};
pub use validate::{validate_mesh, MeshReport, DEGENERATE_AREA};
pub use watertight::{
    count_inconsistent_faces, ensure_watertight, fix_winding_order, orient_outward,
    remove_non_manifold_faces, WatertightSummary,
};

// Re-export commonly used items from submodules
pub use components::{find_connected_components, remove_small_components, ComponentAnalysis};
pub use holes::{detect_holes, fill_holes, BoundaryLoop, HoleFillSummary};
