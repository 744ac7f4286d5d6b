//! Scan-to-textured-mesh reconstruction.
//!
//! Ties the `mesh-*` crates into one run: a raw point cloud of an object on
//! a surface goes in, a watertight textured OBJ + MTL + PNG comes out.
//!
//! - [`reconstruct`] / [`Reconstructor`] - The pipeline
//! - [`ReconConfig`] - Parameters for every stage, loadable from JSON
//! - [`TexturedModel`] - Record of the exported files
//! - [`PointCloudStore`] - Where intermediate clouds go
//! - [`ReconError`] - Why a run failed
//!
//! # Example
//!
//! ```no_run
//! use cf_recon::{MemoryPointCloudStore, ReconConfig, Reconstructor, Stage};
//!
//! let store = MemoryPointCloudStore::new();
//! let result = Reconstructor::new(ReconConfig::default().with_seed(Some(1)))
//!     .with_store(&store)
//!     .run_file("scan.ply", "mug", "out")
//!     .unwrap();
//!
//! println!("{result}");
//! assert!(store.get(result.model.id, Stage::Completed).is_some());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod store;

pub use config::{ReconConfig, DEFAULT_EXPORT_BASENAME};
pub use error::{ConfigError, ReconError, ReconResult};
pub use model::TexturedModel;
pub use pipeline::{reconstruct, Reconstruction, Reconstructor};
pub use store::{FsPointCloudStore, MemoryPointCloudStore, PointCloudStore, RunId, Stage, StoreError};
