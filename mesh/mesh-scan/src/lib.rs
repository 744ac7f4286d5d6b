//! Point-cloud processing and surface reconstruction for 3D scans.
//!
//! This crate takes a raw scan of an object resting on a surface to a
//! triangle mesh of the object alone:
//!
//! - **Point Cloud** - Point storage with PLY/XYZ/CSV I/O, normals and colors
//! - **Cleanup** - Statistical outlier removal and voxel downsampling
//! - **Segment** - RANSAC plane fitting with an adaptive distance threshold
//! - **Cluster** - DBSCAN and largest-cluster selection
//! - **Background** - The full background-removal sequence
//! - **Hull / Complete** - Convex hull and synthetic bottom caps
//! - **Reconstruction** - Delaunay alpha shapes
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with zero Bevy dependencies; rendering and
//! interactive viewing live elsewhere.
//!
//! # Quick Start
//!
//! ```no_run
//! use mesh_scan::background::{BackgroundParams, BackgroundRemover};
//! use mesh_scan::complete::{CompletionParams, SurfaceCompleter};
//! use mesh_scan::pointcloud::PointCloud;
//! use mesh_scan::reconstruct::MeshBuilder;
//!
//! // 1. Load the raw scan
//! let scan = PointCloud::load("scan.ply").unwrap();
//!
//! // 2. Strip the table and clutter
//! let removal = BackgroundRemover::new(BackgroundParams::default()).run(&scan).unwrap();
//!
//! // 3. Close the unseen bottom
//! let completion = SurfaceCompleter::new(CompletionParams::default())
//!     .complete(&removal.cloud)
//!     .unwrap();
//!
//! // 4. Triangulate
//! let result = MeshBuilder::default().build(&completion.completed).unwrap();
//! println!("{result}");
//! ```
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`pointcloud`] | Point cloud data structure, I/O, normals, colors |
//! | [`cleanup`] | Outlier removal and downsampling |
//! | [`segment`] | Plane fitting and removal |
//! | [`cluster`] | Density clustering |
//! | [`background`] | Background removal sequence |
//! | [`hull`] | Convex hull and surface sampling |
//! | [`complete`] | Bottom-cap synthesis |
//! | [`reconstruct`] | Alpha-shape surface reconstruction |

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_const_for_fn,
    // point counts and kd-tree item ids are far below 2^52
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::needless_range_loop,
    clippy::items_after_statements
)]

pub mod background;
pub mod cleanup;
pub mod cluster;
pub mod complete;
pub mod error;
pub mod hull;
pub mod pointcloud;
pub mod reconstruct;
pub mod segment;

pub use background::{center_point_cloud, BackgroundParams, BackgroundRemoval, BackgroundRemover};
pub use cleanup::{remove_statistical_outliers, voxel_downsample, OutlierParams};
pub use cluster::{cluster_and_select_largest, dbscan, ClusterParams, ClusterSelection, NOISE};
pub use complete::{CompletionParams, SurfaceCompleter, SurfaceCompletion};
pub use error::{ScanError, ScanResult};
pub use pointcloud::colors::ColorScheme;
pub use pointcloud::normals::estimate_normals;
pub use pointcloud::{CloudPoint, PointCloud};
pub use reconstruct::{
    compute_optimal_alpha, generate_mesh, MeshBuildParams, MeshBuildResult, MeshBuilder,
    MeshQuality,
};
pub use segment::{
    segment_dominant_plane, AdaptiveThreshold, Plane, PlaneThreshold, RansacParams,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_exports_have_defaults() {
        let _: BackgroundParams = BackgroundParams::default();
        let _: CompletionParams = CompletionParams::default();
        let _: MeshBuildParams = MeshBuildParams::default();
        let _: ClusterParams = ClusterParams::default();
        let _: PlaneThreshold = PlaneThreshold::default();
        assert_eq!(NOISE, -1);
    }
}
