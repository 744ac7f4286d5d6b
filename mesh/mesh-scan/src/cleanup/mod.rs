//! Noise and density control, run before anything that looks at
//! neighborhoods.
//!
//! ```
//! use mesh_scan::cleanup::{remove_statistical_outliers, voxel_downsample, OutlierParams};
//! use mesh_scan::pointcloud::PointCloud;
//! use nalgebra::Point3;
//!
//! let positions: Vec<_> = (0..200)
//!     .map(|i| {
//!         let t = f64::from(i) * 0.05;
//!         Point3::new(t.cos(), t.sin(), t * 0.01)
//!     })
//!     .collect();
//! let cloud = PointCloud::from_positions(&positions);
//!
//! let cleaned = remove_statistical_outliers(&cloud, &OutlierParams::loose());
//! let reduced = voxel_downsample(&cleaned, 0.002).unwrap();
//! assert!(reduced.len() <= cloud.len());
//! ```

pub mod outlier;
pub mod voxel;

pub use outlier::{filter_outliers, remove_statistical_outliers, OutlierParams, OutlierReport};
pub use voxel::{voxel_downsample, DEFAULT_VOXEL_SIZE};
