//! Support-plane segmentation.
//!
//! - [`Plane`] - point/normal plane with distance queries
//! - [`segment_dominant_plane`] - RANSAC search for the plane with most inliers
//! - [`remove_dominant_plane`] - the same, returning the non-plane points
//! - [`AdaptiveThreshold`] / [`PlaneThreshold`] - inlier distance selection

mod plane;
mod ransac;
mod threshold;

pub use plane::Plane;
pub use ransac::{
    remove_dominant_plane, segment_dominant_plane, PlaneRemoval, PlaneSegmentation, RansacParams,
};
pub use threshold::{AdaptiveThreshold, PlaneThreshold};
