//! Bottom-cap synthesis for objects scanned from above.
//!
//! A scanner cannot see the face an object rests on, so the isolated
//! foreground is open at the bottom. [`SurfaceCompleter`] closes it with a
//! synthetic cap: sample the convex hull densely, find its dominant flat
//! face with RANSAC, and add those samples to the object.
//!
//! The cap follows the hull, not the true underside. For strongly
//! non-convex objects it is an approximation.

use std::fmt;

use tracing::{info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ScanError, ScanResult};
use crate::hull::{convex_hull, sample_surface};
use crate::pointcloud::PointCloud;
use crate::segment::{segment_dominant_plane, RansacParams};

/// Parameters for [`SurfaceCompleter`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct CompletionParams {
    /// Points sampled on the hull surface. Default: 15000.
    pub samples: usize,
    /// Plane inlier distance on the hull samples. Default: 0.005.
    pub depth: f64,
    /// RANSAC trials. Default: 1000.
    pub iterations: usize,
    /// Seed for hull sampling and RANSAC.
    pub seed: Option<u64>,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            samples: 15_000,
            depth: 0.005,
            iterations: 1000,
            seed: None,
        }
    }
}

impl CompletionParams {
    /// Sets the hull sample count.
    #[must_use]
    pub const fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// Sets the cap depth.
    #[must_use]
    pub const fn with_depth(mut self, depth: f64) -> Self {
        self.depth = depth;
        self
    }

    /// Sets the RANSAC trial count.
    #[must_use]
    pub const fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Sets the seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

/// Output of [`SurfaceCompleter::complete`].
#[derive(Debug, Clone)]
pub struct SurfaceCompletion {
    /// Object points followed by the cap points.
    pub completed: PointCloud,
    /// The synthesized cap alone; empty when completion was skipped.
    pub bottom: PointCloud,
}

impl SurfaceCompletion {
    /// Whether a cap was added.
    #[must_use]
    pub fn has_bottom(&self) -> bool {
        !self.bottom.is_empty()
    }
}

impl fmt::Display for SurfaceCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_bottom() {
            write!(
                f,
                "added {} bottom points ({} total)",
                self.bottom.len(),
                self.completed.len()
            )
        } else {
            write!(f, "no bottom added ({} points)", self.completed.len())
        }
    }
}

/// Synthesizes a bottom cap from the convex hull of an object.
#[derive(Debug, Clone, Default)]
pub struct SurfaceCompleter {
    params: CompletionParams,
}

impl SurfaceCompleter {
    /// Creates a completer with the given parameters.
    #[must_use]
    pub const fn new(params: CompletionParams) -> Self {
        Self { params }
    }

    /// The parameters in use.
    #[must_use]
    pub const fn params(&self) -> &CompletionParams {
        &self.params
    }

    /// Adds a bottom cap to `object`.
    ///
    /// A flat or too-small object has no usable hull; it is returned as is
    /// with an empty cap.
    ///
    /// # Errors
    ///
    /// - [`ScanError::EmptyPointCloud`] for an empty object
    /// - [`ScanError::InvalidParameter`] for a non-positive depth
    pub fn complete(&self, object: &PointCloud) -> ScanResult<SurfaceCompletion> {
        let p = &self.params;
        if object.is_empty() {
            return Err(ScanError::EmptyPointCloud);
        }

        let skipped = |reason: &ScanError| {
            warn!(points = object.len(), %reason, "Skipping surface completion");
            SurfaceCompletion {
                completed: object.clone(),
                bottom: PointCloud::new(),
            }
        };

        let hull = match convex_hull(object) {
            Ok(hull) => hull,
            Err(e @ (ScanError::DegenerateGeometry { .. } | ScanError::InsufficientPoints { .. })) => {
                return Ok(skipped(&e));
            }
            Err(e) => return Err(e),
        };

        let outer = match sample_surface(&hull, p.samples, p.seed) {
            Ok(outer) => outer,
            Err(e @ ScanError::DegenerateGeometry { .. }) => return Ok(skipped(&e)),
            Err(e) => return Err(e),
        };

        let ransac = RansacParams::default()
            .with_distance_threshold(p.depth)
            .with_iterations(p.iterations)
            .with_seed(p.seed);
        let segmentation = match segment_dominant_plane(&outer, &ransac) {
            Ok(s) => s,
            Err(e @ ScanError::PlaneSegmentationFailed { .. }) => return Ok(skipped(&e)),
            Err(e) => return Err(e),
        };

        let mut bottom = outer.select(&segmentation.inliers);
        if object.has_colors() {
            if let Some(color) = object.mean_color() {
                bottom.paint_uniform(color);
            }
        }

        let mut completed = object.clone();
        completed.extend(bottom.points.iter().cloned());

        info!(
            object = object.len(),
            hull_faces = hull.face_count(),
            samples = outer.len(),
            bottom = bottom.len(),
            plane = %segmentation.plane,
            "Completed bottom surface"
        );
        Ok(SurfaceCompletion { completed, bottom })
    }
}
