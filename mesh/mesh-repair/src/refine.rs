//! Ordered mesh refinement with per-step failure isolation.
//!
//! [`MeshRefiner::refine`] runs six steps in order. Each step takes the
//! current mesh by value and returns `Result<IndexedMesh, StepError>`; on
//! failure the refiner logs a warning, records the failure, and hands the
//! last good mesh to the next step. Refinement itself never fails.
//!
//! # Example
//!
//! ```
//! use mesh_repair::{MeshRefiner, RefineParams};
//! use mesh_types::unit_cube;
//!
//! let report = MeshRefiner::new(RefineParams::gentle()).refine(unit_cube());
//!
//! assert_eq!(report.steps.len(), 6);
//! assert!(report.failed_steps().next().is_none());
//! assert_eq!(report.mesh.face_count(), 12);
//! ```

use mesh_types::IndexedMesh;
use tracing::{info, warn};

use crate::clean::{clean_mesh, CleanParams};
use crate::components::remove_small_components;
use crate::error::StepError;
use crate::holes::fill_holes;
use crate::smooth::{smooth_laplacian, SmoothParams};
use crate::validate::validate_mesh;
use crate::watertight::ensure_watertight;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters for [`MeshRefiner`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct RefineParams {
    /// Cleaning used by the first and last steps.
    pub clean: CleanParams,
    /// Components smaller than this fraction of the largest are dropped.
    /// Default: 0.01.
    pub min_component_ratio: f64,
    /// Largest hole (in edges) the fill step closes; `None` fills all.
    /// Default: `None`.
    pub max_hole_size: Option<usize>,
    /// Smoothing step parameters.
    pub smooth: SmoothParams,
    /// Largest hole the watertight step closes. Default: 1000.
    pub watertight_max_hole_size: usize,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            clean: CleanParams::default(),
            min_component_ratio: 0.01,
            max_hole_size: None,
            smooth: SmoothParams::default(),
            watertight_max_hole_size: 1000,
        }
    }
}

impl RefineParams {
    /// Very light smoothing that keeps scan detail: 3 passes at 0.01
    /// relaxation, boundary smoothing on, feature smoothing off.
    #[must_use]
    pub fn gentle() -> Self {
        Self::default()
    }

    /// Set the minimum component ratio.
    #[must_use]
    pub const fn with_min_component_ratio(mut self, ratio: f64) -> Self {
        self.min_component_ratio = ratio;
        self
    }

    /// Set the largest hole the fill step closes.
    #[must_use]
    pub const fn with_max_hole_size(mut self, max: Option<usize>) -> Self {
        self.max_hole_size = max;
        self
    }

    /// Set the smoothing parameters.
    #[must_use]
    pub const fn with_smooth(mut self, smooth: SmoothParams) -> Self {
        self.smooth = smooth;
        self
    }

    /// Set the cleaning parameters.
    #[must_use]
    pub const fn with_clean(mut self, clean: CleanParams) -> Self {
        self.clean = clean;
        self
    }
}

/// The refinement steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefineStep {
    /// Weld and drop degenerate, duplicate and unreferenced elements.
    Clean,
    /// Drop small disconnected components.
    RemoveSmallComponents,
    /// Ear-clip and fan-fill boundary loops.
    FillHoles,
    /// Constrained Laplacian smoothing.
    Smooth,
    /// Non-manifold cleanup, closing, winding and orientation.
    EnsureWatertight,
    /// Second cleaning pass.
    FinalClean,
}

impl RefineStep {
    /// All steps in order.
    pub const ALL: [Self; 6] = [
        Self::Clean,
        Self::RemoveSmallComponents,
        Self::FillHoles,
        Self::Smooth,
        Self::EnsureWatertight,
        Self::FinalClean,
    ];

    /// Stable step name used in logs and reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::RemoveSmallComponents => "remove_small_components",
            Self::FillHoles => "fill_holes",
            Self::Smooth => "smooth",
            Self::EnsureWatertight => "ensure_watertight",
            Self::FinalClean => "final_clean",
        }
    }
}

impl std::fmt::Display for RefineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a step took effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// The step's output replaced the mesh.
    Applied,
    /// The step failed; the mesh was left as it was.
    Failed(StepError),
}

/// Record of one executed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// Which step ran.
    pub step: RefineStep,
    /// Applied or failed.
    pub status: StepStatus,
    /// Vertex count before the step.
    pub vertices_before: usize,
    /// Face count before the step.
    pub faces_before: usize,
    /// Vertex count after the step (unchanged on failure).
    pub vertices_after: usize,
    /// Face count after the step (unchanged on failure).
    pub faces_after: usize,
}

impl StepOutcome {
    /// True if the step was applied.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self.status, StepStatus::Applied)
    }
}

/// Result of [`MeshRefiner::refine`].
#[derive(Debug, Clone)]
pub struct RefineReport {
    /// The refined mesh.
    pub mesh: IndexedMesh,
    /// One entry per step, in execution order.
    pub steps: Vec<StepOutcome>,
}

impl RefineReport {
    /// Steps that failed.
    pub fn failed_steps(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| !s.is_applied())
    }
}

impl std::fmt::Display for RefineReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Refinement:")?;
        for outcome in &self.steps {
            let status = match &outcome.status {
                StepStatus::Applied => "ok".to_string(),
                StepStatus::Failed(err) => format!("failed ({err})"),
            };
            writeln!(
                f,
                "  {:<24} {} -> {} faces, {}",
                outcome.step.name(),
                outcome.faces_before,
                outcome.faces_after,
                status
            )?;
        }
        Ok(())
    }
}

/// Runs the refinement steps over a mesh.
#[derive(Debug, Clone, Default)]
pub struct MeshRefiner {
    params: RefineParams,
}

impl MeshRefiner {
    /// Create a refiner with the given parameters.
    #[must_use]
    pub const fn new(params: RefineParams) -> Self {
        Self { params }
    }

    /// The refiner's parameters.
    #[must_use]
    pub const fn params(&self) -> &RefineParams {
        &self.params
    }

    /// Run every step in order. Never fails; see [`RefineReport::steps`].
    #[must_use]
    pub fn refine(&self, mesh: IndexedMesh) -> RefineReport {
        info!(
            vertices = mesh.vertex_count(),
            faces = mesh.face_count(),
            "Starting mesh refinement"
        );

        let mut current = mesh;
        let mut steps = Vec::with_capacity(RefineStep::ALL.len());

        for step in RefineStep::ALL {
            let vertices_before = current.vertex_count();
            let faces_before = current.face_count();

            let status = match self.run_step(step, current.clone()) {
                Ok(next) => {
                    current = next;
                    StepStatus::Applied
                }
                Err(err) => {
                    warn!("Refinement step failed, keeping previous mesh: {}", err);
                    StepStatus::Failed(err)
                }
            };

            steps.push(StepOutcome {
                step,
                status,
                vertices_before,
                faces_before,
                vertices_after: current.vertex_count(),
                faces_after: current.face_count(),
            });
        }

        let report = validate_mesh(&current);
        info!(
            vertices = report.vertex_count,
            faces = report.face_count,
            watertight = report.is_watertight,
            manifold = report.is_manifold,
            "Mesh refinement completed"
        );

        RefineReport {
            mesh: current,
            steps,
        }
    }

    /// Run a single step.
    ///
    /// # Errors
    ///
    /// Returns [`StepError`] if the input is empty or has invalid indices,
    /// if an underlying operation fails, or if the step would remove every
    /// face.
    pub fn run_step(&self, step: RefineStep, mesh: IndexedMesh) -> Result<IndexedMesh, StepError> {
        match step {
            RefineStep::Clean | RefineStep::FinalClean => self.clean(step, mesh),
            RefineStep::RemoveSmallComponents => self.remove_small_components(mesh),
            RefineStep::FillHoles => self.fill_holes(mesh),
            RefineStep::Smooth => self.smooth(mesh),
            RefineStep::EnsureWatertight => self.ensure_watertight(mesh),
        }
    }

    fn clean(&self, step: RefineStep, mut mesh: IndexedMesh) -> Result<IndexedMesh, StepError> {
        let name = step.name();
        check_input(name, &mesh)?;
        let summary = clean_mesh(&mut mesh, &self.params.clean);
        info!("{}", summary);
        check_output(name, mesh)
    }

    fn remove_small_components(&self, mut mesh: IndexedMesh) -> Result<IndexedMesh, StepError> {
        let name = RefineStep::RemoveSmallComponents.name();
        check_input(name, &mesh)?;
        let removed = remove_small_components(&mut mesh, self.params.min_component_ratio);
        info!("Removed {} faces in small components", removed);
        check_output(name, mesh)
    }

    fn fill_holes(&self, mut mesh: IndexedMesh) -> Result<IndexedMesh, StepError> {
        let name = RefineStep::FillHoles.name();
        check_input(name, &mesh)?;
        fill_holes(&mut mesh, self.params.max_hole_size).map_err(|e| StepError::Failed {
            step: name,
            reason: e.to_string(),
        })?;
        check_output(name, mesh)
    }

    fn smooth(&self, mut mesh: IndexedMesh) -> Result<IndexedMesh, StepError> {
        let name = RefineStep::Smooth.name();
        check_input(name, &mesh)?;
        smooth_laplacian(&mut mesh, &self.params.smooth);
        if mesh.vertices.iter().any(|v| !v.position.coords.iter().all(|c| c.is_finite())) {
            return Err(StepError::Failed {
                step: name,
                reason: "smoothing produced non-finite positions".to_string(),
            });
        }
        check_output(name, mesh)
    }

    fn ensure_watertight(&self, mut mesh: IndexedMesh) -> Result<IndexedMesh, StepError> {
        let name = RefineStep::EnsureWatertight.name();
        check_input(name, &mesh)?;
        let summary = ensure_watertight(
            &mut mesh,
            self.params.watertight_max_hole_size,
            &self.params.clean,
        )
        .map_err(|e| StepError::Failed {
            step: name,
            reason: e.to_string(),
        })?;
        if !summary.is_watertight {
            warn!("Mesh still has open or overloaded edges after the watertight pass");
        }
        check_output(name, mesh)
    }
}

fn check_input(step: &'static str, mesh: &IndexedMesh) -> Result<(), StepError> {
    if mesh.is_empty() {
        return Err(StepError::EmptyInput { step });
    }
    if !mesh.indices_valid() {
        return Err(StepError::Failed {
            step,
            reason: "face references a missing vertex".to_string(),
        });
    }
    Ok(())
}

fn check_output(step: &'static str, mesh: IndexedMesh) -> Result<IndexedMesh, StepError> {
    if mesh.faces.is_empty() {
        Err(StepError::WouldEmpty { step })
    } else {
        Ok(mesh)
    }
}
