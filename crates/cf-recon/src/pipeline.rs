//! The scan-to-textured-model pipeline.
//!
//! ```text
//! load → colorize (if needed) → remove background → complete bottom
//!      → triangulate → refine → texture → export
//! ```
//!
//! Every stage consumes the previous stage's value. Clouds from the
//! background and completion stages go to the attached
//! [`PointCloudStore`], if any.

use std::fmt;
use std::path::Path;

use image::RgbImage;
use mesh_io::export_textured;
use mesh_repair::{MeshRefiner, RefineReport};
use mesh_scan::background::{BackgroundRemoval, BackgroundRemover};
use mesh_scan::complete::{SurfaceCompleter, SurfaceCompletion};
use mesh_scan::pointcloud::colors::generate_colors;
use mesh_scan::reconstruct::{MeshBuildResult, MeshBuilder};
use mesh_scan::PointCloud;
use mesh_texture::{TextureMapper, TexturedMesh};
use tracing::{info, info_span, warn};

use crate::config::ReconConfig;
use crate::error::{ReconError, ReconResult};
use crate::model::TexturedModel;
use crate::store::{PointCloudStore, RunId, Stage};

/// Everything a run produced, for callers that want more than the files.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// The exported model.
    pub model: TexturedModel,
    /// Background removal record, including intermediate clouds.
    pub background: BackgroundRemoval,
    /// The object with its synthetic bottom.
    pub completion: SurfaceCompletion,
    /// Triangulation result before refinement.
    pub build: MeshBuildResult,
    /// Per-step refinement outcomes.
    pub refine: RefineReport,
    /// The textured mesh that was exported.
    pub textured: TexturedMesh,
}

impl fmt::Display for Reconstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Reconstruction '{}' ({})", self.model.name, self.model.id)?;
        writeln!(f, "  object points:   {}", self.background.cloud.len())?;
        writeln!(f, "  bottom points:   {}", self.completion.bottom.len())?;
        writeln!(f, "  mesh:            {}", self.build)?;
        write!(f, "{}", self.refine)?;
        writeln!(f, "  textured:        {}", self.textured)?;
        write!(f, "  obj:             {}", self.model.obj_path.display())
    }
}

/// Runs reconstructions with one configuration.
pub struct Reconstructor<'s> {
    config: ReconConfig,
    store: Option<&'s dyn PointCloudStore>,
}

impl fmt::Debug for Reconstructor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconstructor")
            .field("config", &self.config)
            .field("store", &self.store.is_some())
            .finish()
    }
}

impl<'s> Reconstructor<'s> {
    /// A reconstructor without a diagnostics store.
    #[must_use]
    pub fn new(config: ReconConfig) -> Self {
        Self {
            config: config.resolved(),
            store: None,
        }
    }

    /// Sends intermediate clouds to `store`.
    #[must_use]
    pub fn with_store(mut self, store: &'s dyn PointCloudStore) -> Self {
        self.store = Some(store);
        self
    }

    /// The resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &ReconConfig {
        &self.config
    }

    fn put(&self, run: RunId, stage: Stage, cloud: &PointCloud) -> ReconResult<Option<String>> {
        let Some(store) = self.store else {
            return Ok(None);
        };
        store
            .put(run, stage, cloud)
            .map(Some)
            .map_err(|source| ReconError::Store { stage, source })
    }

    /// Loads `input` and reconstructs it. See [`Self::run`].
    ///
    /// # Errors
    ///
    /// [`ReconError::InputEmptyOrInvalid`] if the file cannot be loaded,
    /// plus everything [`Self::run`] returns.
    pub fn run_file(
        &self,
        input: impl AsRef<Path>,
        name: &str,
        output_dir: impl AsRef<Path>,
    ) -> ReconResult<Reconstruction> {
        let cloud = PointCloud::load(input.as_ref()).map_err(|e| ReconError::from_input(&e))?;
        self.run(&cloud, name, output_dir)
    }

    /// Reconstructs `scan` and exports it to `output_dir` as
    /// `<export_basename>.{obj,mtl,png}`.
    ///
    /// # Errors
    ///
    /// - [`ReconError::InputEmptyOrInvalid`] for an empty or too-small scan
    /// - [`ReconError::PlaneSegmentationFailed`] if plane fitting cannot run
    /// - [`ReconError::MeshGenerationFailed`] if triangulation or texturing
    ///   fails
    /// - [`ReconError::ExportIoFailed`] naming the file that failed
    /// - [`ReconError::Store`] if a diagnostic cloud cannot be stored
    pub fn run(
        &self,
        scan: &PointCloud,
        name: &str,
        output_dir: impl AsRef<Path>,
    ) -> ReconResult<Reconstruction> {
        let output_dir = output_dir.as_ref();
        let run = RunId::new();
        let _span = info_span!("reconstruct", %run, name).entered();
        let config = &self.config;

        if scan.is_empty() {
            return Err(ReconError::InputEmptyOrInvalid {
                reason: "point cloud is empty".to_string(),
            });
        }
        let colored;
        let scan = if scan.has_colors() {
            scan
        } else {
            info!(scheme = ?config.fallback_coloring, "Input has no colors, generating them");
            colored = generate_colors(scan, config.fallback_coloring, config.seed);
            &colored
        };

        let background = BackgroundRemover::new(config.background.clone())
            .run(scan)
            .map_err(|e| ReconError::from_input(&e))?;
        self.put(run, Stage::Original, &background.original)?;
        self.put(run, Stage::Filtered, &background.filtered)?;
        self.put(run, Stage::BackgroundRemoved, &background.cloud)?;

        let completion = SurfaceCompleter::new(config.completion)
            .complete(&background.cloud)
            .map_err(|e| ReconError::from_input(&e))?;
        self.put(run, Stage::Bottom, &completion.bottom)?;
        let point_cloud_id = self.put(run, Stage::Completed, &completion.completed)?;

        let build = MeshBuilder::new(config.mesh)
            .build(&completion.completed)
            .map_err(|e| ReconError::from_meshing(&e))?;

        let refine = MeshRefiner::new(config.refine).refine(build.mesh.clone());
        for failed in refine.failed_steps() {
            warn!(step = failed.step.name(), "Refinement step skipped");
        }

        let textured = TextureMapper::new(config.texture.clone())
            .map(&refine.mesh, &completion.completed)
            .map_err(|e| ReconError::MeshGenerationFailed {
                reason: e.to_string(),
            })?;
        let texture = RgbImage::from_raw(
            textured.texture.width(),
            textured.texture.height(),
            textured.texture.to_rgb8(),
        )
        .ok_or_else(|| ReconError::MeshGenerationFailed {
            reason: "texture buffer does not match its dimensions".to_string(),
        })?;

        let paths = export_textured(&textured.mesh, &texture, output_dir, &config.export_basename)
            .map_err(ReconError::from_export)?;
        let model = TexturedModel::new(run, name, output_dir, point_cloud_id, paths);

        info!(
            faces = textured.mesh.face_count(),
            obj = %model.obj_path.display(),
            "Reconstruction complete"
        );
        Ok(Reconstruction {
            model,
            background,
            completion,
            build,
            refine,
            textured,
        })
    }
}

/// Reconstructs the cloud at `input` into a textured model in
/// `output_dir`, storing intermediate clouds in `store` when given.
///
/// # Errors
///
/// See [`Reconstructor::run_file`].
///
/// # Example
///
/// ```no_run
/// use cf_recon::{reconstruct, FsPointCloudStore, ReconConfig};
///
/// let store = FsPointCloudStore::new("diagnostics");
/// let model = reconstruct("scan.ply", "mug", "out", &ReconConfig::default(), Some(&store)).unwrap();
/// println!("{}", model.obj_path.display());
/// ```
pub fn reconstruct(
    input: impl AsRef<Path>,
    name: &str,
    output_dir: impl AsRef<Path>,
    config: &ReconConfig,
    store: Option<&dyn PointCloudStore>,
) -> ReconResult<TexturedModel> {
    let mut reconstructor = Reconstructor::new(config.clone());
    if let Some(store) = store {
        reconstructor = reconstructor.with_store(store);
    }
    reconstructor
        .run_file(input, name, output_dir)
        .map(|r| r.model)
}
