//! Configuration for a reconstruction run.

use mesh_repair::RefineParams;
use mesh_scan::{BackgroundParams, ColorScheme, CompletionParams, MeshBuildParams};
use mesh_texture::TextureParams;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Base name of exported files when none is configured.
pub const DEFAULT_EXPORT_BASENAME: &str = "model";

/// Parameters for every stage of a run.
///
/// # Example
///
/// ```
/// use cf_recon::ReconConfig;
///
/// let config = ReconConfig::default().with_seed(Some(7)).with_alpha(Some(0.05));
/// assert_eq!(config.resolved().completion.seed, Some(7));
/// assert_eq!(config.mesh.alpha, Some(0.05));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ReconConfig {
    /// Background removal.
    pub background: BackgroundParams,
    /// Bottom completion.
    pub completion: CompletionParams,
    /// Triangulation.
    pub mesh: MeshBuildParams,
    /// Mesh refinement.
    pub refine: RefineParams,
    /// Texture baking.
    pub texture: TextureParams,
    /// Stem of the exported OBJ, MTL and PNG files.
    pub export_basename: String,
    /// Seed for every random stage; overrides per-stage seeds when set.
    pub seed: Option<u64>,
    /// Coloring applied to input clouds that carry no colors.
    pub fallback_coloring: ColorScheme,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            background: BackgroundParams::default(),
            completion: CompletionParams::default(),
            mesh: MeshBuildParams::default(),
            refine: RefineParams::gentle(),
            texture: TextureParams::default(),
            export_basename: DEFAULT_EXPORT_BASENAME.to_string(),
            seed: None,
            fallback_coloring: ColorScheme::default(),
        }
    }
}

impl ReconConfig {
    /// Sets the run-wide seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Fixes the alpha; `None` chooses one per cloud.
    #[must_use]
    pub const fn with_alpha(mut self, alpha: Option<f64>) -> Self {
        self.mesh.alpha = alpha;
        self
    }

    /// Sets the export base name.
    #[must_use]
    pub fn with_export_basename(mut self, basename: impl Into<String>) -> Self {
        self.export_basename = basename.into();
        self
    }

    /// Sets the fallback coloring.
    #[must_use]
    pub const fn with_fallback_coloring(mut self, scheme: ColorScheme) -> Self {
        self.fallback_coloring = scheme;
        self
    }

    /// The configuration with [`Self::seed`] pushed into every stage.
    #[must_use]
    pub fn resolved(&self) -> Self {
        let mut out = self.clone();
        if let Some(seed) = self.seed {
            out.background = out.background.with_seed(Some(seed));
            out.completion = out.completion.with_seed(Some(seed));
            out.mesh = out.mesh.with_seed(Some(seed));
        }
        out
    }
}

#[cfg(feature = "serde")]
mod json {
    use std::path::Path;

    use super::ReconConfig;
    use crate::error::ConfigError;

    impl ReconConfig {
        /// Loads a configuration from a JSON file. Missing fields take
        /// their defaults.
        ///
        /// # Errors
        ///
        /// Returns an error if the file cannot be read or parsed.
        pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
            let path = path.as_ref();
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
        }

        /// Pretty-printed JSON.
        ///
        /// # Errors
        ///
        /// Returns an error if serialization fails.
        pub fn to_json(&self) -> serde_json::Result<String> {
            serde_json::to_string_pretty(self)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReconConfig::default();
        assert_eq!(config.export_basename, "model");
        assert_eq!(config.seed, None);
        assert_eq!(config.fallback_coloring, ColorScheme::Height);
        assert_eq!(config.mesh.alpha, None);
    }

    #[test]
    fn test_seed_reaches_every_stage() {
        let config = ReconConfig::default().with_seed(Some(11)).resolved();
        assert_eq!(config.background.ransac.seed, Some(11));
        assert_eq!(config.completion.seed, Some(11));
        assert_eq!(config.mesh.seed, Some(11));

        let unseeded = ReconConfig::default().resolved();
        assert_eq!(unseeded.completion.seed, None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_round_trip() {
        let config = ReconConfig::default()
            .with_seed(Some(3))
            .with_alpha(Some(0.04))
            .with_export_basename("cup")
            .with_fallback_coloring(ColorScheme::Distance);
        let json = config.to_json().unwrap();
        let back: ReconConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_partial_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "seed": 9, "export_basename": "vase", "mesh": { "alpha": 0.1 }, "fallback_coloring": "random" }"#,
        )
        .unwrap();

        let config = ReconConfig::from_json_file(&path).unwrap();
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.export_basename, "vase");
        assert_eq!(config.mesh.alpha, Some(0.1));
        assert_eq!(config.fallback_coloring, ColorScheme::Random);
        assert_eq!(config.texture, TextureParams::default());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_bad_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ReconConfig::from_json_file(&path),
            Err(crate::error::ConfigError::Parse { .. })
        ));
        assert!(matches!(
            ReconConfig::from_json_file(dir.path().join("missing.json")),
            Err(crate::error::ConfigError::Read { .. })
        ));
    }
}
