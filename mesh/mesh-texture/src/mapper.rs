//! The texture mapping stage.

use std::fmt;

use mesh_scan::pointcloud::PointCloud;
use mesh_types::{IndexedMesh, VertexColor};
use tracing::info;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{TextureError, TextureResult};
use crate::image::TextureImage;
use crate::raster::{dilate, rasterize};
use crate::transfer::{smooth_colors, transfer_colors};
use crate::unwrap::unwrap;

/// Smallest texture edge, in texels.
pub const MIN_TEXTURE_SIZE: u32 = 256;
/// Largest texture edge, in texels.
pub const MAX_TEXTURE_SIZE: u32 = 4096;

/// Parameters for [`TextureMapper`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct TextureParams {
    /// Texture edge length per `sqrt(face count)`.
    pub texels_per_face: f64,
    /// Lower bound on the texture edge.
    pub min_size: u32,
    /// Upper bound on the texture edge.
    pub max_size: u32,
    /// Margin around each chart, in texels.
    pub padding: u32,
    /// One-ring color smoothing passes.
    pub color_smoothing_iterations: usize,
    /// Blend toward the neighbor mean per pass, in [0, 1].
    pub color_smoothing_factor: f32,
    /// Seam dilation passes.
    pub dilation_passes: usize,
}

impl Default for TextureParams {
    fn default() -> Self {
        Self {
            texels_per_face: 16.0,
            min_size: MIN_TEXTURE_SIZE,
            max_size: MAX_TEXTURE_SIZE,
            padding: 2,
            color_smoothing_iterations: 1,
            color_smoothing_factor: 0.5,
            dilation_passes: 4,
        }
    }
}

impl TextureParams {
    /// Sets the texel density.
    #[must_use]
    pub const fn with_texels_per_face(mut self, texels: f64) -> Self {
        self.texels_per_face = texels;
        self
    }

    /// Sets the texture size bounds.
    #[must_use]
    pub const fn with_size_range(mut self, min: u32, max: u32) -> Self {
        self.min_size = min;
        self.max_size = max;
        self
    }

    /// Sets the chart margin.
    #[must_use]
    pub const fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    /// Sets color smoothing.
    #[must_use]
    pub const fn with_color_smoothing(mut self, iterations: usize, factor: f32) -> Self {
        self.color_smoothing_iterations = iterations;
        self.color_smoothing_factor = factor;
        self
    }

    /// Sets the dilation pass count.
    #[must_use]
    pub const fn with_dilation_passes(mut self, passes: usize) -> Self {
        self.dilation_passes = passes;
        self
    }

    /// Texture edge for a mesh with `faces` faces: the next power of two of
    /// `sqrt(faces) * texels_per_face`, clamped to the size bounds.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_texture::TextureParams;
    ///
    /// let params = TextureParams::default();
    /// assert_eq!(params.texture_size(12), 256);
    /// assert_eq!(params.texture_size(10_000), 2048);
    /// assert_eq!(params.texture_size(10_000_000), 4096);
    /// ```
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn texture_size(&self, faces: usize) -> u32 {
        let raw = ((faces as f64).sqrt() * self.texels_per_face).ceil();
        let raw = raw.clamp(1.0, f64::from(self.max_size.max(1))) as u32;
        raw.next_power_of_two()
            .clamp(self.min_size.min(self.max_size), self.max_size)
    }

    fn validate(&self) -> TextureResult<()> {
        if !(self.texels_per_face.is_finite() && self.texels_per_face > 0.0) {
            return Err(TextureError::InvalidParameter {
                reason: format!("texels_per_face must be positive, got {}", self.texels_per_face),
            });
        }
        if self.min_size == 0 || self.min_size > self.max_size {
            return Err(TextureError::InvalidParameter {
                reason: format!(
                    "size range must satisfy 0 < min <= max, got [{}, {}]",
                    self.min_size, self.max_size
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.color_smoothing_factor) {
            return Err(TextureError::InvalidParameter {
                reason: format!(
                    "color_smoothing_factor must be within [0, 1], got {}",
                    self.color_smoothing_factor
                ),
            });
        }
        Ok(())
    }
}

/// A mesh with per-vertex UVs and colors, and its baked texture.
#[derive(Debug, Clone)]
pub struct TexturedMesh {
    /// Mesh split at chart seams. Every vertex has a UV and a color.
    pub mesh: IndexedMesh,
    /// The baked texture.
    pub texture: TextureImage,
    /// Number of UV charts.
    pub charts: usize,
}

impl fmt::Display for TexturedMesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vertices, {} faces, {} charts, {}x{} texture",
            self.mesh.vertex_count(),
            self.mesh.face_count(),
            self.charts,
            self.texture.width(),
            self.texture.height()
        )
    }
}

/// Bakes point-cloud colors into a texture for a mesh.
#[derive(Debug, Clone, Default)]
pub struct TextureMapper {
    params: TextureParams,
}

impl TextureMapper {
    /// Creates a mapper.
    #[must_use]
    pub const fn new(params: TextureParams) -> Self {
        Self { params }
    }

    /// The mapper's parameters.
    #[must_use]
    pub const fn params(&self) -> &TextureParams {
        &self.params
    }

    /// Transfers colors from `cloud` to `mesh`, unwraps it and bakes the
    /// texture.
    ///
    /// # Errors
    ///
    /// - [`TextureError::EmptyMesh`] if the mesh has no faces
    /// - [`TextureError::EmptyPointCloud`] if the cloud is empty
    /// - [`TextureError::InvalidMesh`] for an out-of-range face index
    /// - [`TextureError::InvalidParameter`] for bad parameters
    /// - [`TextureError::PackingFailed`] if the charts do not fit
    pub fn map(&self, mesh: &IndexedMesh, cloud: &PointCloud) -> TextureResult<TexturedMesh> {
        self.params.validate()?;
        if mesh.faces.is_empty() {
            return Err(TextureError::EmptyMesh);
        }
        if cloud.is_empty() {
            return Err(TextureError::EmptyPointCloud);
        }

        let mut colors = transfer_colors(mesh, cloud);
        smooth_colors(
            mesh,
            &mut colors,
            self.params.color_smoothing_iterations,
            self.params.color_smoothing_factor,
        );

        let size = self.params.texture_size(mesh.face_count());
        let unwrapped = unwrap(mesh, size, self.params.max_size, self.params.padding)?;

        let mut out = unwrapped.mesh;
        let split_colors: Vec<[f32; 3]> = unwrapped
            .source_vertex
            .iter()
            .map(|&src| colors[src])
            .collect();
        for (vertex, rgb) in out.vertices.iter_mut().zip(&split_colors) {
            vertex.attributes.color = Some(VertexColor::from_float(rgb[0], rgb[1], rgb[2]));
        }

        let mut texture = TextureImage::new(unwrapped.size, unwrapped.size);
        let mut covered = rasterize(&out, &split_colors, &mut texture);
        dilate(&mut texture, &mut covered, self.params.dilation_passes);

        let result = TexturedMesh {
            mesh: out,
            texture,
            charts: unwrapped.charts,
        };
        info!(%result, "Texture mapped");
        Ok(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mesh_scan::pointcloud::CloudPoint;
    use mesh_types::unit_cube;
    use nalgebra::Point3;

    fn red_cloud() -> PointCloud {
        let mut cloud = PointCloud::new();
        for corner in unit_cube().vertices {
            cloud.push(CloudPoint::with_color(corner.position, VertexColor::new(200, 20, 20)));
        }
        cloud
    }

    #[test]
    fn test_params_builders() {
        let params = TextureParams::default()
            .with_texels_per_face(8.0)
            .with_size_range(64, 512)
            .with_padding(1)
            .with_color_smoothing(0, 0.0)
            .with_dilation_passes(2);
        assert_eq!(params.min_size, 64);
        assert_eq!(params.max_size, 512);
        assert_eq!(params.texture_size(1), 64);
        assert_eq!(params.dilation_passes, 2);
    }

    #[test]
    fn test_cube_is_textured() {
        let result = TextureMapper::default().map(&unit_cube(), &red_cloud()).unwrap();

        assert_eq!(result.charts, 6);
        assert_eq!(result.texture.width(), 256);
        assert!(result.mesh.has_uvs());
        assert!(result.mesh.has_colors());
        assert_eq!(result.mesh.vertices[0].color(), Some(VertexColor::new(200, 20, 20)));

        let painted = result
            .texture
            .data
            .chunks(3)
            .filter(|px| px[0] > 0.5)
            .count();
        assert!(painted > 256 * 256 / 4, "only {painted} texels painted");
    }

    #[test]
    fn test_uv_texel_carries_vertex_color() {
        let result = TextureMapper::default().map(&unit_cube(), &red_cloud()).unwrap();
        let size = result.texture.width();
        for vertex in &result.mesh.vertices {
            let (u, v) = vertex.uv().unwrap();
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let (x, y) = (
                (u * size as f32).floor().min(size as f32 - 1.0) as u32,
                ((1.0 - v) * size as f32).floor().min(size as f32 - 1.0) as u32,
            );
            let px = result.texture.pixel(x, y).unwrap();
            assert!((px[0] - 200.0 / 255.0).abs() < 0.01);
        }
    }

    #[test]
    fn test_errors() {
        let mapper = TextureMapper::default();
        assert!(matches!(
            mapper.map(&IndexedMesh::new(), &red_cloud()),
            Err(TextureError::EmptyMesh)
        ));
        assert!(matches!(
            mapper.map(&unit_cube(), &PointCloud::new()),
            Err(TextureError::EmptyPointCloud)
        ));
        let bad = TextureMapper::new(TextureParams::default().with_size_range(512, 256));
        assert!(matches!(
            bad.map(&unit_cube(), &red_cloud()),
            Err(TextureError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_colorless_cloud_is_grey() {
        let cloud = PointCloud::from_positions(&[Point3::new(0.5, 0.5, 0.5)]);
        let result = TextureMapper::default().map(&unit_cube(), &cloud).unwrap();
        assert!(result
            .mesh
            .vertices
            .iter()
            .all(|v| v.color() == Some(VertexColor::new(128, 128, 128))));
    }
}
