//! Vertices and the attributes a reconstructed surface carries per vertex.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 8-bit sRGB color, as stored in PLY scans and baked into textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VertexColor {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
}

impl VertexColor {
    /// A color from its three channels.
    #[inline]
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create a color from floating point values in `[0, 1]`.
    ///
    /// Values are clamped and rounded to the nearest 8-bit level, so
    /// `from_float(c.to_float())` returns `c` unchanged.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::VertexColor;
    ///
    /// let color = VertexColor::from_float(1.0, 0.5, -0.2);
    /// assert_eq!(color, VertexColor::new(255, 128, 0));
    /// ```
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_float(r: f32, g: f32, b: f32) -> Self {
        let quantize = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self {
            r: quantize(r),
            g: quantize(g),
            b: quantize(b),
        }
    }

    /// Channels scaled to `[0, 1]`.
    #[inline]
    #[must_use]
    pub fn to_float(self) -> [f32; 3] {
        [self.r, self.g, self.b].map(|c| f32::from(c) / 255.0)
    }

    /// Average a set of colors channel by channel.
    ///
    /// Returns `None` when the iterator is empty.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::VertexColor;
    ///
    /// let colors = [VertexColor::new(0, 0, 0), VertexColor::new(100, 200, 50)];
    /// let mean = VertexColor::mean(colors.iter().copied()).unwrap();
    /// assert_eq!(mean, VertexColor::new(50, 100, 25));
    /// ```
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn mean(colors: impl IntoIterator<Item = Self>) -> Option<Self> {
        let mut sum = [0u64; 3];
        let mut count = 0u64;
        for c in colors {
            sum[0] += u64::from(c.r);
            sum[1] += u64::from(c.g);
            sum[2] += u64::from(c.b);
            count += 1;
        }
        if count == 0 {
            return None;
        }
        let avg = |s: u64| (s as f64 / count as f64).round().clamp(0.0, 255.0) as u8;
        Some(Self::new(avg(sum[0]), avg(sum[1]), avg(sum[2])))
    }

    /// Neutral mid grey, used when no color data exists.
    pub const GREY: Self = Self::new(128, 128, 128);

    /// All channels zero.
    pub const BLACK: Self = Self::new(0, 0, 0);

    /// All channels full.
    pub const WHITE: Self = Self::new(255, 255, 255);
}

impl Default for VertexColor {
    fn default() -> Self {
        Self::GREY
    }
}

/// Optional per-vertex attributes.
///
/// - `normal`: from point-cloud normal estimation or face averaging
/// - `color`: transferred from the source point cloud
/// - `uv`: texture coordinate assigned by UV unwrapping, in `[0, 1]`
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VertexAttributes {
    /// Unit normal.
    pub normal: Option<Vector3<f64>>,
    /// Color sampled from the scan.
    pub color: Option<VertexColor>,
    /// Texture coordinate, `v` pointing up the image.
    pub uv: Option<(f32, f32)>,
}

impl VertexAttributes {
    /// Nothing set.
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            normal: None,
            color: None,
            uv: None,
        }
    }

    /// True when no attribute is set.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.normal.is_none() && self.color.is_none() && self.uv.is_none()
    }
}

/// A mesh corner: a position plus [`VertexAttributes`].
///
/// ```
/// use mesh_types::Vertex;
///
/// let mut v: Vertex = [0.02, -0.01, 0.15].into();
/// assert!(v.attributes.is_empty());
/// v.attributes.uv = Some((0.25, 0.75));
/// assert_eq!(v.uv(), Some((0.25, 0.75)));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vertex {
    /// Where the vertex sits, in scan units.
    pub position: Point3<f64>,
    /// Normal, color and UV.
    pub attributes: VertexAttributes,
}

impl Vertex {
    /// A vertex without attributes.
    #[inline]
    #[must_use]
    pub const fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            attributes: VertexAttributes::empty(),
        }
    }

    /// Shorthand for [`Self::new`] from raw coordinates.
    #[inline]
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }

    /// A vertex carrying only a color.
    #[inline]
    #[must_use]
    pub const fn with_color(position: Point3<f64>, color: VertexColor) -> Self {
        Self {
            position,
            attributes: VertexAttributes {
                normal: None,
                color: Some(color),
                uv: None,
            },
        }
    }

    /// The normal, if any.
    #[inline]
    #[must_use]
    pub const fn normal(&self) -> Option<Vector3<f64>> {
        self.attributes.normal
    }

    /// The color, if any.
    #[inline]
    #[must_use]
    pub const fn color(&self) -> Option<VertexColor> {
        self.attributes.color
    }

    /// The texture coordinate, if any.
    #[inline]
    #[must_use]
    pub const fn uv(&self) -> Option<(f32, f32)> {
        self.attributes.uv
    }
}

impl From<Point3<f64>> for Vertex {
    fn from(position: Point3<f64>) -> Self {
        Self::new(position)
    }
}

impl From<[f64; 3]> for Vertex {
    fn from(coords: [f64; 3]) -> Self {
        Self::new(Point3::from(coords))
    }
}
