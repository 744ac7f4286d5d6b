//! Floating-point RGB texture buffer.

/// An RGB image with `f32` channels in [0, 1], stored row-major from the
/// top row down.
///
/// # Example
///
/// ```
/// use mesh_texture::TextureImage;
///
/// let mut image = TextureImage::new(4, 2);
/// image.set_pixel(3, 1, [1.0, 0.5, 0.0]);
/// assert_eq!(image.pixel(3, 1), Some([1.0, 0.5, 0.0]));
/// assert_eq!(image.pixel(4, 0), None);
/// assert_eq!(image.to_rgb8()[(1 * 4 + 3) * 3..][..3], [255, 128, 0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    width: u32,
    height: u32,
    /// Interleaved RGB, `width * height * 3` values.
    pub data: Vec<f32>,
}

impl TextureImage {
    /// Creates a black image.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width as usize * height as usize * 3],
        }
    }

    /// Image width in texels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Image height in texels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height)
            .then(|| (y as usize * self.width as usize + x as usize) * 3)
    }

    /// Color at `(x, y)`, or `None` outside the image.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 3]> {
        let i = self.offset(x, y)?;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    /// Sets the color at `(x, y)`. Out-of-range coordinates are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: [f32; 3]) {
        if let Some(i) = self.offset(x, y) {
            self.data[i..i + 3].copy_from_slice(&rgb);
        }
    }

    /// Converts to 8-bit RGB as `round(clamp(v, 0, 1) * 255)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.data
            .iter()
            .map(|&v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect()
    }
}
