//! Rasterizing per-vertex colors into a texture, and seam dilation.

use mesh_types::IndexedMesh;

use crate::image::TextureImage;

/// Texel-space position of a UV. Row 0 is the top of the image.
fn to_texel(uv: (f32, f32), size: f64) -> [f64; 2] {
    [f64::from(uv.0) * size, (1.0 - f64::from(uv.1)) * size]
}

/// Paints every face of `mesh` into `image`, interpolating `colors` (one
/// per vertex) barycentrically at texel centers. Each vertex's own texel is
/// stamped too, so slivers thinner than a texel still leave a mark.
///
/// Returns the coverage mask, `true` for painted texels. Faces with a
/// vertex lacking a UV are skipped.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn rasterize(mesh: &IndexedMesh, colors: &[[f32; 3]], image: &mut TextureImage) -> Vec<bool> {
    let (w, h) = (image.width(), image.height());
    let size = f64::from(w);
    let mut covered = vec![false; w as usize * h as usize];
    let mut paint = |image: &mut TextureImage, x: u32, y: u32, rgb: [f32; 3]| {
        if x < w && y < h {
            image.set_pixel(x, y, rgb);
            covered[y as usize * w as usize + x as usize] = true;
        }
    };

    for face in &mesh.faces {
        let idx = face.map(|v| v as usize);
        let Some(uvs) = idx
            .iter()
            .map(|&i| mesh.vertices.get(i).and_then(|v| v.uv()))
            .collect::<Option<Vec<_>>>()
        else {
            continue;
        };
        let Some(cols) = idx
            .iter()
            .map(|&i| colors.get(i).copied())
            .collect::<Option<Vec<_>>>()
        else {
            continue;
        };
        let p: Vec<[f64; 2]> = uvs.iter().map(|&uv| to_texel(uv, size)).collect();

        let denom = (p[1][1] - p[2][1]) * (p[0][0] - p[2][0]) + (p[2][0] - p[1][0]) * (p[0][1] - p[2][1]);
        if denom.abs() > f64::EPSILON {
            let min_x = p.iter().map(|q| q[0]).fold(f64::INFINITY, f64::min).floor().max(0.0) as u32;
            let max_x = p.iter().map(|q| q[0]).fold(f64::NEG_INFINITY, f64::max).ceil().min(size) as u32;
            let min_y = p.iter().map(|q| q[1]).fold(f64::INFINITY, f64::min).floor().max(0.0) as u32;
            let max_y = p.iter().map(|q| q[1]).fold(f64::NEG_INFINITY, f64::max).ceil().min(f64::from(h)) as u32;

            for y in min_y..max_y {
                for x in min_x..max_x {
                    let (cx, cy) = (f64::from(x) + 0.5, f64::from(y) + 0.5);
                    let l0 = ((p[1][1] - p[2][1]) * (cx - p[2][0]) + (p[2][0] - p[1][0]) * (cy - p[2][1])) / denom;
                    let l1 = ((p[2][1] - p[0][1]) * (cx - p[2][0]) + (p[0][0] - p[2][0]) * (cy - p[2][1])) / denom;
                    let l2 = 1.0 - l0 - l1;
                    if l0 < -1e-9 || l1 < -1e-9 || l2 < -1e-9 {
                        continue;
                    }
                    let mut rgb = [0.0f32; 3];
                    for (c, out) in rgb.iter_mut().enumerate() {
                        *out = (l0 * f64::from(cols[0][c]) + l1 * f64::from(cols[1][c]) + l2 * f64::from(cols[2][c])) as f32;
                    }
                    paint(image, x, y, rgb);
                }
            }
        }

        for (q, &rgb) in p.iter().zip(&cols) {
            let x = q[0].floor().clamp(0.0, size - 1.0) as u32;
            let y = q[1].floor().clamp(0.0, f64::from(h) - 1.0) as u32;
            paint(image, x, y, rgb);
        }
    }
    covered
}

/// Grows painted regions outward by one texel per pass. Each uncovered
/// texel with a covered 8-neighbor takes the mean of those neighbors.
///
/// This keeps bilinear filtering at chart borders from pulling in the
/// black background.
#[allow(clippy::cast_possible_wrap)]
pub fn dilate(image: &mut TextureImage, covered: &mut [bool], passes: usize) {
    let (w, h) = (image.width() as usize, image.height() as usize);
    for _ in 0..passes {
        let snapshot = image.clone();
        let before = covered.to_vec();
        let mut grew = false;

        for y in 0..h {
            for x in 0..w {
                if before[y * w + x] {
                    continue;
                }
                let mut sum = [0.0f32; 3];
                let mut n = 0u8;
                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let (Ok(nx), Ok(ny)) = (usize::try_from(x as i64 + dx), usize::try_from(y as i64 + dy)) else {
                            continue;
                        };
                        if nx >= w || ny >= h || !before[ny * w + nx] {
                            continue;
                        }
                        let i = (ny * w + nx) * 3;
                        for (c, s) in sum.iter_mut().enumerate() {
                            *s += snapshot.data[i + c];
                        }
                        n += 1;
                    }
                }
                if n > 0 {
                    let i = (y * w + x) * 3;
                    for (c, s) in sum.iter().enumerate() {
                        image.data[i + c] = s / f32::from(n);
                    }
                    covered[y * w + x] = true;
                    grew = true;
                }
            }
        }
        if !grew {
            break;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_types::Vertex;

    fn quad() -> IndexedMesh {
        let mut vertices = Vec::new();
        for (x, y, u, v) in [(0.0, 0.0, 0.25, 0.25), (1.0, 0.0, 0.75, 0.25), (1.0, 1.0, 0.75, 0.75), (0.0, 1.0, 0.25, 0.75)] {
            let mut vertex = Vertex::from_coords(x, y, 0.0);
            vertex.attributes.uv = Some((u, v));
            vertices.push(vertex);
        }
        IndexedMesh::from_parts(vertices, vec![[0, 1, 2], [0, 2, 3]])
    }

    #[test]
    fn test_uniform_color_fills_interior() {
        let mesh = quad();
        let mut image = TextureImage::new(16, 16);
        let covered = rasterize(&mesh, &[[0.2, 0.4, 0.6]; 4], &mut image);

        // UV square [0.25, 0.75] covers texels 4..12 on both axes.
        for y in 4..12 {
            for x in 4..12 {
                assert!(covered[y * 16 + x], "texel ({x}, {y}) not covered");
                let px = image.pixel(x as u32, y as u32).unwrap();
                assert_relative_eq!(px[0], 0.2, epsilon = 1e-6);
                assert_relative_eq!(px[2], 0.6, epsilon = 1e-6);
            }
        }
        assert!(!covered[0]);
        assert_eq!(image.pixel(0, 0), Some([0.0; 3]));
    }

    #[test]
    fn test_v_axis_points_up() {
        let mesh = quad();
        let mut image = TextureImage::new(16, 16);
        // Bottom vertices (v = 0.25) red, top vertices (v = 0.75) blue.
        let colors = [[1.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0, 1.0]];
        rasterize(&mesh, &colors, &mut image);

        // Low v lands on high rows.
        let bottom = image.pixel(8, 11).unwrap();
        let top = image.pixel(8, 4).unwrap();
        assert!(bottom[0] > bottom[2]);
        assert!(top[2] > top[0]);
    }

    #[test]
    fn test_dilation_grows_one_texel_per_pass() {
        let mut image = TextureImage::new(5, 5);
        image.set_pixel(2, 2, [1.0, 1.0, 1.0]);
        let mut covered = vec![false; 25];
        covered[12] = true;

        dilate(&mut image, &mut covered, 1);
        assert_eq!(covered.iter().filter(|&&c| c).count(), 9);
        assert_eq!(image.pixel(1, 1), Some([1.0; 3]));
        assert_eq!(image.pixel(0, 0), Some([0.0; 3]));

        dilate(&mut image, &mut covered, 1);
        assert!(covered.iter().all(|&c| c));
        assert_eq!(image.pixel(0, 0), Some([1.0; 3]));
    }

    #[test]
    fn test_faces_without_uvs_skipped() {
        let mesh = IndexedMesh::from_parts(
            vec![
                Vertex::from_coords(0.0, 0.0, 0.0),
                Vertex::from_coords(1.0, 0.0, 0.0),
                Vertex::from_coords(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        let mut image = TextureImage::new(8, 8);
        let covered = rasterize(&mesh, &[[1.0; 3]; 3], &mut image);
        assert!(covered.iter().all(|&c| !c));
    }
}
