//! Reading and writing scans.
//!
//! | Extension              | Layout                                        |
//! |------------------------|-----------------------------------------------|
//! | `.ply`                 | ASCII or binary, see [`super::ply`]           |
//! | `.xyz`, `.txt`, `.pts` | whitespace columns `x y z [nx ny nz] [r g b]` |
//! | `.csv`                 | `x,y,z[,r,g,b]`, header row optional          |
//!
//! ```no_run
//! use mesh_scan::pointcloud::PointCloud;
//!
//! let scan = PointCloud::load("scan.ply")?;
//! scan.save("scan.csv")?;
//! # Ok::<(), mesh_scan::ScanError>(())
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::{Point3, Vector3};
use tracing::{debug, info};

use super::{ply, CloudPoint, PointCloud};
use crate::error::{ScanError, ScanResult};
use mesh_types::VertexColor;

/// On-disk layouts a [`PointCloud`] can be read from and written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointCloudFormat {
    /// Polygon File Format (ASCII or binary).
    Ply,
    /// Whitespace-separated columns.
    Xyz,
    /// Comma separated values.
    Csv,
}

impl PointCloudFormat {
    /// Maps an extension, in any case, to its layout.
    ///
    /// ```
    /// use mesh_scan::pointcloud::io::PointCloudFormat;
    ///
    /// assert_eq!(PointCloudFormat::from_extension("PLY"), Some(PointCloudFormat::Ply));
    /// assert_eq!(PointCloudFormat::from_extension("txt"), Some(PointCloudFormat::Xyz));
    /// assert_eq!(PointCloudFormat::from_extension("e57"), None);
    /// ```
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "ply" => Some(Self::Ply),
            "xyz" | "txt" | "pts" => Some(Self::Xyz),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    /// Layout implied by the extension of `path`.
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    fn detect(path: &Path) -> ScanResult<Self> {
        Self::from_path(path).ok_or_else(|| ScanError::UnsupportedFormat {
            format: path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("unknown")
                .to_string(),
        })
    }
}

impl PointCloud {
    /// Reads a scan, choosing the parser by extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, cannot be parsed or has
    /// an unsupported extension.
    pub fn load<P: AsRef<Path>>(path: P) -> ScanResult<Self> {
        let path = path.as_ref();
        let format = PointCloudFormat::detect(path)?;
        if !path.exists() {
            return Err(ScanError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let cloud = match format {
            PointCloudFormat::Ply => ply::load_ply(path)?,
            PointCloudFormat::Xyz => load_xyz(path)?,
            PointCloudFormat::Csv => load_csv(path)?,
        };
        info!(
            path = %path.display(),
            points = cloud.len(),
            colors = cloud.has_colors(),
            normals = cloud.has_normals(),
            "Loaded point cloud"
        );
        Ok(cloud)
    }

    /// Writes the scan in the layout implied by the extension. PLY output
    /// is binary little-endian; colors and normals are written only when
    /// every point has them.
    ///
    /// # Errors
    ///
    /// [`ScanError::UnsupportedFormat`] for an unknown extension, or the
    /// underlying I/O error.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ScanResult<()> {
        let path = path.as_ref();
        match PointCloudFormat::detect(path)? {
            PointCloudFormat::Ply => ply::save_ply(self, path),
            PointCloudFormat::Xyz => save_xyz(self, path),
            PointCloudFormat::Csv => save_csv(self, path),
        }
    }
}

/// Parses an RGB triple written either as 0-255 integers or as 0-1 floats.
fn parse_color(fields: &[&str]) -> Option<VertexColor> {
    if let [r, g, b] = fields {
        if let (Ok(r), Ok(g), Ok(b)) = (r.parse::<u8>(), g.parse::<u8>(), b.parse::<u8>()) {
            return Some(VertexColor::new(r, g, b));
        }
        let (r, g, b) = (
            r.parse::<f32>().ok()?,
            g.parse::<f32>().ok()?,
            b.parse::<f32>().ok()?,
        );
        if [r, g, b].iter().all(|c| (0.0..=1.0).contains(c)) {
            return Some(VertexColor::from_float(r, g, b));
        }
    }
    None
}

fn parse_coord(field: &str, format: &'static str, line: usize) -> ScanResult<f64> {
    field
        .trim()
        .parse::<f64>()
        .map_err(|_| ScanError::parse(format, line, format!("invalid number '{field}'")))
}

/// Six columns are read as a normal when they form a unit vector and as a
/// color otherwise. Lines with fewer than three columns are skipped.
fn load_xyz(path: &Path) -> ScanResult<PointCloud> {
    let reader = BufReader::new(File::open(path)?);

    let mut cloud = PointCloud::new();
    let mut skipped = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        let line_no = index + 1;

        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            skipped += 1;
            continue;
        }

        let x = parse_coord(parts[0], "XYZ", line_no)?;
        let y = parse_coord(parts[1], "XYZ", line_no)?;
        let z = parse_coord(parts[2], "XYZ", line_no)?;
        let mut point = CloudPoint::new(Point3::new(x, y, z));

        if parts.len() >= 6 {
            let normal = match (
                parts[3].parse::<f64>(),
                parts[4].parse::<f64>(),
                parts[5].parse::<f64>(),
            ) {
                (Ok(nx), Ok(ny), Ok(nz)) => Some(Vector3::new(nx, ny, nz)),
                _ => None,
            };
            let unit = normal.filter(|n| (n.norm() - 1.0).abs() < 1e-3);

            if parts.len() >= 9 || unit.is_some() {
                point.normal = unit;
                point.color = parts.get(6..9).and_then(parse_color);
            } else {
                point.color = parse_color(&parts[3..6]);
            }
        }

        cloud.push(point);
    }

    if skipped > 0 {
        debug!(skipped, "Skipped short XYZ lines");
    }
    Ok(cloud)
}

/// Column layout of a CSV file.
struct CsvColumns {
    xyz: [usize; 3],
    rgb: Option<[usize; 3]>,
}

impl CsvColumns {
    fn positional(count: usize) -> Self {
        Self {
            xyz: [0, 1, 2],
            rgb: (count >= 6).then_some([3, 4, 5]),
        }
    }

    fn from_header(header: &[&str]) -> Option<Self> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let xyz = [find("x")?, find("y")?, find("z")?];
        let rgb = match (find("r"), find("g"), find("b")) {
            (Some(r), Some(g), Some(b)) => Some([r, g, b]),
            _ if header.len() >= 6 => Some([3, 4, 5]),
            _ => None,
        };
        Some(Self { xyz, rgb })
    }
}

/// The first row is a header when its first field is not a number.
fn load_csv(path: &Path) -> ScanResult<PointCloud> {
    let reader = BufReader::new(File::open(path)?);

    let mut cloud = PointCloud::new();
    let mut columns: Option<CsvColumns> = None;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        let line_no = index + 1;
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();

        if columns.is_none() {
            let is_header = fields
                .first()
                .is_some_and(|f| f.parse::<f64>().is_err());
            columns = Some(if is_header {
                CsvColumns::from_header(&fields).ok_or_else(|| {
                    ScanError::parse("CSV", line_no, "header must name x, y and z columns")
                })?
            } else {
                CsvColumns::positional(fields.len())
            });
            if is_header {
                continue;
            }
        }
        let Some(layout) = columns.as_ref() else {
            continue;
        };

        let field = |i: usize| -> ScanResult<&str> {
            fields.get(i).copied().ok_or_else(|| {
                ScanError::parse(
                    "CSV",
                    line_no,
                    format!("expected at least {} columns, got {}", i + 1, fields.len()),
                )
            })
        };

        let [xi, yi, zi] = layout.xyz;
        let position = Point3::new(
            parse_coord(field(xi)?, "CSV", line_no)?,
            parse_coord(field(yi)?, "CSV", line_no)?,
            parse_coord(field(zi)?, "CSV", line_no)?,
        );
        let mut point = CloudPoint::new(position);

        if let Some([ri, gi, bi]) = layout.rgb {
            let rgb = [field(ri)?, field(gi)?, field(bi)?];
            point.color = Some(parse_color(&rgb).ok_or_else(|| {
                ScanError::parse("CSV", line_no, format!("invalid color {rgb:?}"))
            })?);
        }

        cloud.push(point);
    }

    Ok(cloud)
}

fn save_xyz(cloud: &PointCloud, path: &Path) -> ScanResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let (normals, colors) = (cloud.has_normals(), cloud.has_colors());
    writeln!(
        writer,
        "# {} points: x y z{}{}",
        cloud.len(),
        if normals { " nx ny nz" } else { "" },
        if colors { " r g b" } else { "" }
    )?;

    for point in &cloud.points {
        let p = point.position;
        write!(writer, "{} {} {}", p.x, p.y, p.z)?;
        if let Some(n) = point.normal.filter(|_| normals) {
            write!(writer, " {} {} {}", n.x, n.y, n.z)?;
        }
        if let Some(c) = point.color.filter(|_| colors) {
            write!(writer, " {} {} {}", c.r, c.g, c.b)?;
        }
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}

/// Saves a point cloud to a CSV file with a header row.
fn save_csv(cloud: &PointCloud, path: &Path) -> ScanResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let has_colors = cloud.has_colors();

    if has_colors {
        writeln!(writer, "x,y,z,r,g,b")?;
    } else {
        writeln!(writer, "x,y,z")?;
    }

    for point in &cloud.points {
        let p = point.position;
        match point.color.filter(|_| has_colors) {
            Some(c) => writeln!(writer, "{},{},{},{},{},{}", p.x, p.y, p.z, c.r, c.g, c.b)?,
            None => writeln!(writer, "{},{},{}", p.x, p.y, p.z)?,
        }
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn scratch(name: &str, contents: &str) -> (TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    fn tabletop() -> PointCloud {
        [
            CloudPoint::with_color(Point3::new(-0.25, 0.125, 0.0), VertexColor::new(90, 90, 90)),
            CloudPoint::with_color(Point3::new(0.5, -0.75, 0.001), VertexColor::new(200, 40, 40)),
            CloudPoint::with_color(Point3::new(0.1, 0.2, 0.3), VertexColor::new(0, 0, 255)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_extension_lookup_ignores_case() {
        for (ext, format) in [
            ("Xyz", Some(PointCloudFormat::Xyz)),
            ("PTS", Some(PointCloudFormat::Xyz)),
            ("csv", Some(PointCloudFormat::Csv)),
            ("stl", None),
        ] {
            assert_eq!(PointCloudFormat::from_extension(ext), format, "{ext}");
        }
        assert_eq!(
            PointCloudFormat::from_path("scans/mug.final.ply"),
            Some(PointCloudFormat::Ply)
        );
        assert_eq!(PointCloudFormat::from_path("README"), None);
    }

    #[test]
    fn test_xyz_keeps_colors_and_normals() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("oriented.xyz");
        let mut cloud = tabletop();
        for (point, n) in cloud.points.iter_mut().zip([Vector3::z(), Vector3::x(), -Vector3::y()]) {
            point.normal = Some(n);
        }
        cloud.save(&path).unwrap();

        assert_eq!(PointCloud::load(&path).unwrap(), cloud);
        let header = fs::read_to_string(&path).unwrap();
        assert!(header.starts_with("# 3 points: x y z nx ny nz r g b"));
    }

    #[test]
    fn test_xyz_positions_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bare.pts");
        let cloud = PointCloud::from_positions(&[Point3::new(1e-7, -3.5, 12.25)]);
        cloud.save(&path).unwrap();

        let back = PointCloud::load(&path).unwrap();
        assert_eq!(back, cloud);
        assert!(!back.has_colors() && !back.has_normals());
    }

    #[test]
    fn test_xyz_six_columns_are_normal_or_color() {
        let (_dir, path) = scratch("six.xyz", "0 0 0 0 0 1\n1 0 0 200 100 50\n");
        let cloud = PointCloud::load(&path).unwrap();
        assert_eq!(cloud.points[0].normal, Some(Vector3::z()));
        assert_eq!(cloud.points[0].color, None);
        assert_eq!(cloud.points[1].normal, None);
        assert_eq!(cloud.points[1].color, Some(VertexColor::new(200, 100, 50)));
    }

    #[test]
    fn test_xyz_skips_comments_blanks_and_short_rows() {
        let (_dir, path) = scratch("notes.txt", "# scanner v2\n\n// units: m\n0 0 0\n0.5 0.5\n1 1 1\n");
        assert_eq!(PointCloud::load(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_xyz_bad_number_names_its_line() {
        let (_dir, path) = scratch("bad.xyz", "0 0 0\n1 nan? 1\n");
        let err = PointCloud::load(&path).unwrap_err();
        assert!(matches!(err, ScanError::Parse { format: "XYZ", line: 2, .. }), "{err}");
    }

    #[test]
    fn test_csv_mixed_color_encodings() {
        let (_dir, path) = scratch("scan.csv", "x,y,z,r,g,b\n0,0,0,255,0,0\n1.5,2,3,0.0,1.0,0.0\n");
        let cloud = PointCloud::load(&path).unwrap();
        assert!(cloud.has_colors());
        assert_relative_eq!(cloud.points[1].position.x, 1.5);
        assert_eq!(cloud.points[0].color, Some(VertexColor::new(255, 0, 0)));
        assert_eq!(cloud.points[1].color, Some(VertexColor::new(0, 255, 0)));
    }

    #[test]
    fn test_csv_header_columns_by_name() {
        let (_dir, path) = scratch("reordered.csv", "z,x,y\n3,1,2\n");
        let cloud = PointCloud::load(&path).unwrap();
        assert_eq!(cloud.points[0].position, Point3::new(1.0, 2.0, 3.0));
        assert!(!cloud.has_colors());
    }

    #[test]
    fn test_csv_headerless_and_short_rows() {
        let (_dir, path) = scratch("plain.csv", "0,0,0\n1,1,1\n");
        assert_eq!(PointCloud::load(&path).unwrap().len(), 2);

        let (_dir, path) = scratch("short.csv", "x,y,z\n0,0\n");
        let err = PointCloud::load(&path).unwrap_err();
        assert!(matches!(err, ScanError::Parse { format: "CSV", line: 2, .. }), "{err}");

        let (_dir, path) = scratch("nameless.csv", "a,b,c\n0,0,0\n");
        assert!(matches!(
            PointCloud::load(&path),
            Err(ScanError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_csv_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.csv");
        let cloud = tabletop();
        cloud.save(&path).unwrap();
        assert_eq!(PointCloud::load(&path).unwrap(), cloud);
    }

    #[test]
    fn test_unknown_extension_and_missing_file() {
        assert!(matches!(
            PointCloud::load("scan.e57"),
            Err(ScanError::UnsupportedFormat { format }) if format == "e57"
        ));
        assert!(matches!(
            PointCloud::load("no/such/scan.xyz"),
            Err(ScanError::FileNotFound { .. })
        ));
        assert!(matches!(
            PointCloud::new().save("out.obj"),
            Err(ScanError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_empty_cloud_writes_and_reads_back_empty() {
        let dir = tempdir().unwrap();
        for name in ["empty.xyz", "empty.csv"] {
            let path = dir.path().join(name);
            PointCloud::new().save(&path).unwrap();
            assert!(PointCloud::load(&path).unwrap().is_empty(), "{name}");
        }
    }
}
