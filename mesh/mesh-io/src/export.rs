//! Textured OBJ export.
//!
//! A textured model is three files side by side:
//!
//! ```text
//! model.obj   geometry, texture coordinates, `mtllib model.mtl`
//! model.mtl   material0 with `map_Kd model.png`
//! model.png   8-bit RGB texture
//! ```
//!
//! All three are staged as temporary files in the target directory and
//! renamed into place only once every one of them has been written. A
//! failed export leaves none of its files at the final paths, and files a
//! previous export put there are restored.

use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use image::{ImageError, ImageFormat, RgbImage};
use mesh_types::IndexedMesh;
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, info, warn};

use crate::error::{Artifact, ExportError, ExportResult};

/// Material name referenced by the OBJ and defined by the MTL.
pub const MATERIAL_NAME: &str = "material0";

/// Group name written before the faces.
pub const GROUP_NAME: &str = "TexturedMesh";

/// Final paths of a textured export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    /// Geometry file.
    pub obj: PathBuf,
    /// Material library.
    pub mtl: PathBuf,
    /// Texture image.
    pub texture: PathBuf,
}

impl ExportPaths {
    /// Paths `<dir>/<basename>.{obj,mtl,png}`.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_io::ExportPaths;
    /// use std::path::Path;
    ///
    /// let paths = ExportPaths::new("out", "teapot");
    /// assert_eq!(paths.mtl, Path::new("out/teapot.mtl"));
    /// assert_eq!(paths.texture, Path::new("out/teapot.png"));
    /// ```
    #[must_use]
    pub fn new(dir: impl AsRef<Path>, basename: &str) -> Self {
        let dir = dir.as_ref();
        let path = |artifact: Artifact| dir.join(format!("{basename}.{}", artifact.extension()));
        Self {
            obj: path(Artifact::Obj),
            mtl: path(Artifact::Mtl),
            texture: path(Artifact::Texture),
        }
    }

    /// Final path of `artifact`.
    #[must_use]
    pub fn get(&self, artifact: Artifact) -> &Path {
        match artifact {
            Artifact::Obj => &self.obj,
            Artifact::Mtl => &self.mtl,
            Artifact::Texture => &self.texture,
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Writes OBJ text for `mesh`, referencing the material library `mtllib`.
///
/// Every vertex must carry a UV; vertex `i` and texture coordinate `i`
/// share an index. UVs are written unchanged.
///
/// # Errors
///
/// Returns an error if writing fails. A vertex without a UV is written as
/// `vt 0 0`; [`export_textured`] rejects such meshes before writing.
pub fn write_obj<W: Write>(mesh: &IndexedMesh, mtllib: &str, w: &mut W) -> io::Result<()> {
    writeln!(w, "# OBJ file")?;
    writeln!(
        w,
        "# {} vertices, {} faces",
        mesh.vertex_count(),
        mesh.face_count()
    )?;
    writeln!(w, "mtllib {mtllib}")?;
    for v in &mesh.vertices {
        let p = v.position;
        writeln!(w, "v {} {} {}", p.x, p.y, p.z)?;
    }
    for v in &mesh.vertices {
        let (s, t) = v.uv().unwrap_or((0.0, 0.0));
        writeln!(w, "vt {s} {t}")?;
    }
    writeln!(w, "g {GROUP_NAME}")?;
    writeln!(w, "usemtl {MATERIAL_NAME}")?;
    for face in &mesh.faces {
        let [a, b, c] = face.map(|i| u64::from(i) + 1);
        writeln!(w, "f {a}/{a} {b}/{b} {c}/{c}")?;
    }
    Ok(())
}

/// Writes the MTL text for `mesh` with diffuse map `texture_name`.
///
/// The diffuse color is the mesh's average vertex color with ambient at
/// 20% of it. Meshes without colors get a neutral grey material.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_mtl<W: Write>(mesh: &IndexedMesh, texture_name: &str, w: &mut W) -> io::Result<()> {
    let (ka, kd) = mesh.average_color().map_or(([0.2f32; 3], [0.8f32; 3]), |c| {
        let kd = c.to_float();
        (kd.map(|x| x * 0.2), kd)
    });
    let ks = [0.1f32; 3];

    writeln!(w, "# MTL file")?;
    writeln!(w, "newmtl {MATERIAL_NAME}")?;
    writeln!(w, "Ka {:.3} {:.3} {:.3}", ka[0], ka[1], ka[2])?;
    writeln!(w, "Kd {:.3} {:.3} {:.3}", kd[0], kd[1], kd[2])?;
    writeln!(w, "Ks {:.3} {:.3} {:.3}", ks[0], ks[1], ks[2])?;
    writeln!(w, "Ns 10.0")?;
    writeln!(w, "d 1.0")?;
    writeln!(w, "illum 2")?;
    writeln!(w, "map_Kd {texture_name}")?;
    Ok(())
}

/// Encodes `texture` as PNG.
///
/// # Errors
///
/// Returns an error if encoding or writing fails.
pub fn write_png<W: Write + Seek>(texture: &RgbImage, w: &mut W) -> io::Result<()> {
    texture.write_to(w, ImageFormat::Png).map_err(|e| match e {
        ImageError::IoError(e) => e,
        other => io::Error::other(other),
    })
}

/// Writes one artifact to a temporary file next to its final path.
fn stage<F>(dir: &Path, artifact: Artifact, path: &Path, write: F) -> ExportResult<NamedTempFile>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> io::Result<()>,
{
    let wrap = |source| ExportError::Write {
        artifact,
        path: path.to_path_buf(),
        source,
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".export-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(wrap)?;
    {
        let mut w = BufWriter::new(tmp.as_file_mut());
        write(&mut w).map_err(wrap)?;
        w.flush().map_err(wrap)?;
    }
    debug!(%artifact, tmp = %tmp.path().display(), "Staged artifact");
    Ok(tmp)
}

/// Moves an existing file at `path` to a temporary name in `dir`.
fn set_aside(dir: &Path, path: &Path) -> io::Result<TempPath> {
    let backup = tempfile::Builder::new()
        .prefix(".export-old-")
        .tempfile_in(dir)?
        .into_temp_path();
    fs::rename(path, &backup)?;
    Ok(backup)
}

/// Renames staged files into place.
///
/// Files already at the final paths are moved aside first. On failure the
/// new files that made it are removed and the old ones put back; on
/// success the old ones are deleted.
fn publish(
    dir: &Path,
    staged: Vec<(Artifact, NamedTempFile)>,
    paths: &ExportPaths,
) -> ExportResult<()> {
    let mut backups: Vec<(&Path, TempPath)> = Vec::new();
    let mut published: Vec<&Path> = Vec::with_capacity(staged.len());
    let mut failure = None;

    for (artifact, _) in &staged {
        let path = paths.get(*artifact);
        if !path.is_file() {
            continue;
        }
        match set_aside(dir, path) {
            Ok(backup) => backups.push((path, backup)),
            Err(e) => {
                failure = Some((*artifact, e));
                break;
            }
        }
    }

    if failure.is_none() {
        for (artifact, tmp) in staged {
            let path = paths.get(artifact);
            if let Err(e) = tmp.persist(path) {
                failure = Some((artifact, e.error));
                break;
            }
            published.push(path);
        }
    }

    let Some((artifact, source)) = failure else {
        return Ok(());
    };
    for done in &published {
        if let Err(remove) = fs::remove_file(done) {
            warn!(path = %done.display(), error = %remove, "Failed to roll back export");
        }
    }
    for (path, backup) in backups {
        if let Err(restore) = backup.persist(path) {
            warn!(path = %path.display(), error = %restore.error, "Failed to restore previous file");
        }
    }
    let path = paths.get(artifact);
    warn!(%artifact, path = %path.display(), "Export failed, rolled back");
    Err(ExportError::Write {
        artifact,
        path: path.to_path_buf(),
        source,
    })
}

/// Exports a textured mesh as `<dir>/<basename>.{obj,mtl,png}`.
///
/// The directory is created if needed. Either all three files end up at
/// their final paths or none of them do.
///
/// # Errors
///
/// - [`ExportError::MissingUv`] if a vertex has no texture coordinate
/// - [`ExportError::Write`] naming the artifact whose write failed
///
/// # Example
///
/// ```no_run
/// use image::RgbImage;
/// use mesh_io::export_textured;
/// use mesh_types::IndexedMesh;
///
/// let mesh: IndexedMesh = todo!();
/// let texture = RgbImage::new(256, 256);
/// let paths = export_textured(&mesh, &texture, "out", "model").unwrap();
/// println!("wrote {}", paths.obj.display());
/// ```
pub fn export_textured(
    mesh: &IndexedMesh,
    texture: &RgbImage,
    dir: impl AsRef<Path>,
    basename: &str,
) -> ExportResult<ExportPaths> {
    let dir = dir.as_ref();
    if let Some(vertex) = mesh.vertices.iter().position(|v| v.uv().is_none()) {
        return Err(ExportError::MissingUv { vertex });
    }

    let paths = ExportPaths::new(dir, basename);
    fs::create_dir_all(dir).map_err(|source| ExportError::Write {
        artifact: Artifact::Obj,
        path: paths.obj.clone(),
        source,
    })?;

    let mtl_name = file_name(&paths.mtl);
    let texture_name = file_name(&paths.texture);
    let staged = vec![
        (
            Artifact::Obj,
            stage(dir, Artifact::Obj, &paths.obj, |w| write_obj(mesh, &mtl_name, w))?,
        ),
        (
            Artifact::Mtl,
            stage(dir, Artifact::Mtl, &paths.mtl, |w| write_mtl(mesh, &texture_name, w))?,
        ),
        (
            Artifact::Texture,
            stage(dir, Artifact::Texture, &paths.texture, |w| write_png(texture, w))?,
        ),
    ];
    publish(dir, staged, &paths)?;

    info!(
        obj = %paths.obj.display(),
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        texture_width = texture.width(),
        texture_height = texture.height(),
        "Exported textured mesh"
    );
    Ok(paths)
}
