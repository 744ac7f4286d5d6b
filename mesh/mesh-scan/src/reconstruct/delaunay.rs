//! 3D Delaunay tetrahedralization (Bowyer–Watson).
//!
//! Points are inserted one at a time into an enclosing super-tetrahedron.
//! For each point, every tetrahedron whose circumsphere contains it is
//! removed and the resulting cavity is re-filled with tetrahedra fanning
//! from the new point.
//!
//! Robustness measures, in order of application:
//!
//! - points closer than `1e-9 × diagonal` are merged
//! - every point is perturbed by up to `1e-7 × diagonal` so that grid-like
//!   scans have no cospherical configurations
//! - insertion follows Morton order so the point-location walk stays short
//! - a cavity that is not star-shaped from the new point is grown until it
//!   is; a point whose cavity cannot be repaired is skipped and counted
//!
//! Perturbation only affects connectivity. The reported positions are the
//! unperturbed inputs.

use std::collections::VecDeque;

use hashbrown::{HashMap, HashSet};
use nalgebra::{Point3, Vector3};
use rand::prelude::*;
use tracing::{debug, warn};

use crate::error::{ScanError, ScanResult};

/// Vertices of the face opposite vertex `i`, wound outward for a positively
/// oriented tetrahedron.
pub const FACES: [[usize; 3]; 4] = [[1, 2, 3], [0, 3, 2], [0, 1, 3], [0, 2, 1]];

const DEDUPE_TOLERANCE: f64 = 1e-9;
const JITTER: f64 = 1e-7;
const SUPER_SCALE: f64 = 50.0;
const VOLUME_TOLERANCE: f64 = 1e-14;
const DEFAULT_JITTER_SEED: u64 = 0x5eed_de1a_0e11;

/// A tetrahedron of the final triangulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tetrahedron {
    /// Indices into [`Tetrahedralization::positions`], positively oriented.
    pub vertices: [usize; 4],
    /// Radius of the circumscribed sphere.
    pub circumradius: f64,
}

impl Tetrahedron {
    /// Outward-wound vertex triple of the face opposite vertex `i`.
    #[must_use]
    pub const fn face(&self, i: usize) -> [usize; 3] {
        let [a, b, c] = FACES[i];
        [self.vertices[a], self.vertices[b], self.vertices[c]]
    }
}

/// Result of [`tetrahedralize`].
#[derive(Debug, Clone, Default)]
pub struct Tetrahedralization {
    /// Distinct input positions, unperturbed.
    pub positions: Vec<Point3<f64>>,
    /// For each position, the index of the input point it came from.
    pub source: Vec<usize>,
    /// Tetrahedra not touching the super-tetrahedron.
    pub tetrahedra: Vec<Tetrahedron>,
    /// Input points merged into an earlier coincident point.
    pub duplicates: usize,
    /// Points dropped because their cavity could not be repaired.
    pub skipped: usize,
}

#[derive(Debug, Clone)]
struct Tet {
    v: [usize; 4],
    n: [Option<usize>; 4],
    alive: bool,
    center: Point3<f64>,
    r2: f64,
}

fn orient(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, d: &Point3<f64>) -> f64 {
    (b - a).cross(&(c - a)).dot(&(d - a))
}

fn circumsphere(p: &[Point3<f64>; 4]) -> (Point3<f64>, f64) {
    let a = p[0];
    let u = p[1] - a;
    let v = p[2] - a;
    let w = p[3] - a;
    let denom = 2.0 * u.dot(&v.cross(&w));
    if denom.abs() <= f64::MIN_POSITIVE {
        return (a, f64::INFINITY);
    }
    let offset = (v.cross(&w) * u.norm_squared()
        + w.cross(&u) * v.norm_squared()
        + u.cross(&v) * w.norm_squared())
        / denom;
    (a + offset, offset.norm_squared())
}

struct Mesh3 {
    pts: Vec<Point3<f64>>,
    tets: Vec<Tet>,
    volume_eps: f64,
    last: usize,
}

impl Mesh3 {
    fn make_tet(&self, v: [usize; 4]) -> Tet {
        let (center, r2) = circumsphere(&v.map(|i| self.pts[i]));
        Tet {
            v,
            n: [None; 4],
            alive: true,
            center,
            r2,
        }
    }

    fn in_sphere(&self, t: usize, p: &Point3<f64>) -> bool {
        let tet = &self.tets[t];
        (p - tet.center).norm_squared() < tet.r2
    }

    fn face_points(&self, t: usize, i: usize) -> [Point3<f64>; 3] {
        FACES[i].map(|k| self.pts[self.tets[t].v[k]])
    }

    /// Walks from the last created tetrahedron towards `p`.
    fn locate(&self, p: &Point3<f64>) -> Option<usize> {
        let mut t = self.last;
        if !self.tets.get(t).is_some_and(|tet| tet.alive) {
            t = self.tets.iter().rposition(|tet| tet.alive)?;
        }

        'walk: for _ in 0..self.tets.len() {
            for i in 0..4 {
                let [a, b, c] = self.face_points(t, i);
                if orient(&a, &b, &c, p) > 0.0 {
                    match self.tets[t].n[i] {
                        Some(next) => {
                            t = next;
                            continue 'walk;
                        }
                        None => return None,
                    }
                }
            }
            return Some(t);
        }
        None
    }

    fn find_seed(&self, p: &Point3<f64>) -> Option<usize> {
        if let Some(t) = self.locate(p) {
            if self.in_sphere(t, p) {
                return Some(t);
            }
        }
        self.tets
            .iter()
            .enumerate()
            .find(|(t, tet)| tet.alive && self.in_sphere(*t, p))
            .map(|(t, _)| t)
    }

    /// Inserts point `pi`. Returns `false` if it had to be skipped.
    fn insert(&mut self, pi: usize) -> bool {
        let p = self.pts[pi];
        let Some(seed) = self.find_seed(&p) else {
            return false;
        };

        // Membership set plus insertion-ordered list, so the new
        // tetrahedra are created in a reproducible order.
        let mut in_cavity: HashSet<usize> = HashSet::from([seed]);
        let mut cavity = vec![seed];
        let mut queue = VecDeque::from([seed]);
        while let Some(t) = queue.pop_front() {
            for nb in self.tets[t].n.into_iter().flatten() {
                if !in_cavity.contains(&nb) && self.in_sphere(nb, &p) {
                    in_cavity.insert(nb);
                    cavity.push(nb);
                    queue.push_back(nb);
                }
            }
        }

        // Grow until every boundary face sees `p` from the inside.
        let boundary = loop {
            let mut boundary = Vec::new();
            let mut grow = None;
            for &t in &cavity {
                for i in 0..4 {
                    let outside = self.tets[t].n[i];
                    if outside.is_some_and(|o| in_cavity.contains(&o)) {
                        continue;
                    }
                    let [a, b, c] = self.face_points(t, i);
                    if orient(&a, &b, &c, &p) < -self.volume_eps {
                        boundary.push((t, i, outside));
                    } else {
                        grow = Some(outside);
                        break;
                    }
                }
                if grow.is_some() {
                    break;
                }
            }
            match grow {
                None => break boundary,
                Some(Some(o)) => {
                    in_cavity.insert(o);
                    cavity.push(o);
                }
                Some(None) => return false,
            }
        };

        for &t in &cavity {
            self.tets[t].alive = false;
        }

        let mut edges: HashMap<(usize, usize), (usize, usize)> = HashMap::new();
        for (t, i, outside) in boundary {
            let [a, b, c] = FACES[i].map(|k| self.tets[t].v[k]);
            let mut tet = self.make_tet([a, c, b, pi]);
            tet.n[3] = outside;
            let id = self.tets.len();
            self.tets.push(tet);

            if let Some(o) = outside {
                let face = [a, b, c];
                if let Some(j) = (0..4).find(|&j| !face.contains(&self.tets[o].v[j])) {
                    self.tets[o].n[j] = Some(id);
                }
            }

            // Faces through `p`, keyed by their other two vertices.
            for (slot, key) in [(0, (c, b)), (1, (a, b)), (2, (a, c))] {
                let key = if key.0 < key.1 { key } else { (key.1, key.0) };
                if let Some((other, other_slot)) = edges.remove(&key) {
                    self.tets[id].n[slot] = Some(other);
                    self.tets[other].n[other_slot] = Some(id);
                } else {
                    edges.insert(key, (id, slot));
                }
            }
            self.last = id;
        }
        true
    }
}

/// Interleaves the low 21 bits of three coordinates.
fn morton(x: u64, y: u64, z: u64) -> u64 {
    fn spread(mut v: u64) -> u64 {
        v &= 0x1f_ffff;
        v = (v | v << 32) & 0x001f_0000_0000_ffff;
        v = (v | v << 16) & 0x001f_0000_ff00_00ff;
        v = (v | v << 8) & 0x100f_00f0_0f00_f00f;
        v = (v | v << 4) & 0x10c3_0c30_c30c_30c3;
        v = (v | v << 2) & 0x1249_2492_4924_9249;
        v
    }
    spread(x) | spread(y) << 1 | spread(z) << 2
}

/// Whether some four of the selected points are farther than `tolerance`
/// from being coplanar.
fn spans_volume(points: &[Point3<f64>], selected: &[usize], tolerance: f64) -> bool {
    let farthest = |key: &dyn Fn(&Point3<f64>) -> f64| {
        selected
            .iter()
            .map(|&i| (i, key(&points[i])))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    };
    let p0 = points[selected[0]];
    let Some((i1, _)) = farthest(&|p| (p - p0).norm_squared()) else {
        return false;
    };
    let Some(dir) = (points[i1] - p0).try_normalize(0.0) else {
        return false;
    };
    let Some((i2, line_dist)) = farthest(&|p| {
        let d = p - p0;
        (d - dir * d.dot(&dir)).norm()
    }) else {
        return false;
    };
    if line_dist <= tolerance {
        return false;
    }
    let normal = dir.cross(&(points[i2] - p0)).normalize();
    farthest(&|p| normal.dot(&(p - p0)).abs()).is_some_and(|(_, d)| d > tolerance)
}

/// Builds the Delaunay tetrahedralization of `points`.
///
/// `seed` drives the perturbation; without one a fixed seed is used so the
/// same input always yields the same connectivity.
///
/// # Errors
///
/// - [`ScanError::InsufficientPoints`] for fewer than 4 distinct points
/// - [`ScanError::DegenerateGeometry`] if the points span no volume
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::too_many_lines
)]
pub fn tetrahedralize(points: &[Point3<f64>], seed: Option<u64>) -> ScanResult<Tetrahedralization> {
    let insufficient = |actual| ScanError::InsufficientPoints {
        required: 4,
        actual,
    };
    if points.len() < 4 {
        return Err(insufficient(points.len()));
    }

    let mut min = points[0];
    let mut max = points[0];
    for p in points {
        min = min.inf(p);
        max = max.sup(p);
    }
    let diag = (max - min).norm();
    if !diag.is_finite() || diag <= 0.0 {
        return Err(insufficient(1));
    }

    let cell = diag * DEDUPE_TOLERANCE;
    let mut seen: HashSet<[i64; 3]> = HashSet::with_capacity(points.len());
    let mut source = Vec::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        let key = [
            ((p.x - min.x) / cell).round() as i64,
            ((p.y - min.y) / cell).round() as i64,
            ((p.z - min.z) / cell).round() as i64,
        ];
        if seen.insert(key) {
            source.push(i);
        }
    }
    let duplicates = points.len() - source.len();
    if source.len() < 4 {
        return Err(insufficient(source.len()));
    }
    if !spans_volume(points, &source, cell) {
        return Err(ScanError::DegenerateGeometry {
            reason: "points are collinear or coplanar".to_string(),
        });
    }

    let mut rng = StdRng::seed_from_u64(seed.unwrap_or(DEFAULT_JITTER_SEED));
    let amplitude = diag * JITTER;
    let mut pts: Vec<Point3<f64>> = source
        .iter()
        .map(|&i| {
            let jitter = Vector3::new(
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
            );
            points[i] + jitter * amplitude
        })
        .collect();
    let m = pts.len();

    let extent = max - min;
    let scale = |v: f64, lo: f64, span: f64| {
        if span > 0.0 {
            (((v - lo) / span).clamp(0.0, 1.0) * f64::from(0x1f_ffff)) as u64
        } else {
            0
        }
    };
    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by_cached_key(|&i| {
        let p = pts[i];
        morton(
            scale(p.x, min.x, extent.x),
            scale(p.y, min.y, extent.y),
            scale(p.z, min.z, extent.z),
        )
    });

    let center = Point3::from((min.coords + max.coords) / 2.0);
    let s = 3.0 * SUPER_SCALE * diag;
    pts.extend([
        center + Vector3::new(s, s, s),
        center + Vector3::new(s, -s, -s),
        center + Vector3::new(-s, s, -s),
        center + Vector3::new(-s, -s, s),
    ]);

    let mut mesh = Mesh3 {
        pts,
        tets: Vec::with_capacity(m * 7),
        volume_eps: VOLUME_TOLERANCE * diag.powi(3),
        last: 0,
    };
    let mut root = [m, m + 1, m + 2, m + 3];
    let [a, b, c, d] = root.map(|i| mesh.pts[i]);
    if orient(&a, &b, &c, &d) < 0.0 {
        root.swap(0, 1);
    }
    let root = mesh.make_tet(root);
    mesh.tets.push(root);

    let mut skipped = 0;
    for &i in &order {
        if !mesh.insert(i) {
            skipped += 1;
        }
    }
    if skipped > 0 {
        warn!(skipped, "Points skipped during tetrahedralization");
    }

    let tetrahedra: Vec<Tetrahedron> = mesh
        .tets
        .iter()
        .filter(|t| t.alive && t.v.iter().all(|&v| v < m))
        .map(|t| Tetrahedron {
            vertices: t.v,
            circumradius: t.r2.sqrt(),
        })
        .collect();
    if tetrahedra.is_empty() {
        return Err(ScanError::DegenerateGeometry {
            reason: "points span no volume".to_string(),
        });
    }

    debug!(
        points = points.len(),
        distinct = m,
        duplicates,
        skipped,
        tetrahedra = tetrahedra.len(),
        "Delaunay tetrahedralization"
    );

    Ok(Tetrahedralization {
        positions: source.iter().map(|&i| points[i]).collect(),
        source,
        tetrahedra,
        duplicates,
        skipped,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn volume(t: &Tetrahedralization) -> f64 {
        t.tetrahedra
            .iter()
            .map(|tet| {
                let [a, b, c, d] = tet.vertices.map(|i| t.positions[i]);
                orient(&a, &b, &c, &d) / 6.0
            })
            .sum()
    }

    fn grid(n: usize) -> Vec<Point3<f64>> {
        let mut pts = Vec::new();
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    pts.push(Point3::new(i as f64, j as f64, k as f64));
                }
            }
        }
        pts
    }

    #[test]
    fn test_single_tetrahedron() {
        let pts = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let t = tetrahedralize(&pts, Some(1)).unwrap();
        assert_eq!(t.tetrahedra.len(), 1);
        assert_relative_eq!(volume(&t), 1.0 / 6.0, epsilon = 1e-6);
        // Circumsphere of the corner tetrahedron passes through (0,0,0)
        // and (1,1,1).
        assert_relative_eq!(t.tetrahedra[0].circumradius, 3.0_f64.sqrt() / 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_grid_fills_cube() {
        let t = tetrahedralize(&grid(4), Some(2)).unwrap();
        assert_eq!(t.skipped, 0);
        assert_eq!(t.positions.len(), 64);
        assert_relative_eq!(volume(&t), 27.0, epsilon = 1e-4);
        for tet in &t.tetrahedra {
            let [a, b, c, d] = tet.vertices.map(|i| t.positions[i]);
            assert!(orient(&a, &b, &c, &d) > -1e-9);
        }
    }

    #[test]
    fn test_empty_circumsphere() {
        let pts: Vec<Point3<f64>> = (0..60)
            .map(|i| {
                let t = f64::from(i);
                Point3::new((t * 1.3).sin(), (t * 0.7).cos(), (t * 2.1).sin() * 0.8)
            })
            .collect();
        let t = tetrahedralize(&pts, Some(3)).unwrap();
        for tet in &t.tetrahedra {
            let corners = tet.vertices.map(|i| t.positions[i]);
            let (center, r2) = circumsphere(&corners);
            for (i, p) in t.positions.iter().enumerate() {
                if tet.vertices.contains(&i) {
                    continue;
                }
                assert!((p - center).norm() >= r2.sqrt() - 1e-5);
            }
        }
    }

    #[test]
    fn test_duplicates_merged() {
        let mut pts = grid(3);
        pts.push(Point3::new(1.0, 1.0, 1.0));
        pts.push(Point3::new(2.0, 0.0, 1.0));
        let t = tetrahedralize(&pts, None).unwrap();
        assert_eq!(t.duplicates, 2);
        assert_eq!(t.positions.len(), 27);
        assert_relative_eq!(volume(&t), 8.0, epsilon = 1e-4);
    }

    #[test]
    fn test_default_seed_is_deterministic() {
        let a = tetrahedralize(&grid(3), None).unwrap();
        let b = tetrahedralize(&grid(3), None).unwrap();
        assert_eq!(a.tetrahedra, b.tetrahedra);
    }

    #[test]
    fn test_coplanar_points_fail() {
        let pts: Vec<Point3<f64>> = (0..10)
            .map(|i| Point3::new(f64::from(i), f64::from(i * i % 7), 0.0))
            .collect();
        assert!(tetrahedralize(&pts, Some(1)).is_err());
    }

    #[test]
    fn test_too_few_points() {
        let pts = [Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)];
        assert!(matches!(
            tetrahedralize(&pts, None),
            Err(ScanError::InsufficientPoints { actual: 3, .. })
        ));
    }

    #[test]
    fn test_morton_interleaves() {
        assert_eq!(morton(1, 0, 0), 0b001);
        assert_eq!(morton(0, 1, 0), 0b010);
        assert_eq!(morton(0, 0, 1), 0b100);
        assert_eq!(morton(3, 0, 0), 0b001_001);
    }
}
