//! Delaunay tetrahedralization via incremental Bowyer-Watson insertion.
//!
//! Tetrahedra keep face adjacency so that point location is a visibility walk from the most
//! recently created tetrahedron and the conflict cavity is grown breadth-first through
//! neighbours. Points are inserted in a serpentine grid order for locality.
//!
//! Circumsphere tests use cached circumcenters in floating point. To keep the result a valid
//! tetrahedralization under round-off, the cavity is enlarged until every boundary face is
//! strictly visible from the inserted point, so every new tetrahedron has positive volume.
use glam::DVec3;
use tracing::debug;

use crate::error::{Error, Result};
use crate::geometry::{circumsphere, orient3d};

const NONE: usize = usize::MAX;
const SUPER_SCALE: f64 = 64.0;

/// Tetrahedralizes `points`, returning positively oriented cells as indices into `points`.
///
/// Points that coincide with an already inserted point are skipped and referenced by no cell.
/// Fails with [`Error::DegenerateDomain`] for fewer than four points, non-finite coordinates or
/// coplanar input.
pub fn tetrahedralize(points: &[DVec3]) -> Result<Vec<[usize; 4]>> {
    let mut triangulator = Triangulator::new(points)?;
    for &pi in &insertion_order(points) {
        triangulator.insert(pi);
    }
    if triangulator.skipped > 0 {
        debug!(
            "Delaunay skipped {} of {} points as duplicates or unlocatable.",
            triangulator.skipped,
            points.len()
        );
    }
    Ok(triangulator.finish())
}

struct Tet {
    v: [usize; 4],
    /// `n[i]` is the tetrahedron across the face opposite `v[i]`.
    n: [usize; 4],
    center: DVec3,
    /// Infinite for flat tetrahedra, which then conflict with every point that reaches them.
    radius_sq: f64,
    alive: bool,
}

struct BoundaryFace {
    /// Vertices of the replacement tetrahedron; the new point sits at `face`.
    v: [usize; 4],
    face: usize,
    outside: usize,
}

struct Triangulator {
    pts: Vec<DVec3>,
    n_input: usize,
    tets: Vec<Tet>,
    free: Vec<usize>,
    marks: Vec<u32>,
    stamp: u32,
    last: usize,
    rotation: usize,
    dup_tol_sq: f64,
    skipped: usize,
    cavity: Vec<usize>,
    boundary: Vec<BoundaryFace>,
    /// Cavity edges waiting for their second incident tetrahedron, with the tetrahedron and
    /// face seen first. Holds at most the edges of one cavity boundary and is scanned linearly.
    open_edges: Vec<((usize, usize), (usize, usize))>,
}

impl Triangulator {
    fn new(points: &[DVec3]) -> Result<Self> {
        let n = points.len();
        if n < 4 {
            return Err(Error::DegenerateDomain(format!(
                "need at least 4 points to tetrahedralize, got {n}"
            )));
        }
        if points.iter().any(|p| !p.is_finite()) {
            return Err(Error::DegenerateDomain(
                "points must have finite coordinates".into(),
            ));
        }

        let (lo, hi) = points
            .iter()
            .fold((points[0], points[0]), |(lo, hi), &p| (lo.min(p), hi.max(p)));
        let diag = (hi - lo).length();
        if diag == 0.0 {
            return Err(Error::DegenerateDomain("all points coincide".into()));
        }
        ensure_not_coplanar(points, diag)?;

        let center = (lo + hi) * 0.5;
        let s = SUPER_SCALE * diag;
        let mut corners = [
            center + DVec3::new(s, s, s),
            center + DVec3::new(s, -s, -s),
            center + DVec3::new(-s, s, -s),
            center + DVec3::new(-s, -s, s),
        ];
        if orient3d(corners[0], corners[1], corners[2], corners[3]) < 0.0 {
            corners.swap(0, 1);
        }

        let mut pts = Vec::with_capacity(n + 4);
        pts.extend_from_slice(points);
        pts.extend_from_slice(&corners);

        let mut tri = Self {
            pts,
            n_input: n,
            tets: Vec::with_capacity(7 * n),
            free: Vec::new(),
            marks: Vec::with_capacity(7 * n),
            stamp: 0,
            last: 0,
            rotation: 0,
            dup_tol_sq: (1e-10 * diag).powi(2),
            skipped: 0,
            cavity: Vec::new(),
            boundary: Vec::new(),
            open_edges: Vec::new(),
        };
        tri.alloc([n, n + 1, n + 2, n + 3], [NONE; 4]);
        Ok(tri)
    }

    fn alloc(&mut self, v: [usize; 4], n: [usize; 4]) -> usize {
        let [a, b, c, d] = v.map(|i| self.pts[i]);
        let (center, radius_sq) = circumsphere(a, b, c, d).unwrap_or((DVec3::ZERO, f64::INFINITY));
        let tet = Tet {
            v,
            n,
            center,
            radius_sq,
            alive: true,
        };
        match self.free.pop() {
            Some(slot) => {
                self.tets[slot] = tet;
                self.marks[slot] = 0;
                slot
            }
            None => {
                self.tets.push(tet);
                self.marks.push(0);
                self.tets.len() - 1
            }
        }
    }

    /// Orientation of tetrahedron `t` with vertex `face` replaced by `p`.
    ///
    /// Positive when `p` lies strictly on the inner side of that face.
    #[inline]
    fn face_orient(&self, t: usize, face: usize, p: DVec3) -> f64 {
        let mut q = self.tets[t].v.map(|i| self.pts[i]);
        q[face] = p;
        orient3d(q[0], q[1], q[2], q[3])
    }

    #[inline]
    fn in_sphere(&self, t: usize, p: DVec3) -> bool {
        let tet = &self.tets[t];
        !tet.radius_sq.is_finite() || (p - tet.center).length_squared() < tet.radius_sq
    }

    fn locate(&mut self, p: DVec3) -> Option<usize> {
        let mut t = self.last;
        if !self.tets[t].alive {
            t = self.tets.iter().position(|tet| tet.alive)?;
        }
        let limit = 4 * self.tets.len() + 64;
        for _ in 0..limit {
            self.rotation = self.rotation.wrapping_add(1);
            let mut next = None;
            for r in 0..4 {
                let face = (r + self.rotation) % 4;
                if self.face_orient(t, face, p) < 0.0 {
                    next = Some(self.tets[t].n[face]);
                    break;
                }
            }
            match next {
                None => return Some(t),
                Some(NONE) => return None,
                Some(nb) => t = nb,
            }
        }
        self.locate_exhaustive(p)
    }

    fn locate_exhaustive(&self, p: DVec3) -> Option<usize> {
        let alive = || (0..self.tets.len()).filter(|&t| self.tets[t].alive);
        alive()
            .find(|&t| (0..4).all(|f| self.face_orient(t, f, p) >= 0.0))
            .or_else(|| alive().find(|&t| self.in_sphere(t, p)))
    }

    fn insert(&mut self, pi: usize) {
        let p = self.pts[pi];
        let Some(start) = self.locate(p) else {
            self.skipped += 1;
            return;
        };
        if self.tets[start]
            .v
            .iter()
            .any(|&v| (self.pts[v] - p).length_squared() <= self.dup_tol_sq)
        {
            self.skipped += 1;
            return;
        }

        self.stamp = self.stamp.wrapping_add(1);
        if self.stamp == 0 {
            self.marks.iter_mut().for_each(|m| *m = 0);
            self.stamp = 1;
        }
        let stamp = self.stamp;

        // Conflict region: tetrahedra whose circumsphere contains p, connected to `start`.
        self.cavity.clear();
        self.cavity.push(start);
        self.marks[start] = stamp;
        let mut head = 0;
        while head < self.cavity.len() {
            let t = self.cavity[head];
            head += 1;
            for face in 0..4 {
                let nb = self.tets[t].n[face];
                if nb != NONE && self.marks[nb] != stamp && self.in_sphere(nb, p) {
                    self.marks[nb] = stamp;
                    self.cavity.push(nb);
                }
            }
        }

        // Grow until p strictly sees every boundary face, so the cavity is star-shaped.
        let mut idx = 0;
        while idx < self.cavity.len() {
            let t = self.cavity[idx];
            idx += 1;
            for face in 0..4 {
                let nb = self.tets[t].n[face];
                if nb != NONE && self.marks[nb] == stamp {
                    continue;
                }
                if self.face_orient(t, face, p) <= 0.0 {
                    if nb == NONE {
                        self.skipped += 1;
                        return;
                    }
                    self.marks[nb] = stamp;
                    self.cavity.push(nb);
                }
            }
        }

        self.boundary.clear();
        for &t in &self.cavity {
            let tet = &self.tets[t];
            for face in 0..4 {
                let nb = tet.n[face];
                if nb == NONE || self.marks[nb] != stamp {
                    let mut v = tet.v;
                    v[face] = pi;
                    self.boundary.push(BoundaryFace {
                        v,
                        face,
                        outside: nb,
                    });
                }
            }
        }

        for &t in &self.cavity {
            self.tets[t].alive = false;
            self.free.push(t);
        }

        self.open_edges.clear();
        let boundary = std::mem::take(&mut self.boundary);
        for bf in &boundary {
            let mut n = [NONE; 4];
            n[bf.face] = bf.outside;
            let nt = self.alloc(bf.v, n);

            if bf.outside != NONE {
                let shared = bf.v;
                let outer = &mut self.tets[bf.outside];
                if let Some(g) = (0..4).find(|&g| {
                    let w = outer.v[g];
                    (0..4).all(|k| k == bf.face || shared[k] != w)
                }) {
                    outer.n[g] = nt;
                }
            }

            for j in (0..4).filter(|&j| j != bf.face) {
                let mut rest = (0..4).filter(|&k| k != bf.face && k != j).map(|k| bf.v[k]);
                let (Some(a), Some(b)) = (rest.next(), rest.next()) else {
                    continue;
                };
                let key = (a.min(b), a.max(b));
                match self.open_edges.iter().position(|(k, _)| *k == key) {
                    Some(slot) => {
                        let (_, (other, other_face)) = self.open_edges.swap_remove(slot);
                        self.tets[nt].n[j] = other;
                        self.tets[other].n[other_face] = nt;
                    }
                    None => self.open_edges.push((key, (nt, j))),
                }
            }
            self.last = nt;
        }
        self.boundary = boundary;
    }

    fn finish(self) -> Vec<[usize; 4]> {
        let n = self.n_input;
        self.tets
            .into_iter()
            .filter(|t| t.alive && t.v.iter().all(|&v| v < n))
            .map(|t| t.v)
            .collect()
    }
}

fn ensure_not_coplanar(points: &[DVec3], diag: f64) -> Result<()> {
    let a = points[0];
    let farthest = |score: &dyn Fn(DVec3) -> f64| {
        points
            .iter()
            .copied()
            .max_by(|&p, &q| score(p).total_cmp(&score(q)))
            .unwrap_or(a)
    };
    let b = farthest(&|p| (p - a).length_squared());
    let ab = b - a;
    let c = farthest(&|p| ab.cross(p - a).length_squared());
    let normal = ab.cross(c - a);
    let d = farthest(&|p| normal.dot(p - a).abs());
    if orient3d(a, b, c, d).abs() <= 1e-12 * diag.powi(3) {
        return Err(Error::DegenerateDomain(
            "points are coplanar; cannot tetrahedralize".into(),
        ));
    }
    Ok(())
}

/// Serpentine traversal of a coarse grid, giving consecutive insertions nearby locations.
fn insertion_order(points: &[DVec3]) -> Vec<usize> {
    let (lo, hi) = points.iter().fold(
        (DVec3::splat(f64::INFINITY), DVec3::splat(f64::NEG_INFINITY)),
        |(lo, hi), &p| (lo.min(p), hi.max(p)),
    );
    let m = ((points.len() as f64 / 8.0).cbrt().ceil() as usize).max(1);
    let cell = ((hi - lo) / m as f64).max(DVec3::splat(f64::MIN_POSITIVE));
    let bucket = |x: f64, lo: f64, size: f64| (((x - lo) / size) as usize).min(m - 1);

    let mut keyed: Vec<(usize, usize)> = points
        .iter()
        .enumerate()
        .map(|(idx, &p)| {
            let i = bucket(p.x, lo.x, cell.x);
            let j = bucket(p.y, lo.y, cell.y);
            let k = bucket(p.z, lo.z, cell.z);
            let jj = if k % 2 == 1 { m - 1 - j } else { j };
            let row = k * m + jj;
            let ii = if row % 2 == 1 { m - 1 - i } else { i };
            (row * m + ii, idx)
        })
        .collect();
    keyed.sort_unstable();
    keyed.into_iter().map(|(_, idx)| idx).collect()
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::geometry::tet_volume;

    fn total_volume(points: &[DVec3], tets: &[[usize; 4]]) -> f64 {
        tets.iter()
            .map(|t| tet_volume(points[t[0]], points[t[1]], points[t[2]], points[t[3]]))
            .sum()
    }

    fn lattice(n: usize) -> Vec<DVec3> {
        let mut pts = Vec::new();
        for k in 0..n {
            for j in 0..n {
                for i in 0..n {
                    pts.push(DVec3::new(i as f64, j as f64, k as f64));
                }
            }
        }
        pts
    }

    fn random_points(count: usize, seed: u64) -> Vec<DVec3> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut unit = || rng.next_u32() as f64 / (u32::MAX as f64 + 1.0);
        (0..count)
            .map(|_| DVec3::new(unit(), unit(), unit()))
            .collect()
    }

    #[test]
    fn single_tetrahedron() {
        let pts = vec![DVec3::ZERO, DVec3::X, DVec3::Y, DVec3::Z];
        let tets = tetrahedralize(&pts).unwrap();
        assert_eq!(tets.len(), 1);
        assert!((total_volume(&pts, &tets) - 1.0 / 6.0).abs() < 1e-15);
    }

    #[test]
    fn cube_corners_fill_the_cube() {
        let pts = lattice(2);
        let tets = tetrahedralize(&pts).unwrap();
        assert!(tets.len() >= 5);
        for t in &tets {
            assert!(tet_volume(pts[t[0]], pts[t[1]], pts[t[2]], pts[t[3]]) > 0.0);
        }
        assert!((total_volume(&pts, &tets) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cospherical_lattice_is_valid() {
        let pts = lattice(5);
        let tets = tetrahedralize(&pts).unwrap();
        for t in &tets {
            assert!(tet_volume(pts[t[0]], pts[t[1]], pts[t[2]], pts[t[3]]) > 0.0);
        }
        assert!((total_volume(&pts, &tets) - 64.0).abs() < 1e-9);

        let mut used = vec![false; pts.len()];
        tets.iter().flatten().for_each(|&v| used[v] = true);
        assert!(used.iter().all(|&u| u));
    }

    #[test]
    fn random_points_satisfy_empty_sphere() {
        let pts = random_points(200, 7);
        let tets = tetrahedralize(&pts).unwrap();
        for t in &tets {
            let (center, r2) =
                circumsphere(pts[t[0]], pts[t[1]], pts[t[2]], pts[t[3]]).expect("proper tet");
            for (i, p) in pts.iter().enumerate() {
                if t.contains(&i) {
                    continue;
                }
                assert!((*p - center).length_squared() >= r2 * (1.0 - 1e-9));
            }
        }
    }

    #[test]
    fn adjacency_is_symmetric_after_insertion() {
        let pts = random_points(300, 11);
        let mut tri = Triangulator::new(&pts).unwrap();
        for &pi in &insertion_order(&pts) {
            tri.insert(pi);
        }
        assert!(tri.open_edges.is_empty());
        for (t, tet) in tri.tets.iter().enumerate().filter(|(_, t)| t.alive) {
            for face in 0..4 {
                let nb = tet.n[face];
                if nb == NONE {
                    continue;
                }
                let other = &tri.tets[nb];
                assert!(other.alive);
                assert!(other.n.contains(&t));
                let shared = tet.v.iter().filter(|v| other.v.contains(v)).count();
                assert_eq!(shared, 3);
                assert!(!other.v.contains(&tet.v[face]));
            }
        }
    }

    #[test]
    fn duplicates_are_skipped() {
        let mut pts = lattice(2);
        pts.push(DVec3::new(1.0, 1.0, 1.0));
        let tets = tetrahedralize(&pts).unwrap();
        assert!((total_volume(&pts, &tets) - 1.0).abs() < 1e-12);
        let refs_a = tets.iter().flatten().filter(|&&v| v == 7).count();
        let refs_b = tets.iter().flatten().filter(|&&v| v == 8).count();
        assert!(refs_a == 0 || refs_b == 0);
    }

    #[test]
    fn too_few_points_is_degenerate() {
        let pts = vec![DVec3::ZERO, DVec3::X, DVec3::Y];
        assert!(matches!(
            tetrahedralize(&pts),
            Err(Error::DegenerateDomain(_))
        ));
    }

    #[test]
    fn coplanar_points_are_degenerate() {
        let pts: Vec<DVec3> = (0..10)
            .map(|i| DVec3::new(i as f64, (i * i) as f64, 0.0))
            .collect();
        assert!(matches!(
            tetrahedralize(&pts),
            Err(Error::DegenerateDomain(_))
        ));
    }

    #[test]
    fn insertion_order_is_a_permutation() {
        let pts = random_points(100, 3);
        let mut order = insertion_order(&pts);
        order.sort_unstable();
        assert_eq!(order, (0..100).collect::<Vec<_>>());
    }
}
