//! Geometry utilities: signed simplex volumes, dihedral angles, circumspheres and cell quality.
//!
//! Everything here is a pure function of vertex coordinates.
use glam::{DVec2, DVec3};

pub mod sdf;

/// Six times the signed volume of tetrahedron `(a, b, c, d)`.
///
/// Positive when `d` lies on the side of plane `(a, b, c)` that makes the vertex order
/// right-handed.
#[inline]
pub fn orient3d(a: DVec3, b: DVec3, c: DVec3, d: DVec3) -> f64 {
    (b - a).dot((c - a).cross(d - a))
}

/// Signed volume of tetrahedron `(a, b, c, d)`.
#[inline]
pub fn tet_volume(a: DVec3, b: DVec3, c: DVec3, d: DVec3) -> f64 {
    orient3d(a, b, c, d) / 6.0
}

/// Signed area of triangle `(a, b, c)`, positive for counter-clockwise order.
#[inline]
pub fn triangle_area(a: DVec2, b: DVec2, c: DVec2) -> f64 {
    0.5 * (b - a).perp_dot(c - a)
}

#[inline]
pub fn tet_centroid(a: DVec3, b: DVec3, c: DVec3, d: DVec3) -> DVec3 {
    (a + b + c + d) * 0.25
}

/// Circumcenter and squared circumradius of tetrahedron `(a, b, c, d)`.
///
/// Returns `None` for flat tetrahedra.
pub fn circumsphere(a: DVec3, b: DVec3, c: DVec3, d: DVec3) -> Option<(DVec3, f64)> {
    let (ba, ca, da) = (b - a, c - a, d - a);
    let det = ba.dot(ca.cross(da));
    if det == 0.0 || !det.is_finite() {
        return None;
    }
    let offset = (ca.cross(da) * ba.length_squared()
        + da.cross(ba) * ca.length_squared()
        + ba.cross(ca) * da.length_squared())
        / (2.0 * det);
    let center = a + offset;
    center
        .is_finite()
        .then(|| (center, offset.length_squared()))
}

/// The six interior dihedral angles of a tetrahedron, in degrees.
///
/// Angles are ordered by edge: `01, 02, 03, 12, 13, 23`. Degenerate edges yield `0`.
pub fn dihedral_angles(a: DVec3, b: DVec3, c: DVec3, d: DVec3) -> [f64; 6] {
    let p = [a, b, c, d];
    const EDGES: [(usize, usize, usize, usize); 6] = [
        (0, 1, 2, 3),
        (0, 2, 1, 3),
        (0, 3, 1, 2),
        (1, 2, 0, 3),
        (1, 3, 0, 2),
        (2, 3, 0, 1),
    ];
    EDGES.map(|(i, j, k, l)| {
        let Some(e) = (p[j] - p[i]).try_normalize() else {
            return 0.0;
        };
        let u = p[k] - p[i];
        let v = p[l] - p[i];
        let u = u - e * u.dot(e);
        let v = v - e * v.dot(e);
        let denom = u.length() * v.length();
        if denom == 0.0 {
            return 0.0;
        }
        (u.dot(v) / denom).clamp(-1.0, 1.0).acos().to_degrees()
    })
}

/// Normalised radius ratio `3 r_in / r_circ`: `1` for the regular tetrahedron, `0` when flat.
pub fn radius_ratio(a: DVec3, b: DVec3, c: DVec3, d: DVec3) -> f64 {
    let Some((_, r2)) = circumsphere(a, b, c, d) else {
        return 0.0;
    };
    let face = |p: DVec3, q: DVec3, r: DVec3| 0.5 * (q - p).cross(r - p).length();
    let area = face(b, c, d) + face(a, c, d) + face(a, b, d) + face(a, b, c);
    if area == 0.0 {
        return 0.0;
    }
    let inradius = 3.0 * tet_volume(a, b, c, d).abs() / area;
    3.0 * inradius / r2.sqrt()
}

/// A mesh cell made of point indices.
pub trait Simplex {
    /// Coordinate type of the points the indices refer to.
    type Point: Copy;

    /// Signed volume (area in 2D) of the cell.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of bounds for `points`.
    fn signed_volume(&self, points: &[Self::Point]) -> f64;
}

impl Simplex for [usize; 4] {
    type Point = DVec3;

    fn signed_volume(&self, points: &[DVec3]) -> f64 {
        tet_volume(
            points[self[0]],
            points[self[1]],
            points[self[2]],
            points[self[3]],
        )
    }
}

impl Simplex for [usize; 3] {
    type Point = DVec2;

    fn signed_volume(&self, points: &[DVec2]) -> f64 {
        triangle_area(points[self[0]], points[self[1]], points[self[2]])
    }
}

/// Signed volume of every cell, in cell order. The sign gives the orientation.
pub fn volume<S: Simplex>(points: &[S::Point], cells: &[S]) -> Vec<f64> {
    cells.iter().map(|cell| cell.signed_volume(points)).collect()
}
