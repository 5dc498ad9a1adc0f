//! Signed-distance descriptions of the meshing domain.
//!
//! Distances are negative inside the domain, zero on its boundary and positive outside.
use glam::DVec3;

use crate::field::BoundingBox;

/// A domain described by its signed distance function.
pub trait SignedDistance: Send + Sync {
    /// Signed distance from `p` to the domain boundary.
    fn distance(&self, p: DVec3) -> f64;

    /// A box enclosing the domain.
    fn bounds(&self) -> BoundingBox;

    /// Moves `p` back onto the boundary if it lies outside.
    ///
    /// Uses one Newton step along the finite-difference gradient of the distance, with
    /// difference step `deps`.
    fn project(&self, p: DVec3, deps: f64) -> DVec3 {
        let d = self.distance(p);
        if d <= 0.0 {
            return p;
        }
        let grad = DVec3::new(
            (self.distance(p + DVec3::X * deps) - d) / deps,
            (self.distance(p + DVec3::Y * deps) - d) / deps,
            (self.distance(p + DVec3::Z * deps) - d) / deps,
        );
        let g2 = grad.length_squared();
        if g2 == 0.0 || !g2.is_finite() {
            return self.bounds().clamp(p);
        }
        p - grad * (d / g2)
    }
}

/// An axis-aligned box domain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cuboid {
    pub bbox: BoundingBox,
}

impl Cuboid {
    pub fn new(bbox: BoundingBox) -> Self {
        Self { bbox }
    }
}

impl SignedDistance for Cuboid {
    fn distance(&self, p: DVec3) -> f64 {
        let half = self.bbox.extent() * 0.5;
        let q = (p - self.bbox.center()).abs() - half;
        q.max(DVec3::ZERO).length() + q.max_element().min(0.0)
    }

    fn bounds(&self) -> BoundingBox {
        self.bbox
    }
}
