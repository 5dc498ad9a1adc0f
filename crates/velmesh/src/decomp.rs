//! Slab domain decomposition.
//!
//! The bounding box is cut into [`SlabDecomposition::workers`] slabs perpendicular to one
//! [`Axis`]. Worker `w` owns the half-open interval `[cut[w], cut[w + 1])` along that axis
//! (the last slab is closed), so ownership depends on a single coordinate and neighbours are
//! simply `w - 1` and `w + 1`.
use glam::DVec3;

use crate::error::{Error, Result};
use crate::field::BoundingBox;
use crate::geometry::circumsphere;

/// A coordinate axis of a point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    /// Coordinate 0 (depth for velocity models).
    #[default]
    X,
    /// Coordinate 1.
    Y,
    /// Coordinate 2.
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// The two axes perpendicular to this one, in increasing order.
    pub fn others(self) -> [Axis; 2] {
        match self {
            Axis::X => [Axis::Y, Axis::Z],
            Axis::Y => [Axis::X, Axis::Z],
            Axis::Z => [Axis::X, Axis::Y],
        }
    }

    /// Component of `p` along this axis.
    #[inline]
    pub fn of(self, p: DVec3) -> f64 {
        p[self.index()]
    }
}

impl TryFrom<usize> for Axis {
    type Error = Error;

    fn try_from(value: usize) -> Result<Self> {
        match value {
            0 => Ok(Axis::X),
            1 => Ok(Axis::Y),
            2 => Ok(Axis::Z),
            other => Err(Error::InvalidConfig(format!(
                "axis must be 0, 1 or 2, got {other}"
            ))),
        }
    }
}

/// Partition of a bounding box into slabs along one axis.
#[derive(Clone, Debug, PartialEq)]
pub struct SlabDecomposition {
    bbox: BoundingBox,
    axis: Axis,
    /// `workers + 1` strictly increasing cut positions spanning the box.
    cuts: Vec<f64>,
}

impl SlabDecomposition {
    /// Equal-width slabs.
    pub fn uniform(bbox: BoundingBox, axis: Axis, workers: usize) -> Result<Self> {
        bbox.validate()?;
        if workers == 0 {
            return Err(Error::InvalidConfig("worker count must be > 0".into()));
        }
        let lo = axis.of(bbox.min);
        let width = axis.of(bbox.extent()) / workers as f64;
        let mut cuts: Vec<f64> = (0..=workers).map(|w| lo + w as f64 * width).collect();
        cuts[workers] = axis.of(bbox.max);
        Ok(Self { bbox, axis, cuts })
    }

    /// Slabs holding roughly equal numbers of `points`.
    ///
    /// Falls back to [`SlabDecomposition::uniform`] when the points cannot produce strictly
    /// increasing cuts (too few points, or many sharing one coordinate).
    pub fn balanced(
        bbox: BoundingBox,
        axis: Axis,
        workers: usize,
        points: &[DVec3],
    ) -> Result<Self> {
        let uniform = Self::uniform(bbox, axis, workers)?;
        if workers == 1 || points.len() < 2 * workers {
            return Ok(uniform);
        }

        let mut coords: Vec<f64> = points.iter().map(|&p| axis.of(p)).collect();
        coords.sort_unstable_by(f64::total_cmp);

        let mut cuts = Vec::with_capacity(workers + 1);
        cuts.push(axis.of(bbox.min));
        for w in 1..workers {
            let at = w * coords.len() / workers;
            cuts.push(0.5 * (coords[at - 1] + coords[at]));
        }
        cuts.push(axis.of(bbox.max));

        if cuts.windows(2).all(|pair| pair[0] < pair[1]) {
            Ok(Self { bbox, axis, cuts })
        } else {
            Ok(uniform)
        }
    }

    pub fn workers(&self) -> usize {
        self.cuts.len() - 1
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// Interval `(lo, hi)` owned by `worker` along the decomposition axis.
    pub fn region(&self, worker: usize) -> (f64, f64) {
        (self.cuts[worker], self.cuts[worker + 1])
    }

    /// The worker owning `p`. Points beyond the box are assigned to the nearest end slab.
    pub fn owner_of(&self, p: DVec3) -> usize {
        let c = self.axis.of(p);
        let interior = &self.cuts[1..self.cuts.len() - 1];
        interior.partition_point(|&cut| cut <= c)
    }

    /// Workers sharing a slab face with `worker`.
    pub fn neighbors_of(&self, worker: usize) -> Vec<usize> {
        let mut out = Vec::with_capacity(2);
        if worker > 0 {
            out.push(worker - 1);
        }
        if worker + 1 < self.workers() {
            out.push(worker + 1);
        }
        out
    }

    /// Returns `true` when the ball `(center, radius)` reaches into the slab of `worker`.
    pub fn ball_touches(&self, worker: usize, center: DVec3, radius: f64) -> bool {
        let (lo, hi) = self.region(worker);
        let c = self.axis.of(center);
        c + radius >= lo && c - radius <= hi
    }

    /// Selects which of `points` (owned by `worker`) must be copied to which neighbour.
    ///
    /// A point is exported to a neighbour when the circumsphere of any tetrahedron incident to
    /// it, grown by `margin` evaluated at the tetrahedron centroid, reaches into that
    /// neighbour's slab. Returns `(neighbour, point indices)` pairs, one per neighbour, each
    /// sorted and free of duplicates.
    pub fn halo_exports(
        &self,
        worker: usize,
        points: &[DVec3],
        tets: &[[usize; 4]],
        margin: impl Fn(DVec3) -> f64,
    ) -> Vec<(usize, Vec<usize>)> {
        let neighbors = self.neighbors_of(worker);
        let mut marks = vec![vec![false; points.len()]; neighbors.len()];

        if tets.is_empty() {
            // Too few points to triangulate: neighbours need all of them.
            for m in marks.iter_mut() {
                m.iter_mut().for_each(|flag| *flag = true);
            }
        }

        for tet in tets {
            let [a, b, c, d] = tet.map(|i| points[i]);
            let Some((center, radius_sq)) = circumsphere(a, b, c, d) else {
                continue;
            };
            let radius = radius_sq.sqrt() + margin((a + b + c + d) * 0.25);
            for (slot, &nb) in neighbors.iter().enumerate() {
                if self.ball_touches(nb, center, radius) {
                    for &v in tet {
                        marks[slot][v] = true;
                    }
                }
            }
        }

        neighbors
            .into_iter()
            .zip(marks)
            .map(|(nb, m)| {
                let idx = m
                    .iter()
                    .enumerate()
                    .filter_map(|(i, &flag)| flag.then_some(i))
                    .collect();
                (nb, idx)
            })
            .collect()
    }
}
