//! Regular sample grids over axis-aligned boxes.
//!
//! This module defines [`BoundingBox`], [`GridDims`] and [`GridSpec`]. Grids are node-centred:
//! the first and last samples along every axis sit on the box faces, so the spacing along axis
//! `i` is `extent_i / (n_i - 1)`.
//!
//! Coordinate 0 is depth and is sampled by `nz`; coordinates 1 and 2 are sampled by `nx` and
//! `ny`. Linear sample indices vary fastest along coordinate 0.
use glam::DVec3;

use crate::error::{Error, Result};

/// Axis-aligned box given by two opposite corners.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    /// Corner with the smallest coordinates.
    pub min: DVec3,
    /// Corner with the largest coordinates.
    pub max: DVec3,
}

impl BoundingBox {
    /// Creates a box from two opposite corners. The corners may be given in any order.
    pub fn new(a: impl Into<DVec3>, b: impl Into<DVec3>) -> Self {
        let (a, b) = (a.into(), b.into());
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Creates a box from interleaved extents `(min0, max0, min1, max1, min2, max2)`.
    pub fn from_extents(extents: [f64; 6]) -> Self {
        Self::new(
            DVec3::new(extents[0], extents[2], extents[4]),
            DVec3::new(extents[1], extents[3], extents[5]),
        )
    }

    /// Size of the box along every axis.
    pub fn extent(&self) -> DVec3 {
        self.max - self.min
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn volume(&self) -> f64 {
        let e = self.extent();
        e.x * e.y * e.z
    }

    /// Returns `true` when `p` lies inside or on the boundary of the box.
    pub fn contains(&self, p: DVec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Clamps `p` onto the closed box.
    pub fn clamp(&self, p: DVec3) -> DVec3 {
        p.clamp(self.min, self.max)
    }

    /// The eight corners of the box.
    pub fn corners(&self) -> [DVec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            DVec3::new(lo.x, lo.y, lo.z),
            DVec3::new(hi.x, lo.y, lo.z),
            DVec3::new(lo.x, hi.y, lo.z),
            DVec3::new(hi.x, hi.y, lo.z),
            DVec3::new(lo.x, lo.y, hi.z),
            DVec3::new(hi.x, lo.y, hi.z),
            DVec3::new(lo.x, hi.y, hi.z),
            DVec3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// Validates that the box is finite with a strictly positive extent along every axis.
    pub fn validate(&self) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(Error::InvalidConfig(
                "bounding box must have finite corners".into(),
            ));
        }
        let e = self.extent();
        if e.x <= 0.0 || e.y <= 0.0 || e.z <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "bounding box must have positive extent along every axis, got {e}"
            )));
        }
        Ok(())
    }
}

/// Sample counts of a velocity model, named after the seismic axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridDims {
    /// Samples along coordinate 1.
    pub nx: usize,
    /// Samples along coordinate 2.
    pub ny: usize,
    /// Samples along coordinate 0 (depth).
    pub nz: usize,
}

impl GridDims {
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self { nx, ny, nz }
    }

    /// Sample counts ordered by coordinate index.
    pub fn counts(&self) -> [usize; 3] {
        [self.nz, self.nx, self.ny]
    }

    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A node-centred sample grid over a bounding box.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridSpec {
    /// Box spanned by the samples.
    pub bbox: BoundingBox,
    /// Number of samples along each coordinate.
    pub counts: [usize; 3],
    /// Distance between neighbouring samples along each coordinate.
    pub spacing: DVec3,
}

impl GridSpec {
    /// Creates a grid over `bbox` with the given seismic sample counts.
    pub fn new(bbox: BoundingBox, dims: GridDims) -> Result<Self> {
        Self::from_counts(bbox, dims.counts())
    }

    /// Creates a grid over `bbox` with sample counts ordered by coordinate index.
    pub fn from_counts(bbox: BoundingBox, counts: [usize; 3]) -> Result<Self> {
        bbox.validate()?;
        if counts.iter().any(|&n| n < 2) {
            return Err(Error::InvalidConfig(format!(
                "grid needs at least two samples per axis, got {counts:?}"
            )));
        }
        let e = bbox.extent();
        let spacing = DVec3::new(
            e.x / (counts[0] - 1) as f64,
            e.y / (counts[1] - 1) as f64,
            e.z / (counts[2] - 1) as f64,
        );
        Ok(Self {
            bbox,
            counts,
            spacing,
        })
    }

    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.counts[0] * self.counts[1] * self.counts[2]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of samples in one plane of constant coordinate 2.
    pub fn plane_len(&self) -> usize {
        self.counts[0] * self.counts[1]
    }

    /// Linear index of sample `(i, j, k)`.
    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.counts[0] * (j + self.counts[1] * k)
    }

    /// Inverse of [`GridSpec::index`].
    #[inline]
    pub fn coords(&self, idx: usize) -> [usize; 3] {
        let i = idx % self.counts[0];
        let rest = idx / self.counts[0];
        [i, rest % self.counts[1], rest / self.counts[1]]
    }

    /// World position of sample `(i, j, k)`.
    pub fn node(&self, i: usize, j: usize, k: usize) -> DVec3 {
        self.bbox.min + self.spacing * DVec3::new(i as f64, j as f64, k as f64)
    }

    /// Continuous sample coordinates of `p`, clamped to the grid.
    pub fn world_to_grid(&self, p: DVec3) -> DVec3 {
        let rel = (self.bbox.clamp(p) - self.bbox.min) / self.spacing;
        let upper = DVec3::new(
            (self.counts[0] - 1) as f64,
            (self.counts[1] - 1) as f64,
            (self.counts[2] - 1) as f64,
        );
        rel.clamp(DVec3::ZERO, upper)
    }

    /// Trilinear interpolation of `data` at `p`. Points outside the box are clamped onto it.
    pub fn interpolate(&self, data: &[f64], p: DVec3) -> f64 {
        debug_assert_eq!(data.len(), self.len());
        let g = self.world_to_grid(p);
        let base = [
            (g.x.floor() as usize).min(self.counts[0] - 2),
            (g.y.floor() as usize).min(self.counts[1] - 2),
            (g.z.floor() as usize).min(self.counts[2] - 2),
        ];
        let t = g - DVec3::new(base[0] as f64, base[1] as f64, base[2] as f64);

        let at = |di: usize, dj: usize, dk: usize| {
            data[self.index(base[0] + di, base[1] + dj, base[2] + dk)]
        };
        let lerp = |a: f64, b: f64, t: f64| a + (b - a) * t;

        let c00 = lerp(at(0, 0, 0), at(1, 0, 0), t.x);
        let c10 = lerp(at(0, 1, 0), at(1, 1, 0), t.x);
        let c01 = lerp(at(0, 0, 1), at(1, 0, 1), t.x);
        let c11 = lerp(at(0, 1, 1), at(1, 1, 1), t.x);
        let c0 = lerp(c00, c10, t.y);
        let c1 = lerp(c01, c11, t.y);
        lerp(c0, c1, t.z)
    }
}
