//! Size functions: desired local edge length derived from a velocity model.
//!
//! [`SizeFunctionConfig`] holds the physical parameters, [`SizeFunctionBuilder`] turns a
//! [`crate::field::ScalarField`] into an immutable [`SizeField`] queried by the mesher.
use glam::DVec3;

use crate::error::{Error, Result};
use crate::field::{BoundingBox, ByteOrder, GridDims, GridSpec};

mod builder;
pub(crate) mod grade;

pub use builder::SizeFunctionBuilder;

/// Parameters of a size-function build.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SizeFunctionConfig {
    /// Domain covered by the velocity model.
    pub bbox: BoundingBox,
    /// Sample counts of the velocity model file.
    pub dims: GridDims,
    /// Byte order of the velocity model file.
    pub byte_order: ByteOrder,
    /// Maximum change of edge length per unit distance. `0` disables gradient limiting.
    pub grade: f64,
    /// Characteristic frequency of the simulated wavefield.
    pub freq: f64,
    /// Number of elements per wavelength.
    pub wl: f64,
    /// Minimum element size.
    pub hmin: f64,
    /// Optional maximum element size.
    pub hmax: Option<f64>,
    /// Optional simulation time step enforcing the Courant condition.
    pub dt: Option<f64>,
    /// Maximum Courant number allowed when `dt` is set.
    pub cr_max: f64,
    /// Worker threads used for gradient limiting.
    pub workers: usize,
}

impl Default for SizeFunctionConfig {
    fn default() -> Self {
        Self {
            bbox: BoundingBox::new(DVec3::ZERO, DVec3::ONE),
            dims: GridDims::new(2, 2, 2),
            byte_order: ByteOrder::Little,
            grade: 0.0,
            freq: 2.0,
            wl: 10.0,
            hmin: 100.0,
            hmax: None,
            dt: None,
            cr_max: 1.0,
            workers: 1,
        }
    }
}

impl SizeFunctionConfig {
    /// Creates a configuration for a velocity model covering `bbox` with `dims` samples.
    pub fn new(bbox: BoundingBox, dims: GridDims) -> Self {
        Self {
            bbox,
            dims,
            ..Default::default()
        }
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_grade(mut self, grade: f64) -> Self {
        self.grade = grade;
        self
    }

    pub fn with_freq(mut self, freq: f64) -> Self {
        self.freq = freq;
        self
    }

    pub fn with_wl(mut self, wl: f64) -> Self {
        self.wl = wl;
        self
    }

    pub fn with_hmin(mut self, hmin: f64) -> Self {
        self.hmin = hmin;
        self
    }

    pub fn with_hmax(mut self, hmax: f64) -> Self {
        self.hmax = Some(hmax);
        self
    }

    /// Enforces `dt * v / h <= cr_max` on the built sizes.
    pub fn with_cfl(mut self, dt: f64, cr_max: f64) -> Self {
        self.dt = Some(dt);
        self.cr_max = cr_max;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Validates the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.bbox.validate()?;
        GridSpec::new(self.bbox, self.dims)?;
        if !(self.hmin > 0.0 && self.hmin.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "hmin must be > 0, got {}",
                self.hmin
            )));
        }
        if !(self.grade >= 0.0 && self.grade.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "grade must be >= 0, got {}",
                self.grade
            )));
        }
        if !(self.freq > 0.0 && self.freq.is_finite()) {
            return Err(Error::InvalidConfig("freq must be > 0".into()));
        }
        if !(self.wl > 0.0 && self.wl.is_finite()) {
            return Err(Error::InvalidConfig("wl must be > 0".into()));
        }
        if let Some(hmax) = self.hmax {
            if !(hmax >= self.hmin) {
                return Err(Error::InvalidConfig(format!(
                    "hmax ({hmax}) must be >= hmin ({})",
                    self.hmin
                )));
            }
        }
        if let Some(dt) = self.dt {
            if !(dt > 0.0 && dt.is_finite()) {
                return Err(Error::InvalidConfig("dt must be > 0".into()));
            }
            if !(self.cr_max > 0.0 && self.cr_max.is_finite()) {
                return Err(Error::InvalidConfig("cr_max must be > 0".into()));
            }
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be > 0".into()));
        }
        Ok(())
    }
}

/// Desired local edge length over a box, sampled on a regular grid.
///
/// Every sample is at least [`SizeField::hmin`], and axis-adjacent samples differ by at most
/// the grading rate times their distance. Lookups interpolate trilinearly and clamp outside
/// the box.
#[derive(Clone, Debug)]
pub struct SizeField {
    grid: GridSpec,
    values: Vec<f64>,
    hmin: f64,
    grade: f64,
}

impl SizeField {
    pub(crate) fn from_parts(grid: GridSpec, values: Vec<f64>, hmin: f64, grade: f64) -> Self {
        debug_assert_eq!(grid.len(), values.len());
        Self {
            grid,
            values,
            hmin,
            grade,
        }
    }

    /// A constant size `h` over `bbox`.
    pub fn uniform(bbox: BoundingBox, h: f64) -> Result<Self> {
        if !(h > 0.0 && h.is_finite()) {
            return Err(Error::InvalidConfig(format!("size must be > 0, got {h}")));
        }
        let grid = GridSpec::from_counts(bbox, [2, 2, 2])?;
        let values = vec![h; grid.len()];
        Ok(Self::from_parts(grid, values, h, 0.0))
    }

    /// Desired edge length at `p`.
    #[inline]
    pub fn eval(&self, p: DVec3) -> f64 {
        self.grid.interpolate(&self.values, p)
    }

    pub fn eval_many(&self, points: &[DVec3]) -> Vec<f64> {
        points.iter().map(|&p| self.eval(p)).collect()
    }

    /// The configured minimum element size.
    pub fn hmin(&self) -> f64 {
        self.hmin
    }

    /// The grading rate the field was limited with.
    pub fn grade(&self) -> f64 {
        self.grade
    }

    pub fn min_value(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max_value(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.grid.bbox
    }

    /// Raw samples in grid order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}
