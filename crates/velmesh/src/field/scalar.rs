//! Immutable scalar samples on a [`GridSpec`].
use std::path::Path;

use glam::DVec3;

use super::grid::{BoundingBox, GridDims, GridSpec};
use super::loader::{self, ByteOrder};
use crate::error::{Error, Result};

/// A regular 3D grid of physical values with trilinear point lookup.
///
/// Queries outside the bounding box are clamped to the nearest boundary sample, which is the
/// usual treatment for the edges of velocity models.
#[derive(Clone, Debug)]
pub struct ScalarField {
    grid: GridSpec,
    values: Vec<f64>,
}

impl ScalarField {
    /// Wraps samples laid out as described by [`GridSpec::index`].
    pub fn from_values(grid: GridSpec, values: Vec<f64>) -> Result<Self> {
        if values.len() != grid.len() {
            return Err(Error::InvalidConfig(format!(
                "expected {} samples for grid {:?}, got {}",
                grid.len(),
                grid.counts,
                values.len()
            )));
        }
        Ok(Self { grid, values })
    }

    /// Samples `f` at every grid node.
    pub fn from_fn(grid: GridSpec, f: impl Fn(DVec3) -> f64) -> Self {
        let values = (0..grid.len())
            .map(|idx| {
                let [i, j, k] = grid.coords(idx);
                f(grid.node(i, j, k))
            })
            .collect();
        Self { grid, values }
    }

    /// Reads a flat binary file of 32-bit floats covering `bbox` with `dims` samples.
    pub fn load(
        path: impl AsRef<Path>,
        bbox: BoundingBox,
        dims: GridDims,
        byte_order: ByteOrder,
    ) -> Result<Self> {
        let grid = GridSpec::new(bbox, dims)?;
        let values = loader::read_f32_samples(path.as_ref(), grid.len(), byte_order)?;
        Self::from_values(grid, values)
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

    /// Sample at grid node `(i, j, k)`.
    pub fn at(&self, i: usize, j: usize, k: usize) -> f64 {
        self.values[self.grid.index(i, j, k)]
    }

    /// Trilinearly interpolated value at `p`, clamped to the grid.
    pub fn sample(&self, p: DVec3) -> f64 {
        self.grid.interpolate(&self.values, p)
    }

    pub fn min(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}
