//! Building a [`SizeField`] from a velocity model.
use std::path::Path;

use tracing::{debug, info, warn};

use super::grade;
use super::{SizeField, SizeFunctionConfig};
use crate::comm::{run_workers, Communicator};
use crate::error::{Error, Result};
use crate::field::{GridSpec, ScalarField};

/// Converts velocity samples into desired edge lengths.
///
/// Per sample the raw size is `v / (freq * wl)`, bounded above by `hmax` and below by `hmin`,
/// raised to satisfy the Courant condition when a time step is configured, and finally
/// gradient limited. The build is deterministic and independent of the worker count.
#[derive(Clone, Debug)]
pub struct SizeFunctionBuilder {
    config: SizeFunctionConfig,
}

impl SizeFunctionBuilder {
    pub fn new(config: SizeFunctionConfig) -> Self {
        Self { config }
    }

    /// Creates a builder, validating `config` up front.
    pub fn try_new(config: SizeFunctionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SizeFunctionConfig {
        &self.config
    }

    /// Loads the velocity model at `path` using the configured box, dims and byte order.
    pub fn build_from_file(&self, path: impl AsRef<Path>) -> Result<SizeField> {
        self.config.validate()?;
        let field = ScalarField::load(
            path,
            self.config.bbox,
            self.config.dims,
            self.config.byte_order,
        )?;
        self.build(&field)
    }

    /// Builds the size field on the grid of `velocity`.
    pub fn build(&self, velocity: &ScalarField) -> Result<SizeField> {
        let cfg = &self.config;
        cfg.validate()?;
        let grid = velocity.grid().clone();

        let mut sizes = Vec::with_capacity(grid.len());
        for (idx, &v) in velocity.values().iter().enumerate() {
            if !(v > 0.0 && v.is_finite()) {
                let [i, j, k] = grid.coords(idx);
                return Err(Error::DegenerateDomain(format!(
                    "velocity {v} at sample ({i}, {j}, {k}) yields a non-positive size"
                )));
            }
            let mut h = v / (cfg.freq * cfg.wl);
            if let Some(hmax) = cfg.hmax {
                h = h.min(hmax);
            }
            h = h.max(cfg.hmin);
            if let Some(dt) = cfg.dt {
                h = h.max(dt * v / cfg.cr_max);
            }
            sizes.push(h);
        }

        if cfg.grade > 0.0 {
            let workers = cfg.workers.min(grid.counts[2]);
            let rounds = if workers <= 1 {
                grade::limit_gradient(&mut sizes, grid.counts, grid.spacing, cfg.grade)
            } else {
                let (graded, rounds) = grade_in_parallel(&grid, &sizes, cfg.grade, workers)?;
                sizes = graded;
                rounds
            };
            debug!(
                "Gradient limiting converged after {rounds} rounds on {workers} workers, residual {:.2e}.",
                grade::max_violation(&sizes, grid.counts, grid.spacing, cfg.grade)
            );
        }

        if let Some(dt) = cfg.dt {
            let violations = velocity
                .values()
                .iter()
                .zip(&sizes)
                .filter(|&(&v, &h)| dt * v / h > cfg.cr_max * (1.0 + 1e-9))
                .count();
            if violations > 0 {
                warn!(
                    "{violations} samples violate the Courant limit {} after gradient limiting.",
                    cfg.cr_max
                );
            }
        }

        let field = SizeField::from_parts(grid, sizes, cfg.hmin, cfg.grade);
        info!(
            "Built size function on {:?} samples: h in [{:.3}, {:.3}], grade {}.",
            field.grid().counts,
            field.min_value(),
            field.max_value(),
            cfg.grade
        );
        Ok(field)
    }
}

/// Splits the grid into slabs of planes along coordinate 2 and limits each slab on its own
/// worker, exchanging one halo plane per neighbour after every sweep.
fn grade_in_parallel(
    grid: &GridSpec,
    sizes: &[f64],
    grade: f64,
    workers: usize,
) -> Result<(Vec<f64>, usize)> {
    run_workers(
        workers,
        |comm| {
            let (own, rounds) = grade_slab(&comm, grid, sizes, grade)?;
            let parts = comm
                .gather(0, own)?
                .ok_or_else(|| Error::Communication("root gathered no slabs".into()))?;
            Ok((parts.concat(), rounds))
        },
        |comm| {
            let (own, _) = grade_slab(&comm, grid, sizes, grade)?;
            comm.gather(0, own)?;
            Ok(())
        },
    )
}

/// Planes `[k0, k1)` owned by `rank`.
fn plane_range(rank: usize, size: usize, planes: usize) -> (usize, usize) {
    (rank * planes / size, (rank + 1) * planes / size)
}

fn grade_slab(
    comm: &Communicator,
    grid: &GridSpec,
    sizes: &[f64],
    grade: f64,
) -> Result<(Vec<f64>, usize)> {
    let (rank, size) = (comm.rank(), comm.size());
    let n2 = grid.counts[2];
    let plane = grid.plane_len();
    let (k0, k1) = plane_range(rank, size, n2);
    let lo = k0.saturating_sub(1);
    let hi = (k1 + 1).min(n2);

    let mut local = sizes[lo * plane..hi * plane].to_vec();
    let counts = [grid.counts[0], grid.counts[1], hi - lo];
    let owned = (k0 - lo)..(k1 - lo);

    let mut neighbours = Vec::with_capacity(2);
    if k0 > 0 {
        neighbours.push(rank - 1);
    }
    if k1 < n2 {
        neighbours.push(rank + 1);
    }

    let mut rounds = 0;
    loop {
        rounds += 1;
        let changed = grade::sweep(&mut local, counts, grid.spacing, grade, owned.clone());

        let outgoing = neighbours
            .iter()
            .map(|&nb| {
                let k = if nb < rank { owned.start } else { owned.end - 1 };
                (nb, local[k * plane..(k + 1) * plane].to_vec())
            })
            .collect();
        for (src, halo) in comm.exchange::<Vec<f64>>(outgoing, &neighbours)? {
            let k = if src < rank { 0 } else { counts[2] - 1 };
            local[k * plane..(k + 1) * plane].copy_from_slice(&halo);
        }

        if comm.all_reduce_sum_usize(usize::from(changed))? == 0 {
            break;
        }
    }

    Ok((local[owned.start * plane..owned.end * plane].to_vec(), rounds))
}
