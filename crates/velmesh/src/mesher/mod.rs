//! Force-equilibrium tetrahedral mesh generation.
//!
//! [`MeshGenerator`] relaxes a point set towards the bar lengths requested by a
//! [`SizeField`]: every iteration re-triangulates, pushes apart points joined by bars shorter
//! than desired, projects escaped points back onto the domain and migrates points between
//! workers. The point set is split into slabs, one per worker thread; workers exchange halo
//! copies of their boundary points so that local triangulations agree across slab faces.
//!
//! A second call with [`BuildOptions::mesh_improvement`] restarts from a finished mesh,
//! perturbs sliver cells and removes nearly flat cells from the result.
use glam::DVec3;
use mint::Vector3;
use tracing::{debug, info};

use crate::comm::run_workers;
use crate::decomp::{Axis, SlabDecomposition};
use crate::delaunay::tetrahedralize;
use crate::error::{Error, Result};
use crate::geometry::sdf::{Cuboid, SignedDistance};
use crate::geometry::{tet_centroid, tet_volume};
use crate::sizing::SizeField;

mod arena;
pub mod events;
mod forces;
mod improve;
pub mod seed;
mod worker;

pub use arena::PointId;

use events::{EventSink, MeshEvent, MeshEventKind};
use worker::Context;

/// Tuning of the relaxation. The defaults follow DistMesh for three dimensions.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeneratorConfig {
    /// Worker threads, one slab each.
    pub workers: usize,
    /// Pseudo time step applied to the net force.
    pub deltat: f64,
    /// Internal pressure: desired bar lengths are scaled by this factor.
    pub fscale: f64,
    /// Boundary tolerance as a fraction of `hmin`.
    pub geps_factor: f64,
    /// Finite-difference step of the distance gradient as a fraction of `hmin`.
    pub deps_factor: f64,
    /// Relaxation stops once no point moves more than `dptol * h` in an iteration.
    pub dptol: f64,
    /// Iterations between density corrections. `0` disables density control.
    pub density_interval: usize,
    /// Bars shorter than `collapse_ratio * L0` lose an endpoint.
    pub collapse_ratio: f64,
    /// Bars longer than `split_ratio * h(mid)` gain a midpoint.
    pub split_ratio: f64,
    /// Cells with a smaller dihedral angle, in degrees, are slivers.
    pub min_dihedral: f64,
    /// Cells with a larger dihedral angle, in degrees, are slivers.
    pub max_dihedral: f64,
    /// Sliver vertex push as a fraction of the local size.
    pub sliver_push: f64,
    /// Factor applied to the sliver push after every improvement iteration, in `(0, 1]`.
    pub sliver_decay: f64,
    /// Improvement builds drop cells with `|volume| <= degenerate_tol * h^3`.
    pub degenerate_tol: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            deltat: 0.1,
            fscale: 1.1,
            geps_factor: 0.1,
            deps_factor: f64::EPSILON.sqrt(),
            dptol: 1e-3,
            density_interval: 10,
            collapse_ratio: 0.5,
            split_ratio: 2.0,
            min_dihedral: 10.0,
            max_dihedral: 170.0,
            sliver_push: 0.05,
            sliver_decay: 0.5,
            degenerate_tol: 1e-6,
        }
    }
}

impl GeneratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_deltat(mut self, deltat: f64) -> Self {
        self.deltat = deltat;
        self
    }

    pub fn with_fscale(mut self, fscale: f64) -> Self {
        self.fscale = fscale;
        self
    }

    pub fn with_dptol(mut self, dptol: f64) -> Self {
        self.dptol = dptol;
        self
    }

    pub fn with_density_interval(mut self, density_interval: usize) -> Self {
        self.density_interval = density_interval;
        self
    }

    /// Sets the dihedral angle bounds, in degrees, outside which a cell is a sliver.
    pub fn with_dihedral_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_dihedral = min;
        self.max_dihedral = max;
        self
    }

    pub fn with_sliver_push(mut self, sliver_push: f64) -> Self {
        self.sliver_push = sliver_push;
        self
    }

    pub fn with_sliver_decay(mut self, sliver_decay: f64) -> Self {
        self.sliver_decay = sliver_decay;
        self
    }

    pub fn with_degenerate_tol(mut self, degenerate_tol: f64) -> Self {
        self.degenerate_tol = degenerate_tol;
        self
    }

    /// Sliver push used in improvement iteration `iteration`, as a fraction of the local size.
    pub fn sliver_push_at(&self, iteration: usize) -> f64 {
        let exponent = i32::try_from(iteration).unwrap_or(i32::MAX);
        self.sliver_push * self.sliver_decay.powi(exponent)
    }

    /// Validates the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f64| {
            if v > 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(Error::InvalidConfig(format!("{name} must be > 0, got {v}")))
            }
        };
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be > 0".into()));
        }
        positive("deltat", self.deltat)?;
        positive("geps_factor", self.geps_factor)?;
        positive("deps_factor", self.deps_factor)?;
        positive("dptol", self.dptol)?;
        if !(self.fscale >= 1.0 && self.fscale.is_finite()) {
            return Err(Error::InvalidConfig("fscale must be >= 1".into()));
        }
        if !(self.collapse_ratio > 0.0 && self.collapse_ratio < 1.0) {
            return Err(Error::InvalidConfig(
                "collapse_ratio must lie in (0, 1)".into(),
            ));
        }
        if !(self.split_ratio > 1.0 && self.split_ratio.is_finite()) {
            return Err(Error::InvalidConfig("split_ratio must be > 1".into()));
        }
        if !(0.0 <= self.min_dihedral
            && self.min_dihedral < self.max_dihedral
            && self.max_dihedral <= 180.0)
        {
            return Err(Error::InvalidConfig(format!(
                "dihedral bounds must satisfy 0 <= min < max <= 180, got [{}, {}]",
                self.min_dihedral, self.max_dihedral
            )));
        }
        if !(self.sliver_push >= 0.0 && self.degenerate_tol >= 0.0) {
            return Err(Error::InvalidConfig(
                "sliver_push and degenerate_tol must be >= 0".into(),
            ));
        }
        if !(self.sliver_decay > 0.0 && self.sliver_decay <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "sliver_decay must lie in (0, 1], got {}",
                self.sliver_decay
            )));
        }
        Ok(())
    }
}

/// Inputs of one [`MeshGenerator::build`] call.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildOptions {
    /// Iteration budget.
    pub max_iter: usize,
    /// Progress is logged every `nscreen` iterations. `0` silences it.
    pub nscreen: usize,
    /// Seed of the initial point distribution.
    pub seed: u64,
    /// Slab axis; seeding layers are stacked along it.
    pub axis: Axis,
    /// Starting points. When absent, points are seeded from the size field.
    pub points: Option<Vec<DVec3>>,
    /// Restart from `points`, perturb slivers and drop nearly flat cells.
    pub mesh_improvement: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_iter: 50,
            nscreen: 5,
            seed: 0,
            axis: Axis::X,
            points: None,
            mesh_improvement: false,
        }
    }
}

impl BuildOptions {
    pub fn new(max_iter: usize) -> Self {
        Self {
            max_iter,
            ..Default::default()
        }
    }

    /// Options for an improvement pass starting from `points`.
    pub fn improvement<I, P>(points: I, max_iter: usize) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Vector3<f64>>,
    {
        Self::new(max_iter)
            .with_points(points)
            .with_mesh_improvement(true)
    }

    pub fn with_nscreen(mut self, nscreen: usize) -> Self {
        self.nscreen = nscreen;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_axis(mut self, axis: Axis) -> Self {
        self.axis = axis;
        self
    }

    /// Sets the starting points. Accepts any `mint`-compatible vector, e.g. `DVec3` or `[f64; 3]`.
    pub fn with_points<I, P>(mut self, points: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Vector3<f64>>,
    {
        self.points = Some(
            points
                .into_iter()
                .map(|p| DVec3::from(p.into()))
                .collect(),
        );
        self
    }

    pub fn with_mesh_improvement(mut self, mesh_improvement: bool) -> Self {
        self.mesh_improvement = mesh_improvement;
        self
    }

    /// Validates the options, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(Error::InvalidConfig("max_iter must be > 0".into()));
        }
        if self.mesh_improvement && self.points.is_none() {
            return Err(Error::InvalidConfig(
                "mesh improvement needs starting points".into(),
            ));
        }
        if let Some(points) = &self.points {
            if points.iter().any(|p| !p.is_finite()) {
                return Err(Error::InvalidConfig(
                    "starting points must be finite".into(),
                ));
            }
        }
        Ok(())
    }
}

/// A finished tetrahedral mesh.
#[derive(Clone, Debug, Default)]
pub struct MeshResult {
    pub points: Vec<DVec3>,
    /// Positively oriented tetrahedra as indices into `points`.
    pub cells: Vec<[usize; 4]>,
    /// Relaxation iterations run.
    pub iterations: usize,
    /// Whether the movement tolerance was reached within the iteration budget.
    pub converged: bool,
}

impl MeshResult {
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Signed volume of every cell.
    pub fn volumes(&self) -> Vec<f64> {
        crate::geometry::volume(&self.points, &self.cells)
    }

    pub fn total_volume(&self) -> f64 {
        self.volumes().iter().sum()
    }
}

/// Parallel mesh generator over a size field and a signed-distance domain.
pub struct MeshGenerator<'a> {
    size: &'a SizeField,
    domain: Box<dyn SignedDistance + 'a>,
    config: GeneratorConfig,
}

impl<'a> MeshGenerator<'a> {
    /// Meshes the bounding box of `size` with the default configuration.
    pub fn new(size: &'a SizeField) -> Self {
        Self {
            size,
            domain: Box::new(Cuboid::new(*size.bbox())),
            config: GeneratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GeneratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Meshes `domain` instead of the size field's bounding box.
    pub fn with_domain(mut self, domain: impl SignedDistance + 'a) -> Self {
        self.domain = Box::new(domain);
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn build(&self, options: &BuildOptions) -> Result<MeshResult> {
        self.build_with_events(options, &mut ())
    }

    /// Runs a build, reporting progress to `sink`.
    pub fn build_with_events(
        &self,
        options: &BuildOptions,
        sink: &mut dyn EventSink,
    ) -> Result<MeshResult> {
        self.config.validate()?;
        options.validate()?;

        let bounds = self.domain.bounds();
        if !(bounds.volume() > 0.0 && bounds.volume().is_finite()) {
            return Err(Error::DegenerateDomain(format!(
                "domain bounds {:?}..{:?} enclose no volume",
                bounds.min, bounds.max
            )));
        }
        let min_size = self.size.min_value();
        if !(min_size > 0.0 && min_size.is_finite()) {
            return Err(Error::DegenerateDomain(format!(
                "size field has non-positive value {min_size}"
            )));
        }

        let hmin = self.size.hmin();
        let workers = self.effective_workers(options.axis, bounds.extent());
        let decomp = match &options.points {
            Some(points) if options.mesh_improvement => {
                SlabDecomposition::balanced(bounds, options.axis, workers, points)?
            }
            _ => SlabDecomposition::uniform(bounds, options.axis, workers)?,
        };

        let ctx = Context {
            size: self.size,
            domain: self.domain.as_ref(),
            config: &self.config,
            options,
            decomp: &decomp,
            geps: self.config.geps_factor * hmin,
            deps: self.config.deps_factor * hmin,
        };

        let relaxed = run_workers(
            workers,
            |comm| {
                worker::run(&comm, &ctx, &mut *sink)?.ok_or_else(|| {
                    Error::Communication("coordinating worker gathered no points".into())
                })
            },
            |comm| worker::run(&comm, &ctx, &mut ()).map(|_| ()),
        )?;

        let (points, cells) = self.assemble(&ctx, relaxed.records)?;
        let result = MeshResult {
            points,
            cells,
            iterations: relaxed.iterations,
            converged: relaxed.converged,
        };
        info!(
            "Mesh finished: {} points, {} cells after {} iterations.",
            result.point_count(),
            result.cell_count(),
            result.iterations
        );
        if sink.wants(MeshEventKind::BuildFinished) {
            sink.send(MeshEvent::BuildFinished {
                points: result.point_count(),
                cells: result.cell_count(),
                iterations: result.iterations,
                converged: result.converged,
            });
        }
        Ok(result)
    }

    /// Caps the worker count so that every slab stays at least two maximum sizes thick.
    fn effective_workers(&self, axis: Axis, extent: DVec3) -> usize {
        let thickest = (axis.of(extent) / (2.0 * self.size.max_value())).floor();
        let cap = if thickest.is_finite() && thickest >= 1.0 {
            thickest as usize
        } else {
            1
        };
        let workers = self.config.workers.min(cap);
        if workers < self.config.workers {
            debug!(
                "Using {workers} of {} workers: slabs would be thinner than twice the largest size.",
                self.config.workers
            );
        }
        workers
    }

    /// Global re-triangulation of the gathered points.
    fn assemble(
        &self,
        ctx: &Context<'_>,
        mut records: Vec<arena::PointRecord>,
    ) -> Result<(Vec<DVec3>, Vec<[usize; 4]>)> {
        records.sort_unstable_by_key(|r| r.id);
        let points: Vec<DVec3> = records.iter().map(|r| r.position).collect();

        let cells = tetrahedralize(&points)?;
        let mut cells = interior_cells(cells, &points, ctx.domain, ctx.geps);
        for cell in cells.iter_mut() {
            let [a, b, c, d] = cell.map(|v| points[v]);
            if tet_volume(a, b, c, d) < 0.0 {
                cell.swap(0, 1);
            }
        }
        cells.retain(|cell| {
            let [a, b, c, d] = cell.map(|v| points[v]);
            tet_volume(a, b, c, d) > 0.0
        });
        if ctx.options.mesh_improvement {
            let before = cells.len();
            cells = improve::drop_degenerate(&points, cells, self.size, self.config.degenerate_tol);
            debug!("Removed {} degenerate cells.", before - cells.len());
        }
        Ok(compact(points, cells))
    }
}

/// Keeps cells whose centroid lies deeper than `geps` inside the domain.
pub(crate) fn interior_cells(
    cells: Vec<[usize; 4]>,
    points: &[DVec3],
    domain: &dyn SignedDistance,
    geps: f64,
) -> Vec<[usize; 4]> {
    cells
        .into_iter()
        .filter(|cell| {
            let [a, b, c, d] = cell.map(|v| points[v]);
            domain.distance(tet_centroid(a, b, c, d)) < -geps
        })
        .collect()
}

/// Drops points no cell references and renumbers the cells.
fn compact(points: Vec<DVec3>, mut cells: Vec<[usize; 4]>) -> (Vec<DVec3>, Vec<[usize; 4]>) {
    const UNUSED: usize = usize::MAX;
    let mut remap = vec![UNUSED; points.len()];
    let mut kept = Vec::with_capacity(points.len());
    for cell in cells.iter_mut() {
        for v in cell.iter_mut() {
            if remap[*v] == UNUSED {
                remap[*v] = kept.len();
                kept.push(points[*v]);
            }
            *v = remap[*v];
        }
    }
    (kept, cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{BoundingBox, GridDims, GridSpec, ScalarField};
    use crate::mesher::events::VecSink;
    use crate::sizing::{SizeFunctionBuilder, SizeFunctionConfig};

    fn unit_size(h: f64) -> SizeField {
        SizeField::uniform(BoundingBox::new(DVec3::ZERO, DVec3::ONE), h).unwrap()
    }

    fn assert_valid(mesh: &MeshResult) {
        assert!(mesh.cell_count() > 0);
        for cell in &mesh.cells {
            assert!(cell.iter().all(|&v| v < mesh.point_count()));
        }
        assert!(mesh.volumes().iter().all(|&v| v > 0.0));
    }

    #[test]
    fn config_validation_rejects_bad_values() {
        assert!(GeneratorConfig::default().validate().is_ok());
        assert!(GeneratorConfig::default().with_workers(0).validate().is_err());
        assert!(GeneratorConfig::default().with_deltat(0.0).validate().is_err());
        assert!(GeneratorConfig::default().with_fscale(0.9).validate().is_err());
        assert!(GeneratorConfig::default()
            .with_dihedral_bounds(30.0, 20.0)
            .validate()
            .is_err());
        assert!(GeneratorConfig::default().with_sliver_decay(0.0).validate().is_err());
        assert!(GeneratorConfig::default().with_sliver_decay(1.5).validate().is_err());
    }

    #[test]
    fn zero_iterations_is_invalid_config() {
        let size = unit_size(0.25);
        let err = MeshGenerator::new(&size)
            .build(&BuildOptions::new(0))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn improvement_without_points_is_invalid_config() {
        let size = unit_size(0.25);
        let options = BuildOptions::new(5).with_mesh_improvement(true);
        let err = MeshGenerator::new(&size).build(&options).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn starting_points_accept_arrays() {
        let options = BuildOptions::improvement([[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]], 3);
        assert_eq!(
            options.points,
            Some(vec![DVec3::new(0.0, 1.0, 2.0), DVec3::new(3.0, 4.0, 5.0)])
        );
        let nan = BuildOptions::new(3).with_points([DVec3::new(f64::NAN, 0.0, 0.0)]);
        assert!(nan.validate().is_err());
    }

    #[test]
    fn empty_domain_is_degenerate() {
        struct Flat;
        impl SignedDistance for Flat {
            fn distance(&self, p: DVec3) -> f64 {
                p.z.abs()
            }
            fn bounds(&self) -> BoundingBox {
                BoundingBox::new(DVec3::ZERO, DVec3::new(1.0, 1.0, 0.0))
            }
        }
        let size = unit_size(0.25);
        let err = MeshGenerator::new(&size)
            .with_domain(Flat)
            .build(&BuildOptions::new(5))
            .unwrap_err();
        assert!(matches!(err, Error::DegenerateDomain(_)));
    }

    #[test]
    fn unit_cube_is_filled() {
        let size = unit_size(0.2);
        let mesh = MeshGenerator::new(&size)
            .build(&BuildOptions::new(30).with_nscreen(0))
            .unwrap();
        assert_valid(&mesh);
        assert!((mesh.total_volume() - 1.0).abs() < 0.05);
        assert!(mesh.iterations <= 30);
    }

    #[test]
    fn same_seed_gives_identical_meshes() {
        let size = unit_size(0.25);
        let generator = MeshGenerator::new(&size).with_config(GeneratorConfig::new().with_workers(2));
        let options = BuildOptions::new(15).with_seed(9).with_nscreen(0);
        let a = generator.build(&options).unwrap();
        let b = generator.build(&options).unwrap();
        assert_eq!(a.points, b.points);
        assert_eq!(a.cells, b.cells);
    }

    #[test]
    fn two_workers_fill_the_box() {
        let bbox = BoundingBox::new(DVec3::ZERO, DVec3::new(2.0, 1.0, 1.0));
        let size = SizeField::uniform(bbox, 0.2).unwrap();
        let mesh = MeshGenerator::new(&size)
            .with_config(GeneratorConfig::new().with_workers(2))
            .build(&BuildOptions::new(25).with_nscreen(0))
            .unwrap();
        assert_valid(&mesh);
        assert!((mesh.total_volume() - 2.0).abs() < 0.1);
    }

    #[test]
    fn events_trace_the_build() {
        let size = unit_size(0.25);
        let mut sink = VecSink::new();
        let mesh = MeshGenerator::new(&size)
            .build_with_events(&BuildOptions::new(8).with_nscreen(0), &mut sink)
            .unwrap();
        let events = sink.as_slice();
        assert_eq!(events[0].kind(), MeshEventKind::BuildStarted);
        assert_eq!(
            sink.count(MeshEventKind::IterationFinished),
            mesh.iterations
        );
        assert!(matches!(
            events.last(),
            Some(MeshEvent::BuildFinished { cells, .. }) if *cells == mesh.cell_count()
        ));
        let terminal = sink.count(MeshEventKind::Converged) + sink.count(MeshEventKind::Warning);
        assert_eq!(terminal, 1);
    }

    #[test]
    fn improvement_keeps_a_valid_mesh_and_settles() {
        let size = unit_size(0.25);
        let generator = MeshGenerator::new(&size);
        // Density control runs at iteration 10, leaving this mesh far from equilibrium.
        let first = generator
            .build(&BuildOptions::new(12).with_nscreen(0))
            .unwrap();

        let improved = generator
            .build(&BuildOptions::improvement(first.points.clone(), 10).with_nscreen(0))
            .unwrap();
        assert_valid(&improved);
        let tol = generator.config().degenerate_tol * 0.25f64.powi(3);
        assert!(improved.volumes().iter().all(|&v| v > tol));
        assert!((improved.total_volume() - 1.0).abs() < 0.05);
        assert!(improved.point_count() <= first.point_count());

        let again = generator
            .build(&BuildOptions::improvement(improved.points.clone(), 10).with_nscreen(0))
            .unwrap();
        assert_valid(&again);
        assert!(again.point_count() <= improved.point_count());
        let first_change = first.cell_count().abs_diff(improved.cell_count());
        let second_change = improved.cell_count().abs_diff(again.cell_count());
        assert!(
            second_change < first_change || second_change == 0,
            "cell changes {first_change} then {second_change}"
        );
    }

    #[test]
    fn compact_drops_unused_points() {
        let points = vec![DVec3::ZERO, DVec3::splat(9.0), DVec3::X, DVec3::Y, DVec3::Z];
        let (kept, cells) = compact(points, vec![[0, 2, 3, 4]]);
        assert_eq!(kept.len(), 4);
        assert_eq!(cells, vec![[0, 1, 2, 3]]);
        assert!(!kept.contains(&DVec3::splat(9.0)));
    }

    /// Velocity model of the layered test scenario: a slow near-surface layer over a
    /// gradient, with depth along coordinate 0 pointing downwards.
    fn layered_model(bbox: BoundingBox, dims: GridDims) -> ScalarField {
        let grid = GridSpec::new(bbox, dims).unwrap();
        ScalarField::from_fn(grid, |p| {
            let depth = -p.x;
            if depth < 500.0 {
                2000.0
            } else {
                2000.0 + (depth - 500.0) * 4.0 / 3.0
            }
        })
    }

    #[test]
    fn layered_model_scenario() {
        let bbox = BoundingBox::from_extents([-2000.0, 0.0, 0.0, 1000.0, 0.0, 1000.0]);
        let dims = GridDims::new(10, 10, 20);
        let cfg = SizeFunctionConfig::new(bbox, dims)
            .with_hmin(50.0)
            .with_freq(4.0)
            .with_wl(10.0)
            .with_grade(0.15)
            .with_workers(2);
        let size = SizeFunctionBuilder::new(cfg)
            .build(&layered_model(bbox, dims))
            .unwrap();
        assert!(size.min_value() >= 50.0);

        let generator =
            MeshGenerator::new(&size).with_config(GeneratorConfig::new().with_workers(2));
        let mesh = generator
            .build(&BuildOptions::new(50).with_seed(0).with_nscreen(10))
            .unwrap();
        let improved = generator
            .build(&BuildOptions::improvement(mesh.points.clone(), 15).with_nscreen(5))
            .unwrap();

        assert_valid(&improved);
        let scaled = improved.total_volume() / 1e9;
        assert!((scaled - 2.0).abs() < 0.1, "volume {scaled}");
        assert!(
            improved.point_count().abs_diff(9220) < 250,
            "points {}",
            improved.point_count()
        );
        assert!(
            improved.cell_count().abs_diff(49156) < 250,
            "cells {}",
            improved.cell_count()
        );
    }
}
