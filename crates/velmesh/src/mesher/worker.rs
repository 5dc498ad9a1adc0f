//! The relaxation loop executed by every worker.
//!
//! All workers run the same sequence of collective operations per iteration:
//! halo exchange, reduction of the bar length sums, point migration and the reduction of
//! the iteration statistics. Only the coordinating worker (rank 0) logs and emits events.
use glam::DVec3;
use tracing::{debug, info, warn};

use super::arena::{PointArena, PointId, PointRecord};
use super::events::{EventSink, MeshEvent, MeshEventKind};
use super::forces::{length_scale, Bars};
use super::improve::sliver_pushes;
use super::seed::Seeder;
use super::{interior_cells, BuildOptions, GeneratorConfig};
use crate::comm::Communicator;
use crate::decomp::SlabDecomposition;
use crate::delaunay::tetrahedralize;
use crate::error::{Error, Result};
use crate::geometry::sdf::SignedDistance;
use crate::sizing::SizeField;

/// Halo selection grows circumspheres by this fraction of the local size, covering the motion of
/// one iteration between selecting and exporting.
const HALO_MARGIN: f64 = 0.5;

/// Read-only inputs shared by all workers of one build.
pub(crate) struct Context<'a> {
    pub size: &'a SizeField,
    pub domain: &'a dyn SignedDistance,
    pub config: &'a GeneratorConfig,
    pub options: &'a BuildOptions,
    pub decomp: &'a SlabDecomposition,
    pub geps: f64,
    pub deps: f64,
}

/// Points of all workers after relaxation, available on the coordinating worker.
pub(crate) struct Relaxed {
    pub records: Vec<PointRecord>,
    pub iterations: usize,
    pub converged: bool,
}

#[derive(Clone, Copy, Debug, Default)]
struct IterationStats {
    max_step: f64,
    points: usize,
    inserted: usize,
    deleted: usize,
    migrated: usize,
    slivers: usize,
}

impl IterationStats {
    fn merge(self, other: Self) -> Self {
        Self {
            max_step: self.max_step.max(other.max_step),
            points: self.points + other.points,
            inserted: self.inserted + other.inserted,
            deleted: self.deleted + other.deleted,
            migrated: self.migrated + other.migrated,
            slivers: self.slivers + other.slivers,
        }
    }
}

/// Runs the whole relaxation on one worker. Returns the gathered points on rank 0 and `None`
/// elsewhere.
pub(crate) fn run(
    comm: &Communicator,
    ctx: &Context<'_>,
    sink: &mut dyn EventSink,
) -> Result<Option<Relaxed>> {
    let rank = comm.rank();
    let mut arena = initial_points(comm, ctx)?;

    let total = comm.all_reduce_sum_usize(arena.len())?;
    debug!("Worker {rank} starts with {} of {total} points.", arena.len());
    if arena.is_empty() {
        warn!("Worker {rank} owns no points; its slab will only see halo copies.");
    }
    if comm.is_root() {
        info!(
            "Mesh build on {} workers: {total} points, {} iterations{}.",
            comm.size(),
            ctx.options.max_iter,
            if ctx.options.mesh_improvement {
                " (mesh improvement)"
            } else {
                ""
            }
        );
        if sink.wants(MeshEventKind::BuildStarted) {
            sink.send(MeshEvent::build_started(comm.size(), total, ctx.options));
        }
    }

    let mut iterations = 0;
    let mut converged = false;
    let mut plan = None;
    for iteration in 0..ctx.options.max_iter {
        iterations = iteration + 1;
        let stats = iterate(comm, ctx, &mut arena, &mut plan, iteration)?;
        let global = comm.all_reduce(stats, IterationStats::merge)?;

        if comm.is_root() {
            report(ctx, sink, iteration, &global);
        }
        if global.inserted + global.deleted == 0 && global.max_step < ctx.config.dptol {
            converged = true;
            break;
        }
    }

    if comm.is_root() {
        if converged {
            info!("Mesh relaxation converged after {iterations} iterations.");
            if sink.wants(MeshEventKind::Converged) {
                sink.send(MeshEvent::Converged { iterations });
            }
        } else {
            let message = format!(
                "movement tolerance {} not reached within {iterations} iterations",
                ctx.config.dptol
            );
            warn!("Mesh relaxation stopped: {message}.");
            if sink.wants(MeshEventKind::Warning) {
                sink.send(MeshEvent::Warning {
                    context: "relaxation".into(),
                    message,
                });
            }
        }
    }

    let gathered = comm.gather(0, arena.into_records())?;
    Ok(gathered.map(|parts| Relaxed {
        records: parts.into_iter().flatten().collect(),
        iterations,
        converged,
    }))
}

fn initial_points(comm: &Communicator, ctx: &Context<'_>) -> Result<PointArena> {
    let rank = comm.rank();
    let mut arena = PointArena::new(rank, comm.size());
    let seeder = Seeder {
        size: ctx.size,
        domain: ctx.domain,
        decomp: ctx.decomp,
        spacing: ctx.size.hmin(),
        geps: ctx.geps,
        seed: ctx.options.seed,
    };
    let corners = seeder.fixed_corners();

    match &ctx.options.points {
        Some(points) => {
            for &p in points.iter().filter(|&&p| ctx.decomp.owner_of(p) == rank) {
                let fixed = corners.iter().any(|&c| (c - p).length() <= ctx.geps);
                arena.insert(p, fixed);
            }
        }
        None => {
            for &c in corners.iter().filter(|&&c| ctx.decomp.owner_of(c) == rank) {
                arena.insert(c, true);
            }
            for p in seeder.seed(comm)? {
                arena.insert(p, false);
            }
        }
    }
    Ok(arena)
}

/// Tetrahedralizes `positions`. Too few or coplanar points give no cells.
fn local_tets(positions: &[DVec3]) -> Result<Vec<[usize; 4]>> {
    match tetrahedralize(positions) {
        Ok(cells) => Ok(cells),
        Err(Error::DegenerateDomain(_)) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Owned points that neighbouring workers need copies of, selected from the local cells of one
/// iteration and used for the halo exchange of the next.
#[derive(Debug)]
struct HaloPlan {
    /// Sorted ids of the points owned when the plan was made.
    known: Vec<PointId>,
    /// Sorted ids to export, one entry per neighbour.
    exports: Vec<(usize, Vec<PointId>)>,
}

impl HaloPlan {
    /// Plans from `tets` over `positions`, whose first `owned` entries are this worker's points.
    fn new(
        decomp: &SlabDecomposition,
        size: &SizeField,
        rank: usize,
        positions: &[DVec3],
        tets: &[[usize; 4]],
        ids: &[PointId],
        owned: usize,
    ) -> Self {
        let margin = |c: DVec3| HALO_MARGIN * size.eval(c);
        let exports = decomp
            .halo_exports(rank, positions, tets, margin)
            .into_iter()
            .map(|(nb, picks)| {
                let mut chosen: Vec<PointId> =
                    picks.into_iter().filter(|&i| i < owned).map(|i| ids[i]).collect();
                chosen.sort_unstable();
                (nb, chosen)
            })
            .collect();
        let mut known = ids[..owned].to_vec();
        known.sort_unstable();
        Self { known, exports }
    }

    /// Records to send to each neighbour. Points that arrived or were inserted after the plan
    /// was made go to every neighbour.
    fn select(&self, records: &[PointRecord]) -> Vec<(usize, Vec<PointRecord>)> {
        self.exports
            .iter()
            .map(|(nb, chosen)| {
                let picked = records
                    .iter()
                    .filter(|r| {
                        chosen.binary_search(&r.id).is_ok()
                            || self.known.binary_search(&r.id).is_err()
                    })
                    .copied()
                    .collect();
                (*nb, picked)
            })
            .collect()
    }
}

/// Sends copies of boundary points to neighbouring workers and returns the copies received.
///
/// Without a plan from the previous iteration the owned points are triangulated on their own
/// to select the exports.
fn exchange_halo(
    comm: &Communicator,
    ctx: &Context<'_>,
    arena: &PointArena,
    plan: Option<&HaloPlan>,
) -> Result<Vec<PointRecord>> {
    let neighbours = ctx.decomp.neighbors_of(comm.rank());
    if neighbours.is_empty() {
        return Ok(Vec::new());
    }
    let outgoing = match plan {
        Some(plan) => plan.select(arena.records()),
        None => {
            let own = arena.positions();
            let own_cells = local_tets(&own)?;
            ctx.decomp
                .halo_exports(comm.rank(), &own, &own_cells, |_| 0.0)
                .into_iter()
                .map(|(nb, picks)| {
                    let records = picks.iter().map(|&i| arena.records()[i]).collect();
                    (nb, records)
                })
                .collect()
        }
    };
    let received = comm.exchange::<Vec<PointRecord>>(outgoing, &neighbours)?;
    Ok(received.into_iter().flat_map(|(_, records)| records).collect())
}

fn iterate(
    comm: &Communicator,
    ctx: &Context<'_>,
    arena: &mut PointArena,
    plan: &mut Option<HaloPlan>,
    iteration: usize,
) -> Result<IterationStats> {
    let config = ctx.config;
    let options = ctx.options;

    let ghosts = exchange_halo(comm, ctx, arena, plan.as_ref())?;
    let owned = arena.len();
    let mut positions = arena.positions();
    positions.extend(ghosts.iter().map(|g| g.position));
    let all = || arena.records().iter().chain(&ghosts);
    let ids: Vec<PointId> = all().map(|r| r.id).collect();
    let fixed: Vec<bool> = all().map(|r| r.fixed).collect();

    let tets = local_tets(&positions)?;
    if comm.size() > 1 {
        *plan = Some(HaloPlan::new(
            ctx.decomp,
            ctx.size,
            comm.rank(),
            &positions,
            &tets,
            &ids,
            owned,
        ));
    }
    let cells = interior_cells(tets, &positions, ctx.domain, ctx.geps);
    let bars = Bars::from_tets(&cells, &positions, owned, ctx.size);
    let (l3, h3) = bars.power_sums(&ids, owned);
    let (sum_l3, sum_h3) = comm.all_reduce((l3, h3), |a, b| (a.0 + b.0, a.1 + b.1))?;
    let desired = bars.desired_lengths(config.fscale, length_scale(sum_l3, sum_h3));

    let mut stats = IterationStats::default();

    let density_due = !options.mesh_improvement
        && config.density_interval > 0
        && iteration > 0
        && iteration % config.density_interval == 0
        && iteration + 1 < options.max_iter;
    if density_due {
        let (inserted, deleted) = adjust_density(
            arena, &bars, &desired, &positions, &ids, &fixed, owned, config,
        );
        stats.inserted = inserted;
        stats.deleted = deleted;
    }

    // Density changes invalidate the bar set; movement resumes after the next rebuild.
    if stats.inserted + stats.deleted == 0 {
        let forces = bars.forces(&positions, owned, &desired);
        let pushes = if options.mesh_improvement {
            let (push, slivers) =
                sliver_pushes(&cells, &positions, &ids, owned, ctx.size, config, iteration);
            stats.slivers = slivers;
            Some(push)
        } else {
            None
        };

        for (i, record) in arena.records_mut().iter_mut().enumerate() {
            if record.fixed {
                continue;
            }
            let mut target = record.position + forces[i] * config.deltat;
            if let Some(push) = &pushes {
                target += push[i];
            }
            if ctx.domain.distance(target) > 0.0 {
                target = ctx.domain.project(target, ctx.deps);
            }
            let step = (target - record.position).length() / ctx.size.eval(target);
            stats.max_step = stats.max_step.max(step);
            record.position = target;
        }
    }

    if comm.size() > 1 {
        let outgoing = arena.take_emigrants(|p| ctx.decomp.owner_of(p));
        stats.migrated = outgoing.iter().map(Vec::len).sum();
        let incoming = comm.all_to_all(outgoing)?;
        arena.absorb(incoming.into_iter().flatten());
    }
    debug_assert!(arena
        .records()
        .iter()
        .all(|r| ctx.decomp.owner_of(r.position) == comm.rank()));

    stats.points = arena.len();
    Ok(stats)
}

/// Deletes endpoints of collapsed bars and splits over-long bars.
///
/// Every worker holding a bar takes the same decision, since it depends only on positions,
/// ids and the globally reduced length scale. Only owned points are deleted, and a midpoint is
/// inserted by the single worker that counts the bar.
#[allow(clippy::too_many_arguments)]
fn adjust_density(
    arena: &mut PointArena,
    bars: &Bars,
    desired: &[f64],
    positions: &[DVec3],
    ids: &[PointId],
    fixed: &[bool],
    owned: usize,
    config: &GeneratorConfig,
) -> (usize, usize) {
    let mut victims: Vec<usize> = Vec::new();
    for (i, &[a, b]) in bars.pairs.iter().enumerate() {
        if bars.lengths[i] >= config.collapse_ratio * desired[i] {
            continue;
        }
        let (hi, lo) = if ids[a] > ids[b] { (a, b) } else { (b, a) };
        if !fixed[hi] {
            victims.push(hi);
        } else if !fixed[lo] {
            victims.push(lo);
        }
    }
    victims.sort_unstable();
    victims.dedup();

    let mut midpoints = Vec::new();
    for (i, &[a, b]) in bars.pairs.iter().enumerate() {
        if bars.lengths[i] <= config.split_ratio * bars.sizes[i] {
            continue;
        }
        if !bars.counted_here(i, ids, owned) {
            continue;
        }
        if victims.binary_search(&a).is_ok() || victims.binary_search(&b).is_ok() {
            continue;
        }
        midpoints.push((positions[a] + positions[b]) * 0.5);
    }

    let mut doomed: Vec<PointId> = victims
        .iter()
        .filter(|&&v| v < owned)
        .map(|&v| ids[v])
        .collect();
    doomed.sort_unstable();
    let deleted = arena.remove_sorted(&doomed);

    let inserted = midpoints.len();
    for p in midpoints {
        arena.insert(p, false);
    }
    (inserted, deleted)
}

fn report(
    ctx: &Context<'_>,
    sink: &mut dyn EventSink,
    iteration: usize,
    global: &IterationStats,
) {
    let nscreen = ctx.options.nscreen;
    if nscreen > 0 && iteration % nscreen == 0 {
        info!(
            "Iteration {}: {} points, max move {:.3e}, inserted {}, deleted {}, migrated {}.",
            iteration + 1,
            global.points,
            global.max_step,
            global.inserted,
            global.deleted,
            global.migrated
        );
    }
    if sink.wants(MeshEventKind::IterationFinished) {
        sink.send(MeshEvent::IterationFinished {
            iteration,
            points: global.points,
            max_displacement: global.max_step,
            inserted: global.inserted,
            deleted: global.deleted,
            migrated: global.migrated,
        });
    }
    if global.inserted + global.deleted > 0 && sink.wants(MeshEventKind::DensityAdjusted) {
        sink.send(MeshEvent::DensityAdjusted {
            iteration,
            inserted: global.inserted,
            deleted: global.deleted,
        });
    }
    if global.slivers > 0 && sink.wants(MeshEventKind::SliversPerturbed) {
        sink.send(MeshEvent::SliversPerturbed {
            iteration,
            slivers: global.slivers,
        });
    }
}
