//! Initial point distribution for fresh builds.
//!
//! Candidates sit on a cubic lattice with spacing `hmin`, layered along the decomposition axis;
//! odd layers are shifted by half a step in the two other axes. A candidate is kept with
//! probability `(h_min / h(p))^3`, where `h_min` is the smallest size over all candidates, which
//! yields a point density proportional to `h^-3`.
//!
//! Every layer draws from its own generator seeded by [`seed_for_layer`], so the seeded set is
//! the same whatever the number of workers.
use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::comm::Communicator;
use crate::decomp::SlabDecomposition;
use crate::error::Result;
use crate::geometry::sdf::SignedDistance;
use crate::sizing::SizeField;

/// Derives a deterministic seed for one lattice layer from the build seed.
pub fn seed_for_layer(base_seed: u64, layer: u64) -> u64 {
    let mixed = base_seed ^ layer.wrapping_mul(0x9E3779B97F4A7C15);
    mix_u64(mixed)
}

#[inline]
fn mix_u64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58476D1CE4E5B9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94D049BB133111EB);
    x ^ (x >> 31)
}

/// Uniform value in `[0, 1)` with 53 random bits.
#[inline]
fn rand01<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
}

pub(crate) struct Seeder<'a> {
    pub size: &'a SizeField,
    pub domain: &'a dyn SignedDistance,
    pub decomp: &'a SlabDecomposition,
    /// Lattice step.
    pub spacing: f64,
    pub geps: f64,
    pub seed: u64,
}

impl Seeder<'_> {
    /// Corners of the domain bounds lying in the domain. These become fixed points.
    pub fn fixed_corners(&self) -> Vec<DVec3> {
        self.decomp
            .bbox()
            .corners()
            .into_iter()
            .filter(|&c| self.domain.distance(c) <= self.geps)
            .collect()
    }

    fn layer_count(&self) -> usize {
        let extent = self.decomp.axis().of(self.decomp.bbox().extent());
        (extent / self.spacing + 1e-9).floor() as usize + 1
    }

    /// Lattice candidates of the layers owned by `rank`, grouped by layer index.
    fn candidates(&self, rank: usize) -> Vec<(u64, Vec<DVec3>)> {
        let bbox = self.decomp.bbox();
        let axis = self.decomp.axis();
        let [u_axis, v_axis] = axis.others();
        let (lo, hi) = (bbox.min, bbox.max);
        let corners = self.fixed_corners();

        let steps = |from: f64, to: f64| {
            let n = ((to - from) / self.spacing + 1e-9).floor();
            if n < 0.0 {
                0
            } else {
                n as usize + 1
            }
        };

        let mut layers = Vec::new();
        for layer in 0..self.layer_count() {
            let c = axis.of(lo) + layer as f64 * self.spacing;
            let mut probe = bbox.center();
            probe[axis.index()] = c;
            if self.decomp.owner_of(probe) != rank {
                continue;
            }

            let shift = if layer % 2 == 1 { 0.5 * self.spacing } else { 0.0 };
            let u0 = u_axis.of(lo) + shift;
            let v0 = v_axis.of(lo) + shift;
            let mut points = Vec::new();
            for iv in 0..steps(v0, v_axis.of(hi)) {
                for iu in 0..steps(u0, u_axis.of(hi)) {
                    let mut p = DVec3::ZERO;
                    p[axis.index()] = c;
                    p[u_axis.index()] = u0 + iu as f64 * self.spacing;
                    p[v_axis.index()] = v0 + iv as f64 * self.spacing;
                    if self.domain.distance(p) >= self.geps {
                        continue;
                    }
                    if corners.iter().any(|&k| (k - p).length() < self.geps) {
                        continue;
                    }
                    points.push(p);
                }
            }
            layers.push((layer as u64, points));
        }
        layers
    }

    /// Seeds the points owned by `comm.rank()`. Fixed corners are not included.
    pub fn seed(&self, comm: &Communicator) -> Result<Vec<DVec3>> {
        let layers = self.candidates(comm.rank());
        let sizes: Vec<Vec<f64>> = layers
            .iter()
            .map(|(_, pts)| self.size.eval_many(pts))
            .collect();
        let local_min = sizes
            .iter()
            .flatten()
            .copied()
            .fold(f64::INFINITY, f64::min);
        let h_min = comm.all_reduce_min(local_min)?;

        let mut kept = Vec::new();
        for ((layer, points), sizes) in layers.iter().zip(&sizes) {
            let mut rng = StdRng::seed_from_u64(seed_for_layer(self.seed, *layer));
            for (&p, &h) in points.iter().zip(sizes) {
                let keep = (h_min / h).powi(3);
                if rand01(&mut rng) < keep {
                    kept.push(p);
                }
            }
        }
        Ok(kept)
    }
}
