//! Bar extraction and the spring force law.
//!
//! Points are indexed locally: the first `owned` entries are the worker's own points, the rest
//! are halo copies. A bar is kept when at least one endpoint is owned. Bars crossing a slab
//! boundary exist on both workers, so global sums count a bar only on the worker owning its
//! endpoint with the smaller id.
use glam::DVec3;

use super::arena::PointId;
use crate::sizing::SizeField;

/// Tetrahedron edges as vertex slots.
const TET_EDGES: [(usize, usize); 6] = [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)];

pub(crate) struct Bars {
    /// Endpoints as local point indices, `pairs[i][0] < pairs[i][1]`.
    pub pairs: Vec<[usize; 2]>,
    pub lengths: Vec<f64>,
    /// Desired size at each bar midpoint.
    pub sizes: Vec<f64>,
}

impl Bars {
    pub fn from_tets(
        tets: &[[usize; 4]],
        positions: &[DVec3],
        owned: usize,
        size: &SizeField,
    ) -> Self {
        let mut pairs: Vec<[usize; 2]> = tets
            .iter()
            .flat_map(|t| TET_EDGES.iter().map(move |&(i, j)| [t[i].min(t[j]), t[i].max(t[j])]))
            .filter(|&[a, _]| a < owned)
            .collect();
        pairs.sort_unstable();
        pairs.dedup();

        let (lengths, sizes) = pairs
            .iter()
            .map(|&[a, b]| {
                let (pa, pb) = (positions[a], positions[b]);
                ((pa - pb).length(), size.eval((pa + pb) * 0.5))
            })
            .unzip();

        Self {
            pairs,
            lengths,
            sizes,
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether this worker accounts for bar `i` in global sums.
    pub fn counted_here(&self, i: usize, ids: &[PointId], owned: usize) -> bool {
        let [a, b] = self.pairs[i];
        let first = if ids[a] < ids[b] { a } else { b };
        first < owned
    }

    /// Local contributions to `sum L^3` and `sum h^3`.
    pub fn power_sums(&self, ids: &[PointId], owned: usize) -> (f64, f64) {
        (0..self.len())
            .filter(|&i| self.counted_here(i, ids, owned))
            .fold((0.0, 0.0), |(l3, h3), i| {
                (l3 + self.lengths[i].powi(3), h3 + self.sizes[i].powi(3))
            })
    }

    /// Desired bar lengths `L0 = h(mid) * fscale * scale`.
    pub fn desired_lengths(&self, fscale: f64, scale: f64) -> Vec<f64> {
        self.sizes.iter().map(|&h| h * fscale * scale).collect()
    }

    /// Net repulsive force on every owned point. Bars longer than desired exert no force.
    pub fn forces(&self, positions: &[DVec3], owned: usize, desired: &[f64]) -> Vec<DVec3> {
        let mut total = vec![DVec3::ZERO; owned];
        for (i, &[a, b]) in self.pairs.iter().enumerate() {
            let l = self.lengths[i];
            let push = (desired[i] - l).max(0.0);
            if push == 0.0 || l == 0.0 {
                continue;
            }
            let f = (positions[a] - positions[b]) * (push / l);
            if a < owned {
                total[a] += f;
            }
            if b < owned {
                total[b] -= f;
            }
        }
        total
    }
}

/// Global length scale `(sum L^3 / sum h^3)^(1/3)`, `1` when there are no bars.
pub(crate) fn length_scale(sum_l3: f64, sum_h3: f64) -> f64 {
    if sum_h3 > 0.0 && sum_l3 > 0.0 {
        (sum_l3 / sum_h3).cbrt()
    } else {
        1.0
    }
}
