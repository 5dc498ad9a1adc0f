//! Gradient limiting of mesh size values on a regular grid.
//!
//! Alternating forward and backward Gauss-Seidel sweeps apply
//! `h[n] = min(h[n], h[m] + grade * |x_n - x_m|)` over axis-adjacent samples `m`. Values only
//! decrease, and the sweeps stop at the largest field below the input that satisfies the
//! grading bound everywhere.
use std::ops::Range;

use glam::DVec3;

/// Runs one forward and one backward sweep over `planes` (indices along coordinate 2).
///
/// `values` holds `counts[0] * counts[1] * counts[2]` samples in grid order; planes outside
/// `planes` are read as neighbours but never written. Returns `true` when any value changed.
pub(crate) fn sweep(
    values: &mut [f64],
    counts: [usize; 3],
    spacing: DVec3,
    grade: f64,
    planes: Range<usize>,
) -> bool {
    let [n0, n1, n2] = counts;
    debug_assert_eq!(values.len(), n0 * n1 * n2);
    let step = spacing * grade;
    let plane = n0 * n1;

    let mut relax = |i: usize, j: usize, k: usize| -> bool {
        let n = i + n0 * (j + n1 * k);
        let mut best = values[n];
        if i > 0 {
            best = best.min(values[n - 1] + step.x);
        }
        if i + 1 < n0 {
            best = best.min(values[n + 1] + step.x);
        }
        if j > 0 {
            best = best.min(values[n - n0] + step.y);
        }
        if j + 1 < n1 {
            best = best.min(values[n + n0] + step.y);
        }
        if k > 0 {
            best = best.min(values[n - plane] + step.z);
        }
        if k + 1 < n2 {
            best = best.min(values[n + plane] + step.z);
        }
        if best < values[n] {
            values[n] = best;
            true
        } else {
            false
        }
    };

    let mut changed = false;
    for k in planes.clone() {
        for j in 0..n1 {
            for i in 0..n0 {
                changed |= relax(i, j, k);
            }
        }
    }
    for k in planes.rev() {
        for j in (0..n1).rev() {
            for i in (0..n0).rev() {
                changed |= relax(i, j, k);
            }
        }
    }
    changed
}

/// Sweeps the whole grid until nothing changes. Returns the number of sweep pairs run.
pub(crate) fn limit_gradient(
    values: &mut [f64],
    counts: [usize; 3],
    spacing: DVec3,
    grade: f64,
) -> usize {
    let mut rounds = 1;
    while sweep(values, counts, spacing, grade, 0..counts[2]) {
        rounds += 1;
    }
    rounds
}

/// Largest violation of the grading bound between axis-adjacent samples.
///
/// Returns `max(|h[a] - h[b]| - grade * |x_a - x_b|)` over all adjacent pairs, or `0` when the
/// bound holds everywhere.
pub(crate) fn max_violation(values: &[f64], counts: [usize; 3], spacing: DVec3, grade: f64) -> f64 {
    let [n0, n1, n2] = counts;
    let idx = |i: usize, j: usize, k: usize| i + n0 * (j + n1 * k);
    let mut worst = 0.0f64;
    for k in 0..n2 {
        for j in 0..n1 {
            for i in 0..n0 {
                let h = values[idx(i, j, k)];
                if i + 1 < n0 {
                    worst = worst.max((h - values[idx(i + 1, j, k)]).abs() - grade * spacing.x);
                }
                if j + 1 < n1 {
                    worst = worst.max((h - values[idx(i, j + 1, k)]).abs() - grade * spacing.y);
                }
                if k + 1 < n2 {
                    worst = worst.max((h - values[idx(i, j, k + 1)]).abs() - grade * spacing.z);
                }
            }
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spike_is_spread_into_a_cone() {
        let counts = [9, 1, 1];
        let mut values = vec![10.0; 9];
        values[4] = 1.0;
        limit_gradient(&mut values, counts, DVec3::ONE, 0.5);
        let expected = [3.0, 2.5, 2.0, 1.5, 1.0, 1.5, 2.0, 2.5, 3.0];
        for (got, want) in values.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "{values:?}");
        }
    }

    #[test]
    fn graded_input_is_left_untouched() {
        let counts = [4, 3, 2];
        let mut values: Vec<f64> = (0..24).map(|n| 5.0 + 0.01 * (n % 4) as f64).collect();
        let before = values.clone();
        assert_eq!(limit_gradient(&mut values, counts, DVec3::ONE, 0.1), 1);
        assert_eq!(values, before);
    }

    #[test]
    fn values_never_increase_and_bound_holds() {
        let counts = [6, 5, 4];
        let spacing = DVec3::new(1.0, 2.0, 0.5);
        let mut values: Vec<f64> = (0..counts.iter().product::<usize>())
            .map(|n| 1.0 + ((n * 7919) % 13) as f64)
            .collect();
        let before = values.clone();
        limit_gradient(&mut values, counts, spacing, 0.2);
        assert!(values.iter().zip(&before).all(|(a, b)| a <= b));
        assert!(max_violation(&values, counts, spacing, 0.2) <= 1e-12);
    }

    #[test]
    fn sweep_only_writes_requested_planes() {
        let counts = [2, 2, 3];
        let mut values = vec![10.0; 12];
        values[0] = 0.0;
        sweep(&mut values, counts, DVec3::ONE, 1.0, 1..2);
        assert!(values[..4].iter().skip(1).all(|&v| v == 10.0));
        assert!(values[8..].iter().all(|&v| v == 10.0));
        assert_eq!(values[4], 1.0);
    }
}
