//! Sliver handling for mesh improvement builds.
//!
//! Slivers are detected by their dihedral angles. During relaxation their vertices are pushed
//! away from the sliver centroid and the next Delaunay rebuild replaces the flat cells. Cells
//! that are still nearly flat when the mesh is assembled are removed.
use glam::DVec3;

use super::arena::PointId;
use super::GeneratorConfig;
use crate::geometry::{dihedral_angles, tet_centroid, tet_volume};
use crate::sizing::SizeField;

/// Returns `true` when the tetrahedron has a dihedral angle outside `[min_deg, max_deg]`.
pub(crate) fn is_sliver(p: [DVec3; 4], min_deg: f64, max_deg: f64) -> bool {
    let angles = dihedral_angles(p[0], p[1], p[2], p[3]);
    angles.iter().any(|&a| a < min_deg || a > max_deg)
}

/// Extra displacement of owned points lying on slivers, and the number of slivers this worker
/// accounts for.
///
/// A sliver is counted on the worker owning its vertex with the smallest id. The push shrinks
/// by `sliver_decay` every iteration.
pub(crate) fn sliver_pushes(
    tets: &[[usize; 4]],
    positions: &[DVec3],
    ids: &[PointId],
    owned: usize,
    size: &SizeField,
    config: &GeneratorConfig,
    iteration: usize,
) -> (Vec<DVec3>, usize) {
    let strength = config.sliver_push_at(iteration);
    let mut push = vec![DVec3::ZERO; owned];
    let mut counted = 0;
    for tet in tets.iter().filter(|t| t.iter().any(|&v| v < owned)) {
        let p = tet.map(|v| positions[v]);
        if !is_sliver(p, config.min_dihedral, config.max_dihedral) {
            continue;
        }
        let first = tet.iter().copied().min_by_key(|&v| ids[v]).unwrap_or(tet[0]);
        if first < owned {
            counted += 1;
        }
        let centroid = tet_centroid(p[0], p[1], p[2], p[3]);
        for &v in tet.iter().filter(|&&v| v < owned) {
            let pv = positions[v];
            if let Some(dir) = (pv - centroid).try_normalize() {
                push[v] += dir * (strength * size.eval(pv));
            }
        }
    }
    (push, counted)
}

/// Removes cells with `|volume| <= tol * h^3`, `h` being the desired size at the centroid.
pub(crate) fn drop_degenerate(
    points: &[DVec3],
    cells: Vec<[usize; 4]>,
    size: &SizeField,
    tol: f64,
) -> Vec<[usize; 4]> {
    cells
        .into_iter()
        .filter(|c| {
            let p = c.map(|v| points[v]);
            let h = size.eval(tet_centroid(p[0], p[1], p[2], p[3]));
            tet_volume(p[0], p[1], p[2], p[3]).abs() > tol * h.powi(3)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::BoundingBox;

    fn size() -> SizeField {
        SizeField::uniform(BoundingBox::new(DVec3::splat(-2.0), DVec3::splat(2.0)), 1.0).unwrap()
    }

    fn sliver() -> [DVec3; 4] {
        [
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(1.0, 0.0, 0.01),
            DVec3::new(0.0, 1.0, 0.01),
        ]
    }

    #[test]
    fn regular_tetrahedron_is_not_a_sliver() {
        let p = [
            DVec3::new(1.0, 1.0, 1.0),
            DVec3::new(1.0, -1.0, -1.0),
            DVec3::new(-1.0, 1.0, -1.0),
            DVec3::new(-1.0, -1.0, 1.0),
        ];
        assert!(!is_sliver(p, 10.0, 170.0));
        assert!(is_sliver(sliver(), 10.0, 170.0));
    }

    #[test]
    fn sliver_vertices_are_pushed_apart() {
        let positions = sliver().to_vec();
        let ids = [0, 1, 2, 3];
        let config = GeneratorConfig::default();
        let (push, counted) =
            sliver_pushes(&[[0, 1, 2, 3]], &positions, &ids, 4, &size(), &config, 0);
        assert_eq!(counted, 1);
        // The two low vertices move down, the two raised ones move up.
        assert!(push[0].z < 0.0 && push[1].z < 0.0);
        assert!(push[2].z > 0.0 && push[3].z > 0.0);
        for p in &push {
            assert!((p.length() - config.sliver_push).abs() < 1e-12);
        }
    }

    #[test]
    fn sliver_push_decays_with_the_iteration() {
        let positions = sliver().to_vec();
        let ids = [0, 1, 2, 3];
        let config = GeneratorConfig::default().with_sliver_decay(0.5);
        let tets = [[0, 1, 2, 3]];
        let (early, _) = sliver_pushes(&tets, &positions, &ids, 4, &size(), &config, 0);
        let (late, counted) = sliver_pushes(&tets, &positions, &ids, 4, &size(), &config, 3);
        assert_eq!(counted, 1);
        for (e, l) in early.iter().zip(&late) {
            assert!((l.length() - e.length() / 8.0).abs() < 1e-12);
            assert!(e.dot(*l) > 0.0);
        }
    }

    #[test]
    fn ghost_only_slivers_are_ignored() {
        let positions = sliver().to_vec();
        let ids = [0, 1, 2, 3];
        let config = GeneratorConfig::default();
        let (push, counted) =
            sliver_pushes(&[[0, 1, 2, 3]], &positions, &ids, 0, &size(), &config, 0);
        assert!(push.is_empty());
        assert_eq!(counted, 0);
    }

    #[test]
    fn flat_cells_are_dropped() {
        let mut points = sliver().to_vec();
        points.push(DVec3::new(0.5, 0.5, 0.0));
        points.push(DVec3::new(0.0, 0.0, 1.0));
        let cells = vec![[0, 1, 2, 3], [0, 1, 2, 4], [0, 2, 3, 5]];
        let kept = drop_degenerate(&points, cells, &size(), 1e-6);
        assert_eq!(kept, vec![[0, 1, 2, 3], [0, 2, 3, 5]]);
    }
}
