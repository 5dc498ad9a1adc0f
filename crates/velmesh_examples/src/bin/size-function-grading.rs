use tracing::info;
use velmesh::prelude::*;
use velmesh_examples::init_tracing;

/// Largest ratio `|h_a - h_b| / dist(a, b)` over axis-adjacent samples.
fn steepest_slope(size: &SizeField) -> f64 {
    let grid = size.grid();
    let [n0, n1, n2] = grid.counts;
    let mut worst: f64 = 0.0;
    for k in 0..n2 {
        for j in 0..n1 {
            for i in 0..n0 {
                let here = size.values()[grid.index(i, j, k)];
                let node = grid.node(i, j, k);
                for (ni, nj, nk) in [(i + 1, j, k), (i, j + 1, k), (i, j, k + 1)] {
                    if ni >= n0 || nj >= n1 || nk >= n2 {
                        continue;
                    }
                    let there = size.values()[grid.index(ni, nj, nk)];
                    let dist = (grid.node(ni, nj, nk) - node).length();
                    worst = worst.max((here - there).abs() / dist);
                }
            }
        }
    }
    worst
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    // A low-velocity inclusion inside a fast background produces a sharp size contrast.
    let bbox = BoundingBox::from_extents([0.0, 3000.0, 0.0, 3000.0, 0.0, 3000.0]);
    let dims = GridDims::new(31, 31, 31);
    let grid = GridSpec::new(bbox, dims)?;
    let velocity = ScalarField::from_fn(grid, |p| {
        if (p - bbox.center()).length() < 600.0 {
            800.0
        } else {
            4000.0
        }
    });

    for grade in [0.0, 0.3, 0.1] {
        for workers in [1, 4] {
            let config = SizeFunctionConfig::new(bbox, dims)
                .with_hmin(10.0)
                .with_freq(2.0)
                .with_wl(10.0)
                .with_grade(grade)
                .with_workers(workers);
            let size = SizeFunctionBuilder::try_new(config)?.build(&velocity)?;
            info!(
                "grade {grade:.2} on {workers} worker(s): h in [{:.1}, {:.1}], steepest slope {:.3}",
                size.min_value(),
                size.max_value(),
                steepest_slope(&size)
            );
        }
    }
    Ok(())
}
