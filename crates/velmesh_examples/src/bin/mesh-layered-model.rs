use std::env;

use glam::DVec3;
use tracing::info;
use velmesh::prelude::*;
use velmesh_examples::{init_tracing, mesh_quality, write_velocity_model, write_vtk};

fn main() -> anyhow::Result<()> {
    init_tracing();

    // A 2 km x 1 km x 1 km block, depth along -x, with a slow sediment layer over a fast basement.
    let bbox = BoundingBox::from_extents([-2000.0, 0.0, 0.0, 1000.0, 0.0, 1000.0]);
    let dims = GridDims::new(10, 10, 20);
    let grid = GridSpec::new(bbox, dims)?;
    let velocity = ScalarField::from_fn(grid, |p| if p.x > -600.0 { 1500.0 } else { 3500.0 });

    let model_path = env::temp_dir().join("velmesh-layered-model.bin");
    write_velocity_model(&model_path, &velocity, ByteOrder::Big)?;

    let config = SizeFunctionConfig::new(bbox, dims)
        .with_byte_order(ByteOrder::Big)
        .with_hmin(50.0)
        .with_freq(4.0)
        .with_wl(10.0)
        .with_grade(0.15)
        .with_workers(2);
    let size = SizeFunctionBuilder::try_new(config)?.build_from_file(&model_path)?;
    info!(
        "Size field ranges from {:.1} m to {:.1} m.",
        size.min_value(),
        size.max_value()
    );

    let generator =
        MeshGenerator::new(&size).with_config(GeneratorConfig::new().with_workers(2));

    let mut events = VecSink::new();
    let first = generator.build_with_events(&BuildOptions::new(50).with_seed(7), &mut events)?;
    info!(
        "Initial mesh: {} points, {} cells, {} density passes.",
        first.point_count(),
        first.cell_count(),
        events.count(MeshEventKind::DensityAdjusted)
    );

    let improved = generator.build(&BuildOptions::improvement(first.points.clone(), 15))?;
    let quality = mesh_quality(&improved);
    info!(
        "Improved mesh: {} points, {} cells, volume {:.4} km^3.",
        improved.point_count(),
        improved.cell_count(),
        improved.total_volume() / 1e9
    );
    info!(
        "Radius ratio min {:.3} mean {:.3}, dihedral angles {:.1}..{:.1} deg.",
        quality.min_radius_ratio,
        quality.mean_radius_ratio,
        quality.min_dihedral,
        quality.max_dihedral
    );

    let centroid = improved.points.iter().copied().sum::<DVec3>() / improved.point_count() as f64;
    info!("Point centroid at {centroid}.");

    write_vtk("mesh-layered-model.vtk", &improved)?;
    Ok(())
}
