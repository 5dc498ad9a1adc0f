use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use velmesh::prelude::*;

/// Installs a `fmt` subscriber honouring `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Writes `field` as a flat binary file of 32-bit floats in `byte_order`.
pub fn write_velocity_model(
    path: impl AsRef<Path>,
    field: &ScalarField,
    byte_order: ByteOrder,
) -> anyhow::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for &v in field.values() {
        out.write_all(&byte_order.encode(v as f32))?;
    }
    out.flush()?;
    Ok(())
}

/// Writes a tetrahedral mesh as a legacy ASCII VTK unstructured grid.
pub fn write_vtk(path: impl AsRef<Path>, mesh: &MeshResult) -> anyhow::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "# vtk DataFile Version 3.0")?;
    writeln!(out, "velmesh")?;
    writeln!(out, "ASCII")?;
    writeln!(out, "DATASET UNSTRUCTURED_GRID")?;
    writeln!(out, "POINTS {} double", mesh.point_count())?;
    for p in &mesh.points {
        writeln!(out, "{} {} {}", p.x, p.y, p.z)?;
    }
    writeln!(out, "CELLS {} {}", mesh.cell_count(), mesh.cell_count() * 5)?;
    for c in &mesh.cells {
        writeln!(out, "4 {} {} {} {}", c[0], c[1], c[2], c[3])?;
    }
    writeln!(out, "CELL_TYPES {}", mesh.cell_count())?;
    for _ in &mesh.cells {
        // VTK_TETRA
        writeln!(out, "10")?;
    }
    out.flush()?;
    Ok(())
}

/// Summary of cell shape quality.
#[derive(Clone, Copy, Debug)]
pub struct MeshQuality {
    pub min_radius_ratio: f64,
    pub mean_radius_ratio: f64,
    pub min_dihedral: f64,
    pub max_dihedral: f64,
}

pub fn mesh_quality(mesh: &MeshResult) -> MeshQuality {
    let mut q = MeshQuality {
        min_radius_ratio: f64::INFINITY,
        mean_radius_ratio: 0.0,
        min_dihedral: f64::INFINITY,
        max_dihedral: f64::NEG_INFINITY,
    };
    for c in &mesh.cells {
        let [a, b, cc, d] = c.map(|v| mesh.points[v]);
        let rr = radius_ratio(a, b, cc, d);
        q.min_radius_ratio = q.min_radius_ratio.min(rr);
        q.mean_radius_ratio += rr;
        for angle in dihedral_angles(a, b, cc, d) {
            q.min_dihedral = q.min_dihedral.min(angle);
            q.max_dihedral = q.max_dihedral.max(angle);
        }
    }
    q.mean_radius_ratio /= mesh.cell_count().max(1) as f64;
    q
}
