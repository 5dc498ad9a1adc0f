#![forbid(unsafe_code)]

mod output;

pub use output::{init_tracing, mesh_quality, write_velocity_model, write_vtk, MeshQuality};
