#![forbid(unsafe_code)]
//! velmesh: parallel tetrahedral mesh generation driven by velocity-model size functions.
//!
//! Modules:
//! - field: regularly gridded scalar fields (velocity models) with trilinear lookup
//! - sizing: size-function builder (wavelength sizing, bounds, CFL, gradient limiting)
//! - decomp: slab domain decomposition, ownership and halo selection
//! - comm: message-passing communicator connecting worker threads
//! - delaunay: incremental Bowyer-Watson tetrahedralization
//! - geometry: signed volumes, dihedral angles and signed-distance domains
//! - mesher: force-equilibrium mesh generator, mesh improvement and events
pub mod comm;
pub mod decomp;
pub mod delaunay;
pub mod error;
pub mod field;
pub mod geometry;
pub mod mesher;
pub mod sizing;

/// Convenient re-exports for common types. Import with `use velmesh::prelude::*;`.
pub mod prelude {
    pub use crate::decomp::{Axis, SlabDecomposition};
    pub use crate::error::{Error, Result};
    pub use crate::field::{BoundingBox, ByteOrder, GridDims, GridSpec, ScalarField};
    pub use crate::geometry::sdf::{Cuboid, SignedDistance};
    pub use crate::geometry::{dihedral_angles, radius_ratio, volume, Simplex};
    pub use crate::mesher::events::{
        EventSink, FnSink, MeshEvent, MeshEventKind, MultiSink, VecSink,
    };
    pub use crate::mesher::{BuildOptions, GeneratorConfig, MeshGenerator, MeshResult};
    pub use crate::sizing::{SizeField, SizeFunctionBuilder, SizeFunctionConfig};
}
