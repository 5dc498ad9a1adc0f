//! Field sampler subsystem: regularly gridded scalar fields such as velocity models.
//!
//! A [`ScalarField`] is created once, either from a flat binary model file via
//! [`ScalarField::load`] or in memory, and is read-only afterwards.
pub mod grid;
pub mod loader;
pub mod scalar;

pub use grid::{BoundingBox, GridDims, GridSpec};
pub use loader::ByteOrder;
pub use scalar::ScalarField;
