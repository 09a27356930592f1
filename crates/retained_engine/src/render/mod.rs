//! Render aggregation and dispatch
//!
//! Atoms group into molecules by shared state, molecules aggregate in
//! bins, and per-geometry-kind render methods walk the lists with
//! visibility caching and lazy state flushes. The graphics pipeline
//! itself stays behind the [`device::DrawDevice`] contract.

pub mod atom;
pub mod bin;
pub mod device;
pub mod environment;
pub mod light_set;
pub mod method;
pub mod molecule;
pub mod ordered_bin;

pub use atom::{GeometryKind, RenderAtom, RenderAtomKey, RenderAtomList};
pub use bin::RenderBin;
pub use device::{DeviceError, DrawCall, DrawDevice, RecordingDevice, SurfaceHandle};
pub use environment::RenderingEnvironmentStructure;
pub use light_set::{Light, LightSet};
pub use method::{Canvas, RenderMethod};
pub use molecule::{MoleculeDirty, RenderMolecule};
pub use ordered_bin::{OrderedBin, OrderedCollection};
