//! # Retained Engine
//!
//! A retained-mode scene-graph rendering runtime: applications describe
//! geometry, lights, and transforms once, and the engine maintains a
//! live, multithreaded representation that is continuously culled,
//! sorted, and dispatched to drawing surfaces.
//!
//! ## Architecture
//!
//! - **Spatial index**: a binary bounding-hull tree with lazy,
//!   mark-driven hull recomputation for culling and picking
//! - **Structure pipeline**: scene mutations become timestamped,
//!   reference-counted messages routed to per-category structures, each
//!   drained by its own worker thread
//! - **Render core**: atoms bucket into molecules by shared state,
//!   render methods walk the lists with visibility caching and lazy
//!   state flushes
//! - **Behavior scheduler**: AND/OR wakeup condition trees driven by
//!   timers, frame ticks, transform changes, and posts
//! - **Runtime**: an explicit context plus master control, timer, and
//!   notification threads
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use retained_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = RuntimeContext::init(EngineConfig::default())?;
//!     let mut master = MasterControl::new(&context)?;
//!     master.register_structure(Box::new(TransformStructure::new()))?;
//!     master.pump_frame();
//!     master.shutdown();
//!     context.shutdown();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod behavior;
pub mod config;
pub mod foundation;
pub mod render;
pub mod runtime;
pub mod spatial;
pub mod structures;

pub use config::{ConfigError, EngineConfig};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        behavior::{BehaviorStructure, CriterionKind, WakeupTree},
        config::{ConfigError, EngineConfig},
        foundation::{
            math::{BoundingBox, Frustum, Mat4, Vec3},
            time::{FrameClock, Timestamp},
        },
        render::{
            Canvas, DrawDevice, GeometryKind, LightSet, RenderAtom, RenderBin,
            RenderingEnvironmentStructure,
        },
        runtime::{MasterControl, RuntimeContext},
        spatial::{BhTree, HullSource},
        structures::{
            GeometryStructure, MessageKind, NnuId, TargetCategory, ThreadKinds,
            TransformStructure,
        },
    };
}
