//! Structure update pipeline
//!
//! Scene mutations become timestamped, reference-counted messages routed
//! to per-category structures, each drained by a dedicated worker thread.
//! Target accumulation and immutable snapshots decouple concurrent
//! mutation from concurrent traversal.

pub mod geometry;
pub mod message;
pub mod queue;
pub mod structure;
pub mod targets;
pub mod transform;

pub use geometry::GeometryStructure;
pub use message::{ChangeMessage, MessageArg, MessageKind, MessagePool, ThreadKinds};
pub use queue::MessageQueue;
pub use structure::{Structure, StructureUpdateWorker, WorkerSignal};
pub use targets::{
    CachedTargets, NnuId, SceneTarget, TargetCategory, TargetRef, Targets, TargetsError,
};
pub use transform::TransformStructure;
