//! Behavior scheduling
//!
//! Wakeup criteria, the AND/OR condition tree, and the behavior
//! structure that routes external events to waiting criteria.

pub mod condition;
pub mod structure;
pub mod wakeup;

pub use condition::{WakeupNodeKey, WakeupTree};
pub use structure::BehaviorStructure;
pub use wakeup::{CriterionKind, CriterionState, RegionSubject, WakeupCriterion};
