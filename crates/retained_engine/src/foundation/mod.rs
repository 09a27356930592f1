//! Foundation utilities: math, timing, collections, and logging
//!
//! Low-level building blocks shared by every subsystem. Nothing in here
//! knows about scene graphs or rendering.

pub mod collections;
pub mod logging;
pub mod math;
pub mod time;
