//! Runtime drivers
//!
//! The explicitly constructed context, master control loop, timer and
//! notification threads, and the view-state lock. Nothing here is a
//! global: every handle is created by [`RuntimeContext`] and passed by
//! reference.

pub mod context;
pub mod master;
pub mod notify;
pub mod timer;
pub mod view_lock;

pub use context::RuntimeContext;
pub use master::MasterControl;
pub use notify::{NotificationThread, RenderError, RenderErrorListener};
pub use timer::{TimerEntry, TimerQueue, TimerThread};
pub use view_lock::{ViewReadGuard, ViewStateLock, ViewWriteGuard};
