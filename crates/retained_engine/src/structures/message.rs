//! Change messages and the shared message pool
//!
//! Every scene mutation produces a [`ChangeMessage`]: timestamped,
//! addressed to a bitmask of structure categories, and reference-counted
//! once per addressed structure. Fully consumed messages recycle through
//! the [`MessagePool`] free list instead of being dropped.

use crate::foundation::math::{BoundingBox, Mat4};
use crate::foundation::time::Timestamp;
use crate::spatial::HullSource;
use crate::structures::targets::{NnuId, TargetCategory, TargetRef};
use bitflags::bitflags;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

bitflags! {
    /// Bitmask of structure worker categories a message is addressed to
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ThreadKinds: u32 {
        /// Transform structure worker
        const TRANSFORM = 1 << 0;
        /// Geometry structure worker
        const GEOMETRY = 1 << 1;
        /// Behavior structure worker
        const BEHAVIOR = 1 << 2;
        /// Sound structure worker
        const SOUND = 1 << 3;
        /// Rendering-environment structure worker
        const RENDERING_ENVIRONMENT = 1 << 4;
        /// Rendering-attributes structure worker
        const RENDERING_ATTRIBUTES = 1 << 5;
        /// Render thread
        const RENDER = 1 << 6;
        /// Master control thread
        const MASTER = 1 << 7;
    }
}

/// Kind of change a message reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageKind {
    /// Recycled message awaiting reuse
    #[default]
    Empty,
    /// Nodes were attached to the live scene
    NodesInserted,
    /// Nodes were detached from the live scene
    NodesRemoved,
    /// A node's local-to-world transform changed
    TransformChanged,
    /// A node's geometry content changed
    GeometryChanged,
    /// The active light configuration changed
    LightsChanged,
    /// A behavior posted an application-defined id
    BehaviorPost,
    /// A tracked subject entered a region
    RegionEntered,
    /// A tracked subject exited a region
    RegionExited,
    /// An elapsed-time wakeup deadline fired
    TimeElapsed,
    /// A frame boundary passed
    FrameTick,
    /// A behavior was activated or deactivated
    ActivationChanged,
    /// Orderly shutdown request
    Shutdown,
}

/// Opaque message argument
#[derive(Clone)]
pub enum MessageArg {
    /// A target identifier
    Id(NnuId),
    /// A small index (ordered-group child slot, criterion slot)
    Index(usize),
    /// A count (frames, posts)
    Count(u64),
    /// A transform matrix
    Transform(Mat4),
    /// A bounding region
    Bounds(BoundingBox),
    /// A boolean flag (enabled, activated)
    Flag(bool),
    /// A target category discriminator
    Category(TargetCategory),
    /// A scene target reference
    Target(TargetRef),
    /// A bounding-hull capability for spatial indexing
    Hull(Arc<dyn HullSource>),
    /// A behavior post: source id and post id
    Post {
        /// Posting behavior
        source: NnuId,
        /// Application-defined post id
        post_id: i32,
    },
}

impl std::fmt::Debug for MessageArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageArg::Id(id) => f.debug_tuple("Id").field(id).finish(),
            MessageArg::Index(i) => f.debug_tuple("Index").field(i).finish(),
            MessageArg::Count(c) => f.debug_tuple("Count").field(c).finish(),
            MessageArg::Transform(_) => f.write_str("Transform(..)"),
            MessageArg::Bounds(b) => f.debug_tuple("Bounds").field(b).finish(),
            MessageArg::Flag(v) => f.debug_tuple("Flag").field(v).finish(),
            MessageArg::Category(c) => f.debug_tuple("Category").field(c).finish(),
            MessageArg::Target(t) => f.debug_tuple("Target").field(&t.nnu_id()).finish(),
            MessageArg::Hull(_) => f.write_str("Hull(..)"),
            MessageArg::Post { source, post_id } => f
                .debug_struct("Post")
                .field("source", source)
                .field("post_id", post_id)
                .finish(),
        }
    }
}

/// Timestamped, reference-counted change notification
///
/// The reference count tracks how many addressed structures have yet to
/// consume the message; it reaches zero exactly once, at which point the
/// pool reclaims the allocation.
#[derive(Debug)]
pub struct ChangeMessage {
    /// What changed
    pub kind: MessageKind,
    /// When the change was made, in change-time order
    pub timestamp: Timestamp,
    /// Structure categories that must react
    pub recipients: ThreadKinds,
    /// Kind-specific arguments
    pub args: Vec<MessageArg>,
    refs: AtomicUsize,
}

impl ChangeMessage {
    /// Take a consumption reference (one per addressed structure)
    pub fn inc_ref(&self) {
        self.refs.fetch_add(1, Ordering::AcqRel);
    }

    /// Current outstanding consumption references
    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }
}

/// Shared free list of recycled messages
///
/// `acquire` reuses a recycled allocation when one is available;
/// `dec_ref` returns a message once its last consumer finishes with it.
#[derive(Debug)]
pub struct MessagePool {
    free: Mutex<Vec<Arc<ChangeMessage>>>,
    capacity: usize,
}

impl MessagePool {
    /// Create a pool retaining at most `capacity` recycled messages
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Obtain a message, recycled when possible
    pub fn acquire(
        &self,
        kind: MessageKind,
        timestamp: Timestamp,
        recipients: ThreadKinds,
        args: Vec<MessageArg>,
    ) -> Arc<ChangeMessage> {
        let mut free = self.free.lock().unwrap();
        while let Some(mut message) = free.pop() {
            // A recycled message is only reusable while we hold the sole
            // strong reference; anything else is stale and dropped.
            if let Some(inner) = Arc::get_mut(&mut message) {
                inner.kind = kind;
                inner.timestamp = timestamp;
                inner.recipients = recipients;
                inner.args = args;
                inner.refs.store(0, Ordering::Release);
                return message;
            }
        }
        drop(free);
        Arc::new(ChangeMessage {
            kind,
            timestamp,
            recipients,
            args,
            refs: AtomicUsize::new(0),
        })
    }

    /// Release one consumption reference; recycles at zero
    pub fn dec_ref(&self, message: &Arc<ChangeMessage>) {
        let mut current = message.refs.load(Ordering::Acquire);
        loop {
            if current == 0 {
                log::error!("message refcount underflow for {:?}", message.kind);
                return;
            }
            match message.refs.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    if current == 1 {
                        self.recycle(Arc::clone(message));
                    }
                    return;
                }
                Err(observed) => current = observed,
            }
        }
    }

    fn recycle(&self, message: Arc<ChangeMessage>) {
        let mut free = self.free.lock().unwrap();
        if free.len() < self.capacity {
            free.push(message);
        }
    }

    /// Number of recycled messages currently pooled
    pub fn free_count(&self) -> usize {
        self.free.lock().unwrap().len()
    }
}

impl Default for MessagePool {
    fn default() -> Self {
        Self::new(crate::config::MessageConfig::default().pool_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refcount_round_trip_recycles() {
        let pool = MessagePool::new(8);
        let msg = pool.acquire(
            MessageKind::TransformChanged,
            Timestamp(1),
            ThreadKinds::TRANSFORM | ThreadKinds::GEOMETRY,
            vec![MessageArg::Id(NnuId(9))],
        );
        msg.inc_ref();
        msg.inc_ref();
        assert_eq!(msg.ref_count(), 2);

        pool.dec_ref(&msg);
        assert_eq!(pool.free_count(), 0);
        pool.dec_ref(&msg);
        drop(msg);
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn test_acquire_reuses_recycled_allocation() {
        let pool = MessagePool::new(8);
        let msg = pool.acquire(
            MessageKind::FrameTick,
            Timestamp(1),
            ThreadKinds::BEHAVIOR,
            Vec::new(),
        );
        msg.inc_ref();
        pool.dec_ref(&msg);
        drop(msg);
        assert_eq!(pool.free_count(), 1);

        let reused = pool.acquire(
            MessageKind::BehaviorPost,
            Timestamp(2),
            ThreadKinds::BEHAVIOR,
            Vec::new(),
        );
        assert_eq!(pool.free_count(), 0);
        assert_eq!(reused.kind, MessageKind::BehaviorPost);
        assert_eq!(reused.ref_count(), 0);
    }

    #[test]
    fn test_underflow_is_reported_not_fatal() {
        let pool = MessagePool::new(8);
        let msg = pool.acquire(
            MessageKind::FrameTick,
            Timestamp(1),
            ThreadKinds::BEHAVIOR,
            Vec::new(),
        );
        // No references taken; dec_ref must not wrap or recycle.
        pool.dec_ref(&msg);
        assert_eq!(msg.ref_count(), 0);
        assert_eq!(pool.free_count(), 0);
    }
}
