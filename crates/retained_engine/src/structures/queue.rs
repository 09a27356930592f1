//! Per-structure inbound message queue
//!
//! Messages are kept in arrival order. Draining takes the stable prefix
//! whose timestamps are at or before the reference time: if message k
//! does not qualify, nothing after k is returned even if its timestamp
//! would qualify. This models "process everything known as of this tick,
//! in arrival order" and preserves happens-before over strict timestamp
//! order.

use crate::foundation::time::Timestamp;
use crate::structures::message::{ChangeMessage, MessagePool};
use std::collections::VecDeque;
use std::sync::Arc;

/// Inbound queue owned by one structure
#[derive(Debug, Default)]
pub struct MessageQueue {
    pending: VecDeque<Arc<ChangeMessage>>,
    last_update: Option<Timestamp>,
}

impl MessageQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, taking a consumption reference on it
    pub fn add_message(&mut self, message: Arc<ChangeMessage>) {
        message.inc_ref();
        self.last_update = Some(message.timestamp);
        self.pending.push_back(message);
    }

    /// Drain the stable prefix with timestamps ≤ `reference_time`
    ///
    /// The caller is responsible for releasing each returned message's
    /// consumption reference after processing.
    pub fn get_messages(&mut self, reference_time: Timestamp) -> Vec<Arc<ChangeMessage>> {
        let qualifying = self
            .pending
            .iter()
            .take_while(|m| m.timestamp <= reference_time)
            .count();
        self.pending.drain(..qualifying).collect()
    }

    /// Release every still-queued message back to the pool
    ///
    /// Must run before the structure is discarded, or refcounts leak in
    /// the shared pool.
    pub fn clear_messages(&mut self, pool: &MessagePool) {
        for message in self.pending.drain(..) {
            pool.dec_ref(&message);
        }
        self.last_update = None;
    }

    /// Timestamp of the most recently queued message
    pub fn last_update(&self) -> Option<Timestamp> {
        self.last_update
    }

    /// Number of queued messages
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::message::{MessageKind, ThreadKinds};

    fn message(pool: &MessagePool, stamp: u64) -> Arc<ChangeMessage> {
        pool.acquire(
            MessageKind::FrameTick,
            Timestamp(stamp),
            ThreadKinds::BEHAVIOR,
            Vec::new(),
        )
    }

    #[test]
    fn test_prefix_drain_is_stable() {
        let pool = MessagePool::new(8);
        let mut queue = MessageQueue::new();
        // Out-of-order arrival: the stamp-5 message blocks the stamp-2
        // message behind it.
        queue.add_message(message(&pool, 1));
        queue.add_message(message(&pool, 5));
        queue.add_message(message(&pool, 2));

        let batch = queue.get_messages(Timestamp(3));
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].timestamp, Timestamp(1));
        assert_eq!(queue.len(), 2);

        let batch = queue.get_messages(Timestamp(5));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].timestamp, Timestamp(5));
        assert_eq!(batch[1].timestamp, Timestamp(2));
    }

    #[test]
    fn test_order_preservation() {
        let pool = MessagePool::new(8);
        let mut queue = MessageQueue::new();
        let m1 = message(&pool, 1);
        let m2 = message(&pool, 2);
        queue.add_message(m1.clone());
        queue.add_message(m2.clone());

        // m2 is never delivered without m1 having been delivered first.
        let batch = queue.get_messages(Timestamp(2));
        assert!(Arc::ptr_eq(&batch[0], &m1));
        assert!(Arc::ptr_eq(&batch[1], &m2));
    }

    #[test]
    fn test_clear_messages_releases_references() {
        let pool = MessagePool::new(8);
        let mut queue = MessageQueue::new();
        let msg = message(&pool, 1);
        queue.add_message(msg.clone());
        assert_eq!(msg.ref_count(), 1);

        queue.clear_messages(&pool);
        assert!(queue.is_empty());
        assert_eq!(msg.ref_count(), 0);
        assert!(queue.last_update().is_none());
    }

    #[test]
    fn test_last_update_tracks_arrival() {
        let pool = MessagePool::new(8);
        let mut queue = MessageQueue::new();
        assert!(queue.last_update().is_none());
        queue.add_message(message(&pool, 7));
        assert_eq!(queue.last_update(), Some(Timestamp(7)));
    }
}
