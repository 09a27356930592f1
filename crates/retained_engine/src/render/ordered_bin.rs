//! Ordered bins
//!
//! An ordered bin keeps one collection of atoms per ordered-group child
//! and must preserve the group's child order across concurrent scene
//! edits. Structural edits queue as pending operations and apply at a
//! frame boundary in a fixed sequence: sets addressed by current-frame
//! index first, then the add/remove list in issue order, then sets
//! addressed by next frame's child positions. The sequence is
//! load-bearing; reordering it corrupts rendering order.

use crate::render::atom::RenderAtomKey;

/// Atoms rendered for one ordered-group child
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedCollection {
    /// The scene child this collection renders
    pub child_id: u64,
    /// Atoms in draw order
    pub atoms: Vec<RenderAtomKey>,
}

impl OrderedCollection {
    /// Create an empty collection for a child
    pub fn new(child_id: u64) -> Self {
        Self {
            child_id,
            atoms: Vec::new(),
        }
    }
}

/// Queued structural edit on the child-collection array
#[derive(Debug)]
enum OrderedChildOp {
    Add(OrderedCollection),
    Remove { child_id: u64 },
}

/// State-sorted aggregation for one ordered group
#[derive(Debug, Default)]
pub struct OrderedBin {
    collections: Vec<OrderedCollection>,
    /// Sets addressed by current-frame index
    pending_index_sets: Vec<(usize, OrderedCollection)>,
    /// Adds and removes, kept in issue order
    pending_child_ops: Vec<OrderedChildOp>,
    /// Sets addressed by next frame's child position
    pending_oi_sets: Vec<(usize, OrderedCollection)>,
}

impl OrderedBin {
    /// Create an empty bin
    pub fn new() -> Self {
        Self::default()
    }

    /// Current child collections, in render order
    pub fn collections(&self) -> &[OrderedCollection] {
        &self.collections
    }

    /// Child ids in current render order
    pub fn child_ids(&self) -> Vec<u64> {
        self.collections.iter().map(|c| c.child_id).collect()
    }

    /// Whether structural edits are waiting for the frame boundary
    pub fn has_pending(&self) -> bool {
        !self.pending_index_sets.is_empty()
            || !self.pending_child_ops.is_empty()
            || !self.pending_oi_sets.is_empty()
    }

    /// Queue a replacement addressed by current-frame index
    pub fn queue_set_at(&mut self, index: usize, collection: OrderedCollection) {
        self.pending_index_sets.push((index, collection));
    }

    /// Queue the addition of a child collection
    pub fn queue_add(&mut self, collection: OrderedCollection) {
        self.pending_child_ops.push(OrderedChildOp::Add(collection));
    }

    /// Queue the removal of a child collection
    pub fn queue_remove(&mut self, child_id: u64) {
        self.pending_child_ops
            .push(OrderedChildOp::Remove { child_id });
    }

    /// Queue a replacement addressed by next frame's child position
    pub fn queue_set_at_ordered(&mut self, ordered_index: usize, collection: OrderedCollection) {
        self.pending_oi_sets.push((ordered_index, collection));
    }

    /// Apply every queued operation at a frame boundary
    ///
    /// Sequence: current-index sets, then adds/removes in issue order,
    /// then ordered-index sets against the post-edit table.
    pub fn apply_pending(&mut self) {
        for (index, collection) in self.pending_index_sets.drain(..) {
            match self.collections.get_mut(index) {
                Some(slot) => *slot = collection,
                None => log::error!("ordered set at dead index {index}"),
            }
        }

        for op in self.pending_child_ops.drain(..) {
            match op {
                OrderedChildOp::Add(collection) => {
                    let at = self
                        .collections
                        .partition_point(|c| c.child_id < collection.child_id);
                    self.collections.insert(at, collection);
                }
                OrderedChildOp::Remove { child_id } => {
                    match self.collections.iter().position(|c| c.child_id == child_id) {
                        Some(at) => {
                            self.collections.remove(at);
                        }
                        None => log::error!("ordered remove of unknown child {child_id}"),
                    }
                }
            }
        }

        for (ordered_index, collection) in self.pending_oi_sets.drain(..) {
            match self.collections.get_mut(ordered_index) {
                Some(slot) => *slot = collection,
                None => log::error!("ordered set at dead ordered index {ordered_index}"),
            }
        }
    }
}
