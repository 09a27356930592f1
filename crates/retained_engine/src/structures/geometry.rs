//! Geometry structure
//!
//! Maintains the bounding-hull tree over geometry-bearing leaves.
//! Insertions descend the tree (deferring where no child contains the
//! new hull), removals collapse the leaf's parent, and transform or
//! geometry changes mark the ancestor path for one lazy hull update at
//! the end of the batch.

use crate::config::SpatialConfig;
use crate::foundation::time::Timestamp;
use crate::spatial::{BhNodeKey, BhTree, DeferredInserts, HullSource};
use crate::structures::message::{ChangeMessage, MessageArg, MessageKind, ThreadKinds};
use crate::structures::targets::NnuId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::structure::Structure;

/// Spatial-index maintenance over geometry leaves
pub struct GeometryStructure {
    tree: Arc<Mutex<BhTree>>,
    leaves: HashMap<NnuId, BhNodeKey>,
    deferred: DeferredInserts,
}

impl GeometryStructure {
    /// Create an empty geometry structure
    pub fn new(config: &SpatialConfig) -> Self {
        Self {
            tree: Arc::new(Mutex::new(BhTree::new(config))),
            leaves: HashMap::new(),
            deferred: DeferredInserts::default(),
        }
    }

    /// Shared handle to the bounding-hull tree
    ///
    /// Visibility and pick queries run against this handle; clone it
    /// before handing the structure to a worker.
    pub fn tree(&self) -> Arc<Mutex<BhTree>> {
        Arc::clone(&self.tree)
    }

    /// Number of tracked geometry leaves
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    fn handle_inserted(&mut self, tree: &mut BhTree, message: &ChangeMessage) {
        let mut id = None;
        for arg in &message.args {
            match arg {
                MessageArg::Id(node) => id = Some(*node),
                MessageArg::Hull(source) => {
                    let Some(node_id) = id else {
                        log::error!("hull argument without a preceding node id");
                        continue;
                    };
                    self.insert_leaf(tree, node_id, Arc::clone(source));
                }
                _ => {}
            }
        }
    }

    fn insert_leaf(&mut self, tree: &mut BhTree, id: NnuId, source: Arc<dyn HullSource>) {
        let key = tree.create_leaf(source);
        tree.widen_root(&tree.hull_of(key));
        match tree.insert(key, &mut self.deferred) {
            Ok(()) => {
                self.leaves.insert(id, key);
            }
            Err(err) => {
                // Cannot happen after widening; a dead key would mean the
                // slot map handed back a stale handle.
                log::error!("geometry insert failed for {id:?}: {err}");
                tree.detach_leaf(key);
            }
        }
    }

    fn handle_removed(&mut self, tree: &mut BhTree, message: &ChangeMessage) {
        for arg in &message.args {
            if let MessageArg::Id(id) = arg {
                match self.leaves.remove(id) {
                    Some(key) => {
                        tree.detach_leaf(key);
                    }
                    None => log::error!("removal of untracked geometry leaf {id:?}"),
                }
            }
        }
    }

    fn handle_changed(&mut self, tree: &mut BhTree, message: &ChangeMessage) -> bool {
        let mut marked = false;
        for arg in &message.args {
            if let MessageArg::Id(id) = arg {
                match self.leaves.get(id) {
                    Some(&key) => {
                        tree.mark_path(key);
                        marked = true;
                    }
                    None => log::error!("change to untracked geometry leaf {id:?}"),
                }
            }
        }
        marked
    }
}

impl Structure for GeometryStructure {
    fn kind(&self) -> ThreadKinds {
        ThreadKinds::GEOMETRY
    }

    fn process_messages(&mut self, messages: &[Arc<ChangeMessage>], _reference_time: Timestamp) {
        let tree = Arc::clone(&self.tree);
        let mut tree = tree.lock().unwrap();
        let mut any_marked = false;

        for message in messages {
            match message.kind {
                MessageKind::NodesInserted => self.handle_inserted(&mut tree, message),
                MessageKind::NodesRemoved => self.handle_removed(&mut tree, message),
                MessageKind::TransformChanged | MessageKind::GeometryChanged => {
                    any_marked |= self.handle_changed(&mut tree, message);
                }
                _ => {}
            }
        }

        // Deferred insertions splice in once the batch is settled, then a
        // single pass refreshes every marked path.
        if !self.deferred.is_empty() {
            self.deferred.apply(&mut tree);
        }
        if any_marked {
            if let Some(root) = tree.root() {
                tree.update_marked_hull(root);
            }
        }
    }
}
