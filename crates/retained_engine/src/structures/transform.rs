//! Transform structure
//!
//! Tracks local-to-world transforms and owns the published update-target
//! snapshot. Node insertion and removal messages carry category/target
//! pairs; the structure folds them into the snapshot with the sorted
//! set operations and republishes, so traversal threads always read a
//! consistent [`CachedTargets`].

use crate::foundation::math::Mat4;
use crate::foundation::time::Timestamp;
use crate::structures::message::{ChangeMessage, MessageArg, MessageKind, ThreadKinds};
use crate::structures::targets::{CachedTargets, NnuId, Targets};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::structure::Structure;

/// Per-node transform state and the published target snapshot
pub struct TransformStructure {
    transforms: HashMap<NnuId, Mat4>,
    accumulator: Targets,
    cached: Arc<Mutex<CachedTargets>>,
}

impl Default for TransformStructure {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformStructure {
    /// Create an empty transform structure
    pub fn new() -> Self {
        Self {
            transforms: HashMap::new(),
            accumulator: Targets::new(),
            cached: Arc::new(Mutex::new(CachedTargets::default())),
        }
    }

    /// Shared handle to the published snapshot
    ///
    /// Clone this before handing the structure to a worker; it stays
    /// valid across every republish.
    pub fn cached_targets(&self) -> Arc<Mutex<CachedTargets>> {
        Arc::clone(&self.cached)
    }

    /// Last known local-to-world transform of a node
    pub fn world_transform(&self, id: NnuId) -> Option<Mat4> {
        self.transforms.get(&id).copied()
    }

    /// Number of nodes with a tracked transform
    pub fn tracked_count(&self) -> usize {
        self.transforms.len()
    }

    /// Fold category/target argument pairs into the accumulator
    fn collect_targets(&mut self, args: &[MessageArg]) {
        let mut category = None;
        for arg in args {
            match arg {
                MessageArg::Category(c) => category = Some(*c),
                MessageArg::Target(target) => match category {
                    Some(c) => self.accumulator.add_node(c, Arc::clone(target)),
                    None => log::error!("target argument without a preceding category"),
                },
                _ => {}
            }
        }
    }

    fn handle_inserted(&mut self, message: &ChangeMessage) {
        self.collect_targets(&message.args);
        if self.accumulator.is_empty() {
            return;
        }
        let mut cached = self.cached.lock().unwrap();
        let next = cached.snapshot_add(&mut self.accumulator);
        log::debug!(
            "target snapshot grown; worker kinds now {:?}",
            next.compute_target_threads()
        );
        *cached = next;
    }

    fn handle_removed(&mut self, message: &ChangeMessage) {
        self.collect_targets(&message.args);
        for arg in &message.args {
            if let MessageArg::Id(id) = arg {
                self.transforms.remove(id);
            }
        }
        if self.accumulator.is_empty() {
            return;
        }
        let mut cached = self.cached.lock().unwrap();
        match cached.snapshot_remove(&mut self.accumulator) {
            Ok(next) => *cached = next,
            // Already reported; the previous snapshot stays published.
            Err(_) => {}
        }
    }

    fn handle_transform_changed(&mut self, message: &ChangeMessage) {
        let mut id = None;
        for arg in &message.args {
            match arg {
                MessageArg::Id(node) => id = Some(*node),
                MessageArg::Transform(matrix) => match id {
                    Some(node) => {
                        self.transforms.insert(node, *matrix);
                    }
                    None => log::error!("transform argument without a preceding node id"),
                },
                _ => {}
            }
        }
    }
}

impl Structure for TransformStructure {
    fn kind(&self) -> ThreadKinds {
        ThreadKinds::TRANSFORM
    }

    fn process_messages(&mut self, messages: &[Arc<ChangeMessage>], _reference_time: Timestamp) {
        for message in messages {
            match message.kind {
                MessageKind::NodesInserted => self.handle_inserted(message),
                MessageKind::NodesRemoved => self.handle_removed(message),
                MessageKind::TransformChanged => self.handle_transform_changed(message),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::message::MessagePool;
    use crate::structures::targets::{SceneTarget, TargetCategory, TargetRef};

    struct Node(NnuId);

    impl SceneTarget for Node {
        fn nnu_id(&self) -> NnuId {
            self.0
        }
    }

    fn node(id: u64) -> TargetRef {
        Arc::new(Node(NnuId(id)))
    }

    fn process(structure: &mut TransformStructure, message: Arc<ChangeMessage>) {
        structure.process_messages(&[message], Timestamp(1));
    }

    #[test]
    fn test_insertion_publishes_snapshot() {
        let pool = MessagePool::new(8);
        let mut structure = TransformStructure::new();
        let cached = structure.cached_targets();

        let msg = pool.acquire(
            MessageKind::NodesInserted,
            Timestamp(1),
            ThreadKinds::TRANSFORM,
            vec![
                MessageArg::Category(TargetCategory::Geometry),
                MessageArg::Target(node(3)),
                MessageArg::Target(node(1)),
                MessageArg::Category(TargetCategory::Behavior),
                MessageArg::Target(node(5)),
            ],
        );
        process(&mut structure, msg);

        let snapshot = cached.lock().unwrap();
        let geo: Vec<u64> = snapshot
            .get(TargetCategory::Geometry)
            .unwrap()
            .iter()
            .map(|t| t.nnu_id().0)
            .collect();
        assert_eq!(geo, vec![1, 3]);
        assert!(snapshot.get(TargetCategory::Behavior).is_some());
        assert!(snapshot
            .compute_target_threads()
            .contains(ThreadKinds::BEHAVIOR | ThreadKinds::GEOMETRY | ThreadKinds::RENDER));
    }

    #[test]
    fn test_removal_shrinks_snapshot_and_drops_transform() {
        let pool = MessagePool::new(8);
        let mut structure = TransformStructure::new();
        let cached = structure.cached_targets();
        let target = node(9);

        let insert = pool.acquire(
            MessageKind::NodesInserted,
            Timestamp(1),
            ThreadKinds::TRANSFORM,
            vec![
                MessageArg::Category(TargetCategory::Group),
                MessageArg::Target(target.clone()),
            ],
        );
        process(&mut structure, insert);

        let moved = pool.acquire(
            MessageKind::TransformChanged,
            Timestamp(2),
            ThreadKinds::TRANSFORM,
            vec![MessageArg::Id(NnuId(9)), MessageArg::Transform(Mat4::identity())],
        );
        process(&mut structure, moved);
        assert!(structure.world_transform(NnuId(9)).is_some());

        let remove = pool.acquire(
            MessageKind::NodesRemoved,
            Timestamp(3),
            ThreadKinds::TRANSFORM,
            vec![
                MessageArg::Id(NnuId(9)),
                MessageArg::Category(TargetCategory::Group),
                MessageArg::Target(target),
            ],
        );
        process(&mut structure, remove);

        assert!(cached.lock().unwrap().is_empty());
        assert!(structure.world_transform(NnuId(9)).is_none());
    }

    #[test]
    fn test_bad_removal_keeps_previous_snapshot() {
        let pool = MessagePool::new(8);
        let mut structure = TransformStructure::new();
        let cached = structure.cached_targets();

        let insert = pool.acquire(
            MessageKind::NodesInserted,
            Timestamp(1),
            ThreadKinds::TRANSFORM,
            vec![
                MessageArg::Category(TargetCategory::Sound),
                MessageArg::Target(node(1)),
            ],
        );
        process(&mut structure, insert);

        // Removing a target that was never inserted must not clobber the
        // published snapshot.
        let remove = pool.acquire(
            MessageKind::NodesRemoved,
            Timestamp(2),
            ThreadKinds::TRANSFORM,
            vec![
                MessageArg::Category(TargetCategory::Sound),
                MessageArg::Target(node(2)),
            ],
        );
        process(&mut structure, remove);

        let snapshot = cached.lock().unwrap();
        assert_eq!(snapshot.get(TargetCategory::Sound).unwrap().len(), 1);
    }
}
