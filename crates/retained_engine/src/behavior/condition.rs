//! Wakeup condition tree
//!
//! AND/OR combinator tree over wakeup criteria. Nodes live in a slotmap
//! arena; parent links are non-owning back-handles carrying the child's
//! slot index, so `set_condition_met` can mark exactly one slot on the
//! way up. AND nodes forward only once every slot is met; OR nodes
//! forward on the first met child and swallow the rest.

use crate::behavior::wakeup::{CriterionKind, WakeupCriterion};
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle to a node in a wakeup condition tree
    pub struct WakeupNodeKey;
}

/// Node payload: a criterion leaf or a combinator
#[derive(Debug)]
enum WakeupNodeKind {
    Criterion(WakeupCriterion),
    And { met: Vec<bool>, forwarded: bool },
    Or { forwarded: bool },
}

#[derive(Debug)]
struct WakeupNode {
    kind: WakeupNodeKind,
    /// Non-owning back-handle plus this node's slot in the parent
    parent: Option<(WakeupNodeKey, usize)>,
    children: Vec<WakeupNodeKey>,
}

/// Combinator tree of wakeup criteria for one behavior
#[derive(Debug, Default)]
pub struct WakeupTree {
    nodes: SlotMap<WakeupNodeKey, WakeupNode>,
    root: Option<WakeupNodeKey>,
    condition_met: bool,
}

impl WakeupTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a criterion leaf
    pub fn criterion(&mut self, kind: CriterionKind) -> WakeupNodeKey {
        self.nodes.insert(WakeupNode {
            kind: WakeupNodeKind::Criterion(WakeupCriterion::new(kind)),
            parent: None,
            children: Vec::new(),
        })
    }

    /// Combine children under an AND node
    pub fn all_of(&mut self, children: Vec<WakeupNodeKey>) -> WakeupNodeKey {
        let met = vec![false; children.len()];
        let key = self.nodes.insert(WakeupNode {
            kind: WakeupNodeKind::And {
                met,
                forwarded: false,
            },
            parent: None,
            children: children.clone(),
        });
        self.adopt(key, &children);
        key
    }

    /// Combine children under an OR node
    pub fn any_of(&mut self, children: Vec<WakeupNodeKey>) -> WakeupNodeKey {
        let key = self.nodes.insert(WakeupNode {
            kind: WakeupNodeKind::Or { forwarded: false },
            parent: None,
            children: children.clone(),
        });
        self.adopt(key, &children);
        key
    }

    /// AND over OR groups
    pub fn all_of_any(&mut self, groups: Vec<Vec<WakeupNodeKey>>) -> WakeupNodeKey {
        let ors: Vec<WakeupNodeKey> = groups.into_iter().map(|g| self.any_of(g)).collect();
        self.all_of(ors)
    }

    /// OR over AND groups
    pub fn any_of_all(&mut self, groups: Vec<Vec<WakeupNodeKey>>) -> WakeupNodeKey {
        let ands: Vec<WakeupNodeKey> = groups.into_iter().map(|g| self.all_of(g)).collect();
        self.any_of(ands)
    }

    fn adopt(&mut self, parent: WakeupNodeKey, children: &[WakeupNodeKey]) {
        for (index, &child) in children.iter().enumerate() {
            self.nodes[child].parent = Some((parent, index));
        }
    }

    /// Designate the tree root
    pub fn set_root(&mut self, key: WakeupNodeKey) {
        self.root = Some(key);
    }

    /// Whether the root condition has been met since the last reset
    pub fn condition_met(&self) -> bool {
        self.condition_met
    }

    /// Read a criterion leaf
    pub fn criterion_at(&self, key: WakeupNodeKey) -> Option<&WakeupCriterion> {
        match &self.nodes.get(key)?.kind {
            WakeupNodeKind::Criterion(c) => Some(c),
            _ => None,
        }
    }

    /// Mutate a criterion leaf
    pub fn criterion_at_mut(&mut self, key: WakeupNodeKey) -> Option<&mut WakeupCriterion> {
        match &mut self.nodes.get_mut(key)?.kind {
            WakeupNodeKind::Criterion(c) => Some(c),
            _ => None,
        }
    }

    /// Every criterion leaf with its kind, in arena order
    pub fn criteria(&self) -> Vec<(WakeupNodeKey, CriterionKind)> {
        self.nodes
            .iter()
            .filter_map(|(key, node)| match &node.kind {
                WakeupNodeKind::Criterion(c) => Some((key, c.kind)),
                _ => None,
            })
            .collect()
    }

    /// Every criterion leaf handle
    pub fn all_elements(&self) -> Vec<WakeupNodeKey> {
        self.criteria().into_iter().map(|(key, _)| key).collect()
    }

    /// Criterion leaves that have triggered since the last reset
    pub fn triggered_elements(&self) -> Vec<WakeupNodeKey> {
        self.nodes
            .iter()
            .filter_map(|(key, node)| match &node.kind {
                WakeupNodeKind::Criterion(c) if c.is_triggered() => Some(key),
                _ => None,
            })
            .collect()
    }

    /// Trigger a criterion leaf and propagate bottom-up
    ///
    /// Returns whether this trigger newly met the root condition. An
    /// already-triggered criterion propagates nothing.
    pub fn set_triggered(&mut self, key: WakeupNodeKey) -> bool {
        let newly = match self.nodes.get_mut(key) {
            Some(node) => match &mut node.kind {
                WakeupNodeKind::Criterion(c) => c.trigger(),
                _ => {
                    log::error!("set_triggered on a combinator node");
                    false
                }
            },
            None => false,
        };
        if !newly {
            return false;
        }
        self.set_condition_met(key)
    }

    /// Bottom-up met propagation from a just-satisfied node
    fn set_condition_met(&mut self, key: WakeupNodeKey) -> bool {
        match self.nodes[key].parent {
            None => {
                if self.root == Some(key) && !self.condition_met {
                    self.condition_met = true;
                    return true;
                }
                false
            }
            Some((parent, slot)) => {
                let forward = match &mut self.nodes[parent].kind {
                    WakeupNodeKind::And { met, forwarded } => {
                        met[slot] = true;
                        if !*forwarded && met.iter().all(|m| *m) {
                            *forwarded = true;
                            true
                        } else {
                            false
                        }
                    }
                    WakeupNodeKind::Or { forwarded } => {
                        if *forwarded {
                            false
                        } else {
                            *forwarded = true;
                            true
                        }
                    }
                    WakeupNodeKind::Criterion(_) => {
                        log::error!("criterion node has children");
                        false
                    }
                };
                if forward {
                    self.set_condition_met(parent)
                } else {
                    false
                }
            }
        }
    }

    /// Clear all triggered/met/forwarded state, re-arming every criterion
    ///
    /// Idempotent; safe on a tree that never triggered.
    pub fn reset_tree(&mut self) {
        for (_, node) in &mut self.nodes {
            match &mut node.kind {
                WakeupNodeKind::Criterion(c) => c.reset(),
                WakeupNodeKind::And { met, forwarded } => {
                    met.iter_mut().for_each(|m| *m = false);
                    *forwarded = false;
                }
                WakeupNodeKind::Or { forwarded } => *forwarded = false,
            }
        }
        self.condition_met = false;
    }

    /// Number of nodes (criteria and combinators)
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Children of a node, in slot order
    pub fn children(&self, key: WakeupNodeKey) -> &[WakeupNodeKey] {
        self.nodes
            .get(key)
            .map_or(&[], |node| node.children.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn activation_leaves(tree: &mut WakeupTree, count: usize) -> Vec<WakeupNodeKey> {
        (0..count)
            .map(|_| tree.criterion(CriterionKind::Activation))
            .collect()
    }

    #[test]
    fn test_and_requires_all_children() {
        let mut rng = StdRng::seed_from_u64(42);
        for n in 1..=5 {
            for _ in 0..20 {
                let mut tree = WakeupTree::new();
                let leaves = activation_leaves(&mut tree, n);
                let root = tree.all_of(leaves.clone());
                tree.set_root(root);

                let mut order = leaves;
                order.shuffle(&mut rng);
                for (i, &leaf) in order.iter().enumerate() {
                    let newly_met = tree.set_triggered(leaf);
                    assert_eq!(newly_met, i == n - 1);
                    assert_eq!(tree.condition_met(), i == n - 1);
                }
            }
        }
    }

    #[test]
    fn test_or_triggers_on_first_child_only() {
        // Trigger order [2, 0, 1]: a single upward propagation on the
        // first trigger, none on the later ones.
        let mut tree = WakeupTree::new();
        let leaves = activation_leaves(&mut tree, 3);
        let root = tree.any_of(leaves.clone());
        tree.set_root(root);

        assert!(tree.set_triggered(leaves[2]));
        assert!(!tree.set_triggered(leaves[0]));
        assert!(!tree.set_triggered(leaves[1]));
        assert!(tree.condition_met());
        assert_eq!(tree.triggered_elements().len(), 3);
    }

    #[test]
    fn test_retrigger_does_not_propagate() {
        let mut tree = WakeupTree::new();
        let leaves = activation_leaves(&mut tree, 2);
        let root = tree.all_of(leaves.clone());
        tree.set_root(root);

        assert!(!tree.set_triggered(leaves[0]));
        assert!(!tree.set_triggered(leaves[0]));
        assert!(tree.set_triggered(leaves[1]));
    }

    #[test]
    fn test_and_of_ors_randomized() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let mut tree = WakeupTree::new();
            let group_a = activation_leaves(&mut tree, 3);
            let group_b = activation_leaves(&mut tree, 2);
            let root = tree.all_of_any(vec![group_a.clone(), group_b.clone()]);
            tree.set_root(root);

            // One pick per group satisfies the AND-of-ORs.
            let pick_a = *group_a.choose(&mut rng).unwrap();
            let pick_b = *group_b.choose(&mut rng).unwrap();
            let first_met = tree.set_triggered(pick_a);
            let second_met = tree.set_triggered(pick_b);
            assert!(!first_met);
            assert!(second_met);
            assert!(tree.condition_met());
        }
    }

    #[test]
    fn test_or_of_ands_needs_one_full_group() {
        let mut tree = WakeupTree::new();
        let group_a = activation_leaves(&mut tree, 2);
        let group_b = activation_leaves(&mut tree, 2);
        let root = tree.any_of_all(vec![group_a.clone(), group_b.clone()]);
        tree.set_root(root);

        assert!(!tree.set_triggered(group_a[0]));
        assert!(!tree.set_triggered(group_b[0]));
        assert!(tree.set_triggered(group_b[1]));
        assert!(tree.condition_met());
    }

    #[test]
    fn test_single_criterion_root() {
        let mut tree = WakeupTree::new();
        let leaf = tree.criterion(CriterionKind::Activation);
        tree.set_root(leaf);

        assert!(tree.set_triggered(leaf));
        assert!(tree.condition_met());
    }

    #[test]
    fn test_reset_is_idempotent_and_rearms() {
        let mut tree = WakeupTree::new();
        let leaves = activation_leaves(&mut tree, 2);
        let root = tree.all_of(leaves.clone());
        tree.set_root(root);

        // Reset before any trigger is safe.
        tree.reset_tree();

        tree.set_triggered(leaves[0]);
        tree.set_triggered(leaves[1]);
        assert!(tree.condition_met());

        tree.reset_tree();
        tree.reset_tree();
        assert!(!tree.condition_met());
        assert!(tree.triggered_elements().is_empty());

        // The tree fires again after a full reset.
        tree.set_triggered(leaves[0]);
        assert!(tree.set_triggered(leaves[1]));
    }
}
