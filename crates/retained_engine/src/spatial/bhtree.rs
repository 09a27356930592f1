//! Bounding-hull tree
//!
//! Binary spatial tree over scene leaves. Internal nodes own exactly two
//! children and carry the union of their children's hulls; leaf nodes wrap
//! a [`HullSource`] capability without owning the scene object behind it.
//! Hull recomputation is lazy: transform changes mark the path from the
//! changed leaf to the root, and [`BhTree::update_marked_hull`] recomputes
//! only along marked paths.

use crate::config::SpatialConfig;
use crate::foundation::collections::{ObjectPool, Recycle};
use crate::foundation::math::{BoundingBox, Frustum, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slotmap::{new_key_type, SlotMap};
use std::sync::Arc;
use thiserror::Error;

new_key_type! {
    /// Stable handle to a node in the bounding-hull tree
    pub struct BhNodeKey;
}

/// Errors from bounding-hull tree operations
#[derive(Debug, Error)]
pub enum SpatialError {
    /// Insertion precondition violated: the target subtree's hull does not
    /// contain the inserted node's hull. This indicates a caller
    /// bookkeeping bug, never silently corrected.
    #[error("inserted node's hull is not contained by the subtree hull")]
    InsertOutsideHull,

    /// A handle did not resolve to a live node
    #[error("unknown bounding-hull tree node")]
    UnknownNode,
}

/// Capability interface supplied by scene leaves
///
/// The tree never inspects concrete scene-node types; bounds, enable
/// state, and locale membership all come through this trait.
pub trait HullSource: Send + Sync {
    /// Compute the current bounding hull of the wrapped object
    fn compute_hull(&self) -> BoundingBox;

    /// Whether the wrapped object participates in visibility queries
    fn is_enabled(&self) -> bool;

    /// Identifier of the locale the wrapped object belongs to
    fn locale_id(&self) -> u32;
}

/// Node payload: internal with two child slots, or a leaf wrapper
#[derive(Default)]
pub enum BhNodeContent {
    /// Internal node owning up to two children
    Internal {
        /// Left child
        left: Option<BhNodeKey>,
        /// Right child
        right: Option<BhNodeKey>,
    },
    /// Leaf wrapping a scene capability (never owned exclusively)
    #[default]
    Leaf,
}

/// One node of the bounding-hull tree
pub struct BhNode {
    /// Current hull; for internal nodes the union of live children
    pub hull: BoundingBox,
    /// Non-owning back-reference to the parent
    pub parent: Option<BhNodeKey>,
    /// Dirty flag for lazy hull recomputation
    pub mark: bool,
    /// Internal/leaf payload
    pub content: BhNodeContent,
    /// Leaf capability, present on leaf nodes only
    pub source: Option<Arc<dyn HullSource>>,
}

impl Default for BhNode {
    fn default() -> Self {
        Self {
            hull: BoundingBox::EMPTY,
            parent: None,
            mark: false,
            content: BhNodeContent::Leaf,
            source: None,
        }
    }
}

impl Recycle for BhNode {
    fn recycle(&mut self) {
        self.hull = BoundingBox::EMPTY;
        self.parent = None;
        self.mark = false;
        self.content = BhNodeContent::Leaf;
        self.source = None;
    }
}

impl BhNode {
    /// Whether this node is a leaf
    pub fn is_leaf(&self) -> bool {
        matches!(self.content, BhNodeContent::Leaf)
    }
}

/// Side-structure receiving insertions that found no containing child
///
/// When descent reaches an internal node none of whose internal children
/// contain the new node's hull, the insertion is handed off here instead
/// of forcing a hull expansion mid-descent. Implementations group the
/// deferred nodes and splice them in afterwards.
pub trait InsertStructure {
    /// Record that `node` fell out of descent at `anchor`
    fn lookup_and_insert(&mut self, anchor: BhNodeKey, node: BhNodeKey);
}

/// Default insert side-structure: queues deferred insertions in order
#[derive(Debug, Default)]
pub struct DeferredInserts {
    pending: Vec<(BhNodeKey, BhNodeKey)>,
}

impl InsertStructure for DeferredInserts {
    fn lookup_and_insert(&mut self, anchor: BhNodeKey, node: BhNodeKey) {
        self.pending.push((anchor, node));
    }
}

impl DeferredInserts {
    /// Whether any insertions are pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Splice all pending nodes into the tree under their anchors
    pub fn apply(&mut self, tree: &mut BhTree) {
        for (anchor, node) in std::mem::take(&mut self.pending) {
            tree.attach_under(anchor, node);
        }
    }
}

/// Binary bounding-hull tree
pub struct BhTree {
    nodes: SlotMap<BhNodeKey, BhNode>,
    root: Option<BhNodeKey>,
    rng: StdRng,
    pool: ObjectPool<BhNode>,
}

impl BhTree {
    /// Create an empty tree
    pub fn new(config: &SpatialConfig) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root: None,
            rng: StdRng::seed_from_u64(config.rng_seed),
            pool: ObjectPool::new(config.node_pool_capacity),
        }
    }

    /// Current root handle, if the tree is non-empty
    pub fn root(&self) -> Option<BhNodeKey> {
        self.root
    }

    /// Number of live nodes (internal and leaf)
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Access a node by handle
    pub fn node(&self, key: BhNodeKey) -> Option<&BhNode> {
        self.nodes.get(key)
    }

    /// Hull of a node, or the empty hull for a dead handle
    pub fn hull_of(&self, key: BhNodeKey) -> BoundingBox {
        self.nodes.get(key).map_or(BoundingBox::EMPTY, |n| n.hull)
    }

    /// Widen the root hull to enclose `hull`
    ///
    /// Hull growth happens here, before insertion, never during descent.
    /// A leaf root keeps its exact hull; the two-node join covers that
    /// case on insert.
    pub fn widen_root(&mut self, hull: &BoundingBox) {
        if let Some(root) = self.root {
            if !self.nodes[root].is_leaf() {
                self.nodes[root].hull.enclose(hull);
            }
        }
    }

    /// Create a leaf node wrapping a scene capability
    ///
    /// The leaf's hull is computed from the source immediately, so the
    /// leaf-encloses-geometry invariant holds from birth.
    pub fn create_leaf(&mut self, source: Arc<dyn HullSource>) -> BhNodeKey {
        let mut node = self.pool.acquire();
        node.hull = source.compute_hull();
        node.content = BhNodeContent::Leaf;
        node.source = Some(source);
        self.nodes.insert(node)
    }

    /// Insert a node into the tree
    ///
    /// Descends into the internal child whose hull already contains the
    /// node's hull. If both children qualify the tie is broken uniformly
    /// at random; if neither qualifies the insertion is deferred to
    /// `insert_structure` rather than expanding hulls mid-descent. Leaf
    /// children are never descended into.
    pub fn insert(
        &mut self,
        node: BhNodeKey,
        insert_structure: &mut dyn InsertStructure,
    ) -> Result<(), SpatialError> {
        let node_hull = self.nodes.get(node).ok_or(SpatialError::UnknownNode)?.hull;

        let Some(root) = self.root else {
            self.root = Some(node);
            return Ok(());
        };

        if self.nodes[root].is_leaf() {
            // Two-node tree: join the old root and the new node under a
            // fresh internal node.
            let joined = self.new_internal(root, node);
            self.root = Some(joined);
            return Ok(());
        }

        if !self.nodes[root].hull.contains(&node_hull) {
            // Caller bookkeeping bug: locale bounds must be widened before
            // inserting. Reported, never silently corrected.
            log::error!("bounding-hull tree insert: node hull outside root hull");
            return Err(SpatialError::InsertOutsideHull);
        }

        let mut current = root;
        loop {
            let (left, right) = match self.nodes[current].content {
                BhNodeContent::Internal { left, right } => (left, right),
                BhNodeContent::Leaf => unreachable!("descent never enters leaves"),
            };

            let left_ok = left.map_or(false, |c| {
                !self.nodes[c].is_leaf() && self.nodes[c].hull.contains(&node_hull)
            });
            let right_ok = right.map_or(false, |c| {
                !self.nodes[c].is_leaf() && self.nodes[c].hull.contains(&node_hull)
            });

            current = match (left_ok, right_ok) {
                (true, true) => {
                    // Uniform tie-break keeps the tree from skewing to one
                    // side under repeated co-located insertions.
                    if self.rng.gen_bool(0.5) {
                        left.unwrap()
                    } else {
                        right.unwrap()
                    }
                }
                (true, false) => left.unwrap(),
                (false, true) => right.unwrap(),
                (false, false) => {
                    insert_structure.lookup_and_insert(current, node);
                    return Ok(());
                }
            };
        }
    }

    /// Splice `node` into the tree under `anchor`
    ///
    /// Used by insert side-structures after descent. Pairs the node with
    /// the anchor child whose hull grows least, under a new internal node,
    /// then refreshes ancestor hulls.
    pub fn attach_under(&mut self, anchor: BhNodeKey, node: BhNodeKey) {
        let node_hull = self.nodes[node].hull;
        let (left, right) = match self.nodes[anchor].content {
            BhNodeContent::Internal { left, right } => (left, right),
            BhNodeContent::Leaf => {
                debug_assert!(false, "attach anchor must be an internal node");
                log::error!("bounding-hull tree attach: anchor is a leaf");
                return;
            }
        };

        // Fill an empty child slot directly when one exists.
        if left.is_none() || right.is_none() {
            let (new_left, new_right) = if left.is_none() {
                (Some(node), right)
            } else {
                (left, Some(node))
            };
            self.nodes[anchor].content = BhNodeContent::Internal {
                left: new_left,
                right: new_right,
            };
            self.nodes[node].parent = Some(anchor);
            self.refresh_upward(node);
            return;
        }

        let (left, right) = (left.unwrap(), right.unwrap());
        let grow_left = union_volume(&self.nodes[left].hull, &node_hull);
        let grow_right = union_volume(&self.nodes[right].hull, &node_hull);
        let partner = if grow_left <= grow_right { left } else { right };

        let joined = self.new_internal(partner, node);
        let (left_slot, right_slot) = if partner == left {
            (Some(joined), Some(right))
        } else {
            (Some(left), Some(joined))
        };
        self.nodes[anchor].content = BhNodeContent::Internal {
            left: left_slot,
            right: right_slot,
        };
        self.nodes[joined].parent = Some(anchor);
        self.refresh_upward(joined);
    }

    /// Full bottom-up hull recomputation for the subtree rooted at `key`
    ///
    /// An internal node's hull becomes the union of its live children's
    /// hulls; with one live child it inherits that child's hull; with none
    /// it becomes the empty hull.
    pub fn compute_bounding_hull(&mut self, key: BhNodeKey) -> BoundingBox {
        let (left, right) = match self.nodes[key].content {
            BhNodeContent::Leaf => {
                let hull = self.nodes[key]
                    .source
                    .as_ref()
                    .map_or(BoundingBox::EMPTY, |s| s.compute_hull());
                self.nodes[key].hull = hull;
                return hull;
            }
            BhNodeContent::Internal { left, right } => (left, right),
        };

        let mut hull = BoundingBox::EMPTY;
        if let Some(child) = left {
            hull.enclose(&self.compute_bounding_hull(child));
        }
        if let Some(child) = right {
            hull.enclose(&self.compute_bounding_hull(child));
        }
        self.nodes[key].hull = hull;
        hull
    }

    /// Mark the path from `key` up to the root as dirty
    ///
    /// Callers must mark exactly the ancestor chain of every changed leaf;
    /// [`Self::update_marked_hull`] is only correct when dirty marks form
    /// connected ancestor chains.
    pub fn mark_path(&mut self, key: BhNodeKey) {
        let mut current = Some(key);
        while let Some(k) = current {
            let node = &mut self.nodes[k];
            if node.mark {
                // Ancestors of an already-marked node are marked too.
                break;
            }
            node.mark = true;
            current = node.parent;
        }
    }

    /// Recompute hulls only along marked paths, clearing marks
    ///
    /// Unmarked subtrees keep their cached hulls untouched.
    pub fn update_marked_hull(&mut self, key: BhNodeKey) -> BoundingBox {
        if !self.nodes[key].mark {
            return self.nodes[key].hull;
        }
        self.nodes[key].mark = false;

        let (left, right) = match self.nodes[key].content {
            BhNodeContent::Leaf => {
                let hull = self.nodes[key]
                    .source
                    .as_ref()
                    .map_or(BoundingBox::EMPTY, |s| s.compute_hull());
                self.nodes[key].hull = hull;
                return hull;
            }
            BhNodeContent::Internal { left, right } => (left, right),
        };

        let mut hull = BoundingBox::EMPTY;
        if let Some(child) = left {
            hull.enclose(&self.update_marked_hull(child));
        }
        if let Some(child) = right {
            hull.enclose(&self.update_marked_hull(child));
        }
        self.nodes[key].hull = hull;
        hull
    }

    /// Post-order teardown of the subtree rooted at `key`
    ///
    /// Detached leaf capabilities are appended to `out` at `cursor`, and
    /// node storage returns to the internal pool. Running out of output
    /// space is a soft condition: a warning is logged and teardown stops
    /// early with the remaining subtree intact, so a caller can retry with
    /// a larger array.
    pub fn destroy_tree(
        &mut self,
        key: BhNodeKey,
        out: &mut [Option<Arc<dyn HullSource>>],
        cursor: &mut usize,
    ) {
        if self.destroy_rec(key, out, cursor) && self.root == Some(key) {
            self.root = None;
        }
    }

    fn destroy_rec(
        &mut self,
        key: BhNodeKey,
        out: &mut [Option<Arc<dyn HullSource>>],
        cursor: &mut usize,
    ) -> bool {
        let (left, right) = match self.nodes[key].content {
            BhNodeContent::Leaf => (None, None),
            BhNodeContent::Internal { left, right } => (left, right),
        };

        if let Some(child) = left {
            if !self.destroy_rec(child, out, cursor) {
                return false;
            }
            if let BhNodeContent::Internal { left, .. } = &mut self.nodes[key].content {
                *left = None;
            }
        }
        if let Some(child) = right {
            if !self.destroy_rec(child, out, cursor) {
                return false;
            }
            if let BhNodeContent::Internal { right, .. } = &mut self.nodes[key].content {
                *right = None;
            }
        }

        if self.nodes[key].is_leaf() {
            if *cursor >= out.len() {
                log::warn!(
                    "bounding-hull tree teardown: output array full at {} leaves, stopping early",
                    out.len()
                );
                return false;
            }
            if let Some(mut node) = self.nodes.remove(key) {
                out[*cursor] = node.source.take();
                *cursor += 1;
                self.pool.release(node);
            }
        } else if let Some(node) = self.nodes.remove(key) {
            self.pool.release(node);
        }
        true
    }

    /// Collect enabled leaf capabilities intersecting the frustum
    pub fn select_visible(&self, frustum: &Frustum, out: &mut Vec<Arc<dyn HullSource>>) {
        if let Some(root) = self.root {
            self.select_rec(root, frustum, out);
        }
    }

    fn select_rec(&self, key: BhNodeKey, frustum: &Frustum, out: &mut Vec<Arc<dyn HullSource>>) {
        let node = &self.nodes[key];
        if !frustum.intersects_bounds(&node.hull) {
            return;
        }
        match node.content {
            BhNodeContent::Leaf => {
                if let Some(source) = &node.source {
                    if source.is_enabled() {
                        out.push(Arc::clone(source));
                    }
                }
            }
            BhNodeContent::Internal { left, right } => {
                if let Some(child) = left {
                    self.select_rec(child, frustum, out);
                }
                if let Some(child) = right {
                    self.select_rec(child, frustum, out);
                }
            }
        }
    }

    /// Collect enabled leaf capabilities whose hulls intersect a ray
    pub fn pick_ray(&self, origin: Vec3, dir: Vec3, out: &mut Vec<Arc<dyn HullSource>>) {
        if let Some(root) = self.root {
            self.pick_rec(root, origin, dir, out);
        }
    }

    fn pick_rec(
        &self,
        key: BhNodeKey,
        origin: Vec3,
        dir: Vec3,
        out: &mut Vec<Arc<dyn HullSource>>,
    ) {
        let node = &self.nodes[key];
        if node.hull.intersect_ray(origin, dir).is_none() {
            return;
        }
        match node.content {
            BhNodeContent::Leaf => {
                if let Some(source) = &node.source {
                    if source.is_enabled() {
                        out.push(Arc::clone(source));
                    }
                }
            }
            BhNodeContent::Internal { left, right } => {
                if let Some(child) = left {
                    self.pick_rec(child, origin, dir, out);
                }
                if let Some(child) = right {
                    self.pick_rec(child, origin, dir, out);
                }
            }
        }
    }

    /// Detach a single leaf from the tree
    ///
    /// The leaf's parent collapses: its surviving child takes the
    /// parent's place, inheriting the parent's slot in the grandparent.
    /// Both freed nodes return to the pool. Returns the detached leaf's
    /// capability.
    pub fn detach_leaf(&mut self, key: BhNodeKey) -> Option<Arc<dyn HullSource>> {
        if !self.nodes.get(key)?.is_leaf() {
            log::error!("detach_leaf called on an internal node");
            return None;
        }
        let parent = self.nodes[key].parent;
        let mut leaf = self.nodes.remove(key)?;
        let source = leaf.source.take();
        self.pool.release(leaf);

        let Some(parent_key) = parent else {
            self.root = None;
            return source;
        };

        let sibling = match self.nodes[parent_key].content {
            BhNodeContent::Internal { left, right } => {
                if left == Some(key) {
                    right
                } else {
                    left
                }
            }
            BhNodeContent::Leaf => None,
        };
        let grandparent = self.nodes[parent_key].parent;
        if let Some(parent_node) = self.nodes.remove(parent_key) {
            self.pool.release(parent_node);
        }

        match sibling {
            Some(sibling_key) => {
                self.nodes[sibling_key].parent = grandparent;
                match grandparent {
                    Some(gp) => {
                        if let BhNodeContent::Internal { left, right } =
                            &mut self.nodes[gp].content
                        {
                            if *left == Some(parent_key) {
                                *left = Some(sibling_key);
                            } else if *right == Some(parent_key) {
                                *right = Some(sibling_key);
                            }
                        }
                        self.refresh_upward(sibling_key);
                    }
                    None => self.root = Some(sibling_key),
                }
            }
            None => match grandparent {
                Some(gp) => {
                    if let BhNodeContent::Internal { left, right } = &mut self.nodes[gp].content {
                        if *left == Some(parent_key) {
                            *left = None;
                        } else if *right == Some(parent_key) {
                            *right = None;
                        }
                    }
                    self.refresh_from(gp);
                }
                None => self.root = None,
            },
        }
        source
    }

    /// Recompute hulls starting at `key` and continuing to the root
    fn refresh_from(&mut self, key: BhNodeKey) {
        let (left, right) = match self.nodes[key].content {
            BhNodeContent::Internal { left, right } => (left, right),
            BhNodeContent::Leaf => return,
        };
        let mut hull = BoundingBox::EMPTY;
        if let Some(child) = left {
            hull.enclose(&self.nodes[child].hull);
        }
        if let Some(child) = right {
            hull.enclose(&self.nodes[child].hull);
        }
        self.nodes[key].hull = hull;
        self.refresh_upward(key);
    }

    /// Create an internal node joining two existing nodes
    fn new_internal(&mut self, a: BhNodeKey, b: BhNodeKey) -> BhNodeKey {
        let hull = self.nodes[a].hull.union(&self.nodes[b].hull);
        let parent = self.nodes[a].parent;
        let mut node = self.pool.acquire();
        node.hull = hull;
        node.parent = parent;
        node.content = BhNodeContent::Internal {
            left: Some(a),
            right: Some(b),
        };
        let key = self.nodes.insert(node);
        self.nodes[a].parent = Some(key);
        self.nodes[b].parent = Some(key);
        key
    }

    /// Recompute hulls on the ancestor chain of `key` after a splice
    fn refresh_upward(&mut self, key: BhNodeKey) {
        let mut current = self.nodes[key].parent;
        while let Some(k) = current {
            let (left, right) = match self.nodes[k].content {
                BhNodeContent::Internal { left, right } => (left, right),
                BhNodeContent::Leaf => break,
            };
            let mut hull = BoundingBox::EMPTY;
            if let Some(child) = left {
                hull.enclose(&self.nodes[child].hull);
            }
            if let Some(child) = right {
                hull.enclose(&self.nodes[child].hull);
            }
            self.nodes[k].hull = hull;
            current = self.nodes[k].parent;
        }
    }
}

/// Volume of the union of two hulls, used to pick the cheaper partner
fn union_volume(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let u = a.union(b);
    if u.is_empty() {
        return 0.0;
    }
    let size = u.max - u.min;
    size.x * size.y * size.z
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct TestSource {
        hull: Mutex<BoundingBox>,
        enabled: bool,
        locale: u32,
    }

    impl TestSource {
        fn new(hull: BoundingBox) -> Arc<Self> {
            Arc::new(Self {
                hull: Mutex::new(hull),
                enabled: true,
                locale: 0,
            })
        }

        fn set_hull(&self, hull: BoundingBox) {
            *self.hull.lock().unwrap() = hull;
        }
    }

    impl HullSource for TestSource {
        fn compute_hull(&self) -> BoundingBox {
            *self.hull.lock().unwrap()
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        fn locale_id(&self) -> u32 {
            self.locale
        }
    }

    fn unit_cube(origin: Vec3) -> BoundingBox {
        BoundingBox::new(origin, origin + Vec3::new(1.0, 1.0, 1.0))
    }

    fn build_three_leaf_tree(
        tree: &mut BhTree,
    ) -> (BhNodeKey, BhNodeKey, BhNodeKey, Arc<TestSource>) {
        let src_a = TestSource::new(unit_cube(Vec3::new(0.0, 0.0, 0.0)));
        let a = tree.create_leaf(src_a.clone());
        let b = tree.create_leaf(TestSource::new(unit_cube(Vec3::new(10.0, 0.0, 0.0))));
        let c = tree.create_leaf(TestSource::new(unit_cube(Vec3::new(20.0, 0.0, 0.0))));

        let mut deferred = DeferredInserts::default();
        for leaf in [a, b, c] {
            widen_root_for(tree, leaf);
            tree.insert(leaf, &mut deferred).unwrap();
            deferred.apply(tree);
        }
        (a, b, c, src_a)
    }

    /// Widen the root hull before insertion, the way a locale-bounds
    /// update precedes scene-graph attachment.
    fn widen_root_for(tree: &mut BhTree, leaf: BhNodeKey) {
        if let Some(root) = tree.root() {
            if tree.node(root).map_or(true, BhNode::is_leaf) {
                return;
            }
            let widened = tree.hull_of(root).union(&tree.hull_of(leaf));
            if let Some(node) = tree.nodes.get_mut(root) {
                node.hull = widened;
            }
        }
    }

    #[test]
    fn test_root_hull_encloses_all_leaves() {
        let mut tree = BhTree::new(&SpatialConfig::default());
        let (a, b, c, _) = build_three_leaf_tree(&mut tree);

        let root = tree.root().unwrap();
        let root_hull = tree.hull_of(root);
        for leaf in [a, b, c] {
            assert!(root_hull.contains(&tree.hull_of(leaf)));
        }
    }

    #[test]
    fn test_root_containment_after_random_inserts() {
        let mut tree = BhTree::new(&SpatialConfig::default());
        let mut deferred = DeferredInserts::default();
        let mut rng = StdRng::seed_from_u64(7);
        let mut leaves = Vec::new();

        for _ in 0..64 {
            let origin = Vec3::new(
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-50.0..50.0),
            );
            let leaf = tree.create_leaf(TestSource::new(unit_cube(origin)));
            leaves.push(leaf);
            widen_root_for(&mut tree, leaf);
            tree.insert(leaf, &mut deferred).unwrap();
            deferred.apply(&mut tree);
        }

        let root_hull = tree.hull_of(tree.root().unwrap());
        for leaf in leaves {
            assert!(root_hull.contains(&tree.hull_of(leaf)));
        }
    }

    #[test]
    fn test_insert_inside_existing_subtree_leaves_root_hull_unchanged() {
        let mut tree = BhTree::new(&SpatialConfig::default());
        let (_, _, _, _src) = build_three_leaf_tree(&mut tree);

        let root = tree.root().unwrap();
        let hull_before = tree.hull_of(root);

        // Fully inside leaf A's unit cube at the origin.
        let d = tree.create_leaf(TestSource::new(BoundingBox::new(
            Vec3::new(0.25, 0.25, 0.25),
            Vec3::new(0.75, 0.75, 0.75),
        )));
        let mut deferred = DeferredInserts::default();
        tree.insert(d, &mut deferred).unwrap();
        deferred.apply(&mut tree);

        assert_eq!(tree.hull_of(tree.root().unwrap()), hull_before);
        // The new leaf landed in a tight region, not beside the root.
        let parent = tree.node(d).unwrap().parent.unwrap();
        assert!(hull_before.contains(&tree.hull_of(parent)));
        assert!(tree.hull_of(parent).max.x <= 1.5);
    }

    #[test]
    fn test_insert_descends_into_containing_internal_child() {
        let mut tree = BhTree::new(&SpatialConfig::default());
        let (_, b, _, _) = build_three_leaf_tree(&mut tree);

        // B's parent is an internal node; inserting inside B's cube must
        // recurse through it rather than deferring at the root.
        let b_parent = tree.node(b).unwrap().parent.unwrap();
        let inner = tree.create_leaf(TestSource::new(BoundingBox::new(
            Vec3::new(10.25, 0.25, 0.25),
            Vec3::new(10.75, 0.75, 0.75),
        )));
        let mut deferred = DeferredInserts::default();
        tree.insert(inner, &mut deferred).unwrap();
        deferred.apply(&mut tree);

        // The new leaf's ancestor chain passes through B's old parent
        // whenever that parent's hull contained the new node.
        if tree.hull_of(b_parent).contains(&tree.hull_of(inner)) {
            let mut current = tree.node(inner).unwrap().parent;
            let mut found = false;
            while let Some(k) = current {
                if k == b_parent {
                    found = true;
                    break;
                }
                current = tree.node(k).unwrap().parent;
            }
            assert!(found, "descent should have entered the containing subtree");
        }
    }

    #[test]
    fn test_insert_outside_root_hull_is_contract_error() {
        let mut tree = BhTree::new(&SpatialConfig::default());
        let (_, _, _, _) = build_three_leaf_tree(&mut tree);

        let stray = tree.create_leaf(TestSource::new(unit_cube(Vec3::new(500.0, 0.0, 0.0))));
        let mut deferred = DeferredInserts::default();
        let result = tree.insert(stray, &mut deferred);
        assert!(matches!(result, Err(SpatialError::InsertOutsideHull)));
        assert!(deferred.is_empty());
    }

    #[test]
    fn test_marked_update_propagates_leaf_change() {
        let mut tree = BhTree::new(&SpatialConfig::default());
        let (a, _, _, src_a) = build_three_leaf_tree(&mut tree);

        // Move leaf A far out, mark its path, and update lazily.
        src_a.set_hull(unit_cube(Vec3::new(-40.0, 0.0, 0.0)));
        tree.mark_path(a);
        let root = tree.root().unwrap();
        let hull = tree.update_marked_hull(root);

        assert!(hull.contains(&unit_cube(Vec3::new(-40.0, 0.0, 0.0))));
        assert!(!tree.node(root).unwrap().mark);
        assert!(!tree.node(a).unwrap().mark);
    }

    #[test]
    fn test_compute_bounding_hull_full_recompute() {
        let mut tree = BhTree::new(&SpatialConfig::default());
        let (a, b, c, src_a) = build_three_leaf_tree(&mut tree);

        src_a.set_hull(unit_cube(Vec3::new(-5.0, 0.0, 0.0)));
        let root = tree.root().unwrap();
        let hull = tree.compute_bounding_hull(root);

        for leaf in [a, b, c] {
            assert!(hull.contains(&tree.hull_of(leaf)));
        }
        assert!(hull.min.x <= -5.0);
    }

    #[test]
    fn test_destroy_tree_returns_leaves_and_pools_nodes() {
        let mut tree = BhTree::new(&SpatialConfig::default());
        let (_, _, _, _) = build_three_leaf_tree(&mut tree);
        let root = tree.root().unwrap();

        let mut out: Vec<Option<Arc<dyn HullSource>>> = vec![None, None, None];
        let mut cursor = 0;
        tree.destroy_tree(root, &mut out, &mut cursor);

        assert_eq!(cursor, 3);
        assert!(out.iter().all(|s| s.is_some()));
        assert_eq!(tree.node_count(), 0);
        assert!(tree.root().is_none());
        assert!(tree.pool.free_count() > 0);
    }

    #[test]
    fn test_destroy_tree_overflow_is_soft() {
        let mut tree = BhTree::new(&SpatialConfig::default());
        let (_, _, _, _) = build_three_leaf_tree(&mut tree);
        let root = tree.root().unwrap();

        let mut out: Vec<Option<Arc<dyn HullSource>>> = vec![None];
        let mut cursor = 0;
        tree.destroy_tree(root, &mut out, &mut cursor);

        // One leaf collected, the rest of the subtree left intact.
        assert_eq!(cursor, 1);
        assert!(tree.node_count() > 0);
    }

    #[test]
    fn test_detach_leaf_collapses_parent() {
        let mut tree = BhTree::new(&SpatialConfig::default());
        let (a, b, c, _) = build_three_leaf_tree(&mut tree);
        let before = tree.node_count();

        let source = tree.detach_leaf(c);
        assert!(source.is_some());
        // Leaf and its parent both freed.
        assert_eq!(tree.node_count(), before - 2);

        let root = tree.root().unwrap();
        let root_hull = tree.hull_of(root);
        assert!(root_hull.contains(&tree.hull_of(a)));
        assert!(root_hull.contains(&tree.hull_of(b)));
        // C's cube drops out of the recomputed root hull.
        let recomputed = tree.compute_bounding_hull(root);
        assert!(!recomputed.contains(&unit_cube(Vec3::new(20.0, 0.0, 0.0))));
    }

    #[test]
    fn test_select_visible_prunes_by_hull() {
        let mut tree = BhTree::new(&SpatialConfig::default());
        let (_, _, _, _) = build_three_leaf_tree(&mut tree);

        let frustum = Frustum::from_box(&BoundingBox::new(
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(2.0, 2.0, 2.0),
        ));
        let mut visible = Vec::new();
        tree.select_visible(&frustum, &mut visible);
        assert_eq!(visible.len(), 1); // only leaf A is near the origin
    }

    #[test]
    fn test_pick_ray_finds_leaf_on_ray() {
        let mut tree = BhTree::new(&SpatialConfig::default());
        let (_, _, _, _) = build_three_leaf_tree(&mut tree);

        let mut hits = Vec::new();
        // Ray along +x at y=z=0.5 passes through all three cubes.
        tree.pick_ray(
            Vec3::new(-5.0, 0.5, 0.5),
            Vec3::new(1.0, 0.0, 0.0),
            &mut hits,
        );
        assert_eq!(hits.len(), 3);

        hits.clear();
        tree.pick_ray(
            Vec3::new(-5.0, 50.0, 0.5),
            Vec3::new(1.0, 0.0, 0.0),
            &mut hits,
        );
        assert!(hits.is_empty());
    }
}
