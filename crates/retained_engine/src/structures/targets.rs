//! Update-target accumulation and snapshots
//!
//! `Targets` collects "nodes needing update" while the scene is mutated;
//! `CachedTargets` is the immutable, per-category sorted snapshot workers
//! consume. The snapshot operations are the only crossing point between
//! mutation and traversal, which is what makes the two race-free.

use crate::structures::message::ThreadKinds;
use std::sync::Arc;
use thiserror::Error;

/// Not-necessarily-unique, orderable target identifier
///
/// Sorted-array merge and delete key on this ordering; ties are resolved
/// by object identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NnuId(pub u64);

/// Capability implemented by scene nodes that can appear in target lists
pub trait SceneTarget: Send + Sync {
    /// The node's orderable identifier
    fn nnu_id(&self) -> NnuId;
}

/// Shared reference to a scene target
pub type TargetRef = Arc<dyn SceneTarget>;

/// Errors from snapshot set operations
#[derive(Debug, Error)]
pub enum TargetsError {
    /// A target scheduled for removal was not present in the snapshot.
    /// Indicates a bookkeeping bug in the caller's target tracking.
    #[error("target {0:?} not present in snapshot")]
    RemoveMissing(NnuId),
}

/// Fixed target categories, one per kind of consuming worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum TargetCategory {
    /// Geometry-bearing nodes
    Geometry = 0,
    /// Rendering-environment nodes (lights, fog, backgrounds)
    Environment = 1,
    /// Behavior nodes
    Behavior = 2,
    /// Sound nodes
    Sound = 3,
    /// View-platform nodes
    ViewPlatform = 4,
    /// Bounding-leaf nodes
    BoundingLeaf = 5,
    /// Group nodes
    Group = 6,
}

/// Number of target categories
pub const CATEGORY_COUNT: usize = 7;

impl TargetCategory {
    /// All categories in index order
    pub const ALL: [TargetCategory; CATEGORY_COUNT] = [
        TargetCategory::Geometry,
        TargetCategory::Environment,
        TargetCategory::Behavior,
        TargetCategory::Sound,
        TargetCategory::ViewPlatform,
        TargetCategory::BoundingLeaf,
        TargetCategory::Group,
    ];

    /// Worker threads that must run when this category has targets
    pub fn thread_kinds(self) -> ThreadKinds {
        match self {
            TargetCategory::Geometry => ThreadKinds::GEOMETRY | ThreadKinds::RENDER,
            TargetCategory::Environment => {
                ThreadKinds::RENDERING_ENVIRONMENT | ThreadKinds::RENDER
            }
            TargetCategory::Behavior => ThreadKinds::BEHAVIOR,
            TargetCategory::Sound => ThreadKinds::SOUND,
            TargetCategory::ViewPlatform => ThreadKinds::TRANSFORM | ThreadKinds::RENDER,
            TargetCategory::BoundingLeaf => {
                ThreadKinds::TRANSFORM | ThreadKinds::RENDERING_ENVIRONMENT
            }
            TargetCategory::Group => ThreadKinds::TRANSFORM,
        }
    }
}

/// Mutable per-frame accumulation of nodes needing update
#[derive(Default)]
pub struct Targets {
    lists: [Vec<TargetRef>; CATEGORY_COUNT],
}

impl Targets {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a node as needing update in the given category
    pub fn add_node(&mut self, category: TargetCategory, target: TargetRef) {
        self.lists[category as usize].push(target);
    }

    /// Whether nothing has been accumulated
    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(Vec::is_empty)
    }

    /// Discard everything accumulated
    pub fn clear(&mut self) {
        for list in &mut self.lists {
            list.clear();
        }
    }

    /// Convert the accumulation into an immutable snapshot, clearing the
    /// accumulator
    ///
    /// Lists are sorted by id (stable, so arrival order is kept among
    /// equal ids) to support the binary merge and delete operations.
    pub fn snapshot_init(&mut self) -> CachedTargets {
        let mut lists: [Option<Vec<TargetRef>>; CATEGORY_COUNT] = Default::default();
        for (i, list) in self.lists.iter_mut().enumerate() {
            if !list.is_empty() {
                let mut taken = std::mem::take(list);
                taken.sort_by_key(|t| t.nnu_id());
                lists[i] = Some(taken);
            }
        }
        CachedTargets { lists }
    }
}

/// Immutable, sorted snapshot of update targets
#[derive(Default, Clone)]
pub struct CachedTargets {
    lists: [Option<Vec<TargetRef>>; CATEGORY_COUNT],
}

impl CachedTargets {
    /// Targets in a category, if any
    pub fn get(&self, category: TargetCategory) -> Option<&[TargetRef]> {
        self.lists[category as usize].as_deref()
    }

    /// Whether every category is empty
    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(Option::is_none)
    }

    /// OR together the worker-thread bits of every non-empty category
    pub fn compute_target_threads(&self) -> ThreadKinds {
        let mut kinds = ThreadKinds::empty();
        for category in TargetCategory::ALL {
            if self.get(category).is_some() {
                kinds |= category.thread_kinds();
            }
        }
        kinds
    }

    /// Merge a new accumulation into this snapshot (set union)
    ///
    /// The accumulator is cleared. Merging is a sorted binary merge per
    /// category, preserving deterministic iteration order downstream.
    pub fn snapshot_add(&self, targets: &mut Targets) -> CachedTargets {
        let incoming = targets.snapshot_init();
        let mut lists: [Option<Vec<TargetRef>>; CATEGORY_COUNT] = Default::default();
        for i in 0..CATEGORY_COUNT {
            lists[i] = match (&self.lists[i], &incoming.lists[i]) {
                (None, None) => None,
                (Some(a), None) => Some(a.clone()),
                (None, Some(b)) => Some(b.clone()),
                (Some(a), Some(b)) => Some(merge_sorted(a, b)),
            };
        }
        CachedTargets { lists }
    }

    /// Subtract an accumulation from this snapshot (set difference)
    ///
    /// The accumulator is cleared. Removing an id that is not present is
    /// a caller bookkeeping bug: reported, never silently ignored.
    pub fn snapshot_remove(&self, targets: &mut Targets) -> Result<CachedTargets, TargetsError> {
        let outgoing = targets.snapshot_init();
        let mut lists: [Option<Vec<TargetRef>>; CATEGORY_COUNT] = Default::default();
        for i in 0..CATEGORY_COUNT {
            lists[i] = match (&self.lists[i], &outgoing.lists[i]) {
                (current, None) => current.clone(),
                (None, Some(removals)) => {
                    let id = removals[0].nnu_id();
                    log::error!("target removal from empty category: {id:?}");
                    return Err(TargetsError::RemoveMissing(id));
                }
                (Some(a), Some(removals)) => {
                    let remaining = delete_sorted(a, removals)?;
                    if remaining.is_empty() {
                        None
                    } else {
                        Some(remaining)
                    }
                }
            };
        }
        Ok(CachedTargets { lists })
    }
}

/// Sorted two-pointer merge keeping duplicates from both sides
fn merge_sorted(a: &[TargetRef], b: &[TargetRef]) -> Vec<TargetRef> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].nnu_id() <= b[j].nnu_id() {
            out.push(a[i].clone());
            i += 1;
        } else {
            out.push(b[j].clone());
            j += 1;
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Binary-search-driven sorted delete, matching removals by identity
/// within equal-id runs
fn delete_sorted(list: &[TargetRef], removals: &[TargetRef]) -> Result<Vec<TargetRef>, TargetsError> {
    let mut remaining: Vec<TargetRef> = list.to_vec();
    for removal in removals {
        let id = removal.nnu_id();
        let start = remaining.partition_point(|t| t.nnu_id() < id);
        let end = remaining.partition_point(|t| t.nnu_id() <= id);
        let found = remaining[start..end]
            .iter()
            .position(|t| Arc::ptr_eq(t, removal));
        match found {
            Some(offset) => {
                remaining.remove(start + offset);
            }
            None => {
                log::error!("target removal not present in snapshot: {id:?}");
                return Err(TargetsError::RemoveMissing(id));
            }
        }
    }
    Ok(remaining)
}
