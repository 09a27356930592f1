//! Render atoms and their per-molecule lists
//!
//! A render atom is one drawable geometry instance. Atoms belonging to
//! the same render molecule are chained in a doubly linked list so the
//! render methods can walk contiguous same-state draw spans cheaply and
//! bins can unlink an atom without scanning.

use crate::foundation::math::{BoundingBox, Mat4};
use crate::structures::targets::NnuId;
use slotmap::{new_key_type, SlotMap};
use std::collections::HashMap;

new_key_type! {
    /// Stable handle to a render atom
    pub struct RenderAtomKey;
}

new_key_type! {
    /// Handle to a list link chaining atoms within a molecule
    pub struct AtomLinkKey;
}

/// Draw-dispatch strategy selector for an atom's geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GeometryKind {
    /// Plain retained geometry
    #[default]
    Default,
    /// Geometry sourced from client vertex arrays
    VertexArray,
    /// Billboard geometry realigned to the viewer each draw
    Oriented,
    /// Compressed geometry, decompressed by the device
    Compressed,
}

/// One drawable geometry instance
#[derive(Debug, Clone)]
pub struct RenderAtom {
    /// Owning scene node
    pub id: NnuId,
    /// World-space bounds for visibility tests
    pub bounds: BoundingBox,
    /// Draw-dispatch strategy
    pub geometry: GeometryKind,
    /// Local-to-world transform
    pub transform: Mat4,
}

#[derive(Debug)]
struct AtomLink {
    atom: RenderAtomKey,
    prev: Option<AtomLinkKey>,
    next: Option<AtomLinkKey>,
}

/// Doubly linked list of atoms within one render molecule
#[derive(Debug, Default)]
pub struct RenderAtomList {
    links: SlotMap<AtomLinkKey, AtomLink>,
    head: Option<AtomLinkKey>,
    tail: Option<AtomLinkKey>,
    by_atom: HashMap<RenderAtomKey, AtomLinkKey>,
}

impl RenderAtomList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an atom at the tail
    pub fn push_back(&mut self, atom: RenderAtomKey) {
        let link = self.links.insert(AtomLink {
            atom,
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(tail) => self.links[tail].next = Some(link),
            None => self.head = Some(link),
        }
        self.tail = Some(link);
        self.by_atom.insert(atom, link);
    }

    /// Unlink an atom; returns whether it was present
    pub fn remove(&mut self, atom: RenderAtomKey) -> bool {
        let Some(link) = self.by_atom.remove(&atom) else {
            return false;
        };
        let Some(removed) = self.links.remove(link) else {
            return false;
        };
        match removed.prev {
            Some(prev) => self.links[prev].next = removed.next,
            None => self.head = removed.next,
        }
        match removed.next {
            Some(next) => self.links[next].prev = removed.prev,
            None => self.tail = removed.prev,
        }
        true
    }

    /// Walk atoms head to tail
    pub fn iter(&self) -> AtomIter<'_> {
        AtomIter {
            list: self,
            current: self.head,
        }
    }

    /// Number of linked atoms
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Head-to-tail iterator over a [`RenderAtomList`]
pub struct AtomIter<'a> {
    list: &'a RenderAtomList,
    current: Option<AtomLinkKey>,
}

impl Iterator for AtomIter<'_> {
    type Item = RenderAtomKey;

    fn next(&mut self) -> Option<Self::Item> {
        let link = self.current?;
        let node = &self.list.links[link];
        self.current = node.next;
        Some(node.atom)
    }
}
