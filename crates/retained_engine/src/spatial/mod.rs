//! Spatial partitioning for culling and picking
//!
//! The bounding-hull tree is a binary hierarchy of axis-aligned hulls over
//! scene leaves. Visibility and pick queries refine through the tree in
//! O(log n) instead of brute-forcing every leaf.

mod bhtree;

pub use bhtree::{
    BhNode, BhNodeContent, BhNodeKey, BhTree, DeferredInserts, HullSource, InsertStructure,
    SpatialError,
};
