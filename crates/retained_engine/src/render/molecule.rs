//! Render molecules
//!
//! A molecule is a bucket of atoms sharing enough state (light set,
//! geometry kind) to draw together. State changes accumulate as dirty
//! bits and flush to the device lazily, immediately before the first
//! visible atom draws; molecules whose atoms are all culled never touch
//! the device.

use crate::render::atom::{GeometryKind, RenderAtomKey, RenderAtomList};
use crate::render::light_set::LightSet;
use bitflags::bitflags;

bitflags! {
    /// Pending device-state updates for a molecule
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MoleculeDirty: u32 {
        /// Material parameters changed
        const MATERIAL = 1 << 0;
        /// Model transform changed
        const TRANSFORM = 1 << 1;
        /// Light set membership changed
        const LIGHTS = 1 << 2;
        /// Texture bindings changed
        const TEXTURE = 1 << 3;
        /// Geometry content changed
        const GEOMETRY = 1 << 4;
    }
}

/// Shared-state bucket of render atoms
#[derive(Debug)]
pub struct RenderMolecule {
    /// Lights active for every atom in the bucket
    pub lights: LightSet,
    /// Draw-dispatch strategy shared by the bucket
    pub geometry: GeometryKind,
    atoms: RenderAtomList,
    dirty: MoleculeDirty,
}

impl RenderMolecule {
    /// Create an empty molecule for a state bucket
    pub fn new(lights: LightSet, geometry: GeometryKind) -> Self {
        Self {
            lights,
            geometry,
            atoms: RenderAtomList::new(),
            // New device state must be established before the first draw.
            dirty: MoleculeDirty::all(),
        }
    }

    /// Add an atom to the bucket
    pub fn add_atom(&mut self, atom: RenderAtomKey) {
        self.atoms.push_back(atom);
    }

    /// Remove an atom from the bucket; returns whether it was present
    pub fn remove_atom(&mut self, atom: RenderAtomKey) -> bool {
        self.atoms.remove(atom)
    }

    /// The bucket's atom list
    pub fn atoms(&self) -> &RenderAtomList {
        &self.atoms
    }

    /// Record pending state changes
    pub fn mark_dirty(&mut self, bits: MoleculeDirty) {
        self.dirty |= bits;
    }

    /// Pending state changes not yet flushed
    pub fn dirty_bits(&self) -> MoleculeDirty {
        self.dirty
    }

    /// Take the pending state changes for a flush
    ///
    /// Called only when a visible atom is about to draw; culled spans
    /// leave the bits in place for the next frame.
    pub fn take_dirty(&mut self) -> MoleculeDirty {
        std::mem::take(&mut self.dirty)
    }

    /// Whether the bucket has no atoms left
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirty_bits_accumulate_and_flush_once() {
        let mut molecule = RenderMolecule::new(LightSet::default(), GeometryKind::Default);
        assert_eq!(molecule.take_dirty(), MoleculeDirty::all());

        molecule.mark_dirty(MoleculeDirty::MATERIAL);
        molecule.mark_dirty(MoleculeDirty::TRANSFORM);
        assert_eq!(
            molecule.dirty_bits(),
            MoleculeDirty::MATERIAL | MoleculeDirty::TRANSFORM
        );

        let flushed = molecule.take_dirty();
        assert_eq!(flushed, MoleculeDirty::MATERIAL | MoleculeDirty::TRANSFORM);
        assert_eq!(molecule.dirty_bits(), MoleculeDirty::empty());
    }
}
