//! Render bin
//!
//! The state-sorted aggregation above molecules: atoms arriving from the
//! structures are bucketed by (light set, geometry kind), and a frame
//! render walks every canvas, locking its surface, dispatching each
//! molecule through its render method, and pruning emptied buckets.

use crate::render::atom::{RenderAtom, RenderAtomKey};
use crate::render::device::DrawDevice;
use crate::render::light_set::LightSet;
use crate::render::method::{method_for, Canvas};
use crate::render::molecule::{MoleculeDirty, RenderMolecule};
use slotmap::SlotMap;

/// State-sorted collection of everything drawable
#[derive(Debug, Default)]
pub struct RenderBin {
    atoms: SlotMap<RenderAtomKey, RenderAtom>,
    molecules: Vec<RenderMolecule>,
}

impl RenderBin {
    /// Create an empty bin
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an atom under its light set, bucketing by shared state
    pub fn add_atom(&mut self, atom: RenderAtom, lights: LightSet) -> RenderAtomKey {
        let geometry = atom.geometry;
        let key = self.atoms.insert(atom);
        match self
            .molecules
            .iter_mut()
            .find(|m| m.geometry == geometry && m.lights == lights)
        {
            Some(molecule) => molecule.add_atom(key),
            None => {
                let mut molecule = RenderMolecule::new(lights, geometry);
                molecule.add_atom(key);
                self.molecules.push(molecule);
            }
        }
        key
    }

    /// Remove an atom; empty buckets are dropped
    pub fn remove_atom(&mut self, key: RenderAtomKey) -> bool {
        if self.atoms.remove(key).is_none() {
            return false;
        }
        for molecule in &mut self.molecules {
            if molecule.remove_atom(key) {
                break;
            }
        }
        self.molecules.retain(|m| !m.is_empty());
        true
    }

    /// Read an atom
    pub fn atom(&self, key: RenderAtomKey) -> Option<&RenderAtom> {
        self.atoms.get(key)
    }

    /// Update an atom's bounds and transform after a move
    pub fn update_atom(&mut self, key: RenderAtomKey, atom: RenderAtom) {
        if let Some(slot) = self.atoms.get_mut(key) {
            *slot = atom;
            self.mark_atom_dirty(key, MoleculeDirty::TRANSFORM);
        }
    }

    /// Mark the molecule containing an atom as needing a state flush
    pub fn mark_atom_dirty(&mut self, key: RenderAtomKey, bits: MoleculeDirty) {
        for molecule in &mut self.molecules {
            if molecule.atoms().iter().any(|a| a == key) {
                molecule.mark_dirty(bits);
                return;
            }
        }
    }

    /// Number of state buckets
    pub fn molecule_count(&self) -> usize {
        self.molecules.len()
    }

    /// Number of atoms
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Draw every molecule on every canvas
    ///
    /// A canvas whose surface lock fails is skipped for this frame.
    /// Returns whether anything was visible anywhere.
    pub fn render_frame(
        &mut self,
        canvases: &mut [Canvas],
        device: &mut dyn DrawDevice,
        culling_enabled: bool,
    ) -> bool {
        let mut any_visible = false;
        for canvas in canvases {
            canvas.begin_frame();
            let handle = match device.lock_drawing_surface(canvas.id) {
                Ok(handle) => handle,
                Err(err) => {
                    log::debug!("canvas {} skipped this frame: {err}", canvas.id);
                    continue;
                }
            };
            device.bind_context(handle);
            for molecule in &mut self.molecules {
                let method = method_for(molecule.geometry);
                any_visible |=
                    method.render(molecule, canvas, &self.atoms, device, culling_enabled);
            }
            device.unlock_drawing_surface(handle);
        }
        any_visible
    }
}
