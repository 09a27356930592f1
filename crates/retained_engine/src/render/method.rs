//! Render methods
//!
//! Per-geometry-kind draw dispatch. Every method walks a molecule's atom
//! list with the same skeleton: consult the canvas visibility cache,
//! lazily flush molecule state before the first visible draw, and report
//! whether anything was visible so the bin can prune dead lists.

use crate::foundation::math::{Frustum, Mat4, Vec3};
use crate::render::atom::{GeometryKind, RenderAtom, RenderAtomKey};
use crate::render::device::{DrawCall, DrawDevice};
use crate::render::molecule::RenderMolecule;
use slotmap::SlotMap;

/// One drawing surface with its view state and visibility cache
#[derive(Debug)]
pub struct Canvas {
    /// Canvas identifier, passed to the device lock call
    pub id: u32,
    /// Current view frustum
    pub frustum: Frustum,
    /// Eye position, used by oriented (billboard) draws
    pub eye: Vec3,
    last_atom: Option<RenderAtomKey>,
    last_visible: bool,
}

impl Canvas {
    /// Create a canvas with a view frustum
    pub fn new(id: u32, frustum: Frustum, eye: Vec3) -> Self {
        Self {
            id,
            frustum,
            eye,
            last_atom: None,
            last_visible: false,
        }
    }

    /// Forget the visibility cache at a frame boundary
    pub fn begin_frame(&mut self) {
        self.last_atom = None;
        self.last_visible = false;
    }

    /// Visibility of an atom, memoized across identical consecutive atoms
    ///
    /// With culling disabled the test is skipped entirely. Otherwise a
    /// repeat of the previous atom reuses its determination; anything
    /// else runs the frustum test and caches the outcome.
    pub fn check_visible(
        &mut self,
        atom: RenderAtomKey,
        atom_data: &RenderAtom,
        culling_enabled: bool,
    ) -> bool {
        if !culling_enabled {
            return true;
        }
        if self.last_atom == Some(atom) {
            return self.last_visible;
        }
        let visible = self.frustum.intersects_bounds(&atom_data.bounds);
        self.last_atom = Some(atom);
        self.last_visible = visible;
        visible
    }
}

/// Per-geometry-kind draw dispatch strategy
pub trait RenderMethod {
    /// Draw a molecule's atom list on one canvas
    ///
    /// Returns whether any atom was visible; the bin uses this to decide
    /// whether to retain the list next frame.
    fn render(
        &self,
        molecule: &mut RenderMolecule,
        canvas: &mut Canvas,
        atoms: &SlotMap<RenderAtomKey, RenderAtom>,
        device: &mut dyn DrawDevice,
        culling_enabled: bool,
    ) -> bool;
}

/// Shared list walk parameterized by the per-draw transform
fn render_list(
    molecule: &mut RenderMolecule,
    canvas: &mut Canvas,
    atoms: &SlotMap<RenderAtomKey, RenderAtom>,
    device: &mut dyn DrawDevice,
    culling_enabled: bool,
    mut final_transform: impl FnMut(&RenderAtom, &Canvas) -> Mat4,
) -> bool {
    let mut any_visible = false;
    let keys: Vec<RenderAtomKey> = molecule.atoms().iter().collect();
    for key in keys {
        let Some(atom) = atoms.get(key) else {
            log::error!("molecule references a dead render atom");
            continue;
        };
        if !canvas.check_visible(key, atom, culling_enabled) {
            continue;
        }
        // Lazy state flush: only before a draw that actually happens.
        let dirty = molecule.take_dirty();
        if !dirty.is_empty() {
            device.flush_state(dirty);
        }
        device.execute_draw(&DrawCall {
            atom: key,
            geometry: atom.geometry,
            transform: final_transform(atom, canvas),
        });
        any_visible = true;
    }
    any_visible
}

/// Plain retained-geometry dispatch
#[derive(Debug, Default)]
pub struct DefaultRenderMethod;

impl RenderMethod for DefaultRenderMethod {
    fn render(
        &self,
        molecule: &mut RenderMolecule,
        canvas: &mut Canvas,
        atoms: &SlotMap<RenderAtomKey, RenderAtom>,
        device: &mut dyn DrawDevice,
        culling_enabled: bool,
    ) -> bool {
        render_list(molecule, canvas, atoms, device, culling_enabled, |atom, _| {
            atom.transform
        })
    }
}

/// Client vertex-array dispatch
#[derive(Debug, Default)]
pub struct VertexArrayRenderMethod;

impl RenderMethod for VertexArrayRenderMethod {
    fn render(
        &self,
        molecule: &mut RenderMolecule,
        canvas: &mut Canvas,
        atoms: &SlotMap<RenderAtomKey, RenderAtom>,
        device: &mut dyn DrawDevice,
        culling_enabled: bool,
    ) -> bool {
        render_list(molecule, canvas, atoms, device, culling_enabled, |atom, _| {
            atom.transform
        })
    }
}

/// Billboard dispatch: realigns each atom toward the viewer before draw
#[derive(Debug, Default)]
pub struct OrientedRenderMethod;

impl RenderMethod for OrientedRenderMethod {
    fn render(
        &self,
        molecule: &mut RenderMolecule,
        canvas: &mut Canvas,
        atoms: &SlotMap<RenderAtomKey, RenderAtom>,
        device: &mut dyn DrawDevice,
        culling_enabled: bool,
    ) -> bool {
        render_list(
            molecule,
            canvas,
            atoms,
            device,
            culling_enabled,
            |atom, canvas| face_viewer(&atom.transform, canvas.eye),
        )
    }
}

/// Compressed-geometry dispatch; decompression is the device's job
#[derive(Debug, Default)]
pub struct CompressedRenderMethod;

impl RenderMethod for CompressedRenderMethod {
    fn render(
        &self,
        molecule: &mut RenderMolecule,
        canvas: &mut Canvas,
        atoms: &SlotMap<RenderAtomKey, RenderAtom>,
        device: &mut dyn DrawDevice,
        culling_enabled: bool,
    ) -> bool {
        render_list(molecule, canvas, atoms, device, culling_enabled, |atom, _| {
            atom.transform
        })
    }
}

/// The dispatch strategy for a geometry kind
pub fn method_for(kind: GeometryKind) -> &'static dyn RenderMethod {
    match kind {
        GeometryKind::Default => &DefaultRenderMethod,
        GeometryKind::VertexArray => &VertexArrayRenderMethod,
        GeometryKind::Oriented => &OrientedRenderMethod,
        GeometryKind::Compressed => &CompressedRenderMethod,
    }
}

/// Rebuild a transform's rotation so its +Z basis faces the eye,
/// keeping the original translation
fn face_viewer(transform: &Mat4, eye: Vec3) -> Mat4 {
    let position = Vec3::new(transform[(0, 3)], transform[(1, 3)], transform[(2, 3)]);
    let to_eye = eye - position;
    if to_eye.norm_squared() < f32::EPSILON {
        return *transform;
    }
    let forward = to_eye.normalize();
    let world_up = Vec3::y();
    let mut right = world_up.cross(&forward);
    if right.norm_squared() < 1e-6 {
        // Looking straight up or down; any horizontal right axis works.
        right = Vec3::x();
    } else {
        right = right.normalize();
    }
    let up = forward.cross(&right);
    Mat4::new(
        right.x, up.x, forward.x, position.x, //
        right.y, up.y, forward.y, position.y, //
        right.z, up.z, forward.z, position.z, //
        0.0, 0.0, 0.0, 1.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::BoundingBox;
    use crate::render::device::{DeviceEvent, RecordingDevice};
    use crate::render::light_set::LightSet;
    use crate::render::molecule::MoleculeDirty;
    use crate::structures::targets::NnuId;
    use approx::assert_relative_eq;

    fn atom(bounds: BoundingBox) -> RenderAtom {
        RenderAtom {
            id: NnuId(1),
            bounds,
            geometry: GeometryKind::Default,
            transform: Mat4::identity(),
        }
    }

    fn unit_box(x: f32) -> BoundingBox {
        BoundingBox::new(Vec3::new(x, 0.0, 0.0), Vec3::new(x + 1.0, 1.0, 1.0))
    }

    fn wide_frustum() -> Frustum {
        Frustum::from_box(&BoundingBox::new(
            Vec3::new(-10.0, -10.0, -10.0),
            Vec3::new(10.0, 10.0, 10.0),
        ))
    }

    #[test]
    fn test_culled_molecule_never_flushes_state() {
        let mut atoms = SlotMap::with_key();
        let far = atoms.insert(atom(unit_box(100.0)));

        let mut molecule = RenderMolecule::new(LightSet::default(), GeometryKind::Default);
        molecule.add_atom(far);

        let mut canvas = Canvas::new(0, wide_frustum(), Vec3::zeros());
        let mut device = RecordingDevice::new();
        let visible =
            DefaultRenderMethod.render(&mut molecule, &mut canvas, &atoms, &mut device, true);

        assert!(!visible);
        assert!(device.events.is_empty());
        // Dirty bits survive for the frame when the atom becomes visible.
        assert_eq!(molecule.dirty_bits(), MoleculeDirty::all());
    }

    #[test]
    fn test_state_flushes_once_before_first_visible_draw() {
        let mut atoms = SlotMap::with_key();
        let near_a = atoms.insert(atom(unit_box(0.0)));
        let near_b = atoms.insert(atom(unit_box(2.0)));

        let mut molecule = RenderMolecule::new(LightSet::default(), GeometryKind::Default);
        molecule.add_atom(near_a);
        molecule.add_atom(near_b);

        let mut canvas = Canvas::new(0, wide_frustum(), Vec3::zeros());
        let mut device = RecordingDevice::new();
        let visible =
            DefaultRenderMethod.render(&mut molecule, &mut canvas, &atoms, &mut device, true);

        assert!(visible);
        assert_eq!(
            device.events,
            vec![
                DeviceEvent::Flush(MoleculeDirty::all()),
                DeviceEvent::Draw(near_a),
                DeviceEvent::Draw(near_b),
            ]
        );
    }

    #[test]
    fn test_culling_disabled_draws_everything() {
        let mut atoms = SlotMap::with_key();
        let far = atoms.insert(atom(unit_box(100.0)));

        let mut molecule = RenderMolecule::new(LightSet::default(), GeometryKind::Default);
        molecule.add_atom(far);

        let mut canvas = Canvas::new(0, wide_frustum(), Vec3::zeros());
        let mut device = RecordingDevice::new();
        let visible =
            DefaultRenderMethod.render(&mut molecule, &mut canvas, &atoms, &mut device, false);

        assert!(visible);
        assert_eq!(device.draws(), vec![far]);
    }

    #[test]
    fn test_visibility_cache_reuses_determination() {
        let mut atoms = SlotMap::with_key();
        let near = atoms.insert(atom(unit_box(0.0)));

        // The same atom appears twice in a row in the list.
        let mut molecule = RenderMolecule::new(LightSet::default(), GeometryKind::Default);
        molecule.add_atom(near);

        let mut canvas = Canvas::new(0, wide_frustum(), Vec3::zeros());
        let first = canvas.check_visible(near, &atoms[near], true);
        // Shrink the frustum behind the cache's back; a repeated query for
        // the same atom must reuse the cached answer.
        canvas.frustum = Frustum::from_box(&unit_box(500.0));
        let second = canvas.check_visible(near, &atoms[near], true);
        assert!(first);
        assert!(second);

        canvas.begin_frame();
        assert!(!canvas.check_visible(near, &atoms[near], true));
    }

    #[test]
    fn test_face_viewer_keeps_translation() {
        let mut transform = Mat4::identity();
        transform[(0, 3)] = 5.0;
        transform[(2, 3)] = -3.0;

        let faced = face_viewer(&transform, Vec3::new(5.0, 0.0, 10.0));
        assert_relative_eq!(faced[(0, 3)], 5.0);
        assert_relative_eq!(faced[(2, 3)], -3.0);
        // Forward basis points from the atom toward the eye.
        let forward = Vec3::new(faced[(0, 2)], faced[(1, 2)], faced[(2, 2)]);
        assert_relative_eq!(forward.dot(&Vec3::new(0.0, 0.0, 1.0)), 1.0, epsilon = 1e-5);
    }
}
