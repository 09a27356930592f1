//! Draw-device contract
//!
//! The render methods treat the graphics pipeline as a black box behind
//! [`DrawDevice`]: lock the drawing surface, bind its context, flush
//! state, execute draws, unlock. A lock failure skips the canvas for
//! this frame, never retried mid-frame. [`RecordingDevice`] captures the
//! call sequence for tests.

use crate::foundation::math::Mat4;
use crate::render::atom::{GeometryKind, RenderAtomKey};
use crate::render::molecule::MoleculeDirty;
use thiserror::Error;

/// Errors surfaced by a draw device
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The drawing surface could not be locked this frame
    #[error("drawing surface lock failed for canvas {0}")]
    LockFailed(u32),
}

/// Opaque handle to a locked drawing surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceHandle(pub u32);

/// One dispatched draw
#[derive(Debug, Clone)]
pub struct DrawCall {
    /// The atom being drawn
    pub atom: RenderAtomKey,
    /// Dispatch strategy the method selected
    pub geometry: GeometryKind,
    /// Final model transform (billboards realign this per draw)
    pub transform: Mat4,
}

/// Opaque native-pipeline operations consumed by the render methods
pub trait DrawDevice {
    /// Lock the canvas's drawing surface for this frame
    fn lock_drawing_surface(&mut self, canvas: u32) -> Result<SurfaceHandle, DeviceError>;

    /// Bind the surface's graphics context
    fn bind_context(&mut self, handle: SurfaceHandle);

    /// Flush accumulated molecule state to the bound context
    fn flush_state(&mut self, dirty: MoleculeDirty);

    /// Execute one draw against the bound context
    fn execute_draw(&mut self, call: &DrawCall);

    /// Unlock the drawing surface
    fn unlock_drawing_surface(&mut self, handle: SurfaceHandle);
}

/// Recorded device event, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Surface locked for a canvas
    Lock(u32),
    /// Context bound
    Bind(u32),
    /// State flushed with these dirty bits
    Flush(MoleculeDirty),
    /// Atom drawn
    Draw(RenderAtomKey),
    /// Surface unlocked
    Unlock(u32),
}

/// Test device recording the full call sequence
#[derive(Debug, Default)]
pub struct RecordingDevice {
    /// Captured events in call order
    pub events: Vec<DeviceEvent>,
    /// Canvases whose lock should fail
    pub failing_canvases: Vec<u32>,
}

impl RecordingDevice {
    /// Create a device that always locks successfully
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw events only, in order
    pub fn draws(&self) -> Vec<RenderAtomKey> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DeviceEvent::Draw(atom) => Some(*atom),
                _ => None,
            })
            .collect()
    }

    /// Flush events only, in order
    pub fn flushes(&self) -> Vec<MoleculeDirty> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DeviceEvent::Flush(bits) => Some(*bits),
                _ => None,
            })
            .collect()
    }
}

impl DrawDevice for RecordingDevice {
    fn lock_drawing_surface(&mut self, canvas: u32) -> Result<SurfaceHandle, DeviceError> {
        if self.failing_canvases.contains(&canvas) {
            return Err(DeviceError::LockFailed(canvas));
        }
        self.events.push(DeviceEvent::Lock(canvas));
        Ok(SurfaceHandle(canvas))
    }

    fn bind_context(&mut self, handle: SurfaceHandle) {
        self.events.push(DeviceEvent::Bind(handle.0));
    }

    fn flush_state(&mut self, dirty: MoleculeDirty) {
        self.events.push(DeviceEvent::Flush(dirty));
    }

    fn execute_draw(&mut self, call: &DrawCall) {
        self.events.push(DeviceEvent::Draw(call.atom));
    }

    fn unlock_drawing_surface(&mut self, handle: SurfaceHandle) {
        self.events.push(DeviceEvent::Unlock(handle.0));
    }
}
