//! Wakeup criteria
//!
//! Leaves of the behavior condition tree. Each criterion runs the state
//! machine armed → triggered → consumed(reset); external events find
//! waiting criteria through the behavior structure's per-kind lists.

use crate::foundation::math::BoundingBox;
use crate::structures::targets::NnuId;
use std::time::Duration;

/// Subject whose motion is tracked for region entry/exit criteria
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionSubject {
    /// A view platform node
    ViewPlatform(NnuId),
    /// A sensor device
    Sensor(NnuId),
}

impl RegionSubject {
    /// The tracked subject's identifier
    pub fn id(self) -> NnuId {
        match self {
            RegionSubject::ViewPlatform(id) | RegionSubject::Sensor(id) => id,
        }
    }
}

/// What a criterion waits for
#[derive(Debug, Clone, Copy)]
pub enum CriterionKind {
    /// A wall-clock delay has elapsed
    ElapsedTime {
        /// Delay from arming to wakeup
        delay: Duration,
    },
    /// A number of frames have passed
    ElapsedFrames {
        /// Frames from arming to wakeup
        frames: u64,
    },
    /// A watched node's transform changed
    TransformChanged {
        /// The watched node
        node: NnuId,
    },
    /// A tracked subject entered a region
    RegionEntry {
        /// The tracked subject
        subject: RegionSubject,
        /// Region of interest
        region: BoundingBox,
    },
    /// A tracked subject exited a region
    RegionExit {
        /// The tracked subject
        subject: RegionSubject,
        /// Region of interest
        region: BoundingBox,
    },
    /// A behavior posted an id
    ///
    /// `None` filters match any source / any post id.
    BehaviorPost {
        /// Only posts from this behavior, when set
        source: Option<NnuId>,
        /// Only this post id, when set
        post_id: Option<i32>,
    },
    /// The owning behavior became active
    Activation,
}

/// Criterion trigger state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CriterionState {
    /// Waiting for its event
    #[default]
    Armed,
    /// Event observed, not yet consumed by a reset
    Triggered,
}

/// One armed wakeup criterion
#[derive(Debug, Clone, Copy)]
pub struct WakeupCriterion {
    /// What this criterion waits for
    pub kind: CriterionKind,
    state: CriterionState,
    /// Countdown for elapsed-frames criteria
    remaining_frames: u64,
}

impl WakeupCriterion {
    /// Create an armed criterion
    pub fn new(kind: CriterionKind) -> Self {
        let remaining_frames = match kind {
            CriterionKind::ElapsedFrames { frames } => frames,
            _ => 0,
        };
        Self {
            kind,
            state: CriterionState::Armed,
            remaining_frames,
        }
    }

    /// Current trigger state
    pub fn state(&self) -> CriterionState {
        self.state
    }

    /// Whether the criterion has triggered and not been reset
    pub fn is_triggered(&self) -> bool {
        self.state == CriterionState::Triggered
    }

    /// Transition armed → triggered; returns whether this call made the
    /// transition (already-triggered criteria stay triggered silently)
    pub fn trigger(&mut self) -> bool {
        if self.state == CriterionState::Armed {
            self.state = CriterionState::Triggered;
            true
        } else {
            false
        }
    }

    /// Count one frame off an elapsed-frames criterion; returns whether
    /// the countdown just reached zero
    pub fn count_frame(&mut self) -> bool {
        if !matches!(self.kind, CriterionKind::ElapsedFrames { .. })
            || self.state != CriterionState::Armed
            || self.remaining_frames == 0
        {
            return false;
        }
        self.remaining_frames -= 1;
        self.remaining_frames == 0
    }

    /// Re-arm the criterion, restoring frame countdowns
    pub fn reset(&mut self) {
        self.state = CriterionState::Armed;
        if let CriterionKind::ElapsedFrames { frames } = self.kind {
            self.remaining_frames = frames;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_transitions_once() {
        let mut criterion = WakeupCriterion::new(CriterionKind::Activation);
        assert!(criterion.trigger());
        assert!(!criterion.trigger());
        assert!(criterion.is_triggered());

        criterion.reset();
        assert_eq!(criterion.state(), CriterionState::Armed);
        assert!(criterion.trigger());
    }

    #[test]
    fn test_frame_countdown() {
        let mut criterion = WakeupCriterion::new(CriterionKind::ElapsedFrames { frames: 3 });
        assert!(!criterion.count_frame());
        assert!(!criterion.count_frame());
        assert!(criterion.count_frame());
        // Exhausted countdown stays exhausted until reset.
        assert!(!criterion.count_frame());

        criterion.trigger();
        criterion.reset();
        assert!(!criterion.count_frame());
        assert!(!criterion.count_frame());
        assert!(criterion.count_frame());
    }
}
