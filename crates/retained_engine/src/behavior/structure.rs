//! Behavior structure
//!
//! Owns one wakeup condition tree per registered behavior plus the
//! per-kind condition lists external events search: transform watches,
//! post filters, frame countdowns, region watches, activation hooks.
//! Elapsed-time criteria register deadlines with the shared timer queue;
//! deadlines that fire while a behavior is inactive are remembered and
//! re-inserted on re-activation, so no wakeup is silently lost.

use crate::behavior::condition::{WakeupNodeKey, WakeupTree};
use crate::behavior::wakeup::CriterionKind;
use crate::foundation::math::BoundingBox;
use crate::foundation::time::Timestamp;
use crate::runtime::timer::{TimerEntry, TimerQueue};
use crate::structures::message::{ChangeMessage, MessageArg, MessageKind, ThreadKinds};
use crate::structures::structure::Structure;
use crate::structures::targets::NnuId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

struct BehaviorEntry {
    tree: WakeupTree,
    active: bool,
}

/// Wakeup scheduling core for all registered behaviors
pub struct BehaviorStructure {
    behaviors: HashMap<NnuId, BehaviorEntry>,
    /// (behavior, watched node, criterion)
    transform_conditions: Vec<(NnuId, NnuId, WakeupNodeKey)>,
    post_conditions: Vec<(NnuId, WakeupNodeKey)>,
    frame_conditions: Vec<(NnuId, WakeupNodeKey)>,
    region_conditions: Vec<(NnuId, WakeupNodeKey)>,
    activation_conditions: Vec<(NnuId, WakeupNodeKey)>,
    /// Timer registration serial → owning criterion
    time_serials: HashMap<u64, (NnuId, WakeupNodeKey)>,
    next_serial: u64,
    /// Elapsed-time criteria that fired while their behavior was inactive
    missed_deadlines: Vec<(NnuId, WakeupNodeKey)>,
    timer: Arc<TimerQueue>,
    ready: Vec<NnuId>,
}

impl BehaviorStructure {
    /// Create an empty behavior structure over a shared timer queue
    pub fn new(timer: Arc<TimerQueue>) -> Self {
        Self {
            behaviors: HashMap::new(),
            transform_conditions: Vec::new(),
            post_conditions: Vec::new(),
            frame_conditions: Vec::new(),
            region_conditions: Vec::new(),
            activation_conditions: Vec::new(),
            time_serials: HashMap::new(),
            next_serial: 1,
            missed_deadlines: Vec::new(),
            timer: Arc::clone(&timer),
            ready: Vec::new(),
        }
    }

    /// Register a behavior's condition tree, arming every criterion
    ///
    /// Criteria are filed into the per-kind lists; elapsed-time criteria
    /// get a deadline on the timer queue. The behavior starts active.
    pub fn add_behavior(&mut self, id: NnuId, tree: WakeupTree) {
        if self.behaviors.contains_key(&id) {
            log::error!("behavior {id:?} registered twice");
            return;
        }
        let criteria = tree.criteria();
        self.behaviors.insert(
            id,
            BehaviorEntry {
                tree,
                active: true,
            },
        );
        for (node, kind) in criteria {
            match kind {
                CriterionKind::ElapsedTime { delay } => {
                    self.schedule_deadline(id, node, Instant::now() + delay);
                }
                CriterionKind::ElapsedFrames { .. } => self.frame_conditions.push((id, node)),
                CriterionKind::TransformChanged { node: watched } => {
                    self.transform_conditions.push((id, watched, node));
                }
                CriterionKind::RegionEntry { .. } | CriterionKind::RegionExit { .. } => {
                    self.region_conditions.push((id, node));
                }
                CriterionKind::BehaviorPost { .. } => self.post_conditions.push((id, node)),
                CriterionKind::Activation => self.activation_conditions.push((id, node)),
            }
        }
    }

    /// Deregister a behavior, dropping all of its conditions
    ///
    /// Safe at any time, including mid-flight toward triggering; a
    /// no-op for an unknown behavior.
    pub fn remove_behavior(&mut self, id: NnuId) {
        if self.behaviors.remove(&id).is_none() {
            return;
        }
        self.transform_conditions.retain(|(b, _, _)| *b != id);
        self.post_conditions.retain(|(b, _)| *b != id);
        self.frame_conditions.retain(|(b, _)| *b != id);
        self.region_conditions.retain(|(b, _)| *b != id);
        self.activation_conditions.retain(|(b, _)| *b != id);
        self.time_serials.retain(|_, (b, _)| *b != id);
        self.missed_deadlines.retain(|(b, _)| *b != id);
        self.timer.remove_behavior(id);
        self.ready.retain(|b| *b != id);
    }

    /// Re-arm a behavior after its callback ran
    ///
    /// Clears the tree and re-inserts elapsed-time deadlines.
    pub fn reset_behavior(&mut self, id: NnuId) {
        let Some(entry) = self.behaviors.get_mut(&id) else {
            return;
        };
        entry.tree.reset_tree();
        let criteria = entry.tree.criteria();

        self.timer.remove_behavior(id);
        self.time_serials.retain(|_, (b, _)| *b != id);
        self.missed_deadlines.retain(|(b, _)| *b != id);
        for (node, kind) in criteria {
            if let CriterionKind::ElapsedTime { delay } = kind {
                self.schedule_deadline(id, node, Instant::now() + delay);
            }
        }
    }

    /// Behaviors whose root condition was met since the last drain
    pub fn drain_ready(&mut self) -> Vec<NnuId> {
        std::mem::take(&mut self.ready)
    }

    /// Triggered criteria of a behavior, for its callback window
    pub fn triggered_elements(&self, id: NnuId) -> Vec<WakeupNodeKey> {
        self.behaviors
            .get(&id)
            .map(|e| e.tree.triggered_elements())
            .unwrap_or_default()
    }

    /// Whether a behavior is currently active
    pub fn is_active(&self, id: NnuId) -> bool {
        self.behaviors.get(&id).is_some_and(|e| e.active)
    }

    /// Number of registered behaviors
    pub fn behavior_count(&self) -> usize {
        self.behaviors.len()
    }

    fn schedule_deadline(&mut self, behavior: NnuId, node: WakeupNodeKey, deadline: Instant) {
        let serial = self.next_serial;
        self.next_serial += 1;
        self.time_serials.insert(serial, (behavior, node));
        self.timer.add(TimerEntry {
            deadline,
            behavior,
            serial,
        });
    }

    fn trigger(&mut self, behavior: NnuId, node: WakeupNodeKey) {
        let Some(entry) = self.behaviors.get_mut(&behavior) else {
            return;
        };
        if !entry.active {
            return;
        }
        if entry.tree.set_triggered(node) && !self.ready.contains(&behavior) {
            self.ready.push(behavior);
        }
    }

    fn handle_transform_changed(&mut self, message: &ChangeMessage) {
        let mut hits = Vec::new();
        for arg in &message.args {
            if let MessageArg::Id(changed) = arg {
                for &(behavior, watched, node) in &self.transform_conditions {
                    if watched == *changed {
                        hits.push((behavior, node));
                    }
                }
            }
        }
        for (behavior, node) in hits {
            self.trigger(behavior, node);
        }
    }

    fn handle_post(&mut self, message: &ChangeMessage) {
        let mut hits = Vec::new();
        for arg in &message.args {
            let MessageArg::Post { source, post_id } = arg else {
                continue;
            };
            for &(behavior, node) in &self.post_conditions {
                let Some(entry) = self.behaviors.get(&behavior) else {
                    continue;
                };
                let Some(criterion) = entry.tree.criterion_at(node) else {
                    continue;
                };
                if let CriterionKind::BehaviorPost {
                    source: want_source,
                    post_id: want_post,
                } = criterion.kind
                {
                    let source_ok = want_source.map_or(true, |want| want == *source);
                    let post_ok = want_post.map_or(true, |want| want == *post_id);
                    if source_ok && post_ok {
                        hits.push((behavior, node));
                    }
                }
            }
        }
        for (behavior, node) in hits {
            self.trigger(behavior, node);
        }
    }

    fn handle_time_elapsed(&mut self, message: &ChangeMessage) {
        for arg in &message.args {
            let MessageArg::Count(serial) = arg else {
                continue;
            };
            let Some((behavior, node)) = self.time_serials.remove(serial) else {
                // Deadline for a deregistered or already-reset criterion.
                continue;
            };
            if self.behaviors.get(&behavior).is_some_and(|e| !e.active) {
                // Remember the miss; re-armed on activation.
                self.missed_deadlines.push((behavior, node));
                continue;
            }
            self.trigger(behavior, node);
        }
    }

    fn handle_frame_tick(&mut self) {
        let mut hits = Vec::new();
        for &(behavior, node) in &self.frame_conditions {
            let Some(entry) = self.behaviors.get_mut(&behavior) else {
                continue;
            };
            if !entry.active {
                continue;
            }
            if entry
                .tree
                .criterion_at_mut(node)
                .is_some_and(|c| c.count_frame())
            {
                hits.push((behavior, node));
            }
        }
        for (behavior, node) in hits {
            self.trigger(behavior, node);
        }
    }

    fn handle_region(&mut self, message: &ChangeMessage, entered: bool) {
        let mut subject = None;
        let mut location = None;
        for arg in &message.args {
            match arg {
                MessageArg::Id(id) => subject = Some(*id),
                MessageArg::Bounds(bounds) => location = Some(*bounds),
                _ => {}
            }
        }
        let (Some(subject), Some(location)) = (subject, location) else {
            log::error!("region message missing subject or location");
            return;
        };

        let mut hits = Vec::new();
        for &(behavior, node) in &self.region_conditions {
            let Some(entry) = self.behaviors.get(&behavior) else {
                continue;
            };
            let Some(criterion) = entry.tree.criterion_at(node) else {
                continue;
            };
            let matched = match criterion.kind {
                CriterionKind::RegionEntry {
                    subject: want,
                    region,
                } if entered => want.id() == subject && region.intersects(&location),
                CriterionKind::RegionExit {
                    subject: want,
                    region,
                } if !entered => want.id() == subject && region.intersects(&location),
                _ => false,
            };
            if matched {
                hits.push((behavior, node));
            }
        }
        for (behavior, node) in hits {
            self.trigger(behavior, node);
        }
    }

    fn handle_activation(&mut self, message: &ChangeMessage) {
        let mut id = None;
        let mut active = None;
        for arg in &message.args {
            match arg {
                MessageArg::Id(behavior) => id = Some(*behavior),
                MessageArg::Flag(value) => active = Some(*value),
                _ => {}
            }
        }
        let (Some(id), Some(active)) = (id, active) else {
            log::error!("activation message missing behavior id or flag");
            return;
        };

        let was_active = match self.behaviors.get_mut(&id) {
            Some(entry) => {
                let was = entry.active;
                entry.active = active;
                was
            }
            None => return,
        };

        if active && !was_active {
            // Re-insert deadlines that fired during inactivity.
            let (missed, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.missed_deadlines)
                .into_iter()
                .partition(|(b, _)| *b == id);
            self.missed_deadlines = rest;
            for (behavior, node) in missed {
                let delay = self
                    .behaviors
                    .get(&behavior)
                    .and_then(|e| e.tree.criterion_at(node))
                    .and_then(|c| match c.kind {
                        CriterionKind::ElapsedTime { delay } => Some(delay),
                        _ => None,
                    });
                if let Some(delay) = delay {
                    self.schedule_deadline(behavior, node, Instant::now() + delay);
                }
            }

            let hits: Vec<(NnuId, WakeupNodeKey)> = self
                .activation_conditions
                .iter()
                .filter(|(b, _)| *b == id)
                .copied()
                .collect();
            for (behavior, node) in hits {
                self.trigger(behavior, node);
            }
        }
    }

    /// Hand a due timer entry to the owning criterion
    ///
    /// Used by the master control loop after draining the timer sink.
    pub fn deliver_deadline(&mut self, entry: TimerEntry) {
        let Some((behavior, node)) = self.time_serials.remove(&entry.serial) else {
            return;
        };
        if self.behaviors.get(&behavior).is_some_and(|e| !e.active) {
            self.missed_deadlines.push((behavior, node));
            return;
        }
        self.trigger(behavior, node);
    }

    /// Regions a behavior currently watches, for external motion tests
    pub fn watched_regions(&self, subject: NnuId) -> Vec<BoundingBox> {
        let mut regions = Vec::new();
        for &(behavior, node) in &self.region_conditions {
            let Some(entry) = self.behaviors.get(&behavior) else {
                continue;
            };
            let Some(criterion) = entry.tree.criterion_at(node) else {
                continue;
            };
            match criterion.kind {
                CriterionKind::RegionEntry { subject: want, region }
                | CriterionKind::RegionExit { subject: want, region }
                    if want.id() == subject =>
                {
                    regions.push(region);
                }
                _ => {}
            }
        }
        regions
    }
}

impl Structure for BehaviorStructure {
    fn kind(&self) -> ThreadKinds {
        ThreadKinds::BEHAVIOR
    }

    fn process_messages(&mut self, messages: &[Arc<ChangeMessage>], _reference_time: Timestamp) {
        for message in messages {
            match message.kind {
                MessageKind::TransformChanged => self.handle_transform_changed(message),
                MessageKind::BehaviorPost => self.handle_post(message),
                MessageKind::TimeElapsed => self.handle_time_elapsed(message),
                MessageKind::FrameTick => self.handle_frame_tick(),
                MessageKind::RegionEntered => self.handle_region(message, true),
                MessageKind::RegionExited => self.handle_region(message, false),
                MessageKind::ActivationChanged => self.handle_activation(message),
                _ => {}
            }
        }
    }
}
