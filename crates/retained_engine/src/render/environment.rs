//! Rendering-environment structure
//!
//! Bookkeeping for the active lighting environment. Light insertions,
//! removals, and enable toggles arrive as messages; the current state
//! snapshots into a [`LightSet`] the render bin buckets against.

use crate::foundation::time::Timestamp;
use crate::render::light_set::{Light, LightSet};
use crate::structures::message::{ChangeMessage, MessageArg, MessageKind, ThreadKinds};
use crate::structures::structure::Structure;
use crate::structures::targets::NnuId;
use std::collections::HashMap;
use std::sync::Arc;

/// Active lights and the lighting-enabled master switch
pub struct RenderingEnvironmentStructure {
    lights: HashMap<NnuId, Light>,
    lighting_enabled: bool,
}

impl Default for RenderingEnvironmentStructure {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderingEnvironmentStructure {
    /// Create an empty environment with lighting enabled
    pub fn new() -> Self {
        Self {
            lights: HashMap::new(),
            lighting_enabled: true,
        }
    }

    /// Snapshot the enabled lights into a set
    pub fn current_light_set(&self) -> LightSet {
        let lights: Vec<Light> = self.lights.values().copied().collect();
        LightSet::from_lights(&lights, self.lighting_enabled)
    }

    /// Number of tracked lights, enabled or not
    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    /// Master lighting switch
    pub fn set_lighting_enabled(&mut self, enabled: bool) {
        self.lighting_enabled = enabled;
    }

    fn handle_lights_changed(&mut self, message: &ChangeMessage) {
        let mut id = None;
        for arg in &message.args {
            match arg {
                MessageArg::Id(light) => id = Some(*light),
                MessageArg::Flag(enabled) => match id {
                    Some(light) => {
                        self.lights
                            .entry(light)
                            .or_insert_with(|| Light::new(light))
                            .enabled = *enabled;
                    }
                    None => log::error!("light enable flag without a preceding light id"),
                },
                _ => {}
            }
        }
    }

    fn handle_removed(&mut self, message: &ChangeMessage) {
        for arg in &message.args {
            if let MessageArg::Id(id) = arg {
                if self.lights.remove(id).is_none() {
                    log::error!("removal of untracked light {id:?}");
                }
            }
        }
    }
}

impl Structure for RenderingEnvironmentStructure {
    fn kind(&self) -> ThreadKinds {
        ThreadKinds::RENDERING_ENVIRONMENT
    }

    fn process_messages(&mut self, messages: &[Arc<ChangeMessage>], _reference_time: Timestamp) {
        for message in messages {
            match message.kind {
                MessageKind::LightsChanged => self.handle_lights_changed(message),
                MessageKind::NodesRemoved => self.handle_removed(message),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::message::MessagePool;

    fn lights_changed(pool: &MessagePool, id: u64, enabled: bool) -> Arc<ChangeMessage> {
        pool.acquire(
            MessageKind::LightsChanged,
            Timestamp(1),
            ThreadKinds::RENDERING_ENVIRONMENT,
            vec![MessageArg::Id(NnuId(id)), MessageArg::Flag(enabled)],
        )
    }

    #[test]
    fn test_toggle_and_remove_lights() {
        let pool = MessagePool::new(8);
        let mut env = RenderingEnvironmentStructure::new();

        env.process_messages(
            &[lights_changed(&pool, 1, true), lights_changed(&pool, 2, true)],
            Timestamp(1),
        );
        assert_eq!(env.current_light_set().members(), &[NnuId(1), NnuId(2)]);

        // Disabling drops a light from the snapshot but not the table.
        env.process_messages(&[lights_changed(&pool, 2, false)], Timestamp(2));
        assert_eq!(env.current_light_set().members(), &[NnuId(1)]);
        assert_eq!(env.light_count(), 2);

        let removed = pool.acquire(
            MessageKind::NodesRemoved,
            Timestamp(3),
            ThreadKinds::RENDERING_ENVIRONMENT,
            vec![MessageArg::Id(NnuId(2))],
        );
        env.process_messages(&[removed], Timestamp(3));
        assert_eq!(env.light_count(), 1);
    }

    #[test]
    fn test_master_switch_affects_equality() {
        let pool = MessagePool::new(8);
        let mut env = RenderingEnvironmentStructure::new();
        env.process_messages(&[lights_changed(&pool, 1, true)], Timestamp(1));

        let on = env.current_light_set();
        env.set_lighting_enabled(false);
        let off = env.current_light_set();
        assert_ne!(on, off);
    }
}
