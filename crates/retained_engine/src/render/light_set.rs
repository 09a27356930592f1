//! Light sets
//!
//! A light set is the deduplicated set of lights active for a render
//! molecule. Equality is by membership and the lighting-enabled flag,
//! never by the order lights were supplied, so the same lights in a
//! different sequence do not fragment bins.

use crate::foundation::math::Vec3;
use crate::structures::targets::NnuId;

/// One active light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    /// Owning scene node
    pub id: NnuId,
    /// Emitted color
    pub color: Vec3,
    /// Scalar intensity multiplier
    pub intensity: f32,
    /// Whether the light currently contributes
    pub enabled: bool,
}

impl Light {
    /// Create an enabled white light
    pub fn new(id: NnuId) -> Self {
        Self {
            id,
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            enabled: true,
        }
    }
}

/// Deduplicated set of active lights for one state bucket
#[derive(Debug, Clone, Default)]
pub struct LightSet {
    /// Member light ids, sorted and deduplicated
    members: Vec<NnuId>,
    /// Whether lighting is enabled for the bucket at all
    pub lighting_enabled: bool,
}

impl LightSet {
    /// Build a set from light ids in any order
    pub fn from_ids(ids: &[NnuId], lighting_enabled: bool) -> Self {
        let mut members = ids.to_vec();
        members.sort_unstable();
        members.dedup();
        Self {
            members,
            lighting_enabled,
        }
    }

    /// Build a set from the enabled lights of a slice
    pub fn from_lights(lights: &[Light], lighting_enabled: bool) -> Self {
        let ids: Vec<NnuId> = lights.iter().filter(|l| l.enabled).map(|l| l.id).collect();
        Self::from_ids(&ids, lighting_enabled)
    }

    /// Member light ids in sorted order
    pub fn members(&self) -> &[NnuId] {
        &self.members
    }

    /// Number of member lights
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the set has no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl PartialEq for LightSet {
    fn eq(&self, other: &Self) -> bool {
        self.lighting_enabled == other.lighting_enabled && self.members == other.members
    }
}

impl Eq for LightSet {}
