//! Zoning and faction policy.
//!
//! The world module owns zoning and faction assignment; the core only
//! consumes the answers. This resource is the seam: the world (or a test,
//! or a scenario file) writes rows, the combat and PvP layers read them.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entity::EntityId;

pub type FactionId = u32;

/// Zone classification for attackability rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ZoneKind {
    /// No hostile action possible.
    Sanctuary,
    /// Ordinary world zone; only flagged hostilities apply.
    #[default]
    Normal,
    /// Cross-faction combat permitted.
    Contested,
    /// Open combat zone.
    Hostile,
}

/// Per-entity zone and faction rows, with world-level defaults.
#[derive(Resource, Debug, Default)]
pub struct ZonePolicy {
    zones: HashMap<EntityId, ZoneKind>,
    factions: HashMap<EntityId, FactionId>,
    default_zone: ZoneKind,
}

impl ZonePolicy {
    pub fn with_default_zone(default_zone: ZoneKind) -> Self {
        Self {
            default_zone,
            ..Default::default()
        }
    }

    pub fn set_zone(&mut self, entity: EntityId, zone: ZoneKind) {
        self.zones.insert(entity, zone);
    }

    pub fn zone_of(&self, entity: EntityId) -> ZoneKind {
        self.zones.get(&entity).copied().unwrap_or(self.default_zone)
    }

    pub fn is_safe_zone(&self, entity: EntityId) -> bool {
        self.zone_of(entity) == ZoneKind::Sanctuary
    }

    pub fn set_faction(&mut self, entity: EntityId, faction: FactionId) {
        self.factions.insert(entity, faction);
    }

    pub fn faction_of(&self, entity: EntityId) -> FactionId {
        self.factions.get(&entity).copied().unwrap_or(0)
    }

    pub fn same_faction(&self, a: EntityId, b: EntityId) -> bool {
        self.faction_of(a) == self.faction_of(b)
    }

    pub fn remove_entity(&mut self, entity: EntityId) {
        self.zones.remove(&entity);
        self.factions.remove(&entity);
    }
}
