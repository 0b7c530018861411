//! Combat-participating entities.
//!
//! The rest of the core never assumes a concrete entity representation:
//! it addresses entities by [`EntityId`] through the [`registry`] and
//! reads the combat capability through the [`Combatant`] component.

pub mod combatant;
pub mod registry;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use combatant::{CombatStats, Combatant, DamageTaken, ResourceKind, Stat};
pub use registry::EntityRegistry;

/// Stable 64-bit identifier for a combat-participating entity.
///
/// Ids are assigned by the server's entity allocator (or a scenario
/// file); the ECS `Entity` behind an id is an implementation detail the
/// engines never store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}
