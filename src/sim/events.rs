//! Events published by the core.
//!
//! Downstream consumers (network broadcast, telemetry, achievements)
//! subscribe to these; the core fires and forgets. The death ledger is
//! the intra-tick twin of [`EntityDied`]: the settlement phase drains it
//! so death bookkeeping happens exactly once per death, while the event
//! remains readable by external systems.

use bevy::prelude::*;

use crate::combat::damage::DamageRecord;
use crate::combo::ComboId;
use crate::entity::EntityId;
use crate::error::CombatError;
use crate::pvp::{MatchId, MatchKind, TeamSide};
use crate::status::EffectId;

/// A damage resolution was committed.
#[derive(Event, Debug, Clone)]
pub struct DamageResolved {
    pub record: DamageRecord,
}

/// An entity's health reached zero. Fired exactly once per death.
#[derive(Event, Debug, Clone, Copy)]
pub struct EntityDied {
    pub entity: EntityId,
    pub killer: Option<EntityId>,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct EffectApplied {
    pub target: EntityId,
    pub effect: EffectId,
    pub caster: EntityId,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct EffectExpired {
    pub target: EntityId,
    pub effect: EffectId,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct ComboCompleted {
    pub entity: EntityId,
    pub combo: ComboId,
    pub hits: u32,
    pub damage: f32,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct MatchStarted {
    pub match_id: MatchId,
    pub kind: MatchKind,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct MatchEnded {
    pub match_id: MatchId,
    pub kind: MatchKind,
    pub winner: Option<TeamSide>,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct RatingChanged {
    pub player: EntityId,
    pub delta: i32,
    pub new_rating: i32,
}

/// A command failed its preconditions, or an in-flight operation was
/// broken. The network layer maps the error kind to a protocol reply.
#[derive(Event, Debug, Clone)]
pub struct CommandRejected {
    pub entity: EntityId,
    pub error: CombatError,
}

/// Deaths recorded this tick, awaiting settlement at the PvP phase.
#[derive(Resource, Debug, Default)]
pub struct DeathLedger {
    deaths: Vec<EntityDied>,
}

impl DeathLedger {
    pub fn push(&mut self, entity: EntityId, killer: Option<EntityId>) {
        self.deaths.push(EntityDied { entity, killer });
    }

    pub fn drain(&mut self) -> Vec<EntityDied> {
        std::mem::take(&mut self.deaths)
    }

    pub fn is_empty(&self) -> bool {
        self.deaths.is_empty()
    }
}
