//! Seeded randomness for reproducible combat.
//!
//! Every logical actor gets its own `StdRng` stream derived from the
//! world seed and the actor's entity id. One actor rolling more or fewer
//! times in a tick never shifts another actor's sequence, which keeps
//! recorded matches replayable even when command streams differ only for
//! one participant.

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use crate::entity::EntityId;

/// Per-actor random streams derived from a single world seed.
#[derive(Resource)]
pub struct CombatRng {
    world_seed: u64,
    streams: HashMap<EntityId, StdRng>,
}

impl CombatRng {
    pub fn new(world_seed: u64) -> Self {
        Self {
            world_seed,
            streams: HashMap::new(),
        }
    }

    pub fn world_seed(&self) -> u64 {
        self.world_seed
    }

    /// The random stream owned by `actor`, created on first use.
    pub fn actor(&mut self, actor: EntityId) -> &mut StdRng {
        let seed = self.world_seed;
        self.streams
            .entry(actor)
            .or_insert_with(|| StdRng::seed_from_u64(splitmix64(seed ^ actor.get())))
    }

    /// Roll a uniform `[0, 1)` chance check on the actor's stream.
    pub fn roll_chance(&mut self, actor: EntityId, chance: f32) -> bool {
        if chance <= 0.0 {
            return false;
        }
        self.actor(actor).gen::<f32>() < chance
    }

    /// Drop the stream of an unregistered actor.
    pub fn remove_actor(&mut self, actor: EntityId) {
        self.streams.remove(&actor);
    }
}

impl Default for CombatRng {
    fn default() -> Self {
        Self::new(0)
    }
}

// Finalizer from the splitmix64 generator; spreads adjacent ids over the
// whole seed space.
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}
