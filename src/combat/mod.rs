//! Combat resolution: damage calculation, threat, combat logs and the
//! auto-attack scheduler.

pub mod auto_attack;
pub mod damage;
pub mod log;
pub mod manager;
pub mod threat;

use bevy::prelude::*;

use crate::sim::TickPhase;

pub use auto_attack::{AutoAttackState, AutoAttacks};
pub use damage::{CombatOutcome, DamageRecord, DamageType};
pub use log::{CombatLogs, COMBAT_LOG_CAPACITY};
pub use manager::{is_behind_target, DamageOptions, AOE_THREAT_MULTIPLIER};
pub use threat::{ThreatEdge, ThreatTable};

pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ThreatTable>()
            .init_resource::<CombatLogs>()
            .init_resource::<AutoAttacks>()
            .add_systems(
                Update,
                auto_attack::update_auto_attacks.in_set(TickPhase::CombatTick),
            );
    }
}
