//! Simulation core: tick phases, shared engine context, command
//! ingress, events and the deferred lifetime cascade.
//!
//! One `Update` pass of the schedule is one authoritative tick. Phases
//! run in a fixed chained order; events emitted by an earlier phase are
//! observed by later phases of the same tick.

pub mod clock;
pub mod commands;
pub mod events;
pub mod policy;
pub mod rng;
pub mod spatial;

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;

use crate::combat::{AutoAttacks, CombatLogs, CombatPlugin, ThreatTable};
use crate::combo::{ComboLibrary, ComboPlugin, ComboStates};
use crate::entity::{Combatant, EntityRegistry};
use crate::pvp::{self, PvpCoordinator, PvpPlugin};
use crate::skill::{SkillBook, SkillPlugin, SkillState};
use crate::status::{EffectCatalog, StatusEffects, StatusPlugin};

pub use clock::{advance_clock, SimClock};
pub use commands::{drain_commands, CommandQueue, GameCommand};
pub use events::{
    ComboCompleted, CommandRejected, DamageResolved, DeathLedger, EffectApplied, EffectExpired,
    EntityDied, MatchEnded, MatchStarted, RatingChanged,
};
pub use policy::{FactionId, ZoneKind, ZonePolicy};
pub use rng::CombatRng;
pub use spatial::{GroundPoint, TargetFilter, TargetShape};

/// Fixed phase order of one simulation tick.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickPhase {
    /// Clock advance and command ingress.
    Ingress,
    /// Status-effect expiry, periodic payloads, snapshot refresh.
    StatusTick,
    /// Cast, channel and toggle advancement.
    SkillTick,
    /// Combo timing windows.
    ComboTick,
    /// Auto-attack scheduler.
    CombatTick,
    /// Death settlement, duels, matchmaking, match timers.
    PvpTick,
    /// Deferred unregistration cascade.
    Cleanup,
}

/// Event writers for everything the core publishes, plus the death
/// ledger the settlement phase drains.
#[derive(SystemParam)]
pub struct CombatEvents<'w> {
    pub damage: EventWriter<'w, DamageResolved>,
    pub died: EventWriter<'w, EntityDied>,
    pub effect_applied: EventWriter<'w, EffectApplied>,
    pub effect_expired: EventWriter<'w, EffectExpired>,
    pub combo_completed: EventWriter<'w, ComboCompleted>,
    pub match_started: EventWriter<'w, MatchStarted>,
    pub match_ended: EventWriter<'w, MatchEnded>,
    pub rating_changed: EventWriter<'w, RatingChanged>,
    pub rejected: EventWriter<'w, CommandRejected>,
    pub ledger: ResMut<'w, DeathLedger>,
}

/// The engine resources every orchestration system works against.
///
/// Grouping them in one `SystemParam` keeps system signatures readable
/// and lets helper functions split borrows across the engines.
#[derive(SystemParam)]
pub struct EngineCtx<'w> {
    pub clock: Res<'w, SimClock>,
    pub rng: ResMut<'w, CombatRng>,
    pub registry: ResMut<'w, EntityRegistry>,
    pub queue: ResMut<'w, CommandQueue>,
    pub policy: ResMut<'w, ZonePolicy>,
    pub book: Res<'w, SkillBook>,
    pub skills: ResMut<'w, SkillState>,
    pub effects: Res<'w, EffectCatalog>,
    pub status: ResMut<'w, StatusEffects>,
    pub library: Res<'w, ComboLibrary>,
    pub combos: ResMut<'w, ComboStates>,
    pub pvp: ResMut<'w, PvpCoordinator>,
    pub auto: ResMut<'w, AutoAttacks>,
    pub threat: ResMut<'w, ThreatTable>,
    pub logs: ResMut<'w, CombatLogs>,
    pub events: CombatEvents<'w>,
}

/// The full simulation: all engines wired into the tick phases.
pub struct SimPlugin {
    pub seed: u64,
}

impl Default for SimPlugin {
    fn default() -> Self {
        Self { seed: 0 }
    }
}

impl Plugin for SimPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(SimClock::default())
            .insert_resource(CombatRng::new(self.seed))
            .init_resource::<CommandQueue>()
            .init_resource::<EntityRegistry>()
            .init_resource::<ZonePolicy>()
            .init_resource::<DeathLedger>()
            .add_event::<DamageResolved>()
            .add_event::<EntityDied>()
            .add_event::<EffectApplied>()
            .add_event::<EffectExpired>()
            .add_event::<ComboCompleted>()
            .add_event::<MatchStarted>()
            .add_event::<MatchEnded>()
            .add_event::<RatingChanged>()
            .add_event::<CommandRejected>()
            .configure_sets(
                Update,
                (
                    TickPhase::Ingress,
                    TickPhase::StatusTick,
                    TickPhase::SkillTick,
                    TickPhase::ComboTick,
                    TickPhase::CombatTick,
                    TickPhase::PvpTick,
                    TickPhase::Cleanup,
                )
                    .chain(),
            )
            .add_plugins((StatusPlugin, SkillPlugin, ComboPlugin, CombatPlugin, PvpPlugin))
            .add_systems(
                Update,
                (advance_clock, drain_commands)
                    .chain()
                    .in_set(TickPhase::Ingress),
            )
            .add_systems(
                Update,
                settle_deaths
                    .in_set(TickPhase::PvpTick)
                    .before(pvp::update_pvp),
            )
            .add_systems(Update, flush_unregistrations.in_set(TickPhase::Cleanup));
    }
}

/// Settle the tick's deaths: break combos and auto-attacks, strip
/// non-persistent effects, drop threat edges, credit PvP kills and close
/// matches decided by the death.
pub fn settle_deaths(mut ctx: EngineCtx, combatants: Query<&Combatant>) {
    let deaths = ctx.events.ledger.drain();
    for death in deaths {
        let victim = death.entity;
        debug!("settling death of {victim}");

        ctx.combos.interrupt(victim);
        ctx.auto.stop(victim);
        ctx.auto.stop_attacks_on(victim);
        let _ = ctx.skills.cancel_cast(victim);
        for effect in ctx.status.on_death(&ctx.effects, victim) {
            ctx.events
                .effect_expired
                .send(EffectExpired { target: victim, effect });
        }
        // Threat edges exist only while both endpoints live.
        ctx.threat.remove_entity(victim);

        // PvP: kill credit, kill caps, and team wipes.
        if let Some(outcome) = ctx.pvp.record_match_kill(victim, death.killer) {
            pvp::publish_transition(&mut ctx.events, pvp::PvpTickEvent::MatchFinished(outcome));
            continue;
        }
        let wipe = ctx.pvp.match_of(victim).and_then(|record| {
            if record.phase != pvp::PvpState::InProgress {
                return None;
            }
            let side = record.team_of(victim)?;
            let all_dead = record.team(side).iter().all(|member| {
                *member == victim
                    || ctx
                        .registry
                        .lookup(*member)
                        .and_then(|entity| combatants.get(entity).ok())
                        .map_or(true, |combatant| !combatant.is_alive())
            });
            all_dead.then_some((record.id, side))
        });
        if let Some((match_id, side)) = wipe {
            if let Some(outcome) = ctx.pvp.settle_team_wipe(match_id, side) {
                pvp::publish_transition(&mut ctx.events, pvp::PvpTickEvent::MatchFinished(outcome));
            }
        }
    }
}

/// Apply deferred unregistrations: every per-entity row in every engine
/// goes away, then the ECS entity despawns.
pub fn flush_unregistrations(mut ctx: EngineCtx, mut commands: Commands) {
    for (id, entity) in ctx.registry.take_pending() {
        ctx.skills.remove_entity(id);
        ctx.status.remove_entity(id);
        ctx.combos.remove_entity(id);
        ctx.threat.remove_entity(id);
        ctx.auto.remove_entity(id);
        ctx.logs.remove_entity(id);
        ctx.rng.remove_actor(id);
        ctx.policy.remove_entity(id);
        for transition in ctx.pvp.remove_entity(id) {
            pvp::publish_transition(&mut ctx.events, transition);
        }
        commands.entity(entity).despawn();
    }
}
