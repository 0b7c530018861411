//! PvP coordination: duels, arenas, battlegrounds, matchmaking and
//! ratings.

pub mod coordinator;
pub mod matchmaking;

use bevy::prelude::*;

use crate::sim::{CombatEvents, EngineCtx, MatchEnded, MatchStarted, RatingChanged, TickPhase};

pub use coordinator::{
    DuelRequest, MatchId, MatchKind, MatchOutcome, MatchRecord, PvpController, PvpCoordinator,
    PvpState, PvpStats, PvpTickEvent, RatingChange, TeamSide, DUEL_REQUEST_TIMEOUT,
    MATCH_PREPARATION_SECONDS,
};
pub use matchmaking::{rating_delta, MatchmakingQueue, QueueEntry, ELO_K, INITIAL_RATING};

pub struct PvpPlugin;

impl Plugin for PvpPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PvpCoordinator>()
            .add_systems(Update, update_pvp.in_set(TickPhase::PvpTick));
    }
}

/// Per-tick PvP upkeep: duel expiry, matchmaking, match timers.
pub fn update_pvp(mut ctx: EngineCtx) {
    let now = ctx.clock.now();
    let dt = ctx.clock.dt();
    let transitions = ctx.pvp.update(now, dt);
    for transition in transitions {
        publish_transition(&mut ctx.events, transition);
    }
}

/// Broadcast a coordinator transition as public events.
pub fn publish_transition(events: &mut CombatEvents, transition: PvpTickEvent) {
    match transition {
        PvpTickEvent::MatchWentLive(match_id, kind) => {
            events.match_started.send(MatchStarted { match_id, kind });
        }
        PvpTickEvent::MatchFinished(outcome) => {
            for change in &outcome.rating_changes {
                events.rating_changed.send(RatingChanged {
                    player: change.player,
                    delta: change.delta,
                    new_rating: change.new_rating,
                });
            }
            events.match_ended.send(MatchEnded {
                match_id: outcome.match_id,
                kind: outcome.kind,
                winner: outcome.winner,
            });
        }
    }
}
