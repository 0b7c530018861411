//! PvP coordination: duels, match instances, queues and ratings.
//!
//! The coordinator owns per-player PvP controllers (state, stats,
//! rating), pending duel requests, live match records and the
//! matchmaking queues. It is also the authoritative attackability gate
//! the combat manager consults before any hostile action.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entity::EntityId;
use crate::error::{CombatError, CombatResult};
use crate::sim::policy::{ZoneKind, ZonePolicy};

use super::matchmaking::{rating_delta, MatchmakingQueue, INITIAL_RATING, RATING_FLOOR};

/// Seconds a duel request stays pending before it lapses.
pub const DUEL_REQUEST_TIMEOUT: f32 = 30.0;
/// Seconds of preparation before a matchmade instance goes live.
pub const MATCH_PREPARATION_SECONDS: f32 = 10.0;

/// Match flavor; fixes team size, duration cap and win conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchKind {
    Duel,
    Arena2v2,
    Arena3v3,
    Arena5v5,
    Battleground10v10,
    Battleground20v20,
}

impl MatchKind {
    pub const ALL: [MatchKind; 6] = [
        MatchKind::Duel,
        MatchKind::Arena2v2,
        MatchKind::Arena3v3,
        MatchKind::Arena5v5,
        MatchKind::Battleground10v10,
        MatchKind::Battleground20v20,
    ];

    pub fn team_size(self) -> usize {
        match self {
            MatchKind::Duel => 1,
            MatchKind::Arena2v2 => 2,
            MatchKind::Arena3v3 => 3,
            MatchKind::Arena5v5 => 5,
            MatchKind::Battleground10v10 => 10,
            MatchKind::Battleground20v20 => 20,
        }
    }

    /// Wall cap on match duration, in seconds.
    pub fn duration_cap(self) -> f32 {
        match self {
            MatchKind::Duel => 300.0,
            MatchKind::Arena2v2 | MatchKind::Arena3v3 | MatchKind::Arena5v5 => 600.0,
            MatchKind::Battleground10v10 | MatchKind::Battleground20v20 => 1200.0,
        }
    }

    pub fn score_cap(self) -> Option<u32> {
        match self {
            MatchKind::Battleground10v10 | MatchKind::Battleground20v20 => Some(1000),
            _ => None,
        }
    }

    pub fn kill_cap(self) -> Option<u32> {
        match self {
            MatchKind::Duel => Some(1),
            _ => None,
        }
    }
}

/// Lifecycle shared by matches and player controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PvpState {
    #[default]
    None,
    Queued,
    Preparation,
    InProgress,
    Ending,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamSide {
    A,
    B,
}

impl TeamSide {
    pub fn opposite(self) -> TeamSide {
        match self {
            TeamSide::A => TeamSide::B,
            TeamSide::B => TeamSide::A,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct MatchId(pub u64);

impl std::fmt::Display for MatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "match:{}", self.0)
    }
}

/// One live match instance.
#[derive(Debug, Clone)]
pub struct MatchRecord {
    pub id: MatchId,
    pub kind: MatchKind,
    pub phase: PvpState,
    pub team_a: Vec<EntityId>,
    pub team_b: Vec<EntityId>,
    pub created_at: f64,
    /// Set when the match leaves preparation.
    pub live_at: Option<f64>,
    pub prep_remaining: f32,
    pub duration_cap: f32,
    pub score_a: u32,
    pub score_b: u32,
    pub score_cap: Option<u32>,
    pub kill_cap: Option<u32>,
    pub kills_a: u32,
    pub kills_b: u32,
}

impl MatchRecord {
    pub fn team_of(&self, entity: EntityId) -> Option<TeamSide> {
        if self.team_a.contains(&entity) {
            Some(TeamSide::A)
        } else if self.team_b.contains(&entity) {
            Some(TeamSide::B)
        } else {
            None
        }
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.team_of(entity).is_some()
    }

    pub fn team(&self, side: TeamSide) -> &[EntityId] {
        match side {
            TeamSide::A => &self.team_a,
            TeamSide::B => &self.team_b,
        }
    }

    fn score(&self, side: TeamSide) -> u32 {
        match side {
            TeamSide::A => self.score_a,
            TeamSide::B => self.score_b,
        }
    }

    fn kills(&self, side: TeamSide) -> u32 {
        match side {
            TeamSide::A => self.kills_a,
            TeamSide::B => self.kills_b,
        }
    }
}

/// Lifetime PvP statistics of one player.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PvpStats {
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub kill_streak: u32,
    pub best_kill_streak: u32,
    pub matches_played: u32,
    pub matches_won: u32,
    pub matches_lost: u32,
    pub win_streak: u32,
    pub rating: i32,
    pub highest_rating: i32,
}

impl Default for PvpStats {
    fn default() -> Self {
        Self {
            kills: 0,
            deaths: 0,
            assists: 0,
            kill_streak: 0,
            best_kill_streak: 0,
            matches_played: 0,
            matches_won: 0,
            matches_lost: 0,
            win_streak: 0,
            rating: INITIAL_RATING,
            highest_rating: INITIAL_RATING,
        }
    }
}

/// Per-player PvP state.
#[derive(Debug, Clone, Default)]
pub struct PvpController {
    pub state: PvpState,
    pub current_match: Option<MatchId>,
    pub pvp_enabled: bool,
    pub stats: PvpStats,
    recent_kills: Vec<EntityId>,
    recent_deaths: Vec<EntityId>,
}

const RECENT_HISTORY: usize = 10;

impl PvpController {
    fn record_kill(&mut self, victim: EntityId) {
        self.stats.kills += 1;
        self.stats.kill_streak += 1;
        self.stats.best_kill_streak = self.stats.best_kill_streak.max(self.stats.kill_streak);
        self.recent_kills.push(victim);
        if self.recent_kills.len() > RECENT_HISTORY {
            self.recent_kills.remove(0);
        }
    }

    fn record_death(&mut self, killer: EntityId) {
        self.stats.deaths += 1;
        self.stats.kill_streak = 0;
        self.recent_deaths.push(killer);
        if self.recent_deaths.len() > RECENT_HISTORY {
            self.recent_deaths.remove(0);
        }
    }

    pub fn recent_kills(&self) -> &[EntityId] {
        &self.recent_kills
    }
}

/// A pending challenge between two players.
#[derive(Debug, Clone, Copy)]
pub struct DuelRequest {
    pub challenger: EntityId,
    pub target: EntityId,
    pub requested_at: f64,
}

/// A rating adjustment to broadcast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingChange {
    pub player: EntityId,
    pub delta: i32,
    pub new_rating: i32,
}

/// Everything a finished match settles to.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub match_id: MatchId,
    pub kind: MatchKind,
    pub winner: Option<TeamSide>,
    pub rating_changes: Vec<RatingChange>,
}

/// Events surfaced by the per-tick update, published by the owning
/// system.
#[derive(Debug, Clone)]
pub enum PvpTickEvent {
    MatchWentLive(MatchId, MatchKind),
    MatchFinished(MatchOutcome),
}

#[derive(Resource, Debug, Default)]
pub struct PvpCoordinator {
    controllers: HashMap<EntityId, PvpController>,
    pending_duels: Vec<DuelRequest>,
    matches: HashMap<MatchId, MatchRecord>,
    queues: HashMap<MatchKind, MatchmakingQueue>,
    next_match_id: u64,
}

impl PvpCoordinator {
    /// Create the PvP controller for a player entity. NPCs never get
    /// one; attackability against them falls back to faction rules.
    pub fn ensure_controller(&mut self, entity: EntityId) -> &mut PvpController {
        self.controllers.entry(entity).or_insert_with(|| {
            debug!("created pvp controller for {entity}");
            PvpController {
                pvp_enabled: true,
                ..Default::default()
            }
        })
    }

    pub fn controller(&self, entity: EntityId) -> Option<&PvpController> {
        self.controllers.get(&entity)
    }

    pub fn is_player(&self, entity: EntityId) -> bool {
        self.controllers.contains_key(&entity)
    }

    pub fn set_pvp_enabled(&mut self, entity: EntityId, enabled: bool) {
        self.ensure_controller(entity).pvp_enabled = enabled;
    }

    pub fn rating_of(&self, entity: EntityId) -> i32 {
        self.controllers
            .get(&entity)
            .map_or(INITIAL_RATING, |c| c.stats.rating)
    }

    pub fn match_record(&self, id: MatchId) -> Option<&MatchRecord> {
        self.matches.get(&id)
    }

    pub fn match_of(&self, entity: EntityId) -> Option<&MatchRecord> {
        let id = self.controllers.get(&entity)?.current_match?;
        self.matches.get(&id)
    }

    pub fn pending_duel_count(&self) -> usize {
        self.pending_duels.len()
    }

    pub fn queue_len(&self, kind: MatchKind) -> usize {
        self.queues.get(&kind).map_or(0, MatchmakingQueue::len)
    }

    pub fn average_queue_wait(&self, kind: MatchKind, now: f64) -> f32 {
        self.queues
            .get(&kind)
            .map_or(0.0, |queue| queue.average_wait(now))
    }

    // ------------------------------------------------------------------
    // Duels
    // ------------------------------------------------------------------

    /// Challenge `target` to a duel. Denied when either side is busy, in
    /// a safe zone, or the pair already has a pending request either way.
    pub fn send_duel_request(
        &mut self,
        challenger: EntityId,
        target: EntityId,
        policy: &ZonePolicy,
        now: f64,
    ) -> CombatResult<()> {
        if challenger == target {
            return Err(CombatError::InvalidTarget("cannot duel yourself".into()));
        }
        self.ensure_controller(challenger);
        self.ensure_controller(target);
        let challenger_state = self.controllers[&challenger].state;
        let target_state = self.controllers[&target].state;
        if challenger_state != PvpState::None || target_state != PvpState::None {
            return Err(CombatError::InvalidState(
                "one of the players is already busy".into(),
            ));
        }
        if policy.is_safe_zone(challenger) || policy.is_safe_zone(target) {
            return Err(CombatError::Rejected("duels are banned here".into()));
        }
        let pair_pending = self.pending_duels.iter().any(|request| {
            (request.challenger == challenger && request.target == target)
                || (request.challenger == target && request.target == challenger)
        });
        if pair_pending {
            return Err(CombatError::InvalidState("duel already pending".into()));
        }
        self.pending_duels.push(DuelRequest {
            challenger,
            target,
            requested_at: now,
        });
        info!("{challenger} challenged {target} to a duel");
        Ok(())
    }

    /// Accept a pending challenge; creates the duel match, which starts
    /// immediately.
    pub fn accept_duel(
        &mut self,
        target: EntityId,
        challenger: EntityId,
        now: f64,
    ) -> CombatResult<MatchId> {
        let position = self
            .pending_duels
            .iter()
            .position(|request| request.challenger == challenger && request.target == target)
            .ok_or_else(|| CombatError::NotFound("no such duel request".into()))?;
        self.pending_duels.remove(position);

        let id = self.allocate_match_id();
        let kind = MatchKind::Duel;
        let record = MatchRecord {
            id,
            kind,
            phase: PvpState::InProgress,
            team_a: vec![challenger],
            team_b: vec![target],
            created_at: now,
            live_at: Some(now),
            prep_remaining: 0.0,
            duration_cap: kind.duration_cap(),
            score_a: 0,
            score_b: 0,
            score_cap: kind.score_cap(),
            kill_cap: kind.kill_cap(),
            kills_a: 0,
            kills_b: 0,
        };
        for player in [challenger, target] {
            let controller = self.ensure_controller(player);
            controller.state = PvpState::InProgress;
            controller.current_match = Some(id);
        }
        self.matches.insert(id, record);
        info!("duel {id} started: {challenger} vs {target}");
        Ok(id)
    }

    pub fn decline_duel(&mut self, target: EntityId, challenger: EntityId) -> CombatResult<()> {
        let position = self
            .pending_duels
            .iter()
            .position(|request| request.challenger == challenger && request.target == target)
            .ok_or_else(|| CombatError::NotFound("no such duel request".into()))?;
        self.pending_duels.remove(position);
        info!("{target} declined a duel from {challenger}");
        Ok(())
    }

    /// Settle a duel decided outside the timer (a kill). Updates stats
    /// and ratings and releases both players.
    pub fn end_duel(&mut self, winner: EntityId, loser: EntityId) -> Option<MatchOutcome> {
        let match_id = self.controllers.get(&winner)?.current_match?;
        let record = self.matches.get(&match_id)?;
        let winner_side = record.team_of(winner)?;
        if record.team_of(loser) != Some(winner_side.opposite()) {
            return None;
        }
        self.end_match(match_id, Some(winner_side))
    }

    // ------------------------------------------------------------------
    // Queues
    // ------------------------------------------------------------------

    pub fn queue_for_match(
        &mut self,
        player: EntityId,
        kind: MatchKind,
        now: f64,
    ) -> CombatResult<()> {
        let controller = self.ensure_controller(player);
        if controller.state != PvpState::None {
            return Err(CombatError::InvalidState(
                "cannot queue while busy with pvp".into(),
            ));
        }
        let rating = controller.stats.rating;
        controller.state = PvpState::Queued;
        self.queues
            .entry(kind)
            .or_default()
            .add_player(player, rating, now);
        info!("{player} queued for {kind:?} (rating {rating})");
        Ok(())
    }

    /// Leaving the queue while queued always succeeds.
    pub fn leave_queue(&mut self, player: EntityId) -> CombatResult<()> {
        let controller = self
            .controllers
            .get_mut(&player)
            .ok_or_else(|| CombatError::NotFound(format!("{player} has no pvp state")))?;
        if controller.state != PvpState::Queued {
            return Err(CombatError::InvalidState("not queued".into()));
        }
        for queue in self.queues.values_mut() {
            queue.remove_player(player);
        }
        controller.state = PvpState::None;
        info!("{player} left the queue");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Match lifecycle
    // ------------------------------------------------------------------

    /// Per-tick upkeep: expire duel requests, run matchmaking, advance
    /// match timers. Returns the transitions for the caller to publish.
    pub fn update(&mut self, now: f64, dt: f32) -> Vec<PvpTickEvent> {
        let mut events = Vec::new();

        self.pending_duels
            .retain(|request| now - request.requested_at < DUEL_REQUEST_TIMEOUT as f64);

        // Matchmaking: pop as many full matches as each queue yields.
        for kind in MatchKind::ALL {
            loop {
                let Some(queue) = self.queues.get_mut(&kind) else {
                    break;
                };
                let Some((team_a, team_b)) = queue.try_create_match(kind.team_size(), now) else {
                    break;
                };
                let id = self.create_match(kind, team_a, team_b, now);
                debug!("matchmaking created {id} ({kind:?})");
            }
        }

        // Timers.
        let mut went_live = Vec::new();
        let mut expired = Vec::new();
        for record in self.matches.values_mut() {
            match record.phase {
                PvpState::Preparation => {
                    record.prep_remaining -= dt;
                    if record.prep_remaining <= 0.0 {
                        record.phase = PvpState::InProgress;
                        record.live_at = Some(now);
                        went_live.push((record.id, record.kind));
                    }
                }
                PvpState::InProgress => {
                    let live_at = record.live_at.unwrap_or(record.created_at);
                    if now - live_at >= record.duration_cap as f64 {
                        expired.push(record.id);
                    }
                }
                _ => {}
            }
        }
        // Record iteration order is arbitrary; transitions publish in id
        // order so replays are stable.
        went_live.sort_unstable_by_key(|(id, _)| *id);
        expired.sort_unstable();
        for (id, kind) in went_live {
            events.push(PvpTickEvent::MatchWentLive(id, kind));
        }
        for id in expired {
            let winner = self.winner_by_score(id);
            if let Some(outcome) = self.end_match(id, winner) {
                events.push(PvpTickEvent::MatchFinished(outcome));
            }
        }
        events
    }

    /// Record a score contribution (objectives, flags). Returns a
    /// finished outcome when the score cap is reached.
    pub fn add_score(
        &mut self,
        match_id: MatchId,
        side: TeamSide,
        points: u32,
    ) -> Option<MatchOutcome> {
        let record = self.matches.get_mut(&match_id)?;
        match side {
            TeamSide::A => record.score_a += points,
            TeamSide::B => record.score_b += points,
        }
        if let Some(cap) = record.score_cap {
            if record.score(side) >= cap {
                return self.end_match(match_id, Some(side));
            }
        }
        None
    }

    /// Credit a kill inside the victim's match. Returns a finished
    /// outcome when the kill cap is reached.
    pub fn record_match_kill(
        &mut self,
        victim: EntityId,
        killer: Option<EntityId>,
    ) -> Option<MatchOutcome> {
        if let Some(killer) = killer {
            if let Some(controller) = self.controllers.get_mut(&killer) {
                controller.record_kill(victim);
            }
        }
        if let Some(controller) = self.controllers.get_mut(&victim) {
            controller.record_death(killer.unwrap_or_default());
        }

        let match_id = self.controllers.get(&victim)?.current_match?;
        let record = self.matches.get_mut(&match_id)?;
        if record.phase != PvpState::InProgress {
            return None;
        }
        let victim_side = record.team_of(victim)?;
        let scoring_side = victim_side.opposite();
        match scoring_side {
            TeamSide::A => record.kills_a += 1,
            TeamSide::B => record.kills_b += 1,
        }
        if let Some(cap) = record.kill_cap {
            if record.kills(scoring_side) >= cap {
                return self.end_match(match_id, Some(scoring_side));
            }
        }
        None
    }

    /// Forced completion when one side has no living member left.
    pub fn settle_team_wipe(
        &mut self,
        match_id: MatchId,
        wiped: TeamSide,
    ) -> Option<MatchOutcome> {
        self.end_match(match_id, Some(wiped.opposite()))
    }

    pub fn record_assist(&mut self, player: EntityId) {
        if let Some(controller) = self.controllers.get_mut(&player) {
            controller.stats.assists += 1;
        }
    }

    /// Complete a match: aggregate stats, exchange rating, release the
    /// participants and drop the record.
    pub fn end_match(&mut self, match_id: MatchId, winner: Option<TeamSide>) -> Option<MatchOutcome> {
        let mut record = self.matches.remove(&match_id)?;
        record.phase = PvpState::Ending;

        let mut rating_changes = Vec::new();
        if let Some(winner_side) = winner {
            let winners: Vec<EntityId> = record.team(winner_side).to_vec();
            let losers: Vec<EntityId> = record.team(winner_side.opposite()).to_vec();
            if !winners.is_empty() && !losers.is_empty() {
                let delta = rating_delta(
                    self.average_rating(&winners),
                    self.average_rating(&losers),
                );
                for player in &winners {
                    rating_changes.push(self.adjust_rating(*player, delta));
                }
                for player in &losers {
                    rating_changes.push(self.adjust_rating(*player, -delta));
                }
            }
        }

        for (side, players) in [
            (TeamSide::A, record.team_a.clone()),
            (TeamSide::B, record.team_b.clone()),
        ] {
            let won = winner == Some(side);
            for player in players {
                if let Some(controller) = self.controllers.get_mut(&player) {
                    controller.stats.matches_played += 1;
                    if winner.is_some() {
                        if won {
                            controller.stats.matches_won += 1;
                            controller.stats.win_streak += 1;
                        } else {
                            controller.stats.matches_lost += 1;
                            controller.stats.win_streak = 0;
                        }
                    }
                    controller.state = PvpState::None;
                    controller.current_match = None;
                }
            }
        }

        record.phase = PvpState::Completed;
        info!(
            "{match_id} completed ({:?} won: {:?})",
            record.kind, winner
        );
        Some(MatchOutcome {
            match_id,
            kind: record.kind,
            winner,
            rating_changes,
        })
    }

    // ------------------------------------------------------------------
    // Attackability
    // ------------------------------------------------------------------

    /// The authoritative hostile-action gate.
    pub fn can_attack(&self, attacker: EntityId, target: EntityId, policy: &ZonePolicy) -> bool {
        if attacker == target {
            return false;
        }
        if policy.is_safe_zone(attacker) {
            return false;
        }

        let attacker_controller = self.controllers.get(&attacker);
        let target_controller = self.controllers.get(&target);

        // NPC on either side: plain faction hostility decides.
        let (Some(attacker_controller), Some(target_controller)) =
            (attacker_controller, target_controller)
        else {
            return !policy.same_faction(attacker, target);
        };

        if !attacker_controller.pvp_enabled || !target_controller.pvp_enabled {
            return false;
        }

        // Shared live match: only opponents may be hit.
        if let (Some(a), Some(b)) = (
            attacker_controller.current_match,
            target_controller.current_match,
        ) {
            if a == b {
                let Some(record) = self.matches.get(&a) else {
                    return false;
                };
                if record.phase != PvpState::InProgress {
                    return false;
                }
                return match (record.team_of(attacker), record.team_of(target)) {
                    (Some(side_a), Some(side_b)) => side_a != side_b,
                    _ => false,
                };
            }
        }

        // World PvP: contested and hostile zones open cross-faction
        // combat.
        match policy.zone_of(attacker) {
            ZoneKind::Contested | ZoneKind::Hostile => !policy.same_faction(attacker, target),
            _ => false,
        }
    }

    pub fn is_ally(&self, a: EntityId, b: EntityId) -> bool {
        if let (Some(ca), Some(cb)) = (self.controllers.get(&a), self.controllers.get(&b)) {
            if let (Some(ma), Some(mb)) = (ca.current_match, cb.current_match) {
                if ma == mb {
                    if let Some(record) = self.matches.get(&ma) {
                        if let (Some(sa), Some(sb)) = (record.team_of(a), record.team_of(b)) {
                            return sa == sb;
                        }
                    }
                }
            }
        }
        false
    }

    // ------------------------------------------------------------------
    // Lifetime
    // ------------------------------------------------------------------

    /// Cascade for an unregistered entity: out of queues and duels; an
    /// abandoned match ends in the other team's favor when the leaver's
    /// side empties.
    pub fn remove_entity(&mut self, entity: EntityId) -> Vec<PvpTickEvent> {
        let mut events = Vec::new();
        for queue in self.queues.values_mut() {
            queue.remove_player(entity);
        }
        self.pending_duels
            .retain(|request| request.challenger != entity && request.target != entity);

        let current_match = self
            .controllers
            .get(&entity)
            .and_then(|controller| controller.current_match);
        if let Some(match_id) = current_match {
            if let Some(record) = self.matches.get_mut(&match_id) {
                record.team_a.retain(|player| *player != entity);
                record.team_b.retain(|player| *player != entity);
                let abandoned_side = if record.team_a.is_empty() {
                    Some(TeamSide::A)
                } else if record.team_b.is_empty() {
                    Some(TeamSide::B)
                } else {
                    None
                };
                if let Some(side) = abandoned_side {
                    if let Some(outcome) = self.end_match(match_id, Some(side.opposite())) {
                        events.push(PvpTickEvent::MatchFinished(outcome));
                    }
                }
            }
        }
        self.controllers.remove(&entity);
        events
    }

    pub fn has_rows(&self, entity: EntityId) -> bool {
        self.controllers.contains_key(&entity)
            || self
                .queues
                .values()
                .any(|queue| queue.is_queued(entity))
            || self
                .matches
                .values()
                .any(|record| record.contains(entity))
            || self
                .pending_duels
                .iter()
                .any(|request| request.challenger == entity || request.target == entity)
    }

    fn create_match(
        &mut self,
        kind: MatchKind,
        team_a: Vec<EntityId>,
        team_b: Vec<EntityId>,
        now: f64,
    ) -> MatchId {
        let id = self.allocate_match_id();
        for player in team_a.iter().chain(team_b.iter()) {
            let controller = self.ensure_controller(*player);
            controller.state = PvpState::Preparation;
            controller.current_match = Some(id);
        }
        self.matches.insert(
            id,
            MatchRecord {
                id,
                kind,
                phase: PvpState::Preparation,
                team_a,
                team_b,
                created_at: now,
                live_at: None,
                prep_remaining: MATCH_PREPARATION_SECONDS,
                duration_cap: kind.duration_cap(),
                score_a: 0,
                score_b: 0,
                score_cap: kind.score_cap(),
                kill_cap: kind.kill_cap(),
                kills_a: 0,
                kills_b: 0,
            },
        );
        id
    }

    fn allocate_match_id(&mut self) -> MatchId {
        self.next_match_id += 1;
        MatchId(self.next_match_id)
    }

    fn winner_by_score(&self, match_id: MatchId) -> Option<TeamSide> {
        let record = self.matches.get(&match_id)?;
        match record.score_a.cmp(&record.score_b) {
            std::cmp::Ordering::Greater => Some(TeamSide::A),
            std::cmp::Ordering::Less => Some(TeamSide::B),
            std::cmp::Ordering::Equal => match record.kills_a.cmp(&record.kills_b) {
                std::cmp::Ordering::Greater => Some(TeamSide::A),
                std::cmp::Ordering::Less => Some(TeamSide::B),
                std::cmp::Ordering::Equal => None,
            },
        }
    }

    fn average_rating(&self, players: &[EntityId]) -> i32 {
        if players.is_empty() {
            return INITIAL_RATING;
        }
        let total: i64 = players
            .iter()
            .map(|player| self.rating_of(*player) as i64)
            .sum();
        (total / players.len() as i64) as i32
    }

    fn adjust_rating(&mut self, player: EntityId, delta: i32) -> RatingChange {
        let controller = self.ensure_controller(player);
        controller.stats.rating = (controller.stats.rating + delta).max(RATING_FLOOR);
        controller.stats.highest_rating =
            controller.stats.highest_rating.max(controller.stats.rating);
        RatingChange {
            player,
            delta,
            new_rating: controller.stats.rating,
        }
    }
}
