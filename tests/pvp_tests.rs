//! Unit tests for the PvP coordinator.
//!
//! These tests verify that:
//! - Duel requests respect zones, busy states and pair uniqueness
//! - Duels settle on the kill cap with stats and ratings exchanged
//! - Matchmaking consumes exactly two full teams and respects the
//!   rating spread
//! - Elo updates conserve total rating and never award less than 1
//! - The attackability gate implements the zone and match rules

use realmsim::entity::EntityId;
use realmsim::error::CombatError;
use realmsim::pvp::{
    rating_delta, MatchKind, PvpCoordinator, PvpState, PvpTickEvent, TeamSide, INITIAL_RATING,
};
use realmsim::sim::{ZoneKind, ZonePolicy};

fn alice() -> EntityId {
    EntityId::new(1)
}

fn bob() -> EntityId {
    EntityId::new(2)
}

fn contested_policy() -> ZonePolicy {
    let mut policy = ZonePolicy::with_default_zone(ZoneKind::Contested);
    policy.set_faction(alice(), 1);
    policy.set_faction(bob(), 2);
    policy
}

fn coordinator_with_players() -> PvpCoordinator {
    let mut pvp = PvpCoordinator::default();
    pvp.ensure_controller(alice());
    pvp.ensure_controller(bob());
    pvp
}

#[test]
fn duel_request_accept_and_settle() {
    let policy = contested_policy();
    let mut pvp = coordinator_with_players();

    pvp.send_duel_request(alice(), bob(), &policy, 0.0).unwrap();
    assert_eq!(pvp.pending_duel_count(), 1);

    pvp.accept_duel(bob(), alice(), 1.0).unwrap();
    assert_eq!(pvp.pending_duel_count(), 0);
    let record = pvp.match_of(alice()).expect("duel match exists");
    assert_eq!(record.kind, MatchKind::Duel);
    assert_eq!(record.phase, PvpState::InProgress);
    assert_eq!(record.kill_cap, Some(1));
    assert!(!pvp.is_ally(alice(), bob()));

    // Bob dies; the kill cap settles the duel in Alice's favor.
    let outcome = pvp
        .record_match_kill(bob(), Some(alice()))
        .expect("kill cap ends the duel");
    assert_eq!(outcome.winner, Some(TeamSide::A));
    assert_eq!(outcome.rating_changes.len(), 2);
    for change in &outcome.rating_changes {
        assert!(change.delta.abs() >= 1);
    }

    let winner = pvp.controller(alice()).unwrap();
    assert_eq!(winner.stats.matches_won, 1);
    assert_eq!(winner.stats.kills, 1);
    assert_eq!(winner.stats.rating, INITIAL_RATING + 16);
    assert_eq!(winner.state, PvpState::None);

    let loser = pvp.controller(bob()).unwrap();
    assert_eq!(loser.stats.matches_lost, 1);
    assert_eq!(loser.stats.deaths, 1);
    assert_eq!(loser.stats.rating, INITIAL_RATING - 16);
    assert!(pvp.match_of(alice()).is_none());
}

#[test]
fn duel_request_rejected_in_safe_zone() {
    let mut policy = contested_policy();
    policy.set_zone(alice(), ZoneKind::Sanctuary);
    let mut pvp = coordinator_with_players();
    let result = pvp.send_duel_request(alice(), bob(), &policy, 0.0);
    assert!(matches!(result, Err(CombatError::Rejected(_))));
}

#[test]
fn duplicate_duel_requests_are_rejected_both_ways() {
    let policy = contested_policy();
    let mut pvp = coordinator_with_players();
    pvp.send_duel_request(alice(), bob(), &policy, 0.0).unwrap();
    assert!(pvp.send_duel_request(alice(), bob(), &policy, 1.0).is_err());
    assert!(pvp.send_duel_request(bob(), alice(), &policy, 1.0).is_err());
}

#[test]
fn decline_consumes_the_request() {
    let policy = contested_policy();
    let mut pvp = coordinator_with_players();
    pvp.send_duel_request(alice(), bob(), &policy, 0.0).unwrap();
    pvp.decline_duel(bob(), alice()).unwrap();
    assert_eq!(pvp.pending_duel_count(), 0);
    // Declining twice fails.
    assert!(pvp.decline_duel(bob(), alice()).is_err());
}

#[test]
fn duel_requests_expire_after_thirty_seconds() {
    let policy = contested_policy();
    let mut pvp = coordinator_with_players();
    pvp.send_duel_request(alice(), bob(), &policy, 0.0).unwrap();
    pvp.update(29.0, 0.05);
    assert_eq!(pvp.pending_duel_count(), 1);
    pvp.update(30.5, 0.05);
    assert_eq!(pvp.pending_duel_count(), 0);
    assert!(pvp.accept_duel(bob(), alice(), 31.0).is_err());
}

#[test]
fn queue_and_leave_are_always_symmetric() {
    let mut pvp = PvpCoordinator::default();
    let player = alice();
    pvp.ensure_controller(player);
    pvp.queue_for_match(player, MatchKind::Arena2v2, 0.0).unwrap();
    assert_eq!(pvp.queue_len(MatchKind::Arena2v2), 1);
    assert_eq!(pvp.controller(player).unwrap().state, PvpState::Queued);

    // Queueing twice is invalid; leaving while queued always works.
    assert!(pvp.queue_for_match(player, MatchKind::Arena2v2, 1.0).is_err());
    pvp.leave_queue(player).unwrap();
    assert_eq!(pvp.queue_len(MatchKind::Arena2v2), 0);
    assert_eq!(pvp.controller(player).unwrap().state, PvpState::None);
    assert!(pvp.leave_queue(player).is_err());
}

#[test]
fn matchmaking_consumes_two_full_teams() {
    let mut pvp = PvpCoordinator::default();
    let players: Vec<EntityId> = (10..14).map(EntityId::new).collect();
    for player in &players {
        pvp.ensure_controller(*player);
        pvp.queue_for_match(*player, MatchKind::Arena2v2, 0.0).unwrap();
    }
    assert_eq!(pvp.queue_len(MatchKind::Arena2v2), 4);

    let events = pvp.update(0.1, 0.05);
    // No transition events yet: the match sits in preparation.
    assert!(events.is_empty());
    assert_eq!(pvp.queue_len(MatchKind::Arena2v2), 0);

    let record = pvp.match_of(players[0]).expect("match created");
    assert_eq!(record.team_a.len(), 2);
    assert_eq!(record.team_b.len(), 2);
    assert_eq!(record.phase, PvpState::Preparation);
    for player in &players {
        assert_eq!(pvp.controller(*player).unwrap().state, PvpState::Preparation);
        assert!(record.contains(*player));
    }

    // Preparation elapses; the match goes live.
    let events = pvp.update(11.0, 10.9);
    assert!(matches!(events.as_slice(), [PvpTickEvent::MatchWentLive(..)]));
    assert_eq!(
        pvp.match_of(players[0]).unwrap().phase,
        PvpState::InProgress
    );
}

#[test]
fn matchmaking_waits_for_compatible_ratings() {
    let mut pvp = PvpCoordinator::default();
    let strong = EntityId::new(20);
    let weak = EntityId::new(21);
    pvp.ensure_controller(strong).stats.rating = 1700;
    pvp.ensure_controller(weak).stats.rating = 1500;
    pvp.queue_for_match(strong, MatchKind::Duel, 0.0).unwrap();
    pvp.queue_for_match(weak, MatchKind::Duel, 0.0).unwrap();

    // 200 apart: incompatible at base spread.
    pvp.update(1.0, 0.05);
    assert_eq!(pvp.queue_len(MatchKind::Duel), 2);

    // After five minutes of waiting the spread has relaxed past 200.
    pvp.update(301.0, 0.05);
    assert_eq!(pvp.queue_len(MatchKind::Duel), 0);
    assert!(pvp.match_of(strong).is_some());
}

#[test]
fn elo_delta_conserves_rating() {
    for (winner, loser) in [(1500, 1500), (1600, 1400), (1200, 1900), (2400, 2300)] {
        let delta = rating_delta(winner, loser);
        assert!(delta >= 1);
        // Winner gains exactly what the loser pays.
        let winner_new = winner + delta;
        let loser_new = loser - delta;
        assert_eq!(winner_new + loser_new, winner + loser);
    }
}

#[test]
fn underdog_wins_pay_more() {
    let upset = rating_delta(1400, 1600);
    let expected = rating_delta(1600, 1400);
    assert!(upset > expected);
}

#[test]
fn rating_never_drops_below_the_floor() {
    let policy = contested_policy();
    let mut pvp = coordinator_with_players();
    pvp.ensure_controller(bob()).stats.rating = 0;
    pvp.send_duel_request(alice(), bob(), &policy, 0.0).unwrap();
    pvp.accept_duel(bob(), alice(), 0.0).unwrap();
    let outcome = pvp.record_match_kill(bob(), Some(alice())).unwrap();
    assert!(outcome.rating_changes.iter().all(|c| c.new_rating >= 0));
    assert_eq!(pvp.controller(bob()).unwrap().stats.rating, 0);
}

#[test]
fn match_duration_cap_ends_in_a_draw_without_scores() {
    let policy = contested_policy();
    let mut pvp = coordinator_with_players();
    pvp.send_duel_request(alice(), bob(), &policy, 0.0).unwrap();
    pvp.accept_duel(bob(), alice(), 0.0).unwrap();

    // Nothing happens for five minutes.
    let events = pvp.update(300.5, 0.05);
    let [PvpTickEvent::MatchFinished(outcome)] = events.as_slice() else {
        panic!("expected a finished match, got {events:?}");
    };
    assert_eq!(outcome.winner, None);
    assert!(outcome.rating_changes.is_empty());
    assert_eq!(pvp.controller(alice()).unwrap().state, PvpState::None);
}

#[test]
fn attackability_follows_zone_and_match_rules() {
    let mut policy = contested_policy();
    let mut pvp = coordinator_with_players();

    // Contested zone, cross-faction: attackable.
    assert!(pvp.can_attack(alice(), bob(), &policy));
    // Never self.
    assert!(!pvp.can_attack(alice(), alice(), &policy));

    // Same faction blocks world PvP.
    policy.set_faction(bob(), 1);
    assert!(!pvp.can_attack(alice(), bob(), &policy));
    policy.set_faction(bob(), 2);

    // Normal zone blocks world PvP between players.
    policy.set_zone(alice(), ZoneKind::Normal);
    assert!(!pvp.can_attack(alice(), bob(), &policy));
    policy.set_zone(alice(), ZoneKind::Contested);

    // Safe zone blocks the attacker.
    policy.set_zone(alice(), ZoneKind::Sanctuary);
    assert!(!pvp.can_attack(alice(), bob(), &policy));
    policy.set_zone(alice(), ZoneKind::Contested);

    // PvP flag off on either side blocks.
    pvp.set_pvp_enabled(bob(), false);
    assert!(!pvp.can_attack(alice(), bob(), &policy));
    pvp.set_pvp_enabled(bob(), true);

    // NPCs (no controller) fall back to faction hostility.
    let npc = EntityId::new(50);
    policy.set_faction(npc, 9);
    assert!(pvp.can_attack(alice(), npc, &policy));
    policy.set_faction(npc, 1);
    assert!(!pvp.can_attack(alice(), npc, &policy));
}

#[test]
fn shared_match_restricts_attacks_to_opponents() {
    let policy = contested_policy();
    let mut pvp = PvpCoordinator::default();
    let players: Vec<EntityId> = (30..34).map(EntityId::new).collect();
    for player in &players {
        pvp.ensure_controller(*player);
        pvp.queue_for_match(*player, MatchKind::Arena2v2, 0.0).unwrap();
    }
    pvp.update(0.1, 0.05);
    let record = pvp.match_of(players[0]).unwrap();
    let (a0, a1) = (record.team_a[0], record.team_a[1]);
    let b0 = record.team_b[0];

    // Preparation phase: nobody is attackable yet.
    assert!(!pvp.can_attack(a0, b0, &policy));

    pvp.update(11.0, 10.9);
    assert!(pvp.can_attack(a0, b0, &policy));
    assert!(!pvp.can_attack(a0, a1, &policy));
    assert!(pvp.is_ally(a0, a1));
    assert!(!pvp.is_ally(a0, b0));
}

#[test]
fn team_wipe_settles_the_match() {
    let mut pvp = PvpCoordinator::default();
    let players: Vec<EntityId> = (40..44).map(EntityId::new).collect();
    for player in &players {
        pvp.ensure_controller(*player);
        pvp.queue_for_match(*player, MatchKind::Arena2v2, 0.0).unwrap();
    }
    pvp.update(0.1, 0.05);
    pvp.update(11.0, 10.9);
    let record = pvp.match_of(players[0]).unwrap();
    let match_id = record.id;
    let wiped_side = record.team_of(players[0]).unwrap();

    let outcome = pvp.settle_team_wipe(match_id, wiped_side).unwrap();
    assert_eq!(outcome.winner, Some(wiped_side.opposite()));
    for player in &players {
        assert_eq!(pvp.controller(*player).unwrap().state, PvpState::None);
        assert!(pvp.match_of(*player).is_none());
    }
}

#[test]
fn unregistering_a_participant_forfeits_an_emptied_team() {
    let policy = contested_policy();
    let mut pvp = coordinator_with_players();
    pvp.send_duel_request(alice(), bob(), &policy, 0.0).unwrap();
    pvp.accept_duel(bob(), alice(), 0.0).unwrap();

    let events = pvp.remove_entity(bob());
    let [PvpTickEvent::MatchFinished(outcome)] = events.as_slice() else {
        panic!("expected forfeit, got {events:?}");
    };
    assert_eq!(outcome.winner, Some(TeamSide::A));
    assert!(!pvp.has_rows(bob()));
    assert_eq!(pvp.controller(alice()).unwrap().state, PvpState::None);
}

#[test]
fn end_duel_settles_by_explicit_call() {
    let policy = contested_policy();
    let mut pvp = coordinator_with_players();
    pvp.send_duel_request(alice(), bob(), &policy, 0.0).unwrap();
    pvp.accept_duel(bob(), alice(), 0.0).unwrap();

    let outcome = pvp.end_duel(alice(), bob()).expect("duel settles");
    assert_eq!(outcome.kind, MatchKind::Duel);
    assert_eq!(outcome.winner, Some(TeamSide::A));
    assert_eq!(pvp.controller(alice()).unwrap().stats.matches_won, 1);
    assert!(pvp.match_of(alice()).is_none());

    // Settling again is a no-op: the match is gone.
    assert!(pvp.end_duel(alice(), bob()).is_none());
}

#[test]
fn score_cap_completes_a_battleground() {
    let mut pvp = PvpCoordinator::default();
    let players: Vec<EntityId> = (60..80).map(EntityId::new).collect();
    for player in &players {
        pvp.ensure_controller(*player);
        pvp.queue_for_match(*player, MatchKind::Battleground10v10, 0.0)
            .unwrap();
    }
    // Two full 10v10 teams form, draining the queue.
    pvp.update(0.1, 0.05);
    assert_eq!(pvp.queue_len(MatchKind::Battleground10v10), 0);
    let match_id = pvp.match_of(players[0]).unwrap().id;
    pvp.update(11.0, 10.9);

    assert!(pvp.add_score(match_id, TeamSide::B, 999).is_none());
    let outcome = pvp
        .add_score(match_id, TeamSide::B, 1)
        .expect("score cap ends the match");
    assert_eq!(outcome.winner, Some(TeamSide::B));
}

#[test]
fn assists_and_queue_waits_are_tracked() {
    let mut pvp = PvpCoordinator::default();
    let player = alice();
    pvp.ensure_controller(player);
    pvp.record_assist(player);
    assert_eq!(pvp.controller(player).unwrap().stats.assists, 1);

    pvp.queue_for_match(player, MatchKind::Arena5v5, 10.0).unwrap();
    let wait = pvp.average_queue_wait(MatchKind::Arena5v5, 40.0);
    assert!((wait - 30.0).abs() < 1e-3);
}
