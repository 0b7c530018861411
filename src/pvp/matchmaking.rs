//! Matchmaking queues and rating math.
//!
//! One queue per match type, sorted by rating. Matching is greedy from
//! the top of the queue; the allowed rating spread between the best and
//! worst candidate widens the longer the worst-matched player has been
//! waiting.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// Elo K-factor.
pub const ELO_K: f32 = 32.0;
/// Every player starts here.
pub const INITIAL_RATING: i32 = 1500;
/// Ratings never drop below zero.
pub const RATING_FLOOR: i32 = 0;

/// Base allowed rating difference between matched players.
const BASE_RATING_SPREAD: i32 = 100;
/// Extra spread granted per 30 seconds of queue time.
const SPREAD_PER_WAIT_STEP: i32 = 10;
const WAIT_STEP_SECONDS: f64 = 30.0;

/// Rating change awarded to the winner (and charged to the loser) of a
/// pairing, by expected score. Always at least 1.
pub fn rating_delta(winner_rating: i32, loser_rating: i32) -> i32 {
    let exponent = (loser_rating - winner_rating) as f32 / 400.0;
    let expected_winner = 1.0 / (1.0 + 10f32.powf(exponent));
    ((ELO_K * (1.0 - expected_winner)) as i32).max(1)
}

/// One waiting player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub player: EntityId,
    pub rating: i32,
    pub queued_at: f64,
}

/// Rating-sorted queue for one match type.
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    entries: Vec<QueueEntry>,
}

impl MatchmakingQueue {
    /// Insert `player`, keeping the queue sorted by descending rating.
    /// Re-queueing an already waiting player is a no-op.
    pub fn add_player(&mut self, player: EntityId, rating: i32, now: f64) {
        if self.is_queued(player) {
            return;
        }
        self.entries.push(QueueEntry {
            player,
            rating,
            queued_at: now,
        });
        self.entries.sort_by(|a, b| b.rating.cmp(&a.rating));
        debug!("{player} queued (rating {rating})");
    }

    pub fn remove_player(&mut self, player: EntityId) {
        self.entries.retain(|entry| entry.player != player);
    }

    pub fn is_queued(&self, player: EntityId) -> bool {
        self.entries.iter().any(|entry| entry.player == player)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mean queue wait in seconds.
    pub fn average_wait(&self, now: f64) -> f32 {
        if self.entries.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .entries
            .iter()
            .map(|entry| (now - entry.queued_at).max(0.0))
            .sum();
        (total / self.entries.len() as f64) as f32
    }

    /// Whether two entries are close enough in rating to share a match.
    /// The bound relaxes by 10 per 30 seconds of the longer wait.
    pub fn compatible(a: &QueueEntry, b: &QueueEntry, now: f64) -> bool {
        let diff = (a.rating - b.rating).abs();
        let max_wait = (now - a.queued_at).max(now - b.queued_at).max(0.0);
        let allowed =
            BASE_RATING_SPREAD + (max_wait / WAIT_STEP_SECONDS) as i32 * SPREAD_PER_WAIT_STEP;
        diff <= allowed
    }

    /// Pop two rating-adjacent teams of `team_size` if the queue allows
    /// it. Exactly `2 × team_size` players leave the queue on success.
    pub fn try_create_match(
        &mut self,
        team_size: usize,
        now: f64,
    ) -> Option<(Vec<EntityId>, Vec<EntityId>)> {
        let needed = team_size * 2;
        if self.entries.len() < needed {
            return None;
        }
        // The candidates are rating-adjacent; the spread check between
        // the best and worst of them gates the match.
        let first = self.entries[0];
        let last = self.entries[needed - 1];
        if !Self::compatible(&first, &last, now) {
            return None;
        }
        let drained: Vec<QueueEntry> = self.entries.drain(..needed).collect();
        let team_a = drained[..team_size]
            .iter()
            .map(|entry| entry.player)
            .collect();
        let team_b = drained[team_size..]
            .iter()
            .map(|entry| entry.player)
            .collect();
        Some((team_a, team_b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_is_at_least_one() {
        assert_eq!(rating_delta(2400, 0), 1);
        assert!(rating_delta(1500, 1500) >= 1);
    }

    #[test]
    fn equal_ratings_split_the_k_factor() {
        assert_eq!(rating_delta(1500, 1500), 16);
    }

    #[test]
    fn wait_time_relaxes_the_spread() {
        let a = QueueEntry {
            player: EntityId::new(1),
            rating: 1500,
            queued_at: 0.0,
        };
        let b = QueueEntry {
            player: EntityId::new(2),
            rating: 1350,
            queued_at: 0.0,
        };
        assert!(!MatchmakingQueue::compatible(&a, &b, 10.0));
        assert!(MatchmakingQueue::compatible(&a, &b, 151.0));
    }
}
