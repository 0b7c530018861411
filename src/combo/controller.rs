//! Per-entity combo state machines.
//!
//! Each participating entity walks the shared trie. Timing is enforced
//! twice: at input time (a late input cancels before it is considered)
//! and every tick (an idle chain times out without needing another
//! input).

use bevy::prelude::*;
use smallvec::SmallVec;
use std::collections::HashMap;

use crate::entity::EntityId;
use crate::sim::SimClock;
use crate::status::EffectId;

use super::graph::{ComboId, ComboInput, ComboLibrary, COMBO_ROOT};

/// Controller lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComboState {
    #[default]
    Idle,
    InProgress,
    /// Broken by an external stimulus (stun, death); clears on the next
    /// input.
    Interrupted,
}

/// Progress of one entity through the trie.
#[derive(Debug, Clone)]
pub struct ComboProgress {
    pub state: ComboState,
    pub node: usize,
    pub history: SmallVec<[ComboInput; 8]>,
    pub started_at: f64,
    pub last_input_at: f64,
    pub accumulated_damage: f32,
    pub hit_count: u32,
    pub current_combo: Option<ComboId>,
    pub damage_multiplier: f32,
}

impl Default for ComboProgress {
    fn default() -> Self {
        Self {
            state: ComboState::Idle,
            node: COMBO_ROOT,
            history: SmallVec::new(),
            started_at: 0.0,
            last_input_at: 0.0,
            accumulated_damage: 0.0,
            hit_count: 0,
            current_combo: None,
            damage_multiplier: 1.0,
        }
    }
}

impl ComboProgress {
    fn reset(&mut self) {
        *self = ComboProgress::default();
    }
}

/// What an input did to the chain.
#[derive(Debug, Clone, PartialEq)]
pub enum InputResult {
    /// The chain advanced (or started).
    Advanced,
    /// The input broke the chain: too slow, or not a valid continuation.
    Cancelled,
    /// A finisher landed; the caller grants the reward and publishes the
    /// completion.
    Finished {
        combo: ComboId,
        hits: u32,
        damage: f32,
        bonus_effect: Option<EffectId>,
    },
}

/// Per-combo and per-player completion counters.
#[derive(Debug, Default)]
pub struct ComboStatistics {
    executions: HashMap<ComboId, u32>,
    attempts: HashMap<ComboId, u32>,
    players: HashMap<EntityId, PlayerComboStats>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlayerComboStats {
    pub total_combos: u32,
    pub failed_combos: u32,
    pub longest_combo: u32,
}

impl ComboStatistics {
    fn record_execution(&mut self, entity: EntityId, combo: ComboId, hits: u32) {
        *self.executions.entry(combo).or_default() += 1;
        *self.attempts.entry(combo).or_default() += 1;
        let stats = self.players.entry(entity).or_default();
        stats.total_combos += 1;
        stats.longest_combo = stats.longest_combo.max(hits);
    }

    fn record_failure(&mut self, entity: EntityId, combo: Option<ComboId>) {
        if let Some(combo) = combo {
            *self.attempts.entry(combo).or_default() += 1;
        }
        self.players.entry(entity).or_default().failed_combos += 1;
    }

    pub fn executions(&self, combo: ComboId) -> u32 {
        self.executions.get(&combo).copied().unwrap_or(0)
    }

    pub fn success_rate(&self, combo: ComboId) -> f32 {
        let attempts = self.attempts.get(&combo).copied().unwrap_or(0);
        if attempts == 0 {
            return 0.0;
        }
        self.executions(combo) as f32 / attempts as f32
    }

    pub fn player(&self, entity: EntityId) -> PlayerComboStats {
        self.players.get(&entity).copied().unwrap_or_default()
    }

    fn remove_entity(&mut self, entity: EntityId) {
        self.players.remove(&entity);
    }
}

/// All combo controllers, keyed by entity.
#[derive(Resource, Debug, Default)]
pub struct ComboStates {
    states: HashMap<EntityId, ComboProgress>,
    stats: ComboStatistics,
}

impl ComboStates {
    /// Feed one input symbol into `entity`'s controller.
    pub fn process_input(
        &mut self,
        library: &ComboLibrary,
        entity: EntityId,
        input: ComboInput,
        now: f64,
    ) -> InputResult {
        let progress = self.states.entry(entity).or_default();

        // An interrupted chain resets on the next input, which is then
        // treated as fresh.
        if progress.state == ComboState::Interrupted {
            progress.reset();
        }

        if progress.state == ComboState::Idle {
            progress.state = ComboState::InProgress;
            progress.node = COMBO_ROOT;
            progress.started_at = now;
            progress.last_input_at = now;
            progress.history.clear();
        }

        // Late input: the chain is already dead, the input does not
        // start a new one.
        if !progress.history.is_empty() {
            let window = library.node(progress.node).window;
            if now - progress.last_input_at > window as f64 {
                let failed = progress.current_combo;
                progress.reset();
                self.stats.record_failure(entity, failed);
                debug!("{entity} combo timed out");
                return InputResult::Cancelled;
            }
        }

        let Some(next) = library.child(progress.node, input) else {
            let failed = progress.current_combo;
            progress.reset();
            self.stats.record_failure(entity, failed);
            debug!("{entity} combo broken by invalid input {input:?}");
            return InputResult::Cancelled;
        };

        progress.node = next;
        progress.history.push(input);
        progress.last_input_at = now;
        let node = library.node(next);
        progress.damage_multiplier *= node.damage_multiplier;
        if let Some(combo) = node.combo {
            progress.current_combo = Some(combo);
            if node.is_finisher {
                let hits = progress.hit_count;
                let damage = progress.accumulated_damage;
                let bonus_effect = library.definition(combo).and_then(|def| def.bonus_effect);
                progress.reset();
                self.stats.record_execution(entity, combo, hits);
                info!("{entity} completed {combo} ({hits} hits, {damage:.0} damage)");
                return InputResult::Finished {
                    combo,
                    hits,
                    damage,
                    bonus_effect,
                };
            }
        }
        InputResult::Advanced
    }

    /// Credit a landed hit to an in-progress chain. Called by the combat
    /// layer whenever the entity deals damage.
    pub fn register_hit(&mut self, entity: EntityId, damage: f32) {
        if let Some(progress) = self.states.get_mut(&entity) {
            if progress.state == ComboState::InProgress {
                progress.hit_count += 1;
                progress.accumulated_damage += damage;
            }
        }
    }

    /// Damage multiplier granted by the live chain; 1.0 when idle.
    pub fn damage_multiplier(&self, entity: EntityId) -> f32 {
        self.states
            .get(&entity)
            .filter(|progress| progress.state == ComboState::InProgress)
            .map_or(1.0, |progress| progress.damage_multiplier)
    }

    /// Voluntary cancel (timeout, invalid input): back to idle.
    pub fn cancel(&mut self, entity: EntityId) {
        if let Some(progress) = self.states.get_mut(&entity) {
            if progress.state == ComboState::InProgress {
                let failed = progress.current_combo;
                progress.reset();
                self.stats.record_failure(entity, failed);
            }
        }
    }

    /// External break (stun, death): terminal until the next input.
    pub fn interrupt(&mut self, entity: EntityId) {
        if let Some(progress) = self.states.get_mut(&entity) {
            if progress.state == ComboState::InProgress {
                let failed = progress.current_combo;
                progress.reset();
                progress.state = ComboState::Interrupted;
                self.stats.record_failure(entity, failed);
                debug!("{entity} combo interrupted");
            }
        }
    }

    pub fn state(&self, entity: EntityId) -> ComboState {
        self.states
            .get(&entity)
            .map_or(ComboState::Idle, |progress| progress.state)
    }

    pub fn progress(&self, entity: EntityId) -> Option<&ComboProgress> {
        self.states.get(&entity)
    }

    pub fn statistics(&self) -> &ComboStatistics {
        &self.stats
    }

    pub fn remove_entity(&mut self, entity: EntityId) {
        self.states.remove(&entity);
        self.stats.remove_entity(entity);
    }

    pub fn has_rows(&self, entity: EntityId) -> bool {
        self.states.contains_key(&entity)
    }

    /// Cancel chains whose input window or overall time cap elapsed.
    pub fn expire_stale(&mut self, library: &ComboLibrary, now: f64) {
        for entity in self.timed_out_entities(library, now) {
            debug!("{entity} combo expired");
            self.cancel(entity);
        }
    }

    fn timed_out_entities(&self, library: &ComboLibrary, now: f64) -> Vec<EntityId> {
        let mut expired: Vec<EntityId> = self.states
            .iter()
            .filter(|(_, progress)| progress.state == ComboState::InProgress)
            .filter(|(_, progress)| {
                let window = library.node(progress.node).window as f64;
                if !progress.history.is_empty() && now - progress.last_input_at > window {
                    return true;
                }
                let limit = progress
                    .current_combo
                    .and_then(|combo| library.definition(combo))
                    .map(|def| def.time_limit)
                    .unwrap_or_else(|| library.max_time_limit())
                    as f64;
                now - progress.started_at > limit
            })
            .map(|(entity, _)| *entity)
            .collect();
        expired.sort_unstable();
        expired
    }
}

/// Cancel chains whose timing window or overall cap elapsed without
/// further input.
pub fn update_combos(
    clock: Res<SimClock>,
    library: Res<ComboLibrary>,
    mut combos: ResMut<ComboStates>,
) {
    combos.expire_stale(&library, clock.now());
}
