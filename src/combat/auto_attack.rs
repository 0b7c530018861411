//! Auto-attack scheduler.
//!
//! One row per attacker. The timer advances while the attacker is able
//! to swing and fires when it crosses the attack interval; a failed
//! swing (target gone, gate denied) stops the attack. Rows are never
//! removed mid-iteration: stops collect into a scratch list and apply
//! after the pass.

use bevy::prelude::*;
use std::collections::HashMap;

use crate::entity::{Combatant, EntityId};
use crate::sim::{CommandRejected, EngineCtx};

use super::manager;

/// Swing state of one attacker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoAttackState {
    pub target: EntityId,
    pub elapsed: f32,
    pub active: bool,
}

#[derive(Resource, Debug, Default)]
pub struct AutoAttacks {
    attacks: HashMap<EntityId, AutoAttackState>,
}

impl AutoAttacks {
    /// Begin (or retarget) an attacker's swing loop.
    pub fn start(&mut self, attacker: EntityId, target: EntityId) {
        self.attacks.insert(
            attacker,
            AutoAttackState {
                target,
                elapsed: 0.0,
                active: true,
            },
        );
        debug!("auto-attack started {attacker} -> {target}");
    }

    pub fn stop(&mut self, attacker: EntityId) {
        if self.attacks.remove(&attacker).is_some() {
            debug!("auto-attack stopped for {attacker}");
        }
    }

    /// Stop every attacker currently swinging at `target`.
    pub fn stop_attacks_on(&mut self, target: EntityId) {
        self.attacks.retain(|_, state| state.target != target);
    }

    pub fn is_active(&self, attacker: EntityId) -> bool {
        self.attacks
            .get(&attacker)
            .map_or(false, |state| state.active)
    }

    pub fn target_of(&self, attacker: EntityId) -> Option<EntityId> {
        self.attacks.get(&attacker).map(|state| state.target)
    }

    pub fn remove_entity(&mut self, entity: EntityId) {
        self.attacks.remove(&entity);
        self.stop_attacks_on(entity);
    }

    pub fn has_rows(&self, entity: EntityId) -> bool {
        self.attacks.contains_key(&entity)
            || self.attacks.values().any(|state| state.target == entity)
    }

    fn reset_timer(&mut self, attacker: EntityId) {
        if let Some(state) = self.attacks.get_mut(&attacker) {
            state.elapsed = 0.0;
        }
    }
}

/// Advance all swing timers and execute due attacks.
pub fn update_auto_attacks(mut ctx: EngineCtx, mut combatants: Query<(&mut Combatant, &Transform)>) {
    let dt = ctx.clock.dt();
    let mut due: Vec<(EntityId, EntityId)> = Vec::new();
    let mut stops: Vec<EntityId> = Vec::new();

    {
        let auto = &mut *ctx.auto;
        for (attacker, state) in auto.attacks.iter_mut() {
            if !state.active {
                continue;
            }
            let attacker_alive = ctx
                .registry
                .lookup(*attacker)
                .and_then(|entity| combatants.get(entity).ok())
                .map(|(combatant, _)| (combatant.is_alive(), combatant.snapshot.attack_speed));
            let Some((true, attack_speed)) = attacker_alive else {
                stops.push(*attacker);
                continue;
            };
            let target_gone = ctx
                .registry
                .lookup(state.target)
                .and_then(|entity| combatants.get(entity).ok())
                .map_or(true, |(combatant, _)| !combatant.can_be_targeted());
            if target_gone {
                stops.push(*attacker);
                continue;
            }
            // Control effects hold the swing timer rather than dropping
            // the attack.
            if ctx
                .status
                .control_flags(&ctx.effects, *attacker)
                .blocks_auto_attack()
            {
                continue;
            }
            state.elapsed += dt;
            let interval = 1.0 / attack_speed.max(0.01);
            if state.elapsed >= interval {
                due.push((*attacker, state.target));
            }
        }
    }

    // Table iteration order is arbitrary; swings apply in id order so
    // replays are stable.
    stops.sort_unstable();
    due.sort_unstable_by_key(|(attacker, _)| *attacker);

    for attacker in stops {
        ctx.auto.stop(attacker);
    }

    for (attacker, target) in due {
        match manager::perform_attack(&mut ctx, &mut combatants, attacker, target) {
            Ok(_) => ctx.auto.reset_timer(attacker),
            Err(error) => {
                debug!("auto-attack by {attacker} stopped: {error}");
                ctx.auto.stop(attacker);
                ctx.events.rejected.send(CommandRejected {
                    entity: attacker,
                    error,
                });
            }
        }
    }
}
