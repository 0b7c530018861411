//! Command ingress.
//!
//! External collaborators (network handlers, AI, scenario scripts)
//! deposit commands into the queue between ticks; the drain system
//! dispatches them at the start of the tick. Every failure surfaces as a
//! [`CommandRejected`] event carrying the typed error, and a failed
//! command mutates nothing.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::combat::manager;
use crate::combo::{ComboInput, InputResult};
use crate::entity::{Combatant, EntityId};
use crate::error::{CombatError, CombatResult};
use crate::pvp::MatchKind;
use crate::skill::{CastAction, SkillId, TargetView};
use crate::status::EffectId;

use super::spatial::GroundPoint;
use super::{ComboCompleted, EffectApplied, EngineCtx, MatchStarted};

/// Commands accepted by the core, queued between ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameCommand {
    /// Begin auto-attacking `target`.
    Attack {
        attacker: EntityId,
        target: EntityId,
    },
    StartSkill {
        caster: EntityId,
        skill: SkillId,
        #[serde(default)]
        target: Option<EntityId>,
        #[serde(default)]
        point: Option<GroundPoint>,
    },
    CancelSkill {
        caster: EntityId,
    },
    ToggleSkill {
        caster: EntityId,
        skill: SkillId,
    },
    ComboInput {
        entity: EntityId,
        input: ComboInput,
    },
    RequestDuel {
        challenger: EntityId,
        target: EntityId,
    },
    AcceptDuel {
        target: EntityId,
        challenger: EntityId,
    },
    DeclineDuel {
        target: EntityId,
        challenger: EntityId,
    },
    QueuePvp {
        player: EntityId,
        kind: MatchKind,
    },
    LeaveQueue {
        player: EntityId,
    },
}

impl GameCommand {
    /// The entity a rejection of this command should be addressed to.
    pub fn issuer(&self) -> EntityId {
        match self {
            GameCommand::Attack { attacker, .. } => *attacker,
            GameCommand::StartSkill { caster, .. } => *caster,
            GameCommand::CancelSkill { caster } => *caster,
            GameCommand::ToggleSkill { caster, .. } => *caster,
            GameCommand::ComboInput { entity, .. } => *entity,
            GameCommand::RequestDuel { challenger, .. } => *challenger,
            GameCommand::AcceptDuel { target, .. } => *target,
            GameCommand::DeclineDuel { target, .. } => *target,
            GameCommand::QueuePvp { player, .. } => *player,
            GameCommand::LeaveQueue { player } => *player,
        }
    }
}

/// Commands waiting for the next tick.
#[derive(Resource, Debug, Default)]
pub struct CommandQueue {
    queue: Vec<GameCommand>,
}

impl CommandQueue {
    pub fn push(&mut self, command: GameCommand) {
        self.queue.push(command);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn drain(&mut self) -> Vec<GameCommand> {
        std::mem::take(&mut self.queue)
    }
}

/// Drain and dispatch all queued commands.
pub fn drain_commands(mut ctx: EngineCtx, mut combatants: Query<(&mut Combatant, &Transform)>) {
    let commands = ctx.queue.drain();
    for command in commands {
        let issuer = command.issuer();
        if let Err(error) = dispatch(&mut ctx, &mut combatants, command) {
            debug!("command from {issuer} rejected: {error}");
            ctx.events
                .rejected
                .send(super::CommandRejected { entity: issuer, error });
        }
    }
}

fn dispatch(
    ctx: &mut EngineCtx,
    combatants: &mut Query<(&mut Combatant, &Transform)>,
    command: GameCommand,
) -> CombatResult<()> {
    let now = ctx.clock.now();
    match command {
        GameCommand::Attack { attacker, target } => {
            validate_attack_request(ctx, combatants, attacker, target)?;
            ctx.auto.start(attacker, target);
            Ok(())
        }
        GameCommand::StartSkill {
            caster,
            skill,
            target,
            point,
        } => start_skill(ctx, combatants, caster, skill, target, point),
        GameCommand::CancelSkill { caster } => {
            ctx.skills.cancel_cast(caster).map(|_| ())
        }
        GameCommand::ToggleSkill { caster, skill } => {
            let entity = ctx
                .registry
                .lookup(caster)
                .ok_or_else(|| CombatError::NotFound(format!("unknown entity {caster}")))?;
            let action = {
                let (mut combatant, _) = combatants
                    .get_mut(entity)
                    .map_err(|_| CombatError::NotFound(format!("unknown entity {caster}")))?;
                ctx.skills.toggle(&ctx.book, &mut combatant, skill)?
            };
            sync_toggle_effects(ctx, caster, skill, &action);
            Ok(())
        }
        GameCommand::ComboInput { entity, input } => {
            if !ctx.registry.contains(entity) {
                return Err(CombatError::NotFound(format!("unknown entity {entity}")));
            }
            let result = ctx.combos.process_input(&ctx.library, entity, input, now);
            if let InputResult::Finished {
                combo,
                hits,
                damage,
                bonus_effect,
            } = result
            {
                if let Some(effect) = bonus_effect {
                    grant_combo_bonus(ctx, entity, effect, now);
                }
                ctx.events.combo_completed.send(ComboCompleted {
                    entity,
                    combo,
                    hits,
                    damage,
                });
            }
            Ok(())
        }
        GameCommand::RequestDuel { challenger, target } => {
            for id in [challenger, target] {
                if !ctx.registry.contains(id) {
                    return Err(CombatError::NotFound(format!("unknown entity {id}")));
                }
            }
            ctx.pvp
                .send_duel_request(challenger, target, &ctx.policy, now)
        }
        GameCommand::AcceptDuel { target, challenger } => {
            let match_id = ctx.pvp.accept_duel(target, challenger, now)?;
            // Duels skip preparation and go live on acceptance.
            ctx.events.match_started.send(MatchStarted {
                match_id,
                kind: MatchKind::Duel,
            });
            Ok(())
        }
        GameCommand::DeclineDuel { target, challenger } => {
            ctx.pvp.decline_duel(target, challenger)
        }
        GameCommand::QueuePvp { player, kind } => {
            if !ctx.registry.contains(player) {
                return Err(CombatError::NotFound(format!("unknown entity {player}")));
            }
            ctx.pvp.queue_for_match(player, kind, now)
        }
        GameCommand::LeaveQueue { player } => ctx.pvp.leave_queue(player),
    }
}

/// Preconditions for starting an auto-attack loop.
fn validate_attack_request(
    ctx: &EngineCtx,
    combatants: &Query<(&mut Combatant, &Transform)>,
    attacker: EntityId,
    target: EntityId,
) -> CombatResult<()> {
    if attacker == target {
        return Err(CombatError::InvalidTarget("cannot attack yourself".into()));
    }
    for id in [attacker, target] {
        let entity = ctx
            .registry
            .lookup(id)
            .ok_or_else(|| CombatError::NotFound(format!("unknown entity {id}")))?;
        let (combatant, _) = combatants
            .get(entity)
            .map_err(|_| CombatError::NotFound(format!("unknown entity {id}")))?;
        if !combatant.is_alive() {
            return Err(CombatError::InvalidTarget(format!("{id} is dead")));
        }
    }
    if !ctx.pvp.can_attack(attacker, target, &ctx.policy) {
        return Err(CombatError::Rejected("target is not attackable".into()));
    }
    Ok(())
}

fn start_skill(
    ctx: &mut EngineCtx,
    combatants: &mut Query<(&mut Combatant, &Transform)>,
    caster: EntityId,
    skill: SkillId,
    target: Option<EntityId>,
    point: Option<GroundPoint>,
) -> CombatResult<()> {
    let caster_entity = ctx
        .registry
        .lookup(caster)
        .ok_or_else(|| CombatError::NotFound(format!("unknown entity {caster}")))?;

    // Resolve the target into a relationship view before borrowing the
    // caster mutably.
    let target_view = match target {
        Some(target_id) => {
            let entity = ctx
                .registry
                .lookup(target_id)
                .ok_or_else(|| CombatError::InvalidTarget(format!("unknown target {target_id}")))?;
            let (combatant, transform) = combatants
                .get(entity)
                .map_err(|_| CombatError::InvalidTarget(format!("unknown target {target_id}")))?;
            Some(TargetView {
                id: target_id,
                alive: combatant.is_alive(),
                targetable: combatant.can_be_targeted(),
                hostile: ctx.pvp.can_attack(caster, target_id, &ctx.policy),
                allied: target_id == caster
                    || ctx.pvp.is_ally(caster, target_id)
                    || (ctx.policy.same_faction(caster, target_id)
                        && !ctx.pvp.can_attack(caster, target_id, &ctx.policy)),
                position: GroundPoint::from_transform(transform),
            })
        }
        None => None,
    };

    let control = ctx.status.control_flags(&ctx.effects, caster);

    let action = {
        let (mut combatant, transform) = combatants
            .get_mut(caster_entity)
            .map_err(|_| CombatError::NotFound(format!("unknown entity {caster}")))?;
        if !combatant.is_alive() {
            return Err(CombatError::InvalidState("caster is dead".into()));
        }
        let caster_pos = GroundPoint::from_transform(transform);
        ctx.skills.start_cast(
            &ctx.book,
            &ctx.clock,
            &mut combatant,
            caster_pos,
            control,
            skill,
            target_view.as_ref(),
            point,
        )?
    };

    // Acting breaks stealth-like effects regardless of skill flavor.
    for effect in ctx.status.on_action(&ctx.effects, caster) {
        ctx.events
            .effect_expired
            .send(super::EffectExpired { target: caster, effect });
    }

    match action {
        CastAction::ResolveNow => {
            let data = ctx
                .book
                .get(skill)
                .cloned()
                .ok_or_else(|| CombatError::NotFound(format!("unknown skill {skill}")))?;
            let rank = ctx.skills.rank_of(caster, skill);
            manager::resolve_skill_payload(ctx, combatants, caster, &data, rank, target, point);
        }
        CastAction::ToggledOn | CastAction::ToggledOff => {
            sync_toggle_effects(ctx, caster, skill, &action);
        }
        CastAction::Started => {}
    }
    Ok(())
}

/// A toggle's carried effects exist exactly while the toggle is on.
fn sync_toggle_effects(ctx: &mut EngineCtx, caster: EntityId, skill: SkillId, action: &CastAction) {
    let Some(effects) = ctx.book.get(skill).map(|data| data.effects.clone()) else {
        return;
    };
    let now = ctx.clock.now();
    match action {
        CastAction::ToggledOn => {
            for effect in effects {
                if ctx
                    .status
                    .apply(&ctx.effects, caster, effect, caster, 1.0, now)
                    .is_ok()
                {
                    ctx.events.effect_applied.send(EffectApplied {
                        target: caster,
                        effect,
                        caster,
                    });
                }
            }
        }
        CastAction::ToggledOff => {
            for effect in effects {
                for removed in ctx.status.remove(&ctx.effects, caster, effect, Some(caster)) {
                    ctx.events.effect_expired.send(super::EffectExpired {
                        target: caster,
                        effect: removed,
                    });
                }
            }
        }
        _ => {}
    }
}

/// Completion reward of a finisher: a status effect granted to the
/// finishing entity.
fn grant_combo_bonus(ctx: &mut EngineCtx, entity: EntityId, effect: EffectId, now: f64) {
    match ctx
        .status
        .apply(&ctx.effects, entity, effect, entity, 1.0, now)
    {
        Ok(()) => {
            ctx.events.effect_applied.send(EffectApplied {
                target: entity,
                effect,
                caster: entity,
            });
            ctx.status.mark_dirty(entity);
        }
        Err(error) => debug!("combo bonus {effect} on {entity} failed: {error}"),
    }
}
