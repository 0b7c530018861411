//! Combat orchestration: attack execution, area damage, skill payload
//! resolution and the shared damage-application path.
//!
//! Everything that mutates health funnels through
//! [`apply_damage_record`], which enforces the ordering guarantees: the
//! record reaches both combat logs before any death settlement runs, and
//! damage-driven effect breaks and cast interrupts happen in the same
//! resolution.

use bevy::prelude::*;

use crate::combat::damage::{self, DamageRecord, DamageType};
use crate::entity::{Combatant, EntityId};
use crate::error::{CombatError, CombatResult};
use crate::sim::spatial::{self, GroundPoint, TargetFilter, TargetShape};
use crate::sim::{CommandRejected, DamageResolved, EffectApplied, EngineCtx, EntityDied};
use crate::skill::{InterruptKind, SkillData, TargetRequirement};
use crate::status::EffectId;

/// Threat fraction credited for area damage.
pub const AOE_THREAT_MULTIPLIER: f32 = 0.5;

/// Knobs for one damage application.
#[derive(Debug, Clone, Copy)]
pub struct DamageOptions {
    pub threat_multiplier: f32,
    pub life_steal: bool,
}

impl DamageOptions {
    pub fn auto_attack() -> Self {
        Self {
            threat_multiplier: 1.0,
            life_steal: true,
        }
    }

    pub fn single_target_skill() -> Self {
        Self {
            threat_multiplier: 1.0,
            life_steal: false,
        }
    }

    pub fn area() -> Self {
        Self {
            threat_multiplier: AOE_THREAT_MULTIPLIER,
            life_steal: false,
        }
    }
}

/// Resolve one auto-attack swing from `attacker` against `target`.
///
/// Validation order: both registered, not self, attacker able to act,
/// target targetable, PvP/zone gate. Base damage is the attacker's
/// attack power, boosted by a live combo chain.
pub fn perform_attack(
    ctx: &mut EngineCtx,
    combatants: &mut Query<(&mut Combatant, &Transform)>,
    attacker: EntityId,
    target: EntityId,
) -> CombatResult<DamageRecord> {
    if attacker == target {
        return Err(CombatError::InvalidTarget("cannot attack yourself".into()));
    }
    let attacker_entity = ctx
        .registry
        .lookup(attacker)
        .ok_or_else(|| CombatError::NotFound(format!("unknown attacker {attacker}")))?;
    let target_entity = ctx
        .registry
        .lookup(target)
        .ok_or_else(|| CombatError::NotFound(format!("unknown target {target}")))?;

    let attacker_snapshot = {
        let (combatant, _) = combatants
            .get(attacker_entity)
            .map_err(|_| CombatError::NotFound(format!("unknown attacker {attacker}")))?;
        if !combatant.is_alive() {
            return Err(CombatError::InvalidState("attacker is dead".into()));
        }
        combatant.snapshot.clone()
    };

    let control = ctx.status.control_flags(&ctx.effects, attacker);
    if control.blocks_auto_attack() {
        return Err(CombatError::InvalidState("unable to attack".into()));
    }

    let target_snapshot = {
        let (combatant, _) = combatants
            .get(target_entity)
            .map_err(|_| CombatError::NotFound(format!("unknown target {target}")))?;
        if !combatant.can_be_targeted() {
            return Err(CombatError::InvalidTarget("target unavailable".into()));
        }
        combatant.snapshot.clone()
    };

    if !ctx.pvp.can_attack(attacker, target, &ctx.policy) {
        return Err(CombatError::Rejected("target is not attackable".into()));
    }

    let base = attacker_snapshot.attack_power * ctx.combos.damage_multiplier(attacker);
    let record = damage::calculate(
        attacker,
        target,
        &attacker_snapshot,
        &target_snapshot,
        base,
        DamageType::Physical,
        false,
        None,
        ctx.clock.now(),
        ctx.rng.actor(attacker),
    );

    // Acting breaks stealth-like effects on the attacker.
    for effect in ctx.status.on_action(&ctx.effects, attacker) {
        ctx.events.effect_expired.send(crate::sim::EffectExpired {
            target: attacker,
            effect,
        });
    }

    Ok(apply_damage_record(
        ctx,
        combatants,
        record,
        DamageOptions::auto_attack(),
    ))
}

/// Apply a resolved damage record to the world: health, life steal,
/// threat, both combat logs, events, damage-driven breaks, interrupts
/// and death bookkeeping.
pub fn apply_damage_record(
    ctx: &mut EngineCtx,
    combatants: &mut Query<(&mut Combatant, &Transform)>,
    record: DamageRecord,
    options: DamageOptions,
) -> DamageRecord {
    let now = ctx.clock.now();
    let mut actual = 0.0;
    let mut died = false;

    if record.outcome.connects() && record.final_damage > 0.0 {
        if let Some(target_entity) = ctx.registry.lookup(record.target) {
            if let Ok((mut target, _)) = combatants.get_mut(target_entity) {
                let taken = target.take_damage(record.final_damage);
                actual = taken.actual;
                died = taken.died;
            }
        }
    }

    if actual > 0.0 {
        if let Some(attacker_entity) = ctx.registry.lookup(record.attacker) {
            if let Ok((mut attacker, _)) = combatants.get_mut(attacker_entity) {
                attacker.damage_dealt += actual;
                let life_steal = attacker.snapshot.life_steal;
                if options.life_steal && life_steal > 0.0 {
                    let healed = attacker.heal(record.final_damage * life_steal);
                    attacker.healing_done += healed;
                }
            }
        }
        ctx.combos.register_hit(record.attacker, actual);
    }

    ctx.threat.add(
        record.target,
        record.attacker,
        record.final_damage * options.threat_multiplier,
        now,
    );

    // Log before any death settlement so replayers always see the
    // killing blow.
    ctx.logs.record(&record);
    ctx.events.damage.send(DamageResolved {
        record: record.clone(),
    });

    if actual > 0.0 {
        for effect in ctx.status.on_damage_taken(&ctx.effects, record.target) {
            ctx.events.effect_expired.send(crate::sim::EffectExpired {
                target: record.target,
                effect,
            });
        }
        if ctx
            .skills
            .interrupt(&ctx.book, record.target, InterruptKind::Damage.flag())
            .is_some()
        {
            ctx.events.rejected.send(CommandRejected {
                entity: record.target,
                error: CombatError::Interrupted("cast interrupted by damage".into()),
            });
        }
    }

    if died {
        ctx.events.ledger.push(record.target, Some(record.attacker));
        ctx.events.died.send(EntityDied {
            entity: record.target,
            killer: Some(record.attacker),
        });
    }

    record
}

/// Resolve area damage around `center`: every permitted target rolls its
/// own outcome; threat is credited at half rate.
#[allow(clippy::too_many_arguments)]
pub fn execute_area_damage(
    ctx: &mut EngineCtx,
    combatants: &mut Query<(&mut Combatant, &Transform)>,
    attacker: EntityId,
    center: GroundPoint,
    radius: f32,
    base_damage: f32,
    damage_type: DamageType,
    filter: TargetFilter,
) -> Vec<DamageRecord> {
    let mut records = Vec::new();
    let Some(attacker_entity) = ctx.registry.lookup(attacker) else {
        return records;
    };
    let Ok((attacker_combatant, _)) = combatants.get(attacker_entity) else {
        return records;
    };
    let attacker_snapshot = attacker_combatant.snapshot.clone();

    let candidates = spatial::combatants_in_range(combatants, center, radius, Some(attacker));
    for target in candidates {
        if !relation_allows(ctx, attacker, target, filter) {
            continue;
        }
        let Some(target_entity) = ctx.registry.lookup(target) else {
            continue;
        };
        let Ok((target_combatant, _)) = combatants.get(target_entity) else {
            continue;
        };
        if !target_combatant.can_be_targeted() {
            continue;
        }
        let target_snapshot = target_combatant.snapshot.clone();
        let record = damage::calculate(
            attacker,
            target,
            &attacker_snapshot,
            &target_snapshot,
            base_damage,
            damage_type,
            true,
            None,
            ctx.clock.now(),
            ctx.rng.actor(attacker),
        );
        records.push(apply_damage_record(
            ctx,
            combatants,
            record,
            DamageOptions::area(),
        ));
    }
    records
}

/// Run a skill's resolution payload: status effects and damage to every
/// resolved target, healing for support skills.
pub fn resolve_skill_payload(
    ctx: &mut EngineCtx,
    combatants: &mut Query<(&mut Combatant, &Transform)>,
    caster: EntityId,
    skill: &SkillData,
    rank: u32,
    target: Option<EntityId>,
    point: Option<GroundPoint>,
) {
    let Some(caster_entity) = ctx.registry.lookup(caster) else {
        return;
    };
    let Ok((caster_combatant, caster_transform)) = combatants.get(caster_entity) else {
        return;
    };
    let caster_snapshot = caster_combatant.snapshot.clone();
    let caster_pos = GroundPoint::from_transform(caster_transform);

    let targets = gather_targets(ctx, combatants, caster, caster_pos, skill, target, point);
    if targets.is_empty() {
        debug!("{} resolved with no targets", skill.name);
        return;
    }

    let combo_multiplier = ctx.combos.damage_multiplier(caster);
    let damage_base = (skill.damage_for_rank(rank)
        + caster_snapshot.attack_power * skill.ap_coefficient
        + caster_snapshot.spell_power * skill.sp_coefficient)
        * combo_multiplier;
    let healing = skill.healing_for_rank(rank)
        + caster_snapshot.spell_power * skill.healing_coefficient;
    let options = if skill.is_area() {
        DamageOptions::area()
    } else {
        DamageOptions::single_target_skill()
    };

    for target_id in targets {
        let Some(target_entity) = ctx.registry.lookup(target_id) else {
            continue;
        };
        let Ok((target_combatant, _)) = combatants.get(target_entity) else {
            continue;
        };
        if !target_combatant.can_be_targeted() && target_id != caster {
            continue;
        }
        let target_snapshot = target_combatant.snapshot.clone();

        // Carried effects first, so the damage record can list them.
        let applied = apply_skill_effects(ctx, caster, target_id, &skill.effects);

        if skill.deals_damage() {
            let now = ctx.clock.now();
            let mut record = damage::calculate(
                caster,
                target_id,
                &caster_snapshot,
                &target_snapshot,
                damage_base,
                skill.damage_type,
                true,
                Some(skill.id),
                now,
                ctx.rng.actor(caster),
            );
            record.applied_effects = applied.into_iter().collect();
            apply_damage_record(ctx, combatants, record, options);
        }

        if skill.heals() && healing > 0.0 {
            if let Ok((mut target_combatant, _)) = combatants.get_mut(target_entity) {
                let healed = target_combatant.heal(healing);
                if healed > 0.0 {
                    if let Ok((mut caster_combatant, _)) = combatants.get_mut(caster_entity) {
                        caster_combatant.healing_done += healed;
                    }
                    debug!("{} healed {target_id} for {healed:.0}", skill.name);
                }
            }
        }
    }
}

/// Apply a skill's carried effects to one target, publishing an event
/// per success. Immunity is not an error at this layer.
fn apply_skill_effects(
    ctx: &mut EngineCtx,
    caster: EntityId,
    target: EntityId,
    effects: &[EffectId],
) -> Vec<EffectId> {
    let now = ctx.clock.now();
    let mut applied = Vec::new();
    for effect in effects {
        match ctx
            .status
            .apply(&ctx.effects, target, *effect, caster, 1.0, now)
        {
            Ok(()) => {
                applied.push(*effect);
                ctx.events.effect_applied.send(EffectApplied {
                    target,
                    effect: *effect,
                    caster,
                });
            }
            Err(error) => {
                debug!("effect {effect} on {target} failed: {error}");
            }
        }
    }
    applied
}

/// Resolve the entity list a skill payload lands on.
fn gather_targets(
    ctx: &EngineCtx,
    combatants: &Query<(&mut Combatant, &Transform)>,
    caster: EntityId,
    caster_pos: GroundPoint,
    skill: &SkillData,
    target: Option<EntityId>,
    point: Option<GroundPoint>,
) -> Vec<EntityId> {
    match skill.shape {
        TargetShape::Single => match skill.target {
            TargetRequirement::Enemy | TargetRequirement::Ally => target.into_iter().collect(),
            TargetRequirement::SelfOnly | TargetRequirement::None => vec![caster],
            TargetRequirement::Ground => Vec::new(),
        },
        shape => {
            let center = point
                .or_else(|| {
                    target
                        .and_then(|id| ctx.registry.lookup(id))
                        .and_then(|entity| combatants.get(entity).ok())
                        .map(|(_, transform)| GroundPoint::from_transform(transform))
                })
                .unwrap_or(caster_pos);
            let bounding = match shape {
                TargetShape::Circle { radius } => radius,
                TargetShape::Cone { radius, .. } => radius,
                TargetShape::Line { length, width } => length + width,
                TargetShape::Single => 0.0,
            };
            let filter = if skill.target == TargetRequirement::Ally {
                TargetFilter::Allies
            } else {
                TargetFilter::Enemies
            };
            let anchor = match shape {
                // Circles sit on the cast point; cones and lines project
                // from the caster towards it.
                TargetShape::Circle { .. } => center,
                _ => caster_pos,
            };
            spatial::combatants_in_range(combatants, anchor, bounding, None)
                .into_iter()
                .filter(|id| *id != caster || filter == TargetFilter::Allies)
                .filter(|id| relation_allows(ctx, caster, *id, filter))
                .filter(|id| {
                    let Some(entity) = ctx.registry.lookup(*id) else {
                        return false;
                    };
                    let Ok((_, transform)) = combatants.get(entity) else {
                        return false;
                    };
                    let pos = GroundPoint::from_transform(transform);
                    if *id == caster && filter == TargetFilter::Allies {
                        return true;
                    }
                    shape.contains(caster_pos, center, pos)
                })
                .collect()
        }
    }
}

fn relation_allows(
    ctx: &EngineCtx,
    attacker: EntityId,
    target: EntityId,
    filter: TargetFilter,
) -> bool {
    match filter {
        TargetFilter::All => true,
        TargetFilter::Enemies => ctx.pvp.can_attack(attacker, target, &ctx.policy),
        TargetFilter::Allies => {
            target == attacker
                || ctx.pvp.is_ally(attacker, target)
                || (ctx.policy.same_faction(attacker, target)
                    && !ctx.pvp.can_attack(attacker, target, &ctx.policy))
        }
    }
}

/// True iff the attacker stands in the 180° arc behind the target.
/// Positions are ground-plane coordinates; `target_facing` is radians.
pub fn is_behind_target(
    attacker_pos: GroundPoint,
    target_pos: GroundPoint,
    target_facing: f32,
) -> bool {
    use std::f32::consts::{PI, TAU};
    let mut angle_to_attacker =
        (attacker_pos.z - target_pos.z).atan2(attacker_pos.x - target_pos.x);
    let mut facing = target_facing;
    while angle_to_attacker < 0.0 {
        angle_to_attacker += TAU;
    }
    while facing < 0.0 {
        facing += TAU;
    }
    let back = (facing + PI) % TAU;
    let mut diff = (angle_to_attacker - back).abs();
    if diff > PI {
        diff = TAU - diff;
    }
    diff < PI / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn behind_target_is_the_back_arc() {
        let target = GroundPoint::new(0.0, 0.0);
        // Facing +x: behind is -x.
        assert!(is_behind_target(
            GroundPoint::new(-5.0, 0.0),
            target,
            0.0
        ));
        assert!(!is_behind_target(GroundPoint::new(5.0, 0.0), target, 0.0));
        // Flanks are not behind.
        assert!(!is_behind_target(GroundPoint::new(0.0, 5.0), target, 0.0));
    }
}
