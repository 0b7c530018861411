//! Status-effect engine.
//!
//! Owns every effect instance in the world, keyed by target. Instance
//! collections are stable for the duration of a tick: expiry and breaks
//! are collected during iteration and applied afterwards, so queries made
//! by later phases of the same tick observe a consistent effect set.

use bevy::prelude::*;
use std::collections::{HashMap, HashSet};

use crate::combat::damage::periodic_record;
use crate::entity::{Combatant, EntityId, Stat};
use crate::error::{CombatError, CombatResult};
use crate::sim::EngineCtx;
use crate::skill::InterruptKind;

use super::definitions::{
    ControlFlags, DispelCategory, EffectCatalog, EffectData, EffectId, EffectKind, ModifierKind,
    StackBehavior,
};

/// A live application of an effect definition on one target.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectInstance {
    pub effect: EffectId,
    pub caster: EntityId,
    pub applied_at: f64,
    /// `None` for permanent effects.
    pub expires_at: Option<f64>,
    pub last_tick: f64,
    pub stacks: u32,
    pub stack_multiplier: f32,
    pub active: bool,
    /// Caster-derived scaling applied to periodic payloads.
    pub power_coefficient: f32,
}

#[derive(Debug, Default)]
struct ImmunityRecord {
    /// Multisets: an immunity granted by two effects survives the
    /// expiry of one of them.
    categories: Vec<DispelCategory>,
    effects: Vec<EffectId>,
}

impl ImmunityRecord {
    fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.effects.is_empty()
    }
}

/// All active effect instances plus granted immunities, keyed by target.
#[derive(Resource, Debug, Default)]
pub struct StatusEffects {
    active: HashMap<EntityId, Vec<EffectInstance>>,
    immunities: HashMap<EntityId, ImmunityRecord>,
    /// Entities whose modifier set changed since the last snapshot
    /// refresh.
    dirty: HashSet<EntityId>,
}

impl StatusEffects {
    /// Apply `effect_id` to `target`. Fails with `Immune` when the target
    /// is immune by id or category, `NotFound` for an unknown definition.
    pub fn apply(
        &mut self,
        catalog: &EffectCatalog,
        target: EntityId,
        effect_id: EffectId,
        caster: EntityId,
        duration_scale: f32,
        now: f64,
    ) -> CombatResult<()> {
        self.apply_scaled(catalog, target, effect_id, caster, duration_scale, 1.0, now)
    }

    /// [`StatusEffects::apply`] with a caster-derived power coefficient
    /// scaling the periodic payload.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_scaled(
        &mut self,
        catalog: &EffectCatalog,
        target: EntityId,
        effect_id: EffectId,
        caster: EntityId,
        duration_scale: f32,
        power_coefficient: f32,
        now: f64,
    ) -> CombatResult<()> {
        let def = catalog
            .get(effect_id)
            .ok_or_else(|| CombatError::NotFound(format!("unknown effect {effect_id}")))?;

        if self.immune_to_effect(target, effect_id) || self.immune_to_category(target, def.category)
        {
            return Err(CombatError::Immune(format!(
                "{target} is immune to {}",
                def.name
            )));
        }

        let scaled_duration = (def.duration * duration_scale) as f64;

        // UNIQUE_SOURCE scopes the stacking lookup to the caster; every
        // other behavior matches any caster's instance.
        let source_filter = (def.stacking == StackBehavior::UniqueSource).then_some(caster);
        if let Some(existing) = self.find_instance_mut(target, effect_id, source_filter) {
            match def.stacking {
                StackBehavior::None | StackBehavior::UniqueSource => {
                    if !def.is_permanent() {
                        existing.expires_at = Some(now + scaled_duration);
                    }
                }
                StackBehavior::StackDuration => {
                    if let Some(expiry) = existing.expires_at.as_mut() {
                        *expiry += scaled_duration;
                    }
                }
                StackBehavior::StackIntensity => {
                    if existing.stacks < def.max_stacks {
                        existing.stacks += 1;
                        existing.stack_multiplier = existing.stacks as f32;
                    }
                }
                StackBehavior::StackRefresh => {
                    if existing.stacks < def.max_stacks {
                        existing.stacks += 1;
                        existing.stack_multiplier = existing.stacks as f32;
                    }
                    if !def.is_permanent() {
                        existing.expires_at = Some(now + scaled_duration);
                    }
                }
            }
            self.dirty.insert(target);
            return Ok(());
        }

        let instance = EffectInstance {
            effect: effect_id,
            caster,
            applied_at: now,
            expires_at: (!def.is_permanent()).then_some(now + scaled_duration),
            last_tick: now,
            stacks: 1,
            stack_multiplier: 1.0,
            active: true,
            power_coefficient,
        };

        self.grant_immunities(target, def);
        self.active.entry(target).or_default().push(instance);
        self.dirty.insert(target);
        debug!("applied {} to {target} from {caster}", def.name);
        Ok(())
    }

    /// Apply `n` stacks in one call.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_stacks(
        &mut self,
        catalog: &EffectCatalog,
        target: EntityId,
        effect_id: EffectId,
        caster: EntityId,
        n: u32,
        now: f64,
    ) -> CombatResult<()> {
        for _ in 0..n.max(1) {
            self.apply(catalog, target, effect_id, caster, 1.0, now)?;
        }
        Ok(())
    }

    /// Remove instances of `effect_id` on `target`, optionally scoped to
    /// one caster. Removing a nonexistent instance is a no-op. Returns
    /// the removed effect ids.
    pub fn remove(
        &mut self,
        catalog: &EffectCatalog,
        target: EntityId,
        effect_id: EffectId,
        caster: Option<EntityId>,
    ) -> Vec<EffectId> {
        self.remove_where(catalog, target, usize::MAX, |instance, _| {
            instance.effect == effect_id && caster.map_or(true, |c| instance.caster == c)
        })
    }

    pub fn remove_all(&mut self, catalog: &EffectCatalog, target: EntityId) -> Vec<EffectId> {
        let removed = self.remove_where(catalog, target, usize::MAX, |_, _| true);
        self.immunities.remove(&target);
        removed
    }

    pub fn remove_by_category(
        &mut self,
        catalog: &EffectCatalog,
        target: EntityId,
        category: DispelCategory,
    ) -> Vec<EffectId> {
        self.remove_where(catalog, target, usize::MAX, |_, def| def.category == category)
    }

    /// Strip up to `n` harmful effects, newest first.
    pub fn remove_debuffs(
        &mut self,
        catalog: &EffectCatalog,
        target: EntityId,
        n: usize,
    ) -> Vec<EffectId> {
        self.remove_where(catalog, target, n, |_, def| def.kind.is_harmful())
    }

    /// Dispel up to `n` MAGIC effects. A friendly dispel removes harmful
    /// effects; a hostile dispel removes buffs.
    pub fn dispel_magic(
        &mut self,
        catalog: &EffectCatalog,
        target: EntityId,
        friendly: bool,
        n: usize,
    ) -> Vec<EffectId> {
        self.remove_where(catalog, target, n, |_, def| {
            def.category == DispelCategory::Magic
                && if friendly {
                    def.kind.is_harmful()
                } else {
                    def.kind == EffectKind::Buff
                }
        })
    }

    /// Remove every POISON and DISEASE affliction.
    pub fn cleanse_poison_disease(
        &mut self,
        catalog: &EffectCatalog,
        target: EntityId,
    ) -> Vec<EffectId> {
        self.remove_where(catalog, target, usize::MAX, |_, def| {
            matches!(
                def.category,
                DispelCategory::Poison | DispelCategory::Disease
            ) && def.kind.is_harmful()
        })
    }

    /// Remove one CURSE affliction.
    pub fn remove_curse(&mut self, catalog: &EffectCatalog, target: EntityId) -> Vec<EffectId> {
        self.remove_where(catalog, target, 1, |_, def| {
            def.category == DispelCategory::Curse && def.kind.is_harmful()
        })
    }

    pub fn active(&self, target: EntityId) -> &[EffectInstance] {
        self.active.get(&target).map_or(&[], Vec::as_slice)
    }

    pub fn has(&self, target: EntityId, effect_id: EffectId) -> bool {
        self.active(target)
            .iter()
            .any(|instance| instance.effect == effect_id && instance.active)
    }

    pub fn stacks(&self, target: EntityId, effect_id: EffectId) -> u32 {
        self.active(target)
            .iter()
            .filter(|instance| instance.effect == effect_id && instance.active)
            .map(|instance| instance.stacks)
            .sum()
    }

    /// Bitwise OR of control flags over all active effects.
    pub fn control_flags(&self, catalog: &EffectCatalog, target: EntityId) -> ControlFlags {
        let mut flags = ControlFlags::EMPTY;
        for instance in self.active(target) {
            if !instance.active {
                continue;
            }
            if let Some(def) = catalog.get(instance.effect) {
                flags.insert(def.control_flags());
            }
        }
        flags
    }

    pub fn is_stunned(&self, catalog: &EffectCatalog, target: EntityId) -> bool {
        self.control_flags(catalog, target)
            .contains(super::definitions::ControlKind::Stun)
    }

    pub fn is_silenced(&self, catalog: &EffectCatalog, target: EntityId) -> bool {
        self.control_flags(catalog, target)
            .contains(super::definitions::ControlKind::Silence)
    }

    pub fn is_rooted(&self, catalog: &EffectCatalog, target: EntityId) -> bool {
        self.control_flags(catalog, target)
            .contains(super::definitions::ControlKind::Root)
    }

    pub fn immune_to_effect(&self, target: EntityId, effect_id: EffectId) -> bool {
        self.immunities
            .get(&target)
            .map_or(false, |record| record.effects.contains(&effect_id))
    }

    pub fn immune_to_category(&self, target: EntityId, category: DispelCategory) -> bool {
        if category == DispelCategory::None {
            return false;
        }
        self.immunities
            .get(&target)
            .map_or(false, |record| record.categories.contains(&category))
    }

    /// Aggregate stat delta over all active effects:
    /// `flat + (percent / 100) × multiplier`, each bucket scaled by the
    /// instance's stacks.
    pub fn total_stat_modifier(
        &self,
        catalog: &EffectCatalog,
        target: EntityId,
        stat: Stat,
    ) -> f32 {
        let mut flat = 0.0;
        let mut percent = 0.0;
        let mut multiplier = 1.0;
        for instance in self.active(target) {
            if !instance.active {
                continue;
            }
            let Some(def) = catalog.get(instance.effect) else {
                continue;
            };
            for modifier in &def.modifiers {
                if modifier.stat != stat {
                    continue;
                }
                let value = modifier.value * instance.stack_multiplier;
                match modifier.kind {
                    ModifierKind::Flat => flat += value,
                    ModifierKind::Percent => percent += value,
                    ModifierKind::Multiplier => multiplier *= value,
                }
            }
        }
        flat + (percent / 100.0) * multiplier
    }

    /// Break effects flagged `remove_on_damage`. Called after any
    /// post-mitigation damage lands on `target`.
    pub fn on_damage_taken(&mut self, catalog: &EffectCatalog, target: EntityId) -> Vec<EffectId> {
        self.remove_where(catalog, target, usize::MAX, |_, def| def.remove_on_damage)
    }

    /// Break effects flagged `remove_on_action`. Called when `target`
    /// takes a hostile action.
    pub fn on_action(&mut self, catalog: &EffectCatalog, target: EntityId) -> Vec<EffectId> {
        self.remove_where(catalog, target, usize::MAX, |_, def| def.remove_on_action)
    }

    /// Strip everything that does not persist through death.
    pub fn on_death(&mut self, catalog: &EffectCatalog, target: EntityId) -> Vec<EffectId> {
        self.remove_where(catalog, target, usize::MAX, |_, def| {
            !def.persist_through_death
        })
    }

    /// Remove instances already marked inactive (expired this tick),
    /// withdrawing their immunities. Returns the removed effect ids.
    pub fn purge_inactive(&mut self, catalog: &EffectCatalog, target: EntityId) -> Vec<EffectId> {
        self.remove_where(catalog, target, usize::MAX, |instance, _| !instance.active)
    }

    /// Drop every row owned by `target`.
    pub fn remove_entity(&mut self, target: EntityId) {
        self.active.remove(&target);
        self.immunities.remove(&target);
        self.dirty.remove(&target);
    }

    pub fn mark_dirty(&mut self, target: EntityId) {
        self.dirty.insert(target);
    }

    pub fn take_dirty(&mut self) -> Vec<EntityId> {
        self.dirty.drain().collect()
    }

    fn find_instance_mut(
        &mut self,
        target: EntityId,
        effect_id: EffectId,
        caster: Option<EntityId>,
    ) -> Option<&mut EffectInstance> {
        self.active.get_mut(&target)?.iter_mut().find(|instance| {
            instance.effect == effect_id
                && instance.active
                && caster.map_or(true, |c| instance.caster == c)
        })
    }

    fn grant_immunities(&mut self, target: EntityId, def: &EffectData) {
        if def.grants_immunity_categories.is_empty() && def.grants_immunity_effects.is_empty() {
            return;
        }
        let record = self.immunities.entry(target).or_default();
        record
            .categories
            .extend(def.grants_immunity_categories.iter().copied());
        record
            .effects
            .extend(def.grants_immunity_effects.iter().copied());
    }

    fn withdraw_immunities(&mut self, target: EntityId, def: &EffectData) {
        let Some(record) = self.immunities.get_mut(&target) else {
            return;
        };
        for category in &def.grants_immunity_categories {
            if let Some(pos) = record.categories.iter().position(|c| c == category) {
                record.categories.swap_remove(pos);
            }
        }
        for effect in &def.grants_immunity_effects {
            if let Some(pos) = record.effects.iter().position(|e| e == effect) {
                record.effects.swap_remove(pos);
            }
        }
        if record.is_empty() {
            self.immunities.remove(&target);
        }
    }

    /// Shared removal path: select up to `limit` matching instances,
    /// newest first, withdraw their immunities and report the ids.
    fn remove_where(
        &mut self,
        catalog: &EffectCatalog,
        target: EntityId,
        limit: usize,
        predicate: impl Fn(&EffectInstance, &EffectData) -> bool,
    ) -> Vec<EffectId> {
        let Some(instances) = self.active.get_mut(&target) else {
            return Vec::new();
        };
        let mut selected = Vec::new();
        for (index, instance) in instances.iter().enumerate().rev() {
            if selected.len() >= limit {
                break;
            }
            let Some(def) = catalog.get(instance.effect) else {
                continue;
            };
            if predicate(instance, def) {
                selected.push(index);
            }
        }
        let mut removed = Vec::new();
        for index in selected {
            let instance = instances.remove(index);
            removed.push(instance.effect);
        }
        if instances.is_empty() {
            self.active.remove(&target);
        }
        for effect in &removed {
            if let Some(def) = catalog.get(*effect).cloned() {
                self.withdraw_immunities(target, &def);
            }
        }
        if !removed.is_empty() {
            self.dirty.insert(target);
        }
        removed
    }
}

/// Recompute `combatant`'s stat snapshot from its base stats plus the
/// aggregate status modifiers, then clamp pools into the new bounds.
pub fn recompute_snapshot(
    combatant: &mut Combatant,
    status: &StatusEffects,
    catalog: &EffectCatalog,
) {
    for stat in Stat::ALL {
        let value = combatant.base.stat(stat) + status.total_stat_modifier(catalog, combatant.id, stat);
        combatant.snapshot.set_stat(stat, value);
    }
    combatant.clamp_pools();
}

// One periodic payload gathered during iteration, applied afterwards.
struct PendingPayload {
    target: EntityId,
    caster: EntityId,
    effect: EffectId,
    damage: f32,
    healing: f32,
    damage_type: crate::combat::damage::DamageType,
}

/// Advance every effect instance by one tick: expire, run periodic
/// payloads, apply removals after iteration.
pub fn tick_effects(mut ctx: EngineCtx, mut combatants: Query<(&mut Combatant, &Transform)>) {
    let now = ctx.clock.now();
    let mut payloads: Vec<PendingPayload> = Vec::new();
    let mut expired_targets: Vec<EntityId> = Vec::new();

    for (target, instances) in ctx.status.active.iter_mut() {
        for instance in instances.iter_mut() {
            if !instance.active {
                continue;
            }
            let Some(def) = ctx.effects.get(instance.effect) else {
                continue;
            };
            if let Some(expires_at) = instance.expires_at {
                if expires_at <= now {
                    instance.active = false;
                    if !expired_targets.contains(target) {
                        expired_targets.push(*target);
                    }
                    continue;
                }
            }
            if def.tick_interval > 0.0 && now - instance.last_tick >= def.tick_interval as f64 {
                let scale = instance.stack_multiplier * instance.power_coefficient;
                payloads.push(PendingPayload {
                    target: *target,
                    caster: instance.caster,
                    effect: instance.effect,
                    damage: def.tick_damage * scale,
                    healing: def.tick_healing * scale,
                    damage_type: def.tick_damage_type,
                });
                instance.last_tick = now;
            }
        }
    }

    // Periodic payloads, after the iteration so the instance set stays
    // stable while rolling. Table order is arbitrary; payloads apply in
    // id order so replays are stable.
    payloads.sort_by_key(|payload| (payload.target, payload.caster, payload.effect));
    expired_targets.sort_unstable();
    let mut caster_tallies: Vec<(EntityId, f32, f32)> = Vec::new();
    let mut damaged: Vec<EntityId> = Vec::new();
    let mut deaths: Vec<(EntityId, EntityId)> = Vec::new();
    for payload in payloads {
        let Some(entity) = ctx.registry.lookup(payload.target) else {
            continue;
        };
        let Ok((mut combatant, _)) = combatants.get_mut(entity) else {
            continue;
        };
        if !combatant.is_alive() {
            continue;
        }
        if payload.damage > 0.0 {
            let taken = combatant.take_damage(payload.damage);
            let record = periodic_record(
                payload.caster,
                payload.target,
                payload.damage_type,
                taken.actual,
                now,
            );
            ctx.logs.record(&record);
            ctx.events.damage.send(crate::sim::DamageResolved { record });
            if taken.actual > 0.0 {
                damaged.push(payload.target);
                caster_tallies.push((payload.caster, taken.actual, 0.0));
            }
            if taken.died {
                deaths.push((payload.target, payload.caster));
            }
        }
        if payload.healing > 0.0 {
            let healed = combatant.heal(payload.healing);
            if healed > 0.0 {
                caster_tallies.push((payload.caster, 0.0, healed));
            }
        }
    }

    for (caster, dealt, healed) in caster_tallies {
        if let Some(entity) = ctx.registry.lookup(caster) {
            if let Ok((mut combatant, _)) = combatants.get_mut(entity) {
                combatant.damage_dealt += dealt;
                combatant.healing_done += healed;
            }
        }
    }

    // Expiries collected above, applied now.
    for target in expired_targets {
        for effect in ctx.status.purge_inactive(&ctx.effects, target) {
            ctx.events
                .effect_expired
                .send(crate::sim::EffectExpired { target, effect });
        }
    }

    // Damage-driven breaks (SLEEP and friends) and cast interrupts.
    for target in damaged {
        for effect in ctx.status.on_damage_taken(&ctx.effects, target) {
            ctx.events
                .effect_expired
                .send(crate::sim::EffectExpired { target, effect });
        }
        if ctx
            .skills
            .interrupt(&ctx.book, target, InterruptKind::Damage.flag())
            .is_some()
        {
            ctx.events.rejected.send(crate::sim::CommandRejected {
                entity: target,
                error: CombatError::Interrupted("cast interrupted by damage".into()),
            });
        }
    }

    for (target, killer) in deaths {
        ctx.events.ledger.push(target, Some(killer));
        ctx.events.died.send(crate::sim::EntityDied {
            entity: target,
            killer: Some(killer),
        });
    }
}

/// Refresh stat snapshots for entities whose modifier set changed.
pub fn refresh_stat_snapshots(
    mut ctx: EngineCtx,
    mut combatants: Query<(&mut Combatant, &Transform)>,
) {
    for target in ctx.status.take_dirty() {
        let Some(entity) = ctx.registry.lookup(target) else {
            continue;
        };
        if let Ok((mut combatant, _)) = combatants.get_mut(entity) {
            recompute_snapshot(&mut combatant, &ctx.status, &ctx.effects);
        }
    }
}
