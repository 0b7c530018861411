//! Skill engine: cast lifecycle, cooldowns, toggles, interrupts.
//!
//! Per-entity skill state lives here; the static definitions come from
//! the [`SkillBook`]. `start_cast` checks its preconditions in order and
//! mutates nothing until all of them pass, so a typed error guarantees
//! no cooldown, resource or state change happened.

use bevy::prelude::*;
use std::collections::HashMap;

use crate::entity::{Combatant, EntityId};
use crate::error::{CombatError, CombatResult};
use crate::sim::spatial::GroundPoint;
use crate::sim::{EngineCtx, SimClock};
use crate::status::ControlFlags;

use super::definitions::{SkillBook, SkillCategory, SkillData, SkillId, TargetRequirement};

/// Per-entity, per-skill state.
#[derive(Debug, Clone)]
pub struct SkillInstance {
    pub skill: SkillId,
    pub rank: u32,
    pub last_used: Option<f64>,
    pub cooldown_end: Option<f64>,
    pub casting: bool,
    pub channeling: bool,
    pub toggled: bool,
    pub cast_progress: f32,
    pub channel_progress: f32,
    pub target: Option<EntityId>,
    pub point: Option<GroundPoint>,
}

impl SkillInstance {
    fn new(skill: SkillId) -> Self {
        Self {
            skill,
            rank: 1,
            last_used: None,
            cooldown_end: None,
            casting: false,
            channeling: false,
            toggled: false,
            cast_progress: 0.0,
            channel_progress: 0.0,
            target: None,
            point: None,
        }
    }

    fn reset_cast_flags(&mut self) {
        self.casting = false;
        self.channeling = false;
        self.cast_progress = 0.0;
        self.channel_progress = 0.0;
    }
}

/// The single in-flight cast or channel of an entity.
#[derive(Debug, Clone)]
pub struct ActiveCast {
    pub skill: SkillId,
    pub target: Option<EntityId>,
    pub point: Option<GroundPoint>,
    pub started_at: f64,
    pub cast_time: f32,
    pub channel_remaining: f32,
    pub channeling: bool,
    last_payload: f64,
}

/// What the caller must do after a successful `start_cast`.
#[derive(Debug, Clone, PartialEq)]
pub enum CastAction {
    /// A cast or channel began; resolution happens in a later tick.
    Started,
    /// Instant skill: run the resolution payload now.
    ResolveNow,
    ToggledOn,
    ToggledOff,
}

/// Caller-resolved view of a cast target, used for requirement checks.
#[derive(Debug, Clone, Copy)]
pub struct TargetView {
    pub id: EntityId,
    pub alive: bool,
    pub targetable: bool,
    pub hostile: bool,
    pub allied: bool,
    pub position: GroundPoint,
}

/// All per-entity skill state: known skills, the active cast table,
/// toggles and global cooldowns.
#[derive(Resource, Debug, Default)]
pub struct SkillState {
    known: HashMap<EntityId, HashMap<SkillId, SkillInstance>>,
    active_casts: HashMap<EntityId, ActiveCast>,
    toggles: HashMap<EntityId, Vec<SkillId>>,
    gcd_until: HashMap<EntityId, f64>,
}

impl SkillState {
    /// Learn `skill_id` at rank 1. Learning a known skill is an error;
    /// use [`SkillState::upgrade_skill`] to raise the rank.
    pub fn learn_skill(
        &mut self,
        book: &SkillBook,
        entity: EntityId,
        skill_id: SkillId,
    ) -> CombatResult<()> {
        let skill = book
            .get(skill_id)
            .ok_or_else(|| CombatError::NotFound(format!("unknown skill {skill_id}")))?;
        let skills = self.known.entry(entity).or_default();
        if skills.contains_key(&skill_id) {
            return Err(CombatError::InvalidState(format!(
                "{entity} already knows {}",
                skill.name
            )));
        }
        skills.insert(skill_id, SkillInstance::new(skill_id));
        debug!("{entity} learned {}", skill.name);
        Ok(())
    }

    pub fn upgrade_skill(
        &mut self,
        book: &SkillBook,
        entity: EntityId,
        skill_id: SkillId,
    ) -> CombatResult<u32> {
        let skill = book
            .get(skill_id)
            .ok_or_else(|| CombatError::NotFound(format!("unknown skill {skill_id}")))?;
        let instance = self
            .known
            .get_mut(&entity)
            .and_then(|skills| skills.get_mut(&skill_id))
            .ok_or_else(|| {
                CombatError::InvalidState(format!("{entity} does not know {}", skill.name))
            })?;
        if instance.rank >= skill.max_rank {
            return Err(CombatError::InvalidState(format!(
                "{} already at max rank",
                skill.name
            )));
        }
        instance.rank += 1;
        Ok(instance.rank)
    }

    pub fn has_skill(&self, entity: EntityId, skill_id: SkillId) -> bool {
        self.known
            .get(&entity)
            .map_or(false, |skills| skills.contains_key(&skill_id))
    }

    pub fn rank_of(&self, entity: EntityId, skill_id: SkillId) -> u32 {
        self.known
            .get(&entity)
            .and_then(|skills| skills.get(&skill_id))
            .map_or(0, |instance| instance.rank)
    }

    pub fn instance(&self, entity: EntityId, skill_id: SkillId) -> Option<&SkillInstance> {
        self.known.get(&entity)?.get(&skill_id)
    }

    pub fn is_casting(&self, entity: EntityId) -> bool {
        self.active_casts
            .get(&entity)
            .map_or(false, |cast| !cast.channeling)
    }

    pub fn is_channeling(&self, entity: EntityId) -> bool {
        self.active_casts
            .get(&entity)
            .map_or(false, |cast| cast.channeling)
    }

    pub fn active_cast(&self, entity: EntityId) -> Option<&ActiveCast> {
        self.active_casts.get(&entity)
    }

    pub fn is_toggled(&self, entity: EntityId, skill_id: SkillId) -> bool {
        self.toggles
            .get(&entity)
            .map_or(false, |toggles| toggles.contains(&skill_id))
    }

    pub fn is_on_cooldown(&self, entity: EntityId, skill_id: SkillId, now: f64) -> bool {
        self.known
            .get(&entity)
            .and_then(|skills| skills.get(&skill_id))
            .and_then(|instance| instance.cooldown_end)
            .map_or(false, |end| now < end)
    }

    pub fn cooldown_remaining(&self, entity: EntityId, skill_id: SkillId, now: f64) -> f32 {
        self.known
            .get(&entity)
            .and_then(|skills| skills.get(&skill_id))
            .and_then(|instance| instance.cooldown_end)
            .map_or(0.0, |end| ((end - now).max(0.0)) as f32)
    }

    /// Clear one skill's cooldown, or all of the entity's cooldowns.
    pub fn reset_cooldown(&mut self, entity: EntityId, skill_id: Option<SkillId>) {
        let Some(skills) = self.known.get_mut(&entity) else {
            return;
        };
        match skill_id {
            Some(id) => {
                if let Some(instance) = skills.get_mut(&id) {
                    instance.cooldown_end = None;
                }
            }
            None => {
                for instance in skills.values_mut() {
                    instance.cooldown_end = None;
                }
            }
        }
        self.gcd_until.remove(&entity);
    }

    pub fn gcd_active(&self, entity: EntityId, now: f64) -> bool {
        self.gcd_until.get(&entity).map_or(false, |end| now < *end)
    }

    fn apply_gcd(&mut self, entity: EntityId, duration: f32, now: f64) {
        if duration > 0.0 {
            self.gcd_until.insert(entity, now + duration as f64);
        }
    }

    /// Validate and begin a cast. Preconditions are checked in a fixed
    /// order; the first failure returns a typed error with nothing
    /// mutated.
    #[allow(clippy::too_many_arguments)]
    pub fn start_cast(
        &mut self,
        book: &SkillBook,
        clock: &SimClock,
        caster: &mut Combatant,
        caster_pos: GroundPoint,
        control: ControlFlags,
        skill_id: SkillId,
        target: Option<&TargetView>,
        point: Option<GroundPoint>,
    ) -> CombatResult<CastAction> {
        let now = clock.now();
        let entity = caster.id;

        // 1. Skill id known.
        let skill = book
            .get(skill_id)
            .ok_or_else(|| CombatError::NotFound(format!("unknown skill {skill_id}")))?;

        // 2. Caster knows the skill.
        if self.rank_of(entity, skill_id) == 0 {
            return Err(CombatError::InvalidState(format!(
                "{} not learned",
                skill.name
            )));
        }

        if skill.category == SkillCategory::Passive {
            return Err(CombatError::InvalidState(format!(
                "{} is passive",
                skill.name
            )));
        }

        if skill.category == SkillCategory::Toggle {
            return self.toggle(book, caster, skill_id);
        }

        // 3. Not on cooldown.
        if self.is_on_cooldown(entity, skill_id, now) {
            return Err(CombatError::OnCooldown(format!(
                "{} ready in {:.1}s",
                skill.name,
                self.cooldown_remaining(entity, skill_id, now)
            )));
        }

        // 4. Not already casting or channeling.
        if self.active_casts.contains_key(&entity) {
            return Err(CombatError::InvalidState("already casting".into()));
        }

        // 5. Resource check (no deduction yet).
        if !caster.has_resource(skill.resource, skill.cost) {
            return Err(CombatError::InsufficientResource(format!(
                "{} costs {:.0}",
                skill.name, skill.cost
            )));
        }

        // 6. Target requirement.
        Self::check_target(skill, entity, caster_pos, target, point)?;

        // 7. Global cooldown.
        if self.gcd_active(entity, now) {
            return Err(CombatError::OnCooldown("global cooldown".into()));
        }

        // 8. Control-flag gating: STUN, SLEEP and FREEZE block every
        // cast; SILENCE blocks magical skills; DISARM blocks physical
        // skills.
        if control.blocks_all_casts() {
            return Err(CombatError::InvalidState("unable to act".into()));
        }
        if control.contains(crate::status::ControlKind::Silence) && skill.damage_type.is_magical() {
            return Err(CombatError::InvalidState("silenced".into()));
        }
        if control.contains(crate::status::ControlKind::Disarm) && skill.damage_type.is_physical() {
            return Err(CombatError::InvalidState("disarmed".into()));
        }

        let target_id = target.map(|view| view.id);
        let cdr = caster.snapshot.cooldown_reduction;

        match skill.category {
            SkillCategory::Instant => {
                caster.consume_resource(skill.resource, skill.cost);
                self.commit_cooldown(entity, skill, cdr, now);
                self.apply_gcd(entity, skill.global_cooldown, now);
                Ok(CastAction::ResolveNow)
            }
            SkillCategory::CastTime => {
                self.active_casts.insert(
                    entity,
                    ActiveCast {
                        skill: skill_id,
                        target: target_id,
                        point,
                        started_at: now,
                        cast_time: skill.cast_time,
                        channel_remaining: 0.0,
                        channeling: false,
                        last_payload: now,
                    },
                );
                self.with_instance(entity, skill_id, |instance| {
                    instance.casting = true;
                    instance.cast_progress = 0.0;
                    instance.target = target_id;
                    instance.point = point;
                });
                self.apply_gcd(entity, skill.global_cooldown, now);
                debug!("{entity} started casting {}", skill.name);
                Ok(CastAction::Started)
            }
            SkillCategory::Channeling => {
                caster.consume_resource(skill.resource, skill.cost);
                self.active_casts.insert(
                    entity,
                    ActiveCast {
                        skill: skill_id,
                        target: target_id,
                        point,
                        started_at: now,
                        cast_time: 0.0,
                        channel_remaining: skill.channel_duration,
                        channeling: true,
                        last_payload: now,
                    },
                );
                self.with_instance(entity, skill_id, |instance| {
                    instance.channeling = true;
                    instance.channel_progress = 0.0;
                    instance.target = target_id;
                    instance.point = point;
                });
                self.commit_cooldown(entity, skill, cdr, now);
                self.apply_gcd(entity, skill.global_cooldown, now);
                debug!("{entity} started channeling {}", skill.name);
                Ok(CastAction::Started)
            }
            SkillCategory::Toggle | SkillCategory::Passive => unreachable!("handled above"),
        }
    }

    /// Flip a toggle skill. Turning on requires the activation cost;
    /// turning off never applies a cooldown.
    pub fn toggle(
        &mut self,
        book: &SkillBook,
        caster: &mut Combatant,
        skill_id: SkillId,
    ) -> CombatResult<CastAction> {
        let entity = caster.id;
        let skill = book
            .get(skill_id)
            .ok_or_else(|| CombatError::NotFound(format!("unknown skill {skill_id}")))?;
        if skill.category != SkillCategory::Toggle {
            return Err(CombatError::InvalidState(format!(
                "{} is not a toggle",
                skill.name
            )));
        }
        if self.rank_of(entity, skill_id) == 0 {
            return Err(CombatError::InvalidState(format!(
                "{} not learned",
                skill.name
            )));
        }

        if self.is_toggled(entity, skill_id) {
            self.set_toggled(entity, skill_id, false);
            debug!("{entity} toggled off {}", skill.name);
            return Ok(CastAction::ToggledOff);
        }

        if !caster.has_resource(skill.resource, skill.cost) {
            return Err(CombatError::InsufficientResource(format!(
                "{} costs {:.0}",
                skill.name, skill.cost
            )));
        }
        caster.consume_resource(skill.resource, skill.cost);
        self.set_toggled(entity, skill_id, true);
        debug!("{entity} toggled on {}", skill.name);
        Ok(CastAction::ToggledOn)
    }

    /// Cancel the active cast or channel. `InvalidState` when idle.
    pub fn cancel_cast(&mut self, entity: EntityId) -> CombatResult<SkillId> {
        let cast = self
            .active_casts
            .remove(&entity)
            .ok_or_else(|| CombatError::InvalidState("not casting".into()))?;
        self.with_instance(entity, cast.skill, SkillInstance::reset_cast_flags);
        debug!("{entity} cancelled cast of {}", cast.skill);
        Ok(cast.skill)
    }

    /// Cancel the active cast iff the skill is interruptible by any of
    /// `flags`. Returns the interrupted skill id.
    pub fn interrupt(&mut self, book: &SkillBook, entity: EntityId, flags: u32) -> Option<SkillId> {
        let cast = self.active_casts.get(&entity)?;
        let skill = book.get(cast.skill)?;
        if skill.interrupt_mask() & flags == 0 {
            return None;
        }
        self.cancel_cast(entity).ok()
    }

    /// Drop every row owned by `entity`.
    pub fn remove_entity(&mut self, entity: EntityId) {
        self.known.remove(&entity);
        self.active_casts.remove(&entity);
        self.toggles.remove(&entity);
        self.gcd_until.remove(&entity);
    }

    pub fn has_rows(&self, entity: EntityId) -> bool {
        self.known.contains_key(&entity)
            || self.active_casts.contains_key(&entity)
            || self.toggles.contains_key(&entity)
            || self.gcd_until.contains_key(&entity)
    }

    fn commit_cooldown(&mut self, entity: EntityId, skill: &SkillData, cdr: f32, now: f64) {
        self.with_instance(entity, skill.id, |instance| {
            instance.last_used = Some(now);
            if skill.cooldown > 0.0 {
                instance.cooldown_end =
                    Some(now + (skill.cooldown * (1.0 - cdr)).max(0.0) as f64);
            }
        });
    }

    fn set_toggled(&mut self, entity: EntityId, skill_id: SkillId, on: bool) {
        let toggles = self.toggles.entry(entity).or_default();
        if on {
            if !toggles.contains(&skill_id) {
                toggles.push(skill_id);
            }
        } else {
            toggles.retain(|id| *id != skill_id);
        }
        self.with_instance(entity, skill_id, |instance| instance.toggled = on);
    }

    fn with_instance(
        &mut self,
        entity: EntityId,
        skill_id: SkillId,
        update: impl FnOnce(&mut SkillInstance),
    ) {
        if let Some(instance) = self
            .known
            .get_mut(&entity)
            .and_then(|skills| skills.get_mut(&skill_id))
        {
            update(instance);
        }
    }

    fn check_target(
        skill: &SkillData,
        caster: EntityId,
        caster_pos: GroundPoint,
        target: Option<&TargetView>,
        point: Option<GroundPoint>,
    ) -> CombatResult<()> {
        let in_range = |position: GroundPoint| {
            skill.range <= 0.0 || caster_pos.distance(position) <= skill.range
        };
        match skill.target {
            TargetRequirement::None => Ok(()),
            TargetRequirement::Enemy => {
                let view = target
                    .ok_or_else(|| CombatError::InvalidTarget("requires enemy target".into()))?;
                if view.id == caster {
                    return Err(CombatError::InvalidTarget("cannot target self".into()));
                }
                if !view.alive || !view.targetable {
                    return Err(CombatError::InvalidTarget("target unavailable".into()));
                }
                if !view.hostile {
                    return Err(CombatError::InvalidTarget("target is not hostile".into()));
                }
                if !in_range(view.position) {
                    return Err(CombatError::InvalidTarget("out of range".into()));
                }
                Ok(())
            }
            TargetRequirement::Ally => {
                let view = target
                    .ok_or_else(|| CombatError::InvalidTarget("requires ally target".into()))?;
                if !view.alive || !view.targetable {
                    return Err(CombatError::InvalidTarget("target unavailable".into()));
                }
                if view.id != caster && !view.allied {
                    return Err(CombatError::InvalidTarget("target is not an ally".into()));
                }
                if !in_range(view.position) {
                    return Err(CombatError::InvalidTarget("out of range".into()));
                }
                Ok(())
            }
            TargetRequirement::Ground => {
                let point =
                    point.ok_or_else(|| CombatError::InvalidTarget("requires a point".into()))?;
                if !in_range(point) {
                    return Err(CombatError::InvalidTarget("out of range".into()));
                }
                Ok(())
            }
            TargetRequirement::SelfOnly => match target {
                None => Ok(()),
                Some(view) if view.id == caster => Ok(()),
                Some(_) => Err(CombatError::InvalidTarget("can only target self".into())),
            },
        }
    }
}

// Work items collected while iterating the cast table, applied after.
enum CastWork {
    Complete {
        entity: EntityId,
        skill: SkillId,
    },
    ChannelPayload {
        entity: EntityId,
        skill: SkillId,
    },
    ChannelEnd {
        entity: EntityId,
        skill: SkillId,
        final_payload: bool,
    },
    Cancel {
        entity: EntityId,
        skill: SkillId,
        reason: CombatError,
    },
}

impl CastWork {
    fn entity(&self) -> EntityId {
        match self {
            CastWork::Complete { entity, .. }
            | CastWork::ChannelPayload { entity, .. }
            | CastWork::ChannelEnd { entity, .. }
            | CastWork::Cancel { entity, .. } => *entity,
        }
    }
}

/// Advance every active cast, channel and toggle by one tick.
pub fn advance_casts(mut ctx: EngineCtx, mut combatants: Query<(&mut Combatant, &Transform)>) {
    let now = ctx.clock.now();
    let dt = ctx.clock.dt();
    let mut work: Vec<CastWork> = Vec::new();

    // Pass 1: advance timers; resource drains for channels happen here,
    // payload and completion handling is deferred so the cast table stays
    // stable.
    let skills = &mut *ctx.skills;
    for (entity, cast) in skills.active_casts.iter_mut() {
        let Some(skill) = ctx.book.get(cast.skill) else {
            work.push(CastWork::Cancel {
                entity: *entity,
                skill: cast.skill,
                reason: CombatError::NotFound("skill definition vanished".into()),
            });
            continue;
        };
        let alive = ctx
            .registry
            .lookup(*entity)
            .and_then(|e| combatants.get_mut(e).ok())
            .map(|(combatant, _)| combatant.is_alive());
        if alive != Some(true) {
            work.push(CastWork::Cancel {
                entity: *entity,
                skill: cast.skill,
                reason: CombatError::InvalidState("caster died".into()),
            });
            continue;
        }

        if cast.channeling {
            // Per-second drain; an unpayable tick ends the channel.
            let drain = skill.cost_per_second * dt;
            if drain > 0.0 {
                let paid = ctx
                    .registry
                    .lookup(*entity)
                    .and_then(|entity_ref| combatants.get_mut(entity_ref).ok())
                    .map_or(false, |(mut combatant, _)| {
                        combatant.consume_resource(skill.resource, drain)
                    });
                if !paid {
                    work.push(CastWork::Cancel {
                        entity: *entity,
                        skill: cast.skill,
                        reason: CombatError::InsufficientResource("channel starved".into()),
                    });
                    continue;
                }
            }
            cast.channel_remaining -= dt;
            if skill.tick_interval > 0.0 && now - cast.last_payload >= skill.tick_interval as f64 {
                cast.last_payload = now;
                work.push(CastWork::ChannelPayload {
                    entity: *entity,
                    skill: cast.skill,
                });
            }
            if cast.channel_remaining <= 0.0 {
                work.push(CastWork::ChannelEnd {
                    entity: *entity,
                    skill: cast.skill,
                    final_payload: skill.tick_interval <= 0.0,
                });
            }
        } else {
            let progress = if cast.cast_time > 0.0 {
                (((now - cast.started_at) as f32) / cast.cast_time).min(1.0)
            } else {
                1.0
            };
            if let Some(instance) = skills
                .known
                .get_mut(entity)
                .and_then(|known| known.get_mut(&cast.skill))
            {
                instance.cast_progress = progress;
            }
            if progress >= 1.0 {
                work.push(CastWork::Complete {
                    entity: *entity,
                    skill: cast.skill,
                });
            }
        }
    }

    // Cast table order is arbitrary; work applies in id order so replays
    // are stable. The sort is stable, preserving payload-before-end for
    // one entity.
    work.sort_by_key(CastWork::entity);

    // Pass 2: resolve the collected work.
    for item in work {
        match item {
            CastWork::Complete { entity, skill } => {
                let Some(cast) = ctx.skills.active_casts.remove(&entity) else {
                    continue;
                };
                ctx.skills
                    .with_instance(entity, skill, SkillInstance::reset_cast_flags);
                let Some(data) = ctx.book.get(skill).cloned() else {
                    continue;
                };
                // Resource is re-checked at completion; a starved caster
                // loses the cast but pays nothing.
                let Some(entity_ref) = ctx.registry.lookup(entity) else {
                    continue;
                };
                let paid = match combatants.get_mut(entity_ref) {
                    Ok((mut combatant, _)) => {
                        let paid = combatant.consume_resource(data.resource, data.cost);
                        if paid {
                            let cdr = combatant.snapshot.cooldown_reduction;
                            ctx.skills.commit_cooldown(entity, &data, cdr, now);
                        }
                        paid
                    }
                    Err(_) => false,
                };
                if !paid {
                    ctx.events.rejected.send(crate::sim::CommandRejected {
                        entity,
                        error: CombatError::InsufficientResource(format!(
                            "{} fizzled",
                            data.name
                        )),
                    });
                    continue;
                }
                let rank = ctx.skills.rank_of(entity, skill);
                crate::combat::manager::resolve_skill_payload(
                    &mut ctx,
                    &mut combatants,
                    entity,
                    &data,
                    rank,
                    cast.target,
                    cast.point,
                );
            }
            CastWork::ChannelPayload { entity, skill } => {
                let Some(data) = ctx.book.get(skill).cloned() else {
                    continue;
                };
                let (target, point) = match ctx.skills.active_casts.get(&entity) {
                    Some(cast) => (cast.target, cast.point),
                    None => continue,
                };
                let rank = ctx.skills.rank_of(entity, skill);
                crate::combat::manager::resolve_skill_payload(
                    &mut ctx,
                    &mut combatants,
                    entity,
                    &data,
                    rank,
                    target,
                    point,
                );
                // Update channel progress for observers.
                if let Some(cast) = ctx.skills.active_casts.get(&entity) {
                    let remaining = cast.channel_remaining;
                    if let Some(data) = ctx.book.get(skill) {
                        if data.channel_duration > 0.0 {
                            let progress = 1.0 - (remaining / data.channel_duration).max(0.0);
                            ctx.skills.with_instance(entity, skill, |instance| {
                                instance.channel_progress = progress;
                            });
                        }
                    }
                }
            }
            CastWork::ChannelEnd {
                entity,
                skill,
                final_payload,
            } => {
                let Some(cast) = ctx.skills.active_casts.remove(&entity) else {
                    continue;
                };
                ctx.skills
                    .with_instance(entity, skill, SkillInstance::reset_cast_flags);
                if final_payload {
                    if let Some(data) = ctx.book.get(skill).cloned() {
                        let rank = ctx.skills.rank_of(entity, skill);
                        crate::combat::manager::resolve_skill_payload(
                            &mut ctx,
                            &mut combatants,
                            entity,
                            &data,
                            rank,
                            cast.target,
                            cast.point,
                        );
                    }
                }
            }
            CastWork::Cancel {
                entity,
                skill,
                reason,
            } => {
                ctx.skills.active_casts.remove(&entity);
                ctx.skills
                    .with_instance(entity, skill, SkillInstance::reset_cast_flags);
                ctx.events
                    .rejected
                    .send(crate::sim::CommandRejected { entity, error: reason });
            }
        }
    }

    // Toggles: drain per second, off when the pool runs dry.
    let mut toggle_offs: Vec<(EntityId, SkillId)> = Vec::new();
    for (entity, toggles) in ctx.skills.toggles.iter() {
        for skill_id in toggles {
            let Some(skill) = ctx.book.get(*skill_id) else {
                continue;
            };
            let drain = skill.cost_per_second * dt;
            if drain <= 0.0 {
                continue;
            }
            let paid = ctx
                .registry
                .lookup(*entity)
                .and_then(|e| combatants.get_mut(e).ok())
                .map_or(false, |(mut combatant, _)| {
                    combatant.is_alive() && combatant.consume_resource(skill.resource, drain)
                });
            if !paid {
                toggle_offs.push((*entity, *skill_id));
            }
        }
    }
    toggle_offs.sort_unstable_by_key(|(entity, skill)| (*entity, *skill));
    for (entity, skill_id) in toggle_offs {
        ctx.skills.set_toggled(entity, skill_id, false);
        // The toggle's carried effects go out with it.
        if let Some(effects) = ctx.book.get(skill_id).map(|data| data.effects.clone()) {
            for effect in effects {
                for removed in ctx.status.remove(&ctx.effects, entity, effect, Some(entity)) {
                    ctx.events.effect_expired.send(crate::sim::EffectExpired {
                        target: entity,
                        effect: removed,
                    });
                }
            }
        }
        debug!("{entity} toggle {skill_id} shut off");
    }
}
