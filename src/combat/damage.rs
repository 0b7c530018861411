//! Damage calculation.
//!
//! The calculator is a pure pipeline: given two stat snapshots, a base
//! amount, a damage type and a resolved outcome, the final number is
//! fully determined. All stat mutation happens downstream, after the
//! record has been published, which keeps replay and server-side
//! recomputation trivial.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::entity::{CombatStats, EntityId};
use crate::skill::SkillId;
use crate::status::EffectId;

/// Armor reduction denominator: 100 armor halves physical damage.
pub const ARMOR_DENOMINATOR: f32 = 100.0;
/// Elemental resistance denominator.
pub const RESIST_DENOMINATOR: f32 = 150.0;
/// Fraction of base damage that lands through a block.
pub const BLOCK_DAMAGE_FRACTION: f32 = 0.5;
/// Fraction of base damage that lands through a parry.
pub const PARRY_DAMAGE_FRACTION: f32 = 0.25;
/// Any connecting hit deals at least this much.
pub const MINIMUM_DAMAGE: f32 = 1.0;

/// Classification of a damage packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageType {
    Physical,
    Magical,
    /// Bypasses every mitigation layer.
    True,
    Fire,
    Frost,
    Nature,
    Shadow,
    Holy,
}

impl DamageType {
    /// Physical packets scale with attack power and are reduced by armor.
    pub fn is_physical(self) -> bool {
        self == DamageType::Physical
    }

    /// Everything that is not physical or true scales with spell power
    /// and is reduced by magic resist.
    pub fn is_magical(self) -> bool {
        !matches!(self, DamageType::Physical | DamageType::True)
    }
}

/// How an attack resolved against the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatOutcome {
    Hit,
    Critical,
    Miss,
    Dodge,
    Block,
    Parry,
    Resist,
    Immune,
    Absorb,
}

impl CombatOutcome {
    /// Outcomes that put any damage on the target at all.
    pub fn connects(self) -> bool {
        !matches!(
            self,
            CombatOutcome::Miss | CombatOutcome::Dodge | CombatOutcome::Immune
        )
    }
}

/// The authoritative result of one damage resolution, written to both
/// participants' combat logs and broadcast downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct DamageRecord {
    pub attacker: EntityId,
    pub target: EntityId,
    pub damage_type: DamageType,
    pub base_damage: f32,
    pub final_damage: f32,
    pub outcome: CombatOutcome,
    pub is_skill: bool,
    pub skill: Option<SkillId>,
    /// Simulation time at resolution.
    pub timestamp: f64,
    /// Status effects applied as part of the same resolution.
    pub applied_effects: SmallVec<[EffectId; 4]>,
}

/// Roll the resolution outcome on the attacker's random stream.
///
/// Checks short-circuit in priority order. Skills cannot be dodged or
/// parried. MISS, RESIST, IMMUNE and ABSORB are reserved for
/// effect-driven paths and never come out of this roll.
pub fn roll_outcome(
    attacker: &CombatStats,
    target: &CombatStats,
    is_skill: bool,
    rng: &mut StdRng,
) -> CombatOutcome {
    if !is_skill && roll(rng, target.dodge_chance) {
        return CombatOutcome::Dodge;
    }
    if !is_skill && roll(rng, target.parry_chance) {
        return CombatOutcome::Parry;
    }
    if roll(rng, target.block_chance) {
        return CombatOutcome::Block;
    }
    if roll(rng, attacker.crit_chance) {
        return CombatOutcome::Critical;
    }
    CombatOutcome::Hit
}

fn roll(rng: &mut StdRng, chance: f32) -> bool {
    chance > 0.0 && rng.gen::<f32>() < chance
}

/// Resolve final damage for a known outcome. Pure: given the same
/// snapshots and outcome, the result is identical.
pub fn resolve_damage(
    attacker: &CombatStats,
    target: &CombatStats,
    base_damage: f32,
    damage_type: DamageType,
    outcome: CombatOutcome,
) -> f32 {
    let pre_mitigation = match outcome {
        CombatOutcome::Miss | CombatOutcome::Dodge | CombatOutcome::Immune => 0.0,
        CombatOutcome::Block => base_damage * BLOCK_DAMAGE_FRACTION,
        CombatOutcome::Parry => base_damage * PARRY_DAMAGE_FRACTION,
        CombatOutcome::Critical => base_damage * attacker.crit_multiplier,
        CombatOutcome::Hit | CombatOutcome::Resist | CombatOutcome::Absorb => base_damage,
    };
    if pre_mitigation <= 0.0 {
        return 0.0;
    }
    apply_damage_modifiers(pre_mitigation, attacker, target, damage_type)
}

/// The mitigation pipeline: offensive scaling, defense reduction,
/// elemental resistance, then the floor of 1.
fn apply_damage_modifiers(
    base: f32,
    attacker: &CombatStats,
    target: &CombatStats,
    damage_type: DamageType,
) -> f32 {
    let mut damage = base;

    if damage_type.is_physical() {
        damage *= 1.0 + attacker.attack_power / 100.0;
    } else if damage_type.is_magical() {
        damage *= 1.0 + attacker.spell_power / 100.0;
    } else {
        // True damage: offensive scaling and every mitigation layer are
        // skipped, only the floor applies.
        return damage.max(MINIMUM_DAMAGE);
    }

    let defense = if damage_type.is_physical() {
        target.armor
    } else {
        target.magic_resist
    };
    damage *= 1.0 - defense / (defense + ARMOR_DENOMINATOR);

    let resistance = target.resistance(damage_type);
    if resistance > 0.0 {
        damage *= 1.0 - resistance / (resistance + RESIST_DENOMINATOR);
    }

    damage.max(MINIMUM_DAMAGE)
}

/// Roll and resolve in one step, producing the full record. Neither
/// snapshot is mutated.
#[allow(clippy::too_many_arguments)]
pub fn calculate(
    attacker_id: EntityId,
    target_id: EntityId,
    attacker: &CombatStats,
    target: &CombatStats,
    base_damage: f32,
    damage_type: DamageType,
    is_skill: bool,
    skill: Option<SkillId>,
    timestamp: f64,
    rng: &mut StdRng,
) -> DamageRecord {
    let outcome = roll_outcome(attacker, target, is_skill, rng);
    let final_damage = resolve_damage(attacker, target, base_damage, damage_type, outcome);
    DamageRecord {
        attacker: attacker_id,
        target: target_id,
        damage_type,
        base_damage,
        final_damage,
        outcome,
        is_skill,
        skill,
        timestamp,
        applied_effects: SmallVec::new(),
    }
}

/// A record for damage that originates from a status effect tick rather
/// than a rolled attack.
pub fn periodic_record(
    attacker: EntityId,
    target: EntityId,
    damage_type: DamageType,
    amount: f32,
    timestamp: f64,
) -> DamageRecord {
    DamageRecord {
        attacker,
        target,
        damage_type,
        base_damage: amount,
        final_damage: amount,
        outcome: CombatOutcome::Hit,
        is_skill: false,
        skill: None,
        timestamp,
        applied_effects: SmallVec::new(),
    }
}
