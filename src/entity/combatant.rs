//! The combat capability component.
//!
//! A `Combatant` carries everything the combat pipeline needs to resolve
//! an action against an entity: base stats as authored, the snapshot with
//! status-effect modifiers folded in, current health and primary
//! resource, and lifetime tallies for post-match reporting.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::combat::damage::DamageType;

use super::EntityId;

/// Primary resource pool flavor.
///
/// The pool mechanics (costs, per-second drains) are identical across
/// kinds; the kind exists so a skill whose cost names one resource cannot
/// be paid from another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResourceKind {
    #[default]
    Mana,
    Energy,
    Rage,
}

/// Stat names addressable by status-effect modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stat {
    MaxHealth,
    MaxResource,
    AttackPower,
    SpellPower,
    AttackSpeed,
    CritChance,
    CritMultiplier,
    Armor,
    MagicResist,
    DodgeChance,
    ParryChance,
    BlockChance,
    LifeSteal,
    CooldownReduction,
    MovementSpeed,
}

impl Stat {
    /// Every addressable stat, in snapshot-recompute order.
    pub const ALL: [Stat; 15] = [
        Stat::MaxHealth,
        Stat::MaxResource,
        Stat::AttackPower,
        Stat::SpellPower,
        Stat::AttackSpeed,
        Stat::CritChance,
        Stat::CritMultiplier,
        Stat::Armor,
        Stat::MagicResist,
        Stat::DodgeChance,
        Stat::ParryChance,
        Stat::BlockChance,
        Stat::LifeSteal,
        Stat::CooldownReduction,
        Stat::MovementSpeed,
    ];
}

/// A full combat stat block. Used both for authored base stats and for
/// the per-tick snapshot consumed by the damage calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatStats {
    pub max_health: f32,
    pub max_resource: f32,
    pub attack_power: f32,
    pub spell_power: f32,
    /// Attacks per second.
    pub attack_speed: f32,
    pub crit_chance: f32,
    pub crit_multiplier: f32,
    pub armor: f32,
    pub magic_resist: f32,
    pub dodge_chance: f32,
    pub parry_chance: f32,
    pub block_chance: f32,
    /// Damage-type specific resistances on top of armor / magic resist.
    #[serde(default)]
    pub resistances: HashMap<DamageType, f32>,
    /// Fraction of dealt auto-attack damage returned as healing.
    pub life_steal: f32,
    /// Fraction shaved off skill cooldowns.
    pub cooldown_reduction: f32,
    pub movement_speed: f32,
}

impl Default for CombatStats {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            max_resource: 100.0,
            attack_power: 10.0,
            spell_power: 10.0,
            attack_speed: 1.0,
            crit_chance: 0.05,
            crit_multiplier: 1.5,
            armor: 0.0,
            magic_resist: 0.0,
            dodge_chance: 0.05,
            parry_chance: 0.0,
            block_chance: 0.0,
            resistances: HashMap::new(),
            life_steal: 0.0,
            cooldown_reduction: 0.0,
            movement_speed: 100.0,
        }
    }
}

impl CombatStats {
    pub fn stat(&self, stat: Stat) -> f32 {
        match stat {
            Stat::MaxHealth => self.max_health,
            Stat::MaxResource => self.max_resource,
            Stat::AttackPower => self.attack_power,
            Stat::SpellPower => self.spell_power,
            Stat::AttackSpeed => self.attack_speed,
            Stat::CritChance => self.crit_chance,
            Stat::CritMultiplier => self.crit_multiplier,
            Stat::Armor => self.armor,
            Stat::MagicResist => self.magic_resist,
            Stat::DodgeChance => self.dodge_chance,
            Stat::ParryChance => self.parry_chance,
            Stat::BlockChance => self.block_chance,
            Stat::LifeSteal => self.life_steal,
            Stat::CooldownReduction => self.cooldown_reduction,
            Stat::MovementSpeed => self.movement_speed,
        }
    }

    pub fn set_stat(&mut self, stat: Stat, value: f32) {
        let slot = match stat {
            Stat::MaxHealth => &mut self.max_health,
            Stat::MaxResource => &mut self.max_resource,
            Stat::AttackPower => &mut self.attack_power,
            Stat::SpellPower => &mut self.spell_power,
            Stat::AttackSpeed => &mut self.attack_speed,
            Stat::CritChance => &mut self.crit_chance,
            Stat::CritMultiplier => &mut self.crit_multiplier,
            Stat::Armor => &mut self.armor,
            Stat::MagicResist => &mut self.magic_resist,
            Stat::DodgeChance => &mut self.dodge_chance,
            Stat::ParryChance => &mut self.parry_chance,
            Stat::BlockChance => &mut self.block_chance,
            Stat::LifeSteal => &mut self.life_steal,
            Stat::CooldownReduction => &mut self.cooldown_reduction,
            Stat::MovementSpeed => &mut self.movement_speed,
        };
        *slot = value;
    }

    pub fn resistance(&self, damage_type: DamageType) -> f32 {
        self.resistances.get(&damage_type).copied().unwrap_or(0.0)
    }
}

/// Result of applying damage to a combatant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageTaken {
    /// Health actually removed (capped at remaining health).
    pub actual: f32,
    /// True exactly once, on the application that dropped health to zero.
    pub died: bool,
}

/// Combat capability handle attached to every combat-participating
/// entity.
#[derive(Component, Debug, Clone)]
pub struct Combatant {
    pub id: EntityId,
    pub name: String,
    /// Stats as authored, before status-effect modifiers.
    pub base: CombatStats,
    /// Stats with modifiers folded in; recomputed when the status engine
    /// marks this entity dirty. Downstream consumers read this directly.
    pub snapshot: CombatStats,
    pub health: f32,
    pub resource: f32,
    pub resource_kind: ResourceKind,
    /// Cleared by stealth, phasing and similar world states.
    pub targetable: bool,
    alive: bool,
    pub damage_dealt: f32,
    pub damage_taken: f32,
    pub healing_done: f32,
}

impl Combatant {
    pub fn new(id: EntityId, name: impl Into<String>, base: CombatStats) -> Self {
        let snapshot = base.clone();
        let health = base.max_health;
        let resource = base.max_resource;
        Self {
            id,
            name: name.into(),
            base,
            snapshot,
            health,
            resource,
            resource_kind: ResourceKind::Mana,
            targetable: true,
            alive: true,
            damage_dealt: 0.0,
            damage_taken: 0.0,
            healing_done: 0.0,
        }
    }

    pub fn with_resource_kind(mut self, kind: ResourceKind) -> Self {
        self.resource_kind = kind;
        // Rage pools start empty and build in combat.
        if kind == ResourceKind::Rage {
            self.resource = 0.0;
        }
        self
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn can_be_targeted(&self) -> bool {
        self.alive && self.targetable
    }

    /// Remove health, clamping at zero. The `died` flag fires exactly
    /// once, on the application that crossed zero.
    pub fn take_damage(&mut self, amount: f32) -> DamageTaken {
        if !self.alive || amount <= 0.0 {
            return DamageTaken {
                actual: 0.0,
                died: false,
            };
        }
        let actual = amount.min(self.health);
        self.health -= actual;
        self.damage_taken += actual;
        let died = self.health <= 0.0;
        if died {
            self.health = 0.0;
            self.alive = false;
        }
        DamageTaken { actual, died }
    }

    /// Restore health up to the snapshot maximum. Dead entities cannot be
    /// healed. Returns the amount actually restored.
    pub fn heal(&mut self, amount: f32) -> f32 {
        if !self.alive || amount <= 0.0 {
            return 0.0;
        }
        let actual = amount.min(self.snapshot.max_health - self.health);
        self.health += actual;
        actual
    }

    pub fn has_resource(&self, kind: ResourceKind, amount: f32) -> bool {
        self.resource_kind == kind && self.resource >= amount
    }

    /// Pay a resource cost. Returns false (and deducts nothing) when the
    /// pool kind does not match or the balance is short.
    pub fn consume_resource(&mut self, kind: ResourceKind, amount: f32) -> bool {
        if !self.has_resource(kind, amount) {
            return false;
        }
        self.resource -= amount;
        true
    }

    /// Refund or generate resource, clamped to the snapshot maximum.
    pub fn restore_resource(&mut self, kind: ResourceKind, amount: f32) {
        if self.resource_kind != kind || amount <= 0.0 {
            return;
        }
        self.resource = (self.resource + amount).min(self.snapshot.max_resource);
    }

    /// Clamp health and resource into the current snapshot bounds. Called
    /// after a snapshot recompute shrinks a maximum.
    pub fn clamp_pools(&mut self) {
        self.health = self.health.min(self.snapshot.max_health);
        self.resource = self.resource.min(self.snapshot.max_resource);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn death_fires_exactly_once() {
        let mut c = Combatant::new(EntityId::new(1), "dummy", CombatStats::default());
        let first = c.take_damage(250.0);
        assert_eq!(first.actual, 100.0);
        assert!(first.died);
        let second = c.take_damage(10.0);
        assert_eq!(second.actual, 0.0);
        assert!(!second.died);
        assert!(!c.is_alive());
    }

    #[test]
    fn heal_respects_max_and_death() {
        let mut c = Combatant::new(EntityId::new(1), "dummy", CombatStats::default());
        c.take_damage(40.0);
        assert_eq!(c.heal(100.0), 40.0);
        c.take_damage(1000.0);
        assert_eq!(c.heal(50.0), 0.0);
    }

    #[test]
    fn resource_kind_must_match() {
        let mut c = Combatant::new(EntityId::new(1), "dummy", CombatStats::default())
            .with_resource_kind(ResourceKind::Energy);
        c.restore_resource(ResourceKind::Energy, 100.0);
        assert!(!c.consume_resource(ResourceKind::Mana, 10.0));
        assert!(c.consume_resource(ResourceKind::Energy, 10.0));
    }
}
