//! Unit tests for the damage calculator.
//!
//! These tests verify that:
//! - Outcome damage fractions match the design values (block 50%,
//!   parry 25%, crit × multiplier)
//! - The mitigation pipeline orders offensive scaling, armor/resist and
//!   elemental resistance correctly
//! - True damage ignores every mitigation layer
//! - Connecting hits never drop below the damage floor

use rand::rngs::StdRng;
use rand::SeedableRng;

use realmsim::combat::damage::{
    calculate, resolve_damage, roll_outcome, CombatOutcome, DamageType,
};
use realmsim::entity::{CombatStats, EntityId};

/// A stat block with every offensive and defensive knob zeroed, so each
/// test enables exactly what it measures.
fn neutral_stats() -> CombatStats {
    CombatStats {
        attack_power: 0.0,
        spell_power: 0.0,
        crit_chance: 0.0,
        crit_multiplier: 1.5,
        armor: 0.0,
        magic_resist: 0.0,
        dodge_chance: 0.0,
        parry_chance: 0.0,
        block_chance: 0.0,
        ..Default::default()
    }
}

#[test]
fn plain_physical_hit_is_unmodified() {
    let attacker = neutral_stats();
    let target = neutral_stats();
    let final_damage = resolve_damage(
        &attacker,
        &target,
        100.0,
        DamageType::Physical,
        CombatOutcome::Hit,
    );
    assert_eq!(final_damage, 100.0);
}

#[test]
fn armor_at_one_hundred_halves_physical_damage() {
    let attacker = neutral_stats();
    let mut target = neutral_stats();
    target.armor = 100.0;
    let final_damage = resolve_damage(
        &attacker,
        &target,
        100.0,
        DamageType::Physical,
        CombatOutcome::Hit,
    );
    assert_eq!(final_damage, 50.0);
}

#[test]
fn critical_hit_applies_the_multiplier() {
    let mut attacker = neutral_stats();
    attacker.crit_multiplier = 2.0;
    let target = neutral_stats();
    let final_damage = resolve_damage(
        &attacker,
        &target,
        80.0,
        DamageType::Physical,
        CombatOutcome::Critical,
    );
    assert_eq!(final_damage, 160.0);
}

#[test]
fn block_and_parry_reduce_base_damage() {
    let attacker = neutral_stats();
    let target = neutral_stats();
    let blocked = resolve_damage(
        &attacker,
        &target,
        100.0,
        DamageType::Physical,
        CombatOutcome::Block,
    );
    let parried = resolve_damage(
        &attacker,
        &target,
        100.0,
        DamageType::Physical,
        CombatOutcome::Parry,
    );
    assert_eq!(blocked, 50.0);
    assert_eq!(parried, 25.0);
}

#[test]
fn avoidance_outcomes_deal_zero() {
    let attacker = neutral_stats();
    let target = neutral_stats();
    for outcome in [
        CombatOutcome::Miss,
        CombatOutcome::Dodge,
        CombatOutcome::Immune,
    ] {
        let final_damage =
            resolve_damage(&attacker, &target, 500.0, DamageType::Physical, outcome);
        assert_eq!(final_damage, 0.0, "{outcome:?} should deal nothing");
    }
}

#[test]
fn attack_power_scales_physical_damage() {
    let mut attacker = neutral_stats();
    attacker.attack_power = 50.0;
    let target = neutral_stats();
    let final_damage = resolve_damage(
        &attacker,
        &target,
        100.0,
        DamageType::Physical,
        CombatOutcome::Hit,
    );
    assert_eq!(final_damage, 150.0);
}

#[test]
fn spell_power_scales_magical_damage() {
    let mut attacker = neutral_stats();
    attacker.spell_power = 100.0;
    let target = neutral_stats();
    let final_damage = resolve_damage(
        &attacker,
        &target,
        40.0,
        DamageType::Magical,
        CombatOutcome::Hit,
    );
    assert_eq!(final_damage, 80.0);
}

#[test]
fn elemental_resistance_stacks_after_magic_resist() {
    let attacker = neutral_stats();
    let mut target = neutral_stats();
    // 150 fire resistance halves fire damage (150 / (150 + 150)).
    target.resistances.insert(DamageType::Fire, 150.0);
    let final_damage = resolve_damage(
        &attacker,
        &target,
        100.0,
        DamageType::Fire,
        CombatOutcome::Hit,
    );
    assert_eq!(final_damage, 50.0);
}

#[test]
fn armor_is_monotone_in_mitigation() {
    let attacker = neutral_stats();
    let mut previous = f32::MAX;
    for armor in [0.0, 10.0, 50.0, 100.0, 500.0, 5000.0] {
        let mut target = neutral_stats();
        target.armor = armor;
        let final_damage = resolve_damage(
            &attacker,
            &target,
            200.0,
            DamageType::Physical,
            CombatOutcome::Hit,
        );
        assert!(
            final_damage <= previous,
            "raising armor to {armor} increased damage"
        );
        previous = final_damage;
    }
}

#[test]
fn true_damage_ignores_all_mitigation() {
    let mut attacker = neutral_stats();
    attacker.attack_power = 500.0;
    attacker.spell_power = 500.0;
    let mut fortified = neutral_stats();
    fortified.armor = 10_000.0;
    fortified.magic_resist = 10_000.0;
    fortified.resistances.insert(DamageType::True, 10_000.0);
    let unarmored = neutral_stats();

    let through_armor = resolve_damage(
        &attacker,
        &fortified,
        75.0,
        DamageType::True,
        CombatOutcome::Hit,
    );
    let through_nothing = resolve_damage(
        &attacker,
        &unarmored,
        75.0,
        DamageType::True,
        CombatOutcome::Hit,
    );
    assert_eq!(through_armor, 75.0);
    assert_eq!(through_armor, through_nothing);
}

#[test]
fn connecting_hits_respect_the_damage_floor() {
    let attacker = neutral_stats();
    let mut target = neutral_stats();
    target.armor = 1_000_000.0;
    for outcome in [
        CombatOutcome::Hit,
        CombatOutcome::Critical,
        CombatOutcome::Block,
        CombatOutcome::Parry,
    ] {
        let final_damage =
            resolve_damage(&attacker, &target, 100.0, DamageType::Physical, outcome);
        assert!(
            final_damage >= 1.0,
            "{outcome:?} fell below the floor: {final_damage}"
        );
    }
}

#[test]
fn skills_cannot_be_dodged_or_parried() {
    let attacker = neutral_stats();
    let mut target = neutral_stats();
    target.dodge_chance = 1.0;
    target.parry_chance = 1.0;
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..32 {
        let outcome = roll_outcome(&attacker, &target, true, &mut rng);
        assert!(
            !matches!(outcome, CombatOutcome::Dodge | CombatOutcome::Parry),
            "skill resolution produced {outcome:?}"
        );
    }
    // The same target dodges every auto-attack.
    let outcome = roll_outcome(&attacker, &target, false, &mut rng);
    assert_eq!(outcome, CombatOutcome::Dodge);
}

#[test]
fn outcome_priority_prefers_dodge_over_crit() {
    let mut attacker = neutral_stats();
    attacker.crit_chance = 1.0;
    let mut target = neutral_stats();
    target.dodge_chance = 1.0;
    let mut rng = StdRng::seed_from_u64(1);
    assert_eq!(
        roll_outcome(&attacker, &target, false, &mut rng),
        CombatOutcome::Dodge
    );
}

#[test]
fn calculate_fills_the_record_without_mutating_snapshots() {
    let attacker_stats = neutral_stats();
    let target_stats = neutral_stats();
    let attacker_before = attacker_stats.clone();
    let target_before = target_stats.clone();
    let mut rng = StdRng::seed_from_u64(99);
    let record = calculate(
        EntityId::new(1),
        EntityId::new(2),
        &attacker_stats,
        &target_stats,
        42.0,
        DamageType::Physical,
        false,
        None,
        12.5,
        &mut rng,
    );
    assert_eq!(record.attacker, EntityId::new(1));
    assert_eq!(record.target, EntityId::new(2));
    assert_eq!(record.base_damage, 42.0);
    assert_eq!(record.outcome, CombatOutcome::Hit);
    assert_eq!(record.final_damage, 42.0);
    assert_eq!(record.timestamp, 12.5);
    assert!(!record.is_skill);
    assert_eq!(attacker_stats, attacker_before);
    assert_eq!(target_stats, target_before);
}

#[test]
fn identical_seeds_produce_identical_outcome_streams() {
    let mut attacker = neutral_stats();
    attacker.crit_chance = 0.3;
    let mut target = neutral_stats();
    target.dodge_chance = 0.2;
    target.block_chance = 0.2;
    let mut first = StdRng::seed_from_u64(1234);
    let mut second = StdRng::seed_from_u64(1234);
    for _ in 0..64 {
        assert_eq!(
            roll_outcome(&attacker, &target, false, &mut first),
            roll_outcome(&attacker, &target, false, &mut second)
        );
    }
}
