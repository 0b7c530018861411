//! Unit tests for the skill engine.
//!
//! These tests verify that:
//! - start_cast checks its preconditions in order and mutates nothing
//!   on failure
//! - Cooldowns, the global cooldown and cooldown reduction behave
//! - Casting and channeling are mutually exclusive
//! - Interrupt flags gate cast cancellation
//! - Toggles pay their activation cost and flip cleanly

use realmsim::entity::{CombatStats, Combatant, EntityId, ResourceKind};
use realmsim::error::CombatError;
use realmsim::sim::spatial::GroundPoint;
use realmsim::sim::SimClock;
use realmsim::skill::{
    CastAction, InterruptKind, SkillBook, SkillCategory, SkillData, SkillId, SkillState,
    TargetRequirement, TargetView,
};
use realmsim::status::ControlFlags;

const STRIKE: SkillId = SkillId(1);
const BOLT: SkillId = SkillId(2);
const STANCE: SkillId = SkillId(3);

fn instant_strike() -> SkillData {
    SkillData {
        id: STRIKE,
        name: "Strike".to_string(),
        category: SkillCategory::Instant,
        target: TargetRequirement::Enemy,
        shape: realmsim::sim::TargetShape::Single,
        range: 10.0,
        resource: ResourceKind::Mana,
        cost: 10.0,
        cost_per_second: 0.0,
        cast_time: 0.0,
        channel_duration: 0.0,
        tick_interval: 0.0,
        cooldown: 5.0,
        global_cooldown: 1.0,
        base_damage: 20.0,
        damage_per_rank: 5.0,
        damage_type: realmsim::combat::DamageType::Physical,
        ap_coefficient: 0.0,
        sp_coefficient: 0.0,
        base_healing: 0.0,
        healing_per_rank: 0.0,
        healing_coefficient: 0.0,
        max_rank: 3,
        interrupted_by: vec![],
        effects: vec![],
    }
}

fn casted_bolt() -> SkillData {
    SkillData {
        id: BOLT,
        name: "Bolt".to_string(),
        category: SkillCategory::CastTime,
        cast_time: 2.0,
        cooldown: 0.0,
        cost: 20.0,
        damage_type: realmsim::combat::DamageType::Magical,
        base_damage: 30.0,
        interrupted_by: vec![InterruptKind::Damage, InterruptKind::Manual],
        ..instant_strike()
    }
}

fn stance_toggle() -> SkillData {
    SkillData {
        id: STANCE,
        name: "Stance".to_string(),
        category: SkillCategory::Toggle,
        target: TargetRequirement::SelfOnly,
        cost: 5.0,
        cost_per_second: 2.0,
        cooldown: 0.0,
        base_damage: 0.0,
        ..instant_strike()
    }
}

fn book() -> SkillBook {
    let mut book = SkillBook::default();
    book.register(instant_strike());
    book.register(casted_bolt());
    book.register(stance_toggle());
    book
}

fn caster() -> Combatant {
    Combatant::new(EntityId::new(1), "caster", CombatStats::default())
}

fn enemy_view() -> TargetView {
    TargetView {
        id: EntityId::new(2),
        alive: true,
        targetable: true,
        hostile: true,
        allied: false,
        position: GroundPoint::new(3.0, 0.0),
    }
}

fn clock_at(seconds: f32) -> SimClock {
    let mut clock = SimClock::default();
    clock.advance(seconds);
    clock
}

fn learned_state(book: &SkillBook, caster: EntityId) -> SkillState {
    let mut skills = SkillState::default();
    skills.learn_skill(book, caster, STRIKE).unwrap();
    skills.learn_skill(book, caster, BOLT).unwrap();
    skills.learn_skill(book, caster, STANCE).unwrap();
    skills
}

#[test]
fn learning_and_ranks() {
    let book = book();
    let mut skills = SkillState::default();
    let entity = EntityId::new(1);
    assert!(!skills.has_skill(entity, STRIKE));
    skills.learn_skill(&book, entity, STRIKE).unwrap();
    assert!(skills.has_skill(entity, STRIKE));
    assert_eq!(skills.rank_of(entity, STRIKE), 1);
    // Double-learning is an error; upgrading raises the rank to max.
    assert!(skills.learn_skill(&book, entity, STRIKE).is_err());
    assert_eq!(skills.upgrade_skill(&book, entity, STRIKE).unwrap(), 2);
    assert_eq!(skills.upgrade_skill(&book, entity, STRIKE).unwrap(), 3);
    assert!(skills.upgrade_skill(&book, entity, STRIKE).is_err());
}

#[test]
fn unknown_and_unlearned_skills_fail_first() {
    let book = book();
    let mut skills = SkillState::default();
    let mut caster = caster();
    let clock = clock_at(0.0);
    let result = skills.start_cast(
        &book,
        &clock,
        &mut caster,
        GroundPoint::default(),
        ControlFlags::EMPTY,
        SkillId(999),
        Some(&enemy_view()),
        None,
    );
    assert!(matches!(result, Err(CombatError::NotFound(_))));

    let result = skills.start_cast(
        &book,
        &clock,
        &mut caster,
        GroundPoint::default(),
        ControlFlags::EMPTY,
        STRIKE,
        Some(&enemy_view()),
        None,
    );
    assert!(matches!(result, Err(CombatError::InvalidState(_))));
}

#[test]
fn cooldown_gates_and_expires() {
    let book = book();
    let mut caster = caster();
    let mut skills = learned_state(&book, caster.id);

    let clock = clock_at(0.0);
    let action = skills
        .start_cast(
            &book,
            &clock,
            &mut caster,
            GroundPoint::default(),
            ControlFlags::EMPTY,
            STRIKE,
            Some(&enemy_view()),
            None,
        )
        .unwrap();
    assert_eq!(action, CastAction::ResolveNow);
    assert!(skills.is_on_cooldown(caster.id, STRIKE, 2.0));

    let clock = clock_at(2.0);
    let result = skills.start_cast(
        &book,
        &clock,
        &mut caster,
        GroundPoint::default(),
        ControlFlags::EMPTY,
        STRIKE,
        Some(&enemy_view()),
        None,
    );
    assert!(matches!(result, Err(CombatError::OnCooldown(_))));
    assert!(skills.cooldown_remaining(caster.id, STRIKE, 2.0) > 2.9);

    // Just past the cooldown the cast succeeds again.
    assert!(!skills.is_on_cooldown(caster.id, STRIKE, 5.01));
    let clock = clock_at(5.01);
    skills
        .start_cast(
            &book,
            &clock,
            &mut caster,
            GroundPoint::default(),
            ControlFlags::EMPTY,
            STRIKE,
            Some(&enemy_view()),
            None,
        )
        .unwrap();
}

#[test]
fn cooldown_reduction_shortens_the_cooldown() {
    let book = book();
    let mut caster = caster();
    caster.base.cooldown_reduction = 0.5;
    caster.snapshot.cooldown_reduction = 0.5;
    let mut skills = learned_state(&book, caster.id);
    let clock = clock_at(0.0);
    skills
        .start_cast(
            &book,
            &clock,
            &mut caster,
            GroundPoint::default(),
            ControlFlags::EMPTY,
            STRIKE,
            Some(&enemy_view()),
            None,
        )
        .unwrap();
    // 5s cooldown halves to 2.5s.
    assert!(skills.is_on_cooldown(caster.id, STRIKE, 2.4));
    assert!(!skills.is_on_cooldown(caster.id, STRIKE, 2.6));
}

#[test]
fn failed_preconditions_leave_no_trace() {
    let book = book();
    let mut caster = caster();
    caster.resource = 5.0; // below the 10 cost
    let mut skills = learned_state(&book, caster.id);
    let clock = clock_at(0.0);
    let result = skills.start_cast(
        &book,
        &clock,
        &mut caster,
        GroundPoint::default(),
        ControlFlags::EMPTY,
        STRIKE,
        Some(&enemy_view()),
        None,
    );
    assert!(matches!(result, Err(CombatError::InsufficientResource(_))));
    assert_eq!(caster.resource, 5.0);
    assert!(!skills.is_on_cooldown(caster.id, STRIKE, 0.0));
    assert!(!skills.gcd_active(caster.id, 0.0));
    assert!(skills.active_cast(caster.id).is_none());
}

#[test]
fn instant_cast_pays_resource_and_starts_gcd() {
    let book = book();
    let mut caster = caster();
    let mut skills = learned_state(&book, caster.id);
    let clock = clock_at(0.0);
    skills
        .start_cast(
            &book,
            &clock,
            &mut caster,
            GroundPoint::default(),
            ControlFlags::EMPTY,
            STRIKE,
            Some(&enemy_view()),
            None,
        )
        .unwrap();
    assert_eq!(caster.resource, 90.0);
    assert!(skills.gcd_active(caster.id, 0.5));

    // A different skill is blocked by the global cooldown.
    let clock = clock_at(0.5);
    let result = skills.start_cast(
        &book,
        &clock,
        &mut caster,
        GroundPoint::default(),
        ControlFlags::EMPTY,
        BOLT,
        Some(&enemy_view()),
        None,
    );
    assert!(matches!(result, Err(CombatError::OnCooldown(_))));
    assert!(!skills.gcd_active(caster.id, 1.01));
}

#[test]
fn casting_excludes_a_second_cast() {
    let book = book();
    let mut caster = caster();
    let mut skills = learned_state(&book, caster.id);
    let clock = clock_at(0.0);
    skills
        .start_cast(
            &book,
            &clock,
            &mut caster,
            GroundPoint::default(),
            ControlFlags::EMPTY,
            BOLT,
            Some(&enemy_view()),
            None,
        )
        .unwrap();
    assert!(skills.is_casting(caster.id));
    assert!(!skills.is_channeling(caster.id));

    // Resource is only committed at completion.
    assert_eq!(caster.resource, 100.0);

    let clock = clock_at(1.5);
    let result = skills.start_cast(
        &book,
        &clock,
        &mut caster,
        GroundPoint::default(),
        ControlFlags::EMPTY,
        STRIKE,
        Some(&enemy_view()),
        None,
    );
    assert!(matches!(result, Err(CombatError::InvalidState(_))));
}

#[test]
fn interrupt_respects_the_skill_mask() {
    let book = book();
    let mut caster = caster();
    let mut skills = learned_state(&book, caster.id);
    let clock = clock_at(0.0);
    skills
        .start_cast(
            &book,
            &clock,
            &mut caster,
            GroundPoint::default(),
            ControlFlags::EMPTY,
            BOLT,
            Some(&enemy_view()),
            None,
        )
        .unwrap();

    // Bolt is not movement-interruptible.
    assert_eq!(
        skills.interrupt(&book, caster.id, InterruptKind::Movement.flag()),
        None
    );
    assert!(skills.is_casting(caster.id));

    // Damage breaks it.
    assert_eq!(
        skills.interrupt(&book, caster.id, InterruptKind::Damage.flag()),
        Some(BOLT)
    );
    assert!(!skills.is_casting(caster.id));
    assert!(skills.active_cast(caster.id).is_none());
}

#[test]
fn cancel_cast_requires_an_active_cast() {
    let book = book();
    let mut caster = caster();
    let mut skills = learned_state(&book, caster.id);
    assert!(matches!(
        skills.cancel_cast(caster.id),
        Err(CombatError::InvalidState(_))
    ));
    let clock = clock_at(0.0);
    skills
        .start_cast(
            &book,
            &clock,
            &mut caster,
            GroundPoint::default(),
            ControlFlags::EMPTY,
            BOLT,
            Some(&enemy_view()),
            None,
        )
        .unwrap();
    assert_eq!(skills.cancel_cast(caster.id).unwrap(), BOLT);
}

#[test]
fn control_flags_gate_casts_by_school() {
    let book = book();
    let mut caster = caster();
    let mut skills = learned_state(&book, caster.id);
    let clock = clock_at(0.0);

    let stunned = ControlFlags::from_kinds(&[realmsim::status::ControlKind::Stun]);
    let silenced = ControlFlags::from_kinds(&[realmsim::status::ControlKind::Silence]);
    let disarmed = ControlFlags::from_kinds(&[realmsim::status::ControlKind::Disarm]);

    // Stun blocks everything.
    assert!(skills
        .start_cast(
            &book,
            &clock,
            &mut caster,
            GroundPoint::default(),
            stunned,
            STRIKE,
            Some(&enemy_view()),
            None,
        )
        .is_err());

    // Silence blocks the magical bolt but not the physical strike.
    assert!(skills
        .start_cast(
            &book,
            &clock,
            &mut caster,
            GroundPoint::default(),
            silenced,
            BOLT,
            Some(&enemy_view()),
            None,
        )
        .is_err());
    assert!(skills
        .start_cast(
            &book,
            &clock,
            &mut caster,
            GroundPoint::default(),
            silenced,
            STRIKE,
            Some(&enemy_view()),
            None,
        )
        .is_ok());

    // Disarm blocks physical skills.
    let mut fresh = learned_state(&book, caster.id);
    let mut caster2 = caster;
    caster2.resource = 100.0;
    assert!(fresh
        .start_cast(
            &book,
            &clock,
            &mut caster2,
            GroundPoint::default(),
            disarmed,
            STRIKE,
            Some(&enemy_view()),
            None,
        )
        .is_err());
}

#[test]
fn target_requirements_are_enforced() {
    let book = book();
    let mut caster = caster();
    let mut skills = learned_state(&book, caster.id);
    let clock = clock_at(0.0);

    // Missing target.
    assert!(matches!(
        skills.start_cast(
            &book,
            &clock,
            &mut caster,
            GroundPoint::default(),
            ControlFlags::EMPTY,
            STRIKE,
            None,
            None,
        ),
        Err(CombatError::InvalidTarget(_))
    ));

    // Friendly target for a hostile skill.
    let mut friendly = enemy_view();
    friendly.hostile = false;
    friendly.allied = true;
    assert!(matches!(
        skills.start_cast(
            &book,
            &clock,
            &mut caster,
            GroundPoint::default(),
            ControlFlags::EMPTY,
            STRIKE,
            Some(&friendly),
            None,
        ),
        Err(CombatError::InvalidTarget(_))
    ));

    // Out of range.
    let mut distant = enemy_view();
    distant.position = GroundPoint::new(50.0, 0.0);
    assert!(matches!(
        skills.start_cast(
            &book,
            &clock,
            &mut caster,
            GroundPoint::default(),
            ControlFlags::EMPTY,
            STRIKE,
            Some(&distant),
            None,
        ),
        Err(CombatError::InvalidTarget(_))
    ));
}

#[test]
fn toggles_pay_activation_and_flip() {
    let book = book();
    let mut caster = caster();
    let mut skills = learned_state(&book, caster.id);

    let action = skills.toggle(&book, &mut caster, STANCE).unwrap();
    assert_eq!(action, CastAction::ToggledOn);
    assert!(skills.is_toggled(caster.id, STANCE));
    assert_eq!(caster.resource, 95.0);

    let action = skills.toggle(&book, &mut caster, STANCE).unwrap();
    assert_eq!(action, CastAction::ToggledOff);
    assert!(!skills.is_toggled(caster.id, STANCE));
    // Turning off costs nothing.
    assert_eq!(caster.resource, 95.0);
}

#[test]
fn reset_cooldown_clears_one_or_all() {
    let book = book();
    let mut caster = caster();
    let mut skills = learned_state(&book, caster.id);
    let clock = clock_at(0.0);
    skills
        .start_cast(
            &book,
            &clock,
            &mut caster,
            GroundPoint::default(),
            ControlFlags::EMPTY,
            STRIKE,
            Some(&enemy_view()),
            None,
        )
        .unwrap();
    assert!(skills.is_on_cooldown(caster.id, STRIKE, 1.0));
    skills.reset_cooldown(caster.id, Some(STRIKE));
    assert!(!skills.is_on_cooldown(caster.id, STRIKE, 1.0));
    assert!(!skills.gcd_active(caster.id, 0.5));
}

#[test]
fn unregistering_drops_all_rows() {
    let book = book();
    let mut caster = caster();
    let mut skills = learned_state(&book, caster.id);
    let clock = clock_at(0.0);
    skills
        .start_cast(
            &book,
            &clock,
            &mut caster,
            GroundPoint::default(),
            ControlFlags::EMPTY,
            BOLT,
            Some(&enemy_view()),
            None,
        )
        .unwrap();
    assert!(skills.has_rows(caster.id));
    skills.remove_entity(caster.id);
    assert!(!skills.has_rows(caster.id));
    assert!(!skills.has_skill(caster.id, STRIKE));
}
