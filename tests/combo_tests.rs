//! Unit tests for the combo controller and trie.
//!
//! These tests verify that:
//! - Valid sequences inside their timing windows complete
//! - Late or invalid inputs cancel the chain
//! - The idle-timeout sweep returns stale chains to idle
//! - Interruption is terminal until the next input
//! - Hit registration and damage multipliers track the live chain

use realmsim::combo::{
    load_combo_library, ComboDefinition, ComboId, ComboInput, ComboLibrary, ComboState,
    ComboStates, InputResult,
};
use realmsim::entity::EntityId;
use realmsim::status::EffectId;

const TRIPLE_STRIKE: ComboId = ComboId(1);
const GUARD_BREAKER: ComboId = ComboId(2);

fn library() -> ComboLibrary {
    load_combo_library().expect("default combo config must parse")
}

fn fighter() -> EntityId {
    EntityId::new(7)
}

#[test]
fn triple_strike_completes_within_windows() {
    let library = library();
    let mut combos = ComboStates::default();
    assert_eq!(
        combos.process_input(&library, fighter(), ComboInput::LightAttack, 0.0),
        InputResult::Advanced
    );
    assert_eq!(
        combos.process_input(&library, fighter(), ComboInput::LightAttack, 0.3),
        InputResult::Advanced
    );
    match combos.process_input(&library, fighter(), ComboInput::HeavyAttack, 0.7) {
        InputResult::Finished {
            combo,
            bonus_effect,
            ..
        } => {
            assert_eq!(combo, TRIPLE_STRIKE);
            assert_eq!(bonus_effect, Some(EffectId(6002)));
        }
        other => panic!("expected completion, got {other:?}"),
    }
    assert_eq!(combos.state(fighter()), ComboState::Idle);
    assert_eq!(combos.statistics().executions(TRIPLE_STRIKE), 1);
}

#[test]
fn missing_prefix_cancels_immediately() {
    let library = library();
    let mut combos = ComboStates::default();
    // No chain starts with a heavy attack.
    assert_eq!(
        combos.process_input(&library, fighter(), ComboInput::HeavyAttack, 0.9),
        InputResult::Cancelled
    );
    assert_eq!(combos.state(fighter()), ComboState::Idle);
}

#[test]
fn late_input_cancels_the_chain() {
    let library = library();
    let mut combos = ComboStates::default();
    combos.process_input(&library, fighter(), ComboInput::LightAttack, 0.0);
    // The 0.5s window has passed.
    assert_eq!(
        combos.process_input(&library, fighter(), ComboInput::LightAttack, 0.8),
        InputResult::Cancelled
    );
    assert_eq!(combos.state(fighter()), ComboState::Idle);
}

#[test]
fn idle_chains_time_out_on_update() {
    let library = library();
    let mut combos = ComboStates::default();
    combos.process_input(&library, fighter(), ComboInput::LightAttack, 0.0);
    combos.process_input(&library, fighter(), ComboInput::LightAttack, 0.3);
    assert_eq!(combos.state(fighter()), ComboState::InProgress);

    // Sweep before the window closes: still alive.
    combos.expire_stale(&library, 0.6);
    assert_eq!(combos.state(fighter()), ComboState::InProgress);

    // Past the window: back to idle without another input.
    combos.expire_stale(&library, 1.0);
    assert_eq!(combos.state(fighter()), ComboState::Idle);
}

#[test]
fn overall_time_cap_cancels_slow_chains() {
    let mut library = ComboLibrary::default();
    library.register(ComboDefinition {
        id: ComboId(50),
        name: "Slow Burn".to_string(),
        sequence: vec![ComboInput::Guard, ComboInput::Guard, ComboInput::Guard],
        input_window: 10.0,
        time_limit: 4.0,
        damage_multiplier: 1.0,
        step_multipliers: vec![],
        bonus_effect: None,
    });
    let mut combos = ComboStates::default();
    combos.process_input(&library, fighter(), ComboInput::Guard, 0.0);
    combos.process_input(&library, fighter(), ComboInput::Guard, 3.0);
    assert_eq!(combos.state(fighter()), ComboState::InProgress);

    // The per-input window (10s) is still open, but the 4s overall cap
    // has lapsed.
    combos.expire_stale(&library, 4.5);
    assert_eq!(combos.state(fighter()), ComboState::Idle);
}

#[test]
fn interruption_is_terminal_until_next_input() {
    let library = library();
    let mut combos = ComboStates::default();
    combos.process_input(&library, fighter(), ComboInput::LightAttack, 0.0);
    combos.interrupt(fighter());
    assert_eq!(combos.state(fighter()), ComboState::Interrupted);

    // Timeout sweeps do not clear interruption.
    combos.expire_stale(&library, 10.0);
    assert_eq!(combos.state(fighter()), ComboState::Interrupted);

    // The next input resets and starts a fresh chain.
    assert_eq!(
        combos.process_input(&library, fighter(), ComboInput::LightAttack, 11.0),
        InputResult::Advanced
    );
    assert_eq!(combos.state(fighter()), ComboState::InProgress);
}

#[test]
fn hits_accumulate_while_in_progress() {
    let library = library();
    let mut combos = ComboStates::default();
    combos.register_hit(fighter(), 100.0); // idle: ignored
    combos.process_input(&library, fighter(), ComboInput::LightAttack, 0.0);
    combos.register_hit(fighter(), 40.0);
    combos.register_hit(fighter(), 25.0);
    let progress = combos.progress(fighter()).unwrap();
    assert_eq!(progress.hit_count, 2);
    assert_eq!(progress.accumulated_damage, 65.0);
}

#[test]
fn damage_multiplier_compounds_along_the_chain() {
    let library = library();
    let mut combos = ComboStates::default();
    assert_eq!(combos.damage_multiplier(fighter()), 1.0);
    combos.process_input(&library, fighter(), ComboInput::LightAttack, 0.0);
    combos.process_input(&library, fighter(), ComboInput::LightAttack, 0.2);
    // Triple Strike's second step carries a 1.1 multiplier.
    let multiplier = combos.damage_multiplier(fighter());
    assert!((multiplier - 1.1).abs() < 1e-6);
    // Completion resets the chain and its multiplier.
    combos.process_input(&library, fighter(), ComboInput::HeavyAttack, 0.4);
    assert_eq!(combos.damage_multiplier(fighter()), 1.0);
}

#[test]
fn shared_prefixes_reach_both_finishers() {
    let library = library();
    let mut combos = ComboStates::default();
    // Light -> Heavy is Guard Breaker, sharing its first node with
    // Triple Strike.
    combos.process_input(&library, fighter(), ComboInput::LightAttack, 0.0);
    match combos.process_input(&library, fighter(), ComboInput::HeavyAttack, 0.3) {
        InputResult::Finished { combo, .. } => assert_eq!(combo, GUARD_BREAKER),
        other => panic!("expected completion, got {other:?}"),
    }
}

#[test]
fn failure_statistics_track_broken_chains() {
    let library = library();
    let mut combos = ComboStates::default();
    combos.process_input(&library, fighter(), ComboInput::LightAttack, 0.0);
    combos.process_input(&library, fighter(), ComboInput::Guard, 0.2); // invalid
    let stats = combos.statistics().player(fighter());
    assert_eq!(stats.failed_combos, 1);
    assert_eq!(stats.total_combos, 0);
}

#[test]
fn remove_entity_clears_controller_and_stats() {
    let library = library();
    let mut combos = ComboStates::default();
    combos.process_input(&library, fighter(), ComboInput::LightAttack, 0.0);
    assert!(combos.has_rows(fighter()));
    combos.remove_entity(fighter());
    assert!(!combos.has_rows(fighter()));
    assert_eq!(combos.state(fighter()), ComboState::Idle);
}
