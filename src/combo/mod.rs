//! Combo input chains: a shared trie of input sequences with timing
//! windows, walked by per-entity controllers.

pub mod controller;
pub mod graph;

use bevy::prelude::*;

use crate::sim::TickPhase;

pub use controller::{
    ComboProgress, ComboState, ComboStates, ComboStatistics, InputResult, PlayerComboStats,
};
pub use graph::{
    load_combo_library, ComboDefinition, ComboId, ComboInput, ComboLibrary, ComboNode, COMBO_ROOT,
};

pub struct ComboPlugin;

impl Plugin for ComboPlugin {
    fn build(&self, app: &mut App) {
        let library = load_combo_library().expect("invalid combo config");
        app.insert_resource(library)
            .init_resource::<ComboStates>()
            .add_systems(
                Update,
                controller::update_combos.in_set(TickPhase::ComboTick),
            );
    }
}
