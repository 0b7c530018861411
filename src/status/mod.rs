//! Status-effect engine: buffs, debuffs, periodic effects, crowd
//! control, stacking and dispels.

pub mod definitions;
pub mod engine;

use bevy::prelude::*;

use crate::sim::TickPhase;

pub use definitions::{
    load_effect_catalog, ControlFlags, ControlKind, DispelCategory, EffectCatalog, EffectData,
    EffectId, EffectKind, EffectsConfig, ModifierKind, StackBehavior, StatModifier,
};
pub use engine::{recompute_snapshot, EffectInstance, StatusEffects};

pub struct StatusPlugin;

impl Plugin for StatusPlugin {
    fn build(&self, app: &mut App) {
        let catalog = load_effect_catalog().expect("invalid status-effect config");
        app.insert_resource(catalog)
            .init_resource::<StatusEffects>()
            .add_systems(
                Update,
                (engine::tick_effects, engine::refresh_stat_snapshots)
                    .chain()
                    .in_set(TickPhase::StatusTick),
            );
    }
}
