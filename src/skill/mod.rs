//! Skill engine: cast lifecycle, cooldowns, interrupts and toggles.

pub mod definitions;
pub mod engine;

use bevy::prelude::*;

use crate::sim::TickPhase;
use crate::status::EffectCatalog;

pub use definitions::{
    load_skill_book, InterruptKind, SkillBook, SkillCategory, SkillData, SkillId, SkillsConfig,
    TargetRequirement,
};
pub use engine::{ActiveCast, CastAction, SkillInstance, SkillState, TargetView};

pub struct SkillPlugin;

impl Plugin for SkillPlugin {
    fn build(&self, app: &mut App) {
        let book = load_skill_book().expect("invalid skill config");
        app.insert_resource(book)
            .init_resource::<SkillState>()
            .add_systems(Startup, validate_skill_book)
            .add_systems(Update, engine::advance_casts.in_set(TickPhase::SkillTick));
    }
}

/// Cross-check the skill book against the effect catalog once at
/// startup; a skill naming a missing effect is an authoring error.
fn validate_skill_book(book: Res<SkillBook>, catalog: Res<EffectCatalog>) {
    if let Err(message) = book.validate_against(&catalog) {
        error!("{message}");
    }
}
