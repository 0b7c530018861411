//! Static status-effect definitions.
//!
//! Definitions are immutable shared data, loaded from RON config so
//! balance changes don't require recompilation. Instances (who has what,
//! since when, how many stacks) live in the engine and reference
//! definitions by id.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::combat::damage::DamageType;
use crate::entity::Stat;

/// Numeric id of a status-effect definition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct EffectId(pub u32);

impl std::fmt::Display for EffectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "effect:{}", self.0)
    }
}

/// Broad behavioral class of an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    Buff,
    Debuff,
    Dot,
    Hot,
    CrowdControl,
    Aura,
    Shield,
    Transform,
}

impl EffectKind {
    /// Kinds removed by friendly dispels and debuff strips.
    pub fn is_harmful(self) -> bool {
        matches!(
            self,
            EffectKind::Debuff | EffectKind::Dot | EffectKind::CrowdControl
        )
    }
}

/// Dispel school; determines which removal abilities can touch the
/// effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DispelCategory {
    Magic,
    Physical,
    Poison,
    Disease,
    Curse,
    Blessing,
    #[default]
    None,
}

/// How repeated applications of the same definition combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StackBehavior {
    /// Re-application refreshes the duration.
    #[default]
    None,
    /// Re-application extends the expiry by the base duration.
    StackDuration,
    /// Re-application adds a stack up to `max_stacks`.
    StackIntensity,
    /// Adds a stack and refreshes the duration.
    StackRefresh,
    /// Each caster owns an independent instance slot.
    UniqueSource,
}

/// Control restrictions an effect can impose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlKind {
    Stun,
    Silence,
    Root,
    Slow,
    Disarm,
    Blind,
    Fear,
    Charm,
    Sleep,
    Freeze,
}

impl ControlKind {
    pub const fn bit(self) -> u32 {
        match self {
            ControlKind::Stun => 1 << 0,
            ControlKind::Silence => 1 << 1,
            ControlKind::Root => 1 << 2,
            ControlKind::Slow => 1 << 3,
            ControlKind::Disarm => 1 << 4,
            ControlKind::Blind => 1 << 5,
            ControlKind::Fear => 1 << 6,
            ControlKind::Charm => 1 << 7,
            ControlKind::Sleep => 1 << 8,
            ControlKind::Freeze => 1 << 9,
        }
    }
}

/// Bitwise OR of the control restrictions active on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlFlags(u32);

impl ControlFlags {
    pub const EMPTY: ControlFlags = ControlFlags(0);

    pub fn from_kinds(kinds: &[ControlKind]) -> Self {
        let mut flags = 0;
        for kind in kinds {
            flags |= kind.bit();
        }
        Self(flags)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, kind: ControlKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn contains_any(self, kinds: &[ControlKind]) -> bool {
        kinds.iter().any(|kind| self.contains(*kind))
    }

    pub fn insert(&mut self, other: ControlFlags) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Blocks every skill cast regardless of school.
    pub fn blocks_all_casts(self) -> bool {
        self.contains_any(&[ControlKind::Stun, ControlKind::Sleep, ControlKind::Freeze])
    }

    /// Blocks the auto-attack swing timer.
    pub fn blocks_auto_attack(self) -> bool {
        self.contains_any(&[
            ControlKind::Stun,
            ControlKind::Sleep,
            ControlKind::Freeze,
            ControlKind::Disarm,
        ])
    }
}

/// How a stat modifier composes into the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModifierKind {
    Flat,
    Percent,
    Multiplier,
}

/// One stat adjustment carried by an effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatModifier {
    pub stat: Stat,
    pub value: f32,
    pub kind: ModifierKind,
}

fn default_max_stacks() -> u32 {
    1
}

fn default_tick_damage_type() -> DamageType {
    DamageType::Magical
}

/// Static definition of a status effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectData {
    pub id: EffectId,
    pub name: String,
    pub kind: EffectKind,
    #[serde(default)]
    pub category: DispelCategory,
    #[serde(default = "default_max_stacks")]
    pub max_stacks: u32,
    #[serde(default)]
    pub stacking: StackBehavior,
    /// Seconds; 0 means permanent.
    #[serde(default)]
    pub duration: f32,
    /// Seconds between periodic payloads; 0 disables ticking.
    #[serde(default)]
    pub tick_interval: f32,
    #[serde(default)]
    pub tick_damage: f32,
    #[serde(default)]
    pub tick_healing: f32,
    #[serde(default = "default_tick_damage_type")]
    pub tick_damage_type: DamageType,
    #[serde(default)]
    pub control: Vec<ControlKind>,
    #[serde(default)]
    pub modifiers: Vec<StatModifier>,
    #[serde(default)]
    pub grants_immunity_categories: Vec<DispelCategory>,
    #[serde(default)]
    pub grants_immunity_effects: Vec<EffectId>,
    /// Effect breaks when the holder takes post-mitigation damage.
    #[serde(default)]
    pub remove_on_damage: bool,
    /// Effect breaks when the holder takes any combat action.
    #[serde(default)]
    pub remove_on_action: bool,
    /// Effect survives the holder's death.
    #[serde(default)]
    pub persist_through_death: bool,
}

impl EffectData {
    pub fn control_flags(&self) -> ControlFlags {
        ControlFlags::from_kinds(&self.control)
    }

    pub fn is_permanent(&self) -> bool {
        self.duration <= 0.0
    }
}

/// Top-level RON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectsConfig {
    pub effects: Vec<EffectData>,
}

/// Shared, immutable catalog of every known effect definition.
#[derive(Resource, Debug, Clone, Default)]
pub struct EffectCatalog {
    effects: HashMap<EffectId, EffectData>,
}

impl EffectCatalog {
    pub fn from_config(config: EffectsConfig) -> Self {
        let mut catalog = Self::default();
        for effect in config.effects {
            catalog.register(effect);
        }
        catalog
    }

    /// Insert or replace a definition. Used by data loading and by tests
    /// that need tailored effects.
    pub fn register(&mut self, effect: EffectData) {
        if self.effects.insert(effect.id, effect).is_some() {
            warn!("effect definition re-registered; previous replaced");
        }
    }

    pub fn get(&self, id: EffectId) -> Option<&EffectData> {
        self.effects.get(&id)
    }

    pub fn contains(&self, id: EffectId) -> bool {
        self.effects.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

/// Compiled-in definitions used when no config file is present.
pub const DEFAULT_EFFECTS_RON: &str = include_str!("../../assets/config/effects.ron");

const EFFECTS_CONFIG_PATH: &str = "assets/config/effects.ron";

/// Load the effect catalog from `assets/config/effects.ron`, falling back
/// to the compiled-in defaults when the file is absent.
pub fn load_effect_catalog() -> Result<EffectCatalog, String> {
    let contents = match std::fs::read_to_string(EFFECTS_CONFIG_PATH) {
        Ok(contents) => contents,
        Err(_) => DEFAULT_EFFECTS_RON.to_string(),
    };
    let config: EffectsConfig = ron::from_str(&contents)
        .map_err(|e| format!("failed to parse {EFFECTS_CONFIG_PATH}: {e}"))?;
    let catalog = EffectCatalog::from_config(config);
    info!("loaded {} status-effect definitions", catalog.len());
    Ok(catalog)
}
