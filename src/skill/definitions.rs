//! Static skill definitions.
//!
//! Like status effects, skills are data: the RON config describes the
//! whole skill book and the engine interprets it. The `SkillBook` is
//! immutable shared data; per-entity skill state lives in the engine.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::combat::damage::DamageType;
use crate::entity::ResourceKind;
use crate::sim::spatial::TargetShape;
use crate::status::{EffectCatalog, EffectId};

/// Numeric id of a skill definition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct SkillId(pub u32);

impl std::fmt::Display for SkillId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "skill:{}", self.0)
    }
}

/// Execution flavor of a skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkillCategory {
    /// Resolves immediately on a successful start.
    Instant,
    /// Resolves after an uninterrupted cast time.
    CastTime,
    /// Applies its payload repeatedly over a channel duration.
    Channeling,
    /// On/off; drains resource per second while on.
    Toggle,
    /// Never cast; grants its effects permanently when learned.
    Passive,
}

/// What the skill must be aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TargetRequirement {
    #[default]
    None,
    Enemy,
    Ally,
    Ground,
    SelfOnly,
}

/// Stimuli that can break a cast in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterruptKind {
    Movement,
    Damage,
    Stun,
    Silence,
    Manual,
}

impl InterruptKind {
    pub const fn flag(self) -> u32 {
        match self {
            InterruptKind::Movement => 1 << 0,
            InterruptKind::Damage => 1 << 1,
            InterruptKind::Stun => 1 << 2,
            InterruptKind::Silence => 1 << 3,
            InterruptKind::Manual => 1 << 4,
        }
    }

    pub fn mask(kinds: &[InterruptKind]) -> u32 {
        kinds.iter().fold(0, |mask, kind| mask | kind.flag())
    }
}

fn default_max_rank() -> u32 {
    1
}

fn default_global_cooldown() -> f32 {
    1.0
}

fn default_shape() -> TargetShape {
    TargetShape::Single
}

/// Static definition of one skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillData {
    pub id: SkillId,
    pub name: String,
    pub category: SkillCategory,
    #[serde(default)]
    pub target: TargetRequirement,
    #[serde(default = "default_shape")]
    pub shape: TargetShape,
    /// Maximum cast range in world units; 0 disables the range check.
    #[serde(default)]
    pub range: f32,
    #[serde(default)]
    pub resource: ResourceKind,
    #[serde(default)]
    pub cost: f32,
    /// Channel / toggle drain per second.
    #[serde(default)]
    pub cost_per_second: f32,
    #[serde(default)]
    pub cast_time: f32,
    #[serde(default)]
    pub channel_duration: f32,
    /// Seconds between channel payloads; 0 means payload only at start.
    #[serde(default)]
    pub tick_interval: f32,
    #[serde(default)]
    pub cooldown: f32,
    #[serde(default = "default_global_cooldown")]
    pub global_cooldown: f32,
    #[serde(default)]
    pub base_damage: f32,
    #[serde(default)]
    pub damage_per_rank: f32,
    #[serde(default = "default_damage_type")]
    pub damage_type: DamageType,
    /// Bonus damage per point of attack power.
    #[serde(default)]
    pub ap_coefficient: f32,
    /// Bonus damage per point of spell power.
    #[serde(default)]
    pub sp_coefficient: f32,
    #[serde(default)]
    pub base_healing: f32,
    #[serde(default)]
    pub healing_per_rank: f32,
    /// Bonus healing per point of spell power.
    #[serde(default)]
    pub healing_coefficient: f32,
    #[serde(default = "default_max_rank")]
    pub max_rank: u32,
    /// Stimuli that cancel this skill's cast.
    #[serde(default)]
    pub interrupted_by: Vec<InterruptKind>,
    /// Status effects applied to each resolved target.
    #[serde(default)]
    pub effects: Vec<EffectId>,
}

fn default_damage_type() -> DamageType {
    DamageType::Physical
}

impl SkillData {
    pub fn interrupt_mask(&self) -> u32 {
        InterruptKind::mask(&self.interrupted_by)
    }

    /// Rank-scaled base damage before attack/spell power coefficients.
    pub fn damage_for_rank(&self, rank: u32) -> f32 {
        self.base_damage + self.damage_per_rank * rank.saturating_sub(1) as f32
    }

    pub fn healing_for_rank(&self, rank: u32) -> f32 {
        self.base_healing + self.healing_per_rank * rank.saturating_sub(1) as f32
    }

    pub fn deals_damage(&self) -> bool {
        self.base_damage > 0.0
    }

    pub fn heals(&self) -> bool {
        self.base_healing > 0.0
    }

    pub fn is_area(&self) -> bool {
        !matches!(self.shape, TargetShape::Single)
    }
}

/// Top-level RON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillsConfig {
    pub skills: Vec<SkillData>,
}

/// Immutable shared catalog of every known skill.
#[derive(Resource, Debug, Clone, Default)]
pub struct SkillBook {
    skills: HashMap<SkillId, SkillData>,
}

impl SkillBook {
    pub fn from_config(config: SkillsConfig) -> Self {
        let mut book = Self::default();
        for skill in config.skills {
            book.register(skill);
        }
        book
    }

    pub fn register(&mut self, skill: SkillData) {
        if self.skills.insert(skill.id, skill).is_some() {
            warn!("skill definition re-registered; previous replaced");
        }
    }

    pub fn get(&self, id: SkillId) -> Option<&SkillData> {
        self.skills.get(&id)
    }

    pub fn contains(&self, id: SkillId) -> bool {
        self.skills.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Every effect id referenced by a skill must exist in the catalog.
    pub fn validate_against(&self, catalog: &EffectCatalog) -> Result<(), String> {
        let mut missing = Vec::new();
        for skill in self.skills.values() {
            for effect in &skill.effects {
                if !catalog.contains(*effect) {
                    missing.push(format!("{} -> {effect}", skill.name));
                }
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("skills reference unknown effects: {missing:?}"))
        }
    }
}

/// Compiled-in skill book used when no config file is present.
pub const DEFAULT_SKILLS_RON: &str = include_str!("../../assets/config/skills.ron");

const SKILLS_CONFIG_PATH: &str = "assets/config/skills.ron";

/// Load the skill book from `assets/config/skills.ron`, falling back to
/// the compiled-in defaults when the file is absent.
pub fn load_skill_book() -> Result<SkillBook, String> {
    let contents = match std::fs::read_to_string(SKILLS_CONFIG_PATH) {
        Ok(contents) => contents,
        Err(_) => DEFAULT_SKILLS_RON.to_string(),
    };
    let config: SkillsConfig =
        ron::from_str(&contents).map_err(|e| format!("failed to parse {SKILLS_CONFIG_PATH}: {e}"))?;
    let book = SkillBook::from_config(config);
    info!("loaded {} skill definitions", book.len());
    Ok(book)
}
