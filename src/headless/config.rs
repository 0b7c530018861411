//! JSON scenario configuration.
//!
//! A scenario describes a roster of combatants and a timestamped command
//! script. Because the script and the world seed fully determine the
//! simulation, a scenario file doubles as a replay: running it twice
//! produces identical combat logs.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::entity::ResourceKind;
use crate::sim::GameCommand;

fn default_name() -> String {
    "scenario".to_string()
}

fn default_tick_hz() -> f32 {
    20.0
}

fn default_max_duration() -> f32 {
    300.0
}

fn default_rank() -> u32 {
    1
}

fn default_player() -> bool {
    true
}

/// Top-level scenario document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// World seed; the same seed replays the same match.
    #[serde(default)]
    pub seed: u64,
    /// Simulation rate in ticks per second.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: f32,
    /// The scenario ends in a draw when this cap elapses.
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: f32,
    /// Optional path for the text match report.
    #[serde(default)]
    pub output_path: Option<String>,
    pub combatants: Vec<CombatantSpec>,
    /// Commands delivered to the queue when their timestamp is reached.
    #[serde(default)]
    pub script: Vec<TimedCommand>,
}

/// One roster entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatantSpec {
    pub id: u64,
    pub name: String,
    pub team: u8,
    /// Defaults to the team number.
    #[serde(default)]
    pub faction: Option<u32>,
    /// Ground-plane spawn position `[x, z]`.
    #[serde(default)]
    pub position: [f32; 2],
    /// Players get a PvP controller; NPCs fall back to faction rules.
    #[serde(default = "default_player")]
    pub player: bool,
    #[serde(default)]
    pub resource: ResourceKind,
    #[serde(default)]
    pub stats: StatOverrides,
    #[serde(default)]
    pub skills: Vec<KnownSkill>,
}

/// Optional stat overrides; unset fields keep the default stat block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatOverrides {
    pub max_health: Option<f32>,
    pub max_resource: Option<f32>,
    pub attack_power: Option<f32>,
    pub spell_power: Option<f32>,
    pub attack_speed: Option<f32>,
    pub crit_chance: Option<f32>,
    pub crit_multiplier: Option<f32>,
    pub armor: Option<f32>,
    pub magic_resist: Option<f32>,
    pub dodge_chance: Option<f32>,
    pub parry_chance: Option<f32>,
    pub block_chance: Option<f32>,
    pub life_steal: Option<f32>,
    pub cooldown_reduction: Option<f32>,
    pub movement_speed: Option<f32>,
}

impl StatOverrides {
    pub fn apply(&self, stats: &mut crate::entity::CombatStats) {
        macro_rules! take {
            ($field:ident) => {
                if let Some(value) = self.$field {
                    stats.$field = value;
                }
            };
        }
        take!(max_health);
        take!(max_resource);
        take!(attack_power);
        take!(spell_power);
        take!(attack_speed);
        take!(crit_chance);
        take!(crit_multiplier);
        take!(armor);
        take!(magic_resist);
        take!(dodge_chance);
        take!(parry_chance);
        take!(block_chance);
        take!(life_steal);
        take!(cooldown_reduction);
        take!(movement_speed);
    }
}

/// A skill granted at spawn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KnownSkill {
    pub id: u32,
    #[serde(default = "default_rank")]
    pub rank: u32,
}

/// A command delivered once simulation time reaches `at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedCommand {
    pub at: f32,
    pub command: GameCommand,
}

impl ScenarioConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        let config: ScenarioConfig =
            serde_json::from_str(&contents).map_err(|e| format!("failed to parse scenario: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.combatants.is_empty() {
            return Err("scenario needs at least one combatant".to_string());
        }
        if self.tick_hz <= 0.0 {
            return Err("tick_hz must be positive".to_string());
        }
        let mut ids: Vec<u64> = self.combatants.iter().map(|spec| spec.id).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != self.combatants.len() {
            return Err("combatant ids must be unique".to_string());
        }
        Ok(())
    }

    pub fn tick_dt(&self) -> f32 {
        1.0 / self.tick_hz
    }
}
