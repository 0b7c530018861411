//! Shared combo trie.
//!
//! Combo definitions are authored as flat input sequences; the library
//! compiles them into a trie stored as an arena of nodes addressed by
//! index. Controllers hold node indices, never node references, so the
//! graph can be shared by every entity without reference cycles.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::status::EffectId;

/// Numeric id of a combo definition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ComboId(pub u32);

impl std::fmt::Display for ComboId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "combo:{}", self.0)
    }
}

/// Closed input alphabet fed to the combo controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComboInput {
    LightAttack,
    HeavyAttack,
    Skill1,
    Skill2,
    Skill3,
    Guard,
}

fn default_input_window() -> f32 {
    0.5
}

fn default_time_limit() -> f32 {
    10.0
}

fn default_damage_multiplier() -> f32 {
    1.0
}

/// Authored combo: an input sequence with timing and reward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComboDefinition {
    pub id: ComboId,
    pub name: String,
    pub sequence: Vec<ComboInput>,
    /// Seconds allowed between consecutive inputs.
    #[serde(default = "default_input_window")]
    pub input_window: f32,
    /// Overall cap from first input to completion.
    #[serde(default = "default_time_limit")]
    pub time_limit: f32,
    /// Damage multiplier carried by the finisher node.
    #[serde(default = "default_damage_multiplier")]
    pub damage_multiplier: f32,
    /// Per-step damage multipliers compounding along the chain; shorter
    /// lists leave the remaining steps at 1.0 (finisher uses
    /// `damage_multiplier`).
    #[serde(default)]
    pub step_multipliers: Vec<f32>,
    /// Status effect granted on completion.
    #[serde(default)]
    pub bonus_effect: Option<EffectId>,
}

/// One node of the compiled trie.
#[derive(Debug, Clone)]
pub struct ComboNode {
    pub input: Option<ComboInput>,
    /// Seconds the next input may take before the chain breaks.
    pub window: f32,
    pub next: HashMap<ComboInput, usize>,
    /// Set on the terminal node of a sequence.
    pub combo: Option<ComboId>,
    pub is_finisher: bool,
    pub damage_multiplier: f32,
}

impl ComboNode {
    fn root() -> Self {
        Self {
            input: None,
            window: default_input_window(),
            next: HashMap::new(),
            combo: None,
            is_finisher: false,
            damage_multiplier: 1.0,
        }
    }
}

/// Top-level RON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombosConfig {
    pub combos: Vec<ComboDefinition>,
}

/// The shared trie plus the definitions it was compiled from.
#[derive(Resource, Debug)]
pub struct ComboLibrary {
    definitions: HashMap<ComboId, ComboDefinition>,
    nodes: Vec<ComboNode>,
}

impl Default for ComboLibrary {
    fn default() -> Self {
        Self {
            definitions: HashMap::new(),
            nodes: vec![ComboNode::root()],
        }
    }
}

pub const COMBO_ROOT: usize = 0;

impl ComboLibrary {
    pub fn from_config(config: CombosConfig) -> Self {
        let mut library = Self::default();
        for combo in config.combos {
            library.register(combo);
        }
        library
    }

    /// Compile `combo` into the trie. Shared prefixes reuse existing
    /// nodes; the terminal node carries the combo id and reward.
    pub fn register(&mut self, combo: ComboDefinition) {
        if combo.sequence.is_empty() {
            warn!("combo {} has an empty sequence; skipped", combo.name);
            return;
        }
        let mut current = COMBO_ROOT;
        let last = combo.sequence.len() - 1;
        for (index, input) in combo.sequence.iter().enumerate() {
            let step_multiplier = combo
                .step_multipliers
                .get(index)
                .copied()
                .unwrap_or(if index == last {
                    combo.damage_multiplier
                } else {
                    1.0
                });
            let next = match self.nodes[current].next.get(input) {
                Some(existing) => *existing,
                None => {
                    let node_index = self.nodes.len();
                    self.nodes.push(ComboNode {
                        input: Some(*input),
                        window: combo.input_window,
                        next: HashMap::new(),
                        combo: None,
                        is_finisher: false,
                        damage_multiplier: 1.0,
                    });
                    self.nodes[current].next.insert(*input, node_index);
                    node_index
                }
            };
            {
                // Shared prefixes keep the strongest multiplier.
                let node = &mut self.nodes[next];
                node.damage_multiplier = node.damage_multiplier.max(step_multiplier);
            }
            if index == last {
                let node = &mut self.nodes[next];
                node.combo = Some(combo.id);
                node.is_finisher = true;
            }
            current = next;
        }
        debug!("registered combo {} ({})", combo.name, combo.id);
        self.definitions.insert(combo.id, combo);
    }

    pub fn node(&self, index: usize) -> &ComboNode {
        &self.nodes[index]
    }

    pub fn child(&self, index: usize, input: ComboInput) -> Option<usize> {
        self.nodes[index].next.get(&input).copied()
    }

    pub fn definition(&self, id: ComboId) -> Option<&ComboDefinition> {
        self.definitions.get(&id)
    }

    /// The loosest overall time cap of any registered combo; used for
    /// chains that have not yet committed to a specific sequence.
    pub fn max_time_limit(&self) -> f32 {
        self.definitions
            .values()
            .map(|def| def.time_limit)
            .fold(f32::NEG_INFINITY, f32::max)
            .max(0.0)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Compiled-in combos used when no config file is present.
pub const DEFAULT_COMBOS_RON: &str = include_str!("../../assets/config/combos.ron");

const COMBOS_CONFIG_PATH: &str = "assets/config/combos.ron";

/// Load the combo library from `assets/config/combos.ron`, falling back
/// to the compiled-in defaults when the file is absent.
pub fn load_combo_library() -> Result<ComboLibrary, String> {
    let contents = match std::fs::read_to_string(COMBOS_CONFIG_PATH) {
        Ok(contents) => contents,
        Err(_) => DEFAULT_COMBOS_RON.to_string(),
    };
    let config: CombosConfig =
        ron::from_str(&contents).map_err(|e| format!("failed to parse {COMBOS_CONFIG_PATH}: {e}"))?;
    let library = ComboLibrary::from_config(config);
    info!("loaded {} combo definitions", library.len());
    Ok(library)
}
