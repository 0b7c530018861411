//! Headless scenario execution.
//!
//! Runs the simulation without any frontend, suitable for automated
//! testing, replay verification and balance work.
//!
//! ## Usage
//!
//! ```bash
//! realmsim scenario.json --output report.txt
//! ```
//!
//! ## JSON configuration
//!
//! ```json
//! {
//!   "seed": 42,
//!   "combatants": [
//!     { "id": 1, "name": "Korga", "team": 1, "skills": [{ "id": 1 }] },
//!     { "id": 2, "name": "Lyra", "team": 2 }
//!   ],
//!   "script": [
//!     { "at": 0.0, "command": { "Attack": { "attacker": 1, "target": 2 } } }
//!   ]
//! }
//! ```

pub mod config;
pub mod runner;

pub use config::{CombatantSpec, KnownSkill, ScenarioConfig, StatOverrides, TimedCommand};
pub use runner::{build_sim_app, run_scenario, spawn_combatant, CombatantOutcome, ScenarioResult};
