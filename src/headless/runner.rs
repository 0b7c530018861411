//! Headless scenario execution.
//!
//! Builds the full simulation app with a fixed tick, spawns the roster,
//! feeds the command script and steps the world until one team stands
//! or the duration cap lapses. No wall-clock time enters the loop: each
//! `app.update()` advances the clock by exactly one tick.

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write as _;
use std::time::Duration;

use crate::combat::CombatLogs;
use crate::entity::{CombatStats, Combatant, EntityId, EntityRegistry};
use crate::pvp::PvpCoordinator;
use crate::sim::{CommandQueue, SimClock, SimPlugin, ZoneKind, ZonePolicy};
use crate::skill::{SkillBook, SkillCategory, SkillState};
use crate::status::{EffectCatalog, StatusEffects};

use super::config::{CombatantSpec, ScenarioConfig};

/// Final standing of one combatant.
#[derive(Debug, Clone, Serialize)]
pub struct CombatantOutcome {
    pub id: u64,
    pub name: String,
    pub team: u8,
    pub survived: bool,
    pub final_health: f32,
    pub max_health: f32,
    pub damage_dealt: f32,
    pub damage_taken: f32,
    pub healing_done: f32,
}

/// Result of a completed scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub seed: u64,
    /// Winning team, or `None` for a draw.
    pub winner: Option<u8>,
    pub elapsed_secs: f32,
    pub combatants: Vec<CombatantOutcome>,
}

/// Build the simulation app with a deterministic manual tick.
pub fn build_sim_app(seed: u64, tick_dt: f32) -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_secs_f32(
        tick_dt,
    )));
    app.add_plugins(SimPlugin { seed });
    app
}

/// Spawn one combatant into the world: ECS entity, registry row, policy
/// rows, optional PvP controller, known skills (passives apply their
/// effects immediately).
pub fn spawn_combatant(world: &mut World, spec: &CombatantSpec) -> EntityId {
    let id = EntityId::new(spec.id);
    let mut stats = CombatStats::default();
    spec.stats.apply(&mut stats);
    let combatant = Combatant::new(id, spec.name.clone(), stats).with_resource_kind(spec.resource);

    let entity = world
        .spawn((
            combatant,
            Transform::from_xyz(spec.position[0], 0.0, spec.position[1]),
        ))
        .id();
    world.resource_mut::<EntityRegistry>().register(id, entity);

    let faction = spec.faction.unwrap_or(spec.team as u32);
    world.resource_mut::<ZonePolicy>().set_faction(id, faction);

    if spec.player {
        world.resource_mut::<PvpCoordinator>().ensure_controller(id);
    }

    // Learn skills; passives land their permanent effects on the spot.
    let mut passive_effects = Vec::new();
    {
        let book = world.resource::<SkillBook>().clone();
        let mut skills = world.resource_mut::<SkillState>();
        for known in &spec.skills {
            let skill_id = crate::skill::SkillId(known.id);
            if let Err(error) = skills.learn_skill(&book, id, skill_id) {
                warn!("{id} could not learn {skill_id}: {error}");
                continue;
            }
            for _ in 1..known.rank {
                if let Err(error) = skills.upgrade_skill(&book, id, skill_id) {
                    warn!("{id} could not upgrade {skill_id}: {error}");
                    break;
                }
            }
            if let Some(data) = book.get(skill_id) {
                if data.category == SkillCategory::Passive {
                    passive_effects.extend(data.effects.iter().copied());
                }
            }
        }
    }
    if !passive_effects.is_empty() {
        let catalog = world.resource::<EffectCatalog>().clone();
        let now = world.resource::<SimClock>().now();
        let mut status = world.resource_mut::<StatusEffects>();
        for effect in passive_effects {
            if let Err(error) = status.apply(&catalog, id, effect, id, 1.0, now) {
                warn!("passive effect {effect} on {id} failed: {error}");
            }
        }
        // Snapshot picks the modifiers up at the first status tick.
        status.mark_dirty(id);
    }

    id
}

/// Run a scenario to completion.
pub fn run_scenario(config: &ScenarioConfig) -> Result<ScenarioResult, String> {
    config.validate()?;
    let dt = config.tick_dt();
    let mut app = build_sim_app(config.seed, dt);
    app.insert_resource(ZonePolicy::with_default_zone(ZoneKind::Contested));

    let mut teams: HashMap<EntityId, u8> = HashMap::new();
    for spec in &config.combatants {
        let id = spawn_combatant(app.world_mut(), spec);
        teams.insert(id, spec.team);
    }

    let mut script = config.script.clone();
    script.sort_by(|a, b| a.at.partial_cmp(&b.at).unwrap_or(std::cmp::Ordering::Equal));
    let mut cursor = 0usize;

    let max_ticks = (config.max_duration_secs / dt).ceil() as u64;
    let mut winner: Option<u8> = None;
    let mut decided = false;
    for _ in 0..max_ticks {
        // Deliver script commands due at the start of this tick.
        let now = app.world().resource::<SimClock>().now() as f32;
        {
            let mut queue = app.world_mut().resource_mut::<CommandQueue>();
            while cursor < script.len() && script[cursor].at <= now + 1e-6 {
                queue.push(script[cursor].command.clone());
                cursor += 1;
            }
        }

        app.update();

        if let Some(standing) = single_team_standing(app.world_mut(), &teams) {
            winner = standing;
            decided = true;
            break;
        }
    }

    let elapsed = app.world().resource::<SimClock>().now() as f32;
    if !decided {
        debug!("scenario hit the duration cap; declaring a draw");
    }
    let result = collect_result(app.world_mut(), config, &teams, winner, elapsed);

    if let Some(path) = &config.output_path {
        write_match_report(path, config, &result, app.world())
            .map_err(|e| format!("failed to write report: {e}"))?;
    }
    Ok(result)
}

/// `Some(winner)` once at most one team has living members; the inner
/// option is `None` for a mutual wipe.
fn single_team_standing(
    world: &mut World,
    teams: &HashMap<EntityId, u8>,
) -> Option<Option<u8>> {
    let mut alive_teams: Vec<u8> = Vec::new();
    let mut query = world.query::<&Combatant>();
    for combatant in query.iter(world) {
        if !combatant.is_alive() {
            continue;
        }
        if let Some(team) = teams.get(&combatant.id) {
            if !alive_teams.contains(team) {
                alive_teams.push(*team);
            }
        }
    }
    match alive_teams.len() {
        0 => Some(None),
        1 => Some(Some(alive_teams[0])),
        _ => None,
    }
}

fn collect_result(
    world: &mut World,
    config: &ScenarioConfig,
    teams: &HashMap<EntityId, u8>,
    winner: Option<u8>,
    elapsed: f32,
) -> ScenarioResult {
    let mut by_id: HashMap<EntityId, CombatantOutcome> = HashMap::new();
    let mut query = world.query::<&Combatant>();
    for combatant in query.iter(world) {
        by_id.insert(
            combatant.id,
            CombatantOutcome {
                id: combatant.id.get(),
                name: combatant.name.clone(),
                team: teams.get(&combatant.id).copied().unwrap_or_default(),
                survived: combatant.is_alive(),
                final_health: combatant.health,
                max_health: combatant.snapshot.max_health,
                damage_dealt: combatant.damage_dealt,
                damage_taken: combatant.damage_taken,
                healing_done: combatant.healing_done,
            },
        );
    }
    // Preserve roster order.
    let combatants = config
        .combatants
        .iter()
        .filter_map(|spec| by_id.remove(&EntityId::new(spec.id)))
        .collect();
    ScenarioResult {
        name: config.name.clone(),
        seed: config.seed,
        winner,
        elapsed_secs: elapsed,
        combatants,
    }
}

/// Write a human-readable match report next to the structured result.
fn write_match_report(
    path: &str,
    config: &ScenarioConfig,
    result: &ScenarioResult,
    world: &World,
) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    writeln!(file, "{}", "=".repeat(72))?;
    writeln!(file, "MATCH REPORT: {}", result.name)?;
    writeln!(file, "{}", "=".repeat(72))?;
    writeln!(file, "Seed: {}", result.seed)?;
    writeln!(file, "Duration: {:.2}s", result.elapsed_secs)?;
    writeln!(
        file,
        "Winner: {}",
        match result.winner {
            Some(team) => format!("Team {team}"),
            None => "DRAW".to_string(),
        }
    )?;
    writeln!(file)?;

    for outcome in &result.combatants {
        writeln!(
            file,
            "[Team {}] {} (#{}) - {}",
            outcome.team,
            outcome.name,
            outcome.id,
            if outcome.survived { "alive" } else { "dead" }
        )?;
        writeln!(
            file,
            "    HP {:.0}/{:.0}  dealt {:.0}  taken {:.0}  healed {:.0}",
            outcome.final_health,
            outcome.max_health,
            outcome.damage_dealt,
            outcome.damage_taken,
            outcome.healing_done
        )?;
    }
    writeln!(file)?;

    // Tail of each combatant's damage log.
    let logs = world.resource::<CombatLogs>();
    writeln!(file, "RECENT COMBAT LOG")?;
    writeln!(file, "{}", "-".repeat(72))?;
    for spec in &config.combatants {
        let id = EntityId::new(spec.id);
        for record in logs.recent(id, 10) {
            if record.target != id {
                continue;
            }
            writeln!(
                file,
                "[{:>7.2}s] {} -> {} {:?} {:.0} ({:?})",
                record.timestamp,
                record.attacker,
                record.target,
                record.damage_type,
                record.final_damage,
                record.outcome
            )?;
        }
    }
    writeln!(file, "{}", "=".repeat(72))?;
    Ok(())
}
