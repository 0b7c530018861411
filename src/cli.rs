//! Command-line interface for the scenario runner.

use clap::Parser;
use std::path::PathBuf;

/// Authoritative MMORPG combat core simulator
#[derive(Parser, Debug)]
#[command(name = "realmsim")]
#[command(about = "Authoritative MMORPG combat core simulator")]
#[command(version)]
pub struct Args {
    /// JSON scenario file to execute
    #[arg(value_name = "SCENARIO_FILE")]
    pub scenario: PathBuf,

    /// Output path for the match report (overrides the scenario file)
    #[arg(long, value_name = "OUTPUT_PATH")]
    pub output: Option<PathBuf>,

    /// World seed (overrides the scenario file)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Maximum scenario duration in seconds (overrides the scenario file)
    #[arg(long)]
    pub max_duration: Option<f32>,
}

pub fn parse_args() -> Args {
    Args::parse()
}
