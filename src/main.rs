//! RealmSim - Authoritative MMORPG Combat Core
//!
//! Headless entry point: load a scenario, run it to completion, print
//! the structured result to stdout.

use realmsim::cli;
use realmsim::headless::{run_scenario, ScenarioConfig};

fn main() {
    let args = cli::parse_args();

    let mut config = match ScenarioConfig::load_from_file(&args.scenario) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error: {error}");
            std::process::exit(1);
        }
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(max_duration) = args.max_duration {
        config.max_duration_secs = max_duration;
    }
    if let Some(output) = &args.output {
        config.output_path = Some(output.display().to_string());
    }

    match run_scenario(&config) {
        Ok(result) => {
            let summary = serde_json::to_string_pretty(&result)
                .unwrap_or_else(|_| "{}".to_string());
            println!("{summary}");
        }
        Err(error) => {
            eprintln!("error: {error}");
            std::process::exit(1);
        }
    }
}
