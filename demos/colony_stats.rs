//! Runs a colony headless for a while and prints one JSON stats line per simulated second.
//!
//! ```text
//! cargo run --release --example colony_stats -- 60
//! ```

use std::error::Error;

use apiary::colony::config::{InitialConfig, INITIAL_CONFIG_PATH};
use apiary::colony::simulation::{SimConfig, SimulationPlugin};
use apiary::colony::spawn::ColonyBlueprint;
use apiary::colony::telemetry::ColonyCensus;
use bevy::ecs::system::RunSystemOnce;
use bevy::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("apiary=info")))
        .init();

    let seconds: u64 = std::env::args().nth(1).and_then(|arg| arg.parse().ok()).unwrap_or(30);
    let config = InitialConfig::load(INITIAL_CONFIG_PATH).unwrap_or_else(|e| {
        eprintln!("{}; using defaults", e);
        InitialConfig::default()
    });

    let mut app = App::new();
    app.add_plugins((MinimalPlugins, SimulationPlugin));
    app.insert_resource(SimConfig::from_initial(&config));
    ColonyBlueprint::from_config(&config).spawn_into(app.world_mut())?;

    let ticks_per_second = config.tick_rate.round().max(1.0) as u64;
    for _ in 0..seconds {
        for _ in 0..ticks_per_second {
            app.world_mut().run_schedule(FixedUpdate);
        }
        let stats = app.world_mut().run_system_once(|census: ColonyCensus| census.snapshot()).map_err(|e| e.to_string())?;
        println!("{}", serde_json::to_string(&stats)?);
    }

    Ok(())
}
