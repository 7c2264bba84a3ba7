use bevy::prelude::*;

pub mod bee;
pub mod config;
pub mod error;
pub mod nectar;
pub mod pools;
pub mod presentation;
pub mod profiling;
pub mod simulation;
pub mod spawn;
pub mod telemetry;

use config::ConfigPlugin;
use simulation::SimulationPlugin;
use telemetry::TelemetryPlugin;

/// Startup ordering: config must be in place before the colony is spawned.
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum StartupSet {
    LoadConfig,
    ApplyConfig,
    Spawn,
}

/// Headless colony: config loading, the tick scheduler, spawning and telemetry.
///
/// Rendering lives in [`presentation::PresentationPlugin`] and is added by the binary.
pub struct ColonyPlugin;

impl Plugin for ColonyPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((ConfigPlugin, SimulationPlugin, TelemetryPlugin))
            .configure_sets(
                Startup,
                (StartupSet::LoadConfig, StartupSet::ApplyConfig, StartupSet::Spawn).chain(),
            )
            .add_systems(
                Startup,
                (
                    simulation::systems::init_sim_config_from_initial.in_set(StartupSet::ApplyConfig),
                    spawn::spawn_colony_from_config.in_set(StartupSet::Spawn),
                ),
            );
    }
}
