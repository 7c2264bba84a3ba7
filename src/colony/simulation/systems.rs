/// Tick bookkeeping and config application.
///
/// This module contains systems for:
/// - Tick counting
/// - Previous-state caching for render interpolation
/// - Simulation timing
/// - Applying InitialConfig at startup and RuntimeConfig on hot reload

use bevy::prelude::*;

use crate::colony::bee::BeeData;
use crate::colony::config::{InitialConfig, RuntimeConfig, RuntimeConfigHandle};
use crate::colony::profiling::profile;
use crate::colony::telemetry::TelemetryTimer;
use crate::profile_log;

use super::components::*;
use super::resources::*;
use super::transitions::TransitionLog;

// ============================================================================
// Tick Management
// ============================================================================

/// Increment the global simulation tick counter.
///
/// Runs first in FixedUpdate so every later system, and every per-agent random
/// draw, sees the current tick.
pub fn increment_sim_tick(mut tick: ResMut<SimTick>) {
    tick.increment();
}

/// Cache previous positions for interpolation.
pub fn cache_previous_state(mut query: Query<(&mut SimPositionPrev, &SimPosition)>) {
    for (mut prev, pos) in query.iter_mut() {
        prev.0 = pos.0;
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Copy InitialConfig into SimConfig and set the fixed timestep.
pub fn init_sim_config_from_initial(
    mut fixed_time: ResMut<Time<Fixed>>,
    mut sim_config: ResMut<SimConfig>,
    initial_config: Option<Res<InitialConfig>>,
) {
    let config = match initial_config {
        Some(cfg) => cfg.clone(),
        None => {
            warn!("InitialConfig not found, using defaults");
            InitialConfig::default()
        }
    };

    fixed_time.set_timestep_seconds(1.0 / config.tick_rate);
    *sim_config = SimConfig::from_initial(&config);

    info!(
        "SimConfig ready: {} Hz, {:?}, flower rate {}, hive rate {}, regen {}",
        sim_config.tick_rate,
        sim_config.execution_mode,
        sim_config.flower_transfer_rate,
        sim_config.hive_transfer_rate,
        sim_config.regeneration_rate
    );
}

/// Apply hot-reloaded RuntimeConfig values.
///
/// Only settings that cannot change the colony's outcome are applied here:
/// both execution modes produce identical worlds.
pub fn update_sim_from_runtime_config(
    config_handle: Option<Res<RuntimeConfigHandle>>,
    runtime_configs: Res<Assets<RuntimeConfig>>,
    mut events: MessageReader<AssetEvent<RuntimeConfig>>,
    mut sim_config: ResMut<SimConfig>,
    mut telemetry: ResMut<TelemetryTimer>,
) {
    let Some(config_handle) = config_handle else {
        events.clear();
        return;
    };

    for event in events.read() {
        if event.is_modified(config_handle.0.id()) || event.is_loaded_with_dependencies(config_handle.0.id()) {
            if let Some(config) = runtime_configs.get(&config_handle.0) {
                info!(
                    "Runtime config loaded/updated: {:?}, telemetry every {}s",
                    config.execution_mode, config.telemetry_interval_secs
                );
                sim_config.execution_mode = config.execution_mode;
                telemetry.set_interval(config.telemetry_interval_secs);
            }
        }
    }
}

// ============================================================================
// Performance Tracking
// ============================================================================

/// Record tick start and log simulation status periodically
pub fn sim_start(
    mut stats: ResMut<SimPerformance>,
    #[allow(unused_variables)] tick: Res<SimTick>,
    #[allow(unused_variables)] bees: Query<&BeeData>,
    #[allow(unused_variables)] transitions: Res<TransitionLog>,
) {
    stats.start_time = Some(std::time::Instant::now());

    profile_log!(
        tick,
        "[SIM STATUS] Tick: {} | Bees: {} | Pending transitions: {} | Last sim duration: {:?}",
        tick.0,
        bees.iter().len(),
        transitions.len(),
        stats.last_duration
    );
}

/// Update simulation performance stats
///
/// Individual system timing is handled by the #[profile] macro.
#[profile(16000)] // Warn if the whole tick takes longer than 16ms
pub fn sim_end(mut stats: ResMut<SimPerformance>) {
    if let Some(start) = stats.start_time.take() {
        stats.last_duration = start.elapsed();
    }
}
