use std::path::Path;

use bevy::prelude::*;
use bevy_common_assets::ron::RonAssetPlugin;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::colony::simulation::resources::{ExecutionMode, FlightParams};
use crate::colony::simulation::systems::update_sim_from_runtime_config;
use crate::colony::StartupSet;

pub const INITIAL_CONFIG_PATH: &str = "assets/initial_config.ron";

/// Largest nectar quantity or rate a config may name. Colony totals of many
/// such values still fit [`crate::colony::nectar::Nectar`].
pub const MAX_NECTAR_SETTING: f32 = 1.0e9;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Static configuration loaded once at startup. These values shape the colony
/// (population, layout, nectar economy) and are never changed mid-run.
///
/// Missing fields take their default, so a config file only needs the values it
/// overrides.
#[derive(Resource, Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct InitialConfig {
    // Simulation
    pub tick_rate: f64,
    pub execution_mode: ExecutionMode,
    pub seed: u64,

    // Colony layout
    pub num_bees: usize,
    pub num_hives: usize,
    pub num_flowers: usize,
    pub world_size: f32,
    pub flower_height: f32,
    pub hive_height: f32,

    // Agents
    pub bee_capacity: f32,
    pub bee_speed_min: f32,
    pub bee_speed_max: f32,

    // Pools
    pub flower_capacity_min: f32,
    pub flower_capacity_max: f32,
    pub hive_nectar_min: f32,
    pub hive_nectar_max: f32,

    // Nectar economy (per second)
    pub flower_transfer_rate: f32,
    pub hive_transfer_rate: f32,
    pub regeneration_rate: f32,
    pub nectar_epsilon: f32,

    // Movement
    pub hover_spin: f32,
    pub flight: FlightParams,
}

impl Default for InitialConfig {
    fn default() -> Self {
        Self {
            tick_rate: 30.0,
            execution_mode: ExecutionMode::Parallel,
            seed: 42,
            num_bees: 2000,
            num_hives: 3,
            num_flowers: 300,
            world_size: 100.0,
            flower_height: 5.0,
            hive_height: 5.0,
            bee_capacity: 10.0,
            bee_speed_min: 12.0,
            bee_speed_max: 18.0,
            flower_capacity_min: 5.0,
            flower_capacity_max: 20.0,
            hive_nectar_min: 5.0,
            hive_nectar_max: 20.0,
            flower_transfer_rate: 5.0,
            hive_transfer_rate: 5.0,
            regeneration_rate: 1.5,
            nectar_epsilon: 0.01,
            hover_spin: 2.0 * 3f32.sqrt(),
            flight: FlightParams::default(),
        }
    }
}

impl InitialConfig {
    pub fn from_ron_str(contents: &str) -> Result<Self, ConfigError> {
        let config: InitialConfig = ron::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_ron_str(&contents)
    }

    /// Rejects values the spawner or the exchange cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn check(ok: bool, message: &str) -> Result<(), ConfigError> {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::Invalid(message.to_string()))
            }
        }

        fn in_nectar_range(value: f32) -> bool {
            value.is_finite() && (0.0..=MAX_NECTAR_SETTING).contains(&value)
        }

        check(self.tick_rate.is_finite() && self.tick_rate > 0.0, "tick_rate must be positive")?;
        check(self.world_size.is_finite() && self.world_size > 0.0, "world_size must be positive")?;
        if self.num_bees > 0 {
            check(self.num_hives > 0, "bees need at least one hive")?;
            check(self.num_flowers > 0, "bees need at least one flower")?;
        }
        check(
            in_nectar_range(self.bee_capacity) && self.bee_capacity > 0.0,
            "bee_capacity must be positive and within nectar range",
        )?;
        check(
            self.bee_speed_min > 0.0 && self.bee_speed_max.is_finite() && self.bee_speed_min <= self.bee_speed_max,
            "bee speed range must be positive and ordered",
        )?;
        check(
            self.flower_capacity_min > 0.0
                && in_nectar_range(self.flower_capacity_max)
                && self.flower_capacity_min <= self.flower_capacity_max,
            "flower capacity range must be positive, ordered and within nectar range",
        )?;
        check(
            in_nectar_range(self.hive_nectar_min)
                && in_nectar_range(self.hive_nectar_max)
                && self.hive_nectar_min <= self.hive_nectar_max,
            "hive nectar range must be non-negative, ordered and within nectar range",
        )?;
        check(
            in_nectar_range(self.flower_transfer_rate)
                && in_nectar_range(self.hive_transfer_rate)
                && in_nectar_range(self.regeneration_rate),
            "nectar rates must be finite, non-negative and within nectar range",
        )?;
        check(in_nectar_range(self.nectar_epsilon), "nectar_epsilon must be finite and non-negative")?;
        check(self.flight.arrival_radius > 0.0, "flight.arrival_radius must be positive")?;
        Ok(())
    }
}

/// Runtime configuration that can be hot-reloaded.
/// Nothing here changes the colony's outcome.
#[derive(Deserialize, Serialize, Asset, TypePath, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub execution_mode: ExecutionMode,
    pub telemetry_interval_secs: f32,
    /// Blend rendered positions between ticks.
    pub interpolate: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            execution_mode: ExecutionMode::Parallel,
            telemetry_interval_secs: 1.0,
            interpolate: true,
        }
    }
}

#[derive(Resource)]
pub struct RuntimeConfigHandle(pub Handle<RuntimeConfig>);

/// Config loading. Needs `AssetPlugin` for the hot-reloadable runtime config.
pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(RonAssetPlugin::<RuntimeConfig>::new(&["runtime_config.ron"]))
            .add_systems(
                Startup,
                (load_initial_config, setup_runtime_config).chain().in_set(StartupSet::LoadConfig),
            )
            .add_systems(Update, update_sim_from_runtime_config);
    }
}

/// Load static initial configuration synchronously at startup.
/// This must complete before the colony is spawned.
fn load_initial_config(mut commands: Commands) {
    match InitialConfig::load(INITIAL_CONFIG_PATH) {
        Ok(config) => {
            info!("Loaded initial config from {}", INITIAL_CONFIG_PATH);
            commands.insert_resource(config);
        }
        Err(e) => {
            error!("{}", e);
            error!("Using default InitialConfig");
            commands.insert_resource(InitialConfig::default());
        }
    }
}

/// Load runtime configuration asynchronously (can be hot-reloaded).
fn setup_runtime_config(mut commands: Commands, asset_server: Res<AssetServer>) {
    let handle = asset_server.load("runtime_config.ron");
    commands.insert_resource(RuntimeConfigHandle(handle));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(InitialConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config = InitialConfig::from_ron_str("(num_bees: 10, execution_mode: Serial, flight: (lift_cap: 0.0))").unwrap();
        assert_eq!(config.num_bees, 10);
        assert_eq!(config.execution_mode, ExecutionMode::Serial);
        assert_eq!(config.flight.lift_cap, 0.0);
        assert_eq!(config.flight.arrival_radius, 1.0);
        assert_eq!(config.num_flowers, InitialConfig::default().num_flowers);
    }

    #[test]
    fn bees_without_flowers_are_rejected() {
        let result = InitialConfig::from_ron_str("(num_bees: 5, num_flowers: 0)");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        let config = InitialConfig {
            flower_capacity_min: 30.0,
            flower_capacity_max: 5.0,
            ..default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn nectar_values_outside_fixed_range_are_rejected() {
        let cases = [
            InitialConfig { flower_transfer_rate: f32::INFINITY, ..default() },
            InitialConfig { hive_transfer_rate: 1.0e20, ..default() },
            InitialConfig { regeneration_rate: f32::NAN, ..default() },
            InitialConfig { nectar_epsilon: f32::INFINITY, ..default() },
            InitialConfig { bee_capacity: 1.0e15, ..default() },
            InitialConfig { flower_capacity_max: f32::INFINITY, ..default() },
            InitialConfig { hive_nectar_max: 1.0e30, ..default() },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "accepted {:?}",
                config
            );
        }
    }

    #[test]
    fn largest_allowed_settings_convert_to_nectar() {
        let config = InitialConfig {
            flower_transfer_rate: MAX_NECTAR_SETTING,
            bee_capacity: MAX_NECTAR_SETTING,
            flower_capacity_max: MAX_NECTAR_SETTING,
            ..default()
        };
        assert!(config.validate().is_ok());
        let sim = crate::colony::simulation::SimConfig::from_initial(&config);
        assert_eq!(sim.flower_transfer_rate, crate::colony::nectar::Nectar::from_num(MAX_NECTAR_SETTING));
    }

    #[test]
    fn malformed_ron_is_a_parse_error() {
        let result = InitialConfig::from_ron_str("(num_bees: \"many\")");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = InitialConfig::load("does/not/exist.ron");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
