/// Resource definitions for the simulation.
///
/// This module contains the tick counter, the simulation-side configuration
/// and the bookkeeping resources tests use to check conservation.

use std::time::{Duration, Instant};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::colony::config::InitialConfig;
use crate::colony::nectar::Nectar;

// ============================================================================
// Tick Counter
// ============================================================================

/// Number of completed simulation ticks. Seeds per-agent randomness.
#[derive(Resource, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimTick(pub u64);

impl SimTick {
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

// ============================================================================
// Performance Tracking
// ============================================================================

/// Wall-clock cost of the last tick.
#[derive(Resource, Default)]
pub struct SimPerformance {
    pub start_time: Option<Instant>,
    pub last_duration: Duration,
}

// ============================================================================
// Simulation Configuration
// ============================================================================

/// How agent partitions are iterated. Both modes produce identical worlds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// `iter_mut` on the main thread
    Serial,
    /// `par_iter_mut` on the compute task pool
    #[default]
    Parallel,
}

/// Tuning for the flight integrator.
///
/// Distances in world units, frequencies in radians per second of flight time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightParams {
    /// A bee this close to its destination has arrived.
    pub arrival_radius: f32,
    /// Cruise velocity is `speed * straight_factor`.
    pub straight_factor: f32,
    /// No wiggle closer than this, so the final approach is clean.
    pub wiggle_min_distance: f32,
    pub vertical_frequency: f32,
    pub vertical_amplitude: f32,
    pub horizontal_frequency: f32,
    pub horizontal_amplitude: f32,
    pub wiggle_impulse: f32,
    pub inverse_mass: f32,
    /// Upward pull `lift_gain / sqrt(distance_from_origin)` on the first half of a leg.
    pub lift_gain: f32,
    pub lift_cap: f32,
    /// Per-second rate at which velocity approaches the desired velocity.
    pub velocity_smoothing: f32,
    /// Per-second rate at which orientation turns to face the velocity.
    pub rotation_smoothing: f32,
}

impl Default for FlightParams {
    fn default() -> Self {
        Self {
            arrival_radius: 1.0,
            straight_factor: 5.0,
            wiggle_min_distance: 2.0,
            vertical_frequency: 7.0,
            vertical_amplitude: 0.2,
            horizontal_frequency: 15.0,
            horizontal_amplitude: 0.5,
            wiggle_impulse: 250.0,
            inverse_mass: 0.1,
            lift_gain: 10.0,
            lift_cap: 100.0,
            velocity_smoothing: 1.5,
            rotation_smoothing: 10.0,
        }
    }
}

/// Simulation parameters, converted once from [`InitialConfig`].
///
/// Nectar rates are stored as [`Nectar`] so the exchange never touches floats.
/// `execution_mode` is the only field the runtime config may change mid-run.
#[derive(Resource, Debug, Clone)]
pub struct SimConfig {
    pub tick_rate: f64,
    pub execution_mode: ExecutionMode,
    /// Nectar per second a bee drinks from a flower.
    pub flower_transfer_rate: Nectar,
    /// Nectar per second a bee deposits into its hive.
    pub hive_transfer_rate: Nectar,
    /// Nectar per second a flower regains.
    pub regeneration_rate: Nectar,
    pub epsilon: Nectar,
    /// Spin of a feeding bee, radians per second.
    pub hover_spin: f32,
    pub flight: FlightParams,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: 30.0,
            execution_mode: ExecutionMode::Parallel,
            flower_transfer_rate: Nectar::from_num(5),
            hive_transfer_rate: Nectar::from_num(5),
            regeneration_rate: Nectar::from_num(1.5),
            epsilon: Nectar::from_num(0.01),
            hover_spin: 2.0 * 3f32.sqrt(),
            flight: FlightParams::default(),
        }
    }
}

impl SimConfig {
    pub fn from_initial(config: &InitialConfig) -> Self {
        Self {
            tick_rate: config.tick_rate,
            execution_mode: config.execution_mode,
            flower_transfer_rate: Nectar::from_num(config.flower_transfer_rate),
            hive_transfer_rate: Nectar::from_num(config.hive_transfer_rate),
            regeneration_rate: Nectar::from_num(config.regeneration_rate),
            epsilon: Nectar::from_num(config.nectar_epsilon),
            hover_spin: config.hover_spin,
            flight: config.flight,
        }
    }

    /// Simulated seconds per tick.
    pub fn delta_seconds(&self) -> f32 {
        (1.0 / self.tick_rate) as f32
    }
}

// ============================================================================
// Ledgers
// ============================================================================

/// Nectar created by flower regeneration.
///
/// Regeneration is the only source of new nectar, so
/// `Σflower + Σhive + Σcarried` moves between ticks by exactly `last_tick`.
#[derive(Resource, Debug, Default, Clone, Copy)]
pub struct RegenerationLedger {
    pub last_tick: Nectar,
    pub total: Nectar,
}
