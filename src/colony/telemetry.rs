//! Colony-wide statistics.
//!
//! [`ColonyCensus`] is a pull-based view over every pool and bee. The
//! [`TelemetryPlugin`] logs a [`ColonyStats`] snapshot on a timer.

use std::time::Duration;

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use serde::Serialize;

use crate::colony::bee::{BeeData, BeeState, BeeTags};
use crate::colony::nectar::{self, Nectar};
use crate::colony::pools::{Flower, Hive};
use crate::colony::simulation::resources::SimTick;

/// Flowers holding less than this are "nearly empty" in reports.
const NEARLY_EMPTY_BELOW: f32 = 1.0;

/// Bees per state tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub travelling_to_flower: usize,
    pub travelling_to_home: usize,
    pub at_flower: usize,
    pub at_hive: usize,
    /// Bees without exactly one state tag. Always zero between ticks.
    pub corrupt: usize,
}

impl StateCounts {
    fn count(&mut self, state: Result<BeeState, usize>) {
        match state {
            Ok(BeeState::TravellingToFlower) => self.travelling_to_flower += 1,
            Ok(BeeState::TravellingToHome) => self.travelling_to_home += 1,
            Ok(BeeState::AtFlower) => self.at_flower += 1,
            Ok(BeeState::AtHive) => self.at_hive += 1,
            Err(_) => self.corrupt += 1,
        }
    }
}

/// Snapshot of the colony, suitable for logging or export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColonyStats {
    pub tick: u64,
    pub flowers: usize,
    pub avg_flower_fill_pct: f32,
    pub nearly_empty_flower_pct: f32,
    pub bees: usize,
    pub avg_bee_load_pct: f32,
    pub states: StateCounts,
    /// Nectar per hive, in entity order.
    pub hive_nectar: Vec<f64>,
    pub flower_nectar_total: f64,
    pub hive_nectar_total: f64,
    pub carried_nectar_total: f64,
}

fn percent_of(part: usize, whole: usize) -> f32 {
    if whole == 0 {
        0.0
    } else {
        part as f32 * 100.0 / whole as f32
    }
}

fn mean_pct(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0f32, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum * 100.0 / count as f32
    }
}

/// Read-only view over every pool and bee.
#[derive(SystemParam)]
pub struct ColonyCensus<'w, 's> {
    tick: Res<'w, SimTick>,
    flowers: Query<'w, 's, &'static Flower>,
    hives: Query<'w, 's, (Entity, &'static Hive)>,
    bees: Query<'w, 's, (&'static BeeData, BeeTags)>,
}

impl ColonyCensus<'_, '_> {
    pub fn snapshot(&self) -> ColonyStats {
        let flower_count = self.flowers.iter().len();
        let nearly_empty = self
            .flowers
            .iter()
            .filter(|flower| flower.amount.to_num::<f32>() < NEARLY_EMPTY_BELOW)
            .count();

        let mut states = StateCounts::default();
        for (_, tags) in self.bees.iter() {
            states.count(BeeState::from_tags(tags));
        }

        let mut hives: Vec<(Entity, Nectar)> = self.hives.iter().map(|(entity, hive)| (entity, hive.amount)).collect();
        hives.sort_by_key(|(entity, _)| *entity);

        ColonyStats {
            tick: self.tick.0,
            flowers: flower_count,
            avg_flower_fill_pct: mean_pct(self.flowers.iter().map(Flower::fill_ratio)),
            nearly_empty_flower_pct: percent_of(nearly_empty, flower_count),
            bees: self.bees.iter().len(),
            avg_bee_load_pct: mean_pct(self.bees.iter().map(|(bee, _)| bee.load_ratio())),
            states,
            hive_nectar: hives.iter().map(|(_, amount)| amount.to_num::<f64>()).collect(),
            flower_nectar_total: self.flower_nectar().to_num(),
            hive_nectar_total: self.hive_nectar().to_num(),
            carried_nectar_total: self.carried_nectar().to_num(),
        }
    }

    pub fn flower_nectar(&self) -> Nectar {
        nectar::total(self.flowers.iter().map(|flower| flower.amount))
    }

    pub fn hive_nectar(&self) -> Nectar {
        nectar::total(self.hives.iter().map(|(_, hive)| hive.amount))
    }

    pub fn carried_nectar(&self) -> Nectar {
        nectar::total(self.bees.iter().map(|(bee, _)| bee.carried))
    }

    /// Exact nectar held by flowers, hives and bees together.
    pub fn total_nectar(&self) -> Nectar {
        self.flower_nectar() + self.hive_nectar() + self.carried_nectar()
    }
}

/// Interval between telemetry log lines.
#[derive(Resource)]
pub struct TelemetryTimer(pub Timer);

impl Default for TelemetryTimer {
    fn default() -> Self {
        Self(Timer::from_seconds(1.0, TimerMode::Repeating))
    }
}

impl TelemetryTimer {
    pub fn set_interval(&mut self, seconds: f32) {
        self.0.set_duration(Duration::from_secs_f32(seconds.max(0.01)));
    }
}

pub struct TelemetryPlugin;

impl Plugin for TelemetryPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TelemetryTimer>()
            .add_systems(Update, log_colony_stats);
    }
}

pub fn log_colony_stats(time: Res<Time>, mut timer: ResMut<TelemetryTimer>, census: ColonyCensus) {
    if !timer.0.tick(time.delta()).just_finished() {
        return;
    }

    let stats = census.snapshot();
    info!(
        "[COLONY] tick {} | hives {:.1?} | flowers {:.1}% full, {:.1}% nearly empty | bees {:.1}% loaded | {:?}",
        stats.tick,
        stats.hive_nectar,
        stats.avg_flower_fill_pct,
        stats.nearly_empty_flower_pct,
        stats.avg_bee_load_pct,
        stats.states
    );
}
