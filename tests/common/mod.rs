#![allow(dead_code)]

use apiary::colony::bee::{AtFlower, AtHive, BeeData, BeeState, BeeTags, TravellingToFlower, TravellingToHome};
use apiary::colony::config::InitialConfig;
use apiary::colony::nectar::Nectar;
use apiary::colony::pools::{Flower, Hive};
use apiary::colony::simulation::{
    ExecutionMode, FlightParams, RegenerationLedger, SimConfig, SimPosition, SimTick, SimulationPlugin,
};
use apiary::colony::spawn::{ColonyBlueprint, SpawnedColony};
use apiary::colony::telemetry::{ColonyCensus, ColonyStats};
use bevy::ecs::system::RunSystemOnce;
use bevy::prelude::*;

/// Headless app running only the simulation.
pub fn sim_app(config: SimConfig) -> App {
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, SimulationPlugin));
    app.insert_resource(config);
    app
}

/// One tick per second, straight flight, no regeneration.
pub fn scenario_config() -> SimConfig {
    SimConfig {
        tick_rate: 1.0,
        execution_mode: ExecutionMode::Serial,
        regeneration_rate: Nectar::ZERO,
        flight: FlightParams {
            straight_factor: 1.0,
            lift_cap: 0.0,
            inverse_mass: 0.0,
            ..default()
        },
        ..default()
    }
}

pub fn spawn(app: &mut App, blueprint: ColonyBlueprint) -> SpawnedColony {
    blueprint.spawn_into(app.world_mut()).expect("blueprint should be valid")
}

/// Random colony from config, spawned into a fresh app.
pub fn config_app(config: &InitialConfig) -> (App, SpawnedColony) {
    let mut app = sim_app(SimConfig::from_initial(config));
    let colony = spawn(&mut app, ColonyBlueprint::from_config(config));
    (app, colony)
}

pub fn tick(app: &mut App) {
    app.world_mut().run_schedule(FixedUpdate);
}

pub fn ticks(app: &mut App, count: usize) {
    for _ in 0..count {
        tick(app);
    }
}

pub fn current_tick(app: &App) -> u64 {
    app.world().resource::<SimTick>().0
}

pub fn state_of(app: &App, bee: Entity) -> BeeState {
    let entity = app.world().entity(bee);
    BeeState::from_tags((
        entity.contains::<TravellingToFlower>(),
        entity.contains::<TravellingToHome>(),
        entity.contains::<AtFlower>(),
        entity.contains::<AtHive>(),
    ))
    .expect("bee should carry exactly one state tag")
}

/// Ticks until `bee` is in `state`; returns the number of ticks taken.
pub fn run_until(app: &mut App, bee: Entity, state: BeeState, max_ticks: usize) -> usize {
    for n in 1..=max_ticks {
        tick(app);
        if state_of(app, bee) == state {
            return n;
        }
    }
    panic!("bee did not reach {:?} within {} ticks (now {:?})", state, max_ticks, state_of(app, bee));
}

pub fn bee(app: &App, bee: Entity) -> BeeData {
    *app.world().get::<BeeData>(bee).expect("bee exists")
}

pub fn position(app: &App, entity: Entity) -> Vec3 {
    app.world().get::<SimPosition>(entity).expect("entity has a position").0
}

pub fn flower(app: &App, flower: Entity) -> Flower {
    *app.world().get::<Flower>(flower).expect("flower exists")
}

pub fn hive(app: &App, hive: Entity) -> Hive {
    *app.world().get::<Hive>(hive).expect("hive exists")
}

pub fn census(app: &mut App) -> ColonyStats {
    app.world_mut()
        .run_system_once(|census: ColonyCensus| census.snapshot())
        .expect("census runs")
}

pub fn total_nectar(app: &mut App) -> Nectar {
    app.world_mut()
        .run_system_once(|census: ColonyCensus| census.total_nectar())
        .expect("census runs")
}

pub fn last_regeneration(app: &App) -> Nectar {
    app.world().resource::<RegenerationLedger>().last_tick
}

/// Every bee's record, position and state, in entity order.
pub fn bee_snapshot(app: &mut App) -> Vec<(Entity, BeeData, Vec3, BeeState)> {
    let world = app.world_mut();
    let mut query = world.query::<(Entity, &BeeData, &SimPosition, BeeTags)>();
    let mut bees: Vec<_> = query
        .iter(world)
        .map(|(entity, data, pos, tags)| {
            (entity, *data, pos.0, BeeState::from_tags(tags).expect("exactly one state tag"))
        })
        .collect();
    bees.sort_by_key(|(entity, ..)| *entity);
    bees
}

/// Every pool amount, in entity order.
pub fn pool_snapshot(app: &mut App) -> (Vec<(Entity, Flower)>, Vec<(Entity, Hive)>) {
    let world = app.world_mut();
    let mut flowers: Vec<_> = world.query::<(Entity, &Flower)>().iter(world).map(|(e, f)| (e, *f)).collect();
    let mut hives: Vec<_> = world.query::<(Entity, &Hive)>().iter(world).map(|(e, h)| (e, *h)).collect();
    flowers.sort_by_key(|(entity, _)| *entity);
    hives.sort_by_key(|(entity, _)| *entity);
    (flowers, hives)
}
