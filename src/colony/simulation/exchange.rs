/// Nectar exchange between bees and the pools they are parked at.
///
/// Pools are the only shared mutable state in the colony, so writes are routed
/// by owner instead of locked:
///
/// 1. every bee emits a [`Claim`] (agent-owned data only, runs in parallel)
/// 2. claims are grouped by pool and each pool settles its own group
///    (pools run in parallel, claims within one pool in bee order)
/// 3. every bee applies its [`Grant`] and decides where to go next
///
/// No pool is written by two workers, no bee is written by two workers, and a
/// pool can never be overdrawn.

use bevy::prelude::*;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::colony::bee::{AtFlower, AtHive, BeeData, BeeState, FlightPath};
use crate::colony::error::SimError;
use crate::colony::nectar::{per_tick, Nectar};
use crate::colony::pools::{agent_rng, Flower, FlowerRegistry, Hive, HiveRegistry};
use crate::colony::profiling::profile;
use crate::colony::simulation::components::{SimPosition, SimRotation, SimVelocity};
use crate::colony::simulation::resources::{SimConfig, SimTick};
use crate::colony::simulation::transitions::{ShardedLog, Transition, TransitionLog};

// ============================================================================
// Claims & Grants
// ============================================================================

/// A bee asking a flower for nectar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Claim {
    pub bee: Entity,
    pub pool: Entity,
    pub requested: Nectar,
}

/// A flower's answer to one [`Claim`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grant {
    pub bee: Entity,
    pub amount: Nectar,
    /// Whether the flower was empty once every claim against it this tick was settled.
    pub pool_empty: bool,
}

/// What a bee at a flower asks for: the per-tick rate, limited by its free space.
pub fn flower_request(bee: &BeeData, rate_per_tick: Nectar) -> Nectar {
    rate_per_tick.min(bee.room()).max(Nectar::ZERO)
}

/// What a bee at its hive hands over: the per-tick rate, limited by its load.
pub fn hive_deposit(bee: &BeeData, rate_per_tick: Nectar) -> Nectar {
    rate_per_tick.min(bee.carried).max(Nectar::ZERO)
}

/// Settles every claim against one flower, in the order given.
///
/// A flower that is empty (`amount <= epsilon`) before settling gives nothing.
/// Otherwise each claim gets `min(requested, remaining)`, so the flower ends at
/// `max(amount - Σrequested, 0)` whatever the claim order.
pub fn settle_flower(flower: &mut Flower, claims: &[Claim], epsilon: Nectar) -> SmallVec<[Grant; 8]> {
    let dry = flower.is_empty(epsilon);
    let mut grants: SmallVec<[Grant; 8]> = claims
        .iter()
        .map(|claim| {
            let amount = if dry {
                Nectar::ZERO
            } else {
                claim.requested.min(flower.amount).max(Nectar::ZERO)
            };
            flower.amount -= amount;
            Grant {
                bee: claim.bee,
                amount,
                pool_empty: false,
            }
        })
        .collect();

    let empty = flower.is_empty(epsilon);
    for grant in grants.iter_mut() {
        grant.pool_empty = empty;
    }
    grants
}

/// Checks a partition's preconditions before anything in it is touched, so a
/// failing tick leaves pools, bees and the transition log as they were.
///
/// Every bee needs a live, registered home, and a bee that may have to pick a
/// flower needs a non-empty flower registry.
fn check_partition<'a>(
    bees: impl IntoIterator<Item = (Entity, &'a BeeData, bool)>,
    hive_registry: &HiveRegistry,
    flower_registry: &FlowerRegistry,
    is_live_hive: impl Fn(Entity) -> bool,
) -> Result<(), SimError> {
    for (bee, data, may_pick_flower) in bees {
        if !hive_registry.contains(data.home) || !is_live_hive(data.home) {
            return Err(SimError::MissingHome { bee, home: data.home });
        }
        if may_pick_flower && flower_registry.is_empty() {
            return Err(SimError::EmptyRegistry { pool: "flower" });
        }
    }
    Ok(())
}

fn first_error(errors: &mut ShardedLog<SimError>) -> Result {
    match errors.drain().into_iter().next() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

// ============================================================================
// Hive Partition
// ============================================================================

/// Bees at home unload, then leave for a random flower once empty.
#[profile(2000)]
pub fn exchange_at_hives(
    mut bees: Query<(Entity, &mut BeeData, &SimPosition, &mut SimVelocity), With<AtHive>>,
    mut hives: Query<(Entity, &mut Hive)>,
    flower_registry: Res<FlowerRegistry>,
    hive_registry: Res<HiveRegistry>,
    config: Res<SimConfig>,
    transitions: Res<TransitionLog>,
    tick: Res<SimTick>,
) -> Result {
    let rate = per_tick(config.hive_transfer_rate, config.delta_seconds());
    let epsilon = config.epsilon;
    let tick_value = tick.0;
    let (flower_registry, hive_registry, transitions) = (&*flower_registry, &*hive_registry, &*transitions);

    check_partition(
        bees.iter().map(|(bee, data, ..)| {
            let leaves = (data.carried - hive_deposit(data, rate)) <= epsilon;
            (bee, data, leaves)
        }),
        hive_registry,
        flower_registry,
        |home| hives.contains(home),
    )?;

    let mut deposits: ShardedLog<(Entity, Nectar)> = ShardedLog::default();
    let mut errors: ShardedLog<SimError> = ShardedLog::default();

    for_each_agent!(config.execution_mode, bees, |(bee, mut data, position, mut velocity)| {
        velocity.0 = Vec3::ZERO;
        let deposit = hive_deposit(&data, rate);
        if deposit > Nectar::ZERO {
            data.carried -= deposit;
            deposits.push((data.home, deposit));
        }

        if data.is_depleted(epsilon) {
            match flower_registry.pick_random(&mut agent_rng(bee, tick_value)) {
                Ok((flower, snapshot)) => transitions.record(
                    bee,
                    Transition::depart(
                        BeeState::AtHive,
                        BeeState::TravellingToFlower,
                        flower,
                        FlightPath::new(position.0, snapshot.position, data.speed),
                    ),
                ),
                Err(err) => errors.push(err),
            }
        }
    });
    first_error(&mut errors)?;

    // Exact fixed-point sums, so drain order doesn't matter
    let mut totals: FxHashMap<Entity, Nectar> = FxHashMap::default();
    for (hive, amount) in deposits.drain() {
        *totals.entry(hive).or_default() += amount;
    }
    let totals = &totals;

    for_each_agent!(config.execution_mode, hives, |(hive, mut pool)| {
        if let Some(amount) = totals.get(&hive) {
            pool.amount += *amount;
        }
    });

    crate::profile_log!(tick, "[EXCHANGE] hives received from {} bees", bees.iter().len());
    Ok(())
}

// ============================================================================
// Flower Partition
// ============================================================================

/// Bees at a flower hover, drink, and leave when full or when the flower runs dry.
///
/// Saturation wins over depletion: a full bee flies home even if it also
/// emptied the flower. A bee whose target is gone draws a new flower.
#[profile(2000)]
pub fn exchange_at_flowers(
    mut bees: Query<
        (
            Entity,
            &mut BeeData,
            &mut SimPosition,
            &mut SimVelocity,
            &mut SimRotation,
        ),
        With<AtFlower>,
    >,
    mut flowers: Query<(Entity, &mut Flower)>,
    hives: Query<(), With<Hive>>,
    flower_registry: Res<FlowerRegistry>,
    hive_registry: Res<HiveRegistry>,
    config: Res<SimConfig>,
    transitions: Res<TransitionLog>,
    tick: Res<SimTick>,
) -> Result {
    let dt = config.delta_seconds();
    let rate = per_tick(config.flower_transfer_rate, dt);
    let epsilon = config.epsilon;
    let hover_radius = config.flight.arrival_radius;
    let spin = Vec3::ONE.normalize() * config.hover_spin * dt;
    let tick_value = tick.0;
    let (flower_registry, hive_registry, transitions) = (&*flower_registry, &*hive_registry, &*transitions);

    // Any bee here may be redirected or sent home this tick
    check_partition(
        bees.iter().map(|(bee, data, ..)| (bee, data, true)),
        hive_registry,
        flower_registry,
        |home| hives.contains(home),
    )?;

    let mut errors: ShardedLog<SimError> = ShardedLog::default();
    let mut claims: ShardedLog<Claim> = ShardedLog::default();

    // Phase 1: hover and claim
    {
        let flower_lookup = &flowers;
        for_each_agent!(config.execution_mode, bees, |(bee, data, mut position, mut velocity, mut rotation)| {
            let target = data
                .target
                .filter(|flower| flower_lookup.contains(*flower))
                .and_then(|flower| flower_registry.snapshot(flower).map(|snapshot| (flower, snapshot)));

            let Some((flower, snapshot)) = target else {
                match flower_registry.pick_random(&mut agent_rng(bee, tick_value)) {
                    Ok((next, next_snapshot)) => transitions.record(
                        bee,
                        Transition::depart(
                            BeeState::AtFlower,
                            BeeState::TravellingToFlower,
                            next,
                            FlightPath::new(position.0, next_snapshot.position, data.speed),
                        ),
                    ),
                    Err(err) => errors.push(err),
                }
                return;
            };

            let between = snapshot.position - position.0;
            velocity.0 = if between.length() > hover_radius { between } else { Vec3::ZERO };
            position.0 += velocity.0 * dt;
            rotation.0 = (rotation.0 * Quat::from_scaled_axis(spin)).normalize();

            if !data.is_saturated(epsilon) {
                claims.push(Claim {
                    bee,
                    pool: flower,
                    requested: flower_request(&data, rate),
                });
            }
        });
    }
    first_error(&mut errors)?;

    // Phase 2: each flower settles its own claims, in bee order
    let mut by_flower: FxHashMap<Entity, SmallVec<[Claim; 8]>> = FxHashMap::default();
    for claim in claims.drain() {
        by_flower.entry(claim.pool).or_default().push(claim);
    }
    for group in by_flower.values_mut() {
        group.sort_by_key(|claim| claim.bee);
    }

    let mut grants: ShardedLog<Grant> = ShardedLog::default();
    {
        let by_flower = &by_flower;
        let grants = &grants;
        for_each_agent!(config.execution_mode, flowers, |(flower, mut pool)| {
            if let Some(group) = by_flower.get(&flower) {
                for grant in settle_flower(&mut pool, group, epsilon) {
                    grants.push(grant);
                }
            }
        });
    }
    let grants: FxHashMap<Entity, Grant> = grants.drain().into_iter().map(|grant| (grant.bee, grant)).collect();

    // Phase 3: apply grants and decide
    {
        let flower_lookup = &flowers;
        let grants = &grants;
        for_each_agent!(config.execution_mode, bees, |(bee, mut data, position, _velocity, _rotation)| {
            let valid = data
                .target
                .is_some_and(|flower| flower_lookup.contains(flower) && flower_registry.contains(flower));
            if !valid {
                // Already redirected in phase 1
                return;
            }

            let grant = grants.get(&bee).copied();
            if let Some(grant) = grant {
                data.carried += grant.amount;
            }

            if data.is_saturated(epsilon) {
                match hive_registry.snapshot(data.home) {
                    Some(home) => transitions.record(
                        bee,
                        Transition::depart(
                            BeeState::AtFlower,
                            BeeState::TravellingToHome,
                            data.home,
                            FlightPath::new(position.0, home.position, data.speed),
                        ),
                    ),
                    None => errors.push(SimError::MissingHome { bee, home: data.home }),
                }
            } else if grant.is_some_and(|grant| grant.pool_empty) {
                match flower_registry.pick_random(&mut agent_rng(bee, tick_value)) {
                    Ok((next, snapshot)) => transitions.record(
                        bee,
                        Transition::depart(
                            BeeState::AtFlower,
                            BeeState::TravellingToFlower,
                            next,
                            FlightPath::new(position.0, snapshot.position, data.speed),
                        ),
                    ),
                    Err(err) => errors.push(err),
                }
            }
        });
    }
    first_error(&mut errors)?;

    crate::profile_log!(tick, "[EXCHANGE] {} flowers settled claims", by_flower.len());
    Ok(())
}
