/// Simulation layer - the per-tick colony update.
///
/// This module is organized into:
/// - **components**: Kinematic components shared by bees and pools
/// - **resources**: Tick counter, simulation config, ledgers
/// - **flight**: Flight integrator and the travelling partitions
/// - **exchange**: Nectar exchange at flowers and hives
/// - **regeneration**: Flower refill
/// - **transitions**: Deferred state changes applied at the end of a tick
/// - **systems**: Tick bookkeeping and config application

use bevy::prelude::*;

/// Runs `$body` for every item of `$query`, on the compute task pool when the
/// mode is `Parallel`. The body must only touch the item and thread-safe sinks.
macro_rules! for_each_agent {
    ($mode:expr, $query:expr, |$item:pat_param| $body:block) => {
        match $mode {
            $crate::colony::simulation::resources::ExecutionMode::Serial => {
                $query.iter_mut().for_each(|$item| $body)
            }
            $crate::colony::simulation::resources::ExecutionMode::Parallel => {
                $query.par_iter_mut().for_each(|$item| $body)
            }
        }
    };
}

pub mod components;
pub mod exchange;
pub mod flight;
pub mod regeneration;
pub mod resources;
pub mod systems;
pub mod transitions;

pub use components::*;
pub use resources::*;
pub use transitions::{Retarget, Transition, TransitionLog};

use crate::colony::bee::{TravellingToFlower, TravellingToHome};
use crate::colony::pools::{FlowerRegistry, HiveRegistry};

/// Ordered phases of one tick.
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum SimSet {
    Bookkeeping,  // Tick counter, previous-state cache
    Flight,       // Travelling bees move
    Exchange,     // Bees at pools trade nectar
    Regeneration, // Flowers refill
    Commit,       // Deferred transitions applied
}

/// Main simulation plugin
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        // Replaced from SimConfig::tick_rate at startup
        app.insert_resource(Time::<Fixed>::from_seconds(1.0 / 30.0));

        app.init_resource::<SimConfig>();
        app.init_resource::<SimTick>();
        app.init_resource::<SimPerformance>();
        app.init_resource::<TransitionLog>();
        app.init_resource::<RegenerationLedger>();
        app.init_resource::<FlowerRegistry>();
        app.init_resource::<HiveRegistry>();

        app.configure_sets(
            FixedUpdate,
            (
                SimSet::Bookkeeping,
                SimSet::Flight,
                SimSet::Exchange,
                SimSet::Regeneration,
                SimSet::Commit,
            )
                .chain(),
        );

        app.add_systems(
            FixedUpdate,
            (
                // Tick counter first so every system sees the current tick
                systems::increment_sim_tick
                    .before(systems::sim_start)
                    .in_set(SimSet::Bookkeeping),
                systems::sim_start.in_set(SimSet::Bookkeeping),
                systems::cache_previous_state
                    .after(systems::sim_start)
                    .in_set(SimSet::Bookkeeping),
                (
                    flight::fly::<TravellingToFlower>,
                    flight::fly::<TravellingToHome>,
                )
                    .chain()
                    .in_set(SimSet::Flight),
                (exchange::exchange_at_hives, exchange::exchange_at_flowers)
                    .chain()
                    .in_set(SimSet::Exchange),
                regeneration::regenerate_flowers.in_set(SimSet::Regeneration),
                transitions::commit_transitions.in_set(SimSet::Commit),
                systems::sim_end.after(SimSet::Commit),
            ),
        );
    }
}
