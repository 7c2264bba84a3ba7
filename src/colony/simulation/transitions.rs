/// Deferred state transitions.
///
/// Partitions never change a bee's state tag while a tick is running. They
/// append a [`Transition`] to the [`TransitionLog`] instead, and
/// [`commit_transitions`] replays the log single-threaded, in bee order, at the
/// end of the tick.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use bevy::prelude::*;

use crate::colony::bee::{BeeData, BeeState, BeeTags, FlightPath};
use crate::colony::error::SimError;

// ============================================================================
// Sharded Append Log
// ============================================================================

// Power of two so the shard index is a mask
const NUM_SHARDS: usize = 16;

/// Append-only buffer that parallel workers push into through `&self`.
///
/// Pushes are spread round-robin over 16 mutex-guarded shards to keep
/// contention low. Drain order is arbitrary; callers sort what they drain.
pub struct ShardedLog<T> {
    shards: Vec<Mutex<Vec<T>>>,
    counter: AtomicUsize,
}

impl<T> Default for ShardedLog<T> {
    fn default() -> Self {
        Self {
            shards: (0..NUM_SHARDS).map(|_| Mutex::new(Vec::new())).collect(),
            counter: AtomicUsize::new(0),
        }
    }
}

impl<T> ShardedLog<T> {
    pub fn push(&self, item: T) {
        let shard = self.counter.fetch_add(1, Ordering::Relaxed) & (NUM_SHARDS - 1);
        // A panicking worker never leaves a half-pushed Vec behind
        self.shards[shard]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item);
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes every entry, leaving the log empty.
    pub fn drain(&mut self) -> Vec<T> {
        self.counter.store(0, Ordering::Relaxed);
        self.shards
            .iter_mut()
            .flat_map(|shard| std::mem::take(shard.get_mut().unwrap_or_else(PoisonError::into_inner)))
            .collect()
    }
}

// ============================================================================
// Transitions
// ============================================================================

/// What happens to [`BeeData::target`] when a transition commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retarget {
    Keep,
    Clear,
    To(Entity),
}

/// One state change for one bee.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    /// State the bee was in when the change was decided. Checked at commit.
    pub from: BeeState,
    pub to: BeeState,
    pub retarget: Retarget,
    /// New flight leg, if the bee sets off somewhere.
    pub flight: Option<FlightPath>,
}

impl Transition {
    /// End of a flight leg. Arriving home clears the target until the next flower is drawn.
    pub fn arrive(from: BeeState, to: BeeState) -> Self {
        Self {
            from,
            to,
            retarget: if to == BeeState::AtHive { Retarget::Clear } else { Retarget::Keep },
            flight: None,
        }
    }

    /// Start of a flight leg toward `target`.
    pub fn depart(from: BeeState, to: BeeState, target: Entity, flight: FlightPath) -> Self {
        Self {
            from,
            to,
            retarget: Retarget::To(target),
            flight: Some(flight),
        }
    }
}

/// Transitions recorded during the current tick.
#[derive(Resource, Default)]
pub struct TransitionLog(ShardedLog<(Entity, Transition)>);

impl TransitionLog {
    pub fn record(&self, bee: Entity, transition: Transition) {
        self.0.push((bee, transition));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drains the log, ordered by bee so replay is independent of thread scheduling.
    pub fn take_sorted(&mut self) -> Vec<(Entity, Transition)> {
        let mut entries = self.0.drain();
        entries.sort_by_key(|(bee, _)| *bee);
        entries
    }
}

// ============================================================================
// Commit
// ============================================================================

/// Applies this tick's transitions.
///
/// Two transitions for one bee, a transition whose `from` no longer matches, or a
/// bee without exactly one state tag are fatal. A bee that was despawned since
/// its transition was recorded is skipped.
pub fn commit_transitions(
    mut commands: Commands,
    mut log: ResMut<TransitionLog>,
    mut bees: Query<(&mut BeeData, &mut FlightPath, BeeTags)>,
) -> Result {
    let entries = log.take_sorted();
    let mut previous = None;

    for (bee, transition) in entries {
        if previous == Some(bee) {
            return Err(SimError::DuplicateTransition { bee }.into());
        }
        previous = Some(bee);

        let Ok((mut data, mut flight, tags)) = bees.get_mut(bee) else {
            warn!("Dropping transition for despawned bee {}", bee);
            continue;
        };

        let found = BeeState::from_tags(tags).map_err(|count| SimError::CorruptStateTags { bee, count })?;
        if found != transition.from {
            return Err(SimError::StaleTransition {
                bee,
                expected: transition.from,
                found,
            }
            .into());
        }

        match transition.retarget {
            Retarget::Keep => {}
            Retarget::Clear => data.target = None,
            Retarget::To(pool) => data.target = Some(pool),
        }
        if let Some(path) = transition.flight {
            *flight = path;
        }

        let mut entity = commands.entity(bee);
        transition.from.remove_tag(&mut entity);
        transition.to.insert_tag(&mut entity);
    }

    Ok(())
}
