//! Resource pools (flowers and hives) and the registries bees pick targets from.
//!
//! Pools are ordinary entities. Bees never hold pool data, only the pool's
//! [`Entity`], which is resolved through a [`PoolRegistry`] (positions) or a
//! pool query (amounts). Registries are built once at spawn and are read-only
//! while a tick runs.

use std::marker::PhantomData;

use bevy::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;

use crate::colony::error::SimError;
use crate::colony::nectar::Nectar;

// ============================================================================
// Pool Components
// ============================================================================

/// A nectar source. Drained by bees, refilled by regeneration.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Flower {
    pub capacity: Nectar,
    pub amount: Nectar,
}

impl Flower {
    /// A flower that starts full.
    pub fn full(capacity: Nectar) -> Self {
        Self { capacity, amount: capacity }
    }

    pub fn is_empty(&self, epsilon: Nectar) -> bool {
        self.amount <= epsilon
    }

    pub fn fill_ratio(&self) -> f32 {
        crate::colony::nectar::ratio(self.amount, self.capacity)
    }

    /// Adds up to `amount` without exceeding capacity. Returns what was actually added.
    pub fn regenerate(&mut self, amount: Nectar) -> Nectar {
        let before = self.amount;
        self.amount = (self.amount + amount).min(self.capacity);
        self.amount - before
    }
}

/// A nectar sink. Unbounded.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct Hive {
    pub amount: Nectar,
}

/// Names a pool type in error messages.
pub trait PoolKind: Component {
    const NAME: &'static str;
}

impl PoolKind for Flower {
    const NAME: &'static str = "flower";
}

impl PoolKind for Hive {
    const NAME: &'static str = "hive";
}

// ============================================================================
// Registries
// ============================================================================

/// Tick-stable facts about a pool that agents may read while pools are being mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolSnapshot {
    pub position: Vec3,
}

/// Fixed list of every pool of one kind, with O(1) random and by-id lookup.
#[derive(Resource)]
pub struct PoolRegistry<P: PoolKind> {
    entries: Vec<(Entity, PoolSnapshot)>,
    index: FxHashMap<Entity, usize>,
    _kind: PhantomData<fn() -> P>,
}

pub type FlowerRegistry = PoolRegistry<Flower>;
pub type HiveRegistry = PoolRegistry<Hive>;

impl<P: PoolKind> Default for PoolRegistry<P> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<P: PoolKind> PoolRegistry<P> {
    pub fn new(entries: Vec<(Entity, PoolSnapshot)>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, (entity, _))| (*entity, i))
            .collect();
        Self {
            entries,
            index,
            _kind: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, pool: Entity) -> bool {
        self.index.contains_key(&pool)
    }

    pub fn snapshot(&self, pool: Entity) -> Option<PoolSnapshot> {
        self.index.get(&pool).map(|&i| self.entries[i].1)
    }

    /// Uniformly random pool.
    ///
    /// An empty registry is a spawn defect, so it is reported as an error rather
    /// than treated as "no target".
    pub fn pick_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<(Entity, PoolSnapshot), SimError> {
        if self.entries.is_empty() {
            return Err(SimError::EmptyRegistry { pool: P::NAME });
        }
        Ok(self.entries[rng.random_range(0..self.entries.len())])
    }
}

// ============================================================================
// Per-Agent Randomness
// ============================================================================

/// Fresh generator for one decision of one agent.
///
/// Seeded from the agent's id and the simulation tick, so parallel partitions
/// never share a generator and every draw can be reproduced in isolation.
pub fn agent_rng(agent: Entity, tick: u64) -> SmallRng {
    // splitmix64 finaliser
    let mut z = agent.to_bits() ^ tick.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    SmallRng::seed_from_u64(z ^ (z >> 31))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_of(world: &mut World, count: usize) -> FlowerRegistry {
        let entries = (0..count)
            .map(|i| {
                let entity = world.spawn_empty().id();
                (entity, PoolSnapshot { position: Vec3::new(i as f32, 0.0, 0.0) })
            })
            .collect();
        FlowerRegistry::new(entries)
    }

    #[test]
    fn empty_registry_is_an_error() {
        let registry = FlowerRegistry::default();
        let mut world = World::new();
        let bee = world.spawn_empty().id();
        let err = registry.pick_random(&mut agent_rng(bee, 0)).unwrap_err();
        assert_eq!(err, SimError::EmptyRegistry { pool: "flower" });
    }

    #[test]
    fn pick_is_roughly_uniform() {
        let mut world = World::new();
        let registry = registry_of(&mut world, 4);
        let bee = world.spawn_empty().id();

        let mut counts = [0usize; 4];
        for tick in 0..4000 {
            let (picked, snapshot) = registry.pick_random(&mut agent_rng(bee, tick)).unwrap();
            assert_eq!(registry.snapshot(picked), Some(snapshot));
            counts[snapshot.position.x as usize] += 1;
        }
        for count in counts {
            assert!((800..1200).contains(&count), "skewed pick distribution: {:?}", counts);
        }
    }

    #[test]
    fn agent_rng_is_reproducible() {
        let mut world = World::new();
        let registry = registry_of(&mut world, 50);
        let bee = world.spawn_empty().id();

        let first = registry.pick_random(&mut agent_rng(bee, 17)).unwrap();
        let second = registry.pick_random(&mut agent_rng(bee, 17)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn agents_draw_independently() {
        let mut world = World::new();
        let registry = registry_of(&mut world, 1000);
        let bees: Vec<Entity> = (0..8).map(|_| world.spawn_empty().id()).collect();

        let picks: Vec<Entity> = bees
            .iter()
            .map(|&bee| registry.pick_random(&mut agent_rng(bee, 3)).unwrap().0)
            .collect();
        let mut distinct = picks.clone();
        distinct.sort();
        distinct.dedup();
        assert!(distinct.len() > 1, "every agent drew the same flower: {:?}", picks);
    }

    #[test]
    fn flower_regeneration_is_capped() {
        let mut flower = Flower { capacity: Nectar::from_num(10), amount: Nectar::from_num(9) };
        let added = flower.regenerate(Nectar::from_num(3));
        assert_eq!(added, Nectar::from_num(1));
        assert_eq!(flower.amount, flower.capacity);
        assert_eq!(flower.regenerate(Nectar::from_num(3)), Nectar::ZERO);
    }

    #[test]
    fn snapshot_lookup_misses_unknown_pools() {
        let mut world = World::new();
        let registry = registry_of(&mut world, 3);
        let stranger = world.spawn_empty().id();
        assert!(!registry.contains(stranger));
        assert_eq!(registry.snapshot(stranger), None);
    }
}
