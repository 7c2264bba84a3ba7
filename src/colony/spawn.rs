//! Colony spawning.
//!
//! A [`ColonyBlueprint`] is a plain description of hives, flowers and bees.
//! Tests build one by hand; the app lays one out from [`InitialConfig`].
//! Spawning builds the pool registries, so it must happen before the first tick.

use std::f32::consts::TAU;

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::colony::bee::{AtFlower, AtHive, BeeData, FlightPath};
use crate::colony::config::InitialConfig;
use crate::colony::error::SimError;
use crate::colony::nectar::Nectar;
use crate::colony::pools::{Flower, FlowerRegistry, Hive, HiveRegistry, PoolSnapshot};
use crate::colony::simulation::components::{SimPosition, SimPositionPrev, SimRotation, SimVelocity};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HiveSpec {
    pub position: Vec3,
    pub nectar: Nectar,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowerSpec {
    pub position: Vec3,
    pub capacity: Nectar,
    pub amount: Nectar,
}

/// Where a bee is at spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeeStart {
    AtHive,
    /// Parked at the flower with this index, targeting it.
    AtFlower(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeeSpec {
    /// Index into [`ColonyBlueprint::hives`].
    pub home: usize,
    pub capacity: Nectar,
    pub carried: Nectar,
    pub speed: f32,
    pub start: BeeStart,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColonyBlueprint {
    pub hives: Vec<HiveSpec>,
    pub flowers: Vec<FlowerSpec>,
    pub bees: Vec<BeeSpec>,
}

/// Entities created by [`ColonyBlueprint::spawn_into`], in blueprint order.
#[derive(Debug, Clone, Default)]
pub struct SpawnedColony {
    pub hives: Vec<Entity>,
    pub flowers: Vec<Entity>,
    pub bees: Vec<Entity>,
}

impl ColonyBlueprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hive(mut self, position: Vec3, nectar: f32) -> Self {
        self.hives.push(HiveSpec {
            position,
            nectar: Nectar::from_num(nectar),
        });
        self
    }

    /// A flower that starts full.
    pub fn with_flower(self, position: Vec3, capacity: f32) -> Self {
        self.with_partial_flower(position, capacity, capacity)
    }

    pub fn with_partial_flower(mut self, position: Vec3, capacity: f32, amount: f32) -> Self {
        self.flowers.push(FlowerSpec {
            position,
            capacity: Nectar::from_num(capacity),
            amount: Nectar::from_num(amount),
        });
        self
    }

    /// An empty-handed bee at its home hive.
    pub fn with_bee(self, home: usize, capacity: f32, speed: f32) -> Self {
        self.with_bee_spec(BeeSpec {
            home,
            capacity: Nectar::from_num(capacity),
            carried: Nectar::ZERO,
            speed,
            start: BeeStart::AtHive,
        })
    }

    pub fn with_bee_spec(mut self, spec: BeeSpec) -> Self {
        self.bees.push(spec);
        self
    }

    /// Random colony laid out from config, reproducible from `config.seed`.
    ///
    /// Flowers fill a disc of radius `world_size / 2` centred at
    /// `world_size / 2.5` on both ground axes. Hives are scattered over the
    /// world square. Bees are assigned homes round-robin.
    pub fn from_config(config: &InitialConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let half = config.world_size / 2.0;
        let disc_centre = Vec2::splat(config.world_size / 2.5);

        let hives = (0..config.num_hives)
            .map(|_| HiveSpec {
                position: Vec3::new(
                    rng.random_range(-half..=half),
                    config.hive_height,
                    rng.random_range(-half..=half),
                ),
                nectar: Nectar::from_num(rng.random_range(config.hive_nectar_min..=config.hive_nectar_max)),
            })
            .collect();

        let flowers = (0..config.num_flowers)
            .map(|_| {
                let angle = rng.random_range(0.0..TAU);
                // sqrt keeps the density uniform over the disc
                let radius = half * rng.random::<f32>().sqrt();
                let capacity =
                    Nectar::from_num(rng.random_range(config.flower_capacity_min..=config.flower_capacity_max));
                FlowerSpec {
                    position: Vec3::new(
                        disc_centre.x + radius * angle.cos(),
                        config.flower_height,
                        disc_centre.y + radius * angle.sin(),
                    ),
                    capacity,
                    amount: capacity,
                }
            })
            .collect();

        let bees = (0..config.num_bees)
            .map(|i| BeeSpec {
                home: i % config.num_hives.max(1),
                capacity: Nectar::from_num(config.bee_capacity),
                carried: Nectar::ZERO,
                speed: rng.random_range(config.bee_speed_min..=config.bee_speed_max),
                start: BeeStart::AtHive,
            })
            .collect();

        Self { hives, flowers, bees }
    }

    fn validate(&self) -> Result<(), SimError> {
        if !self.bees.is_empty() {
            if self.flowers.is_empty() {
                return Err(SimError::EmptyRegistry { pool: "flower" });
            }
            if self.hives.is_empty() {
                return Err(SimError::EmptyRegistry { pool: "hive" });
            }
        }
        for (index, bee) in self.bees.iter().enumerate() {
            if bee.home >= self.hives.len() {
                return Err(SimError::UnknownHome {
                    index,
                    home: bee.home,
                    hives: self.hives.len(),
                });
            }
            if let BeeStart::AtFlower(flower) = bee.start {
                if flower >= self.flowers.len() {
                    return Err(SimError::UnknownFlower {
                        index,
                        flower,
                        flowers: self.flowers.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Spawns every pool and bee and installs the registries.
    ///
    /// Nothing is spawned if the blueprint is inconsistent.
    pub fn spawn_into(self, world: &mut World) -> Result<SpawnedColony, SimError> {
        self.validate()?;

        let hives: Vec<Entity> = self
            .hives
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                world
                    .spawn((
                        Name::new(format!("Hive {}", i)),
                        Hive { amount: spec.nectar },
                        SimPosition(spec.position),
                    ))
                    .id()
            })
            .collect();

        let flowers: Vec<Entity> = self
            .flowers
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                world
                    .spawn((
                        Name::new(format!("Flower {}", i)),
                        Flower {
                            capacity: spec.capacity,
                            amount: spec.amount.min(spec.capacity),
                        },
                        SimPosition(spec.position),
                    ))
                    .id()
            })
            .collect();

        world.insert_resource(HiveRegistry::new(
            hives
                .iter()
                .zip(&self.hives)
                .map(|(&entity, spec)| (entity, PoolSnapshot { position: spec.position }))
                .collect(),
        ));
        world.insert_resource(FlowerRegistry::new(
            flowers
                .iter()
                .zip(&self.flowers)
                .map(|(&entity, spec)| (entity, PoolSnapshot { position: spec.position }))
                .collect(),
        ));

        let bees = self
            .bees
            .iter()
            .map(|spec| {
                let home = hives[spec.home];
                let (position, target) = match spec.start {
                    BeeStart::AtHive => (self.hives[spec.home].position, None),
                    BeeStart::AtFlower(i) => (self.flowers[i].position, Some(flowers[i])),
                };
                let data = BeeData {
                    carried: spec.carried.min(spec.capacity),
                    target,
                    ..BeeData::new(home, spec.capacity, spec.speed)
                };
                let mut bee = world.spawn((
                    data,
                    FlightPath::new(position, position, spec.speed),
                    SimPosition(position),
                    SimPositionPrev(position),
                    SimVelocity::default(),
                    SimRotation::default(),
                ));
                match spec.start {
                    BeeStart::AtHive => bee.insert(AtHive),
                    BeeStart::AtFlower(_) => bee.insert(AtFlower),
                };
                bee.id()
            })
            .collect();

        Ok(SpawnedColony { hives, flowers, bees })
    }
}

/// Lays out and spawns the colony described by [`InitialConfig`].
pub fn spawn_colony_from_config(world: &mut World) -> Result {
    let config = match world.get_resource::<InitialConfig>() {
        Some(config) => config.clone(),
        None => {
            warn!("InitialConfig not found, spawning default colony");
            InitialConfig::default()
        }
    };

    let colony = ColonyBlueprint::from_config(&config).spawn_into(world)?;
    info!(
        "Spawned colony (seed {}): {} hives, {} flowers, {} bees",
        config.seed,
        colony.hives.len(),
        colony.flowers.len(),
        colony.bees.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bees_start_at_home_with_nothing() {
        let mut world = World::new();
        let colony = ColonyBlueprint::new()
            .with_hive(Vec3::new(1.0, 2.0, 3.0), 0.0)
            .with_flower(Vec3::new(20.0, 0.0, 0.0), 10.0)
            .with_bee(0, 10.0, 5.0)
            .spawn_into(&mut world)
            .unwrap();

        let bee = world.entity(colony.bees[0]);
        let data = bee.get::<BeeData>().unwrap();
        assert_eq!(data.carried, Nectar::ZERO);
        assert_eq!(data.home, colony.hives[0]);
        assert_eq!(data.target, None);
        assert!(bee.contains::<AtHive>());
        assert_eq!(bee.get::<SimPosition>().unwrap().0, Vec3::new(1.0, 2.0, 3.0));

        assert_eq!(world.resource::<FlowerRegistry>().len(), 1);
        assert!(world.resource::<HiveRegistry>().contains(colony.hives[0]));
    }

    #[test]
    fn unknown_home_spawns_nothing() {
        let mut world = World::new();
        let result = ColonyBlueprint::new()
            .with_hive(Vec3::ZERO, 0.0)
            .with_flower(Vec3::X * 10.0, 5.0)
            .with_bee(3, 10.0, 5.0)
            .spawn_into(&mut world);

        assert_eq!(result.unwrap_err(), SimError::UnknownHome { index: 0, home: 3, hives: 1 });
        assert_eq!(world.entities().len(), 0);
    }

    #[test]
    fn bees_without_flowers_are_rejected() {
        let mut world = World::new();
        let result = ColonyBlueprint::new()
            .with_hive(Vec3::ZERO, 0.0)
            .with_bee(0, 10.0, 5.0)
            .spawn_into(&mut world);
        assert_eq!(result.unwrap_err(), SimError::EmptyRegistry { pool: "flower" });
    }

    #[test]
    fn bee_can_start_parked_at_a_flower() {
        let mut world = World::new();
        let colony = ColonyBlueprint::new()
            .with_hive(Vec3::ZERO, 0.0)
            .with_flower(Vec3::new(0.0, 0.0, 20.0), 10.0)
            .with_bee_spec(BeeSpec {
                home: 0,
                capacity: Nectar::from_num(10),
                carried: Nectar::from_num(4),
                speed: 5.0,
                start: BeeStart::AtFlower(0),
            })
            .spawn_into(&mut world)
            .unwrap();

        let bee = world.entity(colony.bees[0]);
        assert!(bee.contains::<AtFlower>());
        assert_eq!(bee.get::<BeeData>().unwrap().target, Some(colony.flowers[0]));
        assert_eq!(bee.get::<BeeData>().unwrap().carried, Nectar::from_num(4));
    }

    #[test]
    fn config_layout_is_seeded_and_bounded() {
        let config = InitialConfig {
            num_bees: 30,
            num_hives: 4,
            num_flowers: 200,
            ..default()
        };
        let a = ColonyBlueprint::from_config(&config);
        let b = ColonyBlueprint::from_config(&config);
        assert_eq!(a, b);

        let centre = Vec2::splat(config.world_size / 2.5);
        for flower in &a.flowers {
            let ground = Vec2::new(flower.position.x, flower.position.z);
            assert!(ground.distance(centre) <= config.world_size / 2.0 + 1e-3);
            assert!(flower.capacity >= Nectar::from_num(config.flower_capacity_min));
            assert!(flower.capacity <= Nectar::from_num(config.flower_capacity_max));
            assert_eq!(flower.amount, flower.capacity);
        }
        for (i, bee) in a.bees.iter().enumerate() {
            assert_eq!(bee.home, i % 4);
            assert!((config.bee_speed_min..=config.bee_speed_max).contains(&bee.speed));
        }

        let reseeded = ColonyBlueprint::from_config(&InitialConfig { seed: 7, ..config });
        assert_ne!(a.flowers, reseeded.flowers);
    }
}
