//! Forager agents: the bee record, its flight leg and its behavioural state tags.

use bevy::ecs::system::EntityCommands;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::colony::nectar::Nectar;

// ============================================================================
// Agent Record
// ============================================================================

/// Per-bee cargo and bookkeeping.
///
/// `home` is fixed at spawn. `target` names the pool the bee is heading to or
/// working at and is only `None` between arriving home and picking the next flower.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct BeeData {
    pub carried: Nectar,
    pub capacity: Nectar,
    pub speed: f32,
    pub home: Entity,
    pub target: Option<Entity>,
}

impl BeeData {
    pub fn new(home: Entity, capacity: Nectar, speed: f32) -> Self {
        Self {
            carried: Nectar::ZERO,
            capacity,
            speed,
            home,
            target: None,
        }
    }

    /// Remaining cargo space.
    pub fn room(&self) -> Nectar {
        self.capacity - self.carried
    }

    pub fn is_saturated(&self, epsilon: Nectar) -> bool {
        self.room() <= epsilon
    }

    pub fn is_depleted(&self, epsilon: Nectar) -> bool {
        self.carried <= epsilon
    }

    pub fn load_ratio(&self) -> f32 {
        crate::colony::nectar::ratio(self.carried, self.capacity)
    }
}

/// The current flight leg. Replaced whenever the bee gets a new destination.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct FlightPath {
    /// Seconds spent on this leg; drives the wiggle phase.
    pub elapsed: f32,
    pub origin: Vec3,
    pub destination: Vec3,
    pub speed: f32,
}

impl FlightPath {
    pub fn new(origin: Vec3, destination: Vec3, speed: f32) -> Self {
        Self {
            elapsed: 0.0,
            origin,
            destination,
            speed,
        }
    }
}

// ============================================================================
// State Tags
// ============================================================================

#[derive(Component, Debug, Default, Clone, Copy)]
pub struct TravellingToFlower;

#[derive(Component, Debug, Default, Clone, Copy)]
pub struct TravellingToHome;

#[derive(Component, Debug, Default, Clone, Copy)]
pub struct AtFlower;

#[derive(Component, Debug, Default, Clone, Copy)]
pub struct AtHive;

/// Query fragment reading all four state tags.
pub type BeeTags = (
    Has<TravellingToFlower>,
    Has<TravellingToHome>,
    Has<AtFlower>,
    Has<AtHive>,
);

/// Value form of the state tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BeeState {
    TravellingToFlower,
    TravellingToHome,
    AtFlower,
    AtHive,
}

impl BeeState {
    pub const ALL: [BeeState; 4] = [
        BeeState::TravellingToFlower,
        BeeState::TravellingToHome,
        BeeState::AtFlower,
        BeeState::AtHive,
    ];

    /// Decodes tag flags (in [`BeeTags`] order). `Err` carries the number of tags
    /// present when it isn't exactly one.
    pub fn from_tags(tags: (bool, bool, bool, bool)) -> Result<Self, usize> {
        let flags = [tags.0, tags.1, tags.2, tags.3];
        let count = flags.iter().filter(|&&set| set).count();
        if count != 1 {
            return Err(count);
        }
        flags
            .iter()
            .position(|&set| set)
            .map(|i| Self::ALL[i])
            .ok_or(count)
    }

    pub fn insert_tag(self, entity: &mut EntityCommands) {
        match self {
            BeeState::TravellingToFlower => entity.insert(TravellingToFlower),
            BeeState::TravellingToHome => entity.insert(TravellingToHome),
            BeeState::AtFlower => entity.insert(AtFlower),
            BeeState::AtHive => entity.insert(AtHive),
        };
    }

    pub fn remove_tag(self, entity: &mut EntityCommands) {
        match self {
            BeeState::TravellingToFlower => entity.remove::<TravellingToFlower>(),
            BeeState::TravellingToHome => entity.remove::<TravellingToHome>(),
            BeeState::AtFlower => entity.remove::<AtFlower>(),
            BeeState::AtHive => entity.remove::<AtHive>(),
        };
    }
}

/// A travelling tag, used to share one flight system between both legs.
pub trait FlightLeg: Component {
    const STATE: BeeState;
    const ARRIVES_AT: BeeState;
}

impl FlightLeg for TravellingToFlower {
    const STATE: BeeState = BeeState::TravellingToFlower;
    const ARRIVES_AT: BeeState = BeeState::AtFlower;
}

impl FlightLeg for TravellingToHome {
    const STATE: BeeState = BeeState::TravellingToHome;
    const ARRIVES_AT: BeeState = BeeState::AtHive;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bee(carried: f32, capacity: f32) -> BeeData {
        let home = World::new().spawn_empty().id();
        BeeData {
            carried: Nectar::from_num(carried),
            ..BeeData::new(home, Nectar::from_num(capacity), 5.0)
        }
    }

    #[test]
    fn saturation_uses_epsilon() {
        let eps = Nectar::from_num(0.01);
        assert!(bee(10.0, 10.0).is_saturated(eps));
        assert!(bee(9.995, 10.0).is_saturated(eps));
        assert!(!bee(9.9, 10.0).is_saturated(eps));
    }

    #[test]
    fn depletion_uses_epsilon() {
        let eps = Nectar::from_num(0.01);
        assert!(bee(0.0, 10.0).is_depleted(eps));
        assert!(bee(0.005, 10.0).is_depleted(eps));
        assert!(!bee(0.5, 10.0).is_depleted(eps));
    }

    #[test]
    fn tags_decode_to_single_state() {
        assert_eq!(BeeState::from_tags((false, false, true, false)), Ok(BeeState::AtFlower));
        assert_eq!(BeeState::from_tags((false, false, false, true)), Ok(BeeState::AtHive));
        assert_eq!(BeeState::from_tags((false, false, false, false)), Err(0));
        assert_eq!(BeeState::from_tags((true, false, true, false)), Err(2));
    }

    #[test]
    fn tag_commands_swap_components() {
        let mut world = World::new();
        let entity = world.spawn(AtHive).id();

        let mut commands = world.commands();
        let mut entity_commands = commands.entity(entity);
        BeeState::AtHive.remove_tag(&mut entity_commands);
        BeeState::TravellingToFlower.insert_tag(&mut entity_commands);
        world.flush();

        assert!(!world.entity(entity).contains::<AtHive>());
        assert!(world.entity(entity).contains::<TravellingToFlower>());
    }

    #[test]
    fn flight_legs_arrive_at_matching_pool() {
        assert_eq!(TravellingToFlower::ARRIVES_AT, BeeState::AtFlower);
        assert_eq!(TravellingToHome::ARRIVES_AT, BeeState::AtHive);
    }
}
