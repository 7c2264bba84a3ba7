use bevy::prelude::Entity;
use thiserror::Error;

use crate::colony::bee::BeeState;

/// Fatal simulation errors.
///
/// Each variant is a broken precondition left behind by spawning or by outside
/// code touching the world. Systems return these through Bevy's error handling,
/// which aborts the step instead of letting the colony drift into a bad state.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("cannot pick a {pool} from an empty registry")]
    EmptyRegistry { pool: &'static str },

    #[error("bee {bee} belongs to hive {home}, which does not exist")]
    MissingHome { bee: Entity, home: Entity },

    #[error("bee {bee} carries {count} state tags, expected exactly one")]
    CorruptStateTags { bee: Entity, count: usize },

    #[error("bee {bee} was given more than one transition in a single tick")]
    DuplicateTransition { bee: Entity },

    #[error("transition for bee {bee} expected {expected:?} but the bee is {found:?}")]
    StaleTransition {
        bee: Entity,
        expected: BeeState,
        found: BeeState,
    },

    #[error("blueprint bee #{index} names hive #{home}, but only {hives} hives exist")]
    UnknownHome { index: usize, home: usize, hives: usize },

    #[error("blueprint bee #{index} starts at flower #{flower}, but only {flowers} flowers exist")]
    UnknownFlower {
        index: usize,
        flower: usize,
        flowers: usize,
    },
}
