/// Kinematic components written by the simulation and read by presentation.
///
/// Bees and pools both carry [`SimPosition`]; only bees move.

use bevy::prelude::*;

/// Logical position in world space.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct SimPosition(pub Vec3);

/// Position at the start of the current tick, for render interpolation.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct SimPositionPrev(pub Vec3);

#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct SimVelocity(pub Vec3);

#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct SimRotation(pub Quat);
