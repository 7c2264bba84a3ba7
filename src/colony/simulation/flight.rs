/// Flight integrator and the travelling partitions.
///
/// [`advance`] is a pure function of the bee's kinematic state and its flight
/// leg, so it can be tested without a world. [`fly`] runs it over one
/// travelling partition and records an arrival transition when a bee lands.

use bevy::prelude::*;

use crate::colony::bee::{FlightLeg, FlightPath};
use crate::colony::profiling::profile;
use crate::colony::simulation::components::{SimPosition, SimRotation, SimVelocity};
use crate::colony::simulation::resources::{FlightParams, SimConfig, SimTick};
use crate::colony::simulation::transitions::{Transition, TransitionLog};

/// Kinematic state at the start of a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation: Quat,
}

/// Kinematic state after a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightStep {
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation: Quat,
    pub arrived: bool,
}

/// Rotation facing `direction` with +Y up.
pub fn look_rotation(direction: Vec3) -> Quat {
    Transform::IDENTITY.looking_to(direction, Vec3::Y).rotation
}

/// Advances one bee by `dt` seconds along its flight leg.
///
/// A bee within `arrival_radius` of the destination has arrived and does not
/// move. Otherwise the desired velocity points straight at the destination,
/// with a sinusoidal wiggle impulse while still far out and an upward lift
/// while closer to the origin than to the destination. Velocity eases toward
/// the desired velocity and orientation eases toward facing it. A step that
/// would reach, pass or graze the destination lands exactly on it.
pub fn advance(state: FlightState, flight: &mut FlightPath, params: &FlightParams, dt: f32) -> FlightStep {
    let between = flight.destination - state.position;
    let distance = between.length();

    if distance <= params.arrival_radius {
        return FlightStep {
            position: state.position,
            velocity: state.velocity,
            rotation: state.rotation,
            arrived: true,
        };
    }

    flight.elapsed += dt;
    let direction = between / distance;
    let mut desired = direction * flight.speed * params.straight_factor;
    let mut velocity = state.velocity;

    if distance >= params.wiggle_min_distance {
        let orthogonal = direction.cross(Vec3::Y).normalize_or_zero();
        let wiggle = Vec3::Y * (flight.elapsed * params.vertical_frequency).sin() * params.vertical_amplitude
            + orthogonal * (flight.elapsed * params.horizontal_frequency).cos() * params.horizontal_amplitude;
        velocity += wiggle * dt * params.wiggle_impulse * params.inverse_mass;
    }

    let from_origin = state.position.distance(flight.origin);
    if from_origin < distance {
        // 1/sqrt(0) is inf; min() picks the cap
        desired += Vec3::Y * params.lift_cap.min(params.lift_gain / from_origin.sqrt());
    }

    velocity = velocity.lerp(desired, (dt * params.velocity_smoothing).clamp(0.0, 1.0));

    // Faces the heading, not the lagging velocity
    let rotation = if velocity.length_squared() > 0.01 {
        state
            .rotation
            .slerp(look_rotation(desired), (dt * params.rotation_smoothing).clamp(0.0, 1.0))
    } else {
        state.rotation
    };

    let step = velocity * dt;
    let lands = step.dot(direction) >= distance
        || passes_within(state.position, step, flight.destination, params.arrival_radius);
    let position = if lands {
        flight.destination
    } else {
        state.position + step
    };

    FlightStep {
        position,
        velocity,
        rotation,
        arrived: false,
    }
}

/// Whether the segment `start..start + step` comes within `radius` of `point`.
fn passes_within(start: Vec3, step: Vec3, point: Vec3, radius: f32) -> bool {
    let length_squared = step.length_squared();
    if length_squared == 0.0 {
        return false;
    }
    let t = ((point - start).dot(step) / length_squared).clamp(0.0, 1.0);
    (start + step * t).distance(point) <= radius
}

/// Moves every bee carrying the travelling tag `L`.
#[profile(2000)]
pub fn fly<L: FlightLeg>(
    mut bees: Query<
        (
            Entity,
            &mut FlightPath,
            &mut SimPosition,
            &mut SimVelocity,
            &mut SimRotation,
        ),
        With<L>,
    >,
    config: Res<SimConfig>,
    transitions: Res<TransitionLog>,
    #[allow(unused_variables)] tick: Res<SimTick>,
) {
    let dt = config.delta_seconds();
    let params = &config.flight;
    let transitions = &*transitions;

    for_each_agent!(config.execution_mode, bees, |(bee, mut flight, mut position, mut velocity, mut rotation)| {
        let state = FlightState {
            position: position.0,
            velocity: velocity.0,
            rotation: rotation.0,
        };
        let step = advance(state, &mut flight, params, dt);
        if step.arrived {
            transitions.record(bee, Transition::arrive(L::STATE, L::ARRIVES_AT));
        } else {
            position.0 = step.position;
            velocity.0 = step.velocity;
            rotation.0 = step.rotation;
        }
    });

    crate::profile_log!(tick, "[FLIGHT] {:?}: {} bees in flight", L::STATE, bees.iter().len());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(position: Vec3) -> FlightState {
        FlightState {
            position,
            velocity: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }

    fn straight() -> FlightParams {
        FlightParams {
            straight_factor: 1.0,
            lift_cap: 0.0,
            inverse_mass: 0.0,
            ..default()
        }
    }

    /// Steps until arrival, returning the tick count.
    fn fly_to_arrival(mut state: FlightState, flight: &mut FlightPath, params: &FlightParams, dt: f32, max_ticks: usize) -> Option<usize> {
        for tick in 1..=max_ticks {
            let step = advance(state, flight, params, dt);
            if step.arrived {
                return Some(tick);
            }
            state = FlightState {
                position: step.position,
                velocity: step.velocity,
                rotation: step.rotation,
            };
        }
        None
    }

    #[test]
    fn arrived_bee_does_not_move() {
        let mut flight = FlightPath::new(Vec3::ZERO, Vec3::new(0.5, 0.0, 0.0), 5.0);
        let state = FlightState {
            position: Vec3::ZERO,
            velocity: Vec3::new(3.0, 0.0, 0.0),
            rotation: Quat::IDENTITY,
        };
        let step = advance(state, &mut flight, &FlightParams::default(), 1.0 / 30.0);
        assert!(step.arrived);
        assert_eq!(step.position, Vec3::ZERO);
        assert_eq!(flight.elapsed, 0.0);
    }

    #[test]
    fn straight_flight_arrives_in_expected_ticks() {
        let mut flight = FlightPath::new(Vec3::ZERO, Vec3::new(20.0, 0.0, 0.0), 5.0);
        let ticks = fly_to_arrival(at(Vec3::ZERO), &mut flight, &straight(), 1.0, 100).unwrap();
        // Four steps of 5 units, arrival reported on the fifth
        assert_eq!(ticks, 5);
    }

    #[test]
    fn overshooting_step_lands_on_destination() {
        let destination = Vec3::new(3.0, 0.0, 0.0);
        let mut flight = FlightPath::new(Vec3::ZERO, destination, 10.0);
        let step = advance(at(Vec3::ZERO), &mut flight, &straight(), 1.0);
        assert_eq!(step.position, destination);
        assert!(!step.arrived);
    }

    #[test]
    fn arrival_time_scales_with_distance_over_speed() {
        // Wiggle and lift on. Bound in ticks: K * distance / (speed * dt) + C
        const K: f32 = 2.0;
        const C: f32 = 300.0;
        let params = FlightParams::default();
        let dt = 1.0 / 30.0;
        let origin = Vec3::new(0.0, 5.0, 0.0);

        for distance in [5.0f32, 20.0, 60.0, 150.0] {
            for speed in [8.0f32, 12.0, 18.0] {
                let destination = origin + Vec3::new(0.6, 0.0, -0.8) * distance;
                let mut flight = FlightPath::new(origin, destination, speed);
                let bound = K * distance / (speed * dt) + C;

                let ticks = fly_to_arrival(at(origin), &mut flight, &params, dt, bound.ceil() as usize);
                assert!(
                    ticks.is_some(),
                    "distance {} at speed {} took more than {} ticks",
                    distance,
                    speed,
                    bound
                );
            }
        }
    }

    #[test]
    fn elapsed_accumulates_per_step() {
        let mut flight = FlightPath::new(Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0), 1.0);
        let mut state = at(Vec3::ZERO);
        for _ in 0..3 {
            let step = advance(state, &mut flight, &straight(), 0.25);
            state.position = step.position;
            state.velocity = step.velocity;
        }
        assert!((flight.elapsed - 0.75).abs() < 1e-6);
    }

    #[test]
    fn wiggle_perturbs_but_does_not_dominate() {
        let params = FlightParams {
            lift_cap: 0.0,
            ..default()
        };
        let destination = Vec3::new(0.0, 0.0, 50.0);
        let mut flight = FlightPath::new(Vec3::ZERO, destination, 15.0);
        let mut state = at(Vec3::ZERO);
        let mut lateral = 0.0f32;
        for _ in 0..20 {
            let step = advance(state, &mut flight, &params, 1.0 / 30.0);
            lateral = lateral.max(step.position.x.abs()).max(step.position.y.abs());
            state = FlightState {
                position: step.position,
                velocity: step.velocity,
                rotation: step.rotation,
            };
        }
        assert!(lateral > 0.0, "wiggle had no effect");
        assert!(state.position.z > lateral * 2.0, "wiggle outweighs forward motion");
    }

    #[test]
    fn lift_applies_only_near_origin() {
        let params = FlightParams {
            straight_factor: 1.0,
            inverse_mass: 0.0,
            velocity_smoothing: 1000.0,
            ..default()
        };
        let origin = Vec3::ZERO;
        let destination = Vec3::new(40.0, 0.0, 0.0);

        let mut flight = FlightPath::new(origin, destination, 1.0);
        let near = advance(at(Vec3::new(4.0, 0.0, 0.0)), &mut flight, &params, 0.01);
        assert!(near.velocity.y > 0.0);

        let mut flight = FlightPath::new(origin, destination, 1.0);
        let far = advance(at(Vec3::new(30.0, 0.0, 0.0)), &mut flight, &params, 0.01);
        assert_eq!(far.velocity.y, 0.0);
    }

    #[test]
    fn bee_turns_toward_travel_direction() {
        let mut flight = FlightPath::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -50.0), 5.0);
        let step = advance(at(Vec3::ZERO), &mut flight, &straight(), 1.0);
        let forward = step.rotation * Vec3::NEG_Z;
        assert!(forward.dot(Vec3::NEG_Z) > 0.99, "forward was {:?}", forward);
    }

    #[test]
    fn bee_faces_heading_while_sliding_sideways() {
        let mut flight = FlightPath::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -50.0), 5.0);
        let mut state = FlightState {
            position: Vec3::ZERO,
            velocity: Vec3::new(20.0, 0.0, 0.0),
            rotation: Quat::IDENTITY,
        };
        for _ in 0..5 {
            let step = advance(state, &mut flight, &straight(), 1.0 / 30.0);
            assert!(step.velocity.x > 10.0, "velocity should still lag sideways");
            let forward = step.rotation * Vec3::NEG_Z;
            assert!(forward.dot(Vec3::NEG_Z) > 0.99, "forward was {:?}", forward);
            state = FlightState {
                position: step.position,
                velocity: step.velocity,
                rotation: step.rotation,
            };
        }
    }
}
