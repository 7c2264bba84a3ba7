use bevy::prelude::*;

use crate::colony::bee::BeeData;
use crate::colony::config::{RuntimeConfig, RuntimeConfigHandle};
use crate::colony::pools::{Flower, Hive};
use crate::colony::simulation::{SimPosition, SimPositionPrev, SimRotation};

/// Thin render layer: meshes for pools and bees, transforms copied from the simulation.
pub struct PresentationPlugin;

impl Plugin for PresentationPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, (setup_scene, setup_colony_assets))
            .add_systems(
                Update,
                (
                    (spawn_bee_visuals, spawn_pool_visuals),
                    (sync_visuals, update_flower_visuals),
                )
                    .chain(),
            );
    }
}

#[derive(Component)]
pub struct ColonyCamera;

#[derive(Resource)]
pub struct ColonyMeshes {
    pub bee: Handle<Mesh>,
    pub flower: Handle<Mesh>,
    pub hive: Handle<Mesh>,
}

#[derive(Resource)]
pub struct ColonyMaterials {
    pub bee: Handle<StandardMaterial>,
    pub flower: Handle<StandardMaterial>,
    pub hive: Handle<StandardMaterial>,
}

fn setup_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, 90.0, 110.0).looking_at(Vec3::new(20.0, 0.0, 20.0), Vec3::Y),
        ColonyCamera,
    ));

    commands.spawn((
        DirectionalLight {
            shadows_enabled: true,
            illuminance: 8_000.0,
            ..default()
        },
        Transform::from_xyz(30.0, 60.0, 20.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    // Ground
    commands.spawn((
        Mesh3d(meshes.add(Plane3d::default().mesh().size(200.0, 200.0))),
        MeshMaterial3d(materials.add(Color::srgb(0.3, 0.5, 0.3))),
    ));
}

fn setup_colony_assets(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.insert_resource(ColonyMeshes {
        bee: meshes.add(Cuboid::new(0.3, 0.3, 0.6)),
        flower: meshes.add(Sphere::new(1.0)),
        hive: meshes.add(Cylinder::new(2.0, 3.0)),
    });

    commands.insert_resource(ColonyMaterials {
        bee: materials.add(Color::srgb(0.95, 0.8, 0.1)),
        flower: materials.add(Color::srgb(0.9, 0.3, 0.6)),
        hive: materials.add(Color::srgb(0.6, 0.4, 0.2)),
    });
}

/// Only runs on Added<BeeData>, not a hot path
fn spawn_bee_visuals(
    mut commands: Commands,
    query: Query<(Entity, &SimPosition), Added<BeeData>>,
    meshes: Res<ColonyMeshes>,
    materials: Res<ColonyMaterials>,
) {
    for (entity, pos) in query.iter() {
        commands.entity(entity).insert((
            Mesh3d(meshes.bee.clone()),
            MeshMaterial3d(materials.bee.clone()),
            Transform::from_translation(pos.0),
        ));
    }
}

fn spawn_pool_visuals(
    mut commands: Commands,
    flowers: Query<(Entity, &SimPosition, &Flower), Added<Flower>>,
    hives: Query<(Entity, &SimPosition), Added<Hive>>,
    meshes: Res<ColonyMeshes>,
    materials: Res<ColonyMaterials>,
) {
    for (entity, pos, flower) in flowers.iter() {
        commands.entity(entity).insert((
            Mesh3d(meshes.flower.clone()),
            MeshMaterial3d(materials.flower.clone()),
            Transform::from_translation(pos.0).with_scale(Vec3::splat(flower_scale(flower))),
        ));
    }
    for (entity, pos) in hives.iter() {
        commands.entity(entity).insert((
            Mesh3d(meshes.hive.clone()),
            MeshMaterial3d(materials.hive.clone()),
            Transform::from_translation(pos.0),
        ));
    }
}

fn flower_scale(flower: &Flower) -> f32 {
    0.3 + 0.7 * flower.fill_ratio()
}

/// Copies simulation state into transforms, interpolating between ticks
fn sync_visuals(
    mut query: Query<(&mut Transform, &SimPosition, &SimPositionPrev, &SimRotation)>,
    fixed_time: Res<Time<Fixed>>,
    config_handle: Option<Res<RuntimeConfigHandle>>,
    runtime_configs: Res<Assets<RuntimeConfig>>,
) {
    let interpolate = config_handle
        .and_then(|handle| runtime_configs.get(&handle.0).map(|config| config.interpolate))
        .unwrap_or(true);
    let alpha = if interpolate { fixed_time.overstep_fraction() } else { 1.0 };

    for (mut transform, pos, prev_pos, rotation) in query.iter_mut() {
        transform.translation = prev_pos.0.lerp(pos.0, alpha);
        transform.rotation = rotation.0;
    }
}

/// Only flowers whose nectar changed this frame
fn update_flower_visuals(mut query: Query<(&mut Transform, &Flower), Changed<Flower>>) {
    for (mut transform, flower) in query.iter_mut() {
        transform.scale = Vec3::splat(flower_scale(flower));
    }
}
