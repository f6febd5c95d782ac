//! Arcade Walk Example
//!
//! A playable 3D scene with a keyboard-driven character featuring:
//! - A flat floor
//! - A ramp to walk up (and jump off)
//! - A moving platform the character rides along
//! - A well you can interact with
//!
//! ## Controls
//! - **W/S** or **Up/Down**: Move forward/back
//! - **A/D** or **Left/Right**: Move left/right
//! - **Space**: Jump
//! - **E**: Interact
//!
//! The character model is loaded from `assets/models/character.glb` when it
//! exists; otherwise the capsule placeholder stays visible.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use kinematic_character_controller::prelude::*;

// ==================== Constants ====================

const FLOOR_HALF_SIZE: f32 = 30.0;
const PLATFORM_SPEED: f32 = 3.0;
const PLATFORM_TRAVEL: f32 = 8.0;
const CAMERA_OFFSET: Vec3 = Vec3::new(0.0, 8.0, -14.0);

#[derive(Component)]
struct Player;

#[derive(Component)]
struct MovingPlatform {
    origin: Vec3,
}

// ==================== Main ====================

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Arcade Walk - Character Controller Example".into(),
                resolution: (1280.0, 720.0).into(),
                ..default()
            }),
            ..default()
        }))
        // Physics, stepped in the fixed schedule alongside the controller
        .add_plugins(RapierPhysicsPlugin::<NoUserData>::default().in_fixed_schedule())
        .add_plugins(RapierDebugRenderPlugin::default())
        // Character controller
        .add_plugins(CharacterControllerPlugin::<Rapier3dBackend>::default())
        .add_plugins(LocomotionAnimationPlugin)
        // Systems
        .add_systems(Startup, setup)
        .add_systems(FixedUpdate, move_platforms)
        .add_systems(Update, (log_interactions, follow_camera))
        .run();
}

// ==================== Setup ====================

fn setup(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.spawn((
        DirectionalLight {
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(4.0, 10.0, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.spawn((
        Camera3d::default(),
        Transform::from_translation(CAMERA_OFFSET).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    spawn_level(&mut commands, &mut meshes, &mut materials);
    spawn_player(&mut commands, &asset_server, &mut meshes, &mut materials);

    commands.spawn((
        Text::new("WASD: Move | Space: Jump | E: Interact"),
        TextFont {
            font_size: 20.0,
            ..default()
        },
        TextColor(Color::WHITE),
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(10.0),
            left: Val::Px(10.0),
            ..default()
        },
    ));
}

fn spawn_level(
    commands: &mut Commands,
    meshes: &mut ResMut<Assets<Mesh>>,
    materials: &mut ResMut<Assets<StandardMaterial>>,
) {
    // Floor
    commands.spawn((
        Mesh3d(meshes.add(Cuboid::new(FLOOR_HALF_SIZE * 2.0, 1.0, FLOOR_HALF_SIZE * 2.0))),
        MeshMaterial3d(materials.add(Color::srgb(0.3, 0.3, 0.3))),
        Transform::from_xyz(0.0, -0.5, 0.0),
        RigidBody::Fixed,
        Collider::cuboid(FLOOR_HALF_SIZE, 0.5, FLOOR_HALF_SIZE),
    ));

    // Ramp, 25 degrees
    commands.spawn((
        Mesh3d(meshes.add(Cuboid::new(4.0, 0.5, 10.0))),
        MeshMaterial3d(materials.add(Color::srgb(0.4, 0.5, 0.3))),
        Transform::from_xyz(8.0, 1.5, 8.0).with_rotation(Quat::from_rotation_x(-25f32.to_radians())),
        RigidBody::Fixed,
        Collider::cuboid(2.0, 0.25, 5.0),
    ));

    // Moving platform
    let origin = Vec3::new(-8.0, 0.25, 6.0);
    commands.spawn((
        Mesh3d(meshes.add(Cuboid::new(4.0, 0.5, 4.0))),
        MeshMaterial3d(materials.add(Color::srgb(0.2, 0.4, 0.7))),
        Transform::from_translation(origin),
        RigidBody::KinematicVelocityBased,
        Velocity::linear(Vec3::new(PLATFORM_SPEED, 0.0, 0.0)),
        Collider::cuboid(2.0, 0.25, 2.0),
        MovingPlatform { origin },
    ));

    // Well
    commands.spawn((
        Mesh3d(meshes.add(Cylinder::new(0.8, 1.0))),
        MeshMaterial3d(materials.add(Color::srgb(0.6, 0.5, 0.4))),
        Transform::from_xyz(-3.0, 0.5, -4.0),
        RigidBody::Fixed,
        Collider::cylinder(0.5, 0.8),
        PointOfInterest::new("well").with_radius(2.0),
    ));
}

fn spawn_player(
    commands: &mut Commands,
    asset_server: &AssetServer,
    meshes: &mut ResMut<Assets<Mesh>>,
    materials: &mut ResMut<Assets<StandardMaterial>>,
) {
    let config = ControllerConfig::default();

    let player = commands
        .spawn((
            Transform::from_xyz(0.0, 2.0, 0.0),
            CharacterController::new(),
            config,
            KeyboardControlled,
            Player,
            Rapier3dCharacterBundle::from_config(&config).with_autostep(0.3, 0.2),
        ))
        .id();

    let placeholder = commands
        .spawn((
            Mesh3d(meshes.add(Capsule3d::new(
                config.capsule_radius,
                config.capsule_segment_half_height() * 2.0,
            ))),
            MeshMaterial3d(materials.add(Color::srgb(0.8, 0.6, 0.2))),
            Transform::default(),
        ))
        .id();

    commands
        .spawn((
            Transform::from_xyz(0.0, 2.0, 0.0),
            Visibility::default(),
            CharacterVisual::new(player),
            VisualProxy::new(asset_server.load("models/character.glb"))
                .with_placeholder(placeholder),
        ))
        .add_child(placeholder);
}

// ==================== Systems ====================

fn move_platforms(mut q: Query<(&Transform, &mut Velocity, &MovingPlatform)>) {
    for (transform, mut velocity, platform) in &mut q {
        let offset = transform.translation.x - platform.origin.x;
        if offset > PLATFORM_TRAVEL && velocity.linvel.x > 0.0
            || offset < -PLATFORM_TRAVEL && velocity.linvel.x < 0.0
        {
            velocity.linvel.x = -velocity.linvel.x;
        }
    }
}

fn log_interactions(mut events: EventReader<InteractionTriggered>) {
    for event in events.read() {
        info!("{} interacted with the {}", event.agent, event.name);
    }
}

fn follow_camera(
    q_player: Query<&Transform, (With<Player>, Without<Camera3d>)>,
    mut q_camera: Query<&mut Transform, With<Camera3d>>,
) {
    let Ok(player) = q_player.single() else {
        return;
    };
    let Ok(mut camera) = q_camera.single_mut() else {
        return;
    };
    camera.translation = player.translation + CAMERA_OFFSET;
    camera.look_at(player.translation, Vec3::Y);
}
