//! Rapier3D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier3D.
//! Enable with the `rapier3d` feature.
//!
//! Characters are kinematic position-based bodies moved by Rapier's
//! [`KinematicCharacterController`]: the controller hands it this tick's
//! translation, and Rapier resolves it against walls, ceilings and steps.
//! Run Rapier in the fixed schedule
//! (`RapierPhysicsPlugin::default().in_fixed_schedule()`) so the achieved
//! motion is read back in the same tick it was computed.

use bevy::prelude::*;
use bevy_rapier3d::parry::shape::Ball;
use bevy_rapier3d::prelude::*;

use crate::backend::CharacterPhysicsBackend;
use crate::config::{CharacterController, ControllerConfig};
use crate::detection::SupportInfo;
use crate::solver::{PlaneProjectionResolver, VelocityResolver};

/// Rapier3D physics backend for the character controller.
///
/// Support probing is a downward ball shapecast from the bottom of the
/// capsule combined with the `grounded` flag of the last [`KinematicCharacterControllerOutput`].
/// Movement goes through [`KinematicCharacterController::translation`].
pub struct Rapier3dBackend;

impl CharacterPhysicsBackend for Rapier3dBackend {
    fn plugin() -> impl Plugin {
        Rapier3dBackendPlugin
    }

    fn probe_support(world: &mut World, entity: Entity, down: Vec3, _dt: f32) -> SupportInfo {
        world
            .run_system_cached_with(rapier_probe_support, (entity, down))
            .unwrap_or_default()
    }

    fn resolver(_world: &World, _entity: Entity) -> impl VelocityResolver + '_ {
        PlaneProjectionResolver
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<CharacterController>(entity)
            .map(|c| c.velocity)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut controller) = world.get_mut::<CharacterController>(entity) {
            controller.velocity = velocity;
        }
    }

    fn integrate(world: &mut World, entity: Entity, dt: f32, support: &SupportInfo, gravity: Vec3) {
        let velocity = Self::get_velocity(world, entity);
        let snap = world
            .get::<CharacterController>(entity)
            .zip(world.get::<ControllerConfig>(entity))
            .filter(|(controller, _)| controller.is_grounded() && support.is_supported())
            .map(|(_, config)| CharacterLength::Absolute(config.support_distance));

        let Some(mut kcc) = world.get_mut::<KinematicCharacterController>(entity) else {
            return;
        };
        kcc.up = (-gravity).normalize_or(Vec3::Y);
        kcc.snap_to_ground = snap;
        kcc.translation = Some(velocity * dt);
    }

    fn get_position(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Transform>(entity)
            .map(|t| t.translation)
            .or_else(|| world.get::<GlobalTransform>(entity).map(|t| t.translation()))
            .unwrap_or(Vec3::ZERO)
    }
}

/// Plugin that sets up Rapier3D-specific systems for the character controller.
pub struct Rapier3dBackendPlugin;

impl Plugin for Rapier3dBackendPlugin {
    fn build(&self, app: &mut App) {
        // Read back what Rapier actually let the character do this step
        app.add_systems(
            FixedPostUpdate,
            sync_effective_velocity.after(PhysicsSet::Writeback),
        );
    }
}

/// Sample the surface below a character with a downward shapecast.
///
/// A ball of the capsule radius is swept from the centre of the capsule's
/// lower hemisphere over `support_distance`, so the hit is wherever the
/// capsule bottom would touch, including slopes where the contact point is
/// off-centre. A hit steeper than `max_slope_angle` is reported as sliding.
/// When the cast misses but Rapier reported the capsule grounded last step
/// (e.g. standing on an edge), the character is supported on a flat virtual
/// surface.
fn rapier_probe_support(
    In((entity, down)): In<(Entity, Vec3)>,
    rapier_context: ReadRapierContext,
    q_characters: Query<(
        &GlobalTransform,
        &ControllerConfig,
        Option<&KinematicCharacterControllerOutput>,
        Option<&CollisionGroups>,
    )>,
    q_bodies: Query<(&GlobalTransform, &Velocity)>,
) -> SupportInfo {
    let Ok(context) = rapier_context.single() else {
        return SupportInfo::unsupported();
    };
    let Ok((transform, config, output, collision_groups)) = q_characters.get(entity) else {
        return SupportInfo::unsupported();
    };

    let up = -down;
    let origin = transform.translation() - up * config.capsule_segment_half_height();
    let mut filter = QueryFilter::default()
        .exclude_rigid_body(entity)
        .exclude_collider(entity)
        .exclude_sensors();
    if let Some(groups) = collision_groups {
        filter = filter.groups(*groups);
    }

    let Some((hit_entity, hit)) = context.cast_shape(
        origin,
        Quat::IDENTITY,
        down,
        &Ball::new(config.capsule_radius),
        ShapeCastOptions {
            max_time_of_impact: config.support_distance,
            stop_at_penetration: false,
            compute_impact_geometry_on_penetration: true,
            ..default()
        },
        filter,
    ) else {
        if output.is_some_and(|o| o.grounded) {
            return SupportInfo::supported(up, Vec3::ZERO);
        }
        return SupportInfo::unsupported();
    };

    let (normal, point) = hit
        .details
        .map(|d| (d.normal1, d.witness1))
        .unwrap_or((up, origin + down * (hit.time_of_impact + config.capsule_radius)));

    let surface_velocity = q_bodies
        .get(hit_entity)
        .map(|(body, velocity)| velocity.linvel + velocity.angvel.cross(point - body.translation()))
        .unwrap_or(Vec3::ZERO);

    if normal.angle_between(up) > config.max_slope_angle {
        SupportInfo::sliding(normal, surface_velocity)
    } else {
        SupportInfo::supported(normal, surface_velocity)
    }
}

/// Replace each character's velocity with the motion Rapier achieved.
///
/// Blocked motion (walls, ceilings, landing) shows up here, so the next
/// locomotion tick starts from what really happened.
pub fn sync_effective_velocity(
    time: Res<Time<Fixed>>,
    mut q: Query<(&KinematicCharacterControllerOutput, &mut CharacterController)>,
) {
    let dt = time.delta_secs();
    if !(dt > 0.0) {
        return;
    }
    for (output, mut controller) in &mut q {
        controller.velocity = output.effective_translation / dt;
    }
}

/// Bundle for creating a character with Rapier3D physics.
///
/// Provides a kinematic position-based body, a capsule collider matching the
/// [`ControllerConfig`] and a [`KinematicCharacterController`] tuned to the
/// same slope limit.
///
/// # Example
///
/// ```ignore
/// use bevy::prelude::*;
/// use kinematic_character_controller::prelude::*;
///
/// fn spawn_player(mut commands: Commands) {
///     let config = ControllerConfig::default();
///     commands.spawn((
///         Transform::from_xyz(0.0, 2.0, 0.0),
///         CharacterController::new(),
///         config,
///         KeyboardControlled,
///         Rapier3dCharacterBundle::from_config(&config),
///     ));
/// }
/// ```
#[derive(Bundle)]
pub struct Rapier3dCharacterBundle {
    /// Always [`RigidBody::KinematicPositionBased`] for the controller to own motion.
    pub rigid_body: RigidBody,
    /// Capsule collider.
    pub collider: Collider,
    /// Rapier's collide-and-slide mover.
    pub controller: KinematicCharacterController,
}

impl Default for Rapier3dCharacterBundle {
    fn default() -> Self {
        Self::from_config(&ControllerConfig::default())
    }
}

impl Rapier3dCharacterBundle {
    /// Create a bundle matching a controller configuration.
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            rigid_body: RigidBody::KinematicPositionBased,
            collider: Collider::capsule_y(
                config.capsule_segment_half_height(),
                config.capsule_radius,
            ),
            controller: KinematicCharacterController {
                up: config.up(),
                max_slope_climb_angle: config.max_slope_angle,
                min_slope_slide_angle: config.max_slope_angle,
                snap_to_ground: Some(CharacterLength::Absolute(config.support_distance)),
                offset: CharacterLength::Absolute(0.01),
                slide: true,
                ..default()
            },
        }
    }

    /// Let the character climb small steps automatically.
    pub fn with_autostep(mut self, max_height: f32, min_width: f32) -> Self {
        self.controller.autostep = Some(CharacterAutostep {
            max_height: CharacterLength::Absolute(max_height),
            min_width: CharacterLength::Absolute(min_width),
            include_dynamic_bodies: false,
        });
        self
    }

    /// Set the gap Rapier keeps between the capsule and obstacles.
    pub fn with_offset(mut self, offset: f32) -> Self {
        self.controller.offset = CharacterLength::Absolute(offset);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::SupportState;

    #[test]
    fn bundle_matches_config() {
        let config = ControllerConfig::default();
        let bundle = Rapier3dCharacterBundle::from_config(&config);

        assert!(matches!(bundle.rigid_body, RigidBody::KinematicPositionBased));
        let capsule = bundle.collider.as_capsule().unwrap();
        assert!((capsule.radius() - 0.6).abs() < 1e-6);
        assert!((capsule.half_height() - 0.3).abs() < 1e-6);
        assert_eq!(bundle.controller.up, Vec3::Y);
        assert_eq!(bundle.controller.max_slope_climb_angle, config.max_slope_angle);
    }

    #[test]
    fn bundle_autostep() {
        let bundle = Rapier3dCharacterBundle::default().with_autostep(0.3, 0.2);
        assert!(bundle.controller.autostep.is_some());
    }

    #[test]
    fn rapier_backend_velocity_lives_on_controller() {
        let mut world = World::new();
        let entity = world.spawn(CharacterController::new()).id();

        assert_eq!(Rapier3dBackend::get_velocity(&world, entity), Vec3::ZERO);
        Rapier3dBackend::set_velocity(&mut world, entity, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(
            Rapier3dBackend::get_velocity(&world, entity),
            Vec3::new(1.0, 2.0, 3.0)
        );
    }

    #[test]
    fn rapier_backend_get_position() {
        let mut world = World::new();
        let entity = world.spawn(Transform::from_xyz(1.0, 2.0, 3.0)).id();
        assert_eq!(
            Rapier3dBackend::get_position(&world, entity),
            Vec3::new(1.0, 2.0, 3.0)
        );
    }

    #[test]
    fn integrate_hands_translation_to_rapier() {
        let mut world = World::new();
        let config = ControllerConfig::default();
        let entity = world
            .spawn((
                CharacterController {
                    velocity: Vec3::new(6.0, 0.0, 0.0),
                    ..default()
                },
                config,
                Rapier3dCharacterBundle::from_config(&config),
            ))
            .id();

        let support = SupportInfo::supported(Vec3::Y, Vec3::ZERO);
        Rapier3dBackend::integrate(&mut world, entity, 0.5, &support, config.gravity);

        let kcc = world.get::<KinematicCharacterController>(entity).unwrap();
        assert_eq!(kcc.translation, Some(Vec3::new(3.0, 0.0, 0.0)));
        assert_eq!(kcc.up, Vec3::Y);
        assert!(kcc.snap_to_ground.is_some());
    }

    #[test]
    fn integrate_does_not_snap_while_airborne() {
        let mut world = World::new();
        let config = ControllerConfig::default();
        let entity = world
            .spawn((
                CharacterController {
                    state: crate::state::LocomotionState::Airborne,
                    velocity: Vec3::new(0.0, 5.0, 0.0),
                    ..default()
                },
                config,
                Rapier3dCharacterBundle::from_config(&config),
            ))
            .id();

        Rapier3dBackend::integrate(
            &mut world,
            entity,
            0.1,
            &SupportInfo::unsupported(),
            config.gravity,
        );

        let kcc = world.get::<KinematicCharacterController>(entity).unwrap();
        assert!(kcc.snap_to_ground.is_none());
    }

    #[test]
    fn support_without_physics_world_is_unsupported() {
        let mut world = World::new();
        let entity = world
            .spawn((GlobalTransform::default(), ControllerConfig::default()))
            .id();

        let support = Rapier3dBackend::probe_support(&mut world, entity, Vec3::NEG_Y, 1.0 / 60.0);
        assert_eq!(support.state, SupportState::Unsupported);
    }
}
