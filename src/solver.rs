//! Velocity solver.
//!
//! Turns the current locomotion state, movement intent and support sample
//! into the character's next velocity. Every branch decomposes velocity into
//! a component along the up axis and a component in the tangent plane and
//! handles each explicitly.
//!
//! Collision-aware blending of the desired velocity is delegated to a
//! [`VelocityResolver`] supplied by the physics backend. Tests use
//! [`PassthroughResolver`] to isolate the solver's own branching.

use bevy::prelude::*;

use crate::config::ControllerConfig;
use crate::detection::SupportInfo;
use crate::state::LocomotionState;

/// Up-axis speed of the surface-relative velocity above which a grounded
/// character is put back onto the support plane.
pub const SLOPE_LAUNCH_THRESHOLD: f32 = 1e-3;

/// Smallest `normal · up` accepted as a support surface when reprojecting.
pub const MIN_SUPPORT_UP_DOT: f32 = 1e-3;

/// Inputs to [`VelocityResolver::resolve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolveRequest {
    /// Tick duration in seconds.
    pub dt: f32,
    /// Reference forward axis of the character.
    pub forward: Vec3,
    /// Normal of the plane the movement is constrained to.
    pub support_normal: Vec3,
    /// Velocity at the start of the tick.
    pub current_velocity: Vec3,
    /// Velocity of the support surface.
    pub surface_velocity: Vec3,
    /// Velocity the character wants to reach.
    pub desired_velocity: Vec3,
    /// Up axis (opposite gravity).
    pub up: Vec3,
}

/// Blends a desired velocity with contact constraints.
///
/// Implementations must return a velocity that does not push the character
/// into obstacles given the request. The solver treats everything else about
/// the result as opaque.
pub trait VelocityResolver {
    fn resolve(&self, request: &ResolveRequest) -> Vec3;
}

/// Resolver that returns the desired velocity unchanged.
///
/// Models an unobstructed world.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughResolver;

impl VelocityResolver for PassthroughResolver {
    fn resolve(&self, request: &ResolveRequest) -> Vec3 {
        request.desired_velocity
    }
}

/// Resolver that turns the desired velocity onto the support plane.
///
/// The surface-relative desired velocity is projected onto the plane of
/// `support_normal` and rescaled to its original length, then the surface
/// velocity is added back. Obstacles are left to the integrator.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaneProjectionResolver;

impl VelocityResolver for PlaneProjectionResolver {
    fn resolve(&self, request: &ResolveRequest) -> Vec3 {
        let desired = request.desired_velocity;
        let normal = request.support_normal;
        let along_plane = desired - normal * desired.dot(normal);
        along_plane.normalize_or_zero() * desired.length() + request.surface_velocity
    }
}

impl<F> VelocityResolver for F
where
    F: Fn(&ResolveRequest) -> Vec3,
{
    fn resolve(&self, request: &ResolveRequest) -> Vec3 {
        self(request)
    }
}

/// Compute the next velocity for a character.
///
/// `state` is the state already advanced for this tick. A non-positive (or
/// NaN) `dt` returns `current_velocity` unchanged.
pub fn solve_velocity(
    config: &ControllerConfig,
    resolver: &impl VelocityResolver,
    state: LocomotionState,
    direction: Vec3,
    support: &SupportInfo,
    current_velocity: Vec3,
    dt: f32,
) -> Vec3 {
    if !(dt > 0.0) {
        return current_velocity;
    }

    let up = config.up();
    match state {
        LocomotionState::Airborne => {
            let request = ResolveRequest {
                dt,
                forward: config.forward,
                support_normal: up,
                current_velocity,
                surface_velocity: Vec3::ZERO,
                desired_velocity: direction * config.air_speed,
                up,
            };
            let candidate = resolver.resolve(&request);

            // Horizontal from the resolver, vertical carried over from the
            // current velocity so the resolver never overwrites momentum.
            let horizontal = candidate - up * candidate.dot(up);
            let vertical = up * current_velocity.dot(up);
            horizontal + vertical + config.gravity * dt
        }
        LocomotionState::Grounded => {
            let request = ResolveRequest {
                dt,
                forward: config.forward,
                support_normal: support.normal,
                current_velocity,
                surface_velocity: support.surface_velocity,
                desired_velocity: direction * config.ground_speed,
                up,
            };
            let mut relative = resolver.resolve(&request) - support.surface_velocity;
            if relative.dot(up) >= SLOPE_LAUNCH_THRESHOLD {
                relative = flatten_onto_support(
                    relative,
                    support.normal,
                    up,
                    config.max_slope_angle.cos(),
                );
            }
            relative + support.surface_velocity
        }
        LocomotionState::JumpStart => {
            let vertical = current_velocity.dot(up);
            current_velocity + up * (config.jump_speed() - vertical)
        }
    }
}

/// Remove the launching component of a surface-relative velocity.
///
/// The result is `(n × v̂) × up` scaled by `|v| / max(n · up, min_up_dot)`,
/// which has no component along `up`. Passing the cosine of the steepest
/// walkable slope as `min_up_dot` caps the speed-up on steep supports at
/// `|v| / cos(max_slope_angle)`. Surfaces with `n · up <= MIN_SUPPORT_UP_DOT`
/// are walls, not supports: for those the up component is simply dropped.
pub fn flatten_onto_support(velocity: Vec3, normal: Vec3, up: Vec3, min_up_dot: f32) -> Vec3 {
    let speed = velocity.length();
    let normal_up = normal.dot(up);
    if speed <= f32::EPSILON || normal_up <= MIN_SUPPORT_UP_DOT {
        return velocity - up * velocity.dot(up);
    }

    let direction = velocity / speed;
    let horizontal_speed = speed / normal_up.max(min_up_dot).max(MIN_SUPPORT_UP_DOT);
    normal.cross(direction).cross(up) * horizontal_speed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::SupportState;

    const DT: f32 = 1.0 / 60.0;

    fn config() -> ControllerConfig {
        ControllerConfig::default()
    }

    fn flat() -> SupportInfo {
        SupportInfo::supported(Vec3::Y, Vec3::ZERO)
    }

    #[test]
    fn non_positive_dt_is_noop() {
        let velocity = Vec3::new(1.0, 2.0, 3.0);
        for dt in [0.0, -1.0, f32::NAN] {
            let out = solve_velocity(
                &config(),
                &PassthroughResolver,
                LocomotionState::Airborne,
                Vec3::X,
                &flat(),
                velocity,
                dt,
            );
            assert_eq!(out, velocity);
        }
    }

    #[test]
    fn grounded_idle_on_flat_ground_is_at_rest() {
        let mut velocity = Vec3::new(3.0, 0.0, -2.0);
        for _ in 0..5 {
            velocity = solve_velocity(
                &config(),
                &PassthroughResolver,
                LocomotionState::Grounded,
                Vec3::ZERO,
                &flat(),
                velocity,
                DT,
            );
            assert_eq!(velocity, Vec3::ZERO);
        }
    }

    #[test]
    fn grounded_speed_matches_ground_speed() {
        let config = config().with_ground_speed(10.0);
        let ramp = SupportInfo::supported(Vec3::new(0.3, 1.0, -0.2), Vec3::ZERO);
        for direction in [Vec3::X, Vec3::NEG_X, Vec3::Z, Vec3::NEG_Z] {
            for support in [flat(), ramp] {
                let out = solve_velocity(
                    &config,
                    &PassthroughResolver,
                    LocomotionState::Grounded,
                    direction,
                    &support,
                    Vec3::ZERO,
                    DT,
                );
                let horizontal = out - Vec3::Y * out.y;
                assert!((horizontal.length() - 10.0).abs() < 1e-4, "{out:?}");
            }
        }
    }

    #[test]
    fn grounded_uphill_candidate_is_flattened() {
        let normal = Vec3::new(-0.5, 1.0, 0.0).normalize();
        let support = SupportInfo::supported(normal, Vec3::ZERO);
        let out = solve_velocity(
            &config(),
            &PlaneProjectionResolver,
            LocomotionState::Grounded,
            Vec3::X,
            &support,
            Vec3::ZERO,
            DT,
        );

        // No launch off the slope.
        assert!(out.y.abs() < 1e-4, "{out:?}");
        // |v| / (n · up) with |v| = ground speed.
        let expected = 10.0 / normal.dot(Vec3::Y);
        assert!((out.length() - expected).abs() < 1e-3, "{out:?}");
        assert!(out.x > 0.0);
    }

    #[test]
    fn grounded_downhill_candidate_is_kept() {
        let normal = Vec3::new(-0.5, 1.0, 0.0).normalize();
        let support = SupportInfo::supported(normal, Vec3::ZERO);
        let out = solve_velocity(
            &config(),
            &PlaneProjectionResolver,
            LocomotionState::Grounded,
            Vec3::NEG_X,
            &support,
            Vec3::ZERO,
            DT,
        );
        // Walking down the slope follows the plane.
        assert!(out.y < 0.0);
        assert!(out.dot(normal).abs() < 1e-4);
        assert!((out.length() - 10.0).abs() < 1e-3);
    }

    #[test]
    fn grounded_inherits_platform_velocity() {
        let platform = Vec3::new(2.0, 0.5, 0.0);
        let support = SupportInfo::supported(Vec3::Y, platform);
        let out = solve_velocity(
            &config(),
            &PlaneProjectionResolver,
            LocomotionState::Grounded,
            Vec3::ZERO,
            &support,
            Vec3::ZERO,
            DT,
        );
        assert!((out - platform).length() < 1e-5, "{out:?}");
    }

    #[test]
    fn grounded_moving_on_platform_adds_intent() {
        let platform = Vec3::new(0.0, 0.0, 3.0);
        let support = SupportInfo::supported(Vec3::Y, platform);
        let out = solve_velocity(
            &config(),
            &PlaneProjectionResolver,
            LocomotionState::Grounded,
            Vec3::X,
            &support,
            Vec3::ZERO,
            DT,
        );
        assert!((out - Vec3::new(10.0, 0.0, 3.0)).length() < 1e-4, "{out:?}");
    }

    #[test]
    fn jump_sets_exact_vertical_speed() {
        let config = config().with_jump_height(1.5).with_gravity(Vec3::new(0.0, -18.0, 0.0));
        let expected = (2.0f32 * 18.0 * 1.5).sqrt();
        for vertical in [-20.0, -1.0, 0.0, 4.0, 50.0] {
            let current = Vec3::new(3.0, vertical, -1.0);
            let out = solve_velocity(
                &config,
                &PassthroughResolver,
                LocomotionState::JumpStart,
                Vec3::X,
                &flat(),
                current,
                DT,
            );
            assert!((out.y - expected).abs() < 1e-4);
            assert!((expected - 7.348).abs() < 1e-3);
            // Horizontal untouched.
            assert_eq!(out.x, 3.0);
            assert_eq!(out.z, -1.0);
        }
    }

    #[test]
    fn airborne_integrates_gravity() {
        let config = config().with_air_speed(8.0);
        let mut velocity = Vec3::ZERO;
        let ticks = 30;
        for tick in 1..=ticks {
            velocity = solve_velocity(
                &config,
                &PassthroughResolver,
                LocomotionState::Airborne,
                Vec3::new(1.0, 0.0, -1.0),
                &SupportInfo::unsupported(),
                velocity,
                DT,
            );
            let expected_y = -18.0 * tick as f32 * DT;
            assert!((velocity.y - expected_y).abs() < 1e-4);
            assert!((velocity.x - 8.0).abs() < 1e-6);
            assert!((velocity.z + 8.0).abs() < 1e-6);
        }
    }

    #[test]
    fn airborne_ignores_vertical_from_resolver() {
        let bouncy = |request: &ResolveRequest| request.desired_velocity + request.up * 100.0;
        let current = Vec3::new(0.0, 2.0, 0.0);
        let out = solve_velocity(
            &config(),
            &bouncy,
            LocomotionState::Airborne,
            Vec3::ZERO,
            &SupportInfo::unsupported(),
            current,
            DT,
        );
        assert!((out.y - (2.0 - 18.0 * DT)).abs() < 1e-5);
    }

    #[test]
    fn airborne_resolver_sees_up_axis_as_support() {
        let check = |request: &ResolveRequest| {
            assert_eq!(request.support_normal, request.up);
            assert_eq!(request.surface_velocity, Vec3::ZERO);
            request.desired_velocity
        };
        let support = SupportInfo {
            state: SupportState::Sliding,
            normal: Vec3::X,
            surface_velocity: Vec3::ONE,
        };
        solve_velocity(
            &config(),
            &check,
            LocomotionState::Airborne,
            Vec3::Z,
            &support,
            Vec3::ZERO,
            DT,
        );
    }

    #[test]
    fn plane_projection_keeps_speed() {
        let normal = Vec3::new(0.0, 1.0, 1.0).normalize();
        let request = ResolveRequest {
            dt: DT,
            forward: Vec3::Z,
            support_normal: normal,
            current_velocity: Vec3::ZERO,
            surface_velocity: Vec3::ZERO,
            desired_velocity: Vec3::new(0.0, 0.0, -6.0),
            up: Vec3::Y,
        };
        let out = PlaneProjectionResolver.resolve(&request);
        assert!((out.length() - 6.0).abs() < 1e-4);
        assert!(out.dot(normal).abs() < 1e-4);
        assert!(out.y > 0.0);

        let idle = ResolveRequest {
            desired_velocity: Vec3::ZERO,
            surface_velocity: Vec3::X,
            ..request
        };
        assert_eq!(PlaneProjectionResolver.resolve(&idle), Vec3::X);
    }

    #[test]
    fn flatten_has_no_up_component() {
        let normal = Vec3::new(0.2, 1.0, 0.4).normalize();
        let velocity = Vec3::new(3.0, 1.0, -2.0);
        let out = flatten_onto_support(velocity, normal, Vec3::Y, 0.5);
        assert!(out.y.abs() < 1e-5);
        let expected = velocity.length() / normal.y;
        let direction = velocity.normalize();
        let reference = normal.cross(direction).cross(Vec3::Y) * expected;
        assert!((out - reference).length() < 1e-5);
    }

    #[test]
    fn flatten_guards_vertical_wall() {
        let out = flatten_onto_support(Vec3::new(1.0, 5.0, 0.0), Vec3::X, Vec3::Y, 0.5);
        assert!(out.is_finite());
        assert_eq!(out, Vec3::new(1.0, 0.0, 0.0));

        let grazing = Vec3::new(1.0, 1e-5, 0.0).normalize();
        let out = flatten_onto_support(Vec3::new(1.0, 5.0, 0.0), grazing, Vec3::Y, 0.5);
        assert!(out.is_finite());
        assert!(out.length() <= Vec3::new(1.0, 5.0, 0.0).length());
    }

    #[test]
    fn flatten_speed_is_bounded_on_steep_supports() {
        let velocity = Vec3::new(0.0, 2.0, 10.0);
        let speed = velocity.length();
        // cos(60°)
        let min_up_dot = 0.5;

        for normal_up in [0.002_f32, 0.01, 0.1, 0.3, 0.49] {
            let normal = Vec3::new(0.0, normal_up, -(1.0 - normal_up * normal_up).sqrt());
            let out = flatten_onto_support(velocity, normal, Vec3::Y, min_up_dot);
            assert!(out.is_finite());
            assert!(out.y.abs() < 1e-4, "{out:?}");
            assert!(
                out.length() <= speed / min_up_dot + 1e-3,
                "n·up = {normal_up}: {out:?}"
            );
        }

        // Walkable slopes keep the exact |v| / (n · up) scaling.
        let normal = Vec3::new(0.0, 0.8, -0.6);
        let out = flatten_onto_support(velocity, normal, Vec3::Y, min_up_dot);
        let reference = normal.cross(velocity.normalize()).cross(Vec3::Y) * (speed / 0.8);
        assert!((out - reference).length() < 1e-4);
    }

    #[test]
    fn grounded_on_steep_support_is_capped_by_max_slope() {
        // Just above the wall guard.
        let normal = Vec3::new(-(1.0_f32 - 0.01 * 0.01).sqrt(), 0.01, 0.0);
        let support = SupportInfo::supported(normal, Vec3::ZERO);
        let climbing = |request: &ResolveRequest| request.desired_velocity + request.up * 4.0;
        let out = solve_velocity(
            &config(),
            &climbing,
            LocomotionState::Grounded,
            Vec3::Z,
            &support,
            Vec3::ZERO,
            DT,
        );
        let candidate = Vec3::new(0.0, 4.0, 10.0).length();
        assert!(out.is_finite());
        assert!(out.y.abs() < 1e-4, "{out:?}");
        assert!(out.length() <= candidate / config().max_slope_angle.cos() + 1e-3, "{out:?}");
    }

    #[test]
    fn grounded_on_wall_normal_stays_finite() {
        let support = SupportInfo::supported(Vec3::X, Vec3::ZERO);
        let climbing = |request: &ResolveRequest| request.desired_velocity + request.up * 4.0;
        let out = solve_velocity(
            &config(),
            &climbing,
            LocomotionState::Grounded,
            Vec3::Z,
            &support,
            Vec3::ZERO,
            DT,
        );
        assert!(out.is_finite());
        assert!(out.y.abs() < 1e-6);
    }

    #[test]
    fn threshold_is_inclusive() {
        let normal = Vec3::new(-0.5, 1.0, 0.0).normalize();
        let support = SupportInfo::supported(normal, Vec3::ZERO);
        let at_threshold =
            |request: &ResolveRequest| request.desired_velocity + request.up * SLOPE_LAUNCH_THRESHOLD;
        let out = solve_velocity(
            &config(),
            &at_threshold,
            LocomotionState::Grounded,
            Vec3::X,
            &support,
            Vec3::ZERO,
            DT,
        );
        assert!(out.y.abs() < 1e-5);

        let below = |request: &ResolveRequest| request.desired_velocity + request.up * 5e-4;
        let out = solve_velocity(
            &config(),
            &below,
            LocomotionState::Grounded,
            Vec3::X,
            &support,
            Vec3::ZERO,
            DT,
        );
        assert!((out.y - 5e-4).abs() < 1e-7);
    }
}
