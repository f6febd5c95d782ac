//! Controller configuration and per-character controller state.
//!
//! [`ControllerConfig`] holds the tuning constants, fixed when the character
//! is spawned. [`CharacterController`] owns everything the controller carries
//! from one tick to the next: the locomotion state and the velocity.

use bevy::prelude::*;

use crate::detection::{SupportInfo, SupportSensor};
use crate::intent::MovementIntent;
use crate::presentation::Facing;
use crate::solver::{self, VelocityResolver};
use crate::state::LocomotionState;

/// Core character controller component.
///
/// This is the state shared between the state machine and the solver. Only
/// [`CharacterController::tick`] mutates it during a physics step; every
/// other system reads it.
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
#[require(ControllerConfig, MovementIntent, SupportSensor, Facing)]
pub struct CharacterController {
    /// Current locomotion state.
    pub state: LocomotionState,
    /// Velocity produced by the last tick.
    pub velocity: Vec3,
    /// Support sample used by the last tick.
    pub support: SupportInfo,
}

impl CharacterController {
    /// Create a new grounded controller at rest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one physics tick.
    ///
    /// Advances the state machine from `support` and the jump intent, then
    /// solves the velocity for the new state starting from `self.velocity`.
    /// A non-positive `dt` leaves the controller untouched.
    pub fn tick(
        &mut self,
        dt: f32,
        intent: &MovementIntent,
        support: SupportInfo,
        config: &ControllerConfig,
        resolver: &impl VelocityResolver,
    ) -> Vec3 {
        if !(dt > 0.0) {
            return self.velocity;
        }

        self.state = self.state.next(support.state, intent.jump);
        self.velocity = solver::solve_velocity(
            config,
            resolver,
            self.state,
            intent.direction,
            &support,
            self.velocity,
            dt,
        );
        self.support = support;
        self.velocity
    }

    /// Check if the controller is grounded.
    pub fn is_grounded(&self) -> bool {
        self.state.is_grounded()
    }

    /// Velocity component along the up axis.
    pub fn vertical_speed(&self, config: &ControllerConfig) -> f32 {
        self.velocity.dot(config.up())
    }

    /// Velocity with the up-axis component removed.
    pub fn horizontal_velocity(&self, config: &ControllerConfig) -> Vec3 {
        let up = config.up();
        self.velocity - up * self.velocity.dot(up)
    }
}

/// Configuration parameters for the character controller.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct ControllerConfig {
    // === Movement Settings ===
    /// Horizontal speed while grounded (units/second).
    pub ground_speed: f32,

    /// Horizontal speed while airborne (units/second).
    pub air_speed: f32,

    /// Apex height of a jump from rest (units).
    pub jump_height: f32,

    // === World Settings ===
    /// Gravity acceleration. The up axis is its opposite.
    pub gravity: Vec3,

    /// Reference forward axis handed to the velocity resolver.
    pub forward: Vec3,

    // === Collider Settings ===
    /// Total capsule height, including both caps.
    pub capsule_height: f32,

    /// Capsule radius.
    pub capsule_radius: f32,

    // === Support Probe Settings ===
    /// Extra distance below the capsule bottom still counted as contact.
    pub support_distance: f32,

    /// Steepest surface still counted as support (radians).
    pub max_slope_angle: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            ground_speed: 10.0,
            air_speed: 8.0,
            jump_height: 1.5,

            gravity: Vec3::new(0.0, -18.0, 0.0),
            forward: Vec3::Z,

            capsule_height: 1.8,
            capsule_radius: 0.6,

            support_distance: 0.1,
            max_slope_angle: std::f32::consts::FRAC_PI_3, // 60 degrees
        }
    }
}

impl ControllerConfig {
    /// Get the up axis (normalized opposite of gravity).
    ///
    /// Falls back to `Vec3::Y` when gravity is zero.
    #[inline]
    pub fn up(&self) -> Vec3 {
        (-self.gravity).normalize_or(Vec3::Y)
    }

    /// Get the down axis.
    #[inline]
    pub fn down(&self) -> Vec3 {
        -self.up()
    }

    /// Initial vertical speed that reaches `jump_height` under `gravity`.
    pub fn jump_speed(&self) -> f32 {
        (2.0 * self.gravity.length() * self.jump_height).sqrt()
    }

    /// Distance from the capsule centre to its bottom.
    #[inline]
    pub fn capsule_half_height(&self) -> f32 {
        self.capsule_height * 0.5
    }

    /// Half length of the capsule's inner segment (height without caps).
    #[inline]
    pub fn capsule_segment_half_height(&self) -> f32 {
        (self.capsule_half_height() - self.capsule_radius).max(0.0)
    }

    /// Builder: set ground speed.
    pub fn with_ground_speed(mut self, speed: f32) -> Self {
        self.ground_speed = speed;
        self
    }

    /// Builder: set air speed.
    pub fn with_air_speed(mut self, speed: f32) -> Self {
        self.air_speed = speed;
        self
    }

    /// Builder: set jump height.
    pub fn with_jump_height(mut self, height: f32) -> Self {
        self.jump_height = height;
        self
    }

    /// Builder: set gravity.
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// Builder: set the forward axis.
    pub fn with_forward(mut self, forward: Vec3) -> Self {
        self.forward = forward.normalize_or(Vec3::Z);
        self
    }

    /// Builder: set capsule dimensions.
    pub fn with_capsule(mut self, height: f32, radius: f32) -> Self {
        self.capsule_height = height;
        self.capsule_radius = radius;
        self
    }

    /// Builder: set support probe tolerance.
    pub fn with_support_distance(mut self, distance: f32) -> Self {
        self.support_distance = distance;
        self
    }

    /// Builder: set the steepest walkable slope (radians).
    pub fn with_max_slope_angle(mut self, angle: f32) -> Self {
        self.max_slope_angle = angle;
        self
    }
}
