//! Physics backend abstraction.
//!
//! This module defines the trait that physics backends must implement
//! to work with the character controller. The controller never touches the
//! physics world directly; it asks the backend to probe support, resolve
//! velocities against contacts and integrate positions.

use bevy::prelude::*;

use crate::detection::SupportInfo;
use crate::solver::VelocityResolver;

/// Trait for physics backend implementations.
///
/// All functions are static and receive the ECS world, so a backend is just a
/// type-level tag for the plugin (see `Rapier3dBackend` behind the
/// `rapier3d` feature).
pub trait CharacterPhysicsBackend: 'static + Send + Sync {
    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;

    /// Sample the support surface beneath a character.
    ///
    /// # Arguments
    /// * `world` - The ECS world
    /// * `entity` - The character
    /// * `down` - Probe direction (normalized)
    /// * `dt` - Tick duration in seconds
    fn probe_support(world: &mut World, entity: Entity, down: Vec3, dt: f32) -> SupportInfo;

    /// Get the velocity resolver for a character.
    fn resolver(world: &World, entity: Entity) -> impl VelocityResolver + '_;

    /// Get the current velocity of a character.
    fn get_velocity(world: &World, entity: Entity) -> Vec3;

    /// Set the velocity the next [`CharacterPhysicsBackend::integrate`] uses.
    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3);

    /// Advance the character through the physics world with its current
    /// velocity, resolving collisions.
    fn integrate(world: &mut World, entity: Entity, dt: f32, support: &SupportInfo, gravity: Vec3);

    /// Get the current world position of a character.
    fn get_position(world: &World, entity: Entity) -> Vec3;

    /// Get the fixed timestep delta time.
    fn get_fixed_timestep(world: &World) -> f32 {
        world
            .get_resource::<Time<Fixed>>()
            .map(|t| t.delta_secs())
            .filter(|&d| d > 0.0)
            .unwrap_or(1.0 / 60.0)
    }
}

/// Empty plugin for backends that don't need additional setup.
pub struct NoOpBackendPlugin;

impl Plugin for NoOpBackendPlugin {
    fn build(&self, _app: &mut App) {}
}
