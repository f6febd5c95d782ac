//! # `kinematic_character_controller`
//!
//! A kinematic 3D character controller with physics backend abstraction.
//!
//! This crate turns player (or AI) intent into a velocity for a capsule
//! character every physics tick:
//! - Tracks a three-state locomotion machine (grounded, airborne, jump start)
//! - Samples the surface below the character to decide whether it is supported
//! - Keeps ground speed constant on slopes and never launches off ramps
//! - Inherits the velocity of moving platforms
//! - Applies a fixed-height jump and constant gravity while airborne
//! - Abstracts the physics backend (Rapier3D included behind `rapier3d`)
//!
//! ## Architecture
//!
//! Each fixed tick runs three phases, in order:
//! 1. The backend probes the support surface ([`CharacterControllerSet::Sensors`])
//! 2. The state machine advances and the velocity is solved
//!    ([`CharacterControllerSet::Locomotion`])
//! 3. The backend moves the capsule with that velocity
//!    ([`CharacterControllerSet::Integration`])
//!
//! Input and facing are updated once per frame, and the visual is moved to the
//! latest physics position after the physics step.
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use kinematic_character_controller::prelude::*;
//!
//! let config = ControllerConfig::default().with_ground_speed(6.0);
//! let mut controller = CharacterController::new();
//! let mut intent = MovementIntent::default();
//! intent.set_direction(0.0, 1.0);
//!
//! let support = SupportInfo::supported(Vec3::Y, Vec3::ZERO);
//! let velocity = controller.tick(1.0 / 60.0, &intent, support, &config, &PassthroughResolver);
//! assert!((velocity.length() - 6.0).abs() < 1e-4);
//! ```

use bevy::prelude::*;

pub mod backend;
pub mod config;
pub mod detection;
pub mod intent;
pub mod interaction;
pub mod presentation;
pub mod solver;
pub mod state;
pub mod systems;

#[cfg(feature = "rapier3d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::backend::CharacterPhysicsBackend;
    pub use crate::config::{CharacterController, ControllerConfig};
    pub use crate::detection::{SupportInfo, SupportSensor, SupportState};
    pub use crate::intent::{InputBindings, KeyAction, KeyboardControlled, MovementIntent};
    pub use crate::interaction::{InteractRequested, InteractionTriggered, PointOfInterest};
    pub use crate::presentation::{
        AnimationMode, CharacterVisual, Facing, LocomotionAnimationPlugin, LocomotionClips,
        ProxyStatus, VisualProxy,
    };
    pub use crate::solver::{PassthroughResolver, PlaneProjectionResolver, VelocityResolver};
    pub use crate::state::LocomotionState;
    pub use crate::{CharacterControllerPlugin, CharacterControllerSet};

    #[cfg(feature = "rapier3d")]
    pub use crate::rapier::{Rapier3dBackend, Rapier3dCharacterBundle};
}

/// System sets of the character controller, in execution order.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterControllerSet {
    /// Keyboard intent and facing (`PreUpdate`).
    Input,
    /// Support probing (`FixedUpdate`).
    Sensors,
    /// State machine and velocity solve (`FixedUpdate`).
    Locomotion,
    /// Moving characters through the physics world (`FixedUpdate`).
    Integration,
}

/// Main plugin for the character controller system.
///
/// This plugin is generic over a physics backend `B` which provides the actual
/// physics operations (support probing, collision-aware integration).
///
/// # Type Parameters
/// - `B`: The physics backend implementation (e.g., `Rapier3dBackend`)
///
/// # Examples
///
/// With Rapier3D backend:
/// ```rust,ignore
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use kinematic_character_controller::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default().in_fixed_schedule())
///     .add_plugins(CharacterControllerPlugin::<Rapier3dBackend>::default())
///     .run();
/// ```
pub struct CharacterControllerPlugin<B: backend::CharacterPhysicsBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::CharacterPhysicsBackend> Default for CharacterControllerPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::CharacterPhysicsBackend> Plugin for CharacterControllerPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<config::CharacterController>();
        app.register_type::<config::ControllerConfig>();
        app.register_type::<state::LocomotionState>();
        app.register_type::<detection::SupportSensor>();
        app.register_type::<intent::MovementIntent>();
        app.register_type::<intent::KeyboardControlled>();
        app.register_type::<intent::InputBindings>();
        app.register_type::<presentation::Facing>();
        app.register_type::<presentation::CharacterVisual>();
        app.register_type::<interaction::PointOfInterest>();

        app.init_resource::<intent::InputBindings>();
        app.add_event::<bevy::input::keyboard::KeyboardInput>();
        app.add_event::<interaction::InteractRequested>();
        app.add_event::<interaction::InteractionTriggered>();

        // Add the physics backend plugin
        app.add_plugins(B::plugin());

        // Physics step: sense, solve, integrate
        app.configure_sets(
            FixedUpdate,
            (
                CharacterControllerSet::Sensors,
                CharacterControllerSet::Locomotion,
                CharacterControllerSet::Integration,
            )
                .chain(),
        );
        app.add_systems(
            FixedUpdate,
            (
                systems::update_support_sensors::<B>.in_set(CharacterControllerSet::Sensors),
                systems::update_locomotion::<B>.in_set(CharacterControllerSet::Locomotion),
                systems::integrate_characters::<B>.in_set(CharacterControllerSet::Integration),
            ),
        );

        // Per-frame input, applied before the next physics step reads it
        app.configure_sets(
            PreUpdate,
            CharacterControllerSet::Input.after(bevy::input::InputSystem),
        );
        app.add_systems(
            PreUpdate,
            (systems::read_keyboard_intent, presentation::update_facing)
                .chain()
                .in_set(CharacterControllerSet::Input),
        );

        app.add_systems(Update, interaction::detect_interactions);
        app.add_systems(
            PostUpdate,
            presentation::sync_character_visuals::<B>
                .before(bevy::transform::TransformSystem::TransformPropagate),
        );
    }
}
