//! Core controller systems.
//!
//! The physics-step systems are exclusive and generic over the physics
//! backend, so the same locomotion logic runs on any engine that implements
//! [`CharacterPhysicsBackend`]. Each tick runs three phases in order: sample
//! support, tick the state machine and solve velocity, then integrate.

use bevy::input::keyboard::KeyboardInput;
use bevy::prelude::*;

use crate::backend::CharacterPhysicsBackend;
use crate::config::{CharacterController, ControllerConfig};
use crate::detection::SupportSensor;
use crate::intent::{InputBindings, KeyAction, KeyboardControlled, MovementIntent};
use crate::interaction::InteractRequested;

/// Refresh every character's [`SupportSensor`] from the physics backend.
pub fn update_support_sensors<B: CharacterPhysicsBackend>(world: &mut World) {
    let dt = B::get_fixed_timestep(world);

    let entities: Vec<(Entity, Vec3)> = world
        .query_filtered::<(Entity, &ControllerConfig), With<CharacterController>>()
        .iter(world)
        .map(|(e, config)| (e, config.down()))
        .collect();

    for (entity, down) in entities {
        let support = B::probe_support(world, entity, down, dt);
        if let Some(mut sensor) = world.get_mut::<SupportSensor>(entity) {
            sensor.latest = support;
        }
    }
}

/// Advance the locomotion state machine and solve this tick's velocity.
///
/// Picks up the velocity the backend actually achieved last tick, so
/// collisions (walls, ceilings, landing) feed back into the solver.
pub fn update_locomotion<B: CharacterPhysicsBackend>(world: &mut World) {
    let dt = B::get_fixed_timestep(world);
    if !(dt > 0.0) {
        return;
    }

    let entities: Vec<(Entity, ControllerConfig, MovementIntent, SupportSensor, CharacterController)> =
        world
            .query::<(
                Entity,
                &ControllerConfig,
                &MovementIntent,
                &SupportSensor,
                &CharacterController,
            )>()
            .iter(world)
            .map(|(e, config, intent, sensor, controller)| {
                (e, *config, *intent, *sensor, controller.clone())
            })
            .collect();

    for (entity, config, intent, sensor, mut controller) in entities {
        controller.velocity = B::get_velocity(world, entity);
        let previous = controller.state;

        let velocity = {
            let resolver = B::resolver(world, entity);
            controller.tick(dt, &intent, sensor.latest, &config, &resolver)
        };

        if controller.state != previous {
            debug!(
                entity = ?entity,
                from = ?previous,
                to = ?controller.state,
                "locomotion state changed"
            );
        }

        if let Some(mut stored) = world.get_mut::<CharacterController>(entity) {
            *stored = controller;
        }
        B::set_velocity(world, entity, velocity);
    }
}

/// Move characters through the physics world with their solved velocity.
pub fn integrate_characters<B: CharacterPhysicsBackend>(world: &mut World) {
    let dt = B::get_fixed_timestep(world);
    if !(dt > 0.0) {
        return;
    }

    let entities: Vec<(Entity, Vec3, CharacterController)> = world
        .query::<(Entity, &ControllerConfig, &CharacterController)>()
        .iter(world)
        .map(|(e, config, controller)| (e, config.gravity, controller.clone()))
        .collect();

    for (entity, gravity, controller) in entities {
        B::integrate(world, entity, dt, &controller.support, gravity);
    }
}

/// Translate raw key events into [`MovementIntent`] for keyboard-driven
/// characters.
///
/// Unbound keys are ignored. The interact key emits an [`InteractRequested`]
/// on press only.
pub fn read_keyboard_intent(
    mut key_events: EventReader<KeyboardInput>,
    bindings: Res<InputBindings>,
    mut q_intents: Query<(Entity, &mut MovementIntent), With<KeyboardControlled>>,
    mut interact: EventWriter<InteractRequested>,
) {
    for event in key_events.read() {
        let Some(action) = bindings.action_for(event.key_code) else {
            continue;
        };
        let pressed = event.state.is_pressed();

        for (entity, mut intent) in &mut q_intents {
            if action == KeyAction::Interact {
                if pressed {
                    interact.write(InteractRequested { agent: entity });
                }
                continue;
            }
            intent.apply(action, pressed);
        }
    }
}
