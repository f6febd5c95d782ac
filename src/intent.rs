//! Movement intent and keyboard bindings.
//!
//! Intents represent the desired movement direction from player input or AI.
//! The controller reads them once per physics tick and never writes them.

use bevy::prelude::*;

/// Movement intent for a character.
///
/// The horizontal direction holds raw axis values in `{-1, 0, 1}` on the
/// world X and Z axes. It is deliberately not normalized: holding two keys
/// produces a diagonal that is longer than a single axis.
///
/// # Example
///
/// ```rust
/// use kinematic_character_controller::prelude::*;
///
/// let mut intent = MovementIntent::new();
/// intent.apply(KeyAction::Forward, true);
/// intent.apply(KeyAction::Right, true);
/// assert_eq!(intent.direction.x, 1.0);
/// assert_eq!(intent.direction.z, 1.0);
///
/// intent.apply(KeyAction::Forward, false);
/// assert_eq!(intent.direction.z, 0.0);
/// ```
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Default)]
#[reflect(Component)]
pub struct MovementIntent {
    /// Horizontal movement direction. `y` is always zero.
    pub direction: Vec3,
    /// Whether a jump is currently requested (held).
    pub jump: bool,
}

impl MovementIntent {
    /// Create a new empty movement intent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the horizontal direction, snapping each axis to `{-1, 0, 1}`.
    pub fn set_direction(&mut self, x: f32, z: f32) {
        self.direction = Vec3::new(snap_axis(x), 0.0, snap_axis(z));
    }

    /// Set the jump request.
    pub fn set_jump(&mut self, jump: bool) {
        self.jump = jump;
    }

    /// Apply one key transition.
    ///
    /// Pressing a direction overwrites its axis; releasing either key of an
    /// axis clears the whole axis. Both components are updated from the same
    /// event, so readers never see a half-applied change.
    pub fn apply(&mut self, action: KeyAction, pressed: bool) {
        let mut direction = self.direction;
        match (action, pressed) {
            (KeyAction::Forward, true) => direction.z = 1.0,
            (KeyAction::Back, true) => direction.z = -1.0,
            (KeyAction::Left, true) => direction.x = -1.0,
            (KeyAction::Right, true) => direction.x = 1.0,
            (KeyAction::Forward | KeyAction::Back, false) => direction.z = 0.0,
            (KeyAction::Left | KeyAction::Right, false) => direction.x = 0.0,
            (KeyAction::Jump, pressed) => self.jump = pressed,
            (KeyAction::Interact, _) => {}
        }
        self.direction = direction;
    }

    /// Check if there is any horizontal input.
    pub fn has_direction(&self) -> bool {
        self.direction.x != 0.0 || self.direction.z != 0.0
    }

    /// Desired horizontal velocity for the given speed.
    pub fn desired_velocity(&self, speed: f32) -> Vec3 {
        self.direction * speed
    }

    /// Clear all movement intents.
    pub fn clear(&mut self) {
        self.direction = Vec3::ZERO;
        self.jump = false;
    }
}

fn snap_axis(value: f32) -> f32 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Logical actions a key can be bound to.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAction {
    Forward,
    Back,
    Left,
    Right,
    Jump,
    Interact,
}

/// Marker for characters driven by the keyboard.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct KeyboardControlled;

/// Key bindings used by the keyboard intent system.
#[derive(Resource, Reflect, Debug, Clone)]
#[reflect(Resource)]
pub struct InputBindings {
    pub bindings: Vec<(KeyCode, KeyAction)>,
}

impl Default for InputBindings {
    fn default() -> Self {
        Self {
            bindings: vec![
                (KeyCode::KeyW, KeyAction::Forward),
                (KeyCode::ArrowUp, KeyAction::Forward),
                (KeyCode::KeyS, KeyAction::Back),
                (KeyCode::ArrowDown, KeyAction::Back),
                (KeyCode::KeyA, KeyAction::Left),
                (KeyCode::ArrowLeft, KeyAction::Left),
                (KeyCode::KeyD, KeyAction::Right),
                (KeyCode::ArrowRight, KeyAction::Right),
                (KeyCode::Space, KeyAction::Jump),
                (KeyCode::KeyE, KeyAction::Interact),
            ],
        }
    }
}

impl InputBindings {
    /// Look up the action bound to a key.
    pub fn action_for(&self, key: KeyCode) -> Option<KeyAction> {
        self.bindings
            .iter()
            .find(|(bound, _)| *bound == key)
            .map(|(_, action)| *action)
    }

    /// Builder: bind a key, replacing any previous binding for it.
    pub fn with_binding(mut self, key: KeyCode, action: KeyAction) -> Self {
        self.bindings.retain(|(bound, _)| *bound != key);
        self.bindings.push((key, action));
        self
    }
}
