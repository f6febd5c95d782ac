//! Locomotion state machine.
//!
//! A character is always in exactly one [`LocomotionState`]. The state is
//! advanced once per physics tick from the latest support sample and the
//! jump intent; see [`LocomotionState::next`].

use bevy::prelude::*;

use crate::detection::SupportState;

/// Discrete locomotion state of a character.
///
/// `JumpStart` is a one-tick pulse: the tick that enters it applies the jump
/// velocity, the following tick always moves on to `Airborne`.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LocomotionState {
    /// Resting on a support surface.
    #[default]
    Grounded,
    /// No support; gravity is integrated.
    Airborne,
    /// The single tick on which a jump launches.
    JumpStart,
}

impl LocomotionState {
    /// Compute the state for this tick.
    ///
    /// Rules are applied in order:
    /// 1. `Grounded -> Airborne` when support is anything but `Supported`.
    /// 2. `Airborne -> Grounded` when support is `Supported`.
    /// 3. `Grounded -> JumpStart` when a jump is requested.
    /// 4. `JumpStart -> Airborne` unconditionally.
    ///
    /// Rules 3 and 4 see the state produced by rules 1 and 2, so a landing
    /// tick with jump held goes straight to `JumpStart`.
    pub fn next(self, support: SupportState, jump_requested: bool) -> Self {
        let supported = support == SupportState::Supported;
        let settled = match self {
            Self::Grounded if !supported => Self::Airborne,
            Self::Airborne if supported => Self::Grounded,
            other => other,
        };

        match settled {
            Self::Grounded if jump_requested => Self::JumpStart,
            Self::JumpStart => Self::Airborne,
            other => other,
        }
    }

    /// Check if the character is grounded.
    pub fn is_grounded(&self) -> bool {
        *self == Self::Grounded
    }

    /// Check if the character is airborne (including the jump pulse).
    pub fn is_airborne(&self) -> bool {
        !self.is_grounded()
    }
}
