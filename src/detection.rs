//! Support detection results.
//!
//! The physics backend samples the surface beneath the character once per
//! tick and reports it as a [`SupportInfo`]. The sample is stored on the
//! character in a [`SupportSensor`] so later systems in the same tick (and
//! debugging tools) can read it.

use bevy::prelude::*;

/// Contact classification of the surface below the character.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SupportState {
    /// Standing on a walkable surface.
    Supported,
    /// Touching a surface that is too steep to stand on.
    ///
    /// The controller treats this like [`SupportState::Unsupported`].
    Sliding,
    /// No surface below the character.
    #[default]
    Unsupported,
}

/// One support sample produced by the backend's probe.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct SupportInfo {
    /// Contact classification.
    pub state: SupportState,
    /// Unit normal of the supporting surface.
    pub normal: Vec3,
    /// Velocity of the supporting surface (nonzero on moving platforms).
    pub surface_velocity: Vec3,
}

impl Default for SupportInfo {
    fn default() -> Self {
        Self::unsupported()
    }
}

impl SupportInfo {
    /// Create a sample for a character standing on a surface.
    pub fn supported(normal: Vec3, surface_velocity: Vec3) -> Self {
        Self {
            state: SupportState::Supported,
            normal: normal.normalize_or(Vec3::Y),
            surface_velocity,
        }
    }

    /// Create a sample for a character touching a too-steep surface.
    pub fn sliding(normal: Vec3, surface_velocity: Vec3) -> Self {
        Self {
            state: SupportState::Sliding,
            normal: normal.normalize_or(Vec3::Y),
            surface_velocity,
        }
    }

    /// Create a sample with no contact.
    pub fn unsupported() -> Self {
        Self {
            state: SupportState::Unsupported,
            normal: Vec3::Y,
            surface_velocity: Vec3::ZERO,
        }
    }

    /// Check if the sample reports full support.
    pub fn is_supported(&self) -> bool {
        self.state == SupportState::Supported
    }

    /// Slope angle of the surface relative to the given up axis (radians).
    pub fn slope_angle(&self, up: Vec3) -> f32 {
        self.normal.dot(up).clamp(-1.0, 1.0).acos()
    }
}

/// Latest support sample for a character, refreshed every physics tick.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct SupportSensor {
    /// Sample taken this tick.
    pub latest: SupportInfo,
}
