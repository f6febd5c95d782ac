//! Proximity interaction hook.
//!
//! Game logic marks interactable things with a [`PointOfInterest`]. When a
//! character asks to interact (the interact key, or an AI writing
//! [`InteractRequested`]), every point within reach of the character fires an
//! [`InteractionTriggered`] event. The controller itself only provides the
//! character's position; what an interaction does is up to the game.

use bevy::prelude::*;

/// Default reach of a point of interest (world units).
pub const DEFAULT_INTERACT_RADIUS: f32 = 2.0;

/// Named location a character can interact with.
#[derive(Component, Reflect, Debug, Clone, PartialEq)]
#[reflect(Component)]
pub struct PointOfInterest {
    /// Name reported in [`InteractionTriggered`].
    pub name: String,
    /// A character closer than this can interact.
    pub radius: f32,
}

impl PointOfInterest {
    /// Create a point of interest with the default radius.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            radius: DEFAULT_INTERACT_RADIUS,
        }
    }

    /// Builder: set the interaction radius.
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }
}

/// A character wants to interact with whatever is nearby.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractRequested {
    pub agent: Entity,
}

/// A character interacted with a point of interest.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct InteractionTriggered {
    pub agent: Entity,
    pub point: Entity,
    pub name: String,
}

/// Check if `position` is strictly closer than `radius` to `target`.
pub fn within_reach(position: Vec3, target: Vec3, radius: f32) -> bool {
    position.distance(target) < radius
}

/// Turn interaction requests into triggered interactions.
pub fn detect_interactions(
    mut requests: EventReader<InteractRequested>,
    q_agents: Query<&GlobalTransform>,
    q_points: Query<(Entity, &PointOfInterest, &GlobalTransform)>,
    mut triggered: EventWriter<InteractionTriggered>,
) {
    for request in requests.read() {
        let Ok(agent_transform) = q_agents.get(request.agent) else {
            continue;
        };
        let position = agent_transform.translation();

        for (point, poi, point_transform) in &q_points {
            if within_reach(position, point_transform.translation(), poi.radius) {
                debug!(agent = ?request.agent, point = %poi.name, "interaction triggered");
                triggered.write(InteractionTriggered {
                    agent: request.agent,
                    point,
                    name: poi.name.clone(),
                });
            }
        }
    }
}
