//! Presentation bridge.
//!
//! Copies a character's resolved physics position and facing onto a visual
//! entity, and switches the visual's locomotion animation between idle and
//! walking. Everything here only reads controller state, so a character
//! without a visual (or whose visual failed to load) keeps working headless.

use bevy::asset::LoadState;
use bevy::gltf::Gltf;
use bevy::prelude::*;

use crate::backend::CharacterPhysicsBackend;
use crate::config::CharacterController;
use crate::intent::MovementIntent;

/// Yaw-only facing of a character.
///
/// Only changes when there is horizontal input, so an idle character keeps
/// looking where it last moved.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Default)]
#[reflect(Component)]
pub struct Facing {
    /// Rotation about the world Y axis (radians). Zero faces +Z.
    pub yaw: f32,
}

impl Facing {
    /// Facing towards a horizontal direction, or `None` when it has no
    /// horizontal component.
    pub fn from_direction(direction: Vec3) -> Option<Self> {
        if direction.x == 0.0 && direction.z == 0.0 {
            return None;
        }
        Some(Self {
            yaw: direction.x.atan2(direction.z),
        })
    }

    /// Turn towards `direction` if it is nonzero. Returns whether the facing
    /// was updated.
    pub fn face(&mut self, direction: Vec3) -> bool {
        match Self::from_direction(direction) {
            Some(facing) => {
                *self = facing;
                true
            }
            None => false,
        }
    }

    /// Rotation to apply to the visual.
    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw)
    }
}

/// Locomotion animation currently shown.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnimationMode {
    #[default]
    Idle,
    Walking,
}

/// Edge-triggered idle/walking switch.
///
/// [`AnimationSwitch::update`] only reports a mode when the "has horizontal
/// input" flag flips, so clips are not restarted every frame.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnimationSwitch {
    moving: bool,
}

impl AnimationSwitch {
    /// Feed the current input flag; returns the mode to switch to on an edge.
    pub fn update(&mut self, moving: bool) -> Option<AnimationMode> {
        if moving == self.moving {
            return None;
        }
        self.moving = moving;
        Some(self.mode())
    }

    /// Mode matching the last seen input flag.
    pub fn mode(&self) -> AnimationMode {
        if self.moving {
            AnimationMode::Walking
        } else {
            AnimationMode::Idle
        }
    }
}

/// Visual representation of a character.
///
/// The entity carrying this component follows `agent`'s physics position
/// (plus `offset`) and facing every frame.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct CharacterVisual {
    /// The character entity driven by the controller.
    pub agent: Entity,
    /// Offset added to the agent position.
    pub offset: Vec3,
}

impl CharacterVisual {
    /// Create a visual following `agent` with no offset.
    pub fn new(agent: Entity) -> Self {
        Self {
            agent,
            offset: Vec3::ZERO,
        }
    }

    /// Builder: set the offset.
    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }
}

/// Turn characters towards their horizontal input.
pub fn update_facing(mut q: Query<(&MovementIntent, &mut Facing), Changed<MovementIntent>>) {
    for (intent, mut facing) in &mut q {
        if let Some(turned) = Facing::from_direction(intent.direction) {
            *facing = turned;
        }
    }
}

/// Copy the latest physics position and facing onto character visuals.
///
/// Reads whatever position the last physics tick produced; if no tick ran
/// since the previous frame the visual simply keeps the same position.
pub fn sync_character_visuals<B: CharacterPhysicsBackend>(world: &mut World) {
    let visuals: Vec<(Entity, CharacterVisual)> = world
        .query::<(Entity, &CharacterVisual)>()
        .iter(world)
        .map(|(e, visual)| (e, *visual))
        .collect();

    for (entity, visual) in visuals {
        if world.get::<CharacterController>(visual.agent).is_none() {
            continue;
        }

        let position = B::get_position(world, visual.agent) + visual.offset;
        let rotation = world
            .get::<Facing>(visual.agent)
            .map(Facing::rotation)
            .unwrap_or_default();

        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.translation = position;
            transform.rotation = rotation;
        }
    }
}

// ==================== Animated visual proxies ====================

/// Loading status of a [`VisualProxy`].
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxyStatus {
    #[default]
    Loading,
    Ready,
    /// The asset failed to load; the character runs headless.
    Failed,
}

/// Animated glTF model attached to a [`CharacterVisual`].
///
/// Once the asset is loaded its scene is spawned as a child of this entity,
/// the placeholder (if any) is hidden and idle/walk clips are picked by name.
#[derive(Component, Debug, Clone)]
pub struct VisualProxy {
    /// The glTF asset to show.
    pub source: Handle<Gltf>,
    /// Entity shown until the model is ready, hidden afterwards.
    pub placeholder: Option<Entity>,
    /// Local transform of the spawned scene.
    pub scene_transform: Transform,
    /// Current loading status.
    pub status: ProxyStatus,
}

impl VisualProxy {
    /// Create a proxy with the default model placement (feet at the capsule
    /// bottom, scaled up by 1.4).
    pub fn new(source: Handle<Gltf>) -> Self {
        Self {
            source,
            placeholder: None,
            scene_transform: Transform::from_xyz(0.0, -0.9, 0.0).with_scale(Vec3::splat(1.4)),
            status: ProxyStatus::Loading,
        }
    }

    /// Builder: set the placeholder entity.
    pub fn with_placeholder(mut self, placeholder: Entity) -> Self {
        self.placeholder = Some(placeholder);
        self
    }

    /// Builder: set the scene transform.
    pub fn with_scene_transform(mut self, transform: Transform) -> Self {
        self.scene_transform = transform;
        self
    }
}

/// Animation graph nodes used for locomotion on a visual.
#[derive(Component, Debug, Clone)]
pub struct LocomotionClips {
    pub graph: Handle<AnimationGraph>,
    pub idle: Option<AnimationNodeIndex>,
    pub walk: Option<AnimationNodeIndex>,
    /// Entity holding the [`AnimationPlayer`], once the scene spawned one.
    pub player: Option<Entity>,
    pub switch: AnimationSwitch,
}

impl LocomotionClips {
    /// Start the clip for `mode` and stop the other one.
    pub fn play(&self, mode: AnimationMode, player: &mut AnimationPlayer) {
        let (stop, start) = match mode {
            AnimationMode::Idle => (self.walk, self.idle),
            AnimationMode::Walking => (self.idle, self.walk),
        };
        if let Some(stop) = stop {
            player.stop(stop);
        }
        if let Some(start) = start {
            player.play(start).repeat();
        }
    }
}

/// Pick the idle and walk clips from a list of clip names.
///
/// Idle is the first clip named like "idle", otherwise the first clip. Walk
/// is the first clip named like "walk" or "run", otherwise the second clip.
/// Matching ignores case.
pub fn select_locomotion_clips(names: &[Option<&str>]) -> (Option<usize>, Option<usize>) {
    let named_like = |index: &usize, needles: &[&str]| {
        names[*index]
            .map(|name| {
                let name = name.to_lowercase();
                needles.iter().any(|needle| name.contains(needle))
            })
            .unwrap_or(false)
    };

    let idle = (0..names.len())
        .find(|i| named_like(i, &["idle"]))
        .or(if names.is_empty() { None } else { Some(0) });
    let walk = (0..names.len())
        .find(|i| named_like(i, &["walk", "run"]))
        .or(if names.len() > 1 { Some(1) } else { None });
    (idle, walk)
}

/// Plugin that loads [`VisualProxy`] models and drives their locomotion
/// animations.
///
/// Needs the asset, scene, glTF and animation plugins (all part of
/// `DefaultPlugins`).
pub struct LocomotionAnimationPlugin;

impl Plugin for LocomotionAnimationPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<ProxyStatus>();
        app.add_systems(
            Update,
            (
                resolve_visual_proxies,
                attach_animation_players,
                drive_locomotion_animation,
            )
                .chain(),
        );
    }
}

/// Spawn loaded proxy scenes and build their locomotion animation graphs.
pub fn resolve_visual_proxies(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    gltfs: Res<Assets<Gltf>>,
    mut graphs: ResMut<Assets<AnimationGraph>>,
    mut q_proxies: Query<(Entity, &mut VisualProxy)>,
    mut q_visibility: Query<&mut Visibility>,
) {
    for (entity, mut proxy) in &mut q_proxies {
        if proxy.status != ProxyStatus::Loading {
            continue;
        }

        match asset_server.get_load_state(proxy.source.id()) {
            Some(LoadState::Failed(err)) => {
                error!("visual proxy for {entity} failed to load, running headless: {err}");
                proxy.status = ProxyStatus::Failed;
                continue;
            }
            Some(LoadState::Loaded) => {}
            _ => continue,
        }

        let Some(gltf) = gltfs.get(&proxy.source) else {
            continue;
        };
        let Some(scene) = gltf
            .default_scene
            .clone()
            .or_else(|| gltf.scenes.first().cloned())
        else {
            error!("visual proxy for {entity} has no scene, running headless");
            proxy.status = ProxyStatus::Failed;
            continue;
        };

        commands
            .entity(entity)
            .with_child((SceneRoot(scene), proxy.scene_transform));

        if let Some(placeholder) = proxy.placeholder {
            if let Ok(mut visibility) = q_visibility.get_mut(placeholder) {
                *visibility = Visibility::Hidden;
            }
        }
        proxy.status = ProxyStatus::Ready;

        let names: Vec<Option<&str>> = gltf
            .animations
            .iter()
            .map(|clip| {
                gltf.named_animations
                    .iter()
                    .find(|&(_, named)| named == clip)
                    .map(|(name, _)| &**name)
            })
            .collect();
        let (idle, walk) = select_locomotion_clips(&names);
        if idle.is_none() && walk.is_none() {
            warn!("visual proxy for {entity} has no animation clips");
            continue;
        }

        let selected: Vec<usize> = idle.into_iter().chain(walk).collect();
        let (graph, nodes) =
            AnimationGraph::from_clips(selected.iter().map(|&i| gltf.animations[i].clone()));
        let node_for = |clip: Option<usize>| {
            clip.and_then(|clip| selected.iter().position(|&i| i == clip))
                .map(|slot| nodes[slot])
        };

        commands.entity(entity).insert(LocomotionClips {
            graph: graphs.add(graph),
            idle: node_for(idle),
            walk: node_for(walk),
            player: None,
            switch: AnimationSwitch::default(),
        });
        info!("visual proxy for {entity} ready");
    }
}

/// Hook freshly spawned animation players up to their visual's clips and
/// start the idle loop.
pub fn attach_animation_players(
    mut commands: Commands,
    q_added: Query<Entity, Added<AnimationPlayer>>,
    q_parents: Query<&ChildOf>,
    mut q_clips: Query<&mut LocomotionClips>,
    mut q_players: Query<&mut AnimationPlayer>,
) {
    for player_entity in &q_added {
        let mut current = player_entity;
        while let Ok(child_of) = q_parents.get(current) {
            current = child_of.parent();
            let Ok(mut clips) = q_clips.get_mut(current) else {
                continue;
            };
            if clips.player.is_some() {
                break;
            }

            clips.player = Some(player_entity);
            commands
                .entity(player_entity)
                .insert(AnimationGraphHandle(clips.graph.clone()));
            if let Ok(mut player) = q_players.get_mut(player_entity) {
                clips.play(AnimationMode::Idle, &mut player);
            }
            break;
        }
    }
}

/// Switch between idle and walking when a character starts or stops moving.
pub fn drive_locomotion_animation(
    q_agents: Query<&MovementIntent>,
    mut q_visuals: Query<(&CharacterVisual, &mut LocomotionClips)>,
    mut q_players: Query<&mut AnimationPlayer>,
) {
    for (visual, mut clips) in &mut q_visuals {
        let Some(player_entity) = clips.player else {
            continue;
        };
        let Ok(intent) = q_agents.get(visual.agent) else {
            continue;
        };
        let Some(mode) = clips.switch.update(intent.has_direction()) else {
            continue;
        };
        if let Ok(mut player) = q_players.get_mut(player_entity) {
            clips.play(mode, &mut player);
        }
    }
}
