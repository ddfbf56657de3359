//! Host capability interfaces
//!
//! The host server owns entities, worlds and collision teams. Handlers only
//! ever reach it through the traits in this module, so an embedding server,
//! the replay tool and the tests can each plug in their own implementation.

mod clock;
mod memory;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::{EntityState, HostEvent, MemoryHost};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::flags::{SoundDescriptor, StatusEffectKind};

/// Identity of a tracked entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// The block this location falls into
    pub fn block(&self) -> BlockPos {
        BlockPos {
            world: self.world.clone(),
            x: self.x.floor() as i64,
            y: self.y.floor() as i64,
            z: self.z.floor() as i64,
        }
    }
}

/// Hashable, block-granular position
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub world: String,
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

/// Why an entity's zone set changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossingKind {
    #[default]
    Move,
    /// Forced relocation (teleport, respawn point, plugin move)
    Teleport,
    Spawn,
    Other,
}

impl CrossingKind {
    pub fn is_forced(self) -> bool {
        matches!(self, Self::Teleport)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedKind {
    Walk,
    Fly,
}

/// A live status effect as the host reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEffect {
    pub kind: StatusEffectKind,
    /// Remaining duration in ticks
    pub duration_ticks: i32,
    #[serde(default)]
    pub amplifier: i32,
    #[serde(default)]
    pub ambient: bool,
    #[serde(default = "default_particles")]
    pub particles: bool,
}

fn default_particles() -> bool {
    true
}

/// Entity-scoped reads and writes.
///
/// Mutating calls are only ever issued from work scheduled on the entity's
/// own execution context.
pub trait EntityHost: Send + Sync {
    fn is_online(&self, entity: EntityId) -> bool;

    fn speed(&self, entity: EntityId, kind: SpeedKind) -> Option<f32>;
    fn set_speed(&self, entity: EntityId, kind: SpeedKind, speed: f32);

    fn status_effects(&self, entity: EntityId) -> Vec<StatusEffect>;
    fn remove_status_effect(&self, entity: EntityId, kind: &StatusEffectKind);
    /// Apply `effect`, replacing any active effect of the same kind
    fn add_status_effect(&self, entity: EntityId, effect: StatusEffect);

    /// Built-in experience level
    fn experience_level(&self, entity: EntityId) -> Option<i32>;

    fn play_sound(&self, entity: EntityId, sound: &SoundDescriptor);
    fn stop_sound(&self, entity: EntityId, sound: &SoundDescriptor);
}

/// Server-wide named collision groups.
///
/// Membership edits are safe from any context.
pub trait CollisionTeams: Send + Sync {
    /// Create the group if it does not exist yet
    fn ensure_group(&self, group: &str);
    fn set_never_collide(&self, group: &str);
    fn has_member(&self, group: &str, entity: EntityId) -> bool;
    fn add_member(&self, group: &str, entity: EntityId);
    fn remove_member(&self, group: &str, entity: EntityId);
}

/// Whether an entity ignores zone policy in a world
pub trait BypassPolicy: Send + Sync {
    fn has_bypass(&self, entity: EntityId, world: &str) -> bool;
}

/// Bypass policy for hosts without a permission system
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBypass;

impl BypassPolicy for NoBypass {
    fn has_bypass(&self, _entity: EntityId, _world: &str) -> bool {
        false
    }
}
