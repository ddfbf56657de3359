//! Session handlers
//!
//! A session owns one handler instance per registered factory. Handlers see
//! three kinds of events for their entity:
//!
//! - **initialize**: the session starts, with the zones at the entity's location
//! - **cross boundary**: the entity moves into a different zone set; returning
//!   false vetoes the move
//! - **tick**: periodic re-evaluation without movement
//!
//! Most handlers are a [`FlagValueHandler`] around a [`FlagEffect`]; the entry
//! gate is a plain [`SessionHandler`] because it decides on every crossing,
//! not only when its flag value changes.

mod blocked_effects;
mod collision;
mod entry_level;
mod flag_value;
mod play_sounds;
mod speed;


pub use blocked_effects::BlockedEffects;
pub use collision::CollisionOverride;
pub use entry_level::{Denial, EntryLevelHandler, LevelBound};
pub use flag_value::{EffectScope, FlagEffect, FlagValueHandler, TickPolicy};
pub use play_sounds::{RepeatingEffectHandle, SoundLoops};
pub use speed::SpeedOverride;

use crate::host::{CrossingKind, EntityId, Location, SpeedKind};
use crate::services::HostServices;
use crate::zones::RegionSet;

/// A zone-set change being dispatched to handlers
pub struct Crossing<'a> {
    pub from: &'a Location,
    pub to: &'a Location,
    pub to_set: &'a dyn RegionSet,
    pub kind: CrossingKind,
}

pub trait SessionHandler: Send {
    fn name(&self) -> &'static str;

    fn initialize(&mut self, entity: EntityId, location: &Location, set: &dyn RegionSet);

    /// Returns false to veto the crossing
    fn on_cross_boundary(&mut self, entity: EntityId, crossing: &Crossing<'_>) -> bool;

    fn tick(&mut self, entity: EntityId, location: &Location, set: &dyn RegionSet);

    /// The session is ending; undo everything and cancel outstanding work
    fn uninitialize(&mut self, entity: EntityId, location: &Location);
}

pub type HandlerFactory = Box<dyn Fn(&HostServices) -> Box<dyn SessionHandler> + Send + Sync>;

/// Every built-in handler. The entry gate comes first so a vetoed crossing
/// never reaches the effect handlers.
pub fn default_factories() -> Vec<HandlerFactory> {
    vec![
        Box::new(|services| Box::new(EntryLevelHandler::new(services.clone()))),
        Box::new(|services| {
            Box::new(FlagValueHandler::new(
                services.clone(),
                SpeedOverride::new(SpeedKind::Walk),
            ))
        }),
        Box::new(|services| {
            Box::new(FlagValueHandler::new(
                services.clone(),
                SpeedOverride::new(SpeedKind::Fly),
            ))
        }),
        Box::new(|services| Box::new(FlagValueHandler::new(services.clone(), BlockedEffects))),
        Box::new(|services| {
            Box::new(FlagValueHandler::new(services.clone(), CollisionOverride))
        }),
        Box::new(|services| {
            Box::new(FlagValueHandler::new(services.clone(), SoundLoops::new()))
        }),
    ]
}
