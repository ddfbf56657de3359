//! Generic flag-change state machine
//!
//! [`FlagValueHandler`] watches one flag for one entity and turns value
//! transitions into calls on a [`FlagEffect`]:
//!
//! | transition                             | effect call                     |
//! |----------------------------------------|---------------------------------|
//! | session start                          | `desired` → `apply` / `restore` |
//! | crossing, value changed                | `desired` → `apply` / `restore` |
//! | crossing, value gone                   | `desired(None)` → `restore`     |
//! | crossing, value unchanged              | nothing                         |
//! | tick, with `TickPolicy::Reevaluate`    | `desired` → `apply` / `restore` |
//! | session end                            | `teardown`                      |

use crate::flags::{Flag, FlagType};
use crate::host::{EntityId, Location};
use crate::services::HostServices;
use crate::zones::{RegionSet, query_value};

use super::{Crossing, SessionHandler};

/// Whether a handler re-evaluates its flag on every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPolicy {
    Ignore,
    Reevaluate,
}

/// Entity and collaborators an effect call operates on
pub struct EffectScope<'a> {
    pub services: &'a HostServices,
    pub entity: EntityId,
    pub world: &'a str,
}

impl EffectScope<'_> {
    pub fn has_bypass(&self) -> bool {
        self.services.has_bypass(self.entity, self.world)
    }

    /// Checked before scheduling any work for the entity
    pub fn is_live(&self) -> bool {
        self.services.is_live(self.entity)
    }
}

/// The policy-specific half of a flag handler
pub trait FlagEffect: Send + 'static {
    type Value: FlagType;
    /// What a value commands once bypass and safety limits are taken into account
    type Desired;

    fn flag(&self) -> Flag<Self::Value>;

    fn tick_policy(&self) -> TickPolicy {
        TickPolicy::Ignore
    }

    /// `None` means the effect should not be active
    fn desired(&self, scope: &EffectScope<'_>, value: Option<&Self::Value>) -> Option<Self::Desired>;

    fn apply(&mut self, scope: &EffectScope<'_>, desired: Self::Desired);

    fn restore(&mut self, scope: &EffectScope<'_>);

    /// Session end. Defaults to a restore.
    fn teardown(&mut self, scope: &EffectScope<'_>) {
        self.restore(scope);
    }
}

pub struct FlagValueHandler<E: FlagEffect> {
    services: HostServices,
    effect: E,
    last_value: Option<E::Value>,
}

impl<E: FlagEffect> FlagValueHandler<E> {
    pub fn new(services: HostServices, effect: E) -> Self {
        Self {
            services,
            effect,
            last_value: None,
        }
    }

    pub fn effect(&self) -> &E {
        &self.effect
    }

    /// Value seen at the last accepted crossing (or at session start)
    pub fn last_value(&self) -> Option<&E::Value> {
        self.last_value.as_ref()
    }

    fn handle(&mut self, entity: EntityId, world: &str, value: Option<&E::Value>) {
        let scope = EffectScope {
            services: &self.services,
            entity,
            world,
        };
        match self.effect.desired(&scope, value) {
            Some(desired) => self.effect.apply(&scope, desired),
            None => self.effect.restore(&scope),
        }
    }

    pub fn on_initial_value(&mut self, entity: EntityId, location: &Location, value: Option<&E::Value>) {
        self.handle(entity, &location.world, value);
    }

    pub fn on_value_changed(
        &mut self,
        entity: EntityId,
        crossing: &Crossing<'_>,
        new_value: &E::Value,
        _old_value: Option<&E::Value>,
    ) -> bool {
        self.handle(entity, &crossing.to.world, Some(new_value));
        true
    }

    pub fn on_value_absent(
        &mut self,
        entity: EntityId,
        crossing: &Crossing<'_>,
        _old_value: &E::Value,
    ) -> bool {
        self.handle(entity, &crossing.to.world, None);
        true
    }

    pub fn on_tick(&mut self, entity: EntityId, location: &Location, set: &dyn RegionSet) {
        let value = query_value(set, entity, &self.effect.flag());
        self.handle(entity, &location.world, value.as_ref());
    }
}

impl<E: FlagEffect> SessionHandler for FlagValueHandler<E> {
    fn name(&self) -> &'static str {
        self.effect.flag().name()
    }

    fn initialize(&mut self, entity: EntityId, location: &Location, set: &dyn RegionSet) {
        let value = query_value(set, entity, &self.effect.flag());
        self.on_initial_value(entity, location, value.as_ref());
        self.last_value = value;
    }

    fn on_cross_boundary(&mut self, entity: EntityId, crossing: &Crossing<'_>) -> bool {
        let value = query_value(crossing.to_set, entity, &self.effect.flag());
        if value == self.last_value {
            return true;
        }

        let last = self.last_value.take();
        let proceed = match (&value, &last) {
            (Some(new_value), old) => {
                self.on_value_changed(entity, crossing, new_value, old.as_ref())
            }
            (None, Some(old)) => self.on_value_absent(entity, crossing, old),
            (None, None) => true,
        };

        self.last_value = if proceed { value } else { last };
        proceed
    }

    fn tick(&mut self, entity: EntityId, location: &Location, set: &dyn RegionSet) {
        if self.effect.tick_policy() == TickPolicy::Reevaluate {
            self.on_tick(entity, location, set);
        }
    }

    fn uninitialize(&mut self, entity: EntityId, location: &Location) {
        let scope = EffectScope {
            services: &self.services,
            entity,
            world: &location.world,
        };
        self.effect.teardown(&scope);
        self.last_value = None;
    }
}
