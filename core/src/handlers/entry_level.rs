//! Level-gated zone entry
//!
//! Decides every crossing, not only crossings where the rule text changed:
//! the entity's level moves independently of its position. Each bound is
//! checked on its own, and anything that cannot be evaluated (malformed rule,
//! offline entity, missing placeholder provider) lets the entity through.

use regionflags_types::config::{ENTRY_MAX_LEVEL_DENIED, ENTRY_MIN_LEVEL_DENIED};

use crate::flags::{ENTRY_MAX_LEVEL, ENTRY_MIN_LEVEL, Flag, ThresholdRule, ThresholdSource};
use crate::host::{EntityId, Location};
use crate::services::HostServices;
use crate::zones::{RegionSet, query_value};

use super::{Crossing, SessionHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelBound {
    Min,
    Max,
}

impl LevelBound {
    pub fn flag(self) -> Flag<String> {
        match self {
            Self::Min => ENTRY_MIN_LEVEL,
            Self::Max => ENTRY_MAX_LEVEL,
        }
    }

    pub fn message_key(self) -> &'static str {
        match self {
            Self::Min => ENTRY_MIN_LEVEL_DENIED,
            Self::Max => ENTRY_MAX_LEVEL_DENIED,
        }
    }

    pub fn violated_by(self, value: i32, threshold: i32) -> bool {
        match self {
            Self::Min => value < threshold,
            Self::Max => value > threshold,
        }
    }
}

/// Why a crossing was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Denial {
    pub bound: LevelBound,
    pub threshold: i32,
    pub value: i32,
}

pub struct EntryLevelHandler {
    services: HostServices,
}

impl EntryLevelHandler {
    pub fn new(services: HostServices) -> Self {
        Self { services }
    }

    /// Allow or refuse entry into `to_set`, notifying the entity on refusal
    pub fn evaluate_crossing(&self, entity: EntityId, to: &Location, to_set: &dyn RegionSet) -> bool {
        match self.check(entity, to, to_set) {
            Some(denial) => {
                tracing::debug!(
                    %entity,
                    bound = ?denial.bound,
                    threshold = denial.threshold,
                    value = denial.value,
                    "Entry denied"
                );
                self.notify_denied(entity, denial);
                false
            }
            None => true,
        }
    }

    /// The first bound the entity violates, if any
    pub fn check(&self, entity: EntityId, to: &Location, to_set: &dyn RegionSet) -> Option<Denial> {
        if self.services.has_bypass(entity, &to.world) {
            return None;
        }
        [LevelBound::Min, LevelBound::Max]
            .into_iter()
            .find_map(|bound| self.check_bound(entity, to_set, bound))
    }

    fn check_bound(&self, entity: EntityId, set: &dyn RegionSet, bound: LevelBound) -> Option<Denial> {
        let text = query_value(set, entity, &bound.flag())?;
        if text.trim().is_empty() {
            return None;
        }
        let Some(rule) = ThresholdRule::parse_lenient(&text) else {
            tracing::warn!(%entity, flag = bound.flag().name(), rule = %text, "Ignoring malformed entry rule");
            return None;
        };

        let Some(value) = self.entity_value(entity, &rule.source) else {
            tracing::debug!(%entity, source = %rule.source, "Entry value unavailable, allowing");
            return None;
        };

        if !bound.violated_by(value, rule.threshold) {
            tracing::debug!(%entity, ?bound, threshold = rule.threshold, value, "Entry bound satisfied");
            return None;
        }
        Some(Denial {
            bound,
            threshold: rule.threshold,
            value,
        })
    }

    fn entity_value(&self, entity: EntityId, source: &ThresholdSource) -> Option<i32> {
        if !self.services.host.is_online(entity) {
            return None;
        }
        match source {
            ThresholdSource::Xp => self.services.host.experience_level(entity),
            ThresholdSource::Placeholder(descriptor) => {
                self.services.placeholders.resolve(entity, descriptor)
            }
        }
    }

    fn notify_denied(&self, entity: EntityId, denial: Denial) {
        if !self.services.is_live(entity) {
            return;
        }
        let services = self.services.clone();
        self.services.scheduler.run_at_entity(
            entity,
            Box::new(move || {
                if !services.host.is_online(entity) {
                    return;
                }
                services.notifier.notify(
                    entity,
                    denial.bound.message_key(),
                    &[
                        ("required", denial.threshold.to_string()),
                        ("current", denial.value.to_string()),
                    ],
                );
            }),
        );
    }
}

impl SessionHandler for EntryLevelHandler {
    fn name(&self) -> &'static str {
        "entry-level"
    }

    fn initialize(&mut self, _entity: EntityId, _location: &Location, _set: &dyn RegionSet) {}

    fn on_cross_boundary(&mut self, entity: EntityId, crossing: &Crossing<'_>) -> bool {
        self.evaluate_crossing(entity, crossing.to, crossing.to_set)
    }

    fn tick(&mut self, _entity: EntityId, _location: &Location, _set: &dyn RegionSet) {}

    fn uninitialize(&mut self, _entity: EntityId, _location: &Location) {}
}
