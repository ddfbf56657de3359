use chrono::{NaiveDateTime, TimeDelta};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use hashbrown::HashMap;

use crate::flags::StatusEffectKind;
use crate::host::{EntityId, SpeedKind, StatusEffect};
use crate::scheduler::TICK_MILLIS;

/// Scalar attribute a handler can override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverrideKind {
    WalkSpeed,
    FlySpeed,
}

impl From<SpeedKind> for OverrideKind {
    fn from(kind: SpeedKind) -> Self {
        match kind {
            SpeedKind::Walk => Self::WalkSpeed,
            SpeedKind::Fly => Self::FlySpeed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverrideRecord {
    pub applied_at: NaiveDateTime,
    /// Live value before the first override; `None` if the host had none
    pub pre_override_value: Option<f32>,
}

/// A status effect removed by a zone, waiting to be given back
#[derive(Debug, Clone, PartialEq)]
pub struct SuppressedStatusEffect {
    pub kind: StatusEffectKind,
    pub expires_at: NaiveDateTime,
    pub amplifier: i32,
    pub ambient: bool,
    pub particles: bool,
}

impl SuppressedStatusEffect {
    /// Capture a live effect. Effects without a positive remaining duration
    /// cannot be restored and yield `None`.
    pub fn capture(effect: &StatusEffect, now: NaiveDateTime) -> Option<Self> {
        if effect.duration_ticks <= 0 {
            return None;
        }
        Some(Self {
            kind: effect.kind.clone(),
            expires_at: now + TimeDelta::milliseconds(i64::from(effect.duration_ticks) * TICK_MILLIS),
            amplifier: effect.amplifier,
            ambient: effect.ambient,
            particles: effect.particles,
        })
    }

    /// Whole ticks left at `now`, rounded down
    pub fn remaining_ticks(&self, now: NaiveDateTime) -> i64 {
        (self.expires_at - now).num_milliseconds() / TICK_MILLIS
    }

    /// The effect to re-apply at `now`, or `None` once it would have run out
    pub fn restore(&self, now: NaiveDateTime) -> Option<StatusEffect> {
        let remaining = self.remaining_ticks(now);
        if remaining <= 0 {
            return None;
        }
        Some(StatusEffect {
            kind: self.kind.clone(),
            duration_ticks: i32::try_from(remaining).unwrap_or(i32::MAX),
            amplifier: self.amplifier,
            ambient: self.ambient,
            particles: self.particles,
        })
    }
}

/// Shared per-entity override and suppression bookkeeping.
///
/// Safe to use from any execution context. No map guard is held across a
/// call into another map.
#[derive(Debug, Default)]
pub struct EffectStateStore {
    overrides: DashMap<(EntityId, OverrideKind), OverrideRecord>,
    suppressed: DashMap<EntityId, HashMap<StatusEffectKind, SuppressedStatusEffect>>,
}

impl EffectStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Overrides
    // ─────────────────────────────────────────────────────────────────────────

    /// Record the pre-override value unless a record already exists.
    /// Returns true if this call created the record.
    pub fn capture_override(
        &self,
        entity: EntityId,
        kind: OverrideKind,
        applied_at: NaiveDateTime,
        pre_override_value: Option<f32>,
    ) -> bool {
        match self.overrides.entry((entity, kind)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(OverrideRecord {
                    applied_at,
                    pre_override_value,
                });
                true
            }
        }
    }

    pub fn override_record(&self, entity: EntityId, kind: OverrideKind) -> Option<OverrideRecord> {
        self.overrides.get(&(entity, kind)).map(|r| *r)
    }

    /// Remove and return the record; only one caller ever gets it
    pub fn take_override(&self, entity: EntityId, kind: OverrideKind) -> Option<OverrideRecord> {
        self.overrides.remove(&(entity, kind)).map(|(_, record)| record)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Suppressed status effects
    // ─────────────────────────────────────────────────────────────────────────

    /// Store a suppressed effect, replacing an older capture of the same kind
    pub fn suppress(&self, entity: EntityId, effect: SuppressedStatusEffect) {
        self.suppressed
            .entry(entity)
            .or_default()
            .insert(effect.kind.clone(), effect);
    }

    pub fn is_suppressed(&self, entity: EntityId, kind: &StatusEffectKind) -> bool {
        self.suppressed
            .get(&entity)
            .is_some_and(|effects| effects.contains_key(kind))
    }

    pub fn suppressed_count(&self, entity: EntityId) -> usize {
        self.suppressed.get(&entity).map_or(0, |effects| effects.len())
    }

    /// Remove and return every suppressed effect for which `keep` is false
    pub fn release_suppressed(
        &self,
        entity: EntityId,
        keep: impl Fn(&StatusEffectKind) -> bool,
    ) -> Vec<SuppressedStatusEffect> {
        let Some(mut effects) = self.suppressed.get_mut(&entity) else {
            return Vec::new();
        };
        let released: Vec<StatusEffectKind> = effects
            .keys()
            .filter(|kind| !keep(kind))
            .cloned()
            .collect();
        let out = released
            .iter()
            .filter_map(|kind| effects.remove(kind))
            .collect();
        let now_empty = effects.is_empty();
        drop(effects);
        if now_empty {
            self.suppressed.remove_if(&entity, |_, effects| effects.is_empty());
        }
        out
    }

    /// Drop every record for `entity` without restoring anything
    pub fn forget_entity(&self, entity: EntityId) {
        self.overrides.retain(|(id, _), _| *id != entity);
        self.suppressed.remove(&entity);
    }

    pub fn is_empty_for(&self, entity: EntityId) -> bool {
        !self.overrides.iter().any(|r| r.key().0 == entity) && self.suppressed_count(entity) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> NaiveDateTime {
        NaiveDateTime::default()
    }

    fn effect(name: &str, duration_ticks: i32) -> StatusEffect {
        StatusEffect {
            kind: StatusEffectKind::new(name).unwrap(),
            duration_ticks,
            amplifier: 1,
            ambient: false,
            particles: true,
        }
    }

    #[test]
    fn test_first_override_wins() {
        let store = EffectStateStore::new();
        let e = EntityId(1);

        assert!(store.capture_override(e, OverrideKind::WalkSpeed, t0(), Some(0.2)));
        assert!(!store.capture_override(e, OverrideKind::WalkSpeed, t0(), Some(0.5)));
        assert_eq!(
            store.override_record(e, OverrideKind::WalkSpeed).unwrap().pre_override_value,
            Some(0.2)
        );
        // Kinds are independent
        assert!(store.capture_override(e, OverrideKind::FlySpeed, t0(), Some(0.1)));
    }

    #[test]
    fn test_take_override_once() {
        let store = EffectStateStore::new();
        let e = EntityId(1);
        store.capture_override(e, OverrideKind::WalkSpeed, t0(), Some(0.2));

        assert!(store.take_override(e, OverrideKind::WalkSpeed).is_some());
        assert!(store.take_override(e, OverrideKind::WalkSpeed).is_none());
        // After restoration a new override captures again
        assert!(store.capture_override(e, OverrideKind::WalkSpeed, t0(), Some(0.3)));
    }

    #[test]
    fn test_restore_keeps_remaining_time() {
        let captured = SuppressedStatusEffect::capture(&effect("speed", 200), t0()).unwrap();
        let later = t0() + TimeDelta::milliseconds(60 * TICK_MILLIS);

        let restored = captured.restore(later).unwrap();
        assert_eq!(restored.duration_ticks, 140);
        assert_eq!(restored.amplifier, 1);
        assert!(restored.particles);
    }

    #[test]
    fn test_expired_effect_not_restored() {
        let captured = SuppressedStatusEffect::capture(&effect("speed", 200), t0()).unwrap();
        assert!(captured.restore(t0() + TimeDelta::seconds(10)).is_none());
        assert!(captured.restore(t0() + TimeDelta::seconds(11)).is_none());
    }

    #[test]
    fn test_non_positive_duration_not_captured() {
        assert!(SuppressedStatusEffect::capture(&effect("speed", 0), t0()).is_none());
        assert!(SuppressedStatusEffect::capture(&effect("speed", -1), t0()).is_none());
    }

    #[test]
    fn test_release_filters_and_cleans_up() {
        let store = EffectStateStore::new();
        let e = EntityId(3);
        for name in ["speed", "jump_boost"] {
            store.suppress(e, SuppressedStatusEffect::capture(&effect(name, 100), t0()).unwrap());
        }
        let speed = StatusEffectKind::new("speed").unwrap();

        let released = store.release_suppressed(e, |kind| *kind == speed);
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].kind.as_str(), "jump_boost");
        assert!(store.is_suppressed(e, &speed));

        let released = store.release_suppressed(e, |_| false);
        assert_eq!(released.len(), 1);
        assert_eq!(store.suppressed_count(e), 0);
        assert!(store.is_empty_for(e));
    }

    #[test]
    fn test_forget_entity_drops_everything() {
        let store = EffectStateStore::new();
        let e = EntityId(9);
        store.capture_override(e, OverrideKind::WalkSpeed, t0(), Some(0.2));
        store.suppress(e, SuppressedStatusEffect::capture(&effect("speed", 100), t0()).unwrap());
        store.capture_override(EntityId(10), OverrideKind::WalkSpeed, t0(), Some(0.2));

        store.forget_entity(e);
        assert!(store.is_empty_for(e));
        assert!(!store.is_empty_for(EntityId(10)));
    }
}
