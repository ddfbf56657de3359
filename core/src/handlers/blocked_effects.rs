//! Status-effect suppression
//!
//! Effects a zone blocks are removed from the entity and parked in the
//! effect store with their absolute expiry. Once no longer blocked they come
//! back with whatever time they had left, or not at all if that time ran out
//! while they were parked.

use std::collections::BTreeSet;

use crate::effects::SuppressedStatusEffect;
use crate::flags::{BLOCKED_EFFECTS, Flag, StatusEffectKind};
use crate::host::EntityId;
use crate::services::HostServices;

use super::flag_value::{EffectScope, FlagEffect, TickPolicy};

pub struct BlockedEffects;

impl FlagEffect for BlockedEffects {
    type Value = BTreeSet<StatusEffectKind>;
    type Desired = BTreeSet<StatusEffectKind>;

    fn flag(&self) -> Flag<Self::Value> {
        BLOCKED_EFFECTS
    }

    /// Effects can be re-applied at any time (potions, beacons), and parked
    /// effects can expire, so the set is enforced every tick.
    fn tick_policy(&self) -> TickPolicy {
        TickPolicy::Reevaluate
    }

    fn desired(&self, scope: &EffectScope<'_>, value: Option<&Self::Value>) -> Option<Self::Desired> {
        if scope.has_bypass() {
            return None;
        }
        value.cloned()
    }

    fn apply(&mut self, scope: &EffectScope<'_>, blocked: Self::Desired) {
        schedule_enforce(scope, blocked);
    }

    fn restore(&mut self, scope: &EffectScope<'_>) {
        schedule_enforce(scope, BTreeSet::new());
    }
}

fn schedule_enforce(scope: &EffectScope<'_>, blocked: BTreeSet<StatusEffectKind>) {
    if !scope.is_live() {
        return;
    }
    let services = scope.services.clone();
    let entity = scope.entity;
    scope.services.scheduler.run_at_entity(
        entity,
        Box::new(move || {
            if services.is_live(entity) {
                enforce(&services, entity, &blocked);
            }
        }),
    );
}

/// Suppress every active effect in `blocked`, then give back every parked
/// effect that is no longer in it.
fn enforce(services: &HostServices, entity: EntityId, blocked: &BTreeSet<StatusEffectKind>) {
    let now = services.clock.now();

    if !blocked.is_empty() {
        for effect in services.host.status_effects(entity) {
            if !blocked.contains(&effect.kind) {
                continue;
            }
            match SuppressedStatusEffect::capture(&effect, now) {
                Some(parked) => services.effects.suppress(entity, parked),
                None => tracing::debug!(%entity, kind = %effect.kind, "Removing effect without remaining time"),
            }
            services.host.remove_status_effect(entity, &effect.kind);
            tracing::debug!(%entity, kind = %effect.kind, "Status effect suppressed");
        }
    }

    for parked in services.effects.release_suppressed(entity, |kind| blocked.contains(kind)) {
        match parked.restore(now) {
            Some(effect) => {
                tracing::debug!(
                    %entity,
                    kind = %effect.kind,
                    remaining_ticks = effect.duration_ticks,
                    "Status effect restored"
                );
                services.host.add_status_effect(entity, effect);
            }
            None => tracing::debug!(%entity, kind = %parked.kind, "Suppressed effect expired, dropped"),
        }
    }
}
