//! Locomotion speed override (walk and fly)
//!
//! The live speed is captured the first time a zone changes it and put back
//! when the entity leaves, gains bypass or the session ends. Capture always
//! happens before the write, on the entity's context, so an already
//! overridden value is never captured.

use crate::flags::{FLY_SPEED, Flag, WALK_SPEED};
use crate::host::{EntityId, SpeedKind};
use crate::services::HostServices;

use super::flag_value::{EffectScope, FlagEffect};

pub struct SpeedOverride {
    kind: SpeedKind,
}

impl SpeedOverride {
    pub fn new(kind: SpeedKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> SpeedKind {
        self.kind
    }
}

impl FlagEffect for SpeedOverride {
    type Value = f64;
    type Desired = f32;

    fn flag(&self) -> Flag<f64> {
        match self.kind {
            SpeedKind::Walk => WALK_SPEED,
            SpeedKind::Fly => FLY_SPEED,
        }
    }

    fn desired(&self, scope: &EffectScope<'_>, value: Option<&f64>) -> Option<f32> {
        let value = *value?;
        if value.is_nan() {
            tracing::warn!(entity = %scope.entity, flag = self.flag().name(), "Ignoring NaN speed");
            return None;
        }
        Some(value.clamp(-1.0, 1.0) as f32)
    }

    fn apply(&mut self, scope: &EffectScope<'_>, target: f32) {
        if !scope.is_live() {
            return;
        }
        let services = scope.services.clone();
        let (entity, kind) = (scope.entity, self.kind);
        let world = scope.world.to_string();

        scope.services.scheduler.run_at_entity(
            entity,
            Box::new(move || {
                if !services.is_live(entity) {
                    return;
                }
                if services.has_bypass(entity, &world) {
                    restore_speed(&services, entity, kind);
                    return;
                }

                let live = services.host.speed(entity, kind);
                if live == Some(target) {
                    return;
                }
                if services
                    .effects
                    .capture_override(entity, kind.into(), services.clock.now(), live)
                {
                    tracing::debug!(%entity, ?kind, original = ?live, "Captured speed before override");
                }
                services.host.set_speed(entity, kind, target);
                tracing::debug!(%entity, ?kind, speed = target, "Speed override applied");
            }),
        );
    }

    fn restore(&mut self, scope: &EffectScope<'_>) {
        if !scope.is_live() {
            return;
        }
        let services = scope.services.clone();
        let (entity, kind) = (scope.entity, self.kind);

        scope.services.scheduler.run_at_entity(
            entity,
            Box::new(move || {
                if services.is_live(entity) {
                    restore_speed(&services, entity, kind);
                }
            }),
        );
    }
}

/// Put the captured speed back and clear the record
fn restore_speed(services: &HostServices, entity: EntityId, kind: SpeedKind) {
    let Some(record) = services.effects.take_override(entity, kind.into()) else {
        return;
    };
    if let Some(original) = record.pre_override_value {
        services.host.set_speed(entity, kind, original);
        tracing::debug!(%entity, ?kind, speed = original, "Speed restored");
    }
}
