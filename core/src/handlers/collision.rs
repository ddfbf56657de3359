use crate::flags::{DISABLE_COLLISION, Flag};

use super::flag_value::{EffectScope, FlagEffect};

/// Moves entities into the shared "never collide" group while a zone
/// disables collision for them.
pub struct CollisionOverride;

impl FlagEffect for CollisionOverride {
    type Value = bool;
    type Desired = ();

    fn flag(&self) -> Flag<bool> {
        DISABLE_COLLISION
    }

    fn desired(&self, scope: &EffectScope<'_>, value: Option<&bool>) -> Option<()> {
        (value == Some(&true) && !scope.has_bypass()).then_some(())
    }

    fn apply(&mut self, scope: &EffectScope<'_>, _: ()) {
        if !scope.is_live() {
            return;
        }
        let services = scope.services.clone();
        let entity = scope.entity;
        scope.services.scheduler.run_at_entity(
            entity,
            Box::new(move || {
                if !services.is_live(entity) {
                    return;
                }
                let group = services.config.collision_group.as_str();
                services.teams.ensure_group(group);
                // Rule may have been reset externally
                services.teams.set_never_collide(group);
                if !services.teams.has_member(group, entity) {
                    services.teams.add_member(group, entity);
                    tracing::debug!(%entity, group, "Collision disabled");
                }
            }),
        );
    }

    fn restore(&mut self, scope: &EffectScope<'_>) {
        if !scope.is_live() {
            return;
        }
        let services = scope.services.clone();
        let entity = scope.entity;
        scope.services.scheduler.run_at_entity(
            entity,
            Box::new(move || {
                let group = services.config.collision_group.as_str();
                if services.teams.has_member(group, entity) {
                    services.teams.remove_member(group, entity);
                    tracing::debug!(%entity, group, "Collision restored");
                }
            }),
        );
    }

    /// Membership is removed right away even if the entity is already gone,
    /// and once more after any add still queued for a live entity.
    fn teardown(&mut self, scope: &EffectScope<'_>) {
        let group = scope.services.config.collision_group.as_str();
        if scope.services.teams.has_member(group, scope.entity) {
            scope.services.teams.remove_member(group, scope.entity);
            tracing::debug!(entity = %scope.entity, group, "Collision membership dropped");
        }
        self.restore(scope);
    }
}
