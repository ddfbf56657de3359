//! Shared collaborators handed to every handler
//!
//! Everything is constructed once at startup and injected; handlers never
//! reach for globals.

use std::sync::Arc;

use chrono::TimeDelta;
use regionflags_types::EngineConfig;

use crate::effects::EffectStateStore;
use crate::guard::TeleportLoopGuard;
use crate::host::{BypassPolicy, Clock, CollisionTeams, EntityHost, EntityId};
use crate::messages::{CooldownNotifier, MessageSink, Notifier};
use crate::placeholder::{PlaceholderProvider, PlaceholderResolver};
use crate::scheduler::Scheduler;

#[derive(Clone)]
pub struct HostServices {
    pub host: Arc<dyn EntityHost>,
    pub teams: Arc<dyn CollisionTeams>,
    pub bypass: Arc<dyn BypassPolicy>,
    pub scheduler: Arc<dyn Scheduler>,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn Notifier>,
    pub placeholders: Arc<PlaceholderResolver>,
    pub effects: Arc<EffectStateStore>,
    pub teleport_guard: Arc<TeleportLoopGuard>,
    pub config: Arc<EngineConfig>,
}

/// Host capabilities an embedding supplies
pub struct HostParts {
    pub host: Arc<dyn EntityHost>,
    pub teams: Arc<dyn CollisionTeams>,
    pub bypass: Arc<dyn BypassPolicy>,
    pub scheduler: Arc<dyn Scheduler>,
    pub clock: Arc<dyn Clock>,
    pub placeholders: Arc<dyn PlaceholderProvider>,
    pub messages: Arc<dyn MessageSink>,
}

impl HostServices {
    /// Build the shared stores around the host's capabilities
    pub fn assemble(parts: HostParts, config: EngineConfig) -> Self {
        let ttl = seconds(config.placeholder_cache_ttl_secs);
        let cooldown = seconds(config.message_cooldown_secs);

        let notifier = CooldownNotifier::new(
            parts.messages,
            config.messages.clone(),
            Arc::clone(&parts.clock),
            cooldown,
        );
        let placeholders =
            PlaceholderResolver::new(parts.placeholders, Arc::clone(&parts.clock), ttl);
        let teleport_guard = TeleportLoopGuard::new(Arc::clone(&parts.scheduler));

        Self {
            host: parts.host,
            teams: parts.teams,
            bypass: parts.bypass,
            scheduler: parts.scheduler,
            clock: parts.clock,
            notifier: Arc::new(notifier),
            placeholders: Arc::new(placeholders),
            effects: Arc::new(EffectStateStore::new()),
            teleport_guard: Arc::new(teleport_guard),
            config: Arc::new(config),
        }
    }

    /// Whether work for `entity` may still be scheduled
    pub fn is_live(&self, entity: EntityId) -> bool {
        self.scheduler.is_active() && self.host.is_online(entity)
    }

    pub fn has_bypass(&self, entity: EntityId, world: &str) -> bool {
        self.bypass.has_bypass(entity, world)
    }

    /// Drop every per-entity record held by the shared stores
    pub fn forget_entity(&self, entity: EntityId) {
        self.effects.forget_entity(entity);
        self.placeholders.forget_entity(entity);
        self.teleport_guard.forget(entity);
        self.notifier.forget_entity(entity);
    }
}

fn seconds(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}
