//! External value source adapter
//!
//! Placeholder values (`%battlepass_tier%`) come from an optional third-party
//! provider. [`PlaceholderResolver`] probes it on every miss, parses its text
//! leniently and caches successful parses for a fixed TTL. Failures are never
//! cached, so a provider that comes up later is picked up on the next call.

mod memory;

pub use memory::InMemoryPlaceholders;

use std::sync::Arc;

use chrono::{NaiveDateTime, TimeDelta};
use dashmap::DashMap;

use crate::flags::parse_lenient_int;
use crate::host::{Clock, EntityId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("placeholder provider is not available")]
    Unavailable,

    #[error("placeholder '{descriptor}' failed: {reason}")]
    Failed { descriptor: String, reason: String },
}

/// Optional source of placeholder text
pub trait PlaceholderProvider: Send + Sync {
    fn probe_available(&self) -> bool;

    /// Expand `descriptor` (with its `%` delimiters) for `entity`
    fn resolve_text(&self, entity: EntityId, descriptor: &str) -> Result<String, ProviderError>;
}

/// Provider used when no placeholder plugin is installed
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPlaceholderProvider;

impl PlaceholderProvider for NullPlaceholderProvider {
    fn probe_available(&self) -> bool {
        false
    }

    fn resolve_text(&self, _entity: EntityId, _descriptor: &str) -> Result<String, ProviderError> {
        Err(ProviderError::Unavailable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderCacheEntry {
    pub value: Option<i32>,
    pub fetched_at: NaiveDateTime,
}

impl PlaceholderCacheEntry {
    pub fn is_fresh(&self, now: NaiveDateTime, ttl: TimeDelta) -> bool {
        now - self.fetched_at <= ttl
    }
}

pub struct PlaceholderResolver {
    provider: Arc<dyn PlaceholderProvider>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
    cache: DashMap<(EntityId, String), PlaceholderCacheEntry>,
}

impl PlaceholderResolver {
    pub const DEFAULT_TTL: TimeDelta = TimeDelta::seconds(30);

    pub fn new(provider: Arc<dyn PlaceholderProvider>, clock: Arc<dyn Clock>, ttl: TimeDelta) -> Self {
        Self {
            provider,
            clock,
            ttl,
            cache: DashMap::new(),
        }
    }

    /// Integer value of `descriptor` for `entity`, or `None` if it cannot be
    /// resolved right now.
    pub fn resolve(&self, entity: EntityId, descriptor: &str) -> Option<i32> {
        let now = self.clock.now();
        let key = (entity, descriptor.to_string());

        if let Some(entry) = self.cache.get(&key)
            && entry.is_fresh(now, self.ttl)
        {
            return entry.value;
        }

        if !self.provider.probe_available() {
            tracing::debug!(%entity, descriptor, "Placeholder provider unavailable");
            return None;
        }

        let text = match self.provider.resolve_text(entity, descriptor) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(%entity, descriptor, error = %e, "Placeholder lookup failed");
                return None;
            }
        };

        let Some(value) = parse_lenient_int(&text) else {
            tracing::warn!(%entity, descriptor, text = %text, "Placeholder value is not numeric");
            return None;
        };

        self.cache.insert(
            key,
            PlaceholderCacheEntry {
                value: Some(value),
                fetched_at: now,
            },
        );
        Some(value)
    }

    /// Cached entry regardless of freshness
    pub fn cached(&self, entity: EntityId, descriptor: &str) -> Option<PlaceholderCacheEntry> {
        self.cache
            .get(&(entity, descriptor.to_string()))
            .map(|entry| *entry)
    }

    pub fn forget_entity(&self, entity: EntityId) {
        self.cache.retain(|(id, _), _| *id != entity);
    }
}
