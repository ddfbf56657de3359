use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use dashmap::DashMap;

use super::{PlaceholderProvider, ProviderError};
use crate::host::EntityId;

/// Table-backed provider for the replay tool and tests.
///
/// Unknown placeholders expand to themselves, like an installed provider
/// that has no expansion registered.
#[derive(Debug)]
pub struct InMemoryPlaceholders {
    available: AtomicBool,
    values: DashMap<(EntityId, String), String>,
    calls: AtomicUsize,
}

impl Default for InMemoryPlaceholders {
    fn default() -> Self {
        Self {
            available: AtomicBool::new(true),
            values: DashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl InMemoryPlaceholders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, entity: EntityId, descriptor: &str, text: impl Into<String>) {
        self.values.insert((entity, descriptor.to_string()), text.into());
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Number of `resolve_text` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PlaceholderProvider for InMemoryPlaceholders {
    fn probe_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    fn resolve_text(&self, entity: EntityId, descriptor: &str) -> Result<String, ProviderError> {
        if !self.probe_available() {
            return Err(ProviderError::Unavailable);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .values
            .get(&(entity, descriptor.to_string()))
            .map(|text| text.clone())
            .unwrap_or_else(|| descriptor.to_string()))
    }
}
