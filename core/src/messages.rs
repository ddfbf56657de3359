//! Entity notifications
//!
//! Handlers report through a [`Notifier`] using message keys. The default
//! [`CooldownNotifier`] renders keys through the configured [`MessageCatalog`]
//! and swallows repeats of the same message inside the cooldown window, so an
//! entity pressing against a gated zone is not spammed every move.

use std::sync::Arc;

use chrono::{NaiveDateTime, TimeDelta};
use dashmap::DashMap;
use regionflags_types::MessageCatalog;

use crate::host::{Clock, EntityId};

/// Delivers keyed messages to entities
pub trait Notifier: Send + Sync {
    fn notify(&self, entity: EntityId, key: &str, replacements: &[(&str, String)]);

    /// Drop any per-entity state (cooldowns)
    fn forget_entity(&self, _entity: EntityId) {}
}

/// Delivers rendered text to an entity
pub trait MessageSink: Send + Sync {
    fn send_message(&self, entity: EntityId, text: &str);
}

/// Notifier that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, _entity: EntityId, _key: &str, _replacements: &[(&str, String)]) {}
}

pub struct CooldownNotifier {
    sink: Arc<dyn MessageSink>,
    catalog: MessageCatalog,
    clock: Arc<dyn Clock>,
    cooldown: TimeDelta,
    last_sent: DashMap<(EntityId, String), NaiveDateTime>,
}

impl CooldownNotifier {
    pub fn new(
        sink: Arc<dyn MessageSink>,
        catalog: MessageCatalog,
        clock: Arc<dyn Clock>,
        cooldown: TimeDelta,
    ) -> Self {
        Self {
            sink,
            catalog,
            clock,
            cooldown,
            last_sent: DashMap::new(),
        }
    }

    /// Claim the send slot for (entity, key); false while cooling down
    fn try_claim(&self, entity: EntityId, key: &str, now: NaiveDateTime) -> bool {
        let mut claimed = false;
        self.last_sent
            .entry((entity, key.to_string()))
            .and_modify(|last| {
                if now - *last >= self.cooldown {
                    *last = now;
                    claimed = true;
                }
            })
            .or_insert_with(|| {
                claimed = true;
                now
            });
        claimed
    }
}

impl Notifier for CooldownNotifier {
    fn notify(&self, entity: EntityId, key: &str, replacements: &[(&str, String)]) {
        let pairs: Vec<(&str, &str)> = replacements
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .collect();
        let Some(text) = self.catalog.render(key, &pairs) else {
            tracing::trace!(key, "Message disabled");
            return;
        };

        if !self.try_claim(entity, key, self.clock.now()) {
            tracing::trace!(%entity, key, "Message on cooldown");
            return;
        }
        self.sink.send_message(entity, &text);
    }

    fn forget_entity(&self, entity: EntityId) {
        self.last_sent.retain(|(id, _), _| *id != entity);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use regionflags_types::config::ENTRY_MIN_LEVEL_DENIED;

    use super::*;
    use crate::host::ManualClock;

    #[derive(Default)]
    struct Collect(Mutex<Vec<(EntityId, String)>>);

    impl MessageSink for Collect {
        fn send_message(&self, entity: EntityId, text: &str) {
            self.0.lock().unwrap().push((entity, text.to_string()));
        }
    }

    fn setup(catalog: MessageCatalog) -> (Arc<Collect>, ManualClock, CooldownNotifier) {
        let sink = Arc::new(Collect::default());
        let clock = ManualClock::default();
        let notifier = CooldownNotifier::new(
            sink.clone(),
            catalog,
            Arc::new(clock.clone()),
            TimeDelta::seconds(3),
        );
        (sink, clock, notifier)
    }

    fn level_args() -> Vec<(&'static str, String)> {
        vec![("required", "5".to_string()), ("current", "3".to_string())]
    }

    #[test]
    fn test_repeats_inside_cooldown_are_dropped() {
        let (sink, clock, notifier) = setup(MessageCatalog::new());
        let e = EntityId(1);

        notifier.notify(e, ENTRY_MIN_LEVEL_DENIED, &level_args());
        notifier.notify(e, ENTRY_MIN_LEVEL_DENIED, &level_args());
        assert_eq!(sink.0.lock().unwrap().len(), 1);

        clock.advance(TimeDelta::seconds(3));
        notifier.notify(e, ENTRY_MIN_LEVEL_DENIED, &level_args());
        assert_eq!(sink.0.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_cooldown_is_per_entity() {
        let (sink, _clock, notifier) = setup(MessageCatalog::new());
        notifier.notify(EntityId(1), ENTRY_MIN_LEVEL_DENIED, &level_args());
        notifier.notify(EntityId(2), ENTRY_MIN_LEVEL_DENIED, &level_args());
        assert_eq!(sink.0.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_rendered_text_is_sent() {
        let (sink, _clock, notifier) = setup(MessageCatalog::new());
        notifier.notify(EntityId(1), ENTRY_MIN_LEVEL_DENIED, &level_args());
        let sent = sink.0.lock().unwrap();
        assert_eq!(
            sent[0].1,
            "§cYour level (3) is too low to enter this area. §7Min: 5"
        );
    }

    #[test]
    fn test_disabled_message_does_not_start_cooldown() {
        let mut catalog = MessageCatalog::new();
        catalog.set(ENTRY_MIN_LEVEL_DENIED, "");
        let (sink, _clock, notifier) = setup(catalog);

        notifier.notify(EntityId(1), ENTRY_MIN_LEVEL_DENIED, &level_args());
        assert!(sink.0.lock().unwrap().is_empty());
        assert!(notifier.last_sent.is_empty());
    }
}
