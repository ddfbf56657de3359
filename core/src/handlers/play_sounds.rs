//! Looping zone sounds
//!
//! One repeating task per sound identity. Every value change and every tick
//! reconciles the running loops against the commanded set: missing
//! identities are started, identities no longer commanded are canceled and
//! stopped, and identities in both sets keep running untouched.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::flags::{Flag, PLAY_SOUNDS, SoundDescriptor};
use crate::scheduler::{TICK, Task, TaskHandle};

use super::flag_value::{EffectScope, FlagEffect, TickPolicy};

/// A running loop and how to silence it
pub struct RepeatingEffectHandle {
    pub key: String,
    pub cancel: TaskHandle,
    stop_action: Task,
}

impl RepeatingEffectHandle {
    /// Cancel the loop, then stop the sound on the entity's context if it is
    /// still live
    fn end(self, scope: &EffectScope<'_>) {
        self.cancel.cancel();
        if scope.is_live() {
            scope.services.scheduler.run_at_entity(scope.entity, self.stop_action);
        }
        tracing::debug!(entity = %scope.entity, sound = %self.key, "Sound loop ended");
    }
}

#[derive(Default)]
pub struct SoundLoops {
    loops: HashMap<String, RepeatingEffectHandle>,
}

impl SoundLoops {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.loops.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn handle(&self, key: &str) -> Option<&TaskHandle> {
        self.loops.get(key).map(|handle| &handle.cancel)
    }

    fn start(&mut self, scope: &EffectScope<'_>, sound: &SoundDescriptor) {
        let entity = scope.entity;
        let host = Arc::clone(&scope.services.host);
        let playing = sound.clone();
        let cancel = scope.services.scheduler.run_at_entity_repeating(
            entity,
            Box::new(move || host.play_sound(entity, &playing)),
            TICK,
            sound.period(),
        );

        let host = Arc::clone(&scope.services.host);
        let stopping = sound.clone();
        let stop_action: Task = Box::new(move || host.stop_sound(entity, &stopping));

        tracing::debug!(%entity, sound = sound.identity(), interval = sound.interval_ticks, "Sound loop started");
        self.loops.insert(
            sound.identity().to_string(),
            RepeatingEffectHandle {
                key: sound.identity().to_string(),
                cancel,
                stop_action,
            },
        );
    }

    fn reconcile(&mut self, scope: &EffectScope<'_>, sounds: &[SoundDescriptor]) {
        if scope.is_live() {
            for sound in sounds {
                if !self.loops.contains_key(sound.identity()) {
                    self.start(scope, sound);
                }
            }
        }

        let stale: Vec<String> = self
            .loops
            .keys()
            .filter(|key| !sounds.iter().any(|s| s.identity() == key.as_str()))
            .cloned()
            .collect();
        for key in stale {
            if let Some(handle) = self.loops.remove(&key) {
                handle.end(scope);
            }
        }
    }
}

impl FlagEffect for SoundLoops {
    type Value = Vec<SoundDescriptor>;
    type Desired = Vec<SoundDescriptor>;

    fn flag(&self) -> Flag<Self::Value> {
        PLAY_SOUNDS
    }

    fn tick_policy(&self) -> TickPolicy {
        TickPolicy::Reevaluate
    }

    /// Sounds are ambience, not policy; bypass does not silence them
    fn desired(&self, _scope: &EffectScope<'_>, value: Option<&Self::Value>) -> Option<Self::Desired> {
        value.cloned()
    }

    fn apply(&mut self, scope: &EffectScope<'_>, sounds: Self::Desired) {
        self.reconcile(scope, &sounds);
    }

    fn restore(&mut self, scope: &EffectScope<'_>) {
        self.reconcile(scope, &[]);
    }
}
