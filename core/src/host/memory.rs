//! In-memory host used by the replay tool and the test suites.
//!
//! Keeps entity attributes, collision groups and bypass grants in one
//! mutex-guarded table and records every mutation as a [`HostEvent`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use hashbrown::{HashMap, HashSet};

use super::{BypassPolicy, CollisionTeams, EntityHost, EntityId, SpeedKind, StatusEffect};
use crate::flags::{SoundDescriptor, StatusEffectKind};
use crate::messages::MessageSink;

/// Mutable attributes of one simulated entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    pub name: String,
    pub online: bool,
    pub walk_speed: f32,
    pub fly_speed: f32,
    pub level: i32,
    pub effects: Vec<StatusEffect>,
}

impl EntityState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            online: true,
            walk_speed: 0.2,
            fly_speed: 0.1,
            level: 0,
            effects: Vec::new(),
        }
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    pub fn with_effect(mut self, effect: StatusEffect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Observable side effect applied to the host
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    SpeedSet {
        entity: EntityId,
        kind: SpeedKind,
        speed: f32,
    },
    EffectRemoved {
        entity: EntityId,
        kind: StatusEffectKind,
    },
    EffectAdded {
        entity: EntityId,
        effect: StatusEffect,
    },
    SoundPlayed {
        entity: EntityId,
        sound: String,
    },
    SoundStopped {
        entity: EntityId,
        sound: String,
    },
    GroupRuleSet {
        group: String,
    },
    MemberAdded {
        group: String,
        entity: EntityId,
    },
    MemberRemoved {
        group: String,
        entity: EntityId,
    },
    Message {
        entity: EntityId,
        text: String,
    },
}

#[derive(Debug, Default)]
struct Team {
    never_collide: bool,
    members: HashSet<EntityId>,
}

#[derive(Debug, Default)]
struct HostState {
    entities: HashMap<EntityId, EntityState>,
    teams: HashMap<String, Team>,
    bypass: HashSet<EntityId>,
    events: Vec<HostEvent>,
}

#[derive(Debug, Default)]
pub struct MemoryHost {
    state: Mutex<HostState>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn spawn(&self, entity: EntityId, state: EntityState) {
        self.lock().entities.insert(entity, state);
    }

    pub fn entity(&self, entity: EntityId) -> Option<EntityState> {
        self.lock().entities.get(&entity).cloned()
    }

    pub fn set_online(&self, entity: EntityId, online: bool) {
        if let Some(state) = self.lock().entities.get_mut(&entity) {
            state.online = online;
        }
    }

    pub fn set_level(&self, entity: EntityId, level: i32) {
        if let Some(state) = self.lock().entities.get_mut(&entity) {
            state.level = level;
        }
    }

    /// Set a speed without recording an event (simulates the game changing it)
    pub fn force_speed(&self, entity: EntityId, kind: SpeedKind, speed: f32) {
        if let Some(state) = self.lock().entities.get_mut(&entity) {
            match kind {
                SpeedKind::Walk => state.walk_speed = speed,
                SpeedKind::Fly => state.fly_speed = speed,
            }
        }
    }

    /// Give the entity an effect without recording an event (simulates a potion)
    pub fn give_effect(&self, entity: EntityId, effect: StatusEffect) {
        if let Some(state) = self.lock().entities.get_mut(&entity) {
            state.effects.retain(|e| e.kind != effect.kind);
            state.effects.push(effect);
        }
    }

    pub fn set_bypass(&self, entity: EntityId, bypass: bool) {
        let mut state = self.lock();
        if bypass {
            state.bypass.insert(entity);
        } else {
            state.bypass.remove(&entity);
        }
    }

    /// Reset a group to its default rule (simulates an operator editing it)
    pub fn reset_group_rule(&self, group: &str) {
        if let Some(team) = self.lock().teams.get_mut(group) {
            team.never_collide = false;
        }
    }

    pub fn group_never_collides(&self, group: &str) -> bool {
        self.lock().teams.get(group).is_some_and(|t| t.never_collide)
    }

    /// Drain recorded events
    pub fn take_events(&self) -> Vec<HostEvent> {
        std::mem::take(&mut self.lock().events)
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.lock().events.clone()
    }
}

impl EntityHost for MemoryHost {
    fn is_online(&self, entity: EntityId) -> bool {
        self.lock().entities.get(&entity).is_some_and(|s| s.online)
    }

    fn speed(&self, entity: EntityId, kind: SpeedKind) -> Option<f32> {
        self.lock().entities.get(&entity).map(|s| match kind {
            SpeedKind::Walk => s.walk_speed,
            SpeedKind::Fly => s.fly_speed,
        })
    }

    fn set_speed(&self, entity: EntityId, kind: SpeedKind, speed: f32) {
        let mut state = self.lock();
        let Some(entity_state) = state.entities.get_mut(&entity) else {
            return;
        };
        match kind {
            SpeedKind::Walk => entity_state.walk_speed = speed,
            SpeedKind::Fly => entity_state.fly_speed = speed,
        }
        state.events.push(HostEvent::SpeedSet {
            entity,
            kind,
            speed,
        });
    }

    fn status_effects(&self, entity: EntityId) -> Vec<StatusEffect> {
        self.lock()
            .entities
            .get(&entity)
            .map(|s| s.effects.clone())
            .unwrap_or_default()
    }

    fn remove_status_effect(&self, entity: EntityId, kind: &StatusEffectKind) {
        let mut state = self.lock();
        let Some(entity_state) = state.entities.get_mut(&entity) else {
            return;
        };
        let before = entity_state.effects.len();
        entity_state.effects.retain(|e| &e.kind != kind);
        if entity_state.effects.len() != before {
            state.events.push(HostEvent::EffectRemoved {
                entity,
                kind: kind.clone(),
            });
        }
    }

    fn add_status_effect(&self, entity: EntityId, effect: StatusEffect) {
        let mut state = self.lock();
        let Some(entity_state) = state.entities.get_mut(&entity) else {
            return;
        };
        entity_state.effects.retain(|e| e.kind != effect.kind);
        entity_state.effects.push(effect.clone());
        state.events.push(HostEvent::EffectAdded { entity, effect });
    }

    fn experience_level(&self, entity: EntityId) -> Option<i32> {
        self.lock().entities.get(&entity).map(|s| s.level)
    }

    fn play_sound(&self, entity: EntityId, sound: &SoundDescriptor) {
        self.lock().events.push(HostEvent::SoundPlayed {
            entity,
            sound: sound.sound.clone(),
        });
    }

    fn stop_sound(&self, entity: EntityId, sound: &SoundDescriptor) {
        self.lock().events.push(HostEvent::SoundStopped {
            entity,
            sound: sound.sound.clone(),
        });
    }
}

impl CollisionTeams for MemoryHost {
    fn ensure_group(&self, group: &str) {
        let mut state = self.lock();
        if !state.teams.contains_key(group) {
            state.teams.insert(group.to_string(), Team::default());
        }
    }

    fn set_never_collide(&self, group: &str) {
        let mut state = self.lock();
        if let Some(team) = state.teams.get_mut(group)
            && !team.never_collide
        {
            team.never_collide = true;
            state.events.push(HostEvent::GroupRuleSet {
                group: group.to_string(),
            });
        }
    }

    fn has_member(&self, group: &str, entity: EntityId) -> bool {
        self.lock()
            .teams
            .get(group)
            .is_some_and(|t| t.members.contains(&entity))
    }

    fn add_member(&self, group: &str, entity: EntityId) {
        let mut state = self.lock();
        if let Some(team) = state.teams.get_mut(group)
            && team.members.insert(entity)
        {
            state.events.push(HostEvent::MemberAdded {
                group: group.to_string(),
                entity,
            });
        }
    }

    fn remove_member(&self, group: &str, entity: EntityId) {
        let mut state = self.lock();
        if let Some(team) = state.teams.get_mut(group)
            && team.members.remove(&entity)
        {
            state.events.push(HostEvent::MemberRemoved {
                group: group.to_string(),
                entity,
            });
        }
    }
}

impl BypassPolicy for MemoryHost {
    fn has_bypass(&self, entity: EntityId, _world: &str) -> bool {
        self.lock().bypass.contains(&entity)
    }
}

impl MessageSink for MemoryHost {
    fn send_message(&self, entity: EntityId, text: &str) {
        self.lock().events.push(HostEvent::Message {
            entity,
            text: text.to_string(),
        });
    }
}
