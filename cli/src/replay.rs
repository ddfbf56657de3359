//! Scenario replay against the in-memory host
//!
//! Every step is applied, the entity queues are drained, and whatever the
//! host observed is collected into a [`StepReport`].

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use regionflags_core::host::{
    BypassPolicy, Clock, EntityHost, EntityState, HostEvent, Location, ManualClock,
    MemoryHost,
};
use regionflags_core::placeholder::InMemoryPlaceholders;
use regionflags_core::scheduler::ManualScheduler;
use regionflags_core::{HostParts, HostServices, SessionManager, ZoneLayout};
use regionflags_types::EngineConfig;

use crate::scenario::{Scenario, Step};

/// What one step did
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// 0 for scenario setup, then 1-based step number
    pub index: usize,
    /// Simulated time since the replay started, in milliseconds
    pub elapsed_ms: i64,
    pub summary: String,
    pub events: Vec<String>,
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:>3}] t+{:.2}s {}",
            self.index,
            self.elapsed_ms as f64 / 1000.0,
            self.summary
        )?;
        for event in &self.events {
            write!(f, "\n        {event}")?;
        }
        Ok(())
    }
}

pub struct Replay {
    world: String,
    host: Arc<MemoryHost>,
    scheduler: Arc<ManualScheduler>,
    clock: ManualClock,
    started: NaiveDateTime,
    placeholders: Arc<InMemoryPlaceholders>,
    sessions: SessionManager,
}

impl Replay {
    /// Build the host and zones for `scenario`. Entities are attached by
    /// [`Replay::run`].
    pub fn new(scenario: &Scenario, config: EngineConfig) -> Self {
        let clock = ManualClock::default();
        let started = clock.now();
        let host = Arc::new(MemoryHost::new());
        let scheduler = Arc::new(ManualScheduler::new(clock.clone()));
        let placeholders = Arc::new(InMemoryPlaceholders::new());

        let services = HostServices::assemble(
            HostParts {
                host: host.clone(),
                teams: host.clone(),
                bypass: host.clone(),
                scheduler: scheduler.clone(),
                clock: Arc::new(clock.clone()),
                placeholders: placeholders.clone(),
                messages: host.clone(),
            },
            config,
        );
        let layout = scenario
            .zones
            .iter()
            .cloned()
            .fold(ZoneLayout::new(), ZoneLayout::with_zone);

        let replay = Self {
            world: scenario.world.clone(),
            host,
            scheduler,
            clock,
            started,
            placeholders,
            sessions: SessionManager::new(services, Arc::new(layout)),
        };

        for spec in &scenario.entities {
            let name = spec.name.clone().unwrap_or_else(|| format!("entity-{}", spec.id.0));
            let mut state = spec
                .effects
                .iter()
                .cloned()
                .fold(EntityState::new(name).with_level(spec.level), EntityState::with_effect);
            if let Some(speed) = spec.walk_speed {
                state.walk_speed = speed;
            }
            if let Some(speed) = spec.fly_speed {
                state.fly_speed = speed;
            }
            replay.host.spawn(spec.id, state);
            replay.host.set_bypass(spec.id, spec.bypass);
        }
        for placeholder in &scenario.placeholders {
            replay
                .placeholders
                .set(placeholder.entity, &placeholder.descriptor, placeholder.value.clone());
        }
        replay
    }

    pub fn host(&self) -> &MemoryHost {
        &self.host
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Attach every entity, then play the script
    pub fn run(&mut self, scenario: &Scenario) -> Vec<StepReport> {
        for spec in &scenario.entities {
            let world = spec.world.as_deref().unwrap_or(&self.world);
            let [x, y, z] = spec.at;
            self.sessions.attach(spec.id, Location::new(world, x, y, z));
        }
        let mut reports = vec![self.settle(0, format!("attached {} entities", scenario.entities.len()))];

        for (index, step) in scenario.steps.iter().enumerate() {
            let summary = self.apply(step);
            tracing::debug!(step = index + 1, %summary, "Replayed step");
            reports.push(self.settle(index + 1, summary));
        }
        reports
    }

    fn apply(&mut self, step: &Step) -> String {
        match step {
            Step::Move {
                entity,
                to,
                world,
                kind,
            } => {
                let world = world.as_deref().unwrap_or(&self.world);
                let [x, y, z] = *to;
                let allowed = self
                    .sessions
                    .cross(*entity, Location::new(world, x, y, z), *kind);
                format!(
                    "{kind:?} {entity} to {world} ({x}, {y}, {z}): {}",
                    if allowed { "allowed" } else { "denied" }
                )
            }
            Step::Tick { entity: Some(entity) } => {
                self.sessions.tick(*entity);
                format!("tick {entity}")
            }
            Step::Tick { entity: None } => {
                self.sessions.tick_all();
                format!("tick all ({} tracked)", self.sessions.tracked_count())
            }
            Step::Advance { ticks } => {
                self.scheduler.advance(*ticks);
                format!("advance {ticks} ticks")
            }
            Step::SetLevel { entity, level } => {
                self.host.set_level(*entity, *level);
                format!("{entity} level = {level}")
            }
            Step::AddEffect { entity, effect } => {
                self.host.give_effect(*entity, effect.clone());
                format!(
                    "{entity} gains {} for {} ticks",
                    effect.kind, effect.duration_ticks
                )
            }
            Step::SetBypass { entity, bypass } => {
                self.host.set_bypass(*entity, *bypass);
                format!("{entity} bypass = {bypass}")
            }
            Step::SetOnline { entity, online } => {
                self.host.set_online(*entity, *online);
                format!("{entity} online = {online}")
            }
            Step::SetPlaceholder {
                entity,
                descriptor,
                value,
            } => {
                self.placeholders.set(*entity, descriptor, value.clone());
                format!("{entity} {descriptor} = {value:?}")
            }
            Step::Detach { entity } => {
                let tracked = self.sessions.detach(*entity);
                format!(
                    "detach {entity}{}",
                    if tracked { "" } else { " (not tracked)" }
                )
            }
        }
    }

    fn settle(&self, index: usize, summary: String) -> StepReport {
        self.scheduler.run_pending();
        let elapsed_ms = (self.clock.now() - self.started).num_milliseconds();
        StepReport {
            index,
            elapsed_ms,
            summary,
            events: self.host.take_events().iter().map(describe).collect(),
        }
    }

    /// Final per-entity state, one line each
    pub fn final_state(&self) -> Vec<String> {
        self.sessions
            .tracked()
            .into_iter()
            .filter_map(|entity| {
                let state = self.host.entity(entity)?;
                let location = self
                    .sessions
                    .session(entity)
                    .map(|s| s.location().clone())?;
                Some(format!(
                    "{entity} at {} ({}, {}, {}) level {} walk {} fly {} effects [{}]{}{}",
                    location.world,
                    location.x,
                    location.y,
                    location.z,
                    state.level,
                    state.walk_speed,
                    state.fly_speed,
                    state
                        .effects
                        .iter()
                        .map(|e| format!("{}:{}", e.kind, e.duration_ticks))
                        .collect::<Vec<_>>()
                        .join(", "),
                    if self.host.is_online(entity) { "" } else { " offline" },
                    if self.host.has_bypass(entity, &location.world) { " bypass" } else { "" },
                ))
            })
            .collect()
    }
}

fn describe(event: &HostEvent) -> String {
    match event {
        HostEvent::SpeedSet {
            entity,
            kind,
            speed,
        } => format!("{entity} {kind:?} speed -> {speed}"),
        HostEvent::EffectRemoved { entity, kind } => format!("{entity} effect {kind} removed"),
        HostEvent::EffectAdded { entity, effect } => format!(
            "{entity} effect {} added ({} ticks, amplifier {})",
            effect.kind, effect.duration_ticks, effect.amplifier
        ),
        HostEvent::SoundPlayed { entity, sound } => format!("{entity} sound {sound} played"),
        HostEvent::SoundStopped { entity, sound } => format!("{entity} sound {sound} stopped"),
        HostEvent::GroupRuleSet { group } => format!("group {group} set to never collide"),
        HostEvent::MemberAdded { group, entity } => format!("{entity} joined {group}"),
        HostEvent::MemberRemoved { group, entity } => format!("{entity} left {group}"),
        HostEvent::Message { entity, text } => format!("{entity} message: {text}"),
    }
}
