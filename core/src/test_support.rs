//! Deterministic wiring shared by the test suites

use std::sync::Arc;

use regionflags_types::EngineConfig;

use crate::flags::FlagValue;
use crate::host::{EntityId, EntityState, Location, ManualClock, MemoryHost};
use crate::placeholder::InMemoryPlaceholders;
use crate::scheduler::ManualScheduler;
use crate::services::{HostParts, HostServices};
use crate::zones::{ResolvedRegions, ZoneDefinition, ZoneLayout};

pub(crate) const WORLD: &str = "world";

pub(crate) struct Harness {
    pub host: Arc<MemoryHost>,
    pub scheduler: Arc<ManualScheduler>,
    pub clock: ManualClock,
    pub placeholders: Arc<InMemoryPlaceholders>,
    pub services: HostServices,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let clock = ManualClock::default();
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

        Self {
            host,
            scheduler,
            clock,
            placeholders,
            services,
        }
    }

    pub fn spawn(&self, id: i64, level: i32) -> EntityId {
        let entity = EntityId(id);
        self.host
            .spawn(entity, EntityState::new(format!("entity-{id}")).with_level(level));
        entity
    }

    /// Run all queued entity work
    pub fn settle(&self) {
        self.scheduler.run_pending();
    }
}

/// Zone covering x in 0..=10 with `flags`
pub(crate) fn zone(flags: &[(&str, FlagValue)]) -> ZoneDefinition {
    flags.iter().fold(
        ZoneDefinition::new("zone", WORLD, [0.0, 0.0, 0.0], [10.0, 255.0, 10.0]),
        |zone, (name, value)| zone.with_flag(name, value.clone()),
    )
}

pub(crate) fn inside() -> Location {
    Location::new(WORLD, 5.0, 64.0, 5.0)
}

pub(crate) fn outside() -> Location {
    Location::new(WORLD, 50.0, 64.0, 50.0)
}

/// Region set at `location` for a layout holding only `zone`
pub(crate) fn regions_at(zone: &ZoneDefinition, location: &Location) -> ResolvedRegions {
    ZoneLayout::new().with_zone(zone.clone()).resolve(location)
}
