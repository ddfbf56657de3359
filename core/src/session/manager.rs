//! Per-entity sessions and event dispatch
//!
//! The manager is the single entry point for host events. It resolves the
//! zones at the relevant location, then fans the event out to the session's
//! handlers in registration order.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::handlers::{Crossing, HandlerFactory, SessionHandler, default_factories};
use crate::host::{CrossingKind, EntityId, Location};
use crate::services::HostServices;
use crate::zones::{RegionSet, ZoneQuery};

/// Policy tracking state for one entity
pub struct TrackedEntitySession {
    entity: EntityId,
    location: Location,
    regions: Arc<dyn RegionSet>,
    handlers: Vec<Box<dyn SessionHandler>>,
}

impl TrackedEntitySession {
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Last location the entity was allowed to occupy
    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn regions(&self) -> &dyn RegionSet {
        self.regions.as_ref()
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }
}

pub struct SessionManager {
    services: HostServices,
    zones: Arc<dyn ZoneQuery>,
    factories: Vec<HandlerFactory>,
    sessions: HashMap<EntityId, TrackedEntitySession>,
}

impl SessionManager {
    /// Manager with every built-in handler
    pub fn new(services: HostServices, zones: Arc<dyn ZoneQuery>) -> Self {
        Self::with_factories(services, zones, default_factories())
    }

    pub fn with_factories(
        services: HostServices,
        zones: Arc<dyn ZoneQuery>,
        factories: Vec<HandlerFactory>,
    ) -> Self {
        Self {
            services,
            zones,
            factories,
            sessions: HashMap::new(),
        }
    }

    pub fn services(&self) -> &HostServices {
        &self.services
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────────

    /// Start tracking `entity` at `location`. An existing session for the
    /// entity is torn down first.
    pub fn attach(&mut self, entity: EntityId, location: Location) {
        if self.sessions.contains_key(&entity) {
            self.detach(entity);
        }

        let regions = self.zones.applicable_regions(&location);
        let mut handlers: Vec<Box<dyn SessionHandler>> = self
            .factories
            .iter()
            .map(|factory| factory(&self.services))
            .collect();
        for handler in &mut handlers {
            handler.initialize(entity, &location, regions.as_ref());
        }

        tracing::info!(
            %entity,
            world = %location.world,
            regions = ?regions.region_ids(),
            handlers = handlers.len(),
            "Session attached"
        );
        self.sessions.insert(
            entity,
            TrackedEntitySession {
                entity,
                location,
                regions,
                handlers,
            },
        );
    }

    /// Stop tracking `entity`, undoing every effect the session applied.
    /// Returns false if the entity was not tracked.
    pub fn detach(&mut self, entity: EntityId) -> bool {
        let Some(mut session) = self.sessions.remove(&entity) else {
            return false;
        };

        for handler in &mut session.handlers {
            handler.uninitialize(entity, &session.location);
        }

        // Shared state goes only after the teardown work queued above has run
        if self.services.is_live(entity) {
            let services = self.services.clone();
            self.services.scheduler.run_at_entity(
                entity,
                Box::new(move || {
                    services.forget_entity(entity);
                    services.scheduler.release_entity(entity);
                }),
            );
        } else {
            self.services.forget_entity(entity);
            self.services.scheduler.release_entity(entity);
        }

        tracing::info!(%entity, "Session detached");
        true
    }

    // ─── Events ─────────────────────────────────────────────────────────────

    /// Offer a move to `to`. Returns false if a handler refused it; the
    /// session keeps its previous location in that case. Untracked entities
    /// are always allowed.
    pub fn cross(&mut self, entity: EntityId, to: Location, kind: CrossingKind) -> bool {
        let Some(session) = self.sessions.get_mut(&entity) else {
            return true;
        };

        if !kind.is_forced() && session.location.block() == to.block() {
            session.location = to;
            return true;
        }

        // A repeat in the guard window keeps the earlier verdict. An allowed
        // repeat is only skipped while the session still sits on that block.
        let guard = &self.services.teleport_guard;
        if kind.is_forced() && !guard.should_process(entity, &to) {
            match guard.verdict(entity, &to) {
                Some(false) => return false,
                Some(true) if session.location.block() == to.block() => {
                    session.location = to;
                    return true;
                }
                _ => {}
            }
        }

        let to_set = self.zones.applicable_regions(&to);
        let crossing = Crossing {
            from: &session.location,
            to: &to,
            to_set: to_set.as_ref(),
            kind,
        };

        let mut allowed = true;
        for handler in &mut session.handlers {
            if !handler.on_cross_boundary(entity, &crossing) {
                tracing::debug!(
                    %entity,
                    handler = handler.name(),
                    world = %to.world,
                    x = to.x,
                    y = to.y,
                    z = to.z,
                    "Crossing vetoed"
                );
                allowed = false;
                break;
            }
        }

        if kind.is_forced() {
            guard.record(entity, &to, allowed);
        }
        if allowed {
            session.location = to;
            session.regions = to_set;
        }
        allowed
    }

    /// Re-evaluate `entity` at its current location
    pub fn tick(&mut self, entity: EntityId) {
        let Some(session) = self.sessions.get_mut(&entity) else {
            return;
        };
        session.regions = self.zones.applicable_regions(&session.location);
        for handler in &mut session.handlers {
            handler.tick(entity, &session.location, session.regions.as_ref());
        }
    }

    pub fn tick_all(&mut self) {
        let entities: Vec<EntityId> = self.sessions.keys().copied().collect();
        for entity in entities {
            self.tick(entity);
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn is_tracked(&self, entity: EntityId) -> bool {
        self.sessions.contains_key(&entity)
    }

    pub fn session(&self, entity: EntityId) -> Option<&TrackedEntitySession> {
        self.sessions.get(&entity)
    }

    pub fn tracked_count(&self) -> usize {
        self.sessions.len()
    }

    /// Tracked entities in id order
    pub fn tracked(&self) -> Vec<EntityId> {
        let mut entities: Vec<EntityId> = self.sessions.keys().copied().collect();
        entities.sort_unstable();
        entities
    }
}
