//! End-to-end session scenarios against the in-memory host

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::flags::{FlagValue, StatusEffectKind};
use crate::handlers::{Crossing, SessionHandler};
use crate::host::{CollisionTeams, CrossingKind, EntityId, HostEvent, Location, StatusEffect};
use crate::scheduler::{Scheduler, TICK};
use crate::services::HostServices;
use crate::test_support::{Harness, WORLD, inside, outside, zone};
use crate::zones::{RegionSet, ZoneDefinition, ZoneLayout};

fn manager(h: &Harness, zone: ZoneDefinition) -> SessionManager {
    SessionManager::new(h.services.clone(), Arc::new(ZoneLayout::new().with_zone(zone)))
}

fn text(value: &str) -> FlagValue {
    FlagValue::Text(value.to_string())
}

fn messages(h: &Harness) -> usize {
    h.host
        .events()
        .iter()
        .filter(|e| matches!(e, HostEvent::Message { .. }))
        .count()
}

fn speed_effect(duration_ticks: i32) -> StatusEffect {
    StatusEffect {
        kind: StatusEffectKind::new("speed").unwrap(),
        duration_ticks,
        amplifier: 0,
        ambient: false,
        particles: true,
    }
}

#[test]
fn test_default_handler_order() {
    let h = Harness::new();
    let e = h.spawn(1, 0);
    let mut sessions = manager(&h, zone(&[]));
    sessions.attach(e, outside());

    assert_eq!(
        sessions.session(e).unwrap().handler_names(),
        vec![
            "entry-level",
            "walk-speed",
            "fly-speed",
            "blocked-effects",
            "disable-collision",
            "play-sounds"
        ]
    );
}

#[test]
fn test_level_gate_blocks_then_admits() {
    let h = Harness::new();
    let e = h.spawn(1, 3);
    let mut sessions = manager(&h, zone(&[("entry-min-level", text("5 XP"))]));
    sessions.attach(e, outside());

    assert!(!sessions.cross(e, inside(), CrossingKind::Move));
    assert_eq!(sessions.session(e).unwrap().location(), &outside());
    h.settle();
    assert_eq!(messages(&h), 1);

    h.host.set_level(e, 5);
    assert!(sessions.cross(e, inside(), CrossingKind::Move));
    assert_eq!(sessions.session(e).unwrap().location(), &inside());
    assert_eq!(sessions.session(e).unwrap().regions().region_ids(), vec!["zone"]);
}

#[test]
fn test_veto_stops_later_handlers() {
    let h = Harness::new();
    let e = h.spawn(1, 3);
    let mut sessions = manager(
        &h,
        zone(&[
            ("entry-min-level", text("5 XP")),
            ("walk-speed", FlagValue::Number(0.5)),
        ]),
    );
    sessions.attach(e, outside());

    assert!(!sessions.cross(e, inside(), CrossingKind::Move));
    h.settle();
    assert_eq!(h.host.entity(e).unwrap().walk_speed, 0.2);

    h.host.set_level(e, 9);
    assert!(sessions.cross(e, inside(), CrossingKind::Move));
    h.settle();
    assert_eq!(h.host.entity(e).unwrap().walk_speed, 0.5);
}

#[test]
fn test_move_within_block_is_not_dispatched() {
    let h = Harness::new();
    let e = h.spawn(1, 0);
    let mut sessions = manager(&h, zone(&[("entry-min-level", text("5 XP"))]));
    sessions.attach(e, inside());

    let nudge = Location::new(WORLD, 5.4, 64.2, 5.9);
    assert!(sessions.cross(e, nudge.clone(), CrossingKind::Move));
    h.settle();
    assert_eq!(messages(&h), 0);
    assert_eq!(sessions.session(e).unwrap().location(), &nudge);
}

#[test]
fn test_collision_membership_follows_moves() {
    let h = Harness::new();
    let e = h.spawn(1, 0);
    let mut sessions = manager(&h, zone(&[("disable-collision", FlagValue::Bool(true))]));
    sessions.attach(e, outside());

    assert!(sessions.cross(e, inside(), CrossingKind::Move));
    h.settle();
    assert!(h.host.has_member("RFLAGS_COLLISION", e));

    assert!(sessions.cross(e, outside(), CrossingKind::Move));
    h.settle();
    assert!(!h.host.has_member("RFLAGS_COLLISION", e));
}

#[test]
fn test_repeated_teleport_keeps_denial() {
    let h = Harness::new();
    let e = h.spawn(1, 3);
    let mut sessions = manager(&h, zone(&[("entry-min-level", text("5 XP"))]));
    sessions.attach(e, outside());

    assert!(!sessions.cross(e, inside(), CrossingKind::Teleport));
    assert!(!sessions.cross(e, inside(), CrossingKind::Teleport));
    assert_eq!(sessions.session(e).unwrap().location(), &outside());
    assert!(sessions.session(e).unwrap().regions().region_ids().is_empty());

    h.settle();
    assert_eq!(messages(&h), 1);
    assert!(!h.services.teleport_guard.is_tracking(e));

    h.host.set_level(e, 5);
    assert!(sessions.cross(e, inside(), CrossingKind::Teleport));
    assert_eq!(sessions.session(e).unwrap().location(), &inside());
}

/// Counts the crossings it is offered
struct CrossingCounter(Arc<AtomicUsize>);

impl SessionHandler for CrossingCounter {
    fn name(&self) -> &'static str {
        "counter"
    }

    fn initialize(&mut self, _entity: EntityId, _location: &Location, _set: &dyn RegionSet) {}

    fn on_cross_boundary(&mut self, _entity: EntityId, _crossing: &Crossing<'_>) -> bool {
        self.0.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn tick(&mut self, _entity: EntityId, _location: &Location, _set: &dyn RegionSet) {}

    fn uninitialize(&mut self, _entity: EntityId, _location: &Location) {}
}

#[test]
fn test_repeated_teleport_in_place_is_not_dispatched() {
    let h = Harness::new();
    let e = h.spawn(1, 0);
    let count = Arc::new(AtomicUsize::new(0));
    let factory_count = Arc::clone(&count);
    let mut sessions = SessionManager::with_factories(
        h.services.clone(),
        Arc::new(ZoneLayout::new().with_zone(zone(&[]))),
        vec![Box::new(move |_: &HostServices| -> Box<dyn SessionHandler> {
            Box::new(CrossingCounter(Arc::clone(&factory_count)))
        })],
    );
    sessions.attach(e, outside());

    assert!(sessions.cross(e, inside(), CrossingKind::Teleport));
    assert!(sessions.cross(e, inside(), CrossingKind::Teleport));
    assert_eq!(count.load(Ordering::SeqCst), 1);

    h.settle();
    assert!(sessions.cross(e, inside(), CrossingKind::Teleport));
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn test_teleport_back_after_leaving_is_evaluated() {
    let h = Harness::new();
    let e = h.spawn(1, 0);
    let mut sessions = manager(&h, zone(&[("walk-speed", FlagValue::Number(0.5))]));
    sessions.attach(e, outside());

    assert!(sessions.cross(e, inside(), CrossingKind::Teleport));
    assert!(sessions.cross(e, outside(), CrossingKind::Teleport));
    assert!(sessions.cross(e, inside(), CrossingKind::Teleport));
    h.settle();

    assert_eq!(sessions.session(e).unwrap().regions().region_ids(), vec!["zone"]);
    assert_eq!(h.host.entity(e).unwrap().walk_speed, 0.5);
}

#[test]
fn test_tick_all_reevaluates_tracked_entities() {
    let h = Harness::new();
    let a = h.spawn(1, 0);
    let b = h.spawn(2, 0);
    let mut sessions = manager(
        &h,
        zone(&[("blocked-effects", FlagValue::List(vec!["speed".into()]))]),
    );
    sessions.attach(a, inside());
    sessions.attach(b, outside());
    h.settle();

    h.host.give_effect(a, speed_effect(400));
    h.host.give_effect(b, speed_effect(400));
    sessions.tick_all();
    h.settle();

    assert!(h.host.entity(a).unwrap().effects.is_empty());
    assert_eq!(h.host.entity(b).unwrap().effects.len(), 1);
}

#[test]
fn test_detach_undoes_everything() {
    let h = Harness::new();
    let e = h.spawn(1, 0);
    h.host.give_effect(e, speed_effect(400));
    let mut sessions = manager(
        &h,
        zone(&[
            ("walk-speed", FlagValue::Number(0.5)),
            ("blocked-effects", FlagValue::List(vec!["speed".into()])),
            ("disable-collision", FlagValue::Bool(true)),
            ("play-sounds", FlagValue::List(vec!["wind 40".into()])),
        ]),
    );
    sessions.attach(e, inside());
    h.settle();
    h.scheduler.advance(10);
    assert!(h.host.has_member("RFLAGS_COLLISION", e));

    assert!(sessions.detach(e));
    h.settle();

    let state = h.host.entity(e).unwrap();
    assert_eq!(state.walk_speed, 0.2);
    assert_eq!(state.effects.len(), 1);
    assert_eq!(state.effects[0].duration_ticks, 390);
    assert!(!h.host.has_member("RFLAGS_COLLISION", e));
    assert_eq!(h.scheduler.repeating_count(Some(e)), 0);
    assert!(
        h.host
            .events()
            .iter()
            .any(|ev| matches!(ev, HostEvent::SoundStopped { sound, .. } if sound == "wind"))
    );
    assert!(h.services.effects.is_empty_for(e));
    assert!(!sessions.is_tracked(e));
    assert!(!sessions.detach(e));
}

#[test]
fn test_detach_disconnected_entity_forgets_immediately() {
    let h = Harness::new();
    let e = h.spawn(1, 0);
    h.host.give_effect(e, speed_effect(400));
    let mut sessions = manager(
        &h,
        zone(&[
            ("blocked-effects", FlagValue::List(vec!["speed".into()])),
            ("disable-collision", FlagValue::Bool(true)),
        ]),
    );
    sessions.attach(e, inside());
    h.settle();

    h.host.set_online(e, false);
    sessions.detach(e);

    assert!(h.services.effects.is_empty_for(e));
    assert!(!h.host.has_member("RFLAGS_COLLISION", e));
    assert_eq!(h.scheduler.pending_count(), 0);
}

#[test]
fn test_detach_releases_scheduler_state() {
    let h = Harness::new();
    let e = h.spawn(1, 0);
    let mut sessions = manager(&h, zone(&[]));
    sessions.attach(e, inside());
    let stray = h
        .scheduler
        .run_at_entity_repeating(e, Box::new(|| {}), TICK, TICK);

    sessions.detach(e);
    assert!(!stray.is_cancelled());
    h.settle();
    assert!(stray.is_cancelled());
    assert_eq!(h.scheduler.repeating_count(Some(e)), 0);
}

#[test]
fn test_reattach_replaces_session() {
    let h = Harness::new();
    let e = h.spawn(1, 0);
    let mut sessions = manager(&h, zone(&[("play-sounds", FlagValue::List(vec!["wind 40".into()]))]));

    sessions.attach(e, inside());
    sessions.attach(e, inside());
    h.settle();

    assert_eq!(sessions.tracked_count(), 1);
    assert_eq!(h.scheduler.repeating_count(Some(e)), 1);
}

#[test]
fn test_untracked_entity_is_allowed() {
    let h = Harness::new();
    let mut sessions = manager(&h, zone(&[("entry-min-level", text("5 XP"))]));
    assert!(sessions.cross(EntityId(42), inside(), CrossingKind::Move));
    assert!(sessions.tracked().is_empty());
}
