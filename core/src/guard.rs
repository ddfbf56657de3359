//! Teleport-loop guard
//!
//! A forced relocation caused by policy evaluation must not trigger the same
//! evaluation again before the entity's context has had a chance to settle.
//! The guard remembers which destinations it has already seen for an entity,
//! along with how the crossing there was decided, and forgets them all once a
//! one-shot task on that entity's context runs.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;

use crate::host::{BlockPos, EntityId, Location};
use crate::scheduler::Scheduler;

/// Destination block to verdict; `None` while the crossing is still undecided
type Verdicts = HashMap<BlockPos, Option<bool>>;
type SeenDestinations = HashMap<EntityId, Verdicts>;

pub struct TeleportLoopGuard {
    scheduler: Arc<dyn Scheduler>,
    seen: Arc<Mutex<SeenDestinations>>,
}

fn lock(seen: &Mutex<SeenDestinations>) -> MutexGuard<'_, SeenDestinations> {
    seen.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TeleportLoopGuard {
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            scheduler,
            seen: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// True the first time `destination` is seen for `entity` in the current
    /// window, false for repeats.
    pub fn should_process(&self, entity: EntityId, destination: &Location) -> bool {
        let block = destination.block();
        let (first_use, inserted) = {
            let mut seen = lock(&self.seen);
            let first_use = !seen.contains_key(&entity);
            let verdicts = seen.entry(entity).or_default();
            let inserted = !verdicts.contains_key(&block);
            if inserted {
                verdicts.insert(block, None);
            }
            (first_use, inserted)
        };

        if first_use {
            let seen = Arc::clone(&self.seen);
            self.scheduler.run_at_entity(
                entity,
                Box::new(move || {
                    lock(&seen).remove(&entity);
                }),
            );
        }

        if !inserted {
            tracing::debug!(%entity, world = %destination.world, "Repeated forced relocation");
        }
        inserted
    }

    /// Remember whether the crossing to `destination` was allowed. Ignored
    /// once the entity's window has closed.
    pub fn record(&self, entity: EntityId, destination: &Location, allowed: bool) {
        if let Some(verdicts) = lock(&self.seen).get_mut(&entity) {
            verdicts.insert(destination.block(), Some(allowed));
        }
    }

    /// How the crossing to `destination` was decided in the current window
    pub fn verdict(&self, entity: EntityId, destination: &Location) -> Option<bool> {
        lock(&self.seen)
            .get(&entity)
            .and_then(|verdicts| verdicts.get(&destination.block()).copied().flatten())
    }

    pub fn forget(&self, entity: EntityId) {
        lock(&self.seen).remove(&entity);
    }

    pub fn is_tracking(&self, entity: EntityId) -> bool {
        lock(&self.seen).contains_key(&entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ManualClock;
    use crate::scheduler::ManualScheduler;

    fn setup() -> (Arc<ManualScheduler>, TeleportLoopGuard) {
        let scheduler = Arc::new(ManualScheduler::new(ManualClock::default()));
        let guard = TeleportLoopGuard::new(scheduler.clone());
        (scheduler, guard)
    }

    #[test]
    fn test_repeat_destination_blocked_until_cleared() {
        let (scheduler, guard) = setup();
        let e = EntityId(1);
        let dest = Location::new("world", 10.5, 64.0, -3.2);

        assert!(guard.should_process(e, &dest));
        assert!(!guard.should_process(e, &dest));
        // Same block, different sub-block position
        assert!(!guard.should_process(e, &Location::new("world", 10.9, 64.5, -3.9)));

        scheduler.run_pending();
        assert!(!guard.is_tracking(e));
        assert!(guard.should_process(e, &dest));
    }

    #[test]
    fn test_destinations_and_entities_independent() {
        let (_scheduler, guard) = setup();
        let dest = Location::new("world", 0.0, 64.0, 0.0);

        assert!(guard.should_process(EntityId(1), &dest));
        assert!(guard.should_process(EntityId(2), &dest));
        assert!(guard.should_process(EntityId(1), &Location::new("world", 5.0, 64.0, 0.0)));
        assert!(guard.should_process(EntityId(1), &Location::new("nether", 0.0, 64.0, 0.0)));
    }

    #[test]
    fn test_clear_scheduled_once_per_window() {
        let (scheduler, guard) = setup();
        let e = EntityId(1);
        guard.should_process(e, &Location::new("world", 0.0, 0.0, 0.0));
        guard.should_process(e, &Location::new("world", 1.0, 0.0, 0.0));
        assert_eq!(scheduler.pending_count(), 1);
    }

    #[test]
    fn test_verdict_kept_for_the_window() {
        let (scheduler, guard) = setup();
        let e = EntityId(1);
        let dest = Location::new("world", 5.0, 64.0, 5.0);

        assert!(guard.should_process(e, &dest));
        assert_eq!(guard.verdict(e, &dest), None);
        guard.record(e, &dest, false);
        assert_eq!(guard.verdict(e, &dest), Some(false));
        assert_eq!(guard.verdict(e, &Location::new("world", 5.7, 64.3, 5.1)), Some(false));

        scheduler.run_pending();
        assert_eq!(guard.verdict(e, &dest), None);
        // Closed window: nothing to attach the verdict to
        guard.record(e, &dest, true);
        assert!(!guard.is_tracking(e));
    }

    #[test]
    fn test_forget_clears_immediately() {
        let (_scheduler, guard) = setup();
        let e = EntityId(1);
        let dest = Location::new("world", 0.0, 0.0, 0.0);
        guard.should_process(e, &dest);
        guard.forget(e);
        assert!(guard.should_process(e, &dest));
    }
}
