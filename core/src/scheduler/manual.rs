//! Deterministic scheduler driven by its owner.
//!
//! One-shot work queues until [`ManualScheduler::run_pending`]; repeating work
//! fires as [`ManualScheduler::advance`] moves time forward one tick at a time.
//! The shared [`ManualClock`] moves with it, so deadlines computed by handlers
//! line up with tick boundaries.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::TimeDelta;

use super::{RepeatingTask, Scheduler, TICK_MILLIS, Task, TaskHandle, duration_to_ticks};
use crate::host::{EntityId, ManualClock};

struct RepeatingEntry {
    entity: EntityId,
    task: RepeatingTask,
    next_fire: u64,
    period: u64,
    handle: TaskHandle,
}

#[derive(Default)]
struct QueueState {
    tick: u64,
    pending: VecDeque<(Option<EntityId>, Task)>,
    repeating: Vec<RepeatingEntry>,
}

pub struct ManualScheduler {
    clock: ManualClock,
    active: AtomicBool,
    state: Mutex<QueueState>,
}

impl ManualScheduler {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            active: AtomicBool::new(true),
            state: Mutex::new(QueueState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Ticks elapsed since creation
    pub fn current_tick(&self) -> u64 {
        self.lock().tick
    }

    /// Run queued one-shot work, including work queued by that work.
    /// Returns how many tasks ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.lock().pending.pop_front();
            let Some((_, task)) = next else {
                return ran;
            };
            task();
            ran += 1;
        }
    }

    /// Move forward `ticks` ticks, firing due repeating work and draining
    /// one-shot work after each tick.
    pub fn advance(&self, ticks: u64) {
        for _ in 0..ticks {
            let (now, mut due) = {
                let mut state = self.lock();
                state.tick += 1;
                let now = state.tick;
                let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut state.repeating)
                    .into_iter()
                    .filter(|entry| !entry.handle.is_cancelled())
                    .partition(|entry| entry.next_fire <= now);
                state.repeating = waiting;
                (now, due)
            };
            self.clock.advance(TimeDelta::milliseconds(TICK_MILLIS));

            for entry in &mut due {
                if entry.handle.is_cancelled() {
                    continue;
                }
                (entry.task)();
                entry.next_fire = now + entry.period;
            }
            self.lock()
                .repeating
                .extend(due.into_iter().filter(|entry| !entry.handle.is_cancelled()));

            self.run_pending();
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Live (not canceled) repeating tasks, optionally for one entity
    pub fn repeating_count(&self, entity: Option<EntityId>) -> usize {
        self.lock()
            .repeating
            .iter()
            .filter(|entry| !entry.handle.is_cancelled())
            .filter(|entry| entity.is_none_or(|id| entry.entity == id))
            .count()
    }

    /// Stop accepting work and drop everything queued
    pub fn shutdown(&self) {
        self.active.store(false, Ordering::Release);
        let mut state = self.lock();
        state.pending.clear();
        for entry in state.repeating.drain(..) {
            entry.handle.cancel();
        }
    }
}

impl Scheduler for ManualScheduler {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn run_at_entity(&self, entity: EntityId, task: Task) {
        if !self.is_active() {
            return;
        }
        self.lock().pending.push_back((Some(entity), task));
    }

    fn run_next_tick(&self, task: Task) {
        if !self.is_active() {
            return;
        }
        self.lock().pending.push_back((None, task));
    }

    fn run_at_entity_repeating(
        &self,
        entity: EntityId,
        task: RepeatingTask,
        initial_delay: Duration,
        period: Duration,
    ) -> TaskHandle {
        let handle = TaskHandle::new();
        if !self.is_active() {
            handle.cancel();
            return handle;
        }
        let mut state = self.lock();
        let next_fire = state.tick + duration_to_ticks(initial_delay);
        state.repeating.push(RepeatingEntry {
            entity,
            task,
            next_fire,
            period: duration_to_ticks(period),
            handle: handle.clone(),
        });
        handle
    }

    fn release_entity(&self, entity: EntityId) {
        self.lock().repeating.retain(|entry| {
            if entry.entity != entity {
                return true;
            }
            entry.handle.cancel();
            false
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::host::Clock;
    use crate::scheduler::{TICK, ticks};

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_one_shot_runs_only_when_drained() {
        let scheduler = ManualScheduler::new(ManualClock::default());
        let (count, mut bump) = counter();
        scheduler.run_at_entity(EntityId(1), Box::new(move || bump()));

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.run_pending(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_repeating_fires_on_period_until_cancelled() {
        let scheduler = ManualScheduler::new(ManualClock::default());
        let (count, bump) = counter();
        let handle =
            scheduler.run_at_entity_repeating(EntityId(1), Box::new(bump), TICK, ticks(4));

        scheduler.advance(1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        scheduler.advance(4);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        handle.cancel();
        scheduler.advance(20);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.repeating_count(None), 0);
    }

    #[test]
    fn test_release_entity_cancels_only_its_timers() {
        let scheduler = ManualScheduler::new(ManualClock::default());
        let (count, bump) = counter();
        let released =
            scheduler.run_at_entity_repeating(EntityId(1), Box::new(bump), TICK, TICK);
        let kept = scheduler.run_at_entity_repeating(EntityId(2), Box::new(|| {}), TICK, TICK);
        scheduler.run_at_entity(EntityId(1), Box::new(|| {}));

        scheduler.release_entity(EntityId(1));
        assert!(released.is_cancelled());
        assert!(!kept.is_cancelled());
        assert_eq!(scheduler.repeating_count(None), 1);
        assert_eq!(scheduler.run_pending(), 1);

        scheduler.advance(5);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_advance_moves_clock() {
        let clock = ManualClock::default();
        let scheduler = ManualScheduler::new(clock.clone());
        let start = clock.now();
        scheduler.advance(20);
        assert_eq!(clock.now() - start, TimeDelta::seconds(1));
    }

    #[test]
    fn test_shutdown_drops_work() {
        let scheduler = ManualScheduler::new(ManualClock::default());
        let (count, mut bump) = counter();
        scheduler.run_next_tick(Box::new(move || bump()));
        scheduler.shutdown();

        assert!(!scheduler.is_active());
        assert_eq!(scheduler.run_pending(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let handle = scheduler.run_at_entity_repeating(
            EntityId(1),
            Box::new(|| {}),
            TICK,
            TICK,
        );
        assert!(handle.is_cancelled());
    }
}
