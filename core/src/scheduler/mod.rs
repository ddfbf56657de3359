//! Scheduler adapter
//!
//! Every entity-state mutation runs on the execution context bound to that
//! entity. Handlers never touch entity state directly; they hand a task to a
//! [`Scheduler`] and return immediately.
//!
//! Two adapters are provided:
//! - [`ManualScheduler`]: deterministic, advanced tick by tick by its owner
//! - [`TokioScheduler`]: one actor task per entity on a tokio runtime

mod manual;
mod tokio_runtime;

pub use manual::ManualScheduler;
pub use tokio_runtime::TokioScheduler;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::host::EntityId;

/// Length of one server tick
pub const TICK: Duration = Duration::from_millis(50);

/// Milliseconds per tick, for deadline arithmetic
pub const TICK_MILLIS: i64 = 50;

pub type Task = Box<dyn FnOnce() + Send + 'static>;
pub type RepeatingTask = Box<dyn FnMut() + Send + 'static>;

/// Cancel flag shared between the scheduler and whoever scheduled the work.
///
/// Canceling is idempotent; a canceled repeating task never fires again.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Whether both handles control the same scheduled work
    pub fn same_task(&self, other: &TaskHandle) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

pub trait Scheduler: Send + Sync {
    /// False once the host is shutting down; no new work may be scheduled
    fn is_active(&self) -> bool;

    /// Run `task` on the execution context bound to `entity`
    fn run_at_entity(&self, entity: EntityId, task: Task);

    /// Run `task` on the global context at the next tick
    fn run_next_tick(&self, task: Task);

    /// Run `task` on the entity's context after `initial_delay`, then every `period`
    fn run_at_entity_repeating(
        &self,
        entity: EntityId,
        task: RepeatingTask,
        initial_delay: Duration,
        period: Duration,
    ) -> TaskHandle;

    /// `entity` is gone: stop its repeating work and drop whatever the
    /// scheduler keeps for it. One-shot work already queued still runs.
    fn release_entity(&self, _entity: EntityId) {}
}

/// Duration of `ticks` server ticks
pub fn ticks(ticks: u32) -> Duration {
    TICK * ticks
}

/// Number of whole ticks in `duration`, rounded up, at least one
pub(crate) fn duration_to_ticks(duration: Duration) -> u64 {
    let millis = duration.as_millis() as u64;
    millis.div_ceil(TICK_MILLIS as u64).max(1)
}
