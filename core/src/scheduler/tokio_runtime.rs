//! Tokio-backed scheduler: one actor task per entity.
//!
//! Each entity gets an unbounded queue drained in order by a dedicated task,
//! which gives the single-owner affinity handlers rely on. Global work is
//! batched onto a tick loop. Repeating work runs on a timer task that posts
//! each firing to the entity's queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use hashbrown::HashMap;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};

use super::{RepeatingTask, Scheduler, TICK, Task, TaskHandle};
use crate::host::EntityId;

/// An entity's queue plus the timers posting into it
struct Actor {
    queue: mpsc::UnboundedSender<Task>,
    timers: Vec<TaskHandle>,
}

pub struct TokioScheduler {
    runtime: Handle,
    active: Arc<AtomicBool>,
    actors: Mutex<HashMap<EntityId, Actor>>,
    global: mpsc::UnboundedSender<Task>,
}

impl TokioScheduler {
    /// Create the scheduler and start its global tick loop on `runtime`
    pub fn new(runtime: Handle) -> Self {
        let active = Arc::new(AtomicBool::new(true));
        let (global, mut global_rx) = mpsc::unbounded_channel::<Task>();

        let loop_active = Arc::clone(&active);
        runtime.spawn(async move {
            let mut ticker = interval(TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !loop_active.load(Ordering::Acquire) {
                    break;
                }
                // Drain everything queued before this tick
                loop {
                    match global_rx.try_recv() {
                        Ok(task) => task(),
                        Err(mpsc::error::TryRecvError::Empty) => break,
                        Err(mpsc::error::TryRecvError::Disconnected) => return,
                    }
                }
            }
        });

        Self {
            runtime,
            active,
            actors: Mutex::new(HashMap::new()),
            global,
        }
    }

    fn actors(&self) -> MutexGuard<'_, HashMap<EntityId, Actor>> {
        self.actors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The entity's actor, spawned on first use
    fn actor<'a>(
        &self,
        actors: &'a mut HashMap<EntityId, Actor>,
        entity: EntityId,
    ) -> &'a mut Actor {
        if actors.get(&entity).is_some_and(|actor| actor.queue.is_closed()) {
            actors.remove(&entity);
        }
        actors.entry(entity).or_insert_with(|| {
            let (queue, mut rx) = mpsc::unbounded_channel::<Task>();
            let active = Arc::clone(&self.active);
            self.runtime.spawn(async move {
                while let Some(task) = rx.recv().await {
                    if !active.load(Ordering::Acquire) {
                        break;
                    }
                    task();
                }
                tracing::trace!(%entity, "Entity actor stopped");
            });
            Actor {
                queue,
                timers: Vec::new(),
            }
        })
    }

    /// Entities that currently have an actor
    pub fn actor_count(&self) -> usize {
        self.actors().len()
    }

    /// Stop all actors and timers
    pub fn shutdown(&self) {
        self.active.store(false, Ordering::Release);
        for (_, actor) in self.actors().drain() {
            actor.timers.iter().for_each(TaskHandle::cancel);
        }
    }
}

impl Scheduler for TokioScheduler {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn run_at_entity(&self, entity: EntityId, task: Task) {
        if !self.is_active() {
            return;
        }
        let queue = {
            let mut actors = self.actors();
            self.actor(&mut actors, entity).queue.clone()
        };
        if queue.send(task).is_err() {
            tracing::debug!(%entity, "Entity actor gone, dropping task");
        }
    }

    fn run_next_tick(&self, task: Task) {
        if !self.is_active() {
            return;
        }
        if self.global.send(task).is_err() {
            tracing::debug!("Global tick loop gone, dropping task");
        }
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

        let queue = {
            let mut actors = self.actors();
            let actor = self.actor(&mut actors, entity);
            actor.timers.retain(|timer| !timer.is_cancelled());
            actor.timers.push(handle.clone());
            actor.queue.clone()
        };
        let task = Arc::new(Mutex::new(task));
        let timer_handle = handle.clone();
        let active = Arc::clone(&self.active);
        self.runtime.spawn(async move {
            tokio::time::sleep(initial_delay).await;
            let mut ticker = interval(period.max(TICK));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if timer_handle.is_cancelled() || !active.load(Ordering::Acquire) {
                    break;
                }
                let task = Arc::clone(&task);
                let firing_handle = timer_handle.clone();
                let posted = queue.send(Box::new(move || {
                    if firing_handle.is_cancelled() {
                        return;
                    }
                    let mut task = task.lock().unwrap_or_else(PoisonError::into_inner);
                    (*task)();
                }));
                if posted.is_err() {
                    break;
                }
            }
        });
        handle
    }

    fn release_entity(&self, entity: EntityId) {
        let Some(actor) = self.actors().remove(&entity) else {
            return;
        };
        actor.timers.iter().for_each(TaskHandle::cancel);
        tracing::trace!(%entity, timers = actor.timers.len(), "Entity actor released");
    }
}
