// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Shared Scheduler State
//!
//! The state shared between the Master Process (one async task) and the
//! Worker Pool (plain OS threads): the `TaskManager` and `ResourceManager`
//! behind `parking_lot::Mutex`es, mirroring the per-manager lock granularity
//! called for in spec §5 (`taskQueueLock`, `taskMetaLock`, per-allocator
//! lock) at the coarser grain of "one lock per manager" rather than one per
//! queue — the domain layer is already single-threaded internally, so each
//! manager only needs one exclusive-access guard.
//!
//! Lock order is always `task_manager` before `resource_manager` whenever
//! both are held at once (the Master tick does this for
//! `TaskManager::process_next_task`/`update`, which take `&mut
//! ResourceManager`). Workers never hold both locks at the same time, so
//! this order is never contended against.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use scheduler_domain::{DomainEvent, ResourceManager, SchedulerEvent, SharedNamespace, TaskManager};
use tokio::sync::{broadcast, Notify};

use crate::infrastructure::runtime::update_event::UpdateEvent;

/// Channel capacity for the domain-event broadcast. Generous enough that a
/// burst of task completions never forces a slow subscriber to miss events
/// under normal operation, while still bounding memory if nobody is
/// listening at all.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

pub struct SharedSchedulerState {
    pub task_manager: Mutex<TaskManager>,
    pub resource_manager: Mutex<ResourceManager>,
    pub shared_namespace: Arc<SharedNamespace>,
    pub update_event: Arc<UpdateEvent>,
    /// Set once `join()`/`stop()` has been requested; the Master Process
    /// observes this at the top of each tick (spec §4.7: "the master
    /// observes a heartbeat flag").
    pub heartbeat: Arc<AtomicBool>,
    /// Notified whenever `active_tasks_count` might have dropped to zero,
    /// so `join()` can wake promptly instead of polling.
    pub idle_notify: Arc<Notify>,
    pub events: broadcast::Sender<DomainEvent>,
}

impl SharedSchedulerState {
    pub fn new() -> Arc<Self> {
        let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            task_manager: Mutex::new(TaskManager::new()),
            resource_manager: Mutex::new(ResourceManager::new()),
            shared_namespace: Arc::new(SharedNamespace::new()),
            update_event: Arc::new(UpdateEvent::new()),
            heartbeat: Arc::new(AtomicBool::new(true)),
            idle_notify: Arc::new(Notify::new()),
            events,
        })
    }

    pub fn is_running(&self) -> bool {
        self.heartbeat.load(Ordering::SeqCst)
    }

    pub fn request_stop(&self) {
        self.heartbeat.store(false, Ordering::SeqCst);
        self.update_event.set();
        self.idle_notify.notify_waiters();
    }

    /// Publishes a domain event. A broadcast channel with no subscribers
    /// simply drops the send; scheduler correctness never depends on anyone
    /// listening (spec §3 [EXPANDED]: "an unconsumed broadcast channel only
    /// drops lagged events, it never blocks the scheduler").
    pub fn emit(&self, payload: SchedulerEvent) {
        let _ = self.events.send(DomainEvent::new(payload));
    }
}
