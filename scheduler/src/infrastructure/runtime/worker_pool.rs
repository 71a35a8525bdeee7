// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Worker Pool
//!
//! `maxWorkers` concurrent executors that pull dispatched tasks and invoke
//! them (spec §4.7). Task bodies ([`scheduler_domain::TaskBody`]) are plain
//! synchronous `FnMut` closures, not futures, so real OS threads — not
//! Tokio tasks — are the natural executor: a worker blocks on a
//! `crossbeam::channel::Receiver` for its next assignment and then calls the
//! body directly, with no `spawn_blocking` indirection needed. This is the
//! "thread-based" `Parallelism` mode; `Process` mode logs a notice and falls
//! back to the same thread pool (spec §4 [EXPANDED]: multi-process execution
//! is out of scope, but the config knob exists to record architectural
//! intent).
//!
//! Workers mutate only what spec §5 grants them: the resource-free queue
//! (via `ResourceManager::free_resources`), the per-task future and
//! completion event (via `TaskManager::update_end_of_task`), and the update
//! event. Everything else — the new/blocked/ready-for-dispatch queues — is
//! mutated exclusively by the Master Process.

use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::Utc;
use crossbeam::channel::Receiver;
use scheduler_domain::{AllocatedKeys, Task, TaskContext, TaskInvocationOutcome, TaskKey};
use tracing::{debug, error, info, warn};

use crate::infrastructure::config::scheduler_config::Parallelism;
use crate::infrastructure::metrics::SchedulerMetrics;
use crate::infrastructure::runtime::shared_state::SharedSchedulerState;

/// A task handed off from the Master Process to a worker, together with the
/// concrete resource the allocator picked for each alias it requested.
pub type DispatchedTask = (Task, AllocatedKeys);

pub struct WorkerPool;

impl WorkerPool {
    /// Spawns `count` worker threads pulling from `rx`. Returns their join
    /// handles so the caller can wait for a clean shutdown.
    pub fn spawn(
        count: usize,
        parallelism: Parallelism,
        state: Arc<SharedSchedulerState>,
        rx: Receiver<DispatchedTask>,
        metrics: Arc<SchedulerMetrics>,
    ) -> Vec<JoinHandle<()>> {
        if parallelism == Parallelism::Process {
            warn!(
                "parallelism=process requested; process-based execution is out of scope for this \
                 scheduler core, falling back to the thread-based worker pool"
            );
        }
        (0..count)
            .map(|id| {
                let state = state.clone();
                let rx = rx.clone();
                let metrics = metrics.clone();
                std::thread::Builder::new()
                    .name(format!("scheduler-worker-{id}"))
                    .spawn(move || worker_loop(id, state, rx, metrics))
                    .expect("failed to spawn worker thread")
            })
            .collect()
    }
}

fn worker_loop(id: usize, state: Arc<SharedSchedulerState>, rx: Receiver<DispatchedTask>, metrics: Arc<SchedulerMetrics>) {
    metrics.worker_started();
    debug!(worker = id, "worker thread started");

    while let Ok((task, allocated_keys)) = rx.recv() {
        run_one(&state, &metrics, task, allocated_keys);
        state.update_event.set();
    }

    metrics.worker_stopped();
    debug!(worker = id, "worker thread exiting: dispatch channel closed");
}

fn run_one(state: &Arc<SharedSchedulerState>, metrics: &Arc<SchedulerMetrics>, mut task: Task, allocated_keys: AllocatedKeys) {
    let task_key = task.key().clone();
    let ctx = TaskContext { allocated_keys: allocated_keys.clone(), shared: state.shared_namespace.clone() };
    let outcome = task.invoke(&ctx);

    match &outcome {
        TaskInvocationOutcome::Completed(_) => {
            metrics.task_completed();
            state.emit(scheduler_domain::SchedulerEvent::TaskCompleted {
                task_key: task_key.clone(),
                run_count: task.run_count(),
            });
        }
        TaskInvocationOutcome::Failed { reason, raise } => {
            metrics.task_failed();
            state.emit(scheduler_domain::SchedulerEvent::TaskFailed {
                task_key: task_key.clone(),
                reason: reason.clone(),
                raised: *raise,
            });
        }
    }

    let resource_usage = task.resource_usage().clone();
    let now = Utc::now();
    if let Err(err) = state.resource_manager.lock().free_resources(&resource_usage, &allocated_keys, now) {
        // Spec §7: freeing more than reserved, or double-freeing, is a
        // programmer error in an invariant the allocator relies on for
        // every other task's safety. Crash this worker rather than let the
        // invariant silently drift.
        error!(task = %task_key, error = %err, "resource invariant violated while freeing; crashing worker");
        panic!("resource invariant violation in worker: {err}");
    }

    state.task_manager.lock().update_end_of_task(task, outcome, now);
    info!(task = %task_key, "task run finished");
}
