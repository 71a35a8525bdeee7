// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Master Process
//!
//! The single update loop (spec §4.7): waits on the update event with a
//! deadline of `min(resourceManager.getTimeToUpdate(), taskManager.getTimeToNextTask())`,
//! advances every allocator's clock, reconsiders blocked tasks whose
//! constraints just changed, then drains as many newly-due tasks as the
//! Task Manager can dispatch. Nothing inside this module ever invokes user
//! task code — that is the Worker Pool's job.
//!
//! Runs as one `tokio::task`; everything it touches lives behind
//! [`SharedSchedulerState`]'s locks, which it never holds across an
//! `.await` point (every lock acquisition here is a synchronous domain call
//! that returns before the next `await`).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam::channel::Sender;
use scheduler_domain::{AllocatedKeys, SchedulerEvent, SchedulerResult, Task, TaskKey};
use tracing::{info, instrument};

use crate::infrastructure::metrics::SchedulerMetrics;
use crate::infrastructure::runtime::shared_state::SharedSchedulerState;
use crate::infrastructure::runtime::worker_pool::DispatchedTask;

/// Runs the update loop until the shared heartbeat is cleared by
/// `stop()`/`join()`. Returns `Ok(())` on a clean shutdown; an `Err`
/// surfaces a propagated domain error (spec §7: "a propagated error is
/// fatal, consistent with crash early for invariant preservation").
pub async fn run(
    state: Arc<SharedSchedulerState>,
    dispatch_tx: Sender<DispatchedTask>,
    metrics: Arc<SchedulerMetrics>,
) -> SchedulerResult<()> {
    info!("master process starting");
    while state.is_running() {
        tick(&state, &dispatch_tx, &metrics).await?;
    }
    info!("master process stopping: heartbeat cleared");
    Ok(())
}

#[instrument(skip_all)]
async fn tick(
    state: &Arc<SharedSchedulerState>,
    dispatch_tx: &Sender<DispatchedTask>,
    metrics: &Arc<SchedulerMetrics>,
) -> SchedulerResult<()> {
    // Step 1: if nothing is active, wake any `join()` waiter before we go
    // back to sleep — otherwise a join() call racing the last task's
    // completion could wait for a notification that already fired.
    if state.task_manager.lock().active_tasks_count() == 0 {
        state.idle_notify.notify_waiters();
    }

    // Step 2 & 3: wait on the update event with a computed deadline, then
    // the wait itself consumes the event's permit (see update_event.rs).
    let deadline = compute_deadline(state, Utc::now());
    state.update_event.wait_with_deadline(deadline).await;

    if !state.is_running() {
        return Ok(());
    }

    let now = Utc::now();

    // Step 4: advance every allocator's internal clock.
    let updated_aliases = state.resource_manager.lock().update(now)?;

    // Step 5: reconsider blocked tasks whose constraints just changed. Each
    // freed task's reserved allocation must be committed to in-use (clearing
    // the allocator's ready_allocation entry and incrementing resource usage)
    // before dispatch, while both locks are still held.
    let freed = {
        let mut tm = state.task_manager.lock();
        let mut rm = state.resource_manager.lock();
        let freed = tm.update(&mut rm, &updated_aliases, now)?;
        for (task, allocated_keys) in &freed {
            rm.use_resources(task.key(), allocated_keys)?;
        }
        freed
    };
    for (task, allocated_keys) in freed {
        metrics.task_unblocked();
        state.emit(SchedulerEvent::TaskUnblocked { task_key: task.key().clone() });
        dispatch(state, dispatch_tx, metrics, task, allocated_keys);
    }

    // Step 6: drain as many newly-due tasks as the Task Manager will give
    // us, tracking which task keys newly became BLOCKED along the way so
    // we can emit one event/metric per new block (the domain call itself
    // only reports successes; blocking is a side effect we diff for).
    let blocked_before: HashSet<TaskKey> = state.task_manager.lock().blocked_task_keys().into_iter().collect();
    loop {
        let next = {
            let mut tm = state.task_manager.lock();
            let mut rm = state.resource_manager.lock();
            let next = tm.process_next_task(&mut rm, now)?;
            if let Some((task, allocated_keys)) = &next {
                rm.use_resources(task.key(), allocated_keys)?;
            }
            next
        };
        match next {
            Some((task, allocated_keys)) => dispatch(state, dispatch_tx, metrics, task, allocated_keys),
            None => break,
        }
    }
    report_newly_blocked(state, metrics, &blocked_before);

    Ok(())
}

fn compute_deadline(state: &SharedSchedulerState, now: DateTime<Utc>) -> Option<Duration> {
    // Lock task_manager before resource_manager, matching lock order everywhere else.
    let tm_deadline = state.task_manager.lock().get_time_to_next_task(now);
    let rm_deadline = state.resource_manager.lock().get_time_to_update(now);
    match (rm_deadline, tm_deadline) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) | (None, Some(a)) => Some(a),
        (None, None) => None,
    }
}

fn dispatch(
    state: &Arc<SharedSchedulerState>,
    dispatch_tx: &Sender<DispatchedTask>,
    metrics: &Arc<SchedulerMetrics>,
    task: Task,
    allocated_keys: AllocatedKeys,
) {
    metrics.task_dispatched();
    state.emit(SchedulerEvent::TaskDispatched {
        task_key: task.key().clone(),
        allocated: allocated_keys.iter().map(|(alias, key)| (alias.clone(), key.clone())).collect(),
    });
    // A send error means the dispatch channel closed, which only happens
    // once the heartbeat has already been cleared and the worker pool is
    // winding down; dropping the task here is the documented cooperative
    // shutdown behavior (spec §5: "queued-but-unstarted work is abandoned").
    let _ = dispatch_tx.send((task, allocated_keys));
}

fn report_newly_blocked(state: &Arc<SharedSchedulerState>, metrics: &Arc<SchedulerMetrics>, blocked_before: &HashSet<TaskKey>) {
    let tm = state.task_manager.lock();
    for task_key in tm.blocked_task_keys() {
        if blocked_before.contains(&task_key) {
            continue;
        }
        metrics.task_blocked();
        let constrained_aliases = tm.blocked_constraints(&task_key).map(|set| set.iter().cloned().collect()).unwrap_or_default();
        state.emit(SchedulerEvent::TaskBlocked { task_key, constrained_aliases });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::runtime::shared_state::SharedSchedulerState;
    use scheduler_domain::{Alias, SimpleResource, Task};
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn one_tick_dispatches_a_ready_task_with_no_resources() {
        let state = SharedSchedulerState::new();
        let metrics = Arc::new(SchedulerMetrics::new().unwrap());
        let (tx, rx) = crossbeam::channel::unbounded();

        let task = Task::one_shot(TaskKey::new(), Utc::now(), |_| Ok(json!(7)));
        state.task_manager.lock().submit_task(task);
        state.update_event.set();

        tick(&state, &tx, &metrics).await.unwrap();

        let (dispatched, _allocated) = rx.try_recv().expect("task should have been dispatched");
        assert_eq!(dispatched.key().as_str().is_empty(), false);
    }

    #[test]
    fn compute_deadline_takes_the_minimum_of_both_sources() {
        let state = SharedSchedulerState::new();
        state.resource_manager.lock().register_resource(Box::new(SimpleResource::new(1)), Alias::from("cpu"));
        let now = Utc::now();
        let mut usage = HashMap::new();
        usage.insert(Alias::from("cpu"), 1);
        let far_future = now + chrono::Duration::seconds(30);
        let task = Task::new(TaskKey::new(), far_future, usage, 1, chrono::Duration::zero(), 0, true, Box::new(|_| Ok(json!(1))));
        state.task_manager.lock().submit_task(task);
        let deadline = compute_deadline(&state, now);
        assert!(deadline.is_some());
        assert!(deadline.unwrap() <= StdDuration::from_secs(30));
    }
}
