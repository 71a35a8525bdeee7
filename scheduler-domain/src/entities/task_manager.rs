// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Task Manager
//!
//! Owns the task-state table, a time-ordered min-heap of not-yet-due tasks,
//! the blocked-task list keyed by the resource aliases it is waiting on,
//! and the ready-for-dispatch FIFO. `active_tasks_count` is the single
//! invariant tying all four together: it always equals the number of
//! non-terminal tasks across the new heap, the blocked list, the dispatch
//! queue, and whatever is currently `RUNNING` on a worker.

use crate::entities::resource_manager::ResourceManager;
use crate::entities::task::{AllocatedKeys, ResourceConstraints, Task, TaskInvocationOutcome, TaskOutput, TaskState};
use crate::error::SchedulerResult;
use crate::ids::{Alias, TaskKey};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Resolves exactly once with the task's output from its most recent run,
/// or `None` if the scheduler was stopped, the task was cancelled, or the
/// task ended in `EXCEPTION` without `raiseOnExcept`.
pub struct TaskFuture {
    state: Mutex<Option<Option<TaskOutput>>>,
    condvar: Condvar,
}

impl TaskFuture {
    fn new() -> Arc<Self> {
        Arc::new(Self { state: Mutex::new(None), condvar: Condvar::new() })
    }

    fn resolve(&self, output: Option<TaskOutput>) {
        let mut guard = self.state.lock().expect("task future lock poisoned");
        *guard = Some(output);
        self.condvar.notify_all();
    }

    /// Blocks up to `timeout` (or indefinitely if `None`) for the task to
    /// resolve. Returns the current value without removing it, so repeated
    /// calls keep observing the latest completed run.
    pub fn get(&self, timeout: Option<Duration>) -> Option<TaskOutput> {
        let mut guard = self.state.lock().expect("task future lock poisoned");
        match timeout {
            None => {
                while guard.is_none() {
                    guard = self.condvar.wait(guard).expect("task future lock poisoned");
                }
            }
            Some(d) => {
                if guard.is_none() {
                    let (g, _) = self.condvar.wait_timeout(guard, d).expect("task future lock poisoned");
                    guard = g;
                }
            }
        }
        guard.clone().flatten()
    }
}

struct NewTaskEntry {
    start_time: DateTime<Utc>,
    seq: u64,
    task: Task,
}

impl PartialEq for NewTaskEntry {
    fn eq(&self, other: &Self) -> bool {
        self.start_time == other.start_time && self.seq == other.seq
    }
}
impl Eq for NewTaskEntry {}

impl Ord for NewTaskEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so a std::collections::BinaryHeap (a max-heap) behaves
        // as a min-heap on (start_time, seq): earliest start_time, then
        // earliest arrival, pops first.
        other.start_time.cmp(&self.start_time).then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for NewTaskEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
pub struct TaskManager {
    task_states: HashMap<TaskKey, TaskState>,
    new_tasks: BinaryHeap<NewTaskEntry>,
    next_seq: u64,
    blocked_tasks: HashMap<TaskKey, Task>,
    resource_constraints: HashMap<TaskKey, ResourceConstraints>,
    ready_for_dispatch: std::collections::VecDeque<(Task, AllocatedKeys)>,
    active_tasks_count: usize,
    task_futures: HashMap<TaskKey, Arc<TaskFuture>>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_tasks_count(&self) -> usize {
        self.active_tasks_count
    }

    pub fn task_state(&self, task_key: &TaskKey) -> Option<&TaskState> {
        self.task_states.get(task_key)
    }

    /// Keys of every currently-`BLOCKED` task, for callers (the master tick)
    /// that want to diff this against a previous snapshot to detect which
    /// tasks newly became blocked.
    pub fn blocked_task_keys(&self) -> Vec<TaskKey> {
        self.blocked_tasks.keys().cloned().collect()
    }

    /// The aliases a blocked task is waiting on, if it is currently blocked.
    pub fn blocked_constraints(&self, task_key: &TaskKey) -> Option<&ResourceConstraints> {
        self.resource_constraints.get(task_key)
    }

    /// Enqueues a freshly-submitted task, creating a future callers can
    /// block on for its first (and every subsequent repeat's) output.
    pub fn submit_task(&mut self, task: Task) -> Arc<TaskFuture> {
        let task_key = task.key().clone();
        let future = TaskFuture::new();
        self.task_futures.insert(task_key.clone(), future.clone());
        self.active_tasks_count += 1;
        self.enqueue_new(task);
        future
    }

    fn enqueue_new(&mut self, task: Task) {
        let task_key = task.key().clone();
        let start_time = task.start_time();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.task_states.insert(task_key, TaskState::New);
        self.new_tasks.push(NewTaskEntry { start_time, seq, task });
    }

    /// Pops and dispatches the next due task, skipping over (and parking as
    /// `BLOCKED`) any task whose resources are not yet available. Returns
    /// `None` once the heap is empty or its head is not yet due.
    pub fn process_next_task(
        &mut self,
        resource_manager: &mut ResourceManager,
        now: DateTime<Utc>,
    ) -> SchedulerResult<Option<(Task, AllocatedKeys)>> {
        loop {
            match self.new_tasks.peek() {
                Some(entry) if entry.start_time <= now => {}
                _ => return Ok(None),
            }
            let NewTaskEntry { task, .. } = self.new_tasks.pop().expect("just peeked Some");
            let task_key = task.key().clone();

            resource_manager.register_request(task_key.clone(), task.resource_usage())?;
            resource_manager.update(now)?;

            match resource_manager.get_allocated_resources(&task_key, task.resource_usage()) {
                Some(allocated) => {
                    self.task_states.insert(task_key.clone(), TaskState::Waiting(allocated.clone()));
                    self.ready_for_dispatch.push_back((task, allocated));
                    let (dispatched, keys) =
                        self.ready_for_dispatch.pop_front().expect("just pushed an entry");
                    self.task_states.insert(dispatched.key().clone(), TaskState::Running(keys.clone()));
                    return Ok(Some((dispatched, keys)));
                }
                None => {
                    let constraints: ResourceConstraints = task.resource_usage().keys().cloned().collect();
                    self.task_states.insert(task_key.clone(), TaskState::Blocked(constraints.clone()));
                    self.resource_constraints.insert(task_key.clone(), constraints);
                    self.blocked_tasks.insert(task_key, task);
                    // Fall through: try the next due task instead of stalling here.
                }
            }
        }
    }

    /// Re-considers every blocked task whose constraints intersect
    /// `updated_aliases`. Tasks that can now be allocated transition
    /// straight to `RUNNING` and are returned for immediate dispatch.
    pub fn update(
        &mut self,
        resource_manager: &mut ResourceManager,
        updated_aliases: &HashSet<Alias>,
        now: DateTime<Utc>,
    ) -> SchedulerResult<Vec<(Task, AllocatedKeys)>> {
        if updated_aliases.is_empty() {
            return Ok(Vec::new());
        }
        let candidates: Vec<TaskKey> = self
            .resource_constraints
            .iter()
            .filter(|(_, constraints)| constraints.iter().any(|a| updated_aliases.contains(a)))
            .map(|(task_key, _)| task_key.clone())
            .collect();

        let mut freed = Vec::new();
        for task_key in candidates {
            let Some(task) = self.blocked_tasks.get(&task_key) else { continue };
            // The blocked task's request is already sitting in the allocator's
            // waiting_queue from when process_next_task first registered it —
            // registering it again would be rejected as a duplicate. Let the
            // allocator's own update/dequeue_and_allocate promote it instead.
            resource_manager.update(now)?;
            if let Some(allocated) = resource_manager.get_allocated_resources(&task_key, task.resource_usage()) {
                let task = self.blocked_tasks.remove(&task_key).expect("checked above");
                self.resource_constraints.remove(&task_key);
                self.task_states.insert(task_key.clone(), TaskState::Running(allocated.clone()));
                freed.push((task, allocated));
            }
        }
        Ok(freed)
    }

    /// Records the outcome of a dispatched run: resolves the task's future,
    /// re-submits it if it should repeat, and otherwise retires it from
    /// `active_tasks_count`.
    pub fn update_end_of_task(&mut self, mut task: Task, outcome: TaskInvocationOutcome, now: DateTime<Utc>) {
        let task_key = task.key().clone();
        let (output, will_repeat) = match outcome {
            TaskInvocationOutcome::Completed(output) => {
                self.task_states.insert(task_key.clone(), TaskState::Done);
                (Some(output), task.should_repeat())
            }
            TaskInvocationOutcome::Failed { .. } => {
                self.task_states.insert(task_key.clone(), TaskState::Exception);
                (None, false)
            }
        };

        if let Some(future) = self.task_futures.get(&task_key) {
            future.resolve(output);
        }

        if will_repeat {
            task.advance_start_time();
            let _ = now;
            self.requeue_repeat(task);
        } else {
            self.task_states.remove(&task_key);
            self.active_tasks_count = self.active_tasks_count.saturating_sub(1);
        }
    }

    /// Re-enters a repeating task into the new-task heap without touching
    /// `active_tasks_count` or allocating a fresh future: a repeat is a
    /// continuation of the same logical task, not a new submission.
    fn requeue_repeat(&mut self, task: Task) {
        let task_key = task.key().clone();
        let start_time = task.start_time();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.task_states.insert(task_key, TaskState::New);
        self.new_tasks.push(NewTaskEntry { start_time, seq, task });
    }

    /// Cancels a task that has not yet started running. No-op if the task
    /// is already dispatched or terminal.
    pub fn cancel_new_task(&mut self, task_key: &TaskKey) -> bool {
        if !matches!(self.task_states.get(task_key), Some(TaskState::New)) {
            return false;
        }
        let entries: Vec<NewTaskEntry> = std::mem::take(&mut self.new_tasks).into_vec();
        let mut found = false;
        for entry in entries {
            if entry.task.key() == task_key {
                found = true;
            } else {
                self.new_tasks.push(entry);
            }
        }
        if found {
            self.task_states.remove(task_key);
            self.task_futures.remove(task_key);
            self.active_tasks_count = self.active_tasks_count.saturating_sub(1);
        }
        found
    }

    pub fn get_time_to_next_task(&self, now: DateTime<Utc>) -> Option<Duration> {
        let entry = self.new_tasks.peek()?;
        let delta = entry.start_time - now;
        Some(delta.to_std().unwrap_or(Duration::ZERO))
    }

    pub fn get_task_output(&self, task_key: &TaskKey, timeout: Option<Duration>) -> Option<TaskOutput> {
        self.task_futures.get(task_key)?.get(timeout)
    }

    /// Resolves every outstanding future to `None` without mutating task
    /// state, for cooperative shutdown: `getTaskOutput` on a stopped
    /// scheduler must return promptly instead of hanging forever.
    pub fn cancel_all_futures(&self) {
        for future in self.task_futures.values() {
            future.resolve(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::resource::SimpleResource;
    use serde_json::json;
    use std::collections::HashMap as StdHashMap;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn submit_and_dispatch_without_resources() {
        let mut tm = TaskManager::new();
        let mut rm = ResourceManager::new();
        let task = Task::one_shot(TaskKey::new(), now(), |_| Ok(json!(7)));
        let future = tm.submit_task(task);
        assert_eq!(tm.active_tasks_count(), 1);

        let (dispatched, _keys) = tm.process_next_task(&mut rm, now()).unwrap().expect("should dispatch");
        assert_eq!(tm.active_tasks_count(), 1); // still active while RUNNING

        let mut dispatched = dispatched;
        let ctx = crate::entities::task::TaskContext {
            allocated_keys: StdHashMap::new(),
            shared: Arc::new(crate::entities::task::SharedNamespace::new()),
        };
        let outcome = dispatched.invoke(&ctx);
        tm.update_end_of_task(dispatched, outcome, now());
        assert_eq!(tm.active_tasks_count(), 0);
        assert_eq!(future.get(None), Some(json!(7)));
    }

    #[test]
    fn future_not_ready_before_start_time() {
        let mut tm = TaskManager::new();
        let mut rm = ResourceManager::new();
        let future = now() + chrono::Duration::milliseconds(50);
        let task = Task::one_shot(TaskKey::new(), future, |_| Ok(json!(1)));
        tm.submit_task(task);
        assert!(tm.process_next_task(&mut rm, now()).unwrap().is_none());
    }

    #[test]
    fn blocked_task_is_parked_and_then_freed() {
        let mut tm = TaskManager::new();
        let mut rm = ResourceManager::new();
        rm.register_resource(Box::new(SimpleResource::new(1)), Alias::from("gpu"));

        let mut usage = StdHashMap::new();
        usage.insert(Alias::from("gpu"), 1);
        let blocker_key = TaskKey::new();
        let blocked_key = TaskKey::new();

        // Consume the only unit directly on the allocator to force blocking.
        rm.register_request(blocker_key.clone(), &usage).unwrap();
        rm.update(now()).unwrap();
        let allocated = rm.get_allocated_resources(&blocker_key, &usage).unwrap();
        rm.use_resources(&blocker_key, &allocated).unwrap();

        let task = Task::new(
            blocked_key.clone(),
            now(),
            usage.clone(),
            1,
            chrono::Duration::zero(),
            0,
            true,
            Box::new(|_| Ok(json!(1))),
        );
        tm.submit_task(task);
        assert!(tm.process_next_task(&mut rm, now()).unwrap().is_none());
        assert!(matches!(tm.task_state(&blocked_key), Some(TaskState::Blocked(_))));

        rm.free_resources(&usage, &allocated, now()).unwrap();
        let updated: HashSet<Alias> = [Alias::from("gpu")].into_iter().collect();
        let freed = tm.update(&mut rm, &updated, now()).unwrap();
        assert_eq!(freed.len(), 1);
        assert!(matches!(tm.task_state(&blocked_key), Some(TaskState::Running(_))));
    }

    #[test]
    fn repeat_requeues_without_double_counting_active() {
        let mut tm = TaskManager::new();
        let mut rm = ResourceManager::new();
        let task = Task::new(
            TaskKey::new(),
            now(),
            StdHashMap::new(),
            2,
            chrono::Duration::zero(),
            0,
            true,
            Box::new(|_| Ok(json!(1))),
        );
        tm.submit_task(task);
        let (dispatched, _) = tm.process_next_task(&mut rm, now()).unwrap().unwrap();
        let mut dispatched = dispatched;
        let ctx = crate::entities::task::TaskContext {
            allocated_keys: StdHashMap::new(),
            shared: Arc::new(crate::entities::task::SharedNamespace::new()),
        };
        let outcome = dispatched.invoke(&ctx);
        tm.update_end_of_task(dispatched, outcome, now());
        assert_eq!(tm.active_tasks_count(), 1); // still pending its second run
    }
}
