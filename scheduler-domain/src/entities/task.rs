// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Task
//!
//! A callable bundle carrying its own schedule, resource requirements, and
//! retry/repeat policy. The Task Manager owns state transitions; the body
//! itself only ever sees a [`TaskContext`] and returns a [`TaskOutput`] or a
//! failure reason — it never touches the scheduler's internal queues.

use crate::ids::{Alias, ResourceKey, TaskKey};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// A task's successful return value. Kept as a loosely-typed JSON value so
/// the domain layer never needs a generic parameter threaded through every
/// queue and map it appears in.
pub type TaskOutput = serde_json::Value;

/// Opaque read-write bag shared across every worker's task bodies, set via
/// `Scheduler::setShared`. Never read or mutated by scheduler internals.
#[derive(Debug, Default)]
pub struct SharedNamespace {
    values: RwLock<HashMap<String, serde_json::Value>>,
}

impl SharedNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: impl Into<String>, value: serde_json::Value) {
        self.values.write().expect("shared namespace lock poisoned").insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<serde_json::Value> {
        self.values.read().expect("shared namespace lock poisoned").get(name).cloned()
    }
}

/// The two conventional arguments a task body may read: which concrete
/// resource the allocator picked for each alias it requested, and the
/// scheduler-wide shared namespace.
pub struct TaskContext {
    pub allocated_keys: HashMap<Alias, ResourceKey>,
    pub shared: Arc<SharedNamespace>,
}

/// A task body: `FnMut` because bodies are permitted to close over mutable
/// state across repeated invocations of the same `Task`.
pub type TaskBody = Box<dyn FnMut(&TaskContext) -> Result<TaskOutput, String> + Send>;

/// Outcome of one call to [`Task::invoke`].
pub enum TaskInvocationOutcome {
    /// The body succeeded (on the first attempt or after retries).
    Completed(TaskOutput),
    /// The body exhausted its retry budget. `raise` mirrors `raiseOnExcept`
    /// and tells the caller whether the failure should propagate to any
    /// awaiter or be swallowed.
    Failed { reason: String, raise: bool },
}

/// A callable bundle with its own schedule, resource requirements, and
/// retry/repeat policy.
pub struct Task {
    key: TaskKey,
    start_time: DateTime<Utc>,
    resource_usage: HashMap<Alias, u64>,
    /// Negative means unbounded repetition.
    runs: i64,
    repeat_freq: ChronoDuration,
    retry_on_except: u32,
    raise_on_except: bool,
    run_count: u64,
    retry_count: u32,
    body: TaskBody,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("key", &self.key)
            .field("start_time", &self.start_time)
            .field("resource_usage", &self.resource_usage)
            .field("runs", &self.runs)
            .field("repeat_freq", &self.repeat_freq)
            .field("retry_on_except", &self.retry_on_except)
            .field("raise_on_except", &self.raise_on_except)
            .field("run_count", &self.run_count)
            .field("retry_count", &self.retry_count)
            .finish_non_exhaustive()
    }
}

impl Task {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: TaskKey,
        start_time: DateTime<Utc>,
        resource_usage: HashMap<Alias, u64>,
        runs: i64,
        repeat_freq: ChronoDuration,
        retry_on_except: u32,
        raise_on_except: bool,
        body: TaskBody,
    ) -> Self {
        Self {
            key,
            start_time,
            resource_usage,
            runs,
            repeat_freq,
            retry_on_except,
            raise_on_except,
            run_count: 0,
            retry_count: 0,
            body,
        }
    }

    /// Convenience constructor for a one-shot task with no resource
    /// requirements, matching scenario S1 of the test suite.
    pub fn one_shot(
        key: TaskKey,
        start_time: DateTime<Utc>,
        body: impl FnMut(&TaskContext) -> Result<TaskOutput, String> + Send + 'static,
    ) -> Self {
        Self::new(key, start_time, HashMap::new(), 1, ChronoDuration::zero(), 0, true, Box::new(body))
    }

    pub fn key(&self) -> &TaskKey {
        &self.key
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn resource_usage(&self) -> &HashMap<Alias, u64> {
        &self.resource_usage
    }

    pub fn run_count(&self) -> u64 {
        self.run_count
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn raise_on_except(&self) -> bool {
        self.raise_on_except
    }

    /// Whether this task should be resubmitted after the current run
    /// completes: `runs < 0` means unbounded, otherwise it repeats while
    /// `run_count < runs`.
    pub fn should_repeat(&self) -> bool {
        self.runs < 0 || (self.run_count as i64) < self.runs
    }

    /// Advances `start_time` by `repeat_freq`, for re-submission after a
    /// successful run when `should_repeat` holds.
    pub fn advance_start_time(&mut self) {
        self.start_time += self.repeat_freq;
    }

    /// Attempts the body up to `retry_on_except + 1` times. On success,
    /// resets `retry_count` and increments `run_count`. On exhaustion,
    /// leaves `retry_count` at its final value and reports failure.
    pub fn invoke(&mut self, ctx: &TaskContext) -> TaskInvocationOutcome {
        let attempts = self.retry_on_except + 1;
        let mut last_reason = String::from("task body never invoked");
        for attempt in 0..attempts {
            match (self.body)(ctx) {
                Ok(output) => {
                    self.run_count += 1;
                    self.retry_count = 0;
                    return TaskInvocationOutcome::Completed(output);
                }
                Err(reason) => {
                    last_reason = reason;
                    self.retry_count = attempt + 1;
                }
            }
        }
        TaskInvocationOutcome::Failed { reason: last_reason, raise: self.raise_on_except }
    }
}

/// Per-task lifecycle state, as owned by the Task Manager. At most one
/// record exists per task key at any time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Queued, awaiting `startTime`.
    New,
    /// Allocated and queued for worker dispatch.
    Waiting(AllocatedKeys),
    /// A worker has picked this task up.
    Running(AllocatedKeys),
    /// At least one allocator could not satisfy the request.
    Blocked(ResourceConstraints),
    /// Terminal: body returned successfully (may be re-queued if repeats remain).
    Done,
    /// Terminal: body exhausted its retry budget.
    Exception,
}

pub type AllocatedKeys = HashMap<Alias, ResourceKey>;
pub type ResourceConstraints = HashSet<Alias>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> TaskContext {
        TaskContext { allocated_keys: HashMap::new(), shared: Arc::new(SharedNamespace::new()) }
    }

    #[test]
    fn one_shot_runs_once_and_completes() {
        let mut task = Task::one_shot(TaskKey::new(), Utc::now(), |_| Ok(json!(7)));
        match task.invoke(&ctx()) {
            TaskInvocationOutcome::Completed(v) => assert_eq!(v, json!(7)),
            TaskInvocationOutcome::Failed { .. } => panic!("expected success"),
        }
        assert_eq!(task.run_count(), 1);
        assert!(!task.should_repeat());
    }

    #[test]
    fn retries_until_success_then_resets_retry_count() {
        let mut calls = 0;
        let body = move |_: &TaskContext| {
            calls += 1;
            if calls < 3 {
                Err("not yet".to_string())
            } else {
                Ok(json!(42))
            }
        };
        let mut task = Task::new(
            TaskKey::new(),
            Utc::now(),
            HashMap::new(),
            1,
            ChronoDuration::zero(),
            2,
            false,
            Box::new(body),
        );
        match task.invoke(&ctx()) {
            TaskInvocationOutcome::Completed(v) => assert_eq!(v, json!(42)),
            TaskInvocationOutcome::Failed { .. } => panic!("expected eventual success"),
        }
        assert_eq!(task.retry_count(), 0);
        assert_eq!(task.run_count(), 1);
    }

    #[test]
    fn exhausted_retries_reports_failure_without_raising() {
        let mut task = Task::new(
            TaskKey::new(),
            Utc::now(),
            HashMap::new(),
            1,
            ChronoDuration::zero(),
            1,
            false,
            Box::new(|_| Err("boom".to_string())),
        );
        match task.invoke(&ctx()) {
            TaskInvocationOutcome::Failed { raise, .. } => assert!(!raise),
            TaskInvocationOutcome::Completed(_) => panic!("expected failure"),
        }
        assert_eq!(task.run_count(), 0);
    }

    #[test]
    fn repeat_policy_advances_start_time() {
        let start = Utc::now();
        let mut task = Task::new(
            TaskKey::new(),
            start,
            HashMap::new(),
            3,
            ChronoDuration::milliseconds(200),
            0,
            true,
            Box::new(|_| Ok(json!(1))),
        );
        task.invoke(&ctx());
        assert!(task.should_repeat());
        task.advance_start_time();
        assert_eq!(task.start_time(), start + ChronoDuration::milliseconds(200));
    }

    #[test]
    fn shared_namespace_round_trips() {
        let ns = SharedNamespace::new();
        ns.set("greeting", json!("hello"));
        assert_eq!(ns.get("greeting"), Some(json!("hello")));
        assert_eq!(ns.get("missing"), None);
    }
}
