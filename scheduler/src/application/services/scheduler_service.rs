// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Scheduler
//!
//! The external-facing facade over the three subsystems (spec §6): callers
//! register resources, submit tasks, and drive the scheduler's lifecycle
//! without ever touching a `TaskManager`/`ResourceManager` directly. `start`
//! spins up the Master Process and Worker Pool on an internally-owned Tokio
//! runtime, so embedding applications do not need to run inside an async
//! context themselves — mirroring the host-runtime-agnostic stance the
//! teacher's use-case layer takes toward its own application services.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use crossbeam::channel::{self, Sender};
use scheduler_domain::{
    Alias, Resource, SchedulerResult, SharedNamespace, Task, TaskBody, TaskContext, TaskKey, TaskOutput,
};
use tokio::task::JoinHandle as TokioJoinHandle;
use tracing::{info, warn};

use crate::infrastructure::config::scheduler_config::SchedulerConfig;
use crate::infrastructure::metrics::SchedulerMetrics;
use crate::infrastructure::runtime::master_process;
use crate::infrastructure::runtime::shared_state::SharedSchedulerState;
use crate::infrastructure::runtime::supervisor::{join_supervised, spawn_supervised};
use crate::infrastructure::runtime::worker_pool::{DispatchedTask, WorkerPool};

/// Handles kept only while the scheduler is `start()`ed, so `stop()`/`join()`
/// know what to tear down.
struct RunningHandles {
    runtime: tokio::runtime::Runtime,
    master: TokioJoinHandle<SchedulerResult<()>>,
    workers: Vec<std::thread::JoinHandle<()>>,
    dispatch_tx: Sender<DispatchedTask>,
}

/// A running (or not-yet-started) task scheduling core. Cloning is cheap —
/// everything of substance lives behind `Arc<SharedSchedulerState>` — so a
/// `Scheduler` can be handed to multiple callers that each submit tasks.
pub struct Scheduler {
    state: Arc<SharedSchedulerState>,
    config: SchedulerConfig,
    metrics: Arc<SchedulerMetrics>,
    running: std::sync::Mutex<Option<RunningHandles>>,
    description: std::sync::Mutex<Option<String>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> SchedulerResult<Self> {
        let metrics = Arc::new(SchedulerMetrics::new()?);
        Ok(Self {
            state: SharedSchedulerState::new(),
            config,
            metrics,
            running: std::sync::Mutex::new(None),
            description: std::sync::Mutex::new(None),
        })
    }

    /// Registers a resource under `alias`, creating the allocator for that
    /// alias on first use. Safe to call both before and after `start()`.
    pub fn add_resource(&self, resource: Box<dyn Resource>, alias: Alias) {
        self.state.resource_manager.lock().register_resource(resource, alias);
        self.state.update_event.set();
    }

    /// Registers every resource in `resources` under one `alias` so they
    /// form a single interchangeable pool. When `alias` is `None`, each
    /// resource is registered under an alias derived from its own key,
    /// so it becomes the sole member of its own allocator.
    pub fn add_resources(&self, resources: Vec<Box<dyn Resource>>, alias: Option<Alias>) {
        let mut resource_manager = self.state.resource_manager.lock();
        for resource in resources {
            let resource_alias = alias.clone().unwrap_or_else(|| Alias::from(resource.key().as_str()));
            resource_manager.register_resource(resource, resource_alias);
        }
        drop(resource_manager);
        self.state.update_event.set();
    }

    /// Installs a value into the namespace every task body's `TaskContext`
    /// can read via `ctx.shared`.
    pub fn set_shared(&self, name: impl Into<String>, value: serde_json::Value) {
        self.state.shared_namespace.set(name, value);
    }

    pub fn shared_namespace(&self) -> Arc<SharedNamespace> {
        self.state.shared_namespace.clone()
    }

    /// A free-text label surfaced in `presentation::snapshot` for operators
    /// distinguishing multiple schedulers in one process.
    pub fn set_description(&self, description: impl Into<String>) {
        *self.description.lock().expect("description lock poisoned") = Some(description.into());
    }

    pub fn description(&self) -> Option<String> {
        self.description.lock().expect("description lock poisoned").clone()
    }

    pub fn state(&self) -> Arc<SharedSchedulerState> {
        self.state.clone()
    }

    pub fn metrics(&self) -> Arc<SchedulerMetrics> {
        self.metrics.clone()
    }

    /// Submits a fully-constructed task and returns its key plus a handle to
    /// block for its output. Most callers use the narrower `submit_task`
    /// use case instead; this is the primitive it wraps.
    #[allow(clippy::too_many_arguments)]
    pub fn submit(
        &self,
        key: TaskKey,
        start_time: DateTime<Utc>,
        resource_usage: std::collections::HashMap<Alias, u64>,
        runs: i64,
        repeat_freq: ChronoDuration,
        retry_on_except: u32,
        raise_on_except: bool,
        body: TaskBody,
    ) -> TaskKey {
        let task = Task::new(key.clone(), start_time, resource_usage, runs, repeat_freq, retry_on_except, raise_on_except, body);
        self.state.task_manager.lock().submit_task(task);
        self.metrics.task_submitted();
        self.state.emit(scheduler_domain::SchedulerEvent::TaskSubmitted { task_key: key.clone() });
        self.state.update_event.set();
        key
    }

    /// Convenience wrapper for a one-shot task with no resource requirements.
    pub fn submit_task(
        &self,
        start_time: DateTime<Utc>,
        body: impl FnMut(&TaskContext) -> Result<TaskOutput, String> + Send + 'static,
    ) -> TaskKey {
        let key = TaskKey::new();
        self.submit(key, start_time, std::collections::HashMap::new(), 1, ChronoDuration::zero(), 0, true, Box::new(body))
    }

    /// Blocks the caller (not the internal runtime) until the task's most
    /// recent run resolves, or `timeout` elapses. Returns `None` if the
    /// scheduler was stopped, the task was cancelled, or it failed without
    /// `raise_on_except`.
    pub fn execute_tasks(&self, task_key: &TaskKey, timeout: Option<Duration>) -> Option<TaskOutput> {
        self.state.task_manager.lock().get_task_output(task_key, timeout)
    }

    /// Async twin of [`Scheduler::execute_tasks`], for callers already
    /// inside a Tokio context who don't want to block their own worker
    /// thread. Delegates to the same condvar-based wait on a blocking
    /// thread rather than duplicating the wait logic.
    pub async fn execute_tasks_async(&self, task_key: &TaskKey, timeout: Option<Duration>) -> Option<TaskOutput> {
        let state = self.state.clone();
        let task_key = task_key.clone();
        tokio::task::spawn_blocking(move || state.task_manager.lock().get_task_output(&task_key, timeout))
            .await
            .unwrap_or(None)
    }

    pub fn cancel(&self, task_key: &TaskKey) -> bool {
        let cancelled = self.state.task_manager.lock().cancel_new_task(task_key);
        if cancelled {
            self.state.update_event.set();
        }
        cancelled
    }

    pub fn active_tasks_count(&self) -> usize {
        self.state.task_manager.lock().active_tasks_count()
    }

    /// Starts the Master Process and Worker Pool on an internally-owned
    /// multi-threaded Tokio runtime. Calling `start()` twice is a no-op.
    pub fn start(&self) -> SchedulerResult<()> {
        let mut running = self.running.lock().expect("running handles lock poisoned");
        if running.is_some() {
            warn!("start() called on an already-running scheduler; ignoring");
            return Ok(());
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("scheduler-master")
            .enable_all()
            .build()
            .map_err(|e| scheduler_domain::SchedulerError::internal(format!("failed to build master runtime: {e}")))?;

        self.state.heartbeat.store(true, std::sync::atomic::Ordering::SeqCst);

        let (dispatch_tx, dispatch_rx) = channel::unbounded::<DispatchedTask>();
        let workers = WorkerPool::spawn(self.config.max_workers, self.config.parallelism, self.state.clone(), dispatch_rx, self.metrics.clone());

        let master_state = self.state.clone();
        let master_tx = dispatch_tx.clone();
        let master_metrics = self.metrics.clone();
        let master = {
            // spawn_supervised calls tokio::spawn internally, which needs an
            // active runtime context even though `runtime` itself is not running yet.
            let _guard = runtime.enter();
            spawn_supervised("master-process", master_process::run(master_state, master_tx, master_metrics))
        };

        info!(workers = self.config.max_workers, "scheduler started");
        *running = Some(RunningHandles { runtime, master, workers, dispatch_tx });
        Ok(())
    }

    /// Requests a clean shutdown: the Master Process stops dispatching new
    /// tasks, the dispatch channel is closed so workers drain and exit, and
    /// every outstanding `TaskFuture` is resolved to `None` so no caller of
    /// `execute_tasks` hangs forever.
    pub fn stop(&self) {
        self.state.request_stop();
        self.state.task_manager.lock().cancel_all_futures();
    }

    /// Blocks the caller until every worker thread and the Master Process
    /// have exited. `stop()` must be called first (directly, or indirectly
    /// once all submitted work has drained and the caller chooses to stop).
    pub fn join(&self) {
        let mut running = self.running.lock().expect("running handles lock poisoned");
        let Some(handles) = running.take() else {
            return;
        };
        drop(handles.dispatch_tx); // closes the channel so workers drain and exit
        for worker in handles.workers {
            let _ = worker.join();
        }
        let master_result = handles.runtime.block_on(join_supervised(handles.master));
        handles.runtime.shutdown_timeout(Duration::from_secs(5));
        match master_result {
            Ok(()) => info!("scheduler joined cleanly"),
            Err(err) => warn!(error = %err, "master process did not exit cleanly"),
        }
    }

    /// Blocks until `active_tasks_count() == 0`, without stopping the
    /// scheduler — for callers that want to drain a one-off batch of work
    /// and keep the scheduler alive for more submissions afterward.
    pub fn wait_until_idle(&self) {
        loop {
            if self.state.task_manager.lock().active_tasks_count() == 0 {
                return;
            }
            // The idle_notify waiter pattern: subscribe first, then
            // recheck, so a notification fired between the check above and
            // the wait below is never lost.
            let notified = self.state.idle_notify.notified();
            if self.state.task_manager.lock().active_tasks_count() == 0 {
                return;
            }
            futures::executor::block_on(notified);
        }
    }
}
