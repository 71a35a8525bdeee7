// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Scheduler Metrics
//!
//! Prometheus counters and gauges for the running scheduler: task throughput,
//! blocking, worker occupancy, and how long tasks wait for resources before
//! being dispatched. Registered against a dedicated [`Registry`] rather than
//! the global default so a host application can mount it under its own HTTP
//! path without collisions.

use std::sync::Arc;
use std::time::Duration;

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry};
use scheduler_domain::SchedulerError;
use tracing::debug;

const NAMESPACE: &str = "scheduler";

pub struct SchedulerMetrics {
    registry: Arc<Registry>,

    tasks_submitted_total: IntCounter,
    tasks_completed_total: IntCounter,
    tasks_failed_total: IntCounter,
    tasks_blocked_total: IntCounter,
    tasks_unblocked_total: IntCounter,

    workers_active: IntGauge,
    tasks_running: IntGauge,

    resource_wait_duration: Histogram,
}

impl SchedulerMetrics {
    pub fn new() -> Result<Self, SchedulerError> {
        let registry = Registry::new();

        let tasks_submitted_total = IntCounter::with_opts(
            Opts::new("tasks_submitted_total", "Total number of tasks submitted").namespace(NAMESPACE),
        )
        .map_err(|e| SchedulerError::metrics_error(format!("failed to create tasks_submitted_total: {e}")))?;

        let tasks_completed_total = IntCounter::with_opts(
            Opts::new("tasks_completed_total", "Total number of tasks that ran to completion").namespace(NAMESPACE),
        )
        .map_err(|e| SchedulerError::metrics_error(format!("failed to create tasks_completed_total: {e}")))?;

        let tasks_failed_total = IntCounter::with_opts(
            Opts::new("tasks_failed_total", "Total number of task runs that returned an error").namespace(NAMESPACE),
        )
        .map_err(|e| SchedulerError::metrics_error(format!("failed to create tasks_failed_total: {e}")))?;

        let tasks_blocked_total = IntCounter::with_opts(
            Opts::new("tasks_blocked_total", "Total number of times a task entered the blocked state").namespace(NAMESPACE),
        )
        .map_err(|e| SchedulerError::metrics_error(format!("failed to create tasks_blocked_total: {e}")))?;

        let tasks_unblocked_total = IntCounter::with_opts(
            Opts::new("tasks_unblocked_total", "Total number of times a blocked task became ready again").namespace(NAMESPACE),
        )
        .map_err(|e| SchedulerError::metrics_error(format!("failed to create tasks_unblocked_total: {e}")))?;

        let workers_active = IntGauge::with_opts(
            Opts::new("workers_active", "Number of worker threads currently executing a task").namespace(NAMESPACE),
        )
        .map_err(|e| SchedulerError::metrics_error(format!("failed to create workers_active: {e}")))?;

        let tasks_running = IntGauge::with_opts(
            Opts::new("tasks_running", "Number of tasks currently dispatched to a worker").namespace(NAMESPACE),
        )
        .map_err(|e| SchedulerError::metrics_error(format!("failed to create tasks_running: {e}")))?;

        let resource_wait_duration = Histogram::with_opts(
            HistogramOpts::new(
                "resource_wait_duration_seconds",
                "Time a task spent blocked waiting for resources before dispatch",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 300.0]),
        )
        .map_err(|e| SchedulerError::metrics_error(format!("failed to create resource_wait_duration: {e}")))?;

        for metric in [
            Box::new(tasks_submitted_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(tasks_completed_total.clone()),
            Box::new(tasks_failed_total.clone()),
            Box::new(tasks_blocked_total.clone()),
            Box::new(tasks_unblocked_total.clone()),
            Box::new(workers_active.clone()),
            Box::new(tasks_running.clone()),
            Box::new(resource_wait_duration.clone()),
        ] {
            registry
                .register(metric)
                .map_err(|e| SchedulerError::metrics_error(format!("failed to register metric: {e}")))?;
        }

        debug!("scheduler metrics registry initialized");

        Ok(Self {
            registry: Arc::new(registry),
            tasks_submitted_total,
            tasks_completed_total,
            tasks_failed_total,
            tasks_blocked_total,
            tasks_unblocked_total,
            workers_active,
            tasks_running,
            resource_wait_duration,
        })
    }

    pub fn task_submitted(&self) {
        self.tasks_submitted_total.inc();
    }

    pub fn task_completed(&self) {
        self.tasks_completed_total.inc();
        self.tasks_running.dec();
    }

    pub fn task_failed(&self) {
        self.tasks_failed_total.inc();
        self.tasks_running.dec();
    }

    pub fn task_dispatched(&self) {
        self.tasks_running.inc();
    }

    pub fn task_blocked(&self) {
        self.tasks_blocked_total.inc();
    }

    pub fn task_unblocked(&self) {
        self.tasks_unblocked_total.inc();
    }

    pub fn worker_started(&self) {
        self.workers_active.inc();
    }

    pub fn worker_stopped(&self) {
        self.workers_active.dec();
    }

    pub fn record_resource_wait(&self, wait: Duration) {
        self.resource_wait_duration.observe(wait.as_secs_f64());
    }

    /// Renders the registry in the Prometheus text exposition format.
    pub fn gather_text(&self) -> Result<String, SchedulerError> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| SchedulerError::metrics_error(format!("failed to encode metrics: {e}")))?;
        String::from_utf8(buffer).map_err(|e| SchedulerError::metrics_error(format!("metrics output was not utf-8: {e}")))
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_respond_to_events() {
        let metrics = SchedulerMetrics::new().unwrap();
        metrics.task_submitted();
        metrics.task_dispatched();
        metrics.task_completed();
        metrics.worker_started();
        metrics.worker_stopped();
        metrics.record_resource_wait(Duration::from_millis(5));

        let text = metrics.gather_text().unwrap();
        assert!(text.contains("scheduler_tasks_submitted_total 1"));
        assert!(text.contains("scheduler_tasks_completed_total 1"));
    }
}
