// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! Point-in-time status rendering: how many tasks are active, how many are
//! blocked and on what, and per-allocator utilization. Intended for a
//! `/status` endpoint or a periodic log line, not for driving scheduling
//! decisions — nothing downstream of a `SchedulerSnapshot` should ever feed
//! back into the Master Process.

use std::collections::HashMap;

use scheduler_domain::Alias;
use serde::Serialize;

use crate::application::services::scheduler_service::Scheduler;

#[derive(Debug, Clone, Serialize)]
pub struct AllocatorUtilization {
    pub alias: Alias,
    pub ready_usage: u64,
    pub waiting_len: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerSnapshot {
    pub description: Option<String>,
    pub active_tasks_count: usize,
    pub blocked_task_count: usize,
    pub allocators: Vec<AllocatorUtilization>,
}

/// Takes a consistent snapshot of `scheduler`'s current state. Acquires the
/// task manager and resource manager locks briefly (task manager first, the
/// same order the Master Process uses) and releases them before returning.
pub fn render_snapshot(scheduler: &Scheduler) -> SchedulerSnapshot {
    let state = scheduler.state();
    let (active_tasks_count, blocked_task_count) = {
        let tm = state.task_manager.lock();
        (tm.active_tasks_count(), tm.blocked_task_keys().len())
    };
    let utilization: HashMap<Alias, (u64, usize)> = state.resource_manager.lock().allocator_utilization();

    let mut allocators: Vec<AllocatorUtilization> = utilization
        .into_iter()
        .map(|(alias, (ready_usage, waiting_len))| AllocatorUtilization { alias, ready_usage, waiting_len })
        .collect();
    allocators.sort_by(|a, b| a.alias.as_str().cmp(b.alias.as_str()));

    SchedulerSnapshot { description: scheduler.description(), active_tasks_count, blocked_task_count, allocators }
}

/// Renders a snapshot as a short human-readable summary line, for a
/// periodic log statement rather than a machine-readable payload.
pub fn render_summary_line(snapshot: &SchedulerSnapshot) -> String {
    let label = snapshot.description.as_deref().unwrap_or("scheduler");
    format!(
        "{label}: {} active, {} blocked, {} allocators tracked",
        snapshot.active_tasks_count,
        snapshot.blocked_task_count,
        snapshot.allocators.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::scheduler_config::SchedulerConfig;
    use scheduler_domain::SimpleResource;

    #[test]
    fn snapshot_reports_registered_allocators() {
        let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();
        scheduler.add_resource(Box::new(SimpleResource::new(4)), Alias::from("cpu"));
        scheduler.set_description("unit-test scheduler");

        let snapshot = render_snapshot(&scheduler);
        assert_eq!(snapshot.description.as_deref(), Some("unit-test scheduler"));
        assert_eq!(snapshot.allocators.len(), 1);
        assert_eq!(snapshot.allocators[0].alias, Alias::from("cpu"));

        let line = render_summary_line(&snapshot);
        assert!(line.contains("unit-test scheduler"));
    }
}
