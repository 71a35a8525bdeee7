// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Events
//!
//! Pure observability/integration hooks, modeled after the teacher's
//! `DomainEvent<T>` envelope but scaled to what this scheduler needs: no
//! correlation/causation chains or schema versioning, since nothing in this
//! domain consumes events to reconstruct state. The envelope is published
//! in-process by the infrastructure layer over a broadcast channel; the
//! domain only defines the payload shape and never depends on how (or
//! whether) anyone is listening.

use crate::ids::{Alias, ResourceKey, TaskKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Envelope wrapping every [`SchedulerEvent`] payload with a stable identity
/// and occurrence timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub event_id: String,
    pub occurred_at: DateTime<Utc>,
    pub payload: SchedulerEvent,
}

impl DomainEvent {
    pub fn new(payload: SchedulerEvent) -> Self {
        Self { event_id: Ulid::new().to_string(), occurred_at: Utc::now(), payload }
    }
}

/// Every lifecycle transition a subscriber might care about. Mirrors the
/// `TaskState` transitions owned by the Task Manager plus the one
/// resource-side signal (`ResourceCapacityChanged`) that a caller adding
/// resources at runtime might want to observe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerEvent {
    /// A task entered the New state via `submitTask`.
    TaskSubmitted { task_key: TaskKey },
    /// A task's resource request could not be satisfied and it moved to Blocked.
    TaskBlocked { task_key: TaskKey, constrained_aliases: Vec<Alias> },
    /// A previously-blocked task's request became satisfiable.
    TaskUnblocked { task_key: TaskKey },
    /// A worker picked the task up and began invoking its body.
    TaskDispatched { task_key: TaskKey, allocated: Vec<(Alias, ResourceKey)> },
    /// The task body returned successfully.
    TaskCompleted { task_key: TaskKey, run_count: u64 },
    /// The task body exhausted its retry budget.
    TaskFailed { task_key: TaskKey, reason: String, raised: bool },
    /// A resource was registered or a rate limit's capacity changed at runtime.
    ResourceCapacityChanged { alias: Alias, resource_key: ResourceKey },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_assigns_a_fresh_id_and_timestamp() {
        let a = DomainEvent::new(SchedulerEvent::TaskSubmitted { task_key: TaskKey::new() });
        let b = DomainEvent::new(SchedulerEvent::TaskSubmitted { task_key: TaskKey::new() });
        assert_ne!(a.event_id, b.event_id);
    }

    #[test]
    fn payload_round_trips_through_json() {
        let event = SchedulerEvent::TaskFailed {
            task_key: TaskKey::new(),
            reason: "boom".to_string(),
            raised: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: SchedulerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
