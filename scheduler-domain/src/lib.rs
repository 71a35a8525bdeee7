// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Scheduler Domain
//!
//! Pure, synchronous business logic for the task scheduling core: resources,
//! rate limits, allocators, tasks, and the task manager that owns their
//! lifecycle. Nothing in this crate touches an async runtime, a clock beyond
//! `chrono::DateTime<Utc>` passed in by the caller, or I/O — every operation
//! here is a deterministic function of its inputs, which is what lets the
//! `scheduler` crate's infrastructure layer drive it from a single update
//! loop without the domain ever knowing it is being driven that way.
//!
//! ## Module Structure
//!
//! - [`entities`] — Resource, RateLimit, ResourceAllocator, ResourceManager,
//!   Task, TaskManager: the five components described in the scheduler
//!   specification's component design.
//! - [`events`] — `SchedulerEvent`, the observability payloads the
//!   infrastructure layer broadcasts as the task manager and resource
//!   manager change state.
//! - [`error`] — `SchedulerError`, the hierarchical error taxonomy shared by
//!   every domain operation.
//! - [`ids`] — ULID-backed identifiers (`TaskKey`, `ResourceKey`, `Alias`).

pub mod entities;
pub mod error;
pub mod events;
pub mod ids;
pub mod util;

pub use entities::{
    AllocatedKeys, RateLimit, Resource, ResourceAllocator, ResourceConstraints, ResourceManager,
    SharedNamespace, SimpleResource, Task, TaskBody, TaskContext, TaskFuture,
    TaskInvocationOutcome, TaskManager, TaskOutput, TaskState,
};
pub use error::{SchedulerError, SchedulerResult};
pub use events::{DomainEvent, SchedulerEvent};
pub use ids::{Alias, ResourceKey, TaskKey};
