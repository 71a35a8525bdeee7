// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Scheduler
//!
//! The async runtime and application layer for the task scheduling core.
//! `scheduler-domain` defines the pure state machines (resources, rate
//! limits, allocators, tasks); this crate drives them from a single Master
//! Process update loop, dispatches ready tasks to a Worker Pool, and exposes
//! the `Scheduler` facade applications actually construct.
//!
//! ## Module Structure
//!
//! - [`application`] — the `Scheduler` facade and the submit/execute use
//!   cases built on top of it.
//! - [`infrastructure`] — the Master Process/Worker Pool runtime, config,
//!   logging, and metrics.
//! - [`presentation`] — status-snapshot rendering for the demo binary.

pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use application::services::scheduler_service::Scheduler;
pub use infrastructure::config::scheduler_config::{Parallelism, SchedulerConfig};
