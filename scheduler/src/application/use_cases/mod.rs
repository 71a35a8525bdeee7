// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Use Cases
//!
//! Thin, single-purpose entry points over [`crate::application::services::scheduler_service::Scheduler`].
//! Each function does exactly one thing a caller would otherwise inline
//! against the facade directly; they exist so callers depending on this
//! crate have a stable, documented surface independent of `Scheduler`'s own
//! (larger) method set.

pub mod execute_tasks;
pub mod submit_task;
