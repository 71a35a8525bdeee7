// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Runtime
//!
//! The Master Process/Worker Pool execution model: [`shared_state`] holds
//! what both sides touch, [`update_event`] is the wake-up channel between
//! them, [`master_process`] runs the single update loop, [`worker_pool`]
//! runs the executors, [`supervisor`] wraps spawned tasks so panics are
//! never silently lost, and [`await_for`] is the async polling helper used
//! by callers waiting on an external condition.

pub mod await_for;
pub mod master_process;
pub mod shared_state;
pub mod supervisor;
pub mod update_event;
pub mod worker_pool;
