// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Utilities
//!
//! Small, synchronous helpers shared across the domain that don't belong to
//! any one entity.

pub mod await_for;
