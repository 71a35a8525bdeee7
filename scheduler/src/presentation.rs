// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Presentation Layer
//!
//! Read-only status rendering for operators and the demo binary. Nothing
//! here ever mutates scheduler state; a snapshot is a point-in-time copy
//! taken under the same locks the Master Process itself uses.

pub mod snapshot;
