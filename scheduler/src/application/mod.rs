// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Application Layer
//!
//! Coordinates the domain's pure state machines with the infrastructure
//! runtime: the [`services::scheduler_service::Scheduler`] facade owns the
//! shared state and the running Master Process/Worker Pool, and the
//! `use_cases` module offers thin, single-purpose entry points over it.

pub mod services;
pub mod use_cases;
