// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Bootstrap Module
//!
//! The bootstrap layer sits **outside** the scheduler's application /
//! infrastructure / domain layers and provides:
//!
//! - **Entry point** — CLI parsing and the demo binary's startup sequence
//! - **Platform abstraction** — OS-specific operations (POSIX vs Windows)
//! - **Signal handling** — graceful shutdown (SIGTERM, SIGINT, SIGHUP)
//! - **Exit codes** — Unix exit code mapping (BSD `sysexits.h`)
//! - **Shutdown coordination** — cancellation token propagation with a grace
//!   period
//!
//! ## Architecture Position
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          BOOTSTRAP (This Module)            │
//! │  - CLI Parsing                              │
//! │  - Platform Abstraction                     │
//! │  - Signal Handling                          │
//! │  - Exit Codes                               │
//! └─────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────┐
//! │           `scheduler` crate                 │
//! │  - Scheduler facade, worker pool, master    │
//! │    process, config, logging, metrics        │
//! └─────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────┐
//! │         `scheduler-domain` crate            │
//! │  - Resources, allocators, tasks             │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - `cli` — CLI argument parsing (`--max-workers`, `--parallelism`, `--config`)
//! - `platform` — OS abstraction (Unix/Windows)
//! - `signals` — signal handling (SIGTERM, SIGINT, SIGHUP)
//! - `exit_code` — Unix exit code enumeration
//! - `logger` — bootstrap-specific logging, used before the main tracing
//!   subscriber is installed
//! - `shutdown` — shutdown coordination

pub mod cli;
pub mod exit_code;
pub mod logger;
pub mod platform;
pub mod shutdown;
pub mod signals;

pub use cli::{parse_and_validate, ParseError, ValidatedCli};
pub use exit_code::{map_error_to_exit_code, result_to_exit_code, ExitCode};

/// Parses and validates the demo binary's CLI arguments.
///
/// The caller is responsible for running the scheduler and mapping its
/// result to an exit code with [`result_to_exit_code`].
///
/// # Errors
///
/// Returns [`cli::ParseError`] if parsing or validation fails. Clap handles
/// `--help`/`--version` itself and exits the process before this returns.
pub fn bootstrap_cli() -> Result<ValidatedCli, cli::ParseError> {
    cli::parse_and_validate()
}
