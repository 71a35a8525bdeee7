// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Logging
//!
//! Installs the process-wide `tracing` subscriber. Mirrors the teacher's
//! `FmtSubscriber`-at-startup approach but resolves the level through
//! `EnvFilter` so `RUST_LOG` can override `SchedulerConfig::log_level`
//! without a rebuild, the same override precedence the rest of this
//! workspace's configuration loading follows.

use scheduler_domain::SchedulerError;
use tracing_subscriber::EnvFilter;

/// Builds the `EnvFilter` a given `log_level` resolves to, honoring
/// `RUST_LOG` when set. Split out as a pure function so the resolution
/// logic is testable without installing a (process-global, one-shot)
/// subscriber.
pub fn resolve_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// Installs the global tracing subscriber. Idempotent: a second call
/// observes `set_global_default`'s error and logs a debug note instead of
/// panicking, since test binaries may each try to initialize logging once.
pub fn init_tracing(log_level: &str) -> Result<(), SchedulerError> {
    let filter = resolve_filter(log_level);
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("tracing subscriber already installed, skipping");
    }
    Ok(())
}
