// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface Module
//!
//! Bootstrap-layer CLI handling for the demo binary. Clap parses the raw
//! flags into [`Cli`]; [`parse_and_validate`] then range-checks the numeric
//! flags and validates `--config` the way the teacher's `SecureArgParser`
//! validates its paths, scaled down to what a single config-file flag needs
//! (no path-traversal/injection patterns apply here, since this is a local
//! operator flag, not untrusted input from a remote caller).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  1. Cli::parse()                    │  Parse CLI with clap
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  2. validate_cli()                  │  Range/existence validation
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  3. ValidatedCli                    │  Safe, validated config
//! └─────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use thiserror::Error;

/// Maximum `--max-workers` value accepted; above this a typo is more likely
/// than a genuine request, and the worker pool would starve other processes.
const MAX_WORKERS_LIMIT: usize = 1024;

/// Demo binary CLI flags, parsed by clap.
#[derive(Parser, Debug, Clone)]
#[command(name = "scheduler-demo", about = "Runs a demo workload against the task scheduler")]
pub struct Cli {
    /// Maximum number of concurrently-running worker tasks.
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// Parallelism strategy: "thread" (default) or "process".
    #[arg(long, default_value = "thread")]
    pub parallelism: String,

    /// Path to a TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose (debug-level) logging.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

/// CLI parsing/validation errors.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid value for --{arg}: {reason}")]
    InvalidValue { arg: String, reason: String },

    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),
}

/// Validated CLI configuration: all paths exist, all numeric values are in range.
#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub max_workers: Option<usize>,
    pub parallelism: Parallelism,
    pub config: Option<PathBuf>,
    pub verbose: bool,
}

/// Mirrors the scheduler's `Parallelism` enum from `scheduler::infrastructure::config`
/// without creating a dependency from bootstrap onto the scheduler crate; the
/// two are kept in sync by `ValidatedCli`'s single caller in `scheduler-demo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parallelism {
    Thread,
    Process,
}

/// Parses `std::env::args()` and validates the result.
///
/// # Errors
///
/// Returns [`ParseError`] if a numeric flag is out of range or `--config`
/// names a file that doesn't exist. Clap itself handles `--help`/`--version`
/// and malformed flag syntax, exiting the process before this is reached.
pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    validate_cli(Cli::parse())
}

fn validate_cli(cli: Cli) -> Result<ValidatedCli, ParseError> {
    if let Some(workers) = cli.max_workers {
        if workers == 0 || workers > MAX_WORKERS_LIMIT {
            return Err(ParseError::InvalidValue {
                arg: "max-workers".to_string(),
                reason: format!("must be between 1 and {MAX_WORKERS_LIMIT}"),
            });
        }
    }

    let parallelism = match cli.parallelism.to_lowercase().as_str() {
        "thread" => Parallelism::Thread,
        "process" => Parallelism::Process,
        other => {
            return Err(ParseError::InvalidValue {
                arg: "parallelism".to_string(),
                reason: format!("must be \"thread\" or \"process\", got \"{other}\""),
            })
        }
    };

    if let Some(ref path) = cli.config {
        if !path.exists() {
            return Err(ParseError::ConfigNotFound(path.clone()));
        }
    }

    Ok(ValidatedCli {
        max_workers: cli.max_workers,
        parallelism,
        config: cli.config,
        verbose: cli.verbose,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(max_workers: Option<usize>, parallelism: &str, config: Option<PathBuf>) -> Cli {
        Cli { max_workers, parallelism: parallelism.to_string(), config, verbose: false }
    }

    #[test]
    fn accepts_default_thread_parallelism_with_no_flags() {
        let validated = validate_cli(cli(None, "thread", None)).unwrap();
        assert_eq!(validated.parallelism, Parallelism::Thread);
        assert_eq!(validated.max_workers, None);
    }

    #[test]
    fn rejects_zero_max_workers() {
        let err = validate_cli(cli(Some(0), "thread", None)).unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { .. }));
    }

    #[test]
    fn rejects_excessive_max_workers() {
        let err = validate_cli(cli(Some(MAX_WORKERS_LIMIT + 1), "thread", None)).unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { .. }));
    }

    #[test]
    fn rejects_unknown_parallelism_strategy() {
        let err = validate_cli(cli(None, "gpu", None)).unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { .. }));
    }

    #[test]
    fn rejects_missing_config_file() {
        let err = validate_cli(cli(None, "thread", Some(PathBuf::from("/no/such/file.toml")))).unwrap_err();
        assert!(matches!(err, ParseError::ConfigNotFound(_)));
    }

    #[test]
    fn process_parallelism_parses_case_insensitively() {
        let validated = validate_cli(cli(None, "Process", None)).unwrap();
        assert_eq!(validated.parallelism, Parallelism::Process);
    }
}
