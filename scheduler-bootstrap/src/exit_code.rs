// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Code Management
//!
//! Standardized Unix exit codes following BSD `sysexits.h` conventions.
//!
//! ## Exit Code Conventions
//!
//! - **0**: Success
//! - **1**: General error
//! - **64-78**: Specific error conditions (BSD sysexits.h)
//! - **128+N**: Fatal signal N (e.g., 130 = SIGINT)

use std::fmt;

/// Exit codes following Unix conventions (BSD sysexits.h).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful termination (0)
    #[default]
    Success = 0,

    /// General error (1)
    Error = 1,

    /// Command line usage error (64): invalid or missing arguments.
    UsageError = 64,

    /// Data format error (65): malformed configuration or parse failure.
    DataError = 65,

    /// Cannot open input (66): file not found or unreadable.
    NoInput = 66,

    /// Service unavailable (69): a dependency the scheduler needs isn't running.
    Unavailable = 69,

    /// Internal software error (70): broken invariant, assertion failure.
    Software = 70,

    /// System error (71): OS call failed.
    OsError = 71,

    /// I/O error (74).
    IoError = 74,

    /// Permission denied (77).
    NoPerm = 77,

    /// Configuration error (78): invalid or missing configuration.
    Config = 78,

    /// Interrupted by signal (SIGINT, Ctrl+C) (130).
    Interrupted = 130,

    /// Terminated by signal (SIGTERM) (143).
    Terminated = 143,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Maps an error to an exit code by pattern-matching its `Display`
    /// output. Errors with a specific [`scheduler_domain::SchedulerError`]
    /// category should prefer [`map_error_to_exit_code`] instead; this is
    /// the fallback for opaque boxed errors.
    pub fn from_error(error: &dyn std::error::Error) -> Self {
        let text = error.to_string().to_lowercase();
        if text.contains("permission") || text.contains("access denied") {
            ExitCode::NoPerm
        } else if text.contains("not found") || text.contains("no such") {
            ExitCode::NoInput
        } else if text.contains("config") {
            ExitCode::Config
        } else if text.contains("invalid") || text.contains("argument") {
            ExitCode::UsageError
        } else if text.contains("parse") || text.contains("format") {
            ExitCode::DataError
        } else if text.contains("io") || text.contains("read") || text.contains("write") {
            ExitCode::IoError
        } else if text.contains("unavailable") {
            ExitCode::Unavailable
        } else {
            ExitCode::Error
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::Error => "General error",
            ExitCode::UsageError => "Command line usage error",
            ExitCode::DataError => "Data format error",
            ExitCode::NoInput => "Cannot open input",
            ExitCode::Unavailable => "Service unavailable",
            ExitCode::Software => "Internal software error",
            ExitCode::OsError => "System error",
            ExitCode::IoError => "I/O error",
            ExitCode::NoPerm => "Permission denied",
            ExitCode::Config => "Configuration error",
            ExitCode::Interrupted => "Interrupted by signal (SIGINT)",
            ExitCode::Terminated => "Terminated by signal (SIGTERM)",
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Success)
    }

    pub fn is_signal(self) -> bool {
        matches!(self, ExitCode::Interrupted | ExitCode::Terminated)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_i32())
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code.as_i32()
    }
}

/// Maps a `SchedulerError`-style category string (see
/// `scheduler_domain::SchedulerError::category`) to the exit code the demo
/// binary should return. Anything not recognized falls back to
/// [`ExitCode::Software`], since an unrecognized category from the domain
/// crate is itself a programmer error in the bootstrap mapping, not a user
/// error.
pub fn map_error_to_exit_code(category: &str) -> ExitCode {
    match category {
        "configuration" => ExitCode::Config,
        "allocation" | "task" => ExitCode::Unavailable,
        "resource" => ExitCode::Software,
        "cancellation" => ExitCode::Interrupted,
        "metrics" => ExitCode::IoError,
        _ => ExitCode::Software,
    }
}

/// Converts a top-level `Result` from the demo binary's `main` into a
/// process [`std::process::ExitCode`].
pub fn result_to_exit_code<T, E: std::error::Error>(result: Result<T, E>) -> std::process::ExitCode {
    match result {
        Ok(_) => std::process::ExitCode::from(ExitCode::Success.as_i32() as u8),
        Err(e) => std::process::ExitCode::from(ExitCode::from_error(&e).as_i32() as u8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_values_match_sysexits() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::UsageError.as_i32(), 64);
        assert_eq!(ExitCode::Config.as_i32(), 78);
        assert_eq!(ExitCode::Interrupted.as_i32(), 130);
        assert_eq!(ExitCode::Terminated.as_i32(), 143);
    }

    #[test]
    fn is_signal_detects_interrupt_and_terminate() {
        assert!(ExitCode::Interrupted.is_signal());
        assert!(ExitCode::Terminated.is_signal());
        assert!(!ExitCode::Success.is_signal());
    }

    #[test]
    fn maps_known_domain_categories() {
        assert_eq!(map_error_to_exit_code("configuration"), ExitCode::Config);
        assert_eq!(map_error_to_exit_code("cancellation"), ExitCode::Interrupted);
        assert_eq!(map_error_to_exit_code("unknown-category"), ExitCode::Software);
    }

    #[test]
    fn from_error_recognizes_permission_errors() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied");
        assert_eq!(ExitCode::from_error(&err), ExitCode::NoPerm);
    }
}
