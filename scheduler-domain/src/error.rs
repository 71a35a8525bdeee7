// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! Hierarchical error type for the scheduler domain. Errors are grouped by
//! category so callers can decide whether to retry, surface to a future, or
//! crash (see §7 of the scheduler specification for the taxonomy this
//! mirrors: allocation-impossible, task-body exception, resource programmer
//! error, shutdown-during-wait).

use thiserror::Error;

/// Domain-specific errors for the task scheduling core.
#[derive(Error, Debug, Clone)]
pub enum SchedulerError {
    /// A resource request can never be satisfied by any resource registered
    /// under its alias (requested units exceed every resource's capacity).
    /// Non-fatal: the task stays `BLOCKED` until a larger resource is added.
    #[error("allocation impossible for alias {alias}: requested {requested} units, max resource capacity is {max_capacity}")]
    AllocationImpossible {
        alias: String,
        requested: u64,
        max_capacity: u64,
    },

    /// The task body raised after exhausting its retry budget.
    #[error("task {task_key} failed after {attempts} attempt(s): {reason}")]
    TaskExecutionFailed {
        task_key: String,
        attempts: u32,
        reason: String,
    },

    /// A resource was freed more than it was reserved, or freed twice. This
    /// indicates a broken invariant and is always treated as fatal.
    #[error("resource invariant violated on {resource_key}: {reason}")]
    ResourceInvariantViolation { resource_key: String, reason: String },

    /// The scheduler was stopped while an operation was waiting.
    #[error("scheduler is shutting down")]
    Cancelled,

    /// A duplicate task key was submitted, or a duplicate waiting-queue
    /// registration was attempted for the same alias.
    #[error("duplicate task key: {0}")]
    DuplicateTaskKey(String),

    /// No task exists for the given key.
    #[error("unknown task: {0}")]
    UnknownTask(String),

    /// Configuration failed to parse or validate.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Metrics collection or export failed.
    #[error("metrics error: {0}")]
    MetricsError(String),

    /// Any other failure that does not fit a more specific category.
    #[error("internal error: {0}")]
    InternalError(String),
}

impl SchedulerError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    pub fn metrics_error(msg: impl Into<String>) -> Self {
        Self::MetricsError(msg.into())
    }

    /// Whether retrying the same operation later might succeed.
    ///
    /// `AllocationImpossible` is deliberately excluded: it is not
    /// recoverable by retrying the operation, only by registering more
    /// capacity, which is a distinct corrective action.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SchedulerError::TaskExecutionFailed { .. } | SchedulerError::Cancelled)
    }

    /// Whether this error indicates a violated invariant that must crash
    /// the worker rather than be swallowed or retried.
    pub fn is_fatal_invariant_violation(&self) -> bool {
        matches!(self, SchedulerError::ResourceInvariantViolation { .. })
    }

    pub fn category(&self) -> &'static str {
        match self {
            SchedulerError::AllocationImpossible { .. } => "allocation",
            SchedulerError::TaskExecutionFailed { .. } => "task",
            SchedulerError::ResourceInvariantViolation { .. } => "resource",
            SchedulerError::Cancelled => "cancellation",
            SchedulerError::DuplicateTaskKey(_) => "task",
            SchedulerError::UnknownTask(_) => "task",
            SchedulerError::InvalidConfiguration(_) => "configuration",
            SchedulerError::MetricsError(_) => "metrics",
            SchedulerError::InternalError(_) => "internal",
        }
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
