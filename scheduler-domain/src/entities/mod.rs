// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Entities
//!
//! The scheduler's core domain entities: resources, rate limits, allocators,
//! the resource manager that fans requests out across them, and tasks with
//! the task manager that owns their lifecycle.

pub mod rate_limit;
pub mod resource;
pub mod resource_allocator;
pub mod resource_manager;
pub mod task;
pub mod task_manager;

pub use rate_limit::RateLimit;
pub use resource::{Resource, SimpleResource};
pub use resource_allocator::ResourceAllocator;
pub use resource_manager::ResourceManager;
pub use task::{
    AllocatedKeys, ResourceConstraints, SharedNamespace, Task, TaskBody, TaskContext,
    TaskInvocationOutcome, TaskOutput, TaskState,
};
pub use task_manager::{TaskFuture, TaskManager};
