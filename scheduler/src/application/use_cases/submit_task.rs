// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! Submits a task built from plain request data rather than a pre-built
//! `Task`, for callers assembling requests from configuration or an RPC
//! boundary instead of constructing domain types by hand.

use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use scheduler_domain::{Alias, TaskBody, TaskKey, TaskOutput};

use crate::application::services::scheduler_service::Scheduler;

/// Request fields for one task submission. `resource_usage` maps a resource
/// alias to the units that alias must reserve before the task body runs.
pub struct SubmitTaskRequest {
    pub start_time: DateTime<Utc>,
    pub resource_usage: HashMap<Alias, u64>,
    pub runs: i64,
    pub repeat_freq: ChronoDuration,
    pub retry_on_except: u32,
    pub raise_on_except: bool,
}

impl Default for SubmitTaskRequest {
    fn default() -> Self {
        Self {
            start_time: Utc::now(),
            resource_usage: HashMap::new(),
            runs: 1,
            repeat_freq: ChronoDuration::zero(),
            retry_on_except: 0,
            raise_on_except: true,
        }
    }
}

/// Submits `request` with `body` against `scheduler`, returning the
/// newly-assigned task key.
pub fn submit_task(
    scheduler: &Scheduler,
    request: SubmitTaskRequest,
    body: impl FnMut(&scheduler_domain::TaskContext) -> Result<TaskOutput, String> + Send + 'static,
) -> TaskKey {
    let body: TaskBody = Box::new(body);
    scheduler.submit(
        TaskKey::new(),
        request.start_time,
        request.resource_usage,
        request.runs,
        request.repeat_freq,
        request.retry_on_except,
        request.raise_on_except,
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::scheduler_config::SchedulerConfig;
    use serde_json::json;

    #[test]
    fn submits_with_default_request_fields() {
        let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();
        let key = submit_task(&scheduler, SubmitTaskRequest::default(), |_| Ok(json!(1)));
        assert_eq!(scheduler.active_tasks_count(), 1);
        let _ = key;
    }
}
