// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Task Supervision
//!
//! Wraps `tokio::spawn` so that the Master Process task's errors and panics
//! are always observed and logged rather than silently dropped when its
//! `JoinHandle` is discarded.

use scheduler_domain::SchedulerError;
use tokio::task::JoinHandle;
use tracing::{debug, error};

pub type SupervisedResult<T> = Result<T, SchedulerError>;

pub fn spawn_supervised<F, T>(name: &'static str, fut: F) -> JoinHandle<SupervisedResult<T>>
where
    F: std::future::Future<Output = SupervisedResult<T>> + Send + 'static,
    T: Send + 'static,
{
    debug!(task = name, "supervised task starting");
    tokio::spawn(async move {
        let result = fut.await;
        match &result {
            Ok(_) => debug!(task = name, "supervised task completed"),
            Err(e) => error!(task = name, error = %e, "supervised task failed"),
        }
        result
    })
}

pub async fn join_supervised<T>(handle: JoinHandle<SupervisedResult<T>>) -> SupervisedResult<T> {
    match handle.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(SchedulerError::internal(format!("task panicked: {e}"))),
        Err(_) => Err(SchedulerError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn propagates_success() {
        let handle = spawn_supervised("ok", async { Ok::<i32, SchedulerError>(7) });
        assert_eq!(join_supervised(handle).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn propagates_panics_as_errors() {
        let handle: JoinHandle<SupervisedResult<()>> = tokio::spawn(async { panic!("boom") });
        let err = join_supervised(handle).await.unwrap_err();
        assert!(err.to_string().contains("panicked"));
    }
}
