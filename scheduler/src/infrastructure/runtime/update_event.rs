// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Update Event
//!
//! The Master Process's sole wake-up channel (spec §4.7, §5: "the single
//! master wake-up channel; set by workers on free/done and by submitters on
//! submitTask"). Backed by [`tokio::sync::Notify`], which already does the
//! right thing for a signal that may be set before anyone is waiting on it:
//! a `notify_one()` with no waiter parked leaves a permit that the next
//! `notified()` consumes immediately, so a worker freeing a resource just
//! before the master starts its wait is never missed.

use std::time::Duration;
use tokio::sync::Notify;

pub struct UpdateEvent {
    notify: Notify,
}

impl UpdateEvent {
    pub fn new() -> Self {
        Self { notify: Notify::new() }
    }

    /// Sets the event. Callable from async master-loop code and from plain
    /// worker threads alike — `Notify::notify_one` takes no lock that would
    /// require an async context.
    pub fn set(&self) {
        self.notify.notify_one();
    }

    /// Waits for the event, racing it against `deadline` (master-loop step
    /// 2: `min(resourceManager.getTimeToUpdate(), taskManager.getTimeToNextTask())`).
    /// A `None` deadline waits indefinitely.
    pub async fn wait_with_deadline(&self, deadline: Option<Duration>) {
        match deadline {
            Some(d) => {
                tokio::select! {
                    _ = self.notify.notified() => {}
                    _ = tokio::time::sleep(d) => {}
                }
            }
            None => self.notify.notified().await,
        }
    }
}

impl Default for UpdateEvent {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn wait_returns_immediately_once_set_before_waiting() {
        let event = UpdateEvent::new();
        event.set();
        let start = Instant::now();
        event.wait_with_deadline(Some(Duration::from_secs(5))).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn wait_times_out_at_the_deadline_when_never_set() {
        let event = UpdateEvent::new();
        let start = Instant::now();
        event.wait_with_deadline(Some(Duration::from_millis(30))).await;
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[tokio::test]
    async fn a_set_from_another_task_wakes_the_waiter() {
        let event = Arc::new(UpdateEvent::new());
        let event2 = event.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            event2.set();
        });
        let start = Instant::now();
        event.wait_with_deadline(Some(Duration::from_secs(5))).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
