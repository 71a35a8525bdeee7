// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Async `await_until`
//!
//! Async twin of `scheduler_domain::util::await_for::await_until`, for
//! callers that hold a Tokio runtime and don't want to block a thread while
//! polling. Shares the same confirmation-count contract: `condition` must
//! return `true` `confirmation_counts` times in a row, spaced by
//! `revaluate_delay`, before the wait resolves.

use std::time::Duration;

use tokio::time::{sleep, Instant};

/// Polls `condition` every `revaluate_delay` until it has returned `true`
/// `confirmation_counts` times in a row, or `timeout` elapses first.
pub async fn await_until<F>(mut condition: F, revaluate_delay: Duration, confirmation_counts: u32, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut consecutive = 0u32;
    loop {
        if condition() {
            consecutive += 1;
            if consecutive >= confirmation_counts.max(1) {
                return true;
            }
        } else {
            consecutive = 0;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(revaluate_delay.min(deadline.saturating_duration_since(Instant::now()))).await;
    }
}
