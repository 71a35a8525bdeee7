// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # `await_until`
//!
//! Synchronous polling helper for "wait until a condition holds" tests and
//! simple call-sites that have no async runtime available. Requires `k`
//! consecutive positive evaluations (`confirmation_counts`) spaced by
//! `revaluate_delay` before returning `true`, so a flapping condition that
//! only transiently looks satisfied doesn't short-circuit the wait. The
//! async twin lives in `scheduler::infrastructure::runtime::await_for` and
//! shares this same confirmation-count contract.

use std::thread;
use std::time::{Duration, Instant};

/// Polls `condition` every `revaluate_delay` until it has returned `true`
/// `confirmation_counts` times in a row, or `timeout` elapses first.
///
/// Returns `true` if the condition was confirmed, `false` on timeout.
pub fn await_until<F>(mut condition: F, revaluate_delay: Duration, confirmation_counts: u32, timeout: Duration) -> bool
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
        thread::sleep(revaluate_delay.min(deadline.saturating_duration_since(Instant::now())));
    }
}
