// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Rate Limit (deferred-release sliding window)
//!
//! Models "N requests per minute AND M requests per hour" with a chain of
//! windows sorted ascending by `(window, capacity)`. Only the deepest
//! (smallest-window) node consumes on [`Resource::use_units`]; `free`
//! enqueues a `(now, units)` tuple on the deepest node, and the charge
//! migrates outward through the chain as each window expires — a unit freed
//! at time `t` is charged against the minute-window until `t + 60s`, then
//! against the hour-window until `t + 3600s`, and so on.

use crate::entities::resource::Resource;
use crate::error::{SchedulerError, SchedulerResult};
use crate::ids::ResourceKey;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::Duration as StdDuration;

#[derive(Debug)]
struct RateLimitNode {
    window: chrono::Duration,
    capacity: u64,
    usage: u64,
    update_queue: VecDeque<(DateTime<Utc>, u64)>,
}

impl RateLimitNode {
    fn new(window: StdDuration, capacity: u64) -> Self {
        Self {
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero()),
            capacity,
            usage: 0,
            update_queue: VecDeque::new(),
        }
    }

    fn free_capacity(&self) -> u64 {
        self.capacity.saturating_sub(self.usage)
    }

    fn time_to_update(&self, now: DateTime<Utc>) -> Option<StdDuration> {
        let (t, _) = self.update_queue.front()?;
        let release = *t + self.window;
        let remaining = release - now;
        Some(remaining.to_std().unwrap_or(StdDuration::ZERO))
    }
}

/// A chain of sliding-window rate-limit nodes, smallest window first.
#[derive(Debug)]
pub struct RateLimit {
    key: ResourceKey,
    /// `nodes[0]` is the deepest (smallest window) node; `nodes[i+1]` is the
    /// parent of `nodes[i]`.
    nodes: Vec<RateLimitNode>,
}

impl RateLimit {
    /// Builds a chain from `(window, capacity)` pairs. Pairs are sorted
    /// ascending by window; each outer window must strictly exceed its
    /// child in both window and capacity, or construction fails.
    pub fn from_window_capacity_pairs(pairs: Vec<(StdDuration, u64)>) -> SchedulerResult<Self> {
        Self::with_key(ResourceKey::new(), pairs)
    }

    pub fn with_key(key: ResourceKey, mut pairs: Vec<(StdDuration, u64)>) -> SchedulerResult<Self> {
        if pairs.is_empty() {
            return Err(SchedulerError::invalid_config("rate limit chain requires at least one window"));
        }
        pairs.sort_by_key(|(window, _)| *window);
        for pair in pairs.windows(2) {
            let (inner_window, inner_cap) = pair[0];
            let (outer_window, outer_cap) = pair[1];
            if outer_window <= inner_window || outer_cap <= inner_cap {
                return Err(SchedulerError::invalid_config(
                    "each outer rate-limit window must have strictly larger window and capacity than its child",
                ));
            }
        }
        let nodes = pairs.into_iter().map(|(w, c)| RateLimitNode::new(w, c)).collect();
        Ok(Self { key, nodes })
    }

    /// Advances time on this chain's bottom node's queue only when no other
    /// charge is outstanding; exposed for property tests that want direct
    /// access to per-node usage.
    #[cfg(test)]
    fn deepest_usage(&self) -> u64 {
        self.nodes[0].usage
    }
}

impl Resource for RateLimit {
    fn key(&self) -> &ResourceKey {
        &self.key
    }

    fn use_units(&mut self, n: u64) -> Option<ResourceKey> {
        if n > 0 && !self.has_free_capacity(n) {
            return None;
        }
        self.nodes[0].usage += n;
        Some(self.key.clone())
    }

    fn free(&mut self, n: u64, now: DateTime<Utc>) -> SchedulerResult<()> {
        if n > self.nodes[0].usage {
            return Err(SchedulerError::ResourceInvariantViolation {
                resource_key: self.key.to_string(),
                reason: format!(
                    "freed {n} units from the deepest rate-limit window but only {} were charged",
                    self.nodes[0].usage
                ),
            });
        }
        if n > 0 {
            self.nodes[0].update_queue.push_back((now, n));
        }
        Ok(())
    }

    fn has_free_capacity(&self, n: u64) -> bool {
        self.nodes.iter().all(|node| node.usage + n <= node.capacity)
    }

    fn free_capacity(&self) -> u64 {
        self.nodes.iter().map(RateLimitNode::free_capacity).min().unwrap_or(0)
    }

    fn capacity(&self) -> u64 {
        self.nodes[0].capacity
    }

    fn update(&mut self, now: DateTime<Utc>) -> bool {
        let mut changed = false;
        for i in 0..self.nodes.len() {
            loop {
                let expired = match self.nodes[i].update_queue.front() {
                    Some((t, _)) => *t + self.nodes[i].window <= now,
                    None => false,
                };
                if !expired {
                    break;
                }
                let (t, units) = self.nodes[i].update_queue.pop_front().unwrap();
                self.nodes[i].usage = self.nodes[i].usage.saturating_sub(units);
                changed = true;
                if let Some(parent) = self.nodes.get_mut(i + 1) {
                    parent.update_queue.push_back((t, units));
                    parent.usage += units;
                }
            }
        }
        changed
    }

    fn time_to_update(&self, now: DateTime<Utc>) -> Option<StdDuration> {
        self.nodes.iter().filter_map(|n| n.time_to_update(now)).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn rejects_non_increasing_chain() {
        let err = RateLimit::from_window_capacity_pairs(vec![
            (Duration::from_secs(60), 5),
            (Duration::from_secs(30), 10),
        ])
        .unwrap_err();
        assert_eq!(err.category(), "configuration");
    }

    #[test]
    fn single_window_use_and_expire() {
        let mut rl = RateLimit::from_window_capacity_pairs(vec![(Duration::from_millis(50), 2)]).unwrap();
        let t0 = now();
        assert!(rl.use_units(2).is_some());
        assert!(rl.use_units(1).is_none());
        rl.free(2, t0).unwrap();
        // Not yet expired: usage stays charged until now + window.
        assert!(!rl.update(t0));
        assert_eq!(rl.deepest_usage(), 2);
        // After the window elapses, update() reclaims the capacity.
        let t1 = t0 + chrono::Duration::milliseconds(60);
        assert!(rl.update(t1));
        assert_eq!(rl.deepest_usage(), 0);
    }

    #[test]
    fn charge_migrates_to_parent_window() {
        let mut rl = RateLimit::from_window_capacity_pairs(vec![
            (Duration::from_secs(1), 2),
            (Duration::from_secs(3600), 5),
        ])
        .unwrap();
        let t0 = now();
        rl.use_units(2).unwrap();
        rl.free(2, t0).unwrap();
        // Minute-window (here: 1s) window expires; hour-window inherits the charge.
        let t1 = t0 + chrono::Duration::milliseconds(1100);
        assert!(rl.update(t1));
        assert_eq!(rl.nodes[0].usage, 0);
        assert_eq!(rl.nodes[1].usage, 2);
        // The freed-up deep window now accepts a new request...
        assert!(rl.use_units(2).is_some());
        // ...but the outer window still reflects the migrated charge plus the new one.
        assert!(!rl.has_free_capacity(4));
    }

    #[test]
    fn over_free_is_fatal() {
        let mut rl = RateLimit::from_window_capacity_pairs(vec![(Duration::from_secs(1), 2)]).unwrap();
        rl.use_units(1).unwrap();
        let err = rl.free(2, now()).unwrap_err();
        assert!(err.is_fatal_invariant_violation());
    }

    #[test]
    fn zero_unit_request_never_blocks() {
        let mut rl = RateLimit::from_window_capacity_pairs(vec![(Duration::from_secs(1), 0)]).unwrap();
        assert!(rl.use_units(0).is_some());
    }
}
