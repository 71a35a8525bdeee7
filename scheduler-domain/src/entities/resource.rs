// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Resource
//!
//! A capacity-bearing entity that tasks reserve units of before running.
//! `Resource` is a sealed trait with two concrete variants: [`SimpleResource`]
//! (bounded integer capacity, synchronous release) and
//! [`RateLimit`][crate::entities::rate_limit::RateLimit] (chained
//! sliding-window with deferred release). An allocator owns a heterogeneous
//! set of `Box<dyn Resource>` under one alias and never needs to know which
//! concrete kind it holds.

use crate::error::{SchedulerError, SchedulerResult};
use crate::ids::ResourceKey;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Common behavior shared by every concrete resource kind.
///
/// Invariant: `usage() <= capacity()` holds at all times for every
/// implementation; this is the "capacity bound" property (spec §8.1).
pub trait Resource: std::fmt::Debug + Send + Sync {
    /// Stable identity of this resource.
    fn key(&self) -> &ResourceKey;

    /// Reserves `n` units if there is headroom across the whole resource
    /// (for a chained rate limit, across every node in the chain). Returns
    /// this resource's own key on success.
    fn use_units(&mut self, n: u64) -> Option<ResourceKey>;

    /// Releases `n` units. For a `SimpleResource` this is synchronous and
    /// immediate; for a `RateLimit` the units remain charged until their
    /// window elapses. Returns a fatal [`SchedulerError::ResourceInvariantViolation`]
    /// if `n` was never reserved — freeing more than was used, or freeing
    /// twice, is a programmer error that must crash the caller, never be
    /// silently absorbed.
    fn free(&mut self, n: u64, now: DateTime<Utc>) -> SchedulerResult<()>;

    /// Whether `n` units could currently be reserved without blocking.
    fn has_free_capacity(&self, n: u64) -> bool;

    /// Currently-free capacity, used by the allocator's best-fit heuristic.
    fn free_capacity(&self) -> u64;

    /// Total declared capacity (the deepest node's capacity for a chain).
    fn capacity(&self) -> u64;

    /// Advances internal time-based bookkeeping (expiring rate-limit
    /// entries). Returns `true` if anything changed (a capacity increase a
    /// waiting request might now fit into).
    fn update(&mut self, now: DateTime<Utc>) -> bool;

    /// Smallest duration until this resource's state could next change on
    /// its own (without a `use`/`free` call), or `None` if nothing is
    /// pending release.
    fn time_to_update(&self, now: DateTime<Utc>) -> Option<Duration>;
}

/// Bounded integer capacity resource with synchronous, immediate release.
#[derive(Debug, Clone)]
pub struct SimpleResource {
    key: ResourceKey,
    capacity: u64,
    usage: u64,
}

impl SimpleResource {
    pub fn new(capacity: u64) -> Self {
        Self::with_key(ResourceKey::new(), capacity)
    }

    pub fn with_key(key: ResourceKey, capacity: u64) -> Self {
        Self { key, capacity, usage: 0 }
    }

    pub fn usage(&self) -> u64 {
        self.usage
    }
}

impl Resource for SimpleResource {
    fn key(&self) -> &ResourceKey {
        &self.key
    }

    fn use_units(&mut self, n: u64) -> Option<ResourceKey> {
        if self.capacity.saturating_sub(self.usage) < n {
            return None;
        }
        self.usage += n;
        Some(self.key.clone())
    }

    fn free(&mut self, n: u64, _now: DateTime<Utc>) -> SchedulerResult<()> {
        if n > self.usage {
            return Err(SchedulerError::ResourceInvariantViolation {
                resource_key: self.key.to_string(),
                reason: format!("freed {n} units but only {} were in use", self.usage),
            });
        }
        self.usage -= n;
        Ok(())
    }

    fn has_free_capacity(&self, n: u64) -> bool {
        self.capacity.saturating_sub(self.usage) >= n
    }

    fn free_capacity(&self) -> u64 {
        self.capacity.saturating_sub(self.usage)
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn update(&mut self, _now: DateTime<Utc>) -> bool {
        false
    }

    fn time_to_update(&self, _now: DateTime<Utc>) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn use_respects_capacity() {
        let mut r = SimpleResource::new(2);
        assert!(r.use_units(2).is_some());
        assert!(r.use_units(1).is_none());
        assert_eq!(r.usage(), 2);
    }

    #[test]
    fn free_releases_capacity_immediately() {
        let mut r = SimpleResource::new(2);
        r.use_units(2).unwrap();
        r.free(1, now()).unwrap();
        assert!(r.has_free_capacity(1));
        assert!(!r.has_free_capacity(2));
    }

    #[test]
    fn freeing_more_than_reserved_is_fatal() {
        let mut r = SimpleResource::new(2);
        r.use_units(1).unwrap();
        let err = r.free(2, now()).unwrap_err();
        assert!(err.is_fatal_invariant_violation());
    }

    #[test]
    fn zero_unit_request_always_succeeds() {
        let mut r = SimpleResource::new(0);
        assert!(r.use_units(0).is_some());
    }
}
