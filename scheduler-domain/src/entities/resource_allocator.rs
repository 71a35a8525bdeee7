// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Resource Allocator
//!
//! Owns every [`Resource`] registered under one logical `alias`, dispatches
//! requests to whichever resource can satisfy them, and maintains the
//! **allocator invariant**: there always exists an assignment of
//! `readyQueue` entries to distinct resources such that each resource's
//! allocated units do not exceed its free capacity — the current
//! `readyAllocation` is always a valid witness of that assignment.

use crate::entities::resource::Resource;
use crate::error::{SchedulerError, SchedulerResult};
use crate::ids::{Alias, ResourceKey, TaskKey};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

pub struct ResourceAllocator {
    alias: Alias,
    resources: HashMap<ResourceKey, Box<dyn Resource>>,
    /// Arrival order of entries currently in the ready queue; the companion
    /// `ready_units` map holds each entry's requested units. Kept apart from
    /// a sorted structure because the allocation heuristic needs to iterate
    /// in decreasing units while ties still resolve to arrival order.
    ready_order: Vec<TaskKey>,
    ready_units: HashMap<TaskKey, u64>,
    waiting_queue: VecDeque<(TaskKey, u64)>,
    ready_allocation: HashMap<TaskKey, ResourceKey>,
    ready_usage: u64,
}

impl ResourceAllocator {
    pub fn new(alias: Alias) -> Self {
        Self {
            alias,
            resources: HashMap::new(),
            ready_order: Vec::new(),
            ready_units: HashMap::new(),
            waiting_queue: VecDeque::new(),
            ready_allocation: HashMap::new(),
            ready_usage: 0,
        }
    }

    pub fn alias(&self) -> &Alias {
        &self.alias
    }

    pub fn register_resource(&mut self, resource: Box<dyn Resource>) {
        self.resources.insert(resource.key().clone(), resource);
    }

    /// Largest declared capacity across every resource in this allocator;
    /// a request exceeding this can never be satisfied.
    pub fn max_resource_capacity(&self) -> u64 {
        self.resources.values().map(|r| r.capacity()).max().unwrap_or(0)
    }

    pub fn is_request_unsatisfiable(&self, units: u64) -> bool {
        units > self.max_resource_capacity()
    }

    /// Appends to the waiting queue. Rejects a `taskKey` already known to
    /// this allocator (waiting, ready, or already allocated).
    pub fn register_request(&mut self, task_key: TaskKey, units: u64) -> SchedulerResult<()> {
        if self.waiting_queue.iter().any(|(tk, _)| tk == &task_key)
            || self.ready_units.contains_key(&task_key)
            || self.ready_allocation.contains_key(&task_key)
        {
            return Err(SchedulerError::DuplicateTaskKey(task_key.to_string()));
        }
        self.waiting_queue.push_back((task_key, units));
        Ok(())
    }

    pub fn get_allocated_resource(&self, task_key: &TaskKey) -> Option<ResourceKey> {
        self.ready_allocation.get(task_key).cloned()
    }

    /// Transitions a ready, allocated request into in-use: performs
    /// `resource.use(units)` on the chosen resource and removes the entry
    /// from the ready queue and allocation map.
    pub fn use_request(&mut self, task_key: &TaskKey) -> SchedulerResult<Option<ResourceKey>> {
        let Some(resource_key) = self.ready_allocation.get(task_key).cloned() else {
            return Ok(None);
        };
        let units = self.ready_units.get(task_key).copied().unwrap_or(0);
        let resource = self.resources.get_mut(&resource_key).ok_or_else(|| {
            SchedulerError::internal(format!("allocator {} lost track of resource {resource_key}", self.alias))
        })?;
        if resource.use_units(units).is_none() {
            return Err(SchedulerError::ResourceInvariantViolation {
                resource_key: resource_key.to_string(),
                reason: format!(
                    "committed allocation for task {task_key} could not be honored: allocator invariant violated"
                ),
            });
        }
        self.remove_from_ready(task_key, units);
        self.ready_allocation.remove(task_key);
        Ok(Some(resource_key))
    }

    pub fn free(&mut self, resource_key: &ResourceKey, units: u64, now: DateTime<Utc>) -> SchedulerResult<()> {
        let resource = self.resources.get_mut(resource_key).ok_or_else(|| {
            SchedulerError::internal(format!("allocator {} has no resource {resource_key}", self.alias))
        })?;
        resource.free(units, now)
    }

    /// Advances every resource's internal clock, then tries to absorb
    /// waiting requests if anything changed. Returns whether any
    /// allocation-relevant state changed (a capacity update, or a waiting
    /// request becoming ready).
    pub fn update(&mut self, now: DateTime<Utc>) -> SchedulerResult<bool> {
        let mut capacity_increased = false;
        for resource in self.resources.values_mut() {
            if resource.update(now) {
                capacity_increased = true;
            }
        }
        if self.waiting_queue.is_empty() {
            return Ok(capacity_increased);
        }
        let allocated = self.dequeue_and_allocate();
        Ok(capacity_increased || allocated)
    }

    pub fn time_to_update(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.resources.values().filter_map(|r| r.time_to_update(now)).min()
    }

    pub fn ready_usage(&self) -> u64 {
        self.ready_usage
    }

    pub fn waiting_len(&self) -> usize {
        self.waiting_queue.len()
    }

    fn net_capacity(&self) -> i64 {
        let total_free: u64 = self.resources.values().map(Resource::free_capacity).sum();
        total_free as i64 - self.ready_usage as i64
    }

    fn max_free_capacity(&self) -> u64 {
        self.resources.values().map(Resource::free_capacity).max().unwrap_or(0)
    }

    fn push_ready(&mut self, task_key: TaskKey, units: u64) {
        self.ready_units.insert(task_key.clone(), units);
        self.ready_order.push(task_key);
        self.ready_usage += units;
    }

    fn remove_from_ready(&mut self, task_key: &TaskKey, units: u64) {
        self.ready_units.remove(task_key);
        self.ready_order.retain(|tk| tk != task_key);
        self.ready_usage = self.ready_usage.saturating_sub(units);
    }

    /// Greedily drains feasible requests off the front of `waiting_queue`
    /// into the ready queue, returning the drained entries in arrival
    /// order (a "transit stack": its tail is the most recently drained
    /// entry, the first to be peeled back on allocation failure).
    fn drain_waiting_into_ready(&mut self) -> Vec<(TaskKey, u64)> {
        let mut drained = Vec::new();
        loop {
            let max_capacity = self.max_free_capacity();
            let net_capacity = self.net_capacity();
            let Some((_, units)) = self.waiting_queue.front() else { break };
            if *units > max_capacity || *units as i64 > net_capacity {
                break;
            }
            let (task_key, units) = self.waiting_queue.pop_front().unwrap();
            self.push_ready(task_key.clone(), units);
            drained.push((task_key, units));
        }
        drained
    }

    /// Largest-request-first / best-fit heuristic: iterate the ready queue
    /// in decreasing units (ties broken by arrival order); for each, pick
    /// the resource with the smallest free capacity that still has
    /// headroom. Fails (returns `None`) if any entry cannot be placed.
    fn allocate_resources(&self) -> Option<HashMap<TaskKey, ResourceKey>> {
        let mut free: HashMap<ResourceKey, u64> =
            self.resources.iter().map(|(k, r)| (k.clone(), r.free_capacity())).collect();
        let mut entries: Vec<(TaskKey, u64)> = self
            .ready_order
            .iter()
            .map(|tk| (tk.clone(), self.ready_units.get(tk).copied().unwrap_or(0)))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));

        let mut allocation = HashMap::with_capacity(entries.len());
        for (task_key, units) in entries {
            let chosen = free
                .iter()
                .filter(|(_, &cap)| cap >= units)
                .min_by_key(|(_, &cap)| cap)
                .map(|(k, _)| k.clone());
            match chosen {
                Some(resource_key) => {
                    *free.get_mut(&resource_key).unwrap() -= units;
                    allocation.insert(task_key, resource_key);
                }
                None => return None,
            }
        }
        Some(allocation)
    }

    fn commit_allocation(&mut self, allocation: HashMap<TaskKey, ResourceKey>) {
        self.ready_allocation = allocation;
    }

    /// The allocation algorithm (spec §4.3): drain as much of the waiting
    /// queue as fits, attempt a concrete best-fit assignment, and on
    /// failure peel entries back off the transit stack (preserving FIFO
    /// order) until either an assignment succeeds or nothing is left to
    /// give back. Returns whether the ready allocation changed.
    fn dequeue_and_allocate(&mut self) -> bool {
        let mut changed = false;
        let mut had_success_this_call = false;
        loop {
            let mut transit_stack = self.drain_waiting_into_ready();
            match self.allocate_resources() {
                Some(allocation) => {
                    self.commit_allocation(allocation);
                    changed = true;
                    had_success_this_call = true;
                    if transit_stack.is_empty() {
                        break;
                    }
                    continue;
                }
                None => {
                    if had_success_this_call {
                        // A prior iteration of this call already committed a
                        // valid allocation; undo this round's speculative
                        // drain and let that allocation stand.
                        for (task_key, units) in transit_stack.into_iter().rev() {
                            self.remove_from_ready(&task_key, units);
                            self.waiting_queue.push_front((task_key, units));
                        }
                        break;
                    }
                    let mut recovered = false;
                    while let Some((task_key, units)) = transit_stack.pop() {
                        self.remove_from_ready(&task_key, units);
                        self.waiting_queue.push_front((task_key, units));
                        if let Some(allocation) = self.allocate_resources() {
                            self.commit_allocation(allocation);
                            changed = true;
                            recovered = true;
                            break;
                        }
                    }
                    // Whatever remains in transit_stack after a successful
                    // recovery is still correctly parked in the ready queue;
                    // anything requeued past that point already sits back
                    // at the front of waiting_queue in original order.
                    let _ = recovered;
                    break;
                }
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::resource::SimpleResource;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn allocator_with_capacities(caps: &[u64]) -> ResourceAllocator {
        let mut alloc = ResourceAllocator::new(Alias::from("gpu"));
        for &c in caps {
            alloc.register_resource(Box::new(SimpleResource::new(c)));
        }
        alloc
    }

    #[test]
    fn single_resource_satisfies_single_request() {
        let mut alloc = allocator_with_capacities(&[4]);
        let t1 = TaskKey::new();
        alloc.register_request(t1.clone(), 3).unwrap();
        alloc.update(now()).unwrap();
        assert!(alloc.get_allocated_resource(&t1).is_some());
    }

    #[test]
    fn duplicate_task_key_rejected() {
        let mut alloc = allocator_with_capacities(&[4]);
        let t1 = TaskKey::new();
        alloc.register_request(t1.clone(), 1).unwrap();
        let err = alloc.register_request(t1, 1).unwrap_err();
        assert_eq!(err.category(), "task");
    }

    #[test]
    fn best_fit_prefers_tightest_resource() {
        let mut alloc = allocator_with_capacities(&[10, 2, 5]);
        let t1 = TaskKey::new();
        alloc.register_request(t1.clone(), 2).unwrap();
        alloc.update(now()).unwrap();
        let assigned = alloc.get_allocated_resource(&t1).unwrap();
        // The capacity-2 resource is the tightest fit for a 2-unit request.
        let resource = alloc.resources.get(&assigned).unwrap();
        assert_eq!(resource.capacity(), 2);
    }

    #[test]
    fn oversized_request_never_allocates_and_reports_unsatisfiable() {
        let mut alloc = allocator_with_capacities(&[4]);
        assert!(alloc.is_request_unsatisfiable(5));
        let t1 = TaskKey::new();
        alloc.register_request(t1.clone(), 5).unwrap();
        alloc.update(now()).unwrap();
        assert!(alloc.get_allocated_resource(&t1).is_none());
        assert_eq!(alloc.waiting_len(), 1);
    }

    #[test]
    fn fifo_preserved_when_second_request_does_not_fit() {
        let mut alloc = allocator_with_capacities(&[3]);
        let t1 = TaskKey::new();
        let t2 = TaskKey::new();
        alloc.register_request(t1.clone(), 2).unwrap();
        alloc.register_request(t2.clone(), 2).unwrap();
        alloc.update(now()).unwrap();
        // Only 3 units of capacity exist; both 2-unit requests cannot be
        // ready simultaneously, so the first arrival must win.
        assert!(alloc.get_allocated_resource(&t1).is_some());
        assert!(alloc.get_allocated_resource(&t2).is_none());
    }

    #[test]
    fn use_then_free_reclaims_capacity_for_waiting_request() {
        let mut alloc = allocator_with_capacities(&[2]);
        let t1 = TaskKey::new();
        let t2 = TaskKey::new();
        alloc.register_request(t1.clone(), 2).unwrap();
        alloc.update(now()).unwrap();
        let resource_key = alloc.use_request(&t1).unwrap().unwrap();
        alloc.register_request(t2.clone(), 2).unwrap();
        alloc.update(now()).unwrap();
        assert!(alloc.get_allocated_resource(&t2).is_none());
        alloc.free(&resource_key, 2, now()).unwrap();
        alloc.update(now()).unwrap();
        assert!(alloc.get_allocated_resource(&t2).is_some());
    }

    #[test]
    fn zero_unit_request_allocates_without_consuming_capacity() {
        let mut alloc = allocator_with_capacities(&[1]);
        let t1 = TaskKey::new();
        alloc.register_request(t1.clone(), 0).unwrap();
        alloc.update(now()).unwrap();
        assert!(alloc.get_allocated_resource(&t1).is_some());
        assert_eq!(alloc.ready_usage(), 0);
    }
}
