// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Resource Manager
//!
//! Aggregates [`ResourceAllocator`]s by alias and fans task-level resource
//! operations out to each alias's allocator. Tasks never address an
//! allocator directly; they request `{alias → units}` and the manager keeps
//! every alias's allocation in lockstep.

use crate::entities::resource::Resource;
use crate::entities::resource_allocator::ResourceAllocator;
use crate::error::{SchedulerError, SchedulerResult};
use crate::ids::{Alias, ResourceKey, TaskKey};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

#[derive(Default)]
pub struct ResourceManager {
    allocators: HashMap<Alias, ResourceAllocator>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_allocator(&mut self, alias: Alias) {
        self.allocators.entry(alias.clone()).or_insert_with(|| ResourceAllocator::new(alias));
    }

    /// Registers a resource under `alias`, creating a default allocator for
    /// that alias if it does not already exist.
    pub fn register_resource(&mut self, resource: Box<dyn Resource>, alias: Alias) {
        self.allocators.entry(alias.clone()).or_insert_with(|| ResourceAllocator::new(alias)).register_resource(resource);
    }

    /// Fans a `{alias -> units}` request out to each alias's allocator.
    pub fn register_request(&mut self, task_key: TaskKey, usage: &HashMap<Alias, u64>) -> SchedulerResult<()> {
        for (alias, &units) in usage {
            let allocator = self
                .allocators
                .get_mut(alias)
                .ok_or_else(|| SchedulerError::invalid_config(format!("no allocator registered for alias {alias}")))?;
            allocator.register_request(task_key.clone(), units)?;
        }
        Ok(())
    }

    /// Returns the full `{alias -> resourceKey}` allocation for a task, or
    /// `None` if any requested alias is not yet allocated.
    pub fn get_allocated_resources(
        &self,
        task_key: &TaskKey,
        usage: &HashMap<Alias, u64>,
    ) -> Option<HashMap<Alias, ResourceKey>> {
        let mut out = HashMap::with_capacity(usage.len());
        for alias in usage.keys() {
            let allocator = self.allocators.get(alias)?;
            let resource_key = allocator.get_allocated_resource(task_key)?;
            out.insert(alias.clone(), resource_key);
        }
        Some(out)
    }

    /// Whether any requested alias can never satisfy the task (its units
    /// exceed every resource's capacity under that alias).
    pub fn is_request_unsatisfiable(&self, usage: &HashMap<Alias, u64>) -> Option<(Alias, u64, u64)> {
        for (alias, &units) in usage {
            if let Some(allocator) = self.allocators.get(alias) {
                if allocator.is_request_unsatisfiable(units) {
                    return Some((alias.clone(), units, allocator.max_resource_capacity()));
                }
            }
        }
        None
    }

    pub fn use_resources(
        &mut self,
        task_key: &TaskKey,
        allocated: &HashMap<Alias, ResourceKey>,
    ) -> SchedulerResult<()> {
        for alias in allocated.keys() {
            let allocator = self
                .allocators
                .get_mut(alias)
                .ok_or_else(|| SchedulerError::internal(format!("no allocator for alias {alias}")))?;
            allocator.use_request(task_key)?;
        }
        Ok(())
    }

    pub fn free_resources(
        &mut self,
        usage: &HashMap<Alias, u64>,
        allocated: &HashMap<Alias, ResourceKey>,
        now: DateTime<Utc>,
    ) -> SchedulerResult<()> {
        for (alias, resource_key) in allocated {
            let units = usage.get(alias).copied().unwrap_or(0);
            let allocator = self
                .allocators
                .get_mut(alias)
                .ok_or_else(|| SchedulerError::internal(format!("no allocator for alias {alias}")))?;
            allocator.free(resource_key, units, now)?;
        }
        Ok(())
    }

    /// Advances every allocator's internal clock and returns the set of
    /// aliases whose state changed (used by the Task Manager to decide
    /// which blocked tasks to reconsider).
    pub fn update(&mut self, now: DateTime<Utc>) -> SchedulerResult<HashSet<Alias>> {
        let mut updated = HashSet::new();
        for (alias, allocator) in self.allocators.iter_mut() {
            if allocator.update(now)? {
                updated.insert(alias.clone());
            }
        }
        Ok(updated)
    }

    pub fn get_time_to_update(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.allocators.values().filter_map(|a| a.time_to_update(now)).min()
    }

    /// Per-alias `(readyUsage, waitingLen)` snapshot, for cosmetic status
    /// rendering only — never consulted by the scheduling algorithm itself.
    pub fn allocator_utilization(&self) -> HashMap<Alias, (u64, usize)> {
        self.allocators.iter().map(|(alias, a)| (alias.clone(), (a.ready_usage(), a.waiting_len()))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::resource::SimpleResource;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn fans_out_across_multiple_aliases() {
        let mut rm = ResourceManager::new();
        rm.register_resource(Box::new(SimpleResource::new(2)), Alias::from("cpu"));
        rm.register_resource(Box::new(SimpleResource::new(1)), Alias::from("gpu"));

        let task_key = TaskKey::new();
        let mut usage = HashMap::new();
        usage.insert(Alias::from("cpu"), 1);
        usage.insert(Alias::from("gpu"), 1);

        rm.register_request(task_key.clone(), &usage).unwrap();
        rm.update(now()).unwrap();
        let allocated = rm.get_allocated_resources(&task_key, &usage).expect("fully allocated");
        assert_eq!(allocated.len(), 2);
    }

    #[test]
    fn partial_allocation_reports_none() {
        let mut rm = ResourceManager::new();
        rm.register_resource(Box::new(SimpleResource::new(1)), Alias::from("cpu"));
        // No allocator at all for "gpu": requesting it should fail up front.
        let task_key = TaskKey::new();
        let mut usage = HashMap::new();
        usage.insert(Alias::from("cpu"), 1);
        usage.insert(Alias::from("gpu"), 1);
        let err = rm.register_request(task_key, &usage).unwrap_err();
        assert_eq!(err.category(), "configuration");
    }

    #[test]
    fn unsatisfiable_request_is_detected() {
        let mut rm = ResourceManager::new();
        rm.register_resource(Box::new(SimpleResource::new(1)), Alias::from("cpu"));
        let mut usage = HashMap::new();
        usage.insert(Alias::from("cpu"), 5);
        assert!(rm.is_request_unsatisfiable(&usage).is_some());
    }
}
