// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! End-to-end scenarios against the real Master Process and Worker Pool,
//! covering the scheduler's observable behavior rather than any one
//! module's internals. Each test starts its own `Scheduler`, submits a
//! handful of tasks, and asserts on the futures/timing a caller would
//! actually see.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use scheduler::infrastructure::config::scheduler_config::SchedulerConfig;
use scheduler::Scheduler;
use scheduler_domain::{Alias, SimpleResource};
use serde_json::json;

fn test_scheduler(max_workers: usize) -> Arc<Scheduler> {
    let config = SchedulerConfig { max_workers, ..SchedulerConfig::default() };
    Arc::new(Scheduler::new(config).unwrap())
}

async fn join_async(scheduler: Arc<Scheduler>) {
    let _ = tokio::task::spawn_blocking(move || scheduler.join()).await;
}

/// S1: no resources, one task, `execute_tasks` returns its output.
#[tokio::test]
async fn s1_basic_task_with_no_resources() {
    let scheduler = test_scheduler(2);
    scheduler.start().unwrap();

    let key = scheduler.submit_task(Utc::now(), |_| Ok(json!(7)));
    let output = scheduler.execute_tasks_async(&key, Some(Duration::from_secs(2))).await;
    assert_eq!(output, Some(json!(7)));

    scheduler.stop();
    join_async(scheduler).await;
}

/// S2: capacity-1 resource serializes two 100ms tasks; total wall time is
/// at least the sum of both sleeps, and both complete successfully.
#[tokio::test]
async fn s2_capacity_one_resource_serializes_two_tasks() {
    let scheduler = test_scheduler(4);
    scheduler.add_resource(Box::new(SimpleResource::new(1)), Alias::from("slot"));
    scheduler.start().unwrap();

    let mut usage = HashMap::new();
    usage.insert(Alias::from("slot"), 1);

    let concurrent = Arc::new(AtomicU32::new(0));
    let max_concurrent = Arc::new(AtomicU32::new(0));

    let start = Instant::now();
    let mut keys = Vec::new();
    for _ in 0..2 {
        let concurrent = concurrent.clone();
        let max_concurrent = max_concurrent.clone();
        let usage = usage.clone();
        let key = scheduler.submit(
            scheduler_domain::TaskKey::new(),
            Utc::now(),
            usage,
            1,
            chrono::Duration::zero(),
            0,
            true,
            Box::new(move |_| {
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(100));
                concurrent.fetch_sub(1, Ordering::SeqCst);
                Ok(json!("done"))
            }),
        );
        keys.push(key);
    }

    for key in &keys {
        let output = scheduler.execute_tasks_async(key, Some(Duration::from_secs(2))).await;
        assert_eq!(output, Some(json!("done")));
    }
    let elapsed = start.elapsed();

    assert_eq!(max_concurrent.load(Ordering::SeqCst), 1, "the two tasks must never run concurrently");
    assert!(elapsed >= Duration::from_millis(190), "serialized tasks should take roughly 200ms, took {elapsed:?}");

    scheduler.stop();
    join_async(scheduler).await;
}

/// S3: a `RateLimit([(1s, 2)])` allocator admits 2 tasks immediately, then
/// makes the next 2 wait roughly a full window.
#[tokio::test]
async fn s3_rate_limit_admits_two_then_waits_for_the_window() {
    let scheduler = test_scheduler(4);
    let rate_limit = scheduler_domain::RateLimit::from_window_capacity_pairs(vec![(Duration::from_secs(1), 2)]).unwrap();
    scheduler.add_resource(Box::new(rate_limit), Alias::from("api-calls"));
    scheduler.start().unwrap();

    let mut usage = HashMap::new();
    usage.insert(Alias::from("api-calls"), 1);

    let start = Instant::now();
    let mut keys = Vec::new();
    for i in 0..4 {
        let key = scheduler.submit(
            scheduler_domain::TaskKey::new(),
            Utc::now(),
            usage.clone(),
            1,
            chrono::Duration::zero(),
            0,
            true,
            Box::new(move |_| Ok(json!(i))),
        );
        keys.push(key);
    }

    for key in &keys[..2] {
        let output = scheduler.execute_tasks_async(key, Some(Duration::from_millis(500))).await;
        assert!(output.is_some(), "first two tasks should admit immediately");
    }
    let first_pair_elapsed = start.elapsed();
    assert!(first_pair_elapsed < Duration::from_millis(500), "first pair should not wait for the rate window");

    for key in &keys[2..] {
        let output = scheduler.execute_tasks_async(key, Some(Duration::from_secs(3))).await;
        assert!(output.is_some(), "later tasks should eventually admit once the window frees capacity");
    }
    let all_elapsed = start.elapsed();
    assert!(all_elapsed >= Duration::from_millis(900), "second pair should wait roughly a full window, took {all_elapsed:?}");

    scheduler.stop();
    join_async(scheduler).await;
}

/// S4: a task that fails twice then succeeds resolves with the successful
/// output and reports exactly one completed run.
#[tokio::test]
async fn s4_retry_then_success() {
    let scheduler = test_scheduler(2);
    scheduler.start().unwrap();

    let attempts = Arc::new(AtomicU32::new(0));
    let attempts_for_body = attempts.clone();
    let key = scheduler.submit(
        scheduler_domain::TaskKey::new(),
        Utc::now(),
        HashMap::new(),
        1,
        chrono::Duration::zero(),
        2,
        false,
        Box::new(move |_| {
            let attempt = attempts_for_body.fetch_add(1, Ordering::SeqCst);
            if attempt < 2 {
                Err("not yet".to_string())
            } else {
                Ok(json!(42))
            }
        }),
    );

    let output = scheduler.execute_tasks_async(&key, Some(Duration::from_secs(2))).await;
    assert_eq!(output, Some(json!(42)));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    scheduler.stop();
    join_async(scheduler).await;
}

/// S5: a task that repeats 3 times has its start times spaced by at least
/// `repeatFreq`, and its future resolves with the final run's output.
#[tokio::test]
async fn s5_repeat_spaces_successive_runs() {
    let scheduler = test_scheduler(2);
    scheduler.start().unwrap();

    let run_times: Arc<std::sync::Mutex<Vec<Instant>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
    let run_times_for_body = run_times.clone();

    let key = scheduler.submit(
        scheduler_domain::TaskKey::new(),
        Utc::now(),
        HashMap::new(),
        3,
        chrono::Duration::milliseconds(200),
        0,
        true,
        Box::new(move |_| {
            let mut times = run_times_for_body.lock().unwrap();
            times.push(Instant::now());
            Ok(json!(times.len()))
        }),
    );

    // Poll until the task has retired (active_tasks_count would otherwise
    // stay 1 through every repeat; executeTasks only ever sees the latest run).
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if run_times.lock().unwrap().len() >= 3 || Instant::now() > deadline {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let times = run_times.lock().unwrap().clone();
    assert_eq!(times.len(), 3, "task should have run exactly 3 times");
    for pair in times.windows(2) {
        assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(180), "gaps between repeats should be >= repeatFreq");
    }

    let output = scheduler.execute_tasks_async(&key, Some(Duration::from_millis(200))).await;
    assert_eq!(output, Some(json!(3)));

    scheduler.stop();
    join_async(scheduler).await;
}

/// S6: a capacity-1 resource blocks a later task until the first frees it.
#[tokio::test]
async fn s6_blocked_then_unblocked() {
    let scheduler = test_scheduler(4);
    scheduler.add_resource(Box::new(SimpleResource::new(1)), Alias::from("slot"));
    scheduler.start().unwrap();

    let mut usage = HashMap::new();
    usage.insert(Alias::from("slot"), 1);

    let start = Instant::now();
    let blocker_usage = usage.clone();
    let blocker_key = scheduler.submit(
        scheduler_domain::TaskKey::new(),
        Utc::now(),
        blocker_usage,
        1,
        chrono::Duration::zero(),
        0,
        true,
        Box::new(|_| {
            std::thread::sleep(Duration::from_millis(500));
            Ok(json!("blocker-done"))
        }),
    );

    tokio::time::sleep(Duration::from_millis(100)).await;

    let waiter_key = scheduler.submit(
        scheduler_domain::TaskKey::new(),
        Utc::now(),
        usage,
        1,
        chrono::Duration::zero(),
        0,
        true,
        Box::new(|_| Ok(json!("waiter-done"))),
    );

    let waiter_state_while_blocked = scheduler.state().task_manager.lock().task_state(&waiter_key).cloned();
    assert!(
        matches!(waiter_state_while_blocked, Some(scheduler_domain::TaskState::Blocked(_))),
        "waiter should be BLOCKED while the resource is held: {waiter_state_while_blocked:?}"
    );

    let blocker_output = scheduler.execute_tasks_async(&blocker_key, Some(Duration::from_secs(2))).await;
    assert_eq!(blocker_output, Some(json!("blocker-done")));

    let waiter_output = scheduler.execute_tasks_async(&waiter_key, Some(Duration::from_secs(2))).await;
    assert_eq!(waiter_output, Some(json!("waiter-done")));

    let total_elapsed = start.elapsed();
    assert!(total_elapsed >= Duration::from_millis(450), "total duration should be roughly the blocker's 500ms, took {total_elapsed:?}");

    scheduler.stop();
    join_async(scheduler).await;
}

/// Invariant 3/4 (monotone progress / unblocking): submitting a batch with
/// no contention drains to zero active tasks.
#[tokio::test]
async fn invariant_unconstrained_batch_drains_to_idle() {
    let scheduler = test_scheduler(4);
    scheduler.start().unwrap();

    for i in 0..10 {
        scheduler.submit_task(Utc::now(), move |_| Ok(json!(i)));
    }
    let scheduler_for_wait = scheduler.clone();
    tokio::task::spawn_blocking(move || scheduler_for_wait.wait_until_idle()).await.unwrap();
    assert_eq!(scheduler.active_tasks_count(), 0);

    scheduler.stop();
    join_async(scheduler).await;
}

/// Invariant 6/7 (idempotent completion / at-most-once execution): a
/// one-shot task's body runs exactly once even if `execute_tasks` is
/// polled from multiple places.
#[tokio::test]
async fn invariant_one_shot_task_body_runs_exactly_once() {
    let scheduler = test_scheduler(2);
    scheduler.start().unwrap();

    let run_count = Arc::new(AtomicU32::new(0));
    let run_count_for_body = run_count.clone();
    let key = scheduler.submit_task(Utc::now(), move |_| {
        run_count_for_body.fetch_add(1, Ordering::SeqCst);
        Ok(json!("ran"))
    });

    let a = scheduler.execute_tasks_async(&key, Some(Duration::from_secs(2))).await;
    let b = scheduler.execute_tasks_async(&key, Some(Duration::from_millis(50))).await;
    assert_eq!(a, Some(json!("ran")));
    assert_eq!(b, Some(json!("ran")));
    assert_eq!(run_count.load(Ordering::SeqCst), 1);

    scheduler.stop();
    join_async(scheduler).await;
}
