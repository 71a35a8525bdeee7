// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Scheduler Demo
//!
//! A small standalone binary exercising the scheduler end to end: parses
//! CLI flags, loads configuration, starts the Master Process and Worker
//! Pool, submits a handful of tasks across a couple of resource aliases,
//! waits for a signal (or for the demo workload to drain), and shuts down
//! cleanly. Mirrors the teacher's `main.rs` bootstrap sequence — parse CLI,
//! install tracing, build the runtime-backed service, run it to completion,
//! map the result to an exit code — scaled to a scheduler rather than a
//! processing pipeline.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use scheduler::application::use_cases::submit_task::{submit_task, SubmitTaskRequest};
use scheduler::infrastructure::config::scheduler_config::{ConfigService, Parallelism as SchedulerParallelism, SchedulerConfig};
use scheduler::infrastructure::logging;
use scheduler::presentation::snapshot::{render_snapshot, render_summary_line};
use scheduler::Scheduler;
use scheduler_bootstrap::cli::Parallelism as CliParallelism;
use scheduler_bootstrap::logger::{BootstrapLogger, ConsoleLogger};
use scheduler_bootstrap::shutdown::ShutdownCoordinator;
use scheduler_bootstrap::signals::create_signal_handler;
use scheduler_bootstrap::{bootstrap_cli, result_to_exit_code, ExitCode, ValidatedCli};
use serde_json::json;

fn main() -> std::process::ExitCode {
    let bootstrap_logger = ConsoleLogger::new();

    let cli = match bootstrap_cli() {
        Ok(cli) => cli,
        Err(err) => {
            bootstrap_logger.error(&format!("CLI validation failed: {err}"));
            return std::process::ExitCode::from(ExitCode::UsageError.as_i32() as u8);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            bootstrap_logger.error(&format!("failed to build the demo's own async runtime: {err}"));
            return std::process::ExitCode::from(ExitCode::OsError.as_i32() as u8);
        }
    };

    let result = runtime.block_on(run_demo(cli, &bootstrap_logger));
    result_to_exit_code(result)
}

async fn run_demo(cli: ValidatedCli, bootstrap_logger: &ConsoleLogger) -> Result<(), scheduler_domain::SchedulerError> {
    let mut config = match &cli.config {
        Some(path) => ConfigService::load_from_path(path)?,
        None => ConfigService::load_default()?,
    };
    if let Some(max_workers) = cli.max_workers {
        config.max_workers = max_workers;
    }
    config.parallelism = match cli.parallelism {
        CliParallelism::Thread => SchedulerParallelism::Thread,
        CliParallelism::Process => SchedulerParallelism::Process,
    };
    if cli.verbose {
        config.log_level = "debug".to_string();
    }

    logging::init_tracing(&config.log_level)?;
    bootstrap_logger.info(&format!("starting demo with {} workers", config.max_workers));

    let scheduler = Arc::new(Scheduler::new(config)?);
    scheduler.set_description("scheduler-demo");
    scheduler.add_resource(Box::new(scheduler_domain::SimpleResource::new(2)), scheduler_domain::Alias::from("cpu-slot"));

    scheduler.start()?;

    let mut submitted = Vec::new();
    for i in 0..5 {
        let mut usage = std::collections::HashMap::new();
        usage.insert(scheduler_domain::Alias::from("cpu-slot"), 1);
        let request = SubmitTaskRequest { start_time: Utc::now(), resource_usage: usage, ..SubmitTaskRequest::default() };
        let key = submit_task(&scheduler, request, move |_ctx| {
            tracing::info!(task = i, "demo task running");
            Ok(json!({ "task_index": i }))
        });
        submitted.push(key);
    }

    let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
    let signal_handler = create_signal_handler();
    let coordinator_for_signal = coordinator.clone();
    let signal_task = tokio::spawn(async move {
        signal_handler.wait_for_signal(Box::new(move || coordinator_for_signal.initiate_shutdown())).await;
    });

    let scheduler_for_wait = scheduler.clone();
    let drain_task = tokio::task::spawn_blocking(move || scheduler_for_wait.wait_until_idle());

    tokio::select! {
        _ = coordinator.token().cancelled() => {
            bootstrap_logger.info("shutdown signal received");
        }
        result = drain_task => {
            if let Err(err) = result {
                bootstrap_logger.warn(&format!("demo workload task panicked: {err}"));
            }
            bootstrap_logger.info("demo workload drained");
        }
    }

    let snapshot = render_snapshot(&scheduler);
    bootstrap_logger.info(&render_summary_line(&snapshot));

    scheduler.stop();
    let scheduler_for_join = scheduler.clone();
    let _ = tokio::task::spawn_blocking(move || scheduler_for_join.join()).await;
    signal_task.abort();

    Ok(())
}
