// /////////////////////////////////////////////////////////////////////////////
// Task Scheduler
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! # Scheduler Configuration
//!
//! Runtime tuning knobs for a `Scheduler`: how many workers to run, whether
//! they execute on threads or (reserved for later) separate processes, and
//! where to bind the metrics exporter. Loaded from a `scheduler.toml` next to
//! the process, falling back to built-in defaults when none is found — the
//! same search-then-default behavior the rest of this workspace uses for its
//! own configuration file.

use std::fs;
use std::path::Path;

use scheduler_domain::SchedulerError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How worker execution is carried out. `Process` is accepted and validated
/// but currently falls back to the thread pool; running task bodies in
/// separate OS processes is out of scope for this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parallelism {
    Thread,
    Process,
}

impl Default for Parallelism {
    fn default() -> Self {
        Parallelism::Thread
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of worker executors to run. Mirrors `maxWorkers`.
    pub max_workers: usize,
    pub parallelism: Parallelism,
    pub log_level: String,
    /// `host:port` the Prometheus exporter listens on, if metrics serving
    /// is wired up by the embedding binary.
    pub metrics_bind_addr: String,
    /// Event channel capacity for the domain-event broadcast.
    pub event_channel_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            parallelism: Parallelism::Thread,
            log_level: "info".to_string(),
            metrics_bind_addr: "127.0.0.1:9898".to_string(),
            event_channel_capacity: 1024,
        }
    }
}

pub struct ConfigService;

impl ConfigService {
    /// Loads configuration from a specific TOML file. Missing file is not an
    /// error: it means "use defaults", logged at `warn` so the fallback is
    /// visible in production logs.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<SchedulerConfig, SchedulerError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "scheduler config file not found, using defaults");
            return Ok(SchedulerConfig::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| SchedulerError::invalid_config(format!("failed to read config file {}: {e}", path.display())))?;
        let config: SchedulerConfig = toml::from_str(&content)
            .map_err(|e| SchedulerError::invalid_config(format!("failed to parse config file {}: {e}", path.display())))?;

        debug!(path = %path.display(), max_workers = config.max_workers, "loaded scheduler config");
        Ok(config)
    }

    /// Searches the current directory and up to three parents for
    /// `scheduler.toml`, falling back to defaults if none is found.
    pub fn load_default() -> Result<SchedulerConfig, SchedulerError> {
        let mut dir = std::env::current_dir()
            .map_err(|e| SchedulerError::invalid_config(format!("failed to get current directory: {e}")))?;

        for _ in 0..4 {
            let candidate = dir.join("scheduler.toml");
            if candidate.exists() {
                return Self::load_from_path(candidate);
            }
            match dir.parent() {
                Some(parent) => dir = parent.to_path_buf(),
                None => break,
            }
        }

        warn!("no scheduler.toml found in current or parent directories, using defaults");
        Ok(SchedulerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = SchedulerConfig::default();
        assert!(config.max_workers > 0);
        assert_eq!(config.parallelism, Parallelism::Thread);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = ConfigService::load_from_path("/nonexistent/path/scheduler.toml").unwrap();
        assert_eq!(config.max_workers, SchedulerConfig::default().max_workers);
    }

    #[test]
    fn parses_a_minimal_toml_document() {
        let dir = std::env::temp_dir().join(format!("scheduler-config-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("scheduler.toml");
        fs::write(
            &path,
            r#"
            max_workers = 8
            parallelism = "thread"
            log_level = "debug"
            metrics_bind_addr = "0.0.0.0:9000"
            event_channel_capacity = 512
            "#,
        )
        .unwrap();

        let config = ConfigService::load_from_path(&path).unwrap();
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.event_channel_capacity, 512);

        let _ = fs::remove_dir_all(&dir);
    }
}
