// Job manager configuration

use super::constants::*;
use crate::error::{JobError, Result};
use serde::{Deserialize, Serialize};

/// Worker pool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobManagerConfig {
    /// Maximum number of jobs executing concurrently
    pub worker_threads: usize,
    /// Worker threads are named `<prefix>-<n>`
    pub thread_name_prefix: String,
    /// How long `shutdown` waits for running work
    pub shutdown_timeout_ms: u64,
}

impl Default for JobManagerConfig {
    fn default() -> Self {
        Self {
            worker_threads: DEFAULT_WORKER_THREADS,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl JobManagerConfig {
    /// Defaults overridden by `CONDUIT_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_WORKER_THREADS) {
            config.worker_threads = parse_var(ENV_WORKER_THREADS, &value)?;
        }
        if let Some(value) = lookup(ENV_THREAD_NAME_PREFIX) {
            config.thread_name_prefix = value;
        }
        if let Some(value) = lookup(ENV_SHUTDOWN_TIMEOUT_MS) {
            config.shutdown_timeout_ms = parse_var(ENV_SHUTDOWN_TIMEOUT_MS, &value)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(JobError::Validation(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err(JobError::Validation(
                "thread_name_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<V: std::str::FromStr>(key: &str, value: &str) -> Result<V> {
    value
        .trim()
        .parse()
        .map_err(|_| JobError::Validation(format!("{} has an invalid value: {:?}", key, value)))
}
