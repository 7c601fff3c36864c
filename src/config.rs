//! Engine configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_JOB_PAGE_SIZE, DEFAULT_MAX_PARALLEL_JOBS, DEFAULT_REMOTE_TIMEOUT_MS,
};
use crate::error::{FunctionError, Result};

/// Tunables for the execution engine.
///
/// Typically loaded from a TOML file; every field has a default so a partial
/// file is fine.
///
/// # Example Configuration File
///
/// ```toml
/// max_parallel_jobs = 4
/// remote_timeout_ms = 10000
/// ```
///
/// # Examples
///
/// ```
/// use fnstore::EngineConfig;
///
/// let config = EngineConfig::from_toml("max_parallel_jobs = 4").unwrap();
/// assert_eq!(config.max_parallel_jobs, 4);
/// assert_eq!(config.remote_timeout_ms, 30_000);
/// assert_eq!(config.default_job_page_size, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Worker bound for batch runs that do not specify one.
    #[serde(default = "default_max_parallel_jobs")]
    pub max_parallel_jobs: usize,

    /// Per-request timeout of the remote-network executor.
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,

    /// Limit applied to per-function job listings without an explicit one.
    #[serde(default = "default_job_page_size")]
    pub default_job_page_size: usize,
}

fn default_max_parallel_jobs() -> usize {
    DEFAULT_MAX_PARALLEL_JOBS
}

fn default_remote_timeout_ms() -> u64 {
    DEFAULT_REMOTE_TIMEOUT_MS
}

fn default_job_page_size() -> usize {
    DEFAULT_JOB_PAGE_SIZE
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallel_jobs: default_max_parallel_jobs(),
            remote_timeout_ms: default_remote_timeout_ms(),
            default_job_page_size: default_job_page_size(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FunctionError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| FunctionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the default worker bound.
    pub fn with_max_parallel_jobs(mut self, workers: usize) -> Self {
        self.max_parallel_jobs = workers;
        self
    }

    /// Sets the remote-network timeout in milliseconds.
    pub fn with_remote_timeout_ms(mut self, ms: u64) -> Self {
        self.remote_timeout_ms = ms;
        self
    }

    /// Sets the default page size for per-function job listings.
    pub fn with_default_job_page_size(mut self, size: usize) -> Self {
        self.default_job_page_size = size;
        self
    }

    /// The remote-network timeout as a [`Duration`].
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_parallel_jobs == 0 {
            return Err(FunctionError::Config(
                "max_parallel_jobs must be at least 1".to_string(),
            ));
        }
        if self.default_job_page_size == 0 {
            return Err(FunctionError::Config(
                "default_job_page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
