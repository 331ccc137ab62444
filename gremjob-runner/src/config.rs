//! Runner configuration
//!
//! Defines the configurable limits for job execution: the hard ceiling on
//! result rows and the storage capacity applied to queries running outside
//! a managed job.

/// Hard ceiling on the number of result rows one job may produce
pub const TASK_RESULTS_MAX_SIZE: usize = 10000;

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Maximum number of result rows a job may accumulate before failing
    pub max_results: usize,

    /// Row capacity for storage queries outside a managed job run
    pub query_capacity: u64,
}

impl RunnerConfig {
    /// Creates a new configuration with defaults
    pub fn new() -> Self {
        Self {
            max_results: TASK_RESULTS_MAX_SIZE,
            query_capacity: gremjob_core::QueryCapacity::DEFAULT_CAPACITY,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - MAX_RESULTS (optional, default: 10000)
    /// - QUERY_CAPACITY (optional, default: 800000)
    pub fn from_env() -> anyhow::Result<Self> {
        let max_results = std::env::var("MAX_RESULTS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(TASK_RESULTS_MAX_SIZE);

        let query_capacity = std::env::var("QUERY_CAPACITY")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(gremjob_core::QueryCapacity::DEFAULT_CAPACITY);

        Ok(Self {
            max_results,
            query_capacity,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_results == 0 {
            anyhow::bail!("max_results must be greater than 0");
        }

        if self.query_capacity == 0 {
            anyhow::bail!("query_capacity must be greater than 0");
        }

        Ok(())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new()
    }
}
