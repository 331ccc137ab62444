//! Gremjob Runner
//!
//! A worker that executes one script-query job inside a managed lifecycle:
//! bounded result size, script-reported progress, and a guaranteed cleanup
//! chain (capacity restore, engine release, transaction commit) on every
//! exit path.
//!
//! The binary reads a job-input payload from a file named on the command
//! line and runs it through the Lua engine with a local autocommit
//! transaction; a real deployment wires the executor to its own engine,
//! transaction manager, and job queue instead.

mod accumulator;
mod config;
mod executor;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gremjob_core::JobControl;
use gremjob_core::domain::job::Job;
use gremjob_core::engine::GraphTransaction;
use gremjob_core::{QueryCapacity, error::Result as JobResult};
use gremjob_lua::LuaQueryEngine;

use crate::config::RunnerConfig;
use crate::executor::JobExecutor;

/// Transaction for standalone runs with no backing graph store
struct LocalTransaction;

impl GraphTransaction for LocalTransaction {
    fn commit(&self) -> JobResult<()> {
        debug!("committed local transaction");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gremjob_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Gremjob Runner");

    let config = load_config()?;
    info!(
        "Loaded configuration: max_results={}, query_capacity={}",
        config.max_results, config.query_capacity
    );

    let path = std::env::args()
        .nth(1)
        .context("usage: gremjob-runner <job-input.json>")?;
    let payload = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read job input from {path}"))?;

    let job = Job::new(payload);
    info!(job_id = %job.id, job_type = job.job_type, "executing job");

    let executor = JobExecutor::new(
        job.clone(),
        Arc::new(LuaQueryEngine::new()),
        Arc::new(LocalTransaction),
        QueryCapacity::new(config.query_capacity),
        config,
    );

    match executor.execute().await {
        Ok(value) => {
            info!(
                job_id = %job.id,
                progress = job.state.progress(),
                "job completed"
            );
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            error!(job_id = %job.id, error = %e, "job failed");
            Err(e.into())
        }
    }
}

/// Loads configuration from environment variables with fallback to defaults
fn load_config() -> Result<RunnerConfig> {
    match RunnerConfig::from_env() {
        Ok(config) => {
            config.validate()?;
            Ok(config)
        }
        Err(_) => {
            info!("Failed to load config from environment, using defaults");
            let config = RunnerConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}
