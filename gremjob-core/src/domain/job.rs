//! Job domain types
//!
//! A job is one schedulable, checkpointable unit of work. The scheduler that
//! created it persists the record; the executing worker mutates the shared
//! [`JobState`] while it runs, and status queries read that same state
//! without waiting for the job to finish.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::time::Duration;
use uuid::Uuid;

use crate::dto::job::JobCheckpoint;

/// Task type tag under which script-query jobs are registered
pub const TASK_TYPE: &str = "gremlin";

/// Capability handle a running script is allowed to use
///
/// This is the complete surface exposed to untrusted script code: it can
/// report progress, read it back, and tune how often the surrounding
/// scheduler may persist a checkpoint. Nothing else of the job is reachable
/// through it.
pub trait JobControl: Send + Sync {
    /// Sets the job's progress counter; visible to status queries immediately
    fn update_progress(&self, progress: i32);

    /// Returns the current progress counter
    fn progress(&self) -> i32;

    /// Records how often the scheduler may persist a checkpoint
    ///
    /// The harness only stores the preference; persistence itself is owned
    /// by the scheduler.
    fn set_min_save_interval(&self, seconds: u64);
}

/// Shared runtime state of a job
///
/// Lock-free so script-driven progress writes never block the worker and are
/// immediately observable from other threads.
#[derive(Debug, Default)]
pub struct JobState {
    progress: AtomicI32,
    min_save_interval_secs: AtomicU64,
}

impl JobState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns the configured minimum interval between persisted checkpoints
    pub fn min_save_interval(&self) -> Duration {
        Duration::from_secs(self.min_save_interval_secs.load(Ordering::Acquire))
    }
}

impl JobControl for JobState {
    fn update_progress(&self, progress: i32) {
        self.progress.store(progress, Ordering::Release);
    }

    fn progress(&self) -> i32 {
        self.progress.load(Ordering::Acquire)
    }

    fn set_min_save_interval(&self, seconds: u64) {
        self.min_save_interval_secs.store(seconds, Ordering::Release);
    }
}

/// Job execution record
///
/// Created by the scheduler before dispatch. The `input` payload stays
/// opaque until the executor decodes it; `state` is shared with whoever
/// answers status queries for this job.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub job_type: &'static str,
    pub input: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub state: Arc<JobState>,
}

impl Job {
    /// Creates a new script-query job around a serialized input payload
    pub fn new(input: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type: TASK_TYPE,
            input,
            created_at: chrono::Utc::now(),
            state: JobState::new(),
        }
    }

    /// Takes a persistable snapshot of the job's current progress
    pub fn checkpoint(&self) -> JobCheckpoint {
        JobCheckpoint {
            id: self.id,
            job_type: self.job_type.to_string(),
            progress: self.state.progress(),
            min_save_interval_secs: self.state.min_save_interval().as_secs(),
            taken_at: chrono::Utc::now(),
        }
    }
}
