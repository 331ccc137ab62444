//! Error types shared by the harness and its collaborators

use thiserror::Error;

/// Result type alias for job execution operations
pub type Result<T> = std::result::Result<T, JobError>;

/// Errors that terminate a job
///
/// None of these are retried by the harness; all of them become the job's
/// terminal failure state as reported to the surrounding scheduler.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job's input payload is missing a required field or is not a
    /// well-formed mapping
    #[error("malformed job input: {0}")]
    MalformedInput(String),

    /// The job produced more result rows than the configured ceiling allows
    #[error("job results size {size} has exceeded the max limit {limit}")]
    LimitExceeded {
        /// Observed result count at the point of failure
        size: usize,
        /// Configured maximum result count
        limit: usize,
    },

    /// The script engine failed while evaluating the submitted script
    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    /// The enclosing graph transaction failed to commit
    #[error("transaction commit failed: {0}")]
    Commit(String),
}

impl JobError {
    /// Create a limit error from the observed size and the configured limit
    pub fn limit_exceeded(size: usize, limit: usize) -> Self {
        Self::LimitExceeded { size, limit }
    }

    /// Check if this error is the result-size ceiling being hit
    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, Self::LimitExceeded { .. })
    }

    /// Check if this error is an input validation failure
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Self::MalformedInput(_))
    }
}
