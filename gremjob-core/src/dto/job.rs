//! Wire-level job payloads
//!
//! The input format is owned by the scheduler that enqueues jobs; this
//! module only decodes and validates it before execution starts.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{JobError, Result};

/// Decoded job input payload
///
/// `gremlin` and `bindings` are required; a payload missing either fails
/// decoding before any engine resources are constructed. `language` and
/// `aliases` may be absent.
#[derive(Debug, Clone, Deserialize)]
pub struct JobInput {
    /// Script text to evaluate
    pub gremlin: String,
    /// Name → value bindings made available to the script
    pub bindings: Map<String, Value>,
    /// Script dialect identifier
    #[serde(default)]
    pub language: Option<String>,
    /// Name → name remapping for graph references
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

impl JobInput {
    /// Decodes and validates a serialized input payload
    pub fn decode(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| JobError::MalformedInput(e.to_string()))
    }
}

/// Persistable snapshot of a job's progress
///
/// Handed to the scheduler whenever it decides to checkpoint; the harness
/// never writes these anywhere itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCheckpoint {
    pub id: Uuid,
    pub job_type: String,
    pub progress: i32,
    pub min_save_interval_secs: u64,
    pub taken_at: chrono::DateTime<chrono::Utc>,
}
