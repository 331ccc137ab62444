//! Gremjob Core
//!
//! Core types and abstractions for the gremjob execution harness.
//!
//! This crate contains:
//! - Domain types: the job record and its shared runtime state
//! - DTOs: the wire-level job input and checkpoint snapshots
//! - Error taxonomy shared by the engine and the harness
//! - The per-execution query capacity setting and its guard
//! - Contracts for the query engine and the graph transaction

pub mod capacity;
pub mod domain;
pub mod dto;
pub mod engine;
pub mod error;

pub use capacity::{CapacityGuard, NO_CAPACITY, QueryCapacity};
pub use domain::job::{Job, JobControl, JobState, TASK_TYPE};
pub use dto::job::{JobCheckpoint, JobInput};
pub use engine::{GraphTransaction, QueryEngine, QueryRequest, RESERVED_BINDING, ResultStream};
pub use error::{JobError, Result};
