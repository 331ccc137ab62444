//! Contracts between the harness and its external collaborators
//!
//! The harness drives a pull-based result stream produced by a query engine
//! and commits a graph transaction when it is done. Both collaborators sit
//! behind object-safe traits so the executor can be tested against fakes and
//! wired to any engine/storage pairing.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::capacity::QueryCapacity;
use crate::domain::job::JobControl;
use crate::error::Result;

/// Reserved bindings key under which the job proxy is exposed to scripts
///
/// A caller-supplied binding with this name is overwritten.
pub const RESERVED_BINDING: &str = "gremlinJob";

/// Everything an engine needs to prepare one query execution
///
/// The proxy handle and the capacity setting travel with the request: the
/// bindings map crosses a serialization boundary and cannot carry live
/// objects, so the engine is responsible for exposing the proxy to the
/// script under [`RESERVED_BINDING`].
pub struct QueryRequest {
    /// Script text to evaluate
    pub script: String,
    /// Script dialect identifier, when the payload named one
    pub language: Option<String>,
    /// Name → value bindings exposed to the script
    pub bindings: Map<String, Value>,
    /// Name → name remapping for graph references
    pub aliases: HashMap<String, String>,
    /// Capability handle the script may use to report progress
    pub job: Arc<dyn JobControl>,
    /// Execution-scoped capacity setting for the underlying storage queries
    pub capacity: QueryCapacity,
}

/// Query engine collaborator
pub trait QueryEngine: Send + Sync {
    /// Prepares a query execution, returning its lazy result stream
    fn prepare(&self, request: QueryRequest) -> Result<Box<dyn ResultStream>>;
}

/// Lazy, finite sequence of values produced by one query execution
pub trait ResultStream: Send {
    /// Pulls the next produced value, `None` when the sequence is exhausted
    fn try_next(&mut self) -> Result<Option<Value>>;

    /// Single terminal result, if the script produced one instead of a
    /// stream of rows
    ///
    /// Still readable after [`close`](ResultStream::close).
    fn terminal(&self) -> Option<Value>;

    /// Releases the execution's resources
    ///
    /// Idempotent; implementations also close on drop so an aborted
    /// execution cannot leak engine state.
    fn close(&mut self) -> Result<()>;
}

impl std::fmt::Debug for dyn ResultStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ResultStream")
    }
}

/// Graph transaction collaborator
///
/// Owned exclusively by the executing job and committed exactly once when
/// the job ends, whatever the outcome.
pub trait GraphTransaction: Send + Sync {
    fn commit(&self) -> Result<()>;
}
