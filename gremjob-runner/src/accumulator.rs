//! Result accumulation and the size ceiling
//!
//! Rows are appended one at a time and the count is checked after every
//! append. Once the ceiling is exceeded the job fails and the partial rows
//! are consumed by the error path rather than returned.

use serde_json::Value;

use gremjob_core::error::{JobError, Result};

/// Ordered collection of produced result rows, capped at a fixed limit
#[derive(Debug)]
pub struct ResultAccumulator {
    results: Vec<Value>,
    limit: usize,
}

impl ResultAccumulator {
    pub fn new(limit: usize) -> Self {
        Self {
            results: Vec::new(),
            limit,
        }
    }

    /// Appends a row, then checks the accumulated size against the limit
    pub fn push(&mut self, value: Value) -> Result<()> {
        self.results.push(value);
        if self.results.len() > self.limit {
            return Err(JobError::limit_exceeded(self.results.len(), self.limit));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Consumes the accumulator into the job's ordered result sequence
    pub fn into_value(self) -> Value {
        Value::Array(self.results)
    }
}

/// Size-checks a terminal result when it is collection-shaped
///
/// Only arrays count as sized collections. A scalar (or an object) of any
/// size passes: jobs returning one large non-collection value are never
/// rejected by the capacity check.
pub fn check_collection_size(value: &Value, limit: usize) -> Result<()> {
    if let Value::Array(items) = value
        && items.len() > limit
    {
        return Err(JobError::limit_exceeded(items.len(), limit));
    }
    Ok(())
}
