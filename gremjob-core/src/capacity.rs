//! Per-query result capacity setting
//!
//! The storage engine caps how many rows a single query may produce. While a
//! managed job runs, that cap is lifted (the job enforces its own result
//! ceiling instead) and the prior value is put back when the job ends, no
//! matter how it ends.
//!
//! The setting is a cloneable handle scoped to one execution context and
//! threaded explicitly through engine construction. A process-wide default
//! handle exists for deployments where the scheduler guarantees at most one
//! job executes per process; concurrent executions must each carry their own
//! handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Sentinel meaning "no artificial cap beyond the job's own limit"
pub const NO_CAPACITY: u64 = u64::MAX;

/// Shared handle to a per-query row capacity setting
#[derive(Debug, Clone)]
pub struct QueryCapacity {
    value: Arc<AtomicU64>,
}

impl QueryCapacity {
    pub fn new(capacity: u64) -> Self {
        Self {
            value: Arc::new(AtomicU64::new(capacity)),
        }
    }

    /// Process-wide default handle
    ///
    /// Compatibility shim for single-job-per-process schedulers; every call
    /// returns a handle to the same underlying setting.
    pub fn process_default() -> Self {
        static DEFAULT: OnceLock<QueryCapacity> = OnceLock::new();
        DEFAULT
            .get_or_init(|| QueryCapacity::new(Self::DEFAULT_CAPACITY))
            .clone()
    }

    /// Default cap applied to queries running outside a managed job
    pub const DEFAULT_CAPACITY: u64 = 800_000;

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    /// Installs a new capacity value, returning the previous one
    pub fn set(&self, capacity: u64) -> u64 {
        self.value.swap(capacity, Ordering::AcqRel)
    }
}

impl Default for QueryCapacity {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

/// Scoped override of a [`QueryCapacity`] setting
///
/// Saves the prior value on construction and restores it exactly once:
/// either through an explicit [`restore`](CapacityGuard::restore) call or,
/// failing that, on drop. Drop-based restoration also covers unwinding and
/// task aborts.
#[derive(Debug)]
pub struct CapacityGuard {
    setting: QueryCapacity,
    previous: u64,
    restored: bool,
}

impl CapacityGuard {
    /// Lifts the cap for the duration of the guard
    pub fn unbounded(setting: QueryCapacity) -> Self {
        let previous = setting.set(NO_CAPACITY);
        Self {
            setting,
            previous,
            restored: false,
        }
    }

    /// Puts the saved value back
    ///
    /// Idempotent: the second and later calls (including the implicit one in
    /// `Drop`) are no-ops.
    pub fn restore(&mut self) {
        if !self.restored {
            self.setting.set(self.previous);
            self.restored = true;
        }
    }
}

impl Drop for CapacityGuard {
    fn drop(&mut self) {
        self.restore();
    }
}
