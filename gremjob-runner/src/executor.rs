//! Job executor
//!
//! Runs one script-query job through its managed lifecycle: decode the
//! payload, hand the script a restricted proxy, lift the storage capacity
//! cap for the duration of the run, drive the engine's lazy result stream
//! under the result-size ceiling, and finish with a fixed-order cleanup
//! chain (restore capacity, release engine resources, commit the
//! transaction) that runs on every exit path.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

use gremjob_core::capacity::{CapacityGuard, QueryCapacity};
use gremjob_core::domain::job::Job;
use gremjob_core::dto::job::JobInput;
use gremjob_core::engine::{GraphTransaction, QueryEngine, QueryRequest, ResultStream};
use gremjob_core::error::Result;

use crate::accumulator::{ResultAccumulator, check_collection_size};
use crate::config::RunnerConfig;

/// Executes one job against a query engine and a graph transaction
pub struct JobExecutor {
    job: Job,
    engine: Arc<dyn QueryEngine>,
    transaction: Arc<dyn GraphTransaction>,
    capacity: QueryCapacity,
    config: RunnerConfig,
}

impl JobExecutor {
    pub fn new(
        job: Job,
        engine: Arc<dyn QueryEngine>,
        transaction: Arc<dyn GraphTransaction>,
        capacity: QueryCapacity,
        config: RunnerConfig,
    ) -> Self {
        Self {
            job,
            engine,
            transaction,
            capacity,
            config,
        }
    }

    /// Runs the job to completion
    ///
    /// Returns either the script's single terminal result or the ordered
    /// sequence of accumulated rows, never both. Every error is terminal
    /// for the job; none are retried or swallowed here.
    pub async fn execute(&self) -> Result<Value> {
        // Input validation happens before any engine or transaction work so
        // a malformed payload leaves no partial side effects behind.
        let input = JobInput::decode(&self.job.input)?;
        debug!(job_id = %self.job.id, "decoded job input");

        let request = QueryRequest {
            script: input.gremlin,
            language: input.language,
            bindings: input.bindings,
            aliases: input.aliases,
            job: self.job.state.clone(),
            capacity: self.capacity.clone(),
        };

        // Declaration order fixes the unwind path: locals drop in reverse,
        // so an aborted execution restores capacity, closes the stream, and
        // commits, same as the explicit chain below.
        let mut commit = CommitGuard::new(Arc::clone(&self.transaction));
        let mut stream: Option<Box<dyn ResultStream>> = None;
        let mut guard = CapacityGuard::unbounded(self.capacity.clone());

        let outcome = self.drive(&mut stream, request).await;

        // Cleanup chain, fixed order, each step attempted even when an
        // earlier one failed. A cleanup failure is logged and surfaced, but
        // never replaces the primary error.
        guard.restore();
        let close_result = match stream.as_mut() {
            Some(stream) => stream.close(),
            None => Ok(()),
        };
        // Committed regardless of outcome: scripts may have storage side
        // effects beyond their return value. Review point — a failed job
        // still persists whatever the script already wrote.
        let commit_result = commit.commit();

        if let Err(e) = &close_result {
            error!(job_id = %self.job.id, error = %e, "failed to release query resources");
        }
        if let Err(e) = &commit_result {
            error!(job_id = %self.job.id, error = %e, "failed to commit graph transaction");
        }

        let results = outcome?;
        close_result?;
        commit_result?;

        if let Some(terminal) = stream.as_ref().and_then(|s| s.terminal()) {
            check_collection_size(&terminal, self.config.max_results)?;
            info!(job_id = %self.job.id, "job produced a terminal result");
            return Ok(terminal);
        }

        info!(job_id = %self.job.id, rows = results.len(), "job produced a row sequence");
        Ok(results.into_value())
    }

    /// Prepares the query and pulls its rows into the accumulator
    async fn drive(
        &self,
        slot: &mut Option<Box<dyn ResultStream>>,
        request: QueryRequest,
    ) -> Result<ResultAccumulator> {
        let stream = slot.insert(self.engine.prepare(request)?);
        let mut results = ResultAccumulator::new(self.config.max_results);

        while let Some(value) = stream.try_next()? {
            results.push(value)?;
            // Fairness on a shared worker pool; not a cancellation point the
            // harness itself acts on.
            tokio::task::yield_now().await;
        }

        Ok(results)
    }
}

/// Commits the job's transaction exactly once
///
/// The explicit [`commit`](CommitGuard::commit) call surfaces the commit
/// error; the `Drop` fallback covers unwinding and task aborts, where the
/// error can only be logged.
struct CommitGuard {
    transaction: Arc<dyn GraphTransaction>,
    committed: bool,
}

impl CommitGuard {
    fn new(transaction: Arc<dyn GraphTransaction>) -> Self {
        Self {
            transaction,
            committed: false,
        }
    }

    fn commit(&mut self) -> Result<()> {
        if self.committed {
            return Ok(());
        }
        self.committed = true;
        self.transaction.commit()
    }
}

impl Drop for CommitGuard {
    fn drop(&mut self) {
        if let Err(e) = self.commit() {
            error!(error = %e, "failed to commit graph transaction during unwind");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gremjob_core::JobControl;
    use gremjob_core::error::JobError;
    use gremjob_lua::LuaQueryEngine;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    use gremjob_core::capacity::NO_CAPACITY;

    /// Call counters shared between a fake engine and the test body
    #[derive(Default)]
    struct Counters {
        prepares: AtomicUsize,
        closes: AtomicUsize,
        commits: AtomicUsize,
        capacity_at_prepare: AtomicU64,
    }

    struct FakeStream {
        rows: VecDeque<Value>,
        terminal: Option<Value>,
        fail_after: Option<usize>,
        pulled: usize,
        closed: bool,
        close_error: bool,
        counters: Arc<Counters>,
    }

    impl ResultStream for FakeStream {
        fn try_next(&mut self) -> Result<Option<Value>> {
            if let Some(n) = self.fail_after
                && self.pulled == n
            {
                return Err(JobError::Evaluation("script runtime failure".into()));
            }
            self.pulled += 1;
            Ok(self.rows.pop_front())
        }

        fn terminal(&self) -> Option<Value> {
            self.terminal.clone()
        }

        fn close(&mut self) -> Result<()> {
            if self.closed {
                return Ok(());
            }
            self.closed = true;
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
            if self.close_error {
                return Err(JobError::Evaluation("close failed".into()));
            }
            Ok(())
        }
    }

    impl Drop for FakeStream {
        fn drop(&mut self) {
            let _ = self.close();
        }
    }

    #[derive(Default)]
    struct FakeEngine {
        rows: Vec<Value>,
        terminal: Option<Value>,
        fail_after: Option<usize>,
        close_error: bool,
        counters: Arc<Counters>,
    }

    impl QueryEngine for FakeEngine {
        fn prepare(&self, request: QueryRequest) -> Result<Box<dyn ResultStream>> {
            self.counters.prepares.fetch_add(1, Ordering::SeqCst);
            self.counters
                .capacity_at_prepare
                .store(request.capacity.get(), Ordering::SeqCst);
            Ok(Box::new(FakeStream {
                rows: self.rows.clone().into(),
                terminal: self.terminal.clone(),
                fail_after: self.fail_after,
                pulled: 0,
                closed: false,
                close_error: self.close_error,
                counters: Arc::clone(&self.counters),
            }))
        }
    }

    struct FakeTransaction {
        counters: Arc<Counters>,
        fail: bool,
    }

    impl GraphTransaction for FakeTransaction {
        fn commit(&self) -> Result<()> {
            self.counters.commits.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(JobError::Commit("storage unavailable".into()));
            }
            Ok(())
        }
    }

    struct Fixture {
        executor: JobExecutor,
        capacity: QueryCapacity,
        counters: Arc<Counters>,
    }

    fn fixture(engine: FakeEngine, commit_fails: bool, counters: Arc<Counters>) -> Fixture {
        fixture_with_input(engine, commit_fails, counters, valid_input())
    }

    fn fixture_with_input(
        engine: FakeEngine,
        commit_fails: bool,
        counters: Arc<Counters>,
        input: String,
    ) -> Fixture {
        let job = Job::new(input);
        let capacity = QueryCapacity::new(500);
        let executor = JobExecutor::new(
            job.clone(),
            Arc::new(engine),
            Arc::new(FakeTransaction {
                counters: Arc::clone(&counters),
                fail: commit_fails,
            }),
            capacity.clone(),
            RunnerConfig::default(),
        );
        Fixture {
            executor,
            capacity,
            counters,
        }
    }

    fn valid_input() -> String {
        r#"{"gremlin": "g.V()", "bindings": {}}"#.to_string()
    }

    fn rows(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!(i)).collect()
    }

    #[tokio::test]
    async fn test_returns_rows_in_production_order() {
        let counters = Arc::new(Counters::default());
        let engine = FakeEngine {
            rows: rows(5),
            counters: Arc::clone(&counters),
            ..Default::default()
        };
        let f = fixture(engine, false, counters);

        let value = f.executor.execute().await.unwrap();
        assert_eq!(value, json!([0, 1, 2, 3, 4]));

        assert_eq!(f.counters.prepares.load(Ordering::SeqCst), 1);
        assert_eq!(f.counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(f.counters.commits.load(Ordering::SeqCst), 1);
        assert_eq!(f.capacity.get(), 500);
    }

    #[tokio::test]
    async fn test_capacity_lifted_while_running() {
        let counters = Arc::new(Counters::default());
        let engine = FakeEngine {
            rows: rows(1),
            counters: Arc::clone(&counters),
            ..Default::default()
        };
        let f = fixture(engine, false, counters);

        f.executor.execute().await.unwrap();

        assert_eq!(
            f.counters.capacity_at_prepare.load(Ordering::SeqCst),
            NO_CAPACITY
        );
        assert_eq!(f.capacity.get(), 500);
    }

    #[tokio::test]
    async fn test_limit_exceeded_discards_partial_rows() {
        let counters = Arc::new(Counters::default());
        let engine = FakeEngine {
            rows: rows(10001),
            counters: Arc::clone(&counters),
            ..Default::default()
        };
        let f = fixture(engine, false, counters);

        let err = f.executor.execute().await.unwrap_err();
        match err {
            JobError::LimitExceeded { size, limit } => {
                assert_eq!(size, 10001);
                assert_eq!(limit, 10000);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Cleanup still ran to completion.
        assert_eq!(f.counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(f.counters.commits.load(Ordering::SeqCst), 1);
        assert_eq!(f.capacity.get(), 500);
    }

    #[tokio::test]
    async fn test_exactly_limit_rows_succeeds() {
        let counters = Arc::new(Counters::default());
        let engine = FakeEngine {
            rows: rows(10000),
            counters: Arc::clone(&counters),
            ..Default::default()
        };
        let f = fixture(engine, false, counters);

        let value = f.executor.execute().await.unwrap();
        assert_eq!(value.as_array().unwrap().len(), 10000);
    }

    #[tokio::test]
    async fn test_missing_bindings_fails_before_engine_construction() {
        let counters = Arc::new(Counters::default());
        let engine = FakeEngine {
            counters: Arc::clone(&counters),
            ..Default::default()
        };
        let f = fixture_with_input(
            engine,
            false,
            counters,
            r#"{"gremlin": "g.V()"}"#.to_string(),
        );

        let err = f.executor.execute().await.unwrap_err();
        assert!(err.is_malformed_input());

        // No engine, no transaction, no capacity swap: zero side effects.
        assert_eq!(f.counters.prepares.load(Ordering::SeqCst), 0);
        assert_eq!(f.counters.commits.load(Ordering::SeqCst), 0);
        assert_eq!(f.capacity.get(), 500);
    }

    #[tokio::test]
    async fn test_terminal_scalar_returned_without_size_check() {
        let counters = Arc::new(Counters::default());
        let engine = FakeEngine {
            terminal: Some(json!("x".repeat(1_000_000))),
            counters: Arc::clone(&counters),
            ..Default::default()
        };
        let f = fixture(engine, false, counters);

        let value = f.executor.execute().await.unwrap();
        assert_eq!(value.as_str().unwrap().len(), 1_000_000);
    }

    #[tokio::test]
    async fn test_terminal_collection_over_limit_rejected() {
        let counters = Arc::new(Counters::default());
        let engine = FakeEngine {
            terminal: Some(Value::Array(vec![json!(0); 10001])),
            counters: Arc::clone(&counters),
            ..Default::default()
        };
        let f = fixture(engine, false, counters);

        let err = f.executor.execute().await.unwrap_err();
        match err {
            JobError::LimitExceeded { size, limit } => {
                assert_eq!(size, 10001);
                assert_eq!(limit, 10000);
            }
            other => panic!("unexpected error: {other}"),
        }

        // The chain had already run when the terminal check fired.
        assert_eq!(f.counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(f.counters.commits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_terminal_value_wins_over_accumulated_rows() {
        let counters = Arc::new(Counters::default());
        let engine = FakeEngine {
            rows: rows(3),
            terminal: Some(json!({"summary": 3})),
            counters: Arc::clone(&counters),
            ..Default::default()
        };
        let f = fixture(engine, false, counters);

        let value = f.executor.execute().await.unwrap();
        assert_eq!(value, json!({"summary": 3}));
    }

    #[tokio::test]
    async fn test_evaluation_error_still_runs_cleanup_chain() {
        let counters = Arc::new(Counters::default());
        let engine = FakeEngine {
            rows: rows(10),
            fail_after: Some(2),
            counters: Arc::clone(&counters),
            ..Default::default()
        };
        let f = fixture(engine, false, counters);

        let err = f.executor.execute().await.unwrap_err();
        assert!(matches!(err, JobError::Evaluation(_)));

        assert_eq!(f.counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(f.counters.commits.load(Ordering::SeqCst), 1);
        assert_eq!(f.capacity.get(), 500);
    }

    #[tokio::test]
    async fn test_commit_failure_surfaces_when_run_succeeded() {
        let counters = Arc::new(Counters::default());
        let engine = FakeEngine {
            rows: rows(2),
            counters: Arc::clone(&counters),
            ..Default::default()
        };
        let f = fixture(engine, true, counters);

        let err = f.executor.execute().await.unwrap_err();
        assert!(matches!(err, JobError::Commit(_)));
        assert_eq!(f.counters.commits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_primary_error_not_replaced_by_cleanup_failures() {
        let counters = Arc::new(Counters::default());
        let engine = FakeEngine {
            rows: rows(10),
            fail_after: Some(1),
            close_error: true,
            counters: Arc::clone(&counters),
            ..Default::default()
        };
        let f = fixture(engine, true, counters);

        // Evaluation failed, close failed, commit failed: the evaluation
        // error is the one reported, and every cleanup step still ran.
        let err = f.executor.execute().await.unwrap_err();
        assert!(matches!(err, JobError::Evaluation(_)));
        assert_eq!(f.counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(f.counters.commits.load(Ordering::SeqCst), 1);
        assert_eq!(f.capacity.get(), 500);
    }

    #[tokio::test]
    async fn test_close_failure_surfaces_when_run_succeeded() {
        let counters = Arc::new(Counters::default());
        let engine = FakeEngine {
            rows: rows(2),
            close_error: true,
            counters: Arc::clone(&counters),
            ..Default::default()
        };
        let f = fixture(engine, false, counters);

        let err = f.executor.execute().await.unwrap_err();
        assert!(matches!(err, JobError::Evaluation(_)));
        // The commit was still attempted after the failed close.
        assert_eq!(f.counters.commits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_progress_visible_to_status_queries_mid_run() {
        // Engine that reports progress through the proxy while producing.
        struct ReportingEngine {
            counters: Arc<Counters>,
        }

        struct ReportingStream {
            job: Arc<dyn gremjob_core::domain::job::JobControl>,
            emitted: usize,
            closed: bool,
            counters: Arc<Counters>,
        }

        impl ResultStream for ReportingStream {
            fn try_next(&mut self) -> Result<Option<Value>> {
                if self.emitted == 4 {
                    return Ok(None);
                }
                self.emitted += 1;
                self.job.update_progress((self.emitted * 25) as i32);
                Ok(Some(json!(self.emitted)))
            }

            fn terminal(&self) -> Option<Value> {
                None
            }

            fn close(&mut self) -> Result<()> {
                if !self.closed {
                    self.closed = true;
                    self.counters.closes.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            }
        }

        impl QueryEngine for ReportingEngine {
            fn prepare(&self, request: QueryRequest) -> Result<Box<dyn ResultStream>> {
                Ok(Box::new(ReportingStream {
                    job: request.job,
                    emitted: 0,
                    closed: false,
                    counters: Arc::clone(&self.counters),
                }))
            }
        }

        let counters = Arc::new(Counters::default());
        let job = Job::new(valid_input());
        let capacity = QueryCapacity::new(500);
        let executor = JobExecutor::new(
            job.clone(),
            Arc::new(ReportingEngine {
                counters: Arc::clone(&counters),
            }),
            Arc::new(FakeTransaction {
                counters: Arc::clone(&counters),
                fail: false,
            }),
            capacity,
            RunnerConfig::default(),
        );

        executor.execute().await.unwrap();
        // The last proxy write is what an external status query reads.
        assert_eq!(job.state.progress(), 100);
    }

    #[tokio::test]
    async fn test_end_to_end_with_lua_engine() {
        let payload = json!({
            "gremlin": r#"
                local i = 0
                gremlinJob:setMinSaveInterval(15)
                return function()
                    i = i + 1
                    if i <= limit then
                        gremlinJob:updateProgress(i * 100 // limit)
                        return {id = i, label = prefix .. i}
                    end
                end
            "#,
            "bindings": {"limit": 3, "prefix": "v"},
            "language": "gremlin-lua"
        })
        .to_string();

        let counters = Arc::new(Counters::default());
        let job = Job::new(payload);
        let capacity = QueryCapacity::new(500);
        let executor = JobExecutor::new(
            job.clone(),
            Arc::new(LuaQueryEngine::new()),
            Arc::new(FakeTransaction {
                counters: Arc::clone(&counters),
                fail: false,
            }),
            capacity.clone(),
            RunnerConfig::default(),
        );

        let value = executor.execute().await.unwrap();
        assert_eq!(
            value,
            json!([
                {"id": 1, "label": "v1"},
                {"id": 2, "label": "v2"},
                {"id": 3, "label": "v3"}
            ])
        );
        assert_eq!(job.state.progress(), 100);
        assert_eq!(
            job.state.min_save_interval(),
            std::time::Duration::from_secs(15)
        );
        assert_eq!(capacity.get(), 500);
        assert_eq!(counters.commits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_jobs_with_scoped_capacity_do_not_race() {
        // Two executions with their own capacity handles restore their own
        // saved values independently.
        let mk = |cap: u64| {
            let counters = Arc::new(Counters::default());
            let engine = FakeEngine {
                rows: rows(50),
                counters: Arc::clone(&counters),
                ..Default::default()
            };
            let job = Job::new(valid_input());
            let capacity = QueryCapacity::new(cap);
            (
                JobExecutor::new(
                    job,
                    Arc::new(engine),
                    Arc::new(FakeTransaction { counters, fail: false }),
                    capacity.clone(),
                    RunnerConfig::default(),
                ),
                capacity,
            )
        };

        let (a, cap_a) = mk(100);
        let (b, cap_b) = mk(200);

        let (ra, rb) = tokio::join!(a.execute(), b.execute());
        ra.unwrap();
        rb.unwrap();

        assert_eq!(cap_a.get(), 100);
        assert_eq!(cap_b.get(), 200);
    }
}
