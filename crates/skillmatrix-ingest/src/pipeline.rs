//! The batch ingestion pipeline.
//!
//! `RECEIVED -> VALIDATING -> CHUNKING -> DISPATCHING(i) -> WAITING(i) ->
//! AGGREGATING -> COMPLETED`, or `VALIDATING -> REJECTED -> FAILED` when the
//! input does not match the record contract. Validation runs before the queue
//! is touched, so a rejected batch never dispatches a chunk.
//!
//! Chunk-level failures (timeout, failed or lost job, chunks left undispatched
//! after a queue failure) become error entries for that chunk. The batch only
//! fails outright if the queue fails before any chunk produced a result.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use skillmatrix_core::{
    validate_schema, BatchId, BatchStage, BatchSummary, ChunkPlan, CoreError, JobResult,
    RawRecord, RequiredFieldSet,
};

use crate::queue::{JobHandle, QueueConnection};
use crate::{
    CompletionWaiter, DispatchMode, Dispatcher, IngestConfig, IngestError, IngestStats,
    QueueError, QueuePool, WaitError,
};

/// Runs batches of user records through validation, chunked dispatch and
/// aggregation.
pub struct BatchIngestor {
    pool: Arc<QueuePool>,
    config: IngestConfig,
    required: RequiredFieldSet,
    stats: Arc<IngestStats>,
}

/// Per-chunk results gathered during dispatch, in chunk order.
#[derive(Default)]
struct Collected {
    results: Vec<JobResult>,
    resolved: usize,
    /// Labels of chunks handed to the queue.
    submitted: Vec<String>,
    queue_error: Option<QueueError>,
}

impl Collected {
    fn record_wait(
        &mut self,
        handle: &JobHandle,
        outcome: Result<JobResult, WaitError>,
        stats: &IngestStats,
    ) {
        match outcome {
            Ok(result) => {
                self.resolved += 1;
                self.results.push(result);
            }
            Err(e) => {
                stats.chunk_unresolved();
                warn!(
                    job_id = %e.job_id(),
                    chunk_index = handle.chunk_index(),
                    records = handle.record_count(),
                    error = %e,
                    "Chunk unresolved"
                );
                self.results.push(JobResult::unresolved(
                    handle.label(),
                    handle.record_count(),
                    e.to_string(),
                ));
            }
        }
    }

    fn record_undispatched(&mut self, label: String, record_count: usize, error: &QueueError) {
        self.results.push(JobResult::unresolved(
            label,
            record_count,
            format!("not dispatched: {}", error),
        ));
    }
}

impl BatchIngestor {
    /// Create an ingestor for user records.
    pub fn new(pool: Arc<QueuePool>, config: IngestConfig) -> Self {
        Self {
            pool,
            config,
            required: RequiredFieldSet::user_records(),
            stats: Arc::new(IngestStats::new()),
        }
    }

    /// Builder method to replace the required field contract.
    pub fn with_required_fields(mut self, required: RequiredFieldSet) -> Self {
        self.required = required;
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn required_fields(&self) -> &RequiredFieldSet {
        &self.required
    }

    pub fn stats(&self) -> &Arc<IngestStats> {
        &self.stats
    }

    /// Ingest one batch and summarise the per-chunk outcomes.
    pub async fn ingest(&self, records: &[RawRecord]) -> Result<BatchSummary, IngestError> {
        let batch_id = BatchId::generate();
        let mut stage = BatchStage::Received;

        info!(batch_id = %batch_id, records = records.len(), "Batch received");

        let outcome = self.run(&batch_id, records, &mut stage).await;

        match &outcome {
            Ok(summary) => {
                self.stats
                    .batch_completed(summary.total_success, summary.total_errors);
                info!(
                    batch_id = %batch_id,
                    success = summary.total_success,
                    errors = summary.total_errors,
                    "Batch completed"
                );
            }
            Err(e) => {
                if stage == BatchStage::Rejected {
                    self.stats.batch_rejected();
                } else {
                    self.stats.batch_failed();
                }
                let failed_at = stage;
                if let Err(transition) = stage.advance(BatchStage::Failed) {
                    warn!(batch_id = %batch_id, error = %transition, "Batch stage not updated");
                }
                warn!(
                    batch_id = %batch_id,
                    failed_at = %failed_at,
                    stage = %stage,
                    error = %e,
                    "Batch failed"
                );
            }
        }

        outcome
    }

    async fn run(
        &self,
        batch_id: &BatchId,
        records: &[RawRecord],
        stage: &mut BatchStage,
    ) -> Result<BatchSummary, IngestError> {
        advance(stage, BatchStage::Validating, batch_id)?;
        if let Err(e) = validate_schema(records, &self.required, self.config.schema_check) {
            advance(stage, BatchStage::Rejected, batch_id)?;
            return Err(e.into());
        }

        advance(stage, BatchStage::Chunking, batch_id)?;
        let plan = ChunkPlan::new(records, self.config.max_chunk_size)?;
        debug!(
            batch_id = %batch_id,
            chunks = plan.len(),
            chunk_size = plan.chunk_size(),
            "Batch chunked"
        );

        let mut lease = self.pool.checkout().await?;
        let collected = match self.config.dispatch_mode {
            DispatchMode::Sequential => {
                self.dispatch_sequential(batch_id, plan, lease.connection(), stage)
                    .await
            }
            DispatchMode::FanOut => {
                self.dispatch_fan_out(batch_id, plan, lease.connection(), stage)
                    .await
            }
        };
        lease.release().await;
        let collected = collected?;

        if let Some(e) = collected.queue_error {
            if collected.resolved == 0 {
                if !collected.submitted.is_empty() {
                    warn!(
                        batch_id = %batch_id,
                        submitted = collected.submitted.len(),
                        "Queue failed with jobs in flight; their outcome is unknown"
                    );
                }
                return Err(IngestError::QueueUnavailable {
                    source: e,
                    in_flight: collected.submitted,
                });
            }
        }

        advance(stage, BatchStage::Aggregating, batch_id)?;
        let summary = BatchSummary::aggregate(&collected.results);
        advance(stage, BatchStage::Completed, batch_id)?;

        Ok(summary)
    }

    /// Dispatch chunk i, wait for it, then move on to chunk i + 1.
    async fn dispatch_sequential(
        &self,
        batch_id: &BatchId,
        plan: ChunkPlan<'_>,
        connection: &mut dyn QueueConnection,
        stage: &mut BatchStage,
    ) -> Result<Collected, CoreError> {
        let waiter = CompletionWaiter::new(self.config.job_timeout);
        let mut dispatcher = Dispatcher::new(self.config.job_name.as_str());
        let mut collected = Collected::default();

        let mut chunks = plan.iter();
        while let Some(chunk) = chunks.next() {
            advance(stage, BatchStage::Dispatching(chunk.index), batch_id)?;
            let (label, count) = (chunk.label(), chunk.len());

            let mut handle = match dispatcher.dispatch(connection, chunk).await {
                Ok(handle) => handle,
                Err(e) => {
                    collected.record_undispatched(label, count, &e);
                    for rest in chunks.by_ref() {
                        collected.record_undispatched(rest.label(), rest.len(), &e);
                    }
                    collected.queue_error = Some(e);
                    break;
                }
            };
            self.stats.chunk_dispatched();
            collected.submitted.push(handle.label().to_string());

            advance(stage, BatchStage::Waiting(handle.chunk_index()), batch_id)?;
            let outcome = waiter.wait(&mut handle).await;
            collected.record_wait(&handle, outcome, &self.stats);
        }

        Ok(collected)
    }

    /// Dispatch every chunk first, then wait for all of them concurrently.
    /// Results are still ordered by chunk index.
    async fn dispatch_fan_out(
        &self,
        batch_id: &BatchId,
        plan: ChunkPlan<'_>,
        connection: &mut dyn QueueConnection,
        stage: &mut BatchStage,
    ) -> Result<Collected, CoreError> {
        let waiter = CompletionWaiter::new(self.config.job_timeout);
        let mut dispatcher = Dispatcher::new(self.config.job_name.as_str());
        let mut handles: Vec<JobHandle> = Vec::with_capacity(plan.len());
        let mut undispatched = Collected::default();

        let mut chunks = plan.iter();
        while let Some(chunk) = chunks.next() {
            advance(stage, BatchStage::Dispatching(chunk.index), batch_id)?;
            let (label, count) = (chunk.label(), chunk.len());

            match dispatcher.dispatch(connection, chunk).await {
                Ok(handle) => {
                    self.stats.chunk_dispatched();
                    handles.push(handle);
                }
                Err(e) => {
                    undispatched.record_undispatched(label, count, &e);
                    for rest in chunks.by_ref() {
                        undispatched.record_undispatched(rest.label(), rest.len(), &e);
                    }
                    undispatched.queue_error = Some(e);
                    break;
                }
            }
        }

        if let Some(last) = handles.last() {
            advance(stage, BatchStage::Waiting(last.chunk_index()), batch_id)?;
        }

        let outcomes = join_all(handles.iter_mut().map(|handle| waiter.wait(handle))).await;

        let mut collected = Collected {
            submitted: handles.iter().map(|h| h.label().to_string()).collect(),
            queue_error: undispatched.queue_error,
            ..Collected::default()
        };
        for (handle, outcome) in handles.iter().zip(outcomes) {
            collected.record_wait(handle, outcome, &self.stats);
        }
        collected.results.extend(undispatched.results);

        Ok(collected)
    }
}

fn advance(stage: &mut BatchStage, next: BatchStage, batch_id: &BatchId) -> Result<(), CoreError> {
    stage.advance(next)?;
    debug!(batch_id = %batch_id, stage = %next, "Batch stage");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;
    use skillmatrix_core::record::USER_FIELDS;
    use skillmatrix_core::{Chunk, Job, RecordError};
    use tokio::sync::oneshot;

    use crate::queue::{JobOutcome, QueueBackend};
    use crate::{MemoryQueue, MemoryRecordStore, RecordStore, WorkerPool, WorkerSettings};

    fn user(i: usize) -> RawRecord {
        USER_FIELDS
            .iter()
            .fold(RawRecord::new(), |record, field| match *field {
                "userId" => record.with_field(*field, format!("U-{}", i)),
                "email" => record.with_field(*field, format!("user{}@example.com", i)),
                "isActive" => record.with_field(*field, true),
                _ => record.with_field(*field, format!("{}-{}", field, i)),
            })
    }

    fn users(n: usize) -> Vec<RawRecord> {
        (0..n).map(user).collect()
    }

    fn config(max_chunk_size: usize, dispatch_mode: DispatchMode) -> IngestConfig {
        IngestConfig {
            max_chunk_size,
            dispatch_mode,
            ..IngestConfig::default()
        }
    }

    struct Harness {
        ingestor: BatchIngestor,
        store: Arc<MemoryRecordStore>,
        queue: MemoryQueue,
    }

    fn harness(config: IngestConfig) -> Harness {
        let (queue, receiver) = MemoryQueue::new(64);
        let store = Arc::new(MemoryRecordStore::new());
        WorkerPool::spawn(receiver, store.clone(), WorkerSettings::default());
        let pool = Arc::new(QueuePool::start(
            Arc::new(queue.clone()),
            config.queue_name.clone(),
            config.max_queue_connections,
        ));
        Harness {
            ingestor: BatchIngestor::new(pool, config),
            store,
            queue,
        }
    }

    /// Scripted outcome for one enqueue on [`ScriptedQueue`].
    #[derive(Clone)]
    enum Script {
        /// Report success for every record of the chunk.
        Succeed,
        /// Never report anything.
        Hang,
        /// Refuse the enqueue.
        Refuse,
        /// Report one record error `error` after `delay`, the rest as
        /// successes.
        Report {
            delay: Duration,
            error: &'static str,
        },
    }

    /// Queue whose enqueues follow a script, recording sizes and closes.
    #[derive(Clone, Default)]
    struct ScriptedQueue {
        script: Arc<Vec<Script>>,
        enqueued: Arc<std::sync::Mutex<Vec<usize>>>,
        connects: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
        hung: Arc<std::sync::Mutex<Vec<oneshot::Sender<JobOutcome>>>>,
        completed: Arc<std::sync::Mutex<Vec<usize>>>,
    }

    impl ScriptedQueue {
        fn new(script: Vec<Script>) -> Self {
            Self {
                script: Arc::new(script),
                ..Self::default()
            }
        }

        fn enqueued(&self) -> Vec<usize> {
            self.enqueued.lock().unwrap().clone()
        }

        /// Chunk indexes in the order their results were reported.
        fn completed(&self) -> Vec<usize> {
            self.completed.lock().unwrap().clone()
        }
    }

    struct ScriptedConnection(ScriptedQueue);

    #[async_trait]
    impl QueueConnection for ScriptedConnection {
        async fn enqueue(&mut self, job_name: &str, chunk: Chunk) -> Result<JobHandle, QueueError> {
            let step = self.0.script.get(chunk.index).cloned().unwrap_or(Script::Succeed);
            if let Script::Refuse = step {
                return Err(QueueError::Unavailable("connection reset".to_string()));
            }

            self.0.enqueued.lock().unwrap().push(chunk.len());
            let job = Job::new(job_name, chunk);
            let (tx, rx) = oneshot::channel();
            let handle = JobHandle::new(&job, rx);

            match step {
                Script::Succeed => {
                    let result = JobResult {
                        success_count: job.payload.len() as u64,
                        error_count: 0,
                        errors: vec![],
                    };
                    let _ = tx.send(JobOutcome::Completed(result));
                }
                Script::Report { delay, error } => {
                    let index = job.payload.index;
                    let result = JobResult {
                        success_count: job.payload.len() as u64 - 1,
                        error_count: 1,
                        errors: vec![RecordError::new(format!("chunk-{}", index), error)],
                    };
                    let completed = self.0.completed.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        completed.lock().unwrap().push(index);
                        let _ = tx.send(JobOutcome::Completed(result));
                    });
                }
                _ => self.0.hung.lock().unwrap().push(tx),
            }
            Ok(handle)
        }

        async fn close(&mut self) {
            self.0.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl QueueBackend for ScriptedQueue {
        async fn connect(&self, _queue_name: &str) -> Result<Box<dyn QueueConnection>, QueueError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedConnection(self.clone())))
        }

        async fn shutdown(&self) {}
    }

    fn scripted(script: Vec<Script>, config: IngestConfig) -> (BatchIngestor, ScriptedQueue) {
        let queue = ScriptedQueue::new(script);
        let pool = Arc::new(QueuePool::start(Arc::new(queue.clone()), "addUsers", 4));
        (BatchIngestor::new(pool, config), queue)
    }

    #[tokio::test]
    async fn test_all_chunks_succeed() {
        let h = harness(config(100, DispatchMode::Sequential));

        let summary = h.ingestor.ingest(&users(250)).await.unwrap();

        assert_eq!(summary.total_success, 250);
        assert_eq!(summary.total_errors, 0);
        assert!(summary.all_errors.is_empty());
        assert_eq!(h.store.count().await, 250);
        assert_eq!(h.queue.job_counts().completed, 3);
        assert_eq!(h.ingestor.stats().snapshot().chunks_dispatched, 3);
    }

    #[tokio::test]
    async fn test_chunk_sizes_on_the_wire() {
        let (ingestor, queue) = scripted(vec![], config(100, DispatchMode::Sequential));

        ingestor.ingest(&users(250)).await.unwrap();

        assert_eq!(queue.enqueued(), vec![100, 100, 50]);
        assert_eq!(queue.connects.load(Ordering::SeqCst), 1);
        assert_eq!(queue.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_field_rejected_before_dispatch() {
        let (ingestor, queue) = scripted(vec![], config(100, DispatchMode::Sequential));

        let mut record = RawRecord::new();
        for field in USER_FIELDS.iter().filter(|f| **f != "team") {
            record = record.with_field(*field, Value::from("x"));
        }

        let err = ingestor.ingest(&[record]).await.unwrap_err();
        assert!(matches!(
            err,
            IngestError::Core(CoreError::SchemaMismatch { ref field, .. }) if field == "team"
        ));
        assert_eq!(queue.connects.load(Ordering::SeqCst), 0);
        assert!(queue.enqueued().is_empty());
        assert_eq!(ingestor.stats().snapshot().batches_rejected, 1);
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let (ingestor, queue) = scripted(vec![], config(100, DispatchMode::Sequential));

        let err = ingestor.ingest(&[]).await.unwrap_err();
        assert!(matches!(err, IngestError::Core(CoreError::Validation(_))));
        assert_eq!(queue.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_chunk_size_fails_before_queue() {
        let (ingestor, queue) = scripted(vec![], config(0, DispatchMode::Sequential));

        let err = ingestor.ingest(&users(3)).await.unwrap_err();
        assert!(matches!(err, IngestError::Core(CoreError::Config(_))));
        assert_eq!(queue.connects.load(Ordering::SeqCst), 0);
        assert_eq!(ingestor.stats().snapshot().batches_failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_chunk_is_reported_not_fatal() {
        for mode in [DispatchMode::Sequential, DispatchMode::FanOut] {
            let (ingestor, queue) = scripted(
                vec![Script::Succeed, Script::Hang, Script::Succeed],
                config(100, mode),
            );

            let summary = ingestor.ingest(&users(250)).await.unwrap();

            assert_eq!(summary.total_success, 150, "{:?}", mode);
            assert_eq!(summary.total_errors, 100, "{:?}", mode);
            assert_eq!(summary.all_errors.len(), 1);
            let entry = &summary.all_errors[0];
            assert_eq!(entry.record, "chunk 2 (records 101-200)");
            assert!(entry.reason.contains("timed out after 30s"), "{}", entry.reason);
            assert_eq!(queue.enqueued(), vec![100, 100, 50]);
            assert_eq!(queue.closes.load(Ordering::SeqCst), 1);
            assert_eq!(ingestor.stats().snapshot().chunks_unresolved, 1);
        }
    }

    #[tokio::test]
    async fn test_queue_failure_after_progress_reports_remaining_chunks() {
        for mode in [DispatchMode::Sequential, DispatchMode::FanOut] {
            let (ingestor, _queue) = scripted(
                vec![Script::Succeed, Script::Refuse, Script::Succeed],
                config(100, mode),
            );

            let summary = ingestor.ingest(&users(250)).await.unwrap();

            assert_eq!(summary.total_success, 100);
            assert_eq!(summary.total_errors, 150);
            let labels: Vec<&str> = summary.all_errors.iter().map(|e| e.record.as_str()).collect();
            assert_eq!(
                labels,
                vec!["chunk 2 (records 101-200)", "chunk 3 (records 201-250)"]
            );
            assert!(summary.all_errors[0].reason.starts_with("not dispatched"));
        }
    }

    #[tokio::test]
    async fn test_queue_failure_before_any_result_is_fatal() {
        let (ingestor, queue) = scripted(vec![Script::Refuse], config(100, DispatchMode::Sequential));

        let err = ingestor.ingest(&users(250)).await.unwrap_err();
        assert!(matches!(err, IngestError::QueueUnavailable { .. }));
        assert_eq!(queue.closes.load(Ordering::SeqCst), 1);
        assert_eq!(ingestor.stats().snapshot().batches_failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_queue_failure_names_submitted_chunks() {
        for mode in [DispatchMode::Sequential, DispatchMode::FanOut] {
            let (ingestor, queue) =
                scripted(vec![Script::Hang, Script::Refuse], config(100, mode));

            let err = ingestor.ingest(&users(250)).await.unwrap_err();

            match &err {
                IngestError::QueueUnavailable { in_flight, .. } => {
                    assert_eq!(in_flight, &vec!["chunk 1 (records 1-100)".to_string()])
                }
                other => panic!("unexpected error for {:?}: {}", mode, other),
            }
            assert_eq!(
                err.to_string(),
                "Queue unavailable: connection reset; already submitted and may still run: \
                 chunk 1 (records 1-100)"
            );
            assert_eq!(queue.enqueued(), vec![100]);
            assert_eq!(queue.closes.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_aggregates_by_chunk_index() {
        let (ingestor, queue) = scripted(
            vec![
                Script::Report {
                    delay: Duration::from_secs(5),
                    error: "first",
                },
                Script::Report {
                    delay: Duration::ZERO,
                    error: "second",
                },
                Script::Report {
                    delay: Duration::from_secs(2),
                    error: "third",
                },
            ],
            config(100, DispatchMode::FanOut),
        );

        let summary = ingestor.ingest(&users(250)).await.unwrap();

        // Results arrive out of order
        assert_eq!(queue.completed(), vec![1, 2, 0]);
        assert_eq!(summary.total_success, 247);
        assert_eq!(summary.total_errors, 3);
        assert_eq!(
            summary.all_errors,
            vec![
                RecordError::new("chunk-0", "first"),
                RecordError::new("chunk-1", "second"),
                RecordError::new("chunk-2", "third"),
            ]
        );
    }

    #[tokio::test]
    async fn test_queue_shut_down_is_fatal() {
        let h = harness(config(100, DispatchMode::Sequential));
        h.queue.shutdown().await;

        let err = h.ingestor.ingest(&users(10)).await.unwrap_err();
        assert!(matches!(err, IngestError::QueueUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_record_errors_keep_chunk_then_record_order() {
        for mode in [DispatchMode::Sequential, DispatchMode::FanOut] {
            let h = harness(config(3, mode));

            // U-1 and U-4 already exist; U-7 has a bad email
            h.store.create_record(&user(1)).await.unwrap();
            h.store.create_record(&user(4)).await.unwrap();
            let mut records = users(9);
            records[7] = records[7].clone().with_field("email", "nope");

            let summary = h.ingestor.ingest(&records).await.unwrap();

            assert_eq!(summary.total_success, 6);
            assert_eq!(summary.total_errors, 3);
            assert_eq!(
                summary.all_errors,
                vec![
                    RecordError::new("U-1", "duplicate userId 'U-1'"),
                    RecordError::new("U-4", "duplicate userId 'U-4'"),
                    RecordError::new("U-7", "invalid record: invalid email 'nope'"),
                ]
            );
        }
    }

    #[tokio::test]
    async fn test_failed_job_counts_whole_chunk() {
        let h = harness(config(5, DispatchMode::Sequential));
        h.store.set_unavailable(true);

        let summary = h.ingestor.ingest(&users(5)).await.unwrap();

        assert_eq!(summary.total_success, 0);
        assert_eq!(summary.total_errors, 5);
        assert_eq!(summary.all_errors.len(), 1);
        assert_eq!(summary.all_errors[0].record, "chunk 1 (records 1-5)");
        assert!(summary.all_errors[0].reason.ends_with("failed: connection refused"));
        assert_eq!(h.queue.job_counts().failed, 1);
    }
}
