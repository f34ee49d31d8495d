//! Persistence workers consuming the in-process queue.
//!
//! Each job's records are persisted independently: a rejected record is
//! reported in the [`JobResult`] and the rest of the chunk carries on. Only a
//! store-wide failure fails the job as a whole.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use skillmatrix_core::{Chunk, JobResult, JobStatus, RecordError};

use crate::memory::{JobReceiver, JobTable, QueuedJob};
use crate::queue::JobOutcome;
use crate::{RecordStore, StoreError};

/// Worker pool settings.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Number of jobs processed concurrently.
    pub concurrency: usize,

    /// Artificial latency before each record write.
    pub record_delay: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            record_delay: Duration::ZERO,
        }
    }
}

/// A fixed set of workers draining a [`JobReceiver`].
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    active_jobs: Arc<AtomicU32>,
}

impl WorkerPool {
    /// Spawn `settings.concurrency` workers on the current runtime.
    pub fn spawn(
        receiver: JobReceiver,
        store: Arc<dyn RecordStore>,
        settings: WorkerSettings,
    ) -> Self {
        let JobReceiver { rx, table } = receiver;
        let rx = Arc::new(Mutex::new(rx));
        let active_jobs = Arc::new(AtomicU32::new(0));
        let concurrency = settings.concurrency.max(1);

        info!(workers = concurrency, "Starting persistence workers");

        let handles = (0..concurrency)
            .map(|worker| {
                let rx = rx.clone();
                let table = table.clone();
                let store = store.clone();
                let active_jobs = active_jobs.clone();
                let record_delay = settings.record_delay;
                tokio::spawn(async move {
                    run_worker(worker, rx, table, store, active_jobs, record_delay).await;
                })
            })
            .collect();

        Self {
            handles,
            active_jobs,
        }
    }

    /// Number of jobs currently being processed.
    pub fn active_jobs(&self) -> u32 {
        self.active_jobs.load(Ordering::SeqCst)
    }

    /// Wait for every worker to exit. Workers exit once the queue is shut
    /// down and drained.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker task ended abnormally");
            }
        }
    }
}

async fn run_worker(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
    table: Arc<JobTable>,
    store: Arc<dyn RecordStore>,
    active_jobs: Arc<AtomicU32>,
    record_delay: Duration,
) {
    loop {
        let next = rx.lock().await.recv().await;
        let Some(queued) = next else {
            break;
        };
        let job = &queued.job;

        active_jobs.fetch_add(1, Ordering::SeqCst);
        table.mark(&job.id, JobStatus::InProgress);
        debug!(
            worker,
            job_id = %job.id,
            chunk_index = job.payload.index,
            records = job.payload.len(),
            "Processing job"
        );

        let outcome = match persist_chunk(store.as_ref(), &job.payload, record_delay).await {
            Ok(result) => {
                table.mark(&job.id, JobStatus::Completed);
                debug!(
                    job_id = %job.id,
                    success = result.success_count,
                    errors = result.error_count,
                    "Job completed"
                );
                JobOutcome::Completed(result)
            }
            Err(e) => {
                table.mark(&job.id, JobStatus::Failed);
                warn!(job_id = %job.id, error = %e, "Job failed");
                JobOutcome::Failed(e.to_string())
            }
        };

        active_jobs.fetch_sub(1, Ordering::SeqCst);

        let job_id = job.id.clone();
        if !queued.complete(outcome) {
            // Waiter gave up (timeout or cancelled batch)
            info!(job_id = %job_id, "Job finished after its batch stopped waiting");
        }
    }

    debug!(worker, "Worker stopped");
}

/// Persist every record of `chunk`, isolating per-record failures.
///
/// Returns `Err` only when the store itself is unavailable
/// ([`StoreError::Backend`]); the job then fails as a whole.
pub async fn persist_chunk(
    store: &dyn RecordStore,
    chunk: &Chunk,
    record_delay: Duration,
) -> Result<JobResult, StoreError> {
    let mut result = JobResult::default();

    for (i, record) in chunk.records.iter().enumerate() {
        if !record_delay.is_zero() {
            tokio::time::sleep(record_delay).await;
        }

        match store.create_record(record).await {
            Ok(()) => result.record_success(),
            Err(e @ StoreError::Backend(_)) => return Err(e),
            Err(e) => result.record_failure(RecordError::new(
                record.reference(chunk.offset + i + 1),
                e.to_string(),
            )),
        }
    }

    Ok(result)
}
