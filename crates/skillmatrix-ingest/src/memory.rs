//! In-process queue backend.
//!
//! Jobs flow through a bounded channel to a [`WorkerPool`](crate::WorkerPool).
//! Each job carries a one-shot completion channel that delivers its terminal
//! event back to whoever holds the [`JobHandle`]. The job table tracks status
//! and retains a bounded number of terminal jobs.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, info};

use skillmatrix_core::{Chunk, Job, JobId, JobStatus};

use crate::queue::{JobHandle, JobOutcome, QueueBackend, QueueConnection};
use crate::QueueError;

/// A job waiting for a worker, with its completion channel.
///
/// Dropped before [`complete`](Self::complete) is called (receiver gone,
/// worker panicked), the job is marked failed so the table can evict it.
#[derive(Debug)]
pub struct QueuedJob {
    pub job: Job,
    completion: Option<oneshot::Sender<JobOutcome>>,
    table: Arc<JobTable>,
}

impl QueuedJob {
    fn new(job: Job, completion: oneshot::Sender<JobOutcome>, table: Arc<JobTable>) -> Self {
        Self {
            job,
            completion: Some(completion),
            table,
        }
    }

    /// Deliver the terminal event. Returns false if nobody waits any more.
    pub fn complete(mut self, outcome: JobOutcome) -> bool {
        match self.completion.take() {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }
}

impl Drop for QueuedJob {
    fn drop(&mut self) {
        if self.completion.is_some() {
            self.table.mark(&self.job.id, JobStatus::Failed);
            debug!(job_id = %self.job.id, "Job dropped before completion");
        }
    }
}

/// Job counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub queued: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Status of every live job plus the most recent terminal ones.
#[derive(Debug)]
pub(crate) struct JobTable {
    inner: Mutex<JobTableInner>,
}

#[derive(Debug)]
struct JobTableInner {
    statuses: HashMap<JobId, JobStatus>,
    terminal: VecDeque<JobId>,
    retain_terminal: usize,
}

impl JobTable {
    fn new(retain_terminal: usize) -> Self {
        Self {
            inner: Mutex::new(JobTableInner {
                statuses: HashMap::new(),
                terminal: VecDeque::new(),
                retain_terminal,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, JobTableInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn mark(&self, job_id: &JobId, status: JobStatus) {
        let mut inner = self.lock();
        inner.statuses.insert(job_id.clone(), status);

        if status.is_terminal() {
            inner.terminal.push_back(job_id.clone());
            while inner.terminal.len() > inner.retain_terminal {
                if let Some(evicted) = inner.terminal.pop_front() {
                    inner.statuses.remove(&evicted);
                }
            }
        }
    }

    fn remove(&self, job_id: &JobId) {
        self.lock().statuses.remove(job_id);
    }

    fn status(&self, job_id: &JobId) -> Option<JobStatus> {
        self.lock().statuses.get(job_id).copied()
    }

    fn counts(&self) -> JobCounts {
        self.lock()
            .statuses
            .values()
            .fold(JobCounts::default(), |mut counts, status| {
                match status {
                    JobStatus::Queued => counts.queued += 1,
                    JobStatus::InProgress => counts.in_progress += 1,
                    JobStatus::Completed => counts.completed += 1,
                    JobStatus::Failed => counts.failed += 1,
                }
                counts
            })
    }
}

/// Consumer end of a [`MemoryQueue`], handed to the worker pool.
pub struct JobReceiver {
    pub(crate) rx: mpsc::Receiver<QueuedJob>,
    pub(crate) table: Arc<JobTable>,
}

/// In-process work queue.
#[derive(Clone)]
pub struct MemoryQueue {
    jobs_tx: Arc<RwLock<Option<mpsc::Sender<QueuedJob>>>>,
    table: Arc<JobTable>,
}

impl MemoryQueue {
    /// Terminal jobs kept in the job table.
    pub const DEFAULT_RETENTION: usize = 1000;

    /// Create a queue buffering up to `capacity` jobs.
    pub fn new(capacity: usize) -> (Self, JobReceiver) {
        Self::with_retention(capacity, Self::DEFAULT_RETENTION)
    }

    /// Create a queue that keeps at most `retain_terminal` finished jobs.
    pub fn with_retention(capacity: usize, retain_terminal: usize) -> (Self, JobReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let table = Arc::new(JobTable::new(retain_terminal));

        let queue = Self {
            jobs_tx: Arc::new(RwLock::new(Some(tx))),
            table: table.clone(),
        };
        (queue, JobReceiver { rx, table })
    }

    /// Current status of a job, if still retained.
    pub fn job_status(&self, job_id: &JobId) -> Option<JobStatus> {
        self.table.status(job_id)
    }

    /// Job counts by status.
    pub fn job_counts(&self) -> JobCounts {
        self.table.counts()
    }
}

#[async_trait]
impl QueueBackend for MemoryQueue {
    async fn connect(&self, queue_name: &str) -> Result<Box<dyn QueueConnection>, QueueError> {
        let tx = self.jobs_tx.read().await.clone().ok_or_else(|| {
            QueueError::Unavailable(format!("queue '{}' is shut down", queue_name))
        })?;

        debug!(queue = %queue_name, "Queue connection opened");

        Ok(Box::new(MemoryConnection {
            queue_name: queue_name.to_string(),
            tx: Some(tx),
            table: self.table.clone(),
        }))
    }

    async fn shutdown(&self) {
        // Dropping the last sender lets workers drain and exit
        if self.jobs_tx.write().await.take().is_some() {
            info!("In-memory queue shut down");
        }
    }
}

struct MemoryConnection {
    queue_name: String,
    tx: Option<mpsc::Sender<QueuedJob>>,
    table: Arc<JobTable>,
}

#[async_trait]
impl QueueConnection for MemoryConnection {
    async fn enqueue(&mut self, job_name: &str, chunk: Chunk) -> Result<JobHandle, QueueError> {
        let tx = self.tx.as_ref().ok_or(QueueError::Closed)?;

        let job = Job::new(job_name, chunk);
        let job_id = job.id.clone();
        let (completion, rx) = oneshot::channel();
        let handle = JobHandle::new(&job, rx);

        self.table.mark(&job_id, JobStatus::Queued);

        let queued = QueuedJob::new(job, completion, self.table.clone());
        if let Err(rejected) = tx.send(queued).await {
            drop(rejected);
            self.table.remove(&job_id);
            return Err(QueueError::Unavailable(format!(
                "queue '{}' has no workers",
                self.queue_name
            )));
        }

        Ok(handle)
    }

    async fn close(&mut self) {
        if self.tx.take().is_some() {
            debug!(queue = %self.queue_name, "Queue connection closed");
        }
    }
}
