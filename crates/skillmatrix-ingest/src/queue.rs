//! Work queue collaborator traits.
//!
//! A [`QueueBackend`] is the process-wide client; each batch request gets its
//! own [`QueueConnection`] from the [`QueuePool`](crate::QueuePool) and closes
//! it when done.

use async_trait::async_trait;
use tokio::sync::oneshot;

use skillmatrix_core::{Chunk, Job, JobId, JobResult};

use crate::QueueError;

/// Terminal event for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The worker processed the chunk and reported per-record results.
    Completed(JobResult),
    /// The worker could not process the chunk at all.
    Failed(String),
}

/// Handle for awaiting a dispatched job.
///
/// Owns the subscription to the job's terminal event. Dropping the handle
/// unsubscribes; a result reported afterwards is discarded by the backend.
#[derive(Debug)]
pub struct JobHandle {
    job_id: JobId,
    chunk_index: usize,
    label: String,
    record_count: usize,
    pub(crate) completion: oneshot::Receiver<JobOutcome>,
}

impl JobHandle {
    /// Create a handle for `job` fed by `completion`.
    pub fn new(job: &Job, completion: oneshot::Receiver<JobOutcome>) -> Self {
        Self {
            job_id: job.id.clone(),
            chunk_index: job.payload.index,
            label: job.payload.label(),
            record_count: job.payload.len(),
            completion,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Index of the chunk in dispatch order.
    pub fn chunk_index(&self) -> usize {
        self.chunk_index
    }

    /// Human-readable chunk label used in aggregated error entries.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of records carried by the job.
    pub fn record_count(&self) -> usize {
        self.record_count
    }
}

/// One batch request's connection to a named queue.
#[async_trait]
pub trait QueueConnection: Send {
    /// Submit `chunk` as a job named `job_name`.
    async fn enqueue(&mut self, job_name: &str, chunk: Chunk) -> Result<JobHandle, QueueError>;

    /// Release the connection. Further enqueues fail with
    /// [`QueueError::Closed`].
    async fn close(&mut self);
}

/// Process-wide queue client.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Open a connection to `queue_name`.
    async fn connect(&self, queue_name: &str) -> Result<Box<dyn QueueConnection>, QueueError>;

    /// Tear the backend down; later connects fail.
    async fn shutdown(&self);
}
