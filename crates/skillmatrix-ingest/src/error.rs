//! Ingestion errors.

use std::time::Duration;

use skillmatrix_core::{CoreError, JobId};
use thiserror::Error;

/// Queue connection errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue backend cannot be reached or has been shut down.
    #[error("{0}")]
    Unavailable(String),

    /// The connection was closed before use.
    #[error("queue connection closed")]
    Closed,
}

/// Errors observed while waiting for one job's terminal event.
///
/// These are chunk-level failures: the pipeline converts them into error
/// entries for the chunk instead of aborting the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    /// No terminal event arrived within the configured wait.
    #[error("job {job_id} timed out after {secs}s", secs = .waited.as_secs())]
    JobTimeout { job_id: JobId, waited: Duration },

    /// The worker reported the job as failed.
    #[error("job {job_id} failed: {reason}")]
    JobFailed { job_id: JobId, reason: String },

    /// The job was dropped without a terminal event.
    #[error("job {job_id} lost before reporting a result")]
    Disconnected { job_id: JobId },
}

impl WaitError {
    /// Job the error refers to.
    pub fn job_id(&self) -> &JobId {
        match self {
            Self::JobTimeout { job_id, .. }
            | Self::JobFailed { job_id, .. }
            | Self::Disconnected { job_id } => job_id,
        }
    }
}

/// Errors fatal to a whole batch.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Validation, schema or configuration failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Queue unreachable before any chunk produced a result.
    ///
    /// `in_flight` labels the chunks already submitted; they may still run.
    #[error("Queue unavailable: {source}{}", in_flight_note(.in_flight))]
    QueueUnavailable {
        source: QueueError,
        in_flight: Vec<String>,
    },
}

impl From<QueueError> for IngestError {
    fn from(source: QueueError) -> Self {
        Self::QueueUnavailable {
            source,
            in_flight: Vec::new(),
        }
    }
}

fn in_flight_note(in_flight: &[String]) -> String {
    if in_flight.is_empty() {
        String::new()
    } else {
        format!("; already submitted and may still run: {}", in_flight.join(", "))
    }
}

/// Persistence errors for a single record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A unique field already holds this value.
    #[error("duplicate {field} '{value}'")]
    Duplicate { field: String, value: String },

    /// The record cannot be stored as-is.
    #[error("invalid record: {0}")]
    Invalid(String),

    /// The store itself is failing; not specific to the record.
    #[error("store unavailable: {0}")]
    Backend(String),
}
