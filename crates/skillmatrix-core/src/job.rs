//! Job and JobResult types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Chunk, JobId};

/// One chunk submitted to the work queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,

    /// Job name within the queue (e.g. `users`).
    pub name: String,

    /// Records to persist.
    pub payload: Chunk,

    /// When the job was created.
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a new Job for a chunk.
    pub fn new(name: impl Into<String>, payload: Chunk) -> Self {
        Self {
            id: JobId::generate(),
            name: name.into(),
            payload,
            created_at: Utc::now(),
        }
    }
}

/// Why a single record, or a whole chunk, was not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    /// Record-identifying value (userId, email or chunk label).
    pub record: String,

    /// Failure reason.
    pub reason: String,
}

impl RecordError {
    pub fn new(record: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            record: record.into(),
            reason: reason.into(),
        }
    }
}

/// Outcome of processing one chunk, as reported by the worker.
///
/// A well-behaved worker reports `success_count + error_count == chunk.len()`,
/// but consumers only sum what is reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub success_count: u64,
    pub error_count: u64,
    #[serde(default)]
    pub errors: Vec<RecordError>,
}

impl JobResult {
    /// Record one persisted record.
    pub fn record_success(&mut self) {
        self.success_count += 1;
    }

    /// Record one rejected record.
    pub fn record_failure(&mut self, error: RecordError) {
        self.error_count += 1;
        self.errors.push(error);
    }

    /// Result standing in for a chunk whose outcome is unknown (timeout,
    /// failed job, undispatched). Every record of the chunk counts as an
    /// error, reported as one aggregated entry.
    pub fn unresolved(
        label: impl Into<String>,
        record_count: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            success_count: 0,
            error_count: record_count as u64,
            errors: vec![RecordError::new(label, reason)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RawRecord;

    #[test]
    fn test_unresolved_counts_every_record() {
        let chunk = Chunk {
            index: 1,
            offset: 100,
            records: vec![RawRecord::new(); 100],
        };
        let result = JobResult::unresolved(chunk.label(), chunk.len(), "timed out");
        assert_eq!(result.success_count, 0);
        assert_eq!(result.error_count, 100);
        assert_eq!(
            result.errors,
            vec![RecordError::new("chunk 2 (records 101-200)", "timed out")]
        );
    }

    #[test]
    fn test_job_result_wire_shape() {
        let mut result = JobResult::default();
        result.record_success();
        result.record_failure(RecordError::new("U-1", "duplicate"));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "successCount": 1,
                "errorCount": 1,
                "errors": [{ "record": "U-1", "reason": "duplicate" }]
            })
        );
    }

    #[test]
    fn test_job_ids_are_unique() {
        let chunk = Chunk {
            index: 0,
            offset: 0,
            records: vec![],
        };
        let a = Job::new("users", chunk.clone());
        let b = Job::new("users", chunk);
        assert_ne!(a.id, b.id);
    }
}
