//! Status enums for queued jobs and batch requests.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Status of a Job in the work queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Job submitted but not yet picked up by a worker.
    #[default]
    Queued,
    /// A worker is persisting the job's records.
    InProgress,
    /// Worker reported a JobResult.
    Completed,
    /// Worker could not produce a JobResult.
    Failed,
}

impl JobStatus {
    /// Returns true if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Stage of one batch request moving through the ingestion pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchStage {
    #[default]
    Received,
    Validating,
    /// Validation failed; no chunk was dispatched.
    Rejected,
    Chunking,
    /// Submitting chunk `i` to the queue.
    Dispatching(usize),
    /// Awaiting chunk `i`'s terminal event.
    Waiting(usize),
    Aggregating,
    Completed,
    Failed,
}

impl BatchStage {
    /// Returns true if the batch reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: BatchStage) -> bool {
        use BatchStage::*;

        match (*self, next) {
            (Completed | Failed, _) => false,
            (_, Failed) => true,
            (Received, Validating) => true,
            (Validating, Chunking | Rejected) => true,
            (Chunking, Dispatching(0)) => true,
            (Dispatching(i), Waiting(j)) => j <= i,
            (Dispatching(i), Dispatching(j)) => j == i + 1,
            (Waiting(i), Dispatching(j)) => j == i + 1,
            (Waiting(i), Waiting(j)) => j == i + 1,
            (Dispatching(_) | Waiting(_), Aggregating) => true,
            (Aggregating, Completed) => true,
            _ => false,
        }
    }

    /// Move to `next`, rejecting illegal transitions.
    pub fn advance(&mut self, next: BatchStage) -> Result<(), CoreError> {
        if !self.can_transition_to(next) {
            return Err(CoreError::InvalidStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStage::Received => write!(f, "RECEIVED"),
            BatchStage::Validating => write!(f, "VALIDATING"),
            BatchStage::Rejected => write!(f, "REJECTED"),
            BatchStage::Chunking => write!(f, "CHUNKING"),
            BatchStage::Dispatching(i) => write!(f, "DISPATCHING({})", i),
            BatchStage::Waiting(i) => write!(f, "WAITING({})", i),
            BatchStage::Aggregating => write!(f, "AGGREGATING"),
            BatchStage::Completed => write!(f, "COMPLETED"),
            BatchStage::Failed => write!(f, "FAILED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_path() {
        let mut stage = BatchStage::default();
        for next in [
            BatchStage::Validating,
            BatchStage::Chunking,
            BatchStage::Dispatching(0),
            BatchStage::Waiting(0),
            BatchStage::Dispatching(1),
            BatchStage::Waiting(1),
            BatchStage::Aggregating,
            BatchStage::Completed,
        ] {
            stage.advance(next).unwrap();
        }
        assert!(stage.is_terminal());
    }

    #[test]
    fn test_fan_out_path() {
        let mut stage = BatchStage::Chunking;
        for next in [
            BatchStage::Dispatching(0),
            BatchStage::Dispatching(1),
            BatchStage::Waiting(0),
            BatchStage::Waiting(1),
            BatchStage::Aggregating,
        ] {
            stage.advance(next).unwrap();
        }
    }

    #[test]
    fn test_rejection_never_dispatches() {
        let mut stage = BatchStage::Validating;
        stage.advance(BatchStage::Rejected).unwrap();
        assert!(!stage.can_transition_to(BatchStage::Dispatching(0)));
        stage.advance(BatchStage::Failed).unwrap();
        assert!(stage.is_terminal());
    }

    #[test]
    fn test_terminal_is_final() {
        let mut stage = BatchStage::Completed;
        let err = stage.advance(BatchStage::Failed).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidStateTransition {
                from: "COMPLETED".to_string(),
                to: "FAILED".to_string(),
            }
        );
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
