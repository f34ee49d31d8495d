//! Submitting chunks to the work queue.

use tracing::{debug, warn};

use skillmatrix_core::{Chunk, JobId};

use crate::queue::{JobHandle, QueueConnection};
use crate::QueueError;

/// Submits one batch's chunks, in order, as jobs named `job_name`.
///
/// Keeps the ids of everything submitted so far. Submission is not
/// transactional: when the queue fails mid-batch, jobs already submitted are
/// not retracted and may still run.
pub struct Dispatcher {
    job_name: String,
    submitted: Vec<JobId>,
}

impl Dispatcher {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            submitted: Vec::new(),
        }
    }

    /// Submit `chunk` and return a handle for awaiting its outcome.
    pub async fn dispatch(
        &mut self,
        connection: &mut dyn QueueConnection,
        chunk: Chunk,
    ) -> Result<JobHandle, QueueError> {
        let chunk_index = chunk.index;
        let records = chunk.len();

        match connection.enqueue(&self.job_name, chunk).await {
            Ok(handle) => {
                debug!(
                    job_id = %handle.job_id(),
                    chunk_index,
                    records,
                    "Chunk dispatched"
                );
                self.submitted.push(handle.job_id().clone());
                Ok(handle)
            }
            Err(e) => {
                warn!(
                    chunk_index,
                    already_submitted = self.submitted.len(),
                    error = %e,
                    "Chunk dispatch failed"
                );
                Err(e)
            }
        }
    }

    /// Jobs submitted so far, in submission order.
    pub fn submitted(&self) -> &[JobId] {
        &self.submitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryQueue, QueueBackend};
    use skillmatrix_core::RawRecord;

    fn chunk(index: usize) -> Chunk {
        Chunk {
            index,
            offset: index,
            records: vec![RawRecord::new()],
        }
    }

    #[tokio::test]
    async fn test_dispatch_in_order() {
        let (queue, mut receiver) = MemoryQueue::new(8);
        let mut conn = queue.connect("addUsers").await.unwrap();
        let mut dispatcher = Dispatcher::new("users");

        for i in 0..3 {
            let handle = dispatcher.dispatch(conn.as_mut(), chunk(i)).await.unwrap();
            assert_eq!(handle.chunk_index(), i);
        }

        assert_eq!(dispatcher.submitted().len(), 3);
        for expected in dispatcher.submitted() {
            let queued = receiver.rx.recv().await.unwrap();
            assert_eq!(&queued.job.id, expected);
        }
    }

    #[tokio::test]
    async fn test_failed_dispatch_not_recorded() {
        let (queue, _receiver) = MemoryQueue::new(8);
        let mut conn = queue.connect("addUsers").await.unwrap();
        let mut dispatcher = Dispatcher::new("users");

        dispatcher.dispatch(conn.as_mut(), chunk(0)).await.unwrap();
        conn.close().await;
        assert_eq!(
            dispatcher.dispatch(conn.as_mut(), chunk(1)).await.unwrap_err(),
            QueueError::Closed
        );
        assert_eq!(dispatcher.submitted().len(), 1);
    }
}
