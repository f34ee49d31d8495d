//! Waiting for a dispatched job's terminal event.

use std::time::Duration;

use tracing::{debug, warn};

use skillmatrix_core::JobResult;

use crate::queue::{JobHandle, JobOutcome};
use crate::WaitError;

/// Suspends until a job reports a terminal event or the wait elapses.
///
/// There is no retry here. A job that outlives the wait may still complete;
/// its result is discarded.
#[derive(Debug, Clone, Copy)]
pub struct CompletionWaiter {
    timeout: Duration,
}

impl CompletionWaiter {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Wait for `handle`'s job to finish.
    pub async fn wait(&self, handle: &mut JobHandle) -> Result<JobResult, WaitError> {
        let job_id = handle.job_id().clone();

        match tokio::time::timeout(self.timeout, &mut handle.completion).await {
            Ok(Ok(JobOutcome::Completed(result))) => {
                debug!(
                    job_id = %job_id,
                    success = result.success_count,
                    errors = result.error_count,
                    "Job result received"
                );
                Ok(result)
            }
            Ok(Ok(JobOutcome::Failed(reason))) => Err(WaitError::JobFailed { job_id, reason }),
            Ok(Err(_)) => Err(WaitError::Disconnected { job_id }),
            Err(_) => {
                warn!(
                    job_id = %job_id,
                    timeout_secs = self.timeout.as_secs(),
                    "Timed out waiting for job"
                );
                Err(WaitError::JobTimeout {
                    job_id,
                    waited: self.timeout,
                })
            }
        }
    }
}
