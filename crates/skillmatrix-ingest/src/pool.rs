//! Process-wide queue connection pool.
//!
//! Started once at process start, checked out once per batch request and
//! shut down with the process. A lease is exclusive to one batch; the
//! semaphore bounds how many batches hold a connection at the same time.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::queue::{QueueBackend, QueueConnection};
use crate::QueueError;

/// Shared pool handing out per-batch queue connections.
pub struct QueuePool {
    backend: Arc<dyn QueueBackend>,
    queue_name: String,
    permits: Arc<Semaphore>,
    max_connections: usize,
}

impl QueuePool {
    /// Start a pool over `backend` for `queue_name`.
    pub fn start(
        backend: Arc<dyn QueueBackend>,
        queue_name: impl Into<String>,
        max_connections: usize,
    ) -> Self {
        let queue_name = queue_name.into();
        let max_connections = max_connections.max(1);
        info!(queue = %queue_name, max_connections, "Queue pool started");

        Self {
            backend,
            queue_name,
            permits: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        }
    }

    /// Name of the queue connections are opened against.
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Check out an exclusive connection, waiting for a free slot.
    pub async fn checkout(&self) -> Result<QueueLease, QueueError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| QueueError::Unavailable("queue pool is shut down".to_string()))?;

        let connection = self.backend.connect(&self.queue_name).await?;
        debug!(queue = %self.queue_name, in_use = self.in_use(), "Queue connection checked out");

        Ok(QueueLease {
            connection,
            released: false,
            _permit: permit,
        })
    }

    /// Number of leases currently checked out.
    pub fn in_use(&self) -> usize {
        self.max_connections - self.permits.available_permits()
    }

    /// Returns true once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.permits.is_closed()
    }

    /// Refuse further checkouts and shut the backend down.
    pub async fn shutdown(&self) {
        self.permits.close();
        self.backend.shutdown().await;
        info!(queue = %self.queue_name, "Queue pool shut down");
    }
}

/// One batch request's exclusive queue connection.
///
/// Call [`release`](Self::release) on every exit path. A lease dropped
/// without release (cancelled request) still drops its connection and frees
/// the pool slot.
pub struct QueueLease {
    connection: Box<dyn QueueConnection>,
    released: bool,
    _permit: OwnedSemaphorePermit,
}

impl QueueLease {
    /// The leased connection.
    pub fn connection(&mut self) -> &mut dyn QueueConnection {
        self.connection.as_mut()
    }

    /// Close the connection and return the slot to the pool.
    pub async fn release(mut self) {
        self.connection.close().await;
        self.released = true;
        debug!("Queue connection released");
    }
}

impl Drop for QueueLease {
    fn drop(&mut self) {
        if !self.released {
            warn!("Queue lease dropped without release");
        }
    }
}
