//! Shared application state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use skillmatrix_ingest::{
    BatchIngestor, IngestConfig, MemoryQueue, MemoryRecordStore, QueuePool, RecordStore,
    WorkerPool, WorkerSettings,
};
use tracing::info;

/// Shared application state.
pub struct AppState {
    /// Bulk ingestion pipeline.
    pub ingestor: BatchIngestor,

    /// Record persistence, used directly for single-user creation.
    pub store: Arc<dyn RecordStore>,

    /// Queue backend, for job metrics.
    pub queue: MemoryQueue,

    /// Process-wide queue connection pool.
    pub pool: Arc<QueuePool>,

    /// Users created through the single-user path.
    single_created: AtomicU64,
}

impl AppState {
    /// Build the in-process queue, its workers and the ingestion pipeline.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: IngestConfig,
        workers: WorkerSettings,
        queue_capacity: usize,
    ) -> (Arc<Self>, WorkerPool) {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        Self::start_with_store(config, workers, queue_capacity, store)
    }

    /// Like [`start`](Self::start) but persisting into `store`.
    pub fn start_with_store(
        config: IngestConfig,
        workers: WorkerSettings,
        queue_capacity: usize,
        store: Arc<dyn RecordStore>,
    ) -> (Arc<Self>, WorkerPool) {
        let (queue, receiver) = MemoryQueue::new(queue_capacity);
        let worker_pool = WorkerPool::spawn(receiver, store.clone(), workers);
        let pool = Arc::new(QueuePool::start(
            Arc::new(queue.clone()),
            config.queue_name.clone(),
            config.max_queue_connections,
        ));
        let ingestor = BatchIngestor::new(pool.clone(), config);

        let state = Arc::new(Self {
            ingestor,
            store,
            queue,
            pool,
            single_created: AtomicU64::new(0),
        });
        (state, worker_pool)
    }

    pub(crate) fn single_user_created(&self) {
        self.single_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Users created through the single-user path.
    pub fn single_created(&self) -> u64 {
        self.single_created.load(Ordering::Relaxed)
    }

    /// Stop accepting batches and shut the queue down.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
        info!("Ingestion shut down");
    }
}
