//! Skill Matrix Batch Ingestion
//!
//! Validates a user record batch, splits it into bounded chunks, dispatches
//! each chunk as a job to a work queue, waits for every job's terminal event
//! and folds the per-chunk results into one [`BatchSummary`].
//!
//! The queue is reached through the [`QueueBackend`] and [`QueueConnection`]
//! traits. [`MemoryQueue`] with a [`WorkerPool`] is the in-process backend
//! used by the server and the tests.
//!
//! [`BatchSummary`]: skillmatrix_core::BatchSummary

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod memory;
pub mod pipeline;
pub mod pool;
pub mod queue;
pub mod stats;
pub mod store;
pub mod waiter;
pub mod worker;

pub use config::{DispatchMode, IngestConfig};
pub use dispatcher::Dispatcher;
pub use error::{IngestError, QueueError, StoreError, WaitError};
pub use memory::{JobCounts, JobReceiver, MemoryQueue};
pub use pipeline::BatchIngestor;
pub use pool::{QueueLease, QueuePool};
pub use queue::{JobHandle, JobOutcome, QueueBackend, QueueConnection};
pub use stats::{IngestStats, StatsSnapshot};
pub use store::{MemoryRecordStore, RecordStore};
pub use waiter::CompletionWaiter;
pub use worker::{WorkerPool, WorkerSettings};
