//! Skill Matrix Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Queue backends or databases
//! - Runtime specifics
//!
//! Everything here is a pure function of its input: validating a record set,
//! splitting it into chunks and folding per-chunk results into one summary.

pub mod chunk;
pub mod error;
pub mod ids;
pub mod job;
pub mod record;
pub mod status;
pub mod summary;
pub mod validate;

// Re-export commonly used types
pub use chunk::{Chunk, ChunkPlan};
pub use error::{CoreError, FieldIssue};
pub use ids::{BatchId, JobId};
pub use job::{Job, JobResult, RecordError};
pub use record::{RawRecord, RequiredFieldSet};
pub use status::{BatchStage, JobStatus};
pub use summary::BatchSummary;
pub use validate::{validate_schema, SchemaCheck};
