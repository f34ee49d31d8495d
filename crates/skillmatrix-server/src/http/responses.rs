//! HTTP request and response types.

use serde::{Deserialize, Serialize};
use skillmatrix_core::{BatchSummary, RawRecord, RecordError};

// ============================================================================
// Request types
// ============================================================================

/// Body of `POST /v1/users`. The caller picks the mode explicitly.
#[derive(Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CreateUsersRequest {
    /// Create one user directly, bypassing the queue.
    Single { user: RawRecord },
    /// Ingest many users through the chunked queue pipeline.
    Bulk { users: Vec<RawRecord> },
}

// ============================================================================
// Response types
// ============================================================================

/// Response for single-user creation.
#[derive(Debug, Serialize, Deserialize)]
pub struct SingleUserResponse {
    pub message: String,
    pub success: bool,
}

/// Response for a bulk upload.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUploadResponse {
    pub message: String,
    pub success_count: u64,
    pub error_count: u64,
    pub errors: Vec<RecordError>,
}

impl From<BatchSummary> for BulkUploadResponse {
    fn from(summary: BatchSummary) -> Self {
        Self {
            message: summary.message(),
            success_count: summary.total_success,
            error_count: summary.total_errors,
            errors: summary.all_errors,
        }
    }
}

/// Response for the health check.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok`, or `shutting_down` once the queue pool stopped taking batches.
    pub status: String,
    pub queue: String,
    pub connections_in_use: usize,
    pub users_stored: usize,
}

// ============================================================================
// Error types
// ============================================================================

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
