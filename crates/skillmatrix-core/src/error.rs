//! Core domain errors.

use std::fmt;

use thiserror::Error;

/// Direction in which a record's field set disagrees with the required set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldIssue {
    /// A required field is absent from the record.
    Missing,
    /// The record carries a field outside the required set.
    Unexpected,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldIssue::Missing => write!(f, "missing"),
            FieldIssue::Unexpected => write!(f, "unexpected"),
        }
    }
}

/// Core domain errors for batch ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Empty or malformed input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A record's field set does not match the required field set.
    #[error("Schema mismatch: {kind} field '{field}' in record {record_index}")]
    SchemaMismatch {
        field: String,
        kind: FieldIssue,
        record_index: usize,
    },

    /// Misconfiguration, such as a zero chunk size.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid state transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },
}

impl CoreError {
    /// Returns true if the error was caused by the caller's payload.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::SchemaMismatch { .. })
    }
}
