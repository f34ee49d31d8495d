//! Schema validation of an incoming record set.
//!
//! Validation is all-or-nothing: it runs before any chunk is queued and
//! either accepts the whole batch or names the first offending field.

use serde::{Deserialize, Serialize};

use crate::{CoreError, FieldIssue, RawRecord, RequiredFieldSet};

/// How many records have their field set compared against the contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaCheck {
    /// Every record must be set-equal to the required fields.
    #[default]
    EveryRecord,
    /// Only the first record's shape is checked (legacy behavior).
    FirstRecord,
}

impl std::str::FromStr for SchemaCheck {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "every-record" => Ok(Self::EveryRecord),
            "first-record" => Ok(Self::FirstRecord),
            other => Err(CoreError::Config(format!(
                "unknown schema check '{}', expected 'every-record' or 'first-record'",
                other
            ))),
        }
    }
}

/// Check that records match `required` exactly.
///
/// Fails with [`CoreError::Validation`] on empty input and with
/// [`CoreError::SchemaMismatch`] naming the first unexpected field, or failing
/// that the first missing one, of the first offending record.
pub fn validate_schema(
    records: &[RawRecord],
    required: &RequiredFieldSet,
    check: SchemaCheck,
) -> Result<(), CoreError> {
    if records.is_empty() {
        return Err(CoreError::Validation("empty input".to_string()));
    }

    let checked = match check {
        SchemaCheck::EveryRecord => records.len(),
        SchemaCheck::FirstRecord => 1,
    };

    for (index, record) in records.iter().take(checked).enumerate() {
        check_record(index, record, required)?;
    }

    Ok(())
}

fn check_record(
    index: usize,
    record: &RawRecord,
    required: &RequiredFieldSet,
) -> Result<(), CoreError> {
    // Subset: nothing outside the contract
    if let Some(field) = record.field_names().find(|f| !required.contains(f)) {
        return Err(CoreError::SchemaMismatch {
            field: field.to_string(),
            kind: FieldIssue::Unexpected,
            record_index: index,
        });
    }

    // Superset: nothing from the contract left out
    if let Some(field) = required.iter().find(|f| !record.contains(f)) {
        return Err(CoreError::SchemaMismatch {
            field: field.to_string(),
            kind: FieldIssue::Missing,
            record_index: index,
        });
    }

    Ok(())
}
