//! Folding per-chunk results into one batch summary.

use serde::Serialize;

use crate::{JobResult, RecordError};

/// Aggregate of every chunk's JobResult, in dispatch order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total_success: u64,
    pub total_errors: u64,
    pub all_errors: Vec<RecordError>,
}

impl BatchSummary {
    /// Fold results, given in chunk order, into a summary.
    ///
    /// Sums the reported counts as-is, saturating at `u64::MAX`, and
    /// concatenates errors preserving chunk order, then within-chunk order.
    pub fn aggregate<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a JobResult>,
    {
        results
            .into_iter()
            .fold(Self::default(), |mut summary, result| {
                summary.total_success = summary.total_success.saturating_add(result.success_count);
                summary.total_errors = summary.total_errors.saturating_add(result.error_count);
                summary.all_errors.extend(result.errors.iter().cloned());
                summary
            })
    }

    /// User-facing message for the batch.
    pub fn message(&self) -> String {
        format!("{} Users Added successfully!", self.total_success)
    }
}
