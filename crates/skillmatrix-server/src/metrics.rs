//! Prometheus metrics collection and formatting.
//!
//! This module provides metrics in Prometheus text exposition format.

use std::fmt::Write;
use std::sync::Arc;

use crate::state::AppState;

/// Collect all metrics from AppState and format as Prometheus text.
pub async fn collect_metrics(state: &Arc<AppState>) -> String {
    let mut output = String::new();

    collect_batch_metrics(state, &mut output);
    collect_queue_metrics(state, &mut output);
    collect_store_metrics(state, &mut output).await;

    output
}

/// Collect batch and record counters.
fn collect_batch_metrics(state: &Arc<AppState>, output: &mut String) {
    let stats = state.ingestor.stats().snapshot();

    writeln!(
        output,
        "# HELP skillmatrix_batches_total Bulk upload batches by outcome"
    )
    .ok();
    writeln!(output, "# TYPE skillmatrix_batches_total counter").ok();
    writeln!(
        output,
        "skillmatrix_batches_total{{outcome=\"completed\"}} {}",
        stats.batches_completed
    )
    .ok();
    writeln!(
        output,
        "skillmatrix_batches_total{{outcome=\"rejected\"}} {}",
        stats.batches_rejected
    )
    .ok();
    writeln!(
        output,
        "skillmatrix_batches_total{{outcome=\"failed\"}} {}",
        stats.batches_failed
    )
    .ok();

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP skillmatrix_records_total Records in completed batches by result"
    )
    .ok();
    writeln!(output, "# TYPE skillmatrix_records_total counter").ok();
    writeln!(
        output,
        "skillmatrix_records_total{{result=\"succeeded\"}} {}",
        stats.records_succeeded
    )
    .ok();
    writeln!(
        output,
        "skillmatrix_records_total{{result=\"failed\"}} {}",
        stats.records_failed
    )
    .ok();

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP skillmatrix_chunks_total Chunks dispatched and chunks without a result"
    )
    .ok();
    writeln!(output, "# TYPE skillmatrix_chunks_total counter").ok();
    writeln!(
        output,
        "skillmatrix_chunks_total{{state=\"dispatched\"}} {}",
        stats.chunks_dispatched
    )
    .ok();
    writeln!(
        output,
        "skillmatrix_chunks_total{{state=\"unresolved\"}} {}",
        stats.chunks_unresolved
    )
    .ok();
}

/// Collect queue job and connection gauges.
fn collect_queue_metrics(state: &Arc<AppState>, output: &mut String) {
    let jobs = state.queue.job_counts();

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP skillmatrix_queue_jobs Jobs tracked by the queue by status"
    )
    .ok();
    writeln!(output, "# TYPE skillmatrix_queue_jobs gauge").ok();
    writeln!(output, "skillmatrix_queue_jobs{{status=\"queued\"}} {}", jobs.queued).ok();
    writeln!(
        output,
        "skillmatrix_queue_jobs{{status=\"in_progress\"}} {}",
        jobs.in_progress
    )
    .ok();
    writeln!(
        output,
        "skillmatrix_queue_jobs{{status=\"completed\"}} {}",
        jobs.completed
    )
    .ok();
    writeln!(output, "skillmatrix_queue_jobs{{status=\"failed\"}} {}", jobs.failed).ok();

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP skillmatrix_queue_connections_in_use Queue connections checked out"
    )
    .ok();
    writeln!(output, "# TYPE skillmatrix_queue_connections_in_use gauge").ok();
    writeln!(
        output,
        "skillmatrix_queue_connections_in_use {}",
        state.pool.in_use()
    )
    .ok();
}

/// Collect persisted user counts.
async fn collect_store_metrics(state: &Arc<AppState>, output: &mut String) {
    let stored = state.store.count().await;

    writeln!(output).ok();
    writeln!(output, "# HELP skillmatrix_users_stored Users persisted").ok();
    writeln!(output, "# TYPE skillmatrix_users_stored gauge").ok();
    writeln!(output, "skillmatrix_users_stored {stored}").ok();

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP skillmatrix_single_users_created_total Users created one at a time"
    )
    .ok();
    writeln!(output, "# TYPE skillmatrix_single_users_created_total counter").ok();
    writeln!(
        output,
        "skillmatrix_single_users_created_total {}",
        state.single_created()
    )
    .ok();
}
