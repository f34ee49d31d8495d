//! Health and metrics handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::http::responses::HealthResponse;
use crate::state::AppState;

/// Health check endpoint.
///
/// Answers 503 once the queue pool is shut down and bulk uploads can no
/// longer be accepted.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let accepting = !state.pool.is_shut_down();
    let (code, status) = if accepting {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting_down")
    };

    let body = HealthResponse {
        status: status.to_string(),
        queue: state.pool.queue_name().to_string(),
        connections_in_use: state.pool.in_use(),
        users_stored: state.store.count().await,
    };
    (code, Json(body))
}

/// Prometheus metrics endpoint.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = crate::metrics::collect_metrics(&state).await;
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}
