//! User creation handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, info, warn};

use skillmatrix_core::{CoreError, RawRecord};
use skillmatrix_ingest::{IngestError, StoreError};

use crate::http::responses::{
    BulkUploadResponse, CreateUsersRequest, ErrorResponse, SingleUserResponse,
};
use crate::state::AppState;

/// Create users, one or many, as chosen by the request's `mode`.
pub async fn create_users(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateUsersRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(CreateUsersRequest::Single { user })) => create_single(&state, user).await,
        Ok(Json(CreateUsersRequest::Bulk { users })) => ingest_batch(&state, users).await,
        Err(rejection) => malformed(rejection),
    }
}

/// Bulk upload of a raw JSON array of user records.
pub async fn create_bulk_users(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Vec<RawRecord>>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(users)) => ingest_batch(&state, users).await,
        Err(rejection) => malformed(rejection),
    }
}

async fn create_single(state: &AppState, user: RawRecord) -> Response {
    if let Some(field) = state.ingestor.required_fields().first_blank(&user) {
        return error_response(StatusCode::BAD_REQUEST, format!("Field '{}' is required", field));
    }

    match state.store.create_record(&user).await {
        Ok(()) => {
            state.single_user_created();
            info!(user = %user.reference(1), "User created");
            (
                StatusCode::CREATED,
                Json(SingleUserResponse {
                    message: "User created successfully!".to_string(),
                    success: true,
                }),
            )
                .into_response()
        }
        Err(e @ StoreError::Backend(_)) => {
            error!(error = %e, "Single user creation failed");
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
        Err(e) => {
            warn!(error = %e, "Single user rejected");
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

async fn ingest_batch(state: &AppState, users: Vec<RawRecord>) -> Response {
    match state.ingestor.ingest(&users).await {
        Ok(summary) => (
            StatusCode::CREATED,
            Json(BulkUploadResponse::from(summary)),
        )
            .into_response(),
        Err(e) => {
            let status = ingest_error_status(&e);
            if status.is_server_error() {
                error!(error = %e, "User bulk upload failed");
            } else {
                warn!(error = %e, "User bulk upload rejected");
            }
            error_response(status, e.to_string())
        }
    }
}

/// Status code for a batch-fatal error.
fn ingest_error_status(error: &IngestError) -> StatusCode {
    match error {
        IngestError::Core(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
        IngestError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        IngestError::QueueUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn malformed(rejection: JsonRejection) -> Response {
    let error = CoreError::Validation(format!("malformed input: {}", rejection.body_text()));
    warn!(error = %error, "Rejected request body");
    error_response(StatusCode::BAD_REQUEST, error.to_string())
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}
