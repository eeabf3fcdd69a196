//! Batch handlers: submission and status reads.

use crate::Result;
use crate::api::AppState;
use crate::types::{BatchId, BatchStatusResponse, SubmitBatchRequest, SubmitBatchResponse};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

/// POST /batches - Submit a batch of file ids for processing
///
/// Returns 202 immediately; the work runs on the task queue. Progress is
/// observable on the owner's stream and socket endpoints, and the durable
/// state via `GET /batches/{id}`.
#[utoipa::path(
    post,
    path = "/api/v1/batches",
    tag = "batches",
    request_body = SubmitBatchRequest,
    responses(
        (status = 202, description = "Batch accepted for processing", body = SubmitBatchResponse),
        (status = 422, description = "Empty file list", body = crate::error::ApiError),
        (status = 502, description = "Task queue unavailable", body = crate::error::ApiError)
    )
)]
pub async fn submit_batch(
    State(state): State<AppState>,
    Json(request): Json<SubmitBatchRequest>,
) -> Result<impl IntoResponse> {
    let (batch_id, task_ref) = state
        .coordinator
        .submit(&request.owner_id, request.file_ids)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitBatchResponse { batch_id, task_ref }),
    ))
}

/// GET /batches/{id} - Read a batch's state
///
/// The `queue_state` field carries the task queue's own view of the run as
/// extra diagnostic; `batch.status` is the source of truth.
#[utoipa::path(
    get,
    path = "/api/v1/batches/{id}",
    tag = "batches",
    params(
        ("id" = i64, Path, description = "Batch ID")
    ),
    responses(
        (status = 200, description = "Batch state", body = BatchStatusResponse),
        (status = 404, description = "Batch not found", body = crate::error::ApiError)
    )
)]
pub async fn get_batch_status(
    State(state): State<AppState>,
    Path(id): Path<BatchId>,
) -> Result<Json<BatchStatusResponse>> {
    let response = state.coordinator.get_status(id).await?;
    Ok(Json(response))
}
