//! Progress stream handlers: SSE endpoint and snapshot administration.

use crate::api::AppState;
use crate::error::ApiError;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event as SseEvent, Sse},
    },
};
use std::convert::Infallible;
use tokio_stream::StreamExt;

/// GET /progress/stream/{owner_id} - Server-sent events stream
///
/// Long-lived response of `data: <json>` frames. The first frame is a
/// `connected` message, followed by a replay of the owner's current
/// snapshot if one exists, then live pushes. Idle periods produce
/// `keepalive` frames; a terminal message (`task_complete` or `error`)
/// closes the stream.
#[utoipa::path(
    get,
    path = "/api/v1/progress/stream/{owner_id}",
    tag = "progress",
    params(
        ("owner_id" = String, Path, description = "Owner whose progress to stream")
    ),
    responses(
        (status = 200, description = "Server-sent events stream (text/event-stream)", content_type = "text/event-stream")
    )
)]
pub async fn progress_stream(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let handle = state.coordinator.progress().hub.subscribe(&owner_id);
    let keepalive = state.config.stream.keepalive_interval;

    // Keepalives are explicit in-band frames, so axum's own keep-alive
    // comment mechanism is not used here.
    let sse_stream = handle
        .into_stream(keepalive)
        .filter_map(|message| match serde_json::to_string(&message) {
            Ok(json_data) => Some(Ok(SseEvent::default().data(json_data))),
            Err(e) => {
                tracing::warn!("Failed to serialize progress message to JSON: {}", e);
                None
            }
        });

    Sse::new(sse_stream)
}

/// GET /progress/snapshot/{owner_id} - Read the current snapshot
#[utoipa::path(
    get,
    path = "/api/v1/progress/snapshot/{owner_id}",
    tag = "progress",
    params(
        ("owner_id" = String, Path, description = "Owner whose snapshot to read")
    ),
    responses(
        (status = 200, description = "Current progress snapshot", body = crate::types::ProgressSnapshot),
        (status = 404, description = "No snapshot for this owner", body = crate::error::ApiError)
    )
)]
pub async fn get_progress_snapshot(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> impl IntoResponse {
    match state.coordinator.progress().get_snapshot(&owner_id) {
        Some(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiError::not_found(format!("snapshot for {owner_id}"))),
        )
            .into_response(),
    }
}

/// DELETE /progress/{owner_id} - Forget an owner's progress bookkeeping
///
/// Clears the stored snapshot, disconnects stream subscribers, and discards
/// pending socket messages. The durable batch record is untouched.
#[utoipa::path(
    delete,
    path = "/api/v1/progress/{owner_id}",
    tag = "progress",
    params(
        ("owner_id" = String, Path, description = "Owner whose bookkeeping to clear")
    ),
    responses(
        (status = 204, description = "Progress bookkeeping cleared")
    )
)]
pub async fn forget_progress(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> impl IntoResponse {
    state.coordinator.progress().forget(&owner_id);
    StatusCode::NO_CONTENT
}
