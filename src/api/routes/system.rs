//! System handlers: health, connection diagnostics, OpenAPI.

use crate::api::AppState;
use crate::types::ConnectionStats;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

/// GET /health - Health check
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy")
    )
)]
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GET /connections - Live-connection diagnostics
#[utoipa::path(
    get,
    path = "/api/v1/connections",
    tag = "system",
    responses(
        (status = 200, description = "Current subscriber and connection counts", body = ConnectionStats)
    )
)]
pub async fn connection_stats(State(state): State<AppState>) -> impl IntoResponse {
    let progress = state.coordinator.progress();
    let stats = ConnectionStats {
        stream_subscribers: progress.hub.subscriber_count(),
        socket_connections: progress.sockets.connection_count(),
        pending_owners: progress.sockets.pending_owner_count(),
    };
    (StatusCode::OK, Json(stats))
}

/// GET /openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/api/v1/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI 3.1 specification in JSON format")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}
