//! REST API server module
//!
//! Exposes batch submission, status reads, both live progress transports
//! (SSE and WebSocket), and the snapshot administration surface.

use crate::pipeline::BatchCoordinator;
use crate::{Config, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Batches
/// - `POST /batches` - Submit a batch of file ids
/// - `GET /batches/:id` - Read a batch's state (plus queue diagnostic)
///
/// ## Progress
/// - `GET /progress/stream/:owner_id` - Server-sent events stream
/// - `GET /ws/progress/:owner_id` - Bidirectional progress socket
/// - `GET /progress/snapshot/:owner_id` - Read the current snapshot
/// - `DELETE /progress/:owner_id` - Forget an owner's progress bookkeeping
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /connections` - Live-connection diagnostics
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
pub fn create_router(coordinator: Arc<BatchCoordinator>, config: Arc<Config>) -> Router {
    let state = AppState::new(coordinator, config.clone());

    // Build the router with all routes
    let router = Router::new()
        // Batches
        .route("/batches", post(routes::submit_batch))
        .route("/batches/:id", get(routes::get_batch_status))
        // Progress
        .route("/progress/stream/:owner_id", get(routes::progress_stream))
        .route("/ws/progress/:owner_id", get(routes::ws_progress))
        .route(
            "/progress/snapshot/:owner_id",
            get(routes::get_progress_snapshot),
        )
        .route("/progress/:owner_id", delete(routes::forget_progress))
        // System
        .route("/health", get(routes::health_check))
        .route("/connections", get(routes::connection_stats))
        .route("/openapi.json", get(routes::openapi_spec));

    // Merge Swagger UI routes if enabled in config (before applying state)
    // Note: SwaggerUi will use the existing /openapi.json endpoint we already defined
    let router = if config.server.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api/v1/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    // Add state to all routes
    let router = router.with_state(state);

    // Apply CORS middleware if enabled in config
    if config.server.api.cors_enabled {
        let cors = build_cors_layer(&config.server.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// # Arguments
///
/// * `origins` - List of allowed origins (supports "*" for any origin)
///
/// # Returns
///
/// A configured CorsLayer that allows the specified origins, all methods,
/// and all headers for cross-origin requests.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    // Check if "*" (all origins) is in the list
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        // Allow all origins (default for local development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        // Allow specific origins
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// This function creates a TCP listener, binds it to the configured address,
/// and starts serving the API router. It runs until the server is shut down.
///
/// # Arguments
///
/// * `coordinator` - Arc-wrapped BatchCoordinator instance to handle API requests
/// * `config` - Arc-wrapped Config containing API configuration
///
/// # Returns
///
/// Returns a Result<()> that completes when the server stops, either due to
/// an error or graceful shutdown.
pub async fn start_api_server(
    coordinator: Arc<BatchCoordinator>,
    config: Arc<Config>,
) -> Result<()> {
    let bind_address = config.server.api.bind_address;

    tracing::info!(
        address = %bind_address,
        "Starting API server"
    );

    // Create the router with all routes
    let app = create_router(coordinator, config);

    // Bind TCP listener to the configured address
    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %bind_address,
        "API server listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
