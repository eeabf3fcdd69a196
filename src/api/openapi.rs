//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the resume-ingest REST
//! API using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the resume-ingest REST API
///
/// This struct is used to generate the OpenAPI 3.1 specification that describes
/// all available endpoints, request/response types, and API behavior.
///
/// The spec can be accessed via:
/// - `/api/v1/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "resume-ingest REST API",
        version = "0.2.0",
        description = "REST API for submitting resume batches and watching their processing progress live",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8095/api/v1", description = "Local development server")
    ),
    paths(
        // Batches
        crate::api::routes::submit_batch,
        crate::api::routes::get_batch_status,

        // Progress
        crate::api::routes::progress_stream,
        crate::api::routes::get_progress_snapshot,
        crate::api::routes::forget_progress,
        crate::api::routes::ws_progress,

        // System
        crate::api::routes::health_check,
        crate::api::routes::connection_stats,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::BatchStatus,
        crate::types::BatchJob,
        crate::types::BatchStatusResponse,
        crate::types::SubmitBatchRequest,
        crate::types::SubmitBatchResponse,
        crate::types::FileOutcome,
        crate::types::SnapshotStatus,
        crate::types::ProgressSnapshot,
        crate::types::ProgressMessage,
        crate::types::ConnectionStats,
        crate::types::WebhookPayload,

        // Config types from config.rs
        crate::config::Config,
        crate::config::ProcessingConfig,
        crate::config::StreamConfig,
        crate::config::BridgeConfig,
        crate::config::PersistenceConfig,
        crate::config::NotificationConfig,
        crate::config::WebhookConfig,
        crate::config::WebhookEvent,
        crate::config::ApiConfig,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "batches", description = "Batch management - Submit file batches and read their state"),
        (name = "progress", description = "Live progress - SSE streams, WebSocket, and snapshot administration"),
        (name = "system", description = "System endpoints - Health checks, diagnostics, OpenAPI spec"),
    )
)]
pub struct ApiDoc;
