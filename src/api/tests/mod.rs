use super::*;
use crate::pipeline::test_helpers::{MockFileStore, MockParser, create_test_coordinator};
use crate::types::{BatchStatus, BatchStatusResponse, SubmitBatchResponse};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tower::ServiceExt;

/// Helper to create a test coordinator with default mocks
async fn test_app() -> (Router, Arc<BatchCoordinator>, tempfile::NamedTempFile) {
    let (coordinator, temp) = create_test_coordinator(
        Arc::new(MockFileStore::new()),
        Arc::new(MockParser::new()),
        |_| {},
    )
    .await;
    let config = coordinator.get_config();
    let app = create_router(coordinator.clone(), config);
    (app, coordinator, temp)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _coordinator, _temp) = test_app().await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_cors_headers_present_when_enabled() {
    let (app, _coordinator, _temp) = test_app().await;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_submit_batch_returns_202_and_runs() {
    let (app, coordinator, _temp) = test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/batches")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({
                "owner_id": "user-1",
                "file_ids": ["file-0", "file-1"]
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let submitted: SubmitBatchResponse = serde_json::from_value(body_json(response).await).unwrap();
    assert!(submitted.task_ref.starts_with("local-"));

    // The queue worker picks it up; the durable record becomes terminal
    let mut terminal = None;
    for _ in 0..200 {
        let status = coordinator.get_status(submitted.batch_id).await.unwrap();
        if status.batch.status.is_terminal() {
            terminal = Some(status.batch);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let batch = terminal.expect("batch should finish");
    assert_eq!(batch.status, BatchStatus::Completed);
    assert_eq!(batch.successful_files, 2);
}

#[tokio::test]
async fn test_submit_empty_batch_is_rejected() {
    let (app, _coordinator, _temp) = test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/batches")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({
                "owner_id": "user-1",
                "file_ids": []
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "empty_file_list");
}

#[tokio::test]
async fn test_get_missing_batch_is_404() {
    let (app, _coordinator, _temp) = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/batches/999")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "batch_not_found");
    assert_eq!(json["error"]["details"]["batch_id"], 999);
}

#[tokio::test]
async fn test_get_batch_status_includes_queue_diagnostic() {
    let (app, coordinator, _temp) = test_app().await;

    let (batch_id, _task_ref) = coordinator
        .submit("user-1", vec!["file-0".to_string()])
        .await
        .unwrap();

    // Wait for the run to finish, then read through the HTTP surface
    for _ in 0..200 {
        if coordinator
            .get_status(batch_id)
            .await
            .unwrap()
            .batch
            .status
            .is_terminal()
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/batches/{batch_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let status: BatchStatusResponse = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(status.batch.batch_id, batch_id);
    assert!(status.queue_state.is_some(), "diagnostic should be present");
}

#[tokio::test]
async fn test_snapshot_endpoint_404_then_200_after_a_push() {
    let (app, coordinator, _temp) = test_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/progress/snapshot/user-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Run a batch to produce a terminal snapshot
    let batch_id = coordinator
        .db
        .insert_batch(&crate::db::NewBatch {
            owner_id: "user-1".to_string(),
            file_ids: vec!["file-0".to_string()],
        })
        .await
        .unwrap();
    coordinator.run(batch_id).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/progress/snapshot/user-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "completed");
    assert_eq!(json["total"], 1);
}

#[tokio::test]
async fn test_forget_clears_snapshot() {
    let (app, coordinator, _temp) = test_app().await;

    let batch_id = coordinator
        .db
        .insert_batch(&crate::db::NewBatch {
            owner_id: "user-1".to_string(),
            file_ids: vec!["file-0".to_string()],
        })
        .await
        .unwrap();
    coordinator.run(batch_id).await.unwrap();
    assert!(coordinator.progress().get_snapshot("user-1").is_some());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/progress/user-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(coordinator.progress().get_snapshot("user-1").is_none());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/progress/snapshot/user-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_connection_stats_endpoint() {
    let (app, coordinator, _temp) = test_app().await;

    // One buffered owner: deliver with no connections anywhere
    coordinator
        .progress()
        .sockets
        .deliver(
            "user-1",
            crate::types::ProgressMessage::from_snapshot(
                &crate::types::ProgressSnapshot::processing(1, 2, "half"),
            ),
        )
        .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/connections")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["stream_subscribers"], 0);
    assert_eq!(json["socket_connections"], 0);
    assert_eq!(json["pending_owners"], 1);
}

#[tokio::test]
async fn test_openapi_endpoint_serves_spec() {
    let (app, _coordinator, _temp) = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["openapi"].as_str().unwrap().starts_with("3."));
    assert!(json["paths"].is_object());
}

#[tokio::test]
async fn test_api_server_spawns() {
    let (_app, coordinator, _temp) = test_app().await;

    // Use a random available port for testing
    let mut config = (*coordinator.get_config()).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let api_handle = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { start_api_server(coordinator, config).await }
    });

    // Give it a moment to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    api_handle.abort();
}
