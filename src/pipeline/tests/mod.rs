use super::test_helpers::{MockFileStore, MockParser, UNPARSEABLE, create_test_coordinator};
use super::*;
use crate::db::NewBatch;
use crate::error::BatchError;
use crate::types::{BatchStatus, ProgressMessage, SnapshotStatus};
use std::time::Duration;

// ── Worker pool ─────────────────────────────────────────────────────────

fn pool_with(
    store: Arc<MockFileStore>,
    parser: Arc<MockParser>,
    mutate: impl FnOnce(&mut crate::config::Config),
) -> ChunkedWorkerPool {
    let mut config = crate::config::Config::default();
    mutate(&mut config);
    ChunkedWorkerPool::new(store, parser, Arc::new(config))
}

fn ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("file-{i}")).collect()
}

#[tokio::test]
async fn pool_processes_every_file_successfully() {
    let store = Arc::new(MockFileStore::new());
    let pool = pool_with(store, Arc::new(MockParser::new()), |_| {});

    let outcomes = pool.process(&ids(3)).await;

    assert_eq!(outcomes.len(), 3);
    for outcome in &outcomes {
        assert!(outcome.success, "unexpected failure: {outcome:?}");
        assert!(outcome.error_message.is_none());
        assert_eq!(outcome.filename, format!("{}.pdf", outcome.file_id));
    }
}

#[tokio::test]
async fn one_failing_download_never_affects_the_rest_of_the_chunk() {
    let store = Arc::new(MockFileStore::new().failing_download("file-2"));
    let pool = pool_with(store, Arc::new(MockParser::new()), |_| {});

    let outcomes = pool.process(&ids(5)).await;

    assert_eq!(outcomes.len(), 5);
    let failed: Vec<_> = outcomes.iter().filter(|o| !o.success).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].file_id, "file-2");
    assert!(
        failed[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("download failed")
    );
    assert_eq!(outcomes.iter().filter(|o| o.success).count(), 4);
}

#[tokio::test]
async fn parse_failure_becomes_a_failed_outcome() {
    let store = Arc::new(MockFileStore::new().with_file(
        "file-1",
        "garbled.pdf",
        Some("application/pdf"),
        UNPARSEABLE,
    ));
    let pool = pool_with(store, Arc::new(MockParser::new()), |_| {});

    let outcomes = pool.process(&["file-1".to_string()]).await;

    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].success);
    assert!(
        outcomes[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("parse failed")
    );
    assert_eq!(outcomes[0].filename, "garbled.pdf");
}

#[tokio::test]
async fn disallowed_content_type_is_rejected_as_an_outcome() {
    let store = Arc::new(MockFileStore::new().with_file(
        "file-1",
        "photo.png",
        Some("image/png"),
        b"not a resume",
    ));
    let pool = pool_with(store, Arc::new(MockParser::new()), |_| {});

    let outcomes = pool.process(&["file-1".to_string()]).await;

    assert!(!outcomes[0].success);
    assert_eq!(
        outcomes[0].error_message.as_deref(),
        Some("unsupported file type: image/png")
    );
}

#[tokio::test]
async fn content_type_falls_back_to_filename_when_store_reports_none() {
    let store = Arc::new(MockFileStore::new().with_file(
        "file-1",
        "resume.docx",
        None,
        b"resume body",
    ));
    let pool = pool_with(store, Arc::new(MockParser::new()), |_| {});

    let outcomes = pool.process(&["file-1".to_string()]).await;
    assert!(outcomes[0].success, "docx guessed from filename should pass");
}

#[tokio::test]
async fn slow_parse_times_out_with_the_bare_timeout_message() {
    let store = Arc::new(MockFileStore::new());
    let parser = Arc::new(MockParser::new().with_delay(Duration::from_millis(300)));
    let pool = pool_with(store, parser, |config| {
        config.processing.item_timeout = Duration::from_millis(30);
    });

    let outcomes = pool.process(&["file-1".to_string()]).await;

    assert!(!outcomes[0].success);
    assert_eq!(outcomes[0].error_message.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn in_flight_items_are_bounded_by_the_configured_concurrency() {
    let store = Arc::new(MockFileStore::new().with_delay(Duration::from_millis(40)));
    let pool = pool_with(Arc::clone(&store), Arc::new(MockParser::new()), |config| {
        config.processing.chunk_concurrency = 2;
    });

    let outcomes = pool.process(&ids(8)).await;

    assert_eq!(outcomes.len(), 8);
    assert!(
        store.max_in_flight() <= 2,
        "observed {} concurrent downloads with limit 2",
        store.max_in_flight()
    );
}

#[tokio::test]
async fn every_input_id_gets_exactly_one_outcome() {
    let store = Arc::new(MockFileStore::new().failing_download("file-0"));
    let pool = pool_with(store, Arc::new(MockParser::new()), |_| {});

    let input = ids(6);
    let outcomes = pool.process(&input).await;

    let mut outcome_ids: Vec<_> = outcomes.iter().map(|o| o.file_id.clone()).collect();
    outcome_ids.sort();
    let mut expected = input.clone();
    expected.sort();
    assert_eq!(outcome_ids, expected);
}

// ── Coordinator ─────────────────────────────────────────────────────────

#[tokio::test]
async fn submit_rejects_an_empty_file_list() {
    let (coordinator, _temp) = create_test_coordinator(
        Arc::new(MockFileStore::new()),
        Arc::new(MockParser::new()),
        |_| {},
    )
    .await;

    let err = coordinator.submit("user-1", vec![]).await.unwrap_err();
    assert!(matches!(err, Error::Batch(BatchError::EmptyFileList)));
}

#[tokio::test]
async fn seven_files_one_failure_yields_two_pushes_and_one_failed_outcome() {
    // 7 ids at chunk size 5, with one failure landing in the second chunk
    let store = Arc::new(MockFileStore::new().failing_download("file-5"));
    let (coordinator, _temp) =
        create_test_coordinator(store, Arc::new(MockParser::new()), |_| {}).await;

    let batch_id = coordinator
        .db
        .insert_batch(&NewBatch {
            owner_id: "user-1".to_string(),
            file_ids: ids(7),
        })
        .await
        .unwrap();

    // Subscribe before running so every push is observed
    let mut handle = coordinator.progress().hub.subscribe("user-1");

    coordinator.run(batch_id).await.unwrap();

    let connected = handle.next_frame(Duration::from_secs(1)).await.unwrap();
    assert!(matches!(connected, ProgressMessage::Connected { .. }));

    let first_push = handle.next_frame(Duration::from_secs(1)).await.unwrap();
    match &first_push {
        ProgressMessage::Progress { data, .. } => {
            assert_eq!(data.completed, 5);
            assert_eq!(data.total, 7);
            assert_eq!(data.status, SnapshotStatus::Processing);
        }
        other => panic!("expected Progress for chunk 1, got {other:?}"),
    }

    let terminal = handle.next_frame(Duration::from_secs(1)).await.unwrap();
    match &terminal {
        ProgressMessage::TaskComplete { data, .. } => {
            assert_eq!(data.completed, 7);
            assert_eq!(data.total, 7);
            let results = data.results.as_ref().unwrap();
            assert_eq!(results.len(), 7);
            let failures: Vec<_> = results.iter().filter(|o| !o.success).collect();
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].file_id, "file-5");
        }
        other => panic!("expected TaskComplete, got {other:?}"),
    }

    // Terminal message ends the stream: exactly two pushes happened
    assert!(handle.next_frame(Duration::from_millis(100)).await.is_none());

    // Durable record
    let job = coordinator.db.get_batch_job(batch_id).await.unwrap().unwrap();
    assert_eq!(job.status, BatchStatus::Completed);
    assert_eq!(job.processed_files, 7);
    assert_eq!(job.successful_files, 6);
    assert_eq!(job.failed_files, 1);
    assert_eq!(job.failed_file_ids, vec!["file-5"]);
    assert_eq!(job.progress_percentage, 100.0);
    assert_eq!(
        job.processed_files,
        job.completed_file_ids.len() + job.failed_file_ids.len()
    );
    assert!(job.completed_at.is_some());

    let summary = job.summary.unwrap();
    assert_eq!(summary["failed_files"], 1);
    assert_eq!(summary["successful_files"], 6);
    let failed_outcomes: Vec<_> = summary["outcomes"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|o| o["success"] == false)
        .collect();
    assert_eq!(failed_outcomes.len(), 1);
}

#[tokio::test]
async fn submitted_batch_runs_to_completion_through_the_queue() {
    let (coordinator, _temp) = create_test_coordinator(
        Arc::new(MockFileStore::new()),
        Arc::new(MockParser::new()),
        |_| {},
    )
    .await;

    let (batch_id, task_ref) = coordinator.submit("user-1", ids(3)).await.unwrap();
    assert!(task_ref.starts_with("local-"));

    // Submission returns immediately; poll until the worker finishes
    let mut status = None;
    for _ in 0..200 {
        let response = coordinator.get_status(batch_id).await.unwrap();
        if response.batch.status.is_terminal() {
            status = Some(response);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let response = status.expect("batch should reach a terminal state");

    assert_eq!(response.batch.status, BatchStatus::Completed);
    assert_eq!(response.batch.processed_files, 3);
    assert_eq!(response.batch.successful_files, 3);
    assert_eq!(response.batch.worker_task_ref.as_deref(), Some(task_ref.as_str()));
}

#[tokio::test]
async fn queue_state_diagnostic_reaches_succeeded() {
    let (coordinator, _temp) = create_test_coordinator(
        Arc::new(MockFileStore::new()),
        Arc::new(MockParser::new()),
        |_| {},
    )
    .await;

    let (batch_id, _task_ref) = coordinator.submit("user-1", ids(1)).await.unwrap();

    let mut queue_state = None;
    for _ in 0..200 {
        let response = coordinator.get_status(batch_id).await.unwrap();
        if response.queue_state.as_deref() == Some("succeeded") {
            queue_state = response.queue_state;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(queue_state.as_deref(), Some("succeeded"));
}

#[tokio::test]
async fn counters_satisfy_invariants_at_every_observed_state() {
    let store = Arc::new(
        MockFileStore::new()
            .failing_download("file-1")
            .with_delay(Duration::from_millis(5)),
    );
    let (coordinator, _temp) =
        create_test_coordinator(store, Arc::new(MockParser::new()), |_| {}).await;

    let (batch_id, _task_ref) = coordinator.submit("user-1", ids(12)).await.unwrap();

    // Observe the record repeatedly while it is being processed
    loop {
        let job = coordinator.get_status(batch_id).await.unwrap().batch;
        assert_eq!(job.processed_files, job.successful_files + job.failed_files);
        assert!(job.processed_files <= job.total_files);
        assert_eq!(job.successful_files, job.completed_file_ids.len());
        if job.status.is_terminal() {
            assert_eq!(job.processed_files, job.total_files);
            assert_eq!(job.failed_files, 1);
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn run_on_a_missing_batch_fails() {
    let (coordinator, _temp) = create_test_coordinator(
        Arc::new(MockFileStore::new()),
        Arc::new(MockParser::new()),
        |_| {},
    )
    .await;

    let err = coordinator.run(crate::types::BatchId(999)).await.unwrap_err();
    assert!(matches!(err, Error::Batch(BatchError::NotFound { .. })));
}

#[tokio::test]
async fn batch_fatal_error_marks_failed_and_pushes_terminal_error() {
    let (coordinator, _temp) = create_test_coordinator(
        Arc::new(MockFileStore::new()),
        Arc::new(MockParser::new()),
        |_| {},
    )
    .await;

    let batch_id = coordinator
        .db
        .insert_batch(&NewBatch {
            owner_id: "user-1".to_string(),
            file_ids: ids(4),
        })
        .await
        .unwrap();
    // Force a lifecycle violation: the run finds the batch already PROCESSING
    coordinator.db.mark_processing(batch_id).await.unwrap();

    let mut handle = coordinator.progress().hub.subscribe("user-1");

    let err = coordinator.run(batch_id).await.unwrap_err();
    assert!(matches!(err, Error::Batch(BatchError::InvalidState { .. })));

    let job = coordinator.db.get_batch_job(batch_id).await.unwrap().unwrap();
    assert_eq!(job.status, BatchStatus::Failed);
    assert!(job.status_message.contains("cannot run batch"));
    assert!(job.completed_at.is_some());

    let _connected = handle.next_frame(Duration::from_secs(1)).await.unwrap();
    let terminal = handle.next_frame(Duration::from_secs(1)).await.unwrap();
    match &terminal {
        ProgressMessage::Error { message, .. } => {
            assert!(message.contains("cannot run batch"));
        }
        other => panic!("expected Error frame, got {other:?}"),
    }
    assert!(handle.next_frame(Duration::from_millis(100)).await.is_none());
}

#[tokio::test]
async fn terminal_snapshot_remains_available_for_late_readers() {
    let (coordinator, _temp) = create_test_coordinator(
        Arc::new(MockFileStore::new()),
        Arc::new(MockParser::new()),
        |_| {},
    )
    .await;

    let batch_id = coordinator
        .db
        .insert_batch(&NewBatch {
            owner_id: "user-1".to_string(),
            file_ids: ids(2),
        })
        .await
        .unwrap();
    coordinator.run(batch_id).await.unwrap();

    // A client that never held a connection can still read the last state
    let snapshot = coordinator.progress().get_snapshot("user-1").unwrap();
    assert_eq!(snapshot.status, SnapshotStatus::Completed);
    assert_eq!(snapshot.completed, 2);

    // And a late stream subscriber gets it replayed
    let mut handle = coordinator.progress().hub.subscribe("user-1");
    let _connected = handle.next_frame(Duration::from_secs(1)).await.unwrap();
    let replayed = handle.next_frame(Duration::from_secs(1)).await.unwrap();
    assert!(matches!(replayed, ProgressMessage::TaskComplete { .. }));
}

#[tokio::test]
async fn submit_after_shutdown_is_refused() {
    let (coordinator, _temp) = create_test_coordinator(
        Arc::new(MockFileStore::new()),
        Arc::new(MockParser::new()),
        |_| {},
    )
    .await;

    coordinator.shutdown();
    let err = coordinator.submit("user-1", ids(1)).await.unwrap_err();
    assert!(matches!(err, Error::ShuttingDown));
}

#[tokio::test]
async fn completed_batch_fires_configured_webhook() {
    use crate::config::{WebhookConfig, WebhookEvent};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("Authorization", "Bearer hook-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let hook_url = format!("{}/hook", server.uri());
    let (coordinator, _temp) = create_test_coordinator(
        Arc::new(MockFileStore::new().failing_download("file-1")),
        Arc::new(MockParser::new()),
        |config| {
            config.notifications.webhooks.push(WebhookConfig {
                url: hook_url,
                events: vec![WebhookEvent::OnCompleted],
                timeout: Duration::from_secs(5),
                auth_header: Some("Bearer hook-token".to_string()),
            });
        },
    )
    .await;

    let batch_id = coordinator
        .db
        .insert_batch(&NewBatch {
            owner_id: "user-1".to_string(),
            file_ids: ids(3),
        })
        .await
        .unwrap();
    coordinator.run(batch_id).await.unwrap();

    // Webhook delivery is fire-and-forget; wait for it to land
    let mut requests = Vec::new();
    for _ in 0..200 {
        requests = server.received_requests().await.unwrap();
        if !requests.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(requests.len(), 1, "exactly one webhook POST expected");

    let payload: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(payload["event"], "completed");
    assert_eq!(payload["owner_id"], "user-1");
    assert_eq!(payload["total_files"], 3);
    assert_eq!(payload["successful_files"], 2);
    assert_eq!(payload["failed_files"], 1);
}

#[tokio::test]
async fn socket_subscribers_receive_the_terminal_push() {
    let (coordinator, _temp) = create_test_coordinator(
        Arc::new(MockFileStore::new()),
        Arc::new(MockParser::new()),
        |_| {},
    )
    .await;

    let batch_id = coordinator
        .db
        .insert_batch(&NewBatch {
            owner_id: "user-1".to_string(),
            file_ids: ids(2),
        })
        .await
        .unwrap();

    let mut conn = coordinator.progress().sockets.register("user-1").await;
    coordinator.run(batch_id).await.unwrap();

    let message = tokio::time::timeout(Duration::from_secs(1), conn.recv())
        .await
        .unwrap()
        .unwrap();
    match message {
        ProgressMessage::TaskComplete { data, .. } => {
            assert_eq!(data.completed, 2);
        }
        other => panic!("expected TaskComplete on socket, got {other:?}"),
    }
    conn.close().await;
}
