//! # resume-ingest
//!
//! Backend library for batch resume ingestion with live progress delivery.
//!
//! A caller submits a batch of file ids pointing at a remote store; a
//! bounded-concurrency worker pool downloads and parses each file in fixed
//! chunks, and every chunk boundary pushes a progress snapshot to whichever
//! clients are watching that owner — over a server-sent event stream, a
//! WebSocket, or, through the cross-process bridge, a socket held by a
//! different process entirely. The durable batch record is always the
//! source of truth; live delivery is best-effort by design.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Failure containment** - One bad file never fails its batch; failed
//!   files are recorded as outcomes, not errors
//! - **Producer never blocks** - Slow subscribers are dropped, not waited on
//! - **Pluggable seams** - The file store, parser, task queue, and
//!   cross-process bridge are traits
//!
//! ## Quick Start
//!
//! ```no_run
//! use resume_ingest::{BatchCoordinator, Config};
//! use resume_ingest::ingest::{FileStore, ResumeParser};
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     store: Arc<dyn FileStore>,
//! #     parser: Arc<dyn ResumeParser>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = BatchCoordinator::start_local(Config::default(), store, parser).await?;
//!
//! // Serve the REST API (SSE + WebSocket progress endpoints included)
//! coordinator.spawn_api_server();
//!
//! // Submit work; progress reaches any subscriber for "user-1"
//! let (batch_id, task_ref) = coordinator
//!     .submit("user-1", vec!["file-a".into(), "file-b".into()])
//!     .await?;
//! println!("batch {batch_id} queued as {task_ref}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Collaborator interfaces (file store, resume parser)
pub mod ingest;
/// Batch coordination pipeline (state machine, worker pool, webhooks)
pub mod pipeline;
/// Live progress delivery (snapshot store, SSE hub, sockets, bridge)
pub mod progress;
/// Task queue seam and in-process implementation
pub mod queue;
/// Core types and progress messages
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{ApiError, BatchError, DatabaseError, Error, IngestError, Result, ToHttpStatus};
pub use ingest::{FileStore, RemoteFile, ResumeParser, StructuredResume};
pub use pipeline::{BatchCoordinator, ChunkedWorkerPool};
pub use progress::{EventStreamHub, InMemoryBridge, PresenceBridge, SnapshotStore, SocketRegistry};
pub use queue::{BatchRunner, LocalTaskQueue, TaskQueue, TaskState};
pub use types::{
    BatchId, BatchJob, BatchStatus, BatchStatusResponse, FileOutcome, ProgressMessage,
    ProgressSnapshot, SnapshotStatus,
};

use std::sync::Arc;

/// Helper function to run the coordinator with graceful signal handling.
///
/// Waits for a termination signal and then calls the coordinator's
/// `shutdown()` method, stopping the queue worker and bridge listener.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use resume_ingest::{BatchCoordinator, Config, run_with_shutdown};
/// use resume_ingest::ingest::{FileStore, ResumeParser};
/// use std::sync::Arc;
///
/// # async fn example(
/// #     store: Arc<dyn FileStore>,
/// #     parser: Arc<dyn ResumeParser>,
/// # ) -> Result<(), Box<dyn std::error::Error>> {
/// let coordinator = BatchCoordinator::start_local(Config::default(), store, parser).await?;
/// coordinator.spawn_api_server();
///
/// // Run with automatic signal handling
/// run_with_shutdown(coordinator).await;
/// # Ok(())
/// # }
/// ```
pub async fn run_with_shutdown(coordinator: Arc<BatchCoordinator>) {
    wait_for_signal().await;
    coordinator.shutdown();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
