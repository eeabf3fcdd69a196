//! Batch coordination pipeline.
//!
//! The `BatchCoordinator` struct and its methods are organized by domain:
//! - [`worker_pool`] - Bounded-concurrency per-file execution
//! - [`runner`] - The batch state machine and chunk loop
//! - [`webhooks`] - Terminal-state webhook notifications

pub mod worker_pool;

mod runner;
mod webhooks;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use worker_pool::ChunkedWorkerPool;

use crate::config::Config;
use crate::db::{Database, NewBatch};
use crate::error::{BatchError, Error, Result};
use crate::ingest::{FileStore, ResumeParser};
use crate::progress::{
    EventStreamHub, InMemoryBridge, PresenceBridge, ProgressRouter, SnapshotStore, SocketRegistry,
    spawn_bridge_listener,
};
use crate::queue::{BatchRunner, LocalTaskQueue, TaskQueue};
use crate::types::{BatchId, BatchStatusResponse};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Coordinates batch submission, execution, and progress delivery
///
/// All fields are Arc-wrapped, so cloning is cheap and every clone shares
/// the same registries and database handle.
#[derive(Clone)]
pub struct BatchCoordinator {
    /// Database instance for persistence
    /// Public for integration tests to query batch state
    pub db: Arc<Database>,
    pub(crate) config: Arc<Config>,
    pub(crate) pool: Arc<ChunkedWorkerPool>,
    pub(crate) progress: ProgressRouter,
    pub(crate) queue: Arc<dyn TaskQueue>,
    pub(crate) shutdown_token: CancellationToken,
}

impl BatchCoordinator {
    /// Create a coordinator over the given collaborators
    ///
    /// Builds fresh progress registries wired to `bridge`. The task queue is
    /// injected so deployments can swap the in-process queue for a
    /// distributed one without touching the coordinator.
    pub fn new(
        config: Arc<Config>,
        db: Arc<Database>,
        store: Arc<dyn FileStore>,
        parser: Arc<dyn ResumeParser>,
        bridge: Arc<dyn PresenceBridge>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        let snapshots = Arc::new(SnapshotStore::new());
        let hub = Arc::new(EventStreamHub::new(
            Arc::clone(&snapshots),
            config.stream.queue_capacity,
        ));
        let sockets = Arc::new(SocketRegistry::new(
            bridge,
            config.bridge.presence_ttl,
            config.bridge.pending_limit,
        ));
        let progress = ProgressRouter::new(snapshots, hub, sockets);
        let pool = Arc::new(ChunkedWorkerPool::new(store, parser, Arc::clone(&config)));

        Self {
            db,
            config,
            pool,
            progress,
            queue,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Convenience constructor wiring an in-process queue and bridge
    ///
    /// Opens the database at the configured path, builds the coordinator
    /// with a [`LocalTaskQueue`] and [`InMemoryBridge`], and starts the
    /// background workers. This is the single-process deployment shape;
    /// multi-process deployments construct via [`new`](Self::new) with
    /// shared implementations.
    pub async fn start_local(
        config: Config,
        store: Arc<dyn FileStore>,
        parser: Arc<dyn ResumeParser>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let config = Arc::new(config);
        let db = Arc::new(Database::new(&config.persistence.database_path).await?);
        let queue = Arc::new(LocalTaskQueue::new());
        let bridge: Arc<dyn PresenceBridge> = Arc::new(InMemoryBridge::new());

        let coordinator = Arc::new(Self::new(
            Arc::clone(&config),
            db,
            store,
            parser,
            bridge,
            Arc::clone(&queue) as Arc<dyn TaskQueue>,
        ));
        coordinator.spawn_local_workers(&queue);

        Ok(coordinator)
    }

    /// Start the in-process queue worker and bridge listener
    ///
    /// Both stop when [`shutdown`](Self::shutdown) fires.
    pub fn spawn_local_workers(
        self: &Arc<Self>,
        queue: &LocalTaskQueue,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let runner: Arc<dyn BatchRunner> = Arc::clone(self) as Arc<dyn BatchRunner>;
        vec![
            queue.start(runner, self.shutdown_token.child_token()),
            spawn_bridge_listener(
                Arc::clone(&self.progress.sockets),
                self.shutdown_token.child_token(),
            ),
        ]
    }

    /// Submit a batch of file ids for processing
    ///
    /// Creates the PENDING record, enqueues the run on the task queue, and
    /// returns immediately with the batch id and the queue's task handle.
    pub async fn submit(&self, owner_id: &str, file_ids: Vec<String>) -> Result<(BatchId, String)> {
        if file_ids.is_empty() {
            return Err(Error::Batch(BatchError::EmptyFileList));
        }
        if self.shutdown_token.is_cancelled() {
            return Err(Error::ShuttingDown);
        }

        let batch_id = self
            .db
            .insert_batch(&NewBatch {
                owner_id: owner_id.to_string(),
                file_ids,
            })
            .await?;

        let task_ref = match self.queue.enqueue(batch_id).await {
            Ok(task_ref) => task_ref,
            Err(e) => {
                // The record exists but no worker will ever pick it up
                if let Err(db_err) = self.db.mark_failed(batch_id, &e.to_string()).await {
                    tracing::error!(batch_id = batch_id.0, error = %db_err, "failed to record enqueue failure");
                }
                return Err(e);
            }
        };
        self.db.set_task_ref(batch_id, &task_ref).await?;

        tracing::info!(
            batch_id = batch_id.0,
            owner_id = %owner_id,
            task_ref = %task_ref,
            "batch submitted"
        );

        Ok((batch_id, task_ref))
    }

    /// Read a batch's state, plus the task queue's diagnostic view
    pub async fn get_status(&self, batch_id: BatchId) -> Result<BatchStatusResponse> {
        let batch = self
            .db
            .get_batch_job(batch_id)
            .await?
            .ok_or(Error::Batch(BatchError::NotFound { id: batch_id.0 }))?;

        let queue_state = match &batch.worker_task_ref {
            Some(task_ref) => self
                .queue
                .task_state(task_ref)
                .await
                .map(|state| state.as_str().to_string()),
            None => None,
        };

        Ok(BatchStatusResponse { batch, queue_state })
    }

    /// Access the progress fan-out (snapshot store, hub, socket registry)
    pub fn progress(&self) -> &ProgressRouter {
        &self.progress
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Token observed by background workers; fires on shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Stop accepting batches and wind down background workers
    ///
    /// In-flight batch runs complete; the durable record is the source of
    /// truth for anything a disconnected subscriber missed.
    pub fn shutdown(&self) {
        tracing::info!("coordinator shutting down");
        self.shutdown_token.cancel();
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server runs concurrently with batch processing and listens on
    /// the configured bind address.
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let coordinator = Arc::clone(self);
        let config = Arc::clone(&self.config);

        tokio::spawn(async move { crate::api::start_api_server(coordinator, config).await })
    }
}

#[async_trait::async_trait]
impl BatchRunner for BatchCoordinator {
    async fn run(&self, batch_id: BatchId) -> Result<()> {
        BatchCoordinator::run(self, batch_id).await
    }
}
