//! Task queue seam for batch execution.
//!
//! The coordinator never runs a batch inline: `submit` enqueues the batch id
//! and a worker invokes [`BatchRunner::run`] later, possibly in a different
//! process. [`TaskQueue`] is the seam a distributed queue implements;
//! [`LocalTaskQueue`] is the in-process implementation driving a worker loop
//! on the local runtime. The queue's own per-task state exists purely as a
//! diagnostic read for `get_status` — the batch record stays the source of
//! truth.

use crate::types::BatchId;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Execution state of an enqueued task, as the queue sees it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Enqueued, no worker picked it up yet
    Pending,
    /// A worker is executing the run
    Started,
    /// The run returned successfully
    Succeeded,
    /// The run returned an error
    Failed,
}

impl TaskState {
    /// Lowercase string form used in the diagnostic API field
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Started => "started",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
        }
    }
}

/// The routine a queue worker executes for an enqueued batch
#[async_trait::async_trait]
pub trait BatchRunner: Send + Sync {
    /// Run the batch to a terminal state
    async fn run(&self, batch_id: BatchId) -> Result<()>;
}

/// Abstraction over the task queue that carries batch runs to workers
#[async_trait::async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue a batch run; returns the queue's handle for it
    async fn enqueue(&self, batch_id: BatchId) -> Result<String>;

    /// Best-effort execution state for a previously returned handle
    async fn task_state(&self, task_ref: &str) -> Option<TaskState>;
}

/// In-process [`TaskQueue`] backed by a channel and a worker loop
pub struct LocalTaskQueue {
    tx: mpsc::UnboundedSender<(String, BatchId)>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<(String, BatchId)>>>,
    states: Arc<Mutex<HashMap<String, TaskState>>>,
    next_task: AtomicI64,
}

impl Default for LocalTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalTaskQueue {
    /// Create a queue; call [`start`](Self::start) to attach the worker loop
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            states: Arc::new(Mutex::new(HashMap::new())),
            next_task: AtomicI64::new(1),
        }
    }

    fn lock_states(
        states: &Arc<Mutex<HashMap<String, TaskState>>>,
    ) -> MutexGuard<'_, HashMap<String, TaskState>> {
        states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the worker loop
    ///
    /// Each dequeued batch runs as its own task so batches proceed
    /// concurrently; within one batch, ordering stays with the runner. The
    /// loop stops when the cancellation token fires.
    pub fn start(
        &self,
        runner: Arc<dyn BatchRunner>,
        cancel_token: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let receiver = self
            .rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let states = Arc::clone(&self.states);

        tokio::spawn(async move {
            let Some(mut rx) = receiver else {
                tracing::error!("local task queue worker already started");
                return;
            };

            loop {
                tokio::select! {
                    received = rx.recv() => {
                        let Some((task_ref, batch_id)) = received else {
                            break;
                        };

                        Self::lock_states(&states).insert(task_ref.clone(), TaskState::Started);

                        let runner = Arc::clone(&runner);
                        let states = Arc::clone(&states);
                        tokio::spawn(async move {
                            let outcome = match runner.run(batch_id).await {
                                Ok(()) => TaskState::Succeeded,
                                Err(e) => {
                                    tracing::warn!(batch_id = batch_id.0, error = %e, "batch run failed");
                                    TaskState::Failed
                                }
                            };
                            Self::lock_states(&states).insert(task_ref, outcome);
                        });
                    }
                    _ = cancel_token.cancelled() => break,
                }
            }
        })
    }
}

#[async_trait::async_trait]
impl TaskQueue for LocalTaskQueue {
    async fn enqueue(&self, batch_id: BatchId) -> Result<String> {
        let task_ref = format!("local-{}", self.next_task.fetch_add(1, Ordering::Relaxed));

        Self::lock_states(&self.states).insert(task_ref.clone(), TaskState::Pending);
        self.tx
            .send((task_ref.clone(), batch_id))
            .map_err(|_| Error::Queue("task queue worker is not running".to_string()))?;

        Ok(task_ref)
    }

    async fn task_state(&self, task_ref: &str) -> Option<TaskState> {
        Self::lock_states(&self.states).get(task_ref).copied()
    }
}
