//! Core types for resume-ingest

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unique identifier for a batch job
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct BatchId(pub i64);

impl BatchId {
    /// Create a new BatchId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for BatchId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<BatchId> for i64 {
    fn from(id: BatchId) -> Self {
        id.0
    }
}

impl PartialEq<i64> for BatchId {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl PartialEq<BatchId> for i64 {
    fn eq(&self, other: &BatchId) -> bool {
        *self == other.0
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BatchId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for BatchId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for BatchId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for BatchId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Batch job status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Created and waiting for a worker to pick it up
    Pending,
    /// A worker is running the chunk loop
    Processing,
    /// All files processed (possibly with per-file failures)
    Completed,
    /// The run itself failed before or during the chunk loop
    Failed,
    /// Reserved terminal state; no cancellation path produces it today
    Cancelled,
}

impl BatchStatus {
    /// Convert integer status code to BatchStatus enum
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => BatchStatus::Pending,
            1 => BatchStatus::Processing,
            2 => BatchStatus::Completed,
            3 => BatchStatus::Failed,
            4 => BatchStatus::Cancelled,
            _ => BatchStatus::Failed, // Default to Failed for unknown status
        }
    }

    /// Convert BatchStatus enum to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            BatchStatus::Pending => 0,
            BatchStatus::Processing => 1,
            BatchStatus::Completed => 2,
            BatchStatus::Failed => 3,
            BatchStatus::Cancelled => 4,
        }
    }

    /// Whether this status is terminal (the record is immutable once reached)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Cancelled
        )
    }

    /// Lowercase string form used in status messages and webhook payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
            BatchStatus::Cancelled => "cancelled",
        }
    }
}

/// Outcome of processing a single file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FileOutcome {
    /// Identifier of the file in the remote store
    pub file_id: String,
    /// Filename as reported by the store (falls back to the file id when the
    /// download itself failed)
    pub filename: String,
    /// Whether the file was downloaded and parsed successfully
    pub success: bool,
    /// Error description for failed files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Wall-clock time spent on this file in milliseconds
    pub processing_time_ms: u64,
}

impl FileOutcome {
    /// Build a successful outcome
    pub fn success(file_id: impl Into<String>, filename: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            file_id: file_id.into(),
            filename: filename.into(),
            success: true,
            error_message: None,
            processing_time_ms: elapsed_ms,
        }
    }

    /// Build a failed outcome
    pub fn failure(
        file_id: impl Into<String>,
        filename: impl Into<String>,
        error: impl Into<String>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            filename: filename.into(),
            success: false,
            error_message: Some(error.into()),
            processing_time_ms: elapsed_ms,
        }
    }
}

/// Status carried by a progress snapshot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    /// The batch is still being processed
    Processing,
    /// The batch finished (per-file failures may still be present)
    Completed,
    /// The batch run itself failed
    Error,
}

/// Latest known progress state for one owner
///
/// Exactly one snapshot exists per owner at a time; each push overwrites the
/// previous one (last-value-wins). Reconstructable from the batch record, so
/// it is never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProgressSnapshot {
    /// Coarse state of the batch
    pub status: SnapshotStatus,
    /// Number of files processed so far
    pub completed: usize,
    /// Total number of files in the batch
    pub total: usize,
    /// Human-readable progress message
    pub message: String,
    /// Full per-file outcomes, present on terminal snapshots only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<FileOutcome>>,
}

impl ProgressSnapshot {
    /// Build an in-flight snapshot
    pub fn processing(completed: usize, total: usize, message: impl Into<String>) -> Self {
        Self {
            status: SnapshotStatus::Processing,
            completed,
            total,
            message: message.into(),
            results: None,
        }
    }

    /// Build the terminal snapshot for a completed batch
    pub fn completed(total: usize, message: impl Into<String>, results: Vec<FileOutcome>) -> Self {
        Self {
            status: SnapshotStatus::Completed,
            completed: total,
            total,
            message: message.into(),
            results: Some(results),
        }
    }

    /// Build the terminal snapshot for a batch that failed outright
    pub fn error(completed: usize, total: usize, message: impl Into<String>) -> Self {
        Self {
            status: SnapshotStatus::Error,
            completed,
            total,
            message: message.into(),
            results: None,
        }
    }

    /// Whether this snapshot ends the batch (and its live streams)
    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, SnapshotStatus::Processing)
    }
}

/// Message delivered to live progress subscribers
///
/// A closed set of shapes shared by both transports. SSE frames carry the
/// serialized message as `data: <json>`; the WebSocket sends the same JSON
/// as text frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressMessage {
    /// Sent once when a stream subscriber connects
    Connected {
        /// Owner the subscription is scoped to
        owner_id: String,
    },

    /// In-flight progress update
    Progress {
        /// The snapshot that triggered this message
        data: ProgressSnapshot,
        /// Unix timestamp (seconds) when the message was built
        timestamp: i64,
    },

    /// Emitted when no update arrived within the keepalive window
    Keepalive {
        /// Unix timestamp (seconds) when the message was built
        timestamp: i64,
    },

    /// Terminal message for a batch that ran to completion
    TaskComplete {
        /// The terminal snapshot, including per-file results
        data: ProgressSnapshot,
        /// Unix timestamp (seconds) when the message was built
        timestamp: i64,
    },

    /// Terminal message for a batch whose run failed
    Error {
        /// Description of the failure
        message: String,
        /// Unix timestamp (seconds) when the message was built
        timestamp: i64,
    },
}

impl ProgressMessage {
    /// Map a snapshot to the message variant its status calls for
    pub fn from_snapshot(snapshot: &ProgressSnapshot) -> Self {
        let timestamp = chrono::Utc::now().timestamp();
        match snapshot.status {
            SnapshotStatus::Processing => ProgressMessage::Progress {
                data: snapshot.clone(),
                timestamp,
            },
            SnapshotStatus::Completed => ProgressMessage::TaskComplete {
                data: snapshot.clone(),
                timestamp,
            },
            SnapshotStatus::Error => ProgressMessage::Error {
                message: snapshot.message.clone(),
                timestamp,
            },
        }
    }

    /// Build a keepalive message stamped with the current time
    pub fn keepalive() -> Self {
        ProgressMessage::Keepalive {
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// Whether receiving this message ends the transport
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressMessage::TaskComplete { .. } | ProgressMessage::Error { .. }
        )
    }
}

/// Full batch job record as exposed by the API
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchJob {
    /// Batch identifier
    pub batch_id: BatchId,
    /// Owner the batch belongs to
    pub owner_id: String,
    /// Ordered file ids submitted with the batch
    pub file_ids: Vec<String>,
    /// Total number of files
    pub total_files: usize,
    /// Files processed so far (success + failure)
    pub processed_files: usize,
    /// Files processed successfully
    pub successful_files: usize,
    /// Files that failed
    pub failed_files: usize,
    /// Ids of successfully processed files
    pub completed_file_ids: Vec<String>,
    /// Ids of failed files
    pub failed_file_ids: Vec<String>,
    /// Current lifecycle status
    pub status: BatchStatus,
    /// Progress percentage in [0, 100]
    pub progress_percentage: f32,
    /// Human-readable status message
    pub status_message: String,
    /// Handle into the task queue that runs this batch, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_task_ref: Option<String>,
    /// Unix timestamp (seconds) when the batch was submitted
    pub created_at: i64,
    /// Unix timestamp (seconds) when processing started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    /// Unix timestamp (seconds) when the batch reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    /// Structured terminal summary (totals, failed ids, elapsed time)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<serde_json::Value>,
}

/// Batch status read, including the task queue's own diagnostic view
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchStatusResponse {
    /// The authoritative batch record
    pub batch: BatchJob,
    /// Best-effort execution state reported by the task queue
    /// (`pending`/`started`/`succeeded`/`failed`); never the source of truth
    /// for `batch.status`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_state: Option<String>,
}

/// Request body for submitting a batch
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitBatchRequest {
    /// Owner to attribute the batch (and its progress stream) to
    pub owner_id: String,
    /// File ids to process, in order
    pub file_ids: Vec<String>,
}

/// Response body for a submitted batch
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitBatchResponse {
    /// Identifier of the created batch
    pub batch_id: BatchId,
    /// Task queue handle for the enqueued run
    pub task_ref: String,
}

/// Live-connection diagnostics
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ConnectionStats {
    /// Number of registered SSE subscribers across all owners
    pub stream_subscribers: usize,
    /// Number of registered WebSocket connections across all owners
    pub socket_connections: usize,
    /// Number of owners with undelivered pending messages buffered
    pub pending_owners: usize,
}

/// Payload sent to webhooks on batch terminal states
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookPayload {
    /// Event name (`completed` or `failed`)
    pub event: String,
    /// Batch identifier
    pub batch_id: BatchId,
    /// Owner the batch belongs to
    pub owner_id: String,
    /// Total number of files in the batch
    pub total_files: usize,
    /// Files processed successfully
    pub successful_files: usize,
    /// Files that failed
    pub failed_files: usize,
    /// Failure description for failed batches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Unix timestamp (seconds) when the webhook fired
    pub timestamp: i64,
}
