//! Database layer for resume-ingest
//!
//! Handles SQLite persistence for batch jobs.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`batches`] — Batch job CRUD and state transitions
//!
//! List-valued columns (`file_ids`, `completed_file_ids`, `failed_file_ids`)
//! and the terminal `summary` are stored as JSON text. Every mutating query
//! carries a terminal-state guard so that a batch that reached
//! COMPLETED/FAILED/CANCELLED can never be modified again.

use crate::error::DatabaseError;
use crate::types::{BatchId, BatchJob, BatchStatus};
use crate::{Error, Result};
use sqlx::{FromRow, sqlite::SqlitePool};

pub mod batches;
mod migrations;

pub use batches::ChunkProgressUpdate;

/// New batch to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewBatch {
    /// Owner the batch belongs to
    pub owner_id: String,
    /// Ordered file ids submitted with the batch
    pub file_ids: Vec<String>,
}

/// Batch record from database
#[derive(Debug, Clone, FromRow)]
pub struct BatchRow {
    /// Unique database ID
    pub id: i64,
    /// Owner the batch belongs to
    pub owner_id: String,
    /// JSON array of submitted file ids
    pub file_ids: String,
    /// Total number of files
    pub total_files: i64,
    /// Files processed so far (success + failure)
    pub processed_files: i64,
    /// Files processed successfully
    pub successful_files: i64,
    /// Files that failed
    pub failed_files: i64,
    /// JSON array of successfully processed file ids
    pub completed_file_ids: String,
    /// JSON array of failed file ids
    pub failed_file_ids: String,
    /// Current status code (see [`BatchStatus`])
    pub status: i32,
    /// Progress percentage in [0, 100]
    pub progress: f32,
    /// Human-readable status message
    pub status_message: String,
    /// Handle into the task queue that runs this batch
    pub worker_task_ref: Option<String>,
    /// JSON terminal summary
    pub summary: Option<String>,
    /// Unix timestamp when the batch was submitted
    pub created_at: i64,
    /// Unix timestamp when processing started
    pub started_at: Option<i64>,
    /// Unix timestamp when the batch reached a terminal state
    pub completed_at: Option<i64>,
}

impl BatchRow {
    /// Parse the JSON columns and convert into the API-facing [`BatchJob`]
    pub fn into_job(self) -> Result<BatchJob> {
        let file_ids: Vec<String> = serde_json::from_str(&self.file_ids).map_err(|e| {
            Error::Database(DatabaseError::CorruptColumn(format!(
                "batches.file_ids for batch {}: {}",
                self.id, e
            )))
        })?;
        let completed_file_ids: Vec<String> = serde_json::from_str(&self.completed_file_ids)
            .map_err(|e| {
                Error::Database(DatabaseError::CorruptColumn(format!(
                    "batches.completed_file_ids for batch {}: {}",
                    self.id, e
                )))
            })?;
        let failed_file_ids: Vec<String> =
            serde_json::from_str(&self.failed_file_ids).map_err(|e| {
                Error::Database(DatabaseError::CorruptColumn(format!(
                    "batches.failed_file_ids for batch {}: {}",
                    self.id, e
                )))
            })?;
        let summary = match self.summary {
            Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
                Error::Database(DatabaseError::CorruptColumn(format!(
                    "batches.summary for batch {}: {}",
                    self.id, e
                )))
            })?),
            None => None,
        };

        Ok(BatchJob {
            batch_id: BatchId(self.id),
            owner_id: self.owner_id,
            file_ids,
            total_files: self.total_files as usize,
            processed_files: self.processed_files as usize,
            successful_files: self.successful_files as usize,
            failed_files: self.failed_files as usize,
            completed_file_ids,
            failed_file_ids,
            status: BatchStatus::from_i32(self.status),
            progress_percentage: self.progress,
            status_message: self.status_message,
            worker_task_ref: self.worker_task_ref,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            summary,
        })
    }
}

/// Database handle for resume-ingest
pub struct Database {
    pool: SqlitePool,
}
