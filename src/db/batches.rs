//! Batch job CRUD and state transitions.
//!
//! Every mutating query carries a status guard in its `WHERE` clause; an
//! update that matches zero rows is resolved into the precise error
//! (missing row, terminal record, wrong state) by re-reading the row.

use crate::error::{BatchError, DatabaseError};
use crate::types::{BatchId, BatchJob, BatchStatus};
use crate::{Error, Result};

use super::{BatchRow, Database, NewBatch};

/// Per-chunk progress update applied after each chunk completes
#[derive(Debug, Clone)]
pub struct ChunkProgressUpdate {
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
    /// Progress percentage in [0, 100]
    pub progress: f32,
    /// Human-readable status message
    pub status_message: String,
}

impl Database {
    /// Insert a new batch record in PENDING state
    pub async fn insert_batch(&self, batch: &NewBatch) -> Result<BatchId> {
        let now = chrono::Utc::now().timestamp();
        let file_ids = serde_json::to_string(&batch.file_ids)?;

        let result = sqlx::query(
            r#"
            INSERT INTO batches (
                owner_id, file_ids, total_files, status, status_message, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&batch.owner_id)
        .bind(&file_ids)
        .bind(batch.file_ids.len() as i64)
        .bind(BatchStatus::Pending.to_i32())
        .bind("Queued for processing")
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert batch: {}",
                e
            )))
        })?;

        Ok(BatchId(result.last_insert_rowid()))
    }

    /// Get a batch row by ID
    pub async fn get_batch(&self, id: BatchId) -> Result<Option<BatchRow>> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT
                id, owner_id, file_ids, total_files, processed_files,
                successful_files, failed_files, completed_file_ids,
                failed_file_ids, status, progress, status_message,
                worker_task_ref, summary, created_at, started_at, completed_at
            FROM batches
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get batch: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Get a batch by ID, parsed into the API-facing type
    pub async fn get_batch_job(&self, id: BatchId) -> Result<Option<BatchJob>> {
        match self.get_batch(id).await? {
            Some(row) => Ok(Some(row.into_job()?)),
            None => Ok(None),
        }
    }

    /// List all batches belonging to an owner, newest first
    pub async fn list_batches_for_owner(&self, owner_id: &str) -> Result<Vec<BatchRow>> {
        let rows = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT
                id, owner_id, file_ids, total_files, processed_files,
                successful_files, failed_files, completed_file_ids,
                failed_file_ids, status, progress, status_message,
                worker_task_ref, summary, created_at, started_at, completed_at
            FROM batches
            WHERE owner_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list batches: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Store the task queue handle for a batch
    pub async fn set_task_ref(&self, id: BatchId, task_ref: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE batches SET worker_task_ref = ? WHERE id = ? AND status NOT IN (2, 3, 4)",
        )
        .bind(task_ref)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to set task ref: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(self.guard_failure(id, "set task ref").await);
        }

        Ok(())
    }

    /// Transition a batch from PENDING to PROCESSING and record the start time
    pub async fn mark_processing(&self, id: BatchId) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE batches
            SET status = ?, started_at = ?, status_message = 'Processing'
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(BatchStatus::Processing.to_i32())
        .bind(now)
        .bind(id)
        .bind(BatchStatus::Pending.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to mark batch processing: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(self.guard_failure(id, "run").await);
        }

        Ok(())
    }

    /// Apply per-chunk counters after a chunk finishes
    ///
    /// Only valid while the batch is PROCESSING; the single-writer rule means
    /// a zero-row update here indicates a real lifecycle bug, not a race.
    pub async fn apply_chunk_progress(
        &self,
        id: BatchId,
        update: &ChunkProgressUpdate,
    ) -> Result<()> {
        let completed_ids = serde_json::to_string(&update.completed_file_ids)?;
        let failed_ids = serde_json::to_string(&update.failed_file_ids)?;

        let result = sqlx::query(
            r#"
            UPDATE batches
            SET processed_files = ?, successful_files = ?, failed_files = ?,
                completed_file_ids = ?, failed_file_ids = ?,
                progress = ?, status_message = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(update.processed_files as i64)
        .bind(update.successful_files as i64)
        .bind(update.failed_files as i64)
        .bind(&completed_ids)
        .bind(&failed_ids)
        .bind(update.progress)
        .bind(&update.status_message)
        .bind(id)
        .bind(BatchStatus::Processing.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to apply chunk progress: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(self.guard_failure(id, "apply progress to").await);
        }

        Ok(())
    }

    /// Transition a batch to COMPLETED and store the terminal summary
    pub async fn mark_completed(
        &self,
        id: BatchId,
        summary: &serde_json::Value,
        message: &str,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let summary_json = serde_json::to_string(summary)?;

        let result = sqlx::query(
            r#"
            UPDATE batches
            SET status = ?, progress = 100.0, status_message = ?,
                summary = ?, completed_at = ?
            WHERE id = ? AND status NOT IN (2, 3, 4)
            "#,
        )
        .bind(BatchStatus::Completed.to_i32())
        .bind(message)
        .bind(&summary_json)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to mark batch completed: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(self.guard_failure(id, "complete").await);
        }

        Ok(())
    }

    /// Transition a batch to FAILED with the fatal error message
    pub async fn mark_failed(&self, id: BatchId, error: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE batches
            SET status = ?, status_message = ?, completed_at = ?
            WHERE id = ? AND status NOT IN (2, 3, 4)
            "#,
        )
        .bind(BatchStatus::Failed.to_i32())
        .bind(error)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to mark batch failed: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(self.guard_failure(id, "fail").await);
        }

        Ok(())
    }

    /// Resolve a zero-row guarded update into the precise error
    async fn guard_failure(&self, id: BatchId, operation: &str) -> Error {
        match self.get_batch(id).await {
            Ok(Some(row)) => {
                let status = BatchStatus::from_i32(row.status);
                if status.is_terminal() {
                    Error::Batch(BatchError::AlreadyTerminal {
                        id: id.0,
                        status: status.as_str().to_string(),
                    })
                } else {
                    Error::Batch(BatchError::InvalidState {
                        id: id.0,
                        operation: operation.to_string(),
                        current_state: status.as_str().to_string(),
                    })
                }
            }
            Ok(None) => Error::Batch(BatchError::NotFound { id: id.0 }),
            Err(e) => e,
        }
    }
}
