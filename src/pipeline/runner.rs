//! Batch execution — the state machine and chunk loop run by a queue worker.

use crate::config::WebhookEvent;
use crate::db::ChunkProgressUpdate;
use crate::error::{BatchError, Error, Result};
use crate::types::{BatchId, FileOutcome, ProgressSnapshot};
use std::time::{Duration, Instant};

use super::BatchCoordinator;
use super::webhooks::BatchWebhookParams;

impl BatchCoordinator {
    /// Run a batch to a terminal state
    ///
    /// Per-file failures are absorbed into the outcome counters; an error
    /// escaping the chunk loop itself (lost queue connection, storage
    /// failure) is batch-fatal: the record is marked FAILED with the
    /// message and a terminal error snapshot is pushed.
    pub async fn run(&self, batch_id: BatchId) -> Result<()> {
        if let Err(e) = self.run_inner(batch_id).await {
            tracing::error!(batch_id = batch_id.0, error = %e, "batch run failed");
            self.record_fatal_failure(batch_id, &e).await;
            return Err(e);
        }
        Ok(())
    }

    /// The chunk loop proper
    async fn run_inner(&self, batch_id: BatchId) -> Result<()> {
        let job = self
            .db
            .get_batch_job(batch_id)
            .await?
            .ok_or(Error::Batch(BatchError::NotFound { id: batch_id.0 }))?;
        let owner_id = job.owner_id.clone();
        let total = job.total_files;

        self.db.mark_processing(batch_id).await?;
        let started = Instant::now();
        tracing::info!(
            batch_id = batch_id.0,
            owner_id = %owner_id,
            total_files = total,
            "batch processing started"
        );

        let chunk_size = self.config.processing.chunk_size;
        let chunk_count = job.file_ids.len().div_ceil(chunk_size);
        let mut outcomes: Vec<FileOutcome> = Vec::with_capacity(total);
        let mut completed_file_ids: Vec<String> = Vec::new();
        let mut failed_file_ids: Vec<String> = Vec::new();

        // Chunks run strictly in sequence; only items inside a chunk run
        // concurrently. Per-batch progress pushes stay ordered as a result.
        for (index, chunk) in job.file_ids.chunks(chunk_size).enumerate() {
            let chunk_outcomes = self.pool.process(chunk).await;

            for outcome in &chunk_outcomes {
                if outcome.success {
                    completed_file_ids.push(outcome.file_id.clone());
                } else {
                    failed_file_ids.push(outcome.file_id.clone());
                }
            }
            outcomes.extend(chunk_outcomes);

            let processed = outcomes.len();
            let message = format!("Processed {processed} of {total} files");
            self.db
                .apply_chunk_progress(
                    batch_id,
                    &ChunkProgressUpdate {
                        processed_files: processed,
                        successful_files: completed_file_ids.len(),
                        failed_files: failed_file_ids.len(),
                        completed_file_ids: completed_file_ids.clone(),
                        failed_file_ids: failed_file_ids.clone(),
                        progress: processed as f32 / total as f32 * 100.0,
                        status_message: message.clone(),
                    },
                )
                .await?;

            tracing::debug!(
                batch_id = batch_id.0,
                chunk = index + 1,
                chunk_count,
                processed,
                failed = failed_file_ids.len(),
                "chunk complete"
            );

            // The final chunk's update is folded into the terminal push
            if index + 1 < chunk_count {
                self.progress
                    .publish(
                        &owner_id,
                        ProgressSnapshot::processing(processed, total, message),
                    )
                    .await;
            }
        }

        let successful = completed_file_ids.len();
        let failed = failed_file_ids.len();
        let summary = build_summary(&outcomes, &failed_file_ids, started.elapsed());
        let message = if failed == 0 {
            format!("Processed {total} files")
        } else {
            format!("Processed {total} files ({failed} failed)")
        };

        self.db.mark_completed(batch_id, &summary, &message).await?;
        self.progress
            .publish(
                &owner_id,
                ProgressSnapshot::completed(total, message, outcomes),
            )
            .await;
        self.notify_webhooks(BatchWebhookParams {
            event: WebhookEvent::OnCompleted,
            batch_id,
            owner_id: owner_id.clone(),
            total_files: total,
            successful_files: successful,
            failed_files: failed,
            error: None,
        });

        tracing::info!(
            batch_id = batch_id.0,
            owner_id = %owner_id,
            successful,
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch completed"
        );

        Ok(())
    }

    /// Best-effort terminal bookkeeping for a batch-fatal error
    async fn record_fatal_failure(&self, batch_id: BatchId, error: &Error) {
        let job = match self.db.get_batch_job(batch_id).await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(batch_id = batch_id.0, error = %e, "failed to read batch during failure handling");
                None
            }
        };

        if let Err(e) = self.db.mark_failed(batch_id, &error.to_string()).await {
            tracing::error!(batch_id = batch_id.0, error = %e, "failed to record batch failure");
        }

        if let Some(job) = job {
            self.progress
                .publish(
                    &job.owner_id,
                    ProgressSnapshot::error(job.processed_files, job.total_files, error.to_string()),
                )
                .await;
            self.notify_webhooks(BatchWebhookParams {
                event: WebhookEvent::OnFailed,
                batch_id,
                owner_id: job.owner_id,
                total_files: job.total_files,
                successful_files: job.successful_files,
                failed_files: job.failed_files,
                error: Some(error.to_string()),
            });
        }
    }
}

/// Build the durable terminal summary
fn build_summary(
    outcomes: &[FileOutcome],
    failed_file_ids: &[String],
    elapsed: Duration,
) -> serde_json::Value {
    serde_json::json!({
        "total_files": outcomes.len(),
        "successful_files": outcomes.len() - failed_file_ids.len(),
        "failed_files": failed_file_ids.len(),
        "failed_file_ids": failed_file_ids,
        "elapsed_ms": elapsed.as_millis() as u64,
        "outcomes": outcomes,
    })
}
