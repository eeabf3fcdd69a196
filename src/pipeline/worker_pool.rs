//! Chunked worker pool — bounded-concurrency per-file execution.

use crate::config::Config;
use crate::error::IngestError;
use crate::ingest::{FileStore, ResumeParser};
use crate::types::FileOutcome;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Executes the files of one chunk with bounded concurrency
///
/// Failure containment is the contract here: a file that cannot be
/// downloaded, has a disallowed content type, fails to parse, exceeds its
/// deadline, or whose task panics becomes a failed [`FileOutcome`] — it
/// never aborts the chunk or the batch. The concurrency slot is an RAII
/// permit, released on every exit path.
pub struct ChunkedWorkerPool {
    store: Arc<dyn FileStore>,
    parser: Arc<dyn ResumeParser>,
    config: Arc<Config>,
}

impl ChunkedWorkerPool {
    /// Create a pool over the given collaborators
    pub fn new(store: Arc<dyn FileStore>, parser: Arc<dyn ResumeParser>, config: Arc<Config>) -> Self {
        Self {
            store,
            parser,
            config,
        }
    }

    /// Process a chunk of file ids, returning one outcome per input id
    ///
    /// Outcome order is not guaranteed to match input order; outcomes are
    /// identified by `file_id`.
    pub async fn process(&self, file_ids: &[String]) -> Vec<FileOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.config.processing.chunk_concurrency));

        let mut handles = Vec::with_capacity(file_ids.len());
        for file_id in file_ids {
            let semaphore = Arc::clone(&semaphore);
            let store = Arc::clone(&self.store);
            let parser = Arc::clone(&self.parser);
            let config = Arc::clone(&self.config);
            let file_id = file_id.clone();

            handles.push((
                file_id.clone(),
                tokio::spawn(async move {
                    let start = Instant::now();
                    let permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return FileOutcome::failure(
                                file_id.clone(),
                                file_id,
                                "concurrency limiter closed",
                                elapsed_ms(start),
                            );
                        }
                    };
                    let outcome = process_one(&*store, &*parser, &config, &file_id, start).await;
                    drop(permit);
                    outcome
                }),
            ));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (file_id, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    // A panicked item is still just one failed file
                    tracing::error!(file_id = %file_id, error = %e, "file task panicked");
                    outcomes.push(FileOutcome::failure(
                        file_id.clone(),
                        file_id,
                        format!("task panicked: {e}"),
                        0,
                    ));
                }
            }
        }
        outcomes
    }
}

/// Run the download → type check → parse sequence for one file
async fn process_one(
    store: &dyn FileStore,
    parser: &dyn ResumeParser,
    config: &Config,
    file_id: &str,
    start: Instant,
) -> FileOutcome {
    let remote = match store.download(file_id).await {
        Ok(remote) => remote,
        Err(e) => {
            tracing::debug!(file_id = %file_id, error = %e, "download failed");
            return FileOutcome::failure(file_id, file_id, e.to_string(), elapsed_ms(start));
        }
    };

    let content_type = remote.resolved_content_type();
    if !config.is_allowed_type(&content_type) {
        tracing::debug!(file_id = %file_id, content_type = %content_type, "rejected file type");
        return FileOutcome::failure(
            file_id,
            remote.filename,
            IngestError::UnsupportedType(content_type).to_string(),
            elapsed_ms(start),
        );
    }

    match tokio::time::timeout(config.processing.item_timeout, parser.extract(&remote.data)).await {
        Ok(Ok(resume)) => {
            tracing::debug!(
                file_id = %file_id,
                filename = %remote.filename,
                text_len = resume.raw_text.len(),
                skills = resume.skills.len(),
                "file parsed"
            );
            FileOutcome::success(file_id, remote.filename, elapsed_ms(start))
        }
        Ok(Err(e)) => {
            tracing::debug!(file_id = %file_id, error = %e, "parse failed");
            FileOutcome::failure(file_id, remote.filename, e.to_string(), elapsed_ms(start))
        }
        Err(_) => {
            tracing::warn!(
                file_id = %file_id,
                timeout_secs = config.processing.item_timeout.as_secs(),
                "parse deadline exceeded"
            );
            FileOutcome::failure(
                file_id,
                remote.filename,
                IngestError::Timeout.to_string(),
                elapsed_ms(start),
            )
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
