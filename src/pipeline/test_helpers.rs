//! Shared test doubles and setup helpers for pipeline tests.

use crate::config::Config;
use crate::db::Database;
use crate::error::IngestError;
use crate::ingest::{FileStore, RemoteFile, ResumeParser, StructuredResume};
use crate::pipeline::BatchCoordinator;
use crate::progress::{InMemoryBridge, PresenceBridge};
use crate::queue::{LocalTaskQueue, TaskQueue};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Marker payload the mock parser refuses to parse.
pub(crate) const UNPARSEABLE: &[u8] = b"PARSE_FAIL";

/// In-memory [`FileStore`] with scriptable failures and delays.
///
/// Unknown ids resolve to a synthetic PDF named `<id>.pdf`, so most tests
/// only script the exceptions. Tracks the high-water mark of concurrent
/// downloads for concurrency-bound assertions.
pub(crate) struct MockFileStore {
    files: HashMap<String, RemoteFile>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockFileStore {
    pub(crate) fn new() -> Self {
        Self {
            files: HashMap::new(),
            failing: HashSet::new(),
            delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Script an explicit file for an id
    pub(crate) fn with_file(
        mut self,
        file_id: &str,
        filename: &str,
        content_type: Option<&str>,
        data: &[u8],
    ) -> Self {
        self.files.insert(
            file_id.to_string(),
            RemoteFile {
                filename: filename.to_string(),
                content_type: content_type.map(String::from),
                data: data.to_vec(),
            },
        );
        self
    }

    /// Make downloads of this id fail
    pub(crate) fn failing_download(mut self, file_id: &str) -> Self {
        self.failing.insert(file_id.to_string());
        self
    }

    /// Add a per-download delay (for concurrency and timing tests)
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Highest number of downloads observed in flight at once
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl FileStore for MockFileStore {
    async fn download(&self, file_id: &str) -> Result<RemoteFile, IngestError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(file_id) {
            return Err(IngestError::Download(format!(
                "store unavailable for {file_id}"
            )));
        }

        Ok(self.files.get(file_id).cloned().unwrap_or_else(|| RemoteFile {
            filename: format!("{file_id}.pdf"),
            content_type: Some("application/pdf".to_string()),
            data: file_id.as_bytes().to_vec(),
        }))
    }
}

/// [`ResumeParser`] double that fails on the [`UNPARSEABLE`] marker and can
/// simulate slow extraction.
pub(crate) struct MockParser {
    delay: Option<Duration>,
}

impl MockParser {
    pub(crate) fn new() -> Self {
        Self { delay: None }
    }

    /// Add a per-extract delay (for timeout tests)
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait::async_trait]
impl ResumeParser for MockParser {
    async fn extract(&self, data: &[u8]) -> Result<StructuredResume, IngestError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if data == UNPARSEABLE {
            return Err(IngestError::Parse("unreadable resume content".to_string()));
        }

        Ok(StructuredResume {
            raw_text: String::from_utf8_lossy(data).into_owned(),
            ..Default::default()
        })
    }
}

/// Build a coordinator over a fresh temp database with workers running.
///
/// The returned temp file must be kept alive for the database to stay on
/// disk.
pub(crate) async fn create_test_coordinator(
    store: Arc<dyn FileStore>,
    parser: Arc<dyn ResumeParser>,
    mutate_config: impl FnOnce(&mut Config),
) -> (Arc<BatchCoordinator>, tempfile::NamedTempFile) {
    let temp_file = tempfile::NamedTempFile::new().unwrap();

    let mut config = Config::default();
    config.persistence.database_path = temp_file.path().to_path_buf();
    mutate_config(&mut config);

    let db = Arc::new(Database::new(temp_file.path()).await.unwrap());
    let queue = Arc::new(LocalTaskQueue::new());
    let bridge: Arc<dyn PresenceBridge> = Arc::new(InMemoryBridge::new());

    let coordinator = Arc::new(BatchCoordinator::new(
        Arc::new(config),
        db,
        store,
        parser,
        bridge,
        Arc::clone(&queue) as Arc<dyn TaskQueue>,
    ));
    coordinator.spawn_local_workers(&queue);

    (coordinator, temp_file)
}
