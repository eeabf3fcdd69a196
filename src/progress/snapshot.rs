//! Last-value-wins progress snapshot store.

use crate::types::ProgressSnapshot;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// In-memory store holding the most recent progress snapshot per owner
///
/// At most one snapshot exists per owner; each `put` overwrites the previous
/// value. The store is never persisted — a lost snapshot is reconstructable
/// from the batch record.
#[derive(Default)]
pub struct SnapshotStore {
    inner: Mutex<HashMap<String, ProgressSnapshot>>,
}

impl SnapshotStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ProgressSnapshot>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store the latest snapshot for an owner, replacing any previous one
    pub fn put(&self, owner_id: &str, snapshot: ProgressSnapshot) {
        self.lock().insert(owner_id.to_string(), snapshot);
    }

    /// Get the current snapshot for an owner
    pub fn get(&self, owner_id: &str) -> Option<ProgressSnapshot> {
        self.lock().get(owner_id).cloned()
    }

    /// Remove the snapshot for an owner
    pub fn forget(&self, owner_id: &str) {
        self.lock().remove(owner_id);
    }

    /// Number of owners with a stored snapshot
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no snapshots are stored
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
