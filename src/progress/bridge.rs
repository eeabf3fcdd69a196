//! Cross-process presence and broadcast bridge.
//!
//! A producer and the process holding a live socket are not guaranteed to be
//! the same process. The bridge gives every process two shared primitives:
//! an expiring per-owner presence marker ("a connection exists somewhere")
//! and a broadcast channel scoped by owner. Any pub/sub-capable store can
//! implement [`PresenceBridge`]; the crate ships an in-memory
//! implementation that two registries can share to model two processes.

use crate::Result;
use crate::types::ProgressMessage;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Shared presence marker + broadcast channel across processes
///
/// Delivery over the bridge is best-effort by design: duplicate and missed
/// messages are tolerated by the consumers (idempotent forwarding,
/// last-value-wins snapshots), so implementations need no coordination
/// beyond a plain publish/subscribe.
#[async_trait::async_trait]
pub trait PresenceBridge: Send + Sync {
    /// Write the existence marker for an owner with a time-to-live
    async fn set_present(&self, owner_id: &str, ttl: Duration) -> Result<()>;

    /// Delete the existence marker for an owner
    async fn clear_present(&self, owner_id: &str) -> Result<()>;

    /// Whether a live (unexpired) marker exists for an owner
    async fn exists(&self, owner_id: &str) -> Result<bool>;

    /// Broadcast a message on the owner-scoped channel
    async fn publish(&self, owner_id: &str, message: &ProgressMessage) -> Result<()>;

    /// Open a subscription receiving every broadcast message as
    /// `(owner_id, message)` pairs
    fn subscribe_all(&self) -> mpsc::UnboundedReceiver<(String, ProgressMessage)>;
}

/// In-memory [`PresenceBridge`]
///
/// Markers live in a map with lazy expiry; broadcasts fan out to every open
/// subscription. Registries in different "processes" share one instance in
/// tests, and a single-process deployment can use it as-is.
#[derive(Default)]
pub struct InMemoryBridge {
    markers: Mutex<HashMap<String, Instant>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<(String, ProgressMessage)>>>,
}

impl InMemoryBridge {
    /// Create an empty bridge
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_markers(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.markers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscribers(
        &self,
    ) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<(String, ProgressMessage)>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl PresenceBridge for InMemoryBridge {
    async fn set_present(&self, owner_id: &str, ttl: Duration) -> Result<()> {
        self.lock_markers()
            .insert(owner_id.to_string(), Instant::now() + ttl);
        Ok(())
    }

    async fn clear_present(&self, owner_id: &str) -> Result<()> {
        self.lock_markers().remove(owner_id);
        Ok(())
    }

    async fn exists(&self, owner_id: &str) -> Result<bool> {
        let mut markers = self.lock_markers();
        match markers.get(owner_id) {
            Some(expiry) if *expiry > Instant::now() => Ok(true),
            Some(_) => {
                // Lazy expiry
                markers.remove(owner_id);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn publish(&self, owner_id: &str, message: &ProgressMessage) -> Result<()> {
        self.lock_subscribers()
            .retain(|tx| tx.send((owner_id.to_string(), message.clone())).is_ok());
        Ok(())
    }

    fn subscribe_all(&self) -> mpsc::UnboundedReceiver<(String, ProgressMessage)> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock_subscribers().push(tx);
        rx
    }
}
