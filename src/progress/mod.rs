//! Live progress delivery
//!
//! The progress layer fans batch updates out to whoever is watching an
//! owner's batch, over two transports with different lifecycles:
//!
//! - [`hub`] — server-push event streams (SSE): bounded per-subscriber
//!   queues, snapshot replay on connect, keepalive frames, stream closure on
//!   terminal messages
//! - [`socket`] — bidirectional sockets plus the cross-process bridge that
//!   lets a producer in one process reach a socket held by another
//! - [`snapshot`] — the last-value-wins snapshot store backing replay
//! - [`bridge`] — the pluggable presence + broadcast interface shared
//!   between processes
//!
//! All registries are explicitly-owned objects injected where needed; there
//! are no module-level singletons, and tests construct fresh instances.

pub mod bridge;
pub mod hub;
pub mod snapshot;
pub mod socket;

pub use bridge::{InMemoryBridge, PresenceBridge};
pub use hub::{EventStreamHub, StreamHandle};
pub use snapshot::SnapshotStore;
pub use socket::{SocketConnection, SocketRegistry, spawn_bridge_listener};

use crate::types::{ProgressMessage, ProgressSnapshot};
use std::sync::Arc;

/// Fan-out facade the coordinator pushes progress through
///
/// Groups the snapshot store and both transports so that a single `publish`
/// updates the last-value snapshot and reaches every live subscriber,
/// regardless of transport or process.
#[derive(Clone)]
pub struct ProgressRouter {
    /// Last-value-wins snapshot store
    pub snapshots: Arc<SnapshotStore>,
    /// SSE subscriber hub
    pub hub: Arc<EventStreamHub>,
    /// WebSocket registry + bridge
    pub sockets: Arc<SocketRegistry>,
}

impl ProgressRouter {
    /// Build a router over freshly shared components
    pub fn new(
        snapshots: Arc<SnapshotStore>,
        hub: Arc<EventStreamHub>,
        sockets: Arc<SocketRegistry>,
    ) -> Self {
        Self {
            snapshots,
            hub,
            sockets,
        }
    }

    /// Publish a snapshot to every live subscriber for this owner
    ///
    /// Stores the snapshot (overwriting the previous one), then delivers the
    /// derived [`ProgressMessage`] to stream and socket subscribers. Slow or
    /// dead subscribers are dropped by their registries; the producer never
    /// blocks here.
    pub async fn publish(&self, owner_id: &str, snapshot: ProgressSnapshot) {
        self.snapshots.put(owner_id, snapshot.clone());
        let message = ProgressMessage::from_snapshot(&snapshot);
        self.hub.publish(owner_id, &message);
        self.sockets.deliver(owner_id, message).await;
    }

    /// Read the current snapshot for an owner
    pub fn get_snapshot(&self, owner_id: &str) -> Option<ProgressSnapshot> {
        self.snapshots.get(owner_id)
    }

    /// Drop all progress bookkeeping for an owner
    ///
    /// Clears the stored snapshot, disconnects stream subscribers, and
    /// discards any pending socket messages.
    pub fn forget(&self, owner_id: &str) {
        self.snapshots.forget(owner_id);
        self.hub.forget(owner_id);
        self.sockets.forget_pending(owner_id);
    }
}
