//! Socket registry and cross-process delivery.
//!
//! Holds the bidirectional-socket subscribers that are local to this
//! process, plus the glue to the shared [`PresenceBridge`] so a producer in
//! a different process can still reach a live socket here. Messages with no
//! known connection anywhere land in a capped per-owner pending buffer and
//! are replayed on the next register — the catch-up path for "worker
//! finishes before the client connects" races.

use crate::types::ProgressMessage;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::bridge::PresenceBridge;

/// A registered socket: the sending half of its message channel
struct SocketSubscriber {
    id: u64,
    tx: mpsc::UnboundedSender<ProgressMessage>,
}

/// Process-local registry of socket subscribers with bridge-backed remote
/// delivery
pub struct SocketRegistry {
    connections: Mutex<HashMap<String, Vec<SocketSubscriber>>>,
    pending: Mutex<HashMap<String, VecDeque<ProgressMessage>>>,
    bridge: Arc<dyn PresenceBridge>,
    presence_ttl: Duration,
    pending_limit: usize,
    next_id: AtomicU64,
}

impl SocketRegistry {
    /// Create a registry connected to the given bridge
    pub fn new(bridge: Arc<dyn PresenceBridge>, presence_ttl: Duration, pending_limit: usize) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            bridge,
            presence_ttl,
            pending_limit,
            next_id: AtomicU64::new(0),
        }
    }

    fn lock_connections(&self) -> MutexGuard<'_, HashMap<String, Vec<SocketSubscriber>>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<String, VecDeque<ProgressMessage>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a live socket for an owner
    ///
    /// Appends to the local list, writes the shared presence marker so other
    /// processes know a connection exists somewhere, and replays any pending
    /// messages buffered for this owner, in order.
    pub async fn register(self: &Arc<Self>, owner_id: &str) -> SocketConnection {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.lock_connections()
            .entry(owner_id.to_string())
            .or_default()
            .push(SocketSubscriber { id, tx: tx.clone() });

        if let Err(e) = self.bridge.set_present(owner_id, self.presence_ttl).await {
            tracing::warn!(owner_id = %owner_id, error = %e, "failed to write presence marker");
        }

        // Replay buffered messages into this connection only
        let buffered: Vec<ProgressMessage> = self
            .lock_pending()
            .remove(owner_id)
            .map(|queue| queue.into_iter().collect())
            .unwrap_or_default();
        for message in buffered {
            tx.send(message).ok();
        }

        tracing::debug!(owner_id = %owner_id, socket_id = id, "socket registered");

        SocketConnection {
            owner_id: owner_id.to_string(),
            id,
            rx,
            registry: Arc::clone(self),
        }
    }

    /// Remove a socket; the last one out clears the shared presence marker
    pub async fn unregister(&self, owner_id: &str, id: u64) {
        let owner_empty = {
            let mut connections = self.lock_connections();
            if let Some(list) = connections.get_mut(owner_id) {
                list.retain(|sub| sub.id != id);
                if list.is_empty() {
                    connections.remove(owner_id);
                    true
                } else {
                    false
                }
            } else {
                false
            }
        };

        if owner_empty
            && let Err(e) = self.bridge.clear_present(owner_id).await
        {
            tracing::warn!(owner_id = %owner_id, error = %e, "failed to clear presence marker");
        }

        tracing::debug!(owner_id = %owner_id, socket_id = id, "socket unregistered");
    }

    /// Deliver a message to whichever connection can take it
    ///
    /// Local connections are written directly. With none, a live presence
    /// marker routes the message over the bridge to the process that holds
    /// the socket. With neither, the message joins the capped pending
    /// buffer for replay on the next register.
    pub async fn deliver(&self, owner_id: &str, message: ProgressMessage) {
        if self.send_local(owner_id, &message) > 0 {
            return;
        }

        match self.bridge.exists(owner_id).await {
            Ok(true) => {
                if let Err(e) = self.bridge.publish(owner_id, &message).await {
                    tracing::warn!(owner_id = %owner_id, error = %e, "bridge publish failed, buffering message");
                    self.buffer_pending(owner_id, message);
                }
            }
            Ok(false) => self.buffer_pending(owner_id, message),
            Err(e) => {
                tracing::warn!(owner_id = %owner_id, error = %e, "presence lookup failed, buffering message");
                self.buffer_pending(owner_id, message);
            }
        }
    }

    /// Forward a bridge message to local connections only
    ///
    /// No re-publish and no buffering: a process that holds no connection
    /// for the owner simply drops the message, keeping forwarding
    /// idempotent and loop-free.
    pub fn forward_local(&self, owner_id: &str, message: &ProgressMessage) {
        self.send_local(owner_id, message);
    }

    /// Write to every live local connection; dead ones are pruned.
    /// Returns the number of connections the message reached.
    fn send_local(&self, owner_id: &str, message: &ProgressMessage) -> usize {
        let mut connections = self.lock_connections();
        let Some(list) = connections.get_mut(owner_id) else {
            return 0;
        };

        let before = list.len();
        list.retain(|sub| sub.tx.send(message.clone()).is_ok());
        let delivered = list.len();
        if delivered < before {
            tracing::debug!(
                owner_id = %owner_id,
                pruned = before - delivered,
                "pruned closed socket connections"
            );
        }
        if list.is_empty() {
            connections.remove(owner_id);
        }
        delivered
    }

    fn buffer_pending(&self, owner_id: &str, message: ProgressMessage) {
        let mut pending = self.lock_pending();
        let queue = pending.entry(owner_id.to_string()).or_default();
        queue.push_back(message);
        while queue.len() > self.pending_limit {
            queue.pop_front();
        }
    }

    /// Discard any pending messages buffered for an owner
    pub fn forget_pending(&self, owner_id: &str) {
        self.lock_pending().remove(owner_id);
    }

    /// Total number of live local connections across all owners
    pub fn connection_count(&self) -> usize {
        self.lock_connections().values().map(Vec::len).sum()
    }

    /// Number of owners with buffered pending messages
    pub fn pending_owner_count(&self) -> usize {
        self.lock_pending().len()
    }

    /// The bridge this registry publishes through
    pub fn bridge(&self) -> &Arc<dyn PresenceBridge> {
        &self.bridge
    }
}

/// Receiving side of one registered socket
pub struct SocketConnection {
    owner_id: String,
    id: u64,
    rx: mpsc::UnboundedReceiver<ProgressMessage>,
    registry: Arc<SocketRegistry>,
}

impl SocketConnection {
    /// Owner this connection is scoped to
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Registry-assigned connection id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Receive the next message routed to this connection
    pub async fn recv(&mut self) -> Option<ProgressMessage> {
        self.rx.recv().await
    }

    /// Deregister this connection (clears the presence marker when it is
    /// the owner's last one)
    pub async fn close(self) {
        self.registry.unregister(&self.owner_id, self.id).await;
    }
}

impl Drop for SocketConnection {
    fn drop(&mut self) {
        // Backstop for paths that skip close(): remove the local entry so
        // delivery stops targeting a dead channel. The presence marker is
        // left to its TTL.
        let mut connections = self
            .registry
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = connections.get_mut(&self.owner_id) {
            list.retain(|sub| sub.id != self.id);
            if list.is_empty() {
                connections.remove(&self.owner_id);
            }
        }
    }
}

/// Spawn the per-process bridge listener
///
/// Reads the bridge subscription and forwards every message to this
/// process's local connections for that owner (no-op when there are none).
/// Exactly one listener runs per process; stop it with the cancellation
/// token on shutdown.
pub fn spawn_bridge_listener(
    registry: Arc<SocketRegistry>,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let mut rx = registry.bridge().subscribe_all();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                received = rx.recv() => {
                    match received {
                        Some((owner_id, message)) => {
                            registry.forward_local(&owner_id, &message);
                        }
                        None => break,
                    }
                }
                _ = cancel_token.cancelled() => break,
            }
        }
    })
}
