//! Event stream hub for server-push (SSE) progress subscribers.

use crate::types::ProgressMessage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::snapshot::SnapshotStore;

/// A registered stream subscriber: the sending half of its bounded queue
struct StreamSubscriber {
    id: u64,
    tx: mpsc::Sender<ProgressMessage>,
}

/// Registry of server-push subscribers with bounded per-connection queues
///
/// Delivery policy: `publish` never blocks. Each subscriber owns a bounded
/// FIFO queue; a subscriber whose queue is full when a message arrives is
/// dropped from the registry (treated as disconnected). Slow consumers lose
/// liveness, never the producer.
pub struct EventStreamHub {
    subscribers: Mutex<HashMap<String, Vec<StreamSubscriber>>>,
    snapshots: Arc<SnapshotStore>,
    queue_capacity: usize,
    next_id: AtomicU64,
}

impl EventStreamHub {
    /// Create a hub backed by the given snapshot store
    pub fn new(snapshots: Arc<SnapshotStore>, queue_capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            snapshots,
            queue_capacity,
            next_id: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<StreamSubscriber>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new subscriber for an owner
    ///
    /// The handle's queue starts with a `connected` message, followed by a
    /// replay of the owner's current snapshot if one exists, so a client
    /// that connects after a push still sees the latest state before any
    /// newer update.
    pub fn subscribe(self: &Arc<Self>, owner_id: &str) -> StreamHandle {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        // Seed the queue before registering: capacity >= 1 guarantees the
        // connected message fits, and the replayed snapshot precedes any
        // concurrently published update.
        tx.try_send(ProgressMessage::Connected {
            owner_id: owner_id.to_string(),
        })
        .ok();
        if let Some(snapshot) = self.snapshots.get(owner_id) {
            tx.try_send(ProgressMessage::from_snapshot(&snapshot)).ok();
        }

        self.lock()
            .entry(owner_id.to_string())
            .or_default()
            .push(StreamSubscriber { id, tx });

        tracing::debug!(owner_id = %owner_id, subscriber_id = id, "stream subscriber registered");

        StreamHandle {
            owner_id: owner_id.to_string(),
            id,
            rx,
            hub: Arc::clone(self),
            done: false,
        }
    }

    /// Deliver a message to every subscriber registered under an owner
    ///
    /// Non-blocking: subscribers with full or closed queues are removed.
    pub fn publish(&self, owner_id: &str, message: &ProgressMessage) {
        let mut subscribers = self.lock();
        let Some(list) = subscribers.get_mut(owner_id) else {
            return;
        };

        list.retain(|sub| match sub.tx.try_send(message.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    owner_id = %owner_id,
                    subscriber_id = sub.id,
                    "stream subscriber queue full, dropping subscriber"
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        });

        if list.is_empty() {
            subscribers.remove(owner_id);
        }
    }

    /// Remove every subscriber registered under an owner
    ///
    /// Their streams observe a closed queue and end.
    pub fn forget(&self, owner_id: &str) {
        self.lock().remove(owner_id);
    }

    /// Total number of registered subscribers across all owners
    pub fn subscriber_count(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    /// Remove one subscriber by id (used by handle teardown)
    fn remove(&self, owner_id: &str, id: u64) {
        let mut subscribers = self.lock();
        if let Some(list) = subscribers.get_mut(owner_id) {
            list.retain(|sub| sub.id != id);
            if list.is_empty() {
                subscribers.remove(owner_id);
            }
        }
    }
}

/// Receiving side of one stream subscription
///
/// Dropping the handle (the transport noticed the peer went away)
/// deregisters it from the hub.
pub struct StreamHandle {
    owner_id: String,
    id: u64,
    rx: mpsc::Receiver<ProgressMessage>,
    hub: Arc<EventStreamHub>,
    done: bool,
}

impl StreamHandle {
    /// Owner this subscription is scoped to
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Wait for the next frame to emit
    ///
    /// Returns `Keepalive` if nothing arrived within `keepalive`; returns
    /// `None` once the stream is finished — either the queue closed or a
    /// terminal message was already yielded (terminal states end the
    /// transport).
    pub async fn next_frame(&mut self, keepalive: Duration) -> Option<ProgressMessage> {
        if self.done {
            return None;
        }

        match tokio::time::timeout(keepalive, self.rx.recv()).await {
            Ok(Some(message)) => {
                if message.is_terminal() {
                    self.done = true;
                }
                Some(message)
            }
            Ok(None) => None,
            Err(_) => Some(ProgressMessage::keepalive()),
        }
    }

    /// Convert the handle into a stream of frames for the SSE transport
    pub fn into_stream(
        self,
        keepalive: Duration,
    ) -> impl futures::Stream<Item = ProgressMessage> + Send {
        futures::stream::unfold(self, move |mut handle| async move {
            handle
                .next_frame(keepalive)
                .await
                .map(|message| (message, handle))
        })
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.hub.remove(&self.owner_id, self.id);
    }
}
