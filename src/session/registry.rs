//! Live-session registry and broadcast fan-out
//!
//! Thread-safe via `RwLock`. Broadcast is read-heavy: it only clones the
//! envelope into each mailbox and never waits on delivery.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, trace};

use super::client::Outbound;
use super::message::{self, Envelope};

/// Registry entry: just the mailbox sender. Session internals (socket,
/// receive state) stay with the session's own tasks.
struct SessionHandle {
    tx: mpsc::UnboundedSender<Outbound>,
}

/// Registry of live control sessions
pub struct SessionRegistry {
    sessions: RwLock<HashMap<u64, SessionHandle>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a fully constructed session mailbox; returns the session id.
    ///
    /// The handle is inserted in one write-lock section, so a concurrent
    /// broadcast either sees the complete session or not at all.
    pub async fn register(&self, tx: mpsc::UnboundedSender<Outbound>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, SessionHandle { tx });
        debug!(session_id = id, sessions = sessions.len(), "session registered");
        id
    }

    /// Remove a session; idempotent
    pub async fn unregister(&self, id: u64) {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(&id).is_some() {
            debug!(session_id = id, sessions = sessions.len(), "session unregistered");
        }
    }

    /// Enqueue a message into every live session's mailbox.
    ///
    /// Never blocks on delivery; a mailbox whose sender task has already
    /// exited is skipped (its session is being torn down).
    pub async fn broadcast(&self, envelope: Envelope) {
        let sessions = self.sessions.read().await;
        let mut delivered = 0usize;
        for handle in sessions.values() {
            if handle.tx.send(Outbound::Message(envelope.clone())).is_ok() {
                delivered += 1;
            }
        }
        trace!(kind = %envelope.kind, delivered, "broadcast");
    }

    /// Broadcast a close notice, then ask every sender task to close its
    /// connection. Used by the shutdown coordinator.
    pub async fn close_all(&self, reason: &str) {
        let sessions = self.sessions.read().await;
        debug!(sessions = sessions.len(), reason, "closing all sessions");
        for handle in sessions.values() {
            let _ = handle.tx.send(Outbound::Message(message::close(reason)));
            let _ = handle.tx.send(Outbound::Close);
        }
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no sessions are live
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
