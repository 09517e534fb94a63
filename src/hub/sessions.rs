//! Connected viewer sessions and fan-out

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;

/// Handle to one connected viewer
///
/// Each session owns an unbounded queue drained by its own writer task, so
/// delivery to one viewer never waits on another. Dropping the handle (on
/// unregister) closes the queue and ends that writer task.
#[derive(Debug)]
pub struct ViewerSession {
    id: u64,
    peer: SocketAddr,
    tx: UnboundedSender<Bytes>,
}

impl ViewerSession {
    /// Create a session handle and the receiving end of its queue
    pub fn new(id: u64, peer: SocketAddr) -> (Self, UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id, peer, tx }, rx)
    }

    /// Session id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Peer address
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Queue a payload; false if the session's queue is already closed
    fn send(&self, payload: Bytes) -> bool {
        self.tx.send(payload).is_ok()
    }
}

/// Owns the set of connected viewers and fans messages out to them
pub struct BroadcastHub {
    sessions: RwLock<HashMap<u64, ViewerSession>>,
}

impl BroadcastHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Add a session, queueing the initial roster snapshot to it first
    ///
    /// The snapshot future is awaited while the session set is write-locked,
    /// so no broadcast can slip in between snapshot capture and
    /// registration: the first payload a viewer sees is at least as new as
    /// any update it could have missed.
    pub async fn register<F>(&self, session: ViewerSession, snapshot: F)
    where
        F: std::future::Future<Output = Bytes>,
    {
        let mut sessions = self.sessions.write().await;
        let payload = snapshot.await;
        if !session.send(payload) {
            tracing::warn!(session_id = session.id, "Session closed before initial sync");
        }
        tracing::info!(
            session_id = session.id,
            peer = %session.peer,
            viewers = sessions.len() + 1,
            "Viewer connected"
        );
        sessions.insert(session.id, session);
    }

    /// Remove a session; runs on every disconnect path
    pub async fn unregister(&self, id: u64) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.remove(&id) {
            tracing::info!(
                session_id = id,
                peer = %session.peer,
                viewers = sessions.len(),
                "Viewer disconnected"
            );
        }
    }

    /// Queue a payload to every connected session
    ///
    /// The `Bytes` payload is reference-counted, so fan-out clones share one
    /// allocation. A session whose queue has closed is skipped; it cleans
    /// itself up through its own exit path.
    pub async fn broadcast(&self, payload: Bytes) {
        let sessions = self.sessions.read().await;
        for session in sessions.values() {
            if !session.send(payload.clone()) {
                tracing::debug!(
                    session_id = session.id,
                    "Skipping broadcast to closed session"
                );
            }
        }
    }

    /// Number of currently connected sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_register_delivers_snapshot_first() {
        let hub = BroadcastHub::new();
        let (session, mut rx) = ViewerSession::new(1, peer());
        assert_eq!(session.id(), 1);
        assert_eq!(session.peer(), peer());

        hub.register(session, async { Bytes::from_static(b"snapshot") })
            .await;
        hub.broadcast(Bytes::from_static(b"update")).await;

        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"snapshot"));
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"update"));
        assert_eq!(hub.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_sessions() {
        let hub = BroadcastHub::new();
        let (a, mut rx_a) = ViewerSession::new(1, peer());
        let (b, mut rx_b) = ViewerSession::new(2, peer());
        hub.register(a, async { Bytes::from_static(b"s") }).await;
        hub.register(b, async { Bytes::from_static(b"s") }).await;

        hub.broadcast(Bytes::from_static(b"update")).await;

        rx_a.recv().await.unwrap();
        assert_eq!(rx_a.recv().await.unwrap(), Bytes::from_static(b"update"));
        rx_b.recv().await.unwrap();
        assert_eq!(rx_b.recv().await.unwrap(), Bytes::from_static(b"update"));
    }

    #[tokio::test]
    async fn test_unregister_stops_delivery() {
        let hub = BroadcastHub::new();
        let (session, mut rx) = ViewerSession::new(1, peer());
        hub.register(session, async { Bytes::from_static(b"s") }).await;
        rx.recv().await.unwrap();

        hub.unregister(1).await;
        assert_eq!(hub.session_count().await, 0);

        // The handle was dropped with the session, so the queue ends.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dead_session_does_not_break_broadcast() {
        let hub = BroadcastHub::new();
        let (dead, rx_dead) = ViewerSession::new(1, peer());
        let (live, mut rx_live) = ViewerSession::new(2, peer());
        hub.register(dead, async { Bytes::from_static(b"s") }).await;
        hub.register(live, async { Bytes::from_static(b"s") }).await;

        drop(rx_dead);
        hub.broadcast(Bytes::from_static(b"update")).await;

        rx_live.recv().await.unwrap();
        assert_eq!(rx_live.recv().await.unwrap(), Bytes::from_static(b"update"));
    }

    #[tokio::test]
    async fn test_broadcast_cannot_interleave_with_registration() {
        use std::sync::Arc;
        use tokio::sync::Notify;

        let hub = Arc::new(BroadcastHub::new());
        let (session, mut rx) = ViewerSession::new(1, peer());
        let gate = Arc::new(Notify::new());

        let register = tokio::spawn({
            let hub = Arc::clone(&hub);
            let gate = Arc::clone(&gate);
            async move {
                hub.register(session, async {
                    gate.notified().await;
                    Bytes::from_static(b"snapshot")
                })
                .await;
            }
        });
        // Let the registration take the session-set lock and park on the
        // gate, mid snapshot capture.
        tokio::task::yield_now().await;

        let broadcast = tokio::spawn({
            let hub = Arc::clone(&hub);
            async move { hub.broadcast(Bytes::from_static(b"update")).await }
        });
        tokio::task::yield_now().await;

        gate.notify_one();
        register.await.unwrap();
        broadcast.await.unwrap();

        // The broadcast had to wait for registration to finish: the
        // snapshot is queued first and the update follows, so the viewer
        // never ends up one change behind with no further message due.
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"snapshot"));
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"update"));
    }

    #[tokio::test]
    async fn test_unregister_unknown_id_is_harmless() {
        let hub = BroadcastHub::new();
        hub.unregister(42).await;
        assert_eq!(hub.session_count().await, 0);
    }
}
