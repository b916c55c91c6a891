//! Connected-client bookkeeping and event fan-out. One malfunctioning
//! subscriber must never stop delivery to the others or abort the
//! orchestration task that triggered the broadcast.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use gugudan_core::envelope::ServerEnvelope;
use gugudan_core::ids::ClientId;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Registry of all connected WebSocket clients.
pub struct ClientRegistry {
    clients: DashMap<ClientId, mpsc::Sender<String>>,
    max_send_queue: usize,
}

impl ClientRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            clients: DashMap::new(),
            max_send_queue,
        }
    }

    /// Register a new client and return its ID plus the queue its
    /// writer loop drains.
    pub fn register(&self) -> (ClientId, mpsc::Receiver<String>) {
        let id = ClientId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        self.clients.insert(id.clone(), tx);
        (id, rx)
    }

    /// Remove a client. Idempotent; removing an absent client is a
    /// no-op.
    pub fn unregister(&self, id: &ClientId) {
        self.clients.remove(id);
    }

    /// Number of connected clients.
    pub fn count(&self) -> usize {
        self.clients.len()
    }

    /// Send an envelope to every client. A member whose queue is full
    /// or closed is removed; the loop itself never fails and never
    /// blocks beyond the single `try_send` attempt per member.
    pub fn broadcast(&self, envelope: &ServerEnvelope) {
        let json = match serde_json::to_string(envelope) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(kind = envelope.kind(), error = %e, "failed to serialize envelope");
                return;
            }
        };

        let mut dead = Vec::new();
        for entry in self.clients.iter() {
            if entry.value().try_send(json.clone()).is_err() {
                dead.push(entry.key().clone());
            }
        }
        for id in dead {
            tracing::info!(client_id = %id, "removing unreachable client");
            self.clients.remove(&id);
        }
        tracing::debug!(kind = envelope.kind(), recipients = self.clients.len(), "broadcast");
    }

    /// Send an envelope to exactly one client. Same removal policy as
    /// `broadcast`. Returns whether the send was accepted.
    pub fn send_to(&self, id: &ClientId, envelope: &ServerEnvelope) -> bool {
        let json = match serde_json::to_string(envelope) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(kind = envelope.kind(), error = %e, "failed to serialize envelope");
                return false;
            }
        };
        let Some(tx) = self.clients.get(id).map(|e| e.value().clone()) else {
            return false;
        };
        if tx.try_send(json).is_err() {
            tracing::info!(client_id = %id, "removing unreachable client");
            self.clients.remove(id);
            return false;
        }
        true
    }
}

/// Handle a WebSocket connection: split into reader/writer, forward
/// queued envelopes out and inbound text to the message processor.
pub async fn handle_ws_connection(
    socket: WebSocket,
    client_id: ClientId,
    mut rx: mpsc::Receiver<String>,
    registry: Arc<ClientRegistry>,
    on_message: mpsc::Sender<(ClientId, String)>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer: drain the queue to the socket, ping periodically.
    let writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        ping_interval.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Reader: feed inbound text to the processor.
    let reader_cid = client_id.clone();
    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => {
                    let _ = on_message.send((reader_cid.clone(), text.to_string())).await;
                }
                WsMessage::Close(_) => break,
                // axum answers pings automatically
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }

    registry.unregister(&client_id);
    tracing::info!(client_id = %client_id, "WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use gugudan_core::envelope::Sender;

    fn system_envelope(content: &str) -> ServerEnvelope {
        ServerEnvelope::system(content, Sender::System)
    }

    #[test]
    fn register_and_unregister() {
        let registry = ClientRegistry::new(32);
        assert_eq!(registry.count(), 0);

        let (id1, _rx1) = registry.register();
        let (id2, _rx2) = registry.register();
        assert_eq!(registry.count(), 2);

        registry.unregister(&id1);
        assert_eq!(registry.count(), 1);
        registry.unregister(&id2);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn unregister_absent_is_noop() {
        let registry = ClientRegistry::new(32);
        registry.unregister(&ClientId::new());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn broadcast_reaches_all_clients() {
        let registry = ClientRegistry::new(32);
        let (_id1, mut rx1) = registry.register();
        let (_id2, mut rx2) = registry.register();

        registry.broadcast(&system_envelope("hello"));

        assert!(rx1.try_recv().unwrap().contains("hello"));
        assert!(rx2.try_recv().unwrap().contains("hello"));
    }

    #[test]
    fn broadcast_removes_exactly_the_dead_client() {
        let registry = ClientRegistry::new(32);
        let (_id1, mut rx1) = registry.register();
        let (_id2, rx2) = registry.register();
        let (_id3, mut rx3) = registry.register();
        drop(rx2); // dead connection

        registry.broadcast(&system_envelope("fan-out"));

        assert_eq!(registry.count(), 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx3.try_recv().is_ok());
    }

    #[test]
    fn broadcast_after_disconnect_reaches_survivor() {
        let registry = ClientRegistry::new(32);
        let (id1, _rx1) = registry.register();
        let (_id2, mut rx2) = registry.register();

        registry.unregister(&id1);
        registry.broadcast(&system_envelope("still here"));

        assert_eq!(registry.count(), 1);
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn broadcast_to_empty_registry_does_not_panic() {
        let registry = ClientRegistry::new(32);
        registry.broadcast(&system_envelope("nobody listening"));
    }

    #[test]
    fn full_queue_counts_as_send_failure() {
        let registry = ClientRegistry::new(1);
        let (_id, _rx) = registry.register();

        registry.broadcast(&system_envelope("first")); // fills the queue
        assert_eq!(registry.count(), 1);
        registry.broadcast(&system_envelope("second")); // rejected, removed
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn send_to_delivers_to_one_client_only() {
        let registry = ClientRegistry::new(32);
        let (id1, mut rx1) = registry.register();
        let (_id2, mut rx2) = registry.register();

        assert!(registry.send_to(&id1, &system_envelope("unicast")));
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn send_to_unknown_client_is_false() {
        let registry = ClientRegistry::new(32);
        assert!(!registry.send_to(&ClientId::new(), &system_envelope("void")));
    }

    #[test]
    fn send_to_dead_client_removes_it() {
        let registry = ClientRegistry::new(32);
        let (id, rx) = registry.register();
        drop(rx);

        assert!(!registry.send_to(&id, &system_envelope("gone")));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn broadcast_payload_is_the_wire_envelope() {
        let registry = ClientRegistry::new(32);
        let (_id, mut rx) = registry.register();

        registry.broadcast(&ServerEnvelope::problem("3×4="));

        let raw = rx.try_recv().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["type"], "problem");
        assert_eq!(json["content"], "3×4=");
        assert_eq!(json["sender"], "agent1");
    }
}
