//! One live WebSocket channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use kaab_core::ChannelId;
use kaab_core::events::ServerEvent;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

/// A connected client as seen by the broker.
///
/// Outbound frames go through a bounded queue drained by the session's
/// writer task. A full or closed queue drops the frame for this connection
/// only.
pub struct ClientConnection {
    /// Server-assigned channel identity.
    pub id: ChannelId,
    tx: mpsc::Sender<Arc<String>>,
    /// When the connection was established.
    pub connected_at: Instant,
    is_alive: AtomicBool,
    last_pong: Mutex<Instant>,
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Wrap the sending half of a session's outbound queue.
    pub fn new(id: ChannelId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Enqueue a pre-serialized frame. Returns `false` if it was dropped.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("ws_outbound_drops_total").increment(1);
            false
        }
    }

    /// Serialize and enqueue one event.
    pub fn send_event(&self, event: &ServerEvent) -> bool {
        match serde_json::to_string(event) {
            Ok(json) => self.send(Arc::new(json)),
            Err(e) => {
                warn!(channel_id = %self.id, event = event.name(), error = %e, "failed to serialize event");
                false
            }
        }
    }

    /// Whether the outbound queue's receiver is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Frames dropped so far.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record a pong or other proof of life.
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Time since the last pong, or since connect if none arrived.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Read and reset the alive flag. `true` if a pong arrived since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use kaab_core::UserId;
    use kaab_core::events::PresenceStatus;

    use super::*;

    fn make(capacity: usize) -> (ClientConnection, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (ClientConnection::new(ChannelId::from_raw("conn_1"), tx), rx)
    }

    #[tokio::test]
    async fn send_event_serializes_envelope() {
        let (conn, mut rx) = make(4);
        assert!(conn.send_event(&ServerEvent::PresenceChanged {
            user_id: UserId::from_raw("u1"),
            status: PresenceStatus::Online,
        }));
        let frame = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "presenceChanged");
        assert_eq!(value["data"]["status"], "online");
    }

    #[test]
    fn full_queue_drops_and_counts() {
        let (conn, _rx) = make(1);
        assert!(conn.send(Arc::new("a".into())));
        assert!(!conn.send(Arc::new("b".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn closed_queue_drops() {
        let (conn, rx) = make(4);
        drop(rx);
        assert!(conn.is_closed());
        assert!(!conn.send(Arc::new("a".into())));
    }

    #[test]
    fn alive_flag_resets_on_check() {
        let (conn, _rx) = make(1);
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
    }
}
