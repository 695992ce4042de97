//! Drives the registry and broker from channel lifecycle and domain events.
//!
//! Per connection: `Connected -> Identified(user) -> Closed`. The dispatcher
//! keeps no shared state of its own; each session owns its [`ChannelContext`].

use std::sync::Arc;

use kaab_core::events::{ClientEvent, PresenceChange, ServerEvent};
use kaab_core::topics::ThreadRef;
use kaab_core::traits::Notification;
use kaab_core::{ChannelId, Topic, UserId};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::broker::RoomBroker;
use super::connection::ClientConnection;
use super::registry::ConnectionRegistry;

/// Where a connection is in its lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport is up, no identity yet.
    Connected,
    /// Bound to a user.
    Identified(UserId),
    /// Terminal.
    Closed,
}

/// Per-connection dispatcher state, owned by the session.
#[derive(Debug)]
pub struct ChannelContext {
    channel_id: ChannelId,
    state: ConnectionState,
}

impl ChannelContext {
    /// Channel this context belongs to.
    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }
}

/// Routes realtime traffic.
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    broker: Arc<RoomBroker>,
}

impl Dispatcher {
    /// Dispatcher over a registry and the broker built on it.
    pub fn new(registry: Arc<ConnectionRegistry>, broker: Arc<RoomBroker>) -> Self {
        Self { registry, broker }
    }

    /// Registry handle.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Broker handle.
    pub fn broker(&self) -> &Arc<RoomBroker> {
        &self.broker
    }

    /// A transport connected: attach it, subscribe it to presence, greet it.
    pub async fn connect(&self, connection: Arc<ClientConnection>) -> ChannelContext {
        let channel_id = connection.id.clone();
        let _ = connection.send_event(&ServerEvent::ConnectionEstablished {
            channel_id: channel_id.clone(),
        });
        self.broker.attach(connection).await;
        let _ = self.broker.join(&channel_id, Topic::presence()).await;
        debug!(channel_id = %channel_id, "channel connected");
        ChannelContext {
            channel_id,
            state: ConnectionState::Connected,
        }
    }

    /// Handle one inbound text frame. Malformed frames are logged and dropped.
    pub async fn handle_text(&self, ctx: &mut ChannelContext, text: &str) {
        if ctx.state == ConnectionState::Closed {
            return;
        }
        match ClientEvent::parse(text) {
            Ok(event) => self.handle_event(ctx, event).await,
            Err(e) => {
                metrics::counter!("ws_malformed_events_total").increment(1);
                warn!(channel_id = %ctx.channel_id, error = %e, "dropping malformed event");
            }
        }
    }

    /// Handle one parsed client event.
    pub async fn handle_event(&self, ctx: &mut ChannelContext, event: ClientEvent) {
        match event {
            ClientEvent::Identify { user_id } => self.identify(ctx, user_id).await,
            ClientEvent::Join(topic) => {
                let _ = self.broker.join(&ctx.channel_id, topic).await;
            }
            ClientEvent::Leave(topic) => {
                let _ = self.broker.leave(&ctx.channel_id, &topic).await;
            }
            ClientEvent::MarkRead { chat_id, user_id } => {
                let topic = Topic::chat(&chat_id);
                let _ = self
                    .broker
                    .publish(&topic, &ServerEvent::MessagesMarkedRead { chat_id, user_id })
                    .await;
            }
        }
    }

    async fn identify(&self, ctx: &mut ChannelContext, user_id: UserId) {
        match &ctx.state {
            ConnectionState::Identified(current) if *current != user_id => {
                warn!(
                    channel_id = %ctx.channel_id,
                    user_id = %current,
                    claimed = %user_id,
                    "ignoring identify as a different user"
                );
                return;
            }
            ConnectionState::Identified(_)
                if self.registry.lookup(&user_id).as_ref() == Some(&ctx.channel_id) =>
            {
                return;
            }
            _ => {}
        }

        let change = self.registry.register(&user_id, &ctx.channel_id);
        let _ = self
            .broker
            .join(&ctx.channel_id, Topic::user(&user_id))
            .await;
        info!(channel_id = %ctx.channel_id, user_id = %user_id, "user identified");
        ctx.state = ConnectionState::Identified(user_id);
        self.announce(change).await;
    }

    /// Transport closed. Idempotent.
    pub async fn disconnect(&self, ctx: &mut ChannelContext) {
        if ctx.state == ConnectionState::Closed {
            return;
        }
        self.broker.detach(&ctx.channel_id).await;
        if let Some(change) = self.registry.unregister(&ctx.channel_id) {
            self.announce(change).await;
        }
        debug!(channel_id = %ctx.channel_id, "channel closed");
        ctx.state = ConnectionState::Closed;
    }

    async fn announce(&self, change: PresenceChange) {
        let _ = self
            .broker
            .publish(&Topic::presence(), &ServerEvent::from(change))
            .await;
    }

    /// The store saved a message in `thread`.
    pub async fn message_saved(&self, thread: &ThreadRef, message: Value) -> usize {
        let room = thread.topic();
        self.broker
            .publish(&room.clone(), &ServerEvent::NewMessage { room, message })
            .await
    }

    /// A question was posted.
    pub async fn question_posted(&self, question: Value) -> usize {
        self.broker
            .publish(&Topic::questions(), &ServerEvent::NewQuestion { question })
            .await
    }

    /// A notification was persisted. Delivered only if the recipient is online.
    pub async fn notification_created(&self, notification: &Notification) -> bool {
        let payload = match serde_json::to_value(notification) {
            Ok(v) => v,
            Err(e) => {
                warn!(notification_id = %notification.id, error = %e, "failed to encode notification");
                return false;
            }
        };
        self.broker
            .publish_to_user(
                &notification.recipient,
                &ServerEvent::NewNotification {
                    notification: payload,
                },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use kaab_core::logging::capture_logs;
    use kaab_core::topics::ThreadKind;
    use serde_json::json;
    use tokio::sync::mpsc;
    use tracing::Level;

    use super::*;

    struct Client {
        ctx: ChannelContext,
        rx: mpsc::Receiver<Arc<String>>,
    }

    impl Client {
        fn next(&mut self) -> Option<Value> {
            self.rx
                .try_recv()
                .ok()
                .map(|frame| serde_json::from_str(&frame).unwrap())
        }

        fn drain(&mut self) -> Vec<Value> {
            std::iter::from_fn(|| self.next()).collect()
        }
    }

    fn dispatcher() -> Dispatcher {
        let registry = Arc::new(ConnectionRegistry::new());
        let broker = Arc::new(RoomBroker::new(registry.clone()));
        Dispatcher::new(registry, broker)
    }

    async fn connect(d: &Dispatcher, id: &str) -> Client {
        let (tx, rx) = mpsc::channel(64);
        let conn = Arc::new(ClientConnection::new(ChannelId::from_raw(id), tx));
        let ctx = d.connect(conn).await;
        Client { ctx, rx }
    }

    async fn send(d: &Dispatcher, client: &mut Client, frame: Value) {
        d.handle_text(&mut client.ctx, &frame.to_string()).await;
    }

    #[tokio::test]
    async fn connect_greets_with_channel_id() {
        let d = dispatcher();
        let mut c = connect(&d, "conn_1").await;
        let hello = c.next().unwrap();
        assert_eq!(hello["event"], "connectionEstablished");
        assert_eq!(hello["data"]["channelId"], "conn_1");
        assert_eq!(c.ctx.state(), &ConnectionState::Connected);
    }

    #[tokio::test]
    async fn identify_registers_and_broadcasts_online() {
        let d = dispatcher();
        let mut a = connect(&d, "conn_a").await;
        let mut b = connect(&d, "conn_b").await;
        let _ = (a.drain(), b.drain());

        send(&d, &mut a, json!({"event": "identify", "data": {"userId": "u1"}})).await;

        assert_eq!(a.ctx.state(), &ConnectionState::Identified(UserId::from_raw("u1")));
        assert_eq!(
            d.registry().lookup(&UserId::from_raw("u1")),
            Some(ChannelId::from_raw("conn_a"))
        );
        let seen = b.next().unwrap();
        assert_eq!(seen["event"], "presenceChanged");
        assert_eq!(seen["data"], json!({"userId": "u1", "status": "online"}));
    }

    #[tokio::test]
    async fn identify_joins_private_topic() {
        let d = dispatcher();
        let mut a = connect(&d, "conn_a").await;
        send(&d, &mut a, json!({"event": "identify", "data": {"userId": "u1"}})).await;
        let topics = d.broker().topics_of(a.ctx.channel_id()).await;
        assert!(topics.contains(&Topic::from_raw("u1")));
        assert!(topics.contains(&Topic::presence()));
    }

    #[tokio::test]
    async fn superseded_disconnect_keeps_mapping_and_stays_silent() {
        let d = dispatcher();
        let mut old = connect(&d, "conn_old").await;
        let mut new = connect(&d, "conn_new").await;
        send(&d, &mut old, json!({"event": "identify", "data": {"userId": "u1"}})).await;
        send(&d, &mut new, json!({"event": "identify", "data": {"userId": "u1"}})).await;
        let _ = new.drain();

        d.disconnect(&mut old.ctx).await;

        assert_eq!(
            d.registry().lookup(&UserId::from_raw("u1")),
            Some(ChannelId::from_raw("conn_new"))
        );
        assert!(new.drain().iter().all(|f| f["event"] != "presenceChanged"));
        assert_eq!(old.ctx.state(), &ConnectionState::Closed);
    }

    #[tokio::test]
    async fn disconnect_of_current_channel_broadcasts_offline() {
        let d = dispatcher();
        let mut a = connect(&d, "conn_a").await;
        let mut b = connect(&d, "conn_b").await;
        send(&d, &mut a, json!({"event": "identify", "data": {"userId": "u1"}})).await;
        let _ = b.drain();

        d.disconnect(&mut a.ctx).await;
        d.disconnect(&mut a.ctx).await;

        let frames = b.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["data"], json!({"userId": "u1", "status": "offline"}));
        assert_eq!(d.registry().online_count(), 0);
    }

    #[tokio::test]
    async fn identify_as_other_user_is_ignored() {
        let (logs, _guard) = capture_logs();
        let d = dispatcher();
        let mut a = connect(&d, "conn_a").await;
        send(&d, &mut a, json!({"event": "identify", "data": {"userId": "u1"}})).await;
        send(&d, &mut a, json!({"event": "identify", "data": {"userId": "u2"}})).await;

        assert_eq!(a.ctx.state(), &ConnectionState::Identified(UserId::from_raw("u1")));
        assert!(d.registry().lookup(&UserId::from_raw("u2")).is_none());
        assert!(logs.has_event(Level::WARN, "different user"));
    }

    #[tokio::test]
    async fn repeated_identify_is_idempotent() {
        let d = dispatcher();
        let mut a = connect(&d, "conn_a").await;
        send(&d, &mut a, json!({"event": "identify", "data": {"userId": "u1"}})).await;
        let _ = a.drain();
        send(&d, &mut a, json!({"event": "identify", "data": {"userId": "u1"}})).await;
        assert!(a.drain().is_empty());
    }

    #[tokio::test]
    async fn identify_reclaims_after_being_superseded() {
        let d = dispatcher();
        let mut a = connect(&d, "conn_a").await;
        let mut b = connect(&d, "conn_b").await;
        send(&d, &mut a, json!({"event": "identify", "data": {"userId": "u1"}})).await;
        send(&d, &mut b, json!({"event": "identify", "data": {"userId": "u1"}})).await;
        send(&d, &mut a, json!({"event": "identify", "data": {"userId": "u1"}})).await;
        assert_eq!(
            d.registry().lookup(&UserId::from_raw("u1")),
            Some(ChannelId::from_raw("conn_a"))
        );
    }

    #[tokio::test]
    async fn malformed_frames_are_dropped_with_warning() {
        let (logs, _guard) = capture_logs();
        let d = dispatcher();
        let mut a = connect(&d, "conn_a").await;
        let _ = a.drain();

        d.handle_text(&mut a.ctx, "not json").await;
        send(&d, &mut a, json!({"event": "joinRoom", "data": {}})).await;
        send(&d, &mut a, json!({"event": "teleport"})).await;

        assert_eq!(logs.count_at_level(Level::WARN), 3);
        assert_eq!(a.ctx.state(), &ConnectionState::Connected);
        assert!(a.drain().is_empty());
    }

    #[tokio::test]
    async fn join_room_then_message_saved() {
        let d = dispatcher();
        let mut a = connect(&d, "conn_a").await;
        let mut b = connect(&d, "conn_b").await;
        send(&d, &mut a, json!({"event": "joinRoom", "data": {"chatId": "42"}})).await;
        let _ = (a.drain(), b.drain());

        let thread = ThreadRef {
            kind: ThreadKind::Chat,
            id: "42".into(),
        };
        assert_eq!(d.message_saved(&thread, json!({"text": "yo"})).await, 1);

        let frame = a.next().unwrap();
        assert_eq!(frame["event"], "newMessage");
        assert_eq!(frame["data"]["room"], "chat_42");
        assert_eq!(frame["data"]["message"]["text"], "yo");
        assert!(b.next().is_none());
    }

    #[tokio::test]
    async fn leave_room_stops_messages() {
        let d = dispatcher();
        let mut a = connect(&d, "conn_a").await;
        send(&d, &mut a, json!({"event": "joinMentorship", "data": {"mentorshipId": "m1"}})).await;
        send(&d, &mut a, json!({"event": "leaveMentorship", "data": {"mentorshipId": "m1"}})).await;
        let thread = ThreadRef {
            kind: ThreadKind::Mentorship,
            id: "m1".into(),
        };
        assert_eq!(d.message_saved(&thread, json!({})).await, 0);
    }

    #[tokio::test]
    async fn mark_read_relays_receipt_to_chat() {
        let d = dispatcher();
        let mut a = connect(&d, "conn_a").await;
        let mut b = connect(&d, "conn_b").await;
        send(&d, &mut a, json!({"event": "joinRoom", "data": {"chatId": "7"}})).await;
        send(&d, &mut b, json!({"event": "joinRoom", "data": {"chatId": "7"}})).await;
        let _ = (a.drain(), b.drain());

        send(&d, &mut b, json!({"event": "markRead", "data": {"chatId": "7", "userId": "u2"}})).await;

        let receipt = a.next().unwrap();
        assert_eq!(receipt["event"], "messagesMarkedRead");
        assert_eq!(receipt["data"], json!({"chatId": "7", "userId": "u2"}));
        assert_eq!(b.next().unwrap()["event"], "messagesMarkedRead");
    }

    #[tokio::test]
    async fn question_feed_fanout() {
        let d = dispatcher();
        let mut a = connect(&d, "conn_a").await;
        send(&d, &mut a, json!({"event": "joinQuestions"})).await;
        let _ = a.drain();
        assert_eq!(d.question_posted(json!({"title": "why?"})).await, 1);
        assert_eq!(a.next().unwrap()["data"]["question"]["title"], "why?");
    }

    #[tokio::test]
    async fn notification_goes_to_recipient_only_when_online() {
        let d = dispatcher();
        let mut a = connect(&d, "conn_a").await;
        let notification = Notification {
            id: "notif_1".into(),
            recipient: UserId::from_raw("u1"),
            sender: UserId::from_raw("u2"),
            kind: "message".into(),
            content: "hello".into(),
            link: None,
            read: false,
            created_at: Utc::now(),
        };
        assert!(!d.notification_created(&notification).await);

        send(&d, &mut a, json!({"event": "identify", "data": {"userId": "u1"}})).await;
        let _ = a.drain();
        assert!(d.notification_created(&notification).await);
        let frame = a.next().unwrap();
        assert_eq!(frame["event"], "newNotification");
        assert_eq!(frame["data"]["notification"]["type"], "message");
        assert_eq!(frame["data"]["notification"]["recipient"], "u1");
    }

    #[tokio::test]
    async fn closed_context_ignores_frames() {
        let d = dispatcher();
        let mut a = connect(&d, "conn_a").await;
        d.disconnect(&mut a.ctx).await;
        send(&d, &mut a, json!({"event": "identify", "data": {"userId": "u1"}})).await;
        assert!(d.registry().lookup(&UserId::from_raw("u1")).is_none());
    }
}
