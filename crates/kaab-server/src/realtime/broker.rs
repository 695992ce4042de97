//! Topic subscriptions and fan-out.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use kaab_core::events::ServerEvent;
use kaab_core::{ChannelId, Topic, UserId};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use super::registry::ConnectionRegistry;

#[derive(Default)]
struct BrokerState {
    connections: HashMap<ChannelId, Arc<ClientConnection>>,
    members: HashMap<Topic, HashSet<ChannelId>>,
    joined: HashMap<ChannelId, HashSet<Topic>>,
}

/// Many-to-many mapping between live connections and topics.
///
/// Delivery is best-effort: a payload reaches the connections joined to a
/// topic at publish time and is never queued for anyone else.
pub struct RoomBroker {
    registry: Arc<ConnectionRegistry>,
    state: RwLock<BrokerState>,
}

impl RoomBroker {
    /// Broker resolving users through `registry`.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            state: RwLock::new(BrokerState::default()),
        }
    }

    /// The registry used by [`publish_to_user`](Self::publish_to_user).
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Make a connection addressable.
    pub async fn attach(&self, connection: Arc<ClientConnection>) {
        let mut state = self.state.write().await;
        let _ = state.connections.insert(connection.id.clone(), connection);
    }

    /// Forget a connection and every subscription it held.
    pub async fn detach(&self, channel: &ChannelId) {
        let mut state = self.state.write().await;
        let _ = state.connections.remove(channel);
        let Some(topics) = state.joined.remove(channel) else {
            return;
        };
        for topic in topics {
            if let Some(members) = state.members.get_mut(&topic) {
                let _ = members.remove(channel);
                if members.is_empty() {
                    let _ = state.members.remove(&topic);
                }
            }
        }
    }

    /// Subscribe `channel` to `topic`. `false` if the channel is not attached.
    pub async fn join(&self, channel: &ChannelId, topic: Topic) -> bool {
        let mut state = self.state.write().await;
        if !state.connections.contains_key(channel) {
            return false;
        }
        let _ = state
            .joined
            .entry(channel.clone())
            .or_default()
            .insert(topic.clone());
        debug!(channel_id = %channel, topic = %topic, "joined topic");
        state.members.entry(topic).or_default().insert(channel.clone())
    }

    /// Unsubscribe `channel` from `topic`. `false` if it was not joined.
    pub async fn leave(&self, channel: &ChannelId, topic: &Topic) -> bool {
        let mut state = self.state.write().await;
        if let Some(topics) = state.joined.get_mut(channel) {
            let _ = topics.remove(topic);
        }
        let Some(members) = state.members.get_mut(topic) else {
            return false;
        };
        let removed = members.remove(channel);
        if members.is_empty() {
            let _ = state.members.remove(topic);
        }
        removed
    }

    /// Deliver `event` to every connection joined to `topic`.
    ///
    /// Returns the number of connections the frame was enqueued for.
    pub async fn publish(&self, topic: &Topic, event: &ServerEvent) -> usize {
        let Some(frame) = serialize(event) else {
            return 0;
        };
        let state = self.state.read().await;
        let Some(members) = state.members.get(topic) else {
            debug!(topic = %topic, event = event.name(), "no subscribers");
            return 0;
        };

        let mut delivered = 0;
        for channel in members {
            let Some(conn) = state.connections.get(channel) else {
                continue;
            };
            if conn.send(Arc::clone(&frame)) {
                delivered += 1;
            } else {
                warn!(channel_id = %channel, topic = %topic, "failed to enqueue event");
            }
        }
        debug!(
            topic = %topic,
            event = event.name(),
            recipients = members.len(),
            delivered,
            "published event"
        );
        metrics::counter!("broker_events_published_total", "event" => event.name()).increment(1);
        delivered
    }

    /// Deliver `event` to the user's current channel, if they are online.
    pub async fn publish_to_user(&self, user: &UserId, event: &ServerEvent) -> bool {
        let Some(channel) = self.registry.lookup(user) else {
            debug!(user_id = %user, event = event.name(), "recipient offline, dropped");
            return false;
        };
        let Some(frame) = serialize(event) else {
            return false;
        };
        let state = self.state.read().await;
        state
            .connections
            .get(&channel)
            .is_some_and(|conn| conn.send(frame))
    }

    /// Attached connections.
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    /// Channels joined to `topic`, unordered.
    pub async fn members(&self, topic: &Topic) -> Vec<ChannelId> {
        self.state
            .read()
            .await
            .members
            .get(topic)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Topics `channel` has joined, unordered.
    pub async fn topics_of(&self, channel: &ChannelId) -> Vec<Topic> {
        self.state
            .read()
            .await
            .joined
            .get(channel)
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default()
    }
}

fn serialize(event: &ServerEvent) -> Option<Arc<String>> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Arc::new(json)),
        Err(e) => {
            warn!(event = event.name(), error = %e, "failed to serialize event");
            None
        }
    }
}
