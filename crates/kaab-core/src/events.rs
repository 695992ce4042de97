//! Realtime wire events.
//!
//! Every frame is a JSON envelope `{"event": <name>, "data": <payload>}`.
//! Inbound frames are parsed in two stages (envelope, then payload) so a bad
//! payload can be reported with the event name it arrived under.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ChannelId, UserId};
use crate::topics::Topic;

/// Why an inbound frame was rejected.
#[derive(Debug, thiserror::Error)]
pub enum EventParseError {
    /// The frame is not a JSON envelope.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),
    /// The event name is not one the server handles.
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    /// A known event with a missing or malformed field.
    #[error("invalid payload for {event}: {message}")]
    InvalidPayload {
        /// Event name.
        event: String,
        /// What was wrong.
        message: String,
    },
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentifyPayload {
    user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatPayload {
    chat_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionPayload {
    question_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MentorshipPayload {
    mentorship_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkReadPayload {
    chat_id: String,
    user_id: String,
}

/// Events a client sends over its channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// Bind this channel to a user identity.
    Identify {
        /// Identity being claimed.
        user_id: UserId,
    },
    /// Subscribe to a topic.
    Join(Topic),
    /// Unsubscribe from a topic.
    Leave(Topic),
    /// The user has read everything in a chat.
    MarkRead {
        /// Chat whose messages were read.
        chat_id: String,
        /// Reader.
        user_id: UserId,
    },
}

impl ClientEvent {
    /// Parse one inbound text frame.
    pub fn parse(text: &str) -> Result<Self, EventParseError> {
        let envelope: Envelope = serde_json::from_str(text)
            .map_err(|e| EventParseError::InvalidEnvelope(e.to_string()))?;
        let Envelope { event, data } = envelope;

        match event.as_str() {
            "identify" => {
                let p: IdentifyPayload = payload(&event, data)?;
                Ok(Self::Identify {
                    user_id: UserId::from_raw(required(&event, "userId", p.user_id)?),
                })
            }
            "joinRoom" | "leaveRoom" => {
                let p: ChatPayload = payload(&event, data)?;
                let topic = Topic::chat(&required(&event, "chatId", p.chat_id)?);
                Ok(join_or_leave(&event, topic))
            }
            "joinQuestion" | "leaveQuestion" => {
                let p: QuestionPayload = payload(&event, data)?;
                let topic = Topic::question(&required(&event, "questionId", p.question_id)?);
                Ok(join_or_leave(&event, topic))
            }
            "joinQuestions" | "leaveQuestions" => Ok(join_or_leave(&event, Topic::questions())),
            "joinMentorship" | "leaveMentorship" => {
                let p: MentorshipPayload = payload(&event, data)?;
                let topic =
                    Topic::mentorship(&required(&event, "mentorshipId", p.mentorship_id)?);
                Ok(join_or_leave(&event, topic))
            }
            "markRead" => {
                let p: MarkReadPayload = payload(&event, data)?;
                Ok(Self::MarkRead {
                    chat_id: required(&event, "chatId", p.chat_id)?,
                    user_id: UserId::from_raw(required(&event, "userId", p.user_id)?),
                })
            }
            _ => Err(EventParseError::UnknownEvent(event)),
        }
    }
}

fn join_or_leave(event: &str, topic: Topic) -> ClientEvent {
    if event.starts_with("join") {
        ClientEvent::Join(topic)
    } else {
        ClientEvent::Leave(topic)
    }
}

fn payload<T: DeserializeOwned>(event: &str, data: Value) -> Result<T, EventParseError> {
    serde_json::from_value(data).map_err(|e| EventParseError::InvalidPayload {
        event: event.to_owned(),
        message: e.to_string(),
    })
}

fn required(event: &str, field: &str, value: String) -> Result<String, EventParseError> {
    if value.trim().is_empty() {
        return Err(EventParseError::InvalidPayload {
            event: event.to_owned(),
            message: format!("{field} must not be empty"),
        });
    }
    Ok(value)
}

/// Presence status carried by `presenceChanged`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    /// User has a live identified connection.
    Online,
    /// User's authoritative connection closed.
    Offline,
}

/// A presence transition emitted by the connection registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceChange {
    /// Whose presence changed.
    pub user_id: UserId,
    /// New status.
    pub status: PresenceStatus,
}

/// Events the server pushes to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// First frame on every connection.
    ConnectionEstablished {
        /// Server-assigned channel identity.
        channel_id: ChannelId,
    },
    /// A user came online or went offline.
    PresenceChanged {
        /// Whose presence changed.
        user_id: UserId,
        /// New status.
        status: PresenceStatus,
    },
    /// A message was stored in a thread.
    NewMessage {
        /// Topic the message was published on.
        room: Topic,
        /// Stored message as the persistent store returned it.
        message: Value,
    },
    /// A question was posted.
    NewQuestion {
        /// Stored question document.
        question: Value,
    },
    /// A notification was created for the recipient.
    NewNotification {
        /// Stored notification.
        notification: Value,
    },
    /// Read receipt relayed to a chat.
    MessagesMarkedRead {
        /// Chat that was read.
        chat_id: String,
        /// Reader.
        user_id: UserId,
    },
}

impl From<PresenceChange> for ServerEvent {
    fn from(change: PresenceChange) -> Self {
        Self::PresenceChanged {
            user_id: change.user_id,
            status: change.status,
        }
    }
}

impl ServerEvent {
    /// Wire name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished { .. } => "connectionEstablished",
            Self::PresenceChanged { .. } => "presenceChanged",
            Self::NewMessage { .. } => "newMessage",
            Self::NewQuestion { .. } => "newQuestion",
            Self::NewNotification { .. } => "newNotification",
            Self::MessagesMarkedRead { .. } => "messagesMarkedRead",
        }
    }
}
