//! Room naming.
//!
//! These strings are a wire contract with existing web clients and must stay
//! byte-identical: `chat_<id>`, `question-<id>`, `questions`,
//! `mentorship-<id>`, and the raw user id for private rooms.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// Name of the topic every connection joins so it sees presence changes.
pub const PRESENCE_TOPIC: &str = "presence";

/// Global questions broadcast room.
pub const QUESTIONS_TOPIC: &str = "questions";

/// A named broadcast group connections can join and leave.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Direct-chat room for a chat thread.
    pub fn chat(chat_id: &str) -> Self {
        Self(format!("chat_{chat_id}"))
    }

    /// Discussion room for a single question.
    pub fn question(question_id: &str) -> Self {
        Self(format!("question-{question_id}"))
    }

    /// Global questions feed.
    pub fn questions() -> Self {
        Self(QUESTIONS_TOPIC.to_owned())
    }

    /// Discussion room for a single mentorship.
    pub fn mentorship(mentorship_id: &str) -> Self {
        Self(format!("mentorship-{mentorship_id}"))
    }

    /// Private room of a user. Named by the raw user identity.
    pub fn user(user_id: &UserId) -> Self {
        Self(user_id.as_str().to_owned())
    }

    /// Global presence topic.
    pub fn presence() -> Self {
        Self(PRESENCE_TOPIC.to_owned())
    }

    /// Wrap an arbitrary topic name.
    pub fn from_raw(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the topic name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Kind of discussion thread a saved message belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadKind {
    /// Direct chat between users.
    Chat,
    /// Answers/comments under a question.
    Question,
    /// Mentorship discussion.
    Mentorship,
}

/// Reference to a thread, resolvable to the topic its messages fan out on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRef {
    /// Thread kind.
    pub kind: ThreadKind,
    /// Identifier of the chat / question / mentorship.
    pub id: String,
}

impl ThreadRef {
    /// Topic that subscribers of this thread have joined.
    pub fn topic(&self) -> Topic {
        match self.kind {
            ThreadKind::Chat => Topic::chat(&self.id),
            ThreadKind::Question => Topic::question(&self.id),
            ThreadKind::Mentorship => Topic::mentorship(&self.id),
        }
    }
}
