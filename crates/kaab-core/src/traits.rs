//! External collaborators.
//!
//! The realtime core and the assistant only read aggregate entity data and
//! create notifications; everything else about persistence lives elsewhere.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CollaboratorError;
use crate::ids::UserId;

/// Entity categories the assistant can answer questions about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Scholarships, internships, jobs.
    Opportunity,
    /// Mentorship offers.
    Mentorship,
    /// Community posts.
    Post,
    /// Q&A questions.
    Question,
}

impl EntityKind {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Opportunity => "opportunity",
            Self::Mentorship => "mentorship",
            Self::Post => "post",
            Self::Question => "question",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The slice of an entity the assistant reads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Free-form category tag. Empty or missing tags are ignored.
    #[serde(default)]
    pub category: Option<String>,
}

impl EntityRecord {
    /// A record tagged with `category`.
    pub fn tagged(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
        }
    }

    /// A record without a tag.
    pub fn untagged() -> Self {
        Self { category: None }
    }
}

/// Read access to stored entities.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Every stored item of `kind`.
    async fn find_all(&self, kind: EntityKind) -> Result<Vec<EntityRecord>, CollaboratorError>;
}

/// Request to persist a notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    /// Who receives it.
    pub recipient: UserId,
    /// Who caused it.
    pub sender: UserId,
    /// Notification type, e.g. `message` or `answer`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Display text.
    pub content: String,
    /// Optional in-app link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// A stored notification as returned by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Store-assigned identifier.
    pub id: String,
    /// Who receives it.
    pub recipient: UserId,
    /// Who caused it.
    pub sender: UserId,
    /// Notification type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Display text.
    pub content: String,
    /// Optional in-app link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Read flag.
    pub read: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Persists notifications.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a notification and return the stored record.
    async fn create_notification(
        &self,
        request: NewNotification,
    ) -> Result<Notification, CollaboratorError>;
}
