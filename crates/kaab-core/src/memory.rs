//! In-memory collaborators.
//!
//! Used by tests and by the standalone binary when no external store is
//! wired in.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::errors::CollaboratorError;
use crate::traits::{
    EntityKind, EntityRecord, EntityStore, NewNotification, Notification, NotificationStore,
};

/// Entity store backed by a map of records per kind.
#[derive(Default)]
pub struct MemoryEntityStore {
    records: RwLock<HashMap<EntityKind, Vec<EntityRecord>>>,
    queries: AtomicUsize,
}

impl MemoryEntityStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-filled from a `{kind: [records]}` map.
    pub fn with_records(records: HashMap<EntityKind, Vec<EntityRecord>>) -> Self {
        Self {
            records: RwLock::new(records),
            queries: AtomicUsize::new(0),
        }
    }

    /// Parse a JSON seed document shaped `{"post": [{"category": "x"}], ...}`.
    pub fn from_json(json: &str) -> Result<Self, CollaboratorError> {
        let records: HashMap<EntityKind, Vec<EntityRecord>> = serde_json::from_str(json)
            .map_err(|e| CollaboratorError::InvalidResponse(e.to_string()))?;
        Ok(Self::with_records(records))
    }

    /// Append one record.
    pub fn insert(&self, kind: EntityKind, record: EntityRecord) {
        self.records.write().entry(kind).or_default().push(record);
    }

    /// Number of `find_all` calls served.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn find_all(&self, kind: EntityKind) -> Result<Vec<EntityRecord>, CollaboratorError> {
        let _ = self.queries.fetch_add(1, Ordering::Relaxed);
        Ok(self.records.read().get(&kind).cloned().unwrap_or_default())
    }
}

/// Notification store that keeps everything in a vector.
#[derive(Default)]
pub struct MemoryNotificationStore {
    stored: Mutex<Vec<Notification>>,
}

impl MemoryNotificationStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification created so far, oldest first.
    pub fn all(&self) -> Vec<Notification> {
        self.stored.lock().clone()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn create_notification(
        &self,
        request: NewNotification,
    ) -> Result<Notification, CollaboratorError> {
        let notification = Notification {
            id: format!("notif_{}", Uuid::now_v7()),
            recipient: request.recipient,
            sender: request.sender,
            kind: request.kind,
            content: request.content,
            link: request.link,
            read: false,
            created_at: Utc::now(),
        };
        self.stored.lock().push(notification.clone());
        Ok(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::UserId;

    #[tokio::test]
    async fn find_all_returns_inserted_records() {
        let store = MemoryEntityStore::new();
        store.insert(EntityKind::Post, EntityRecord::tagged("career"));
        store.insert(EntityKind::Post, EntityRecord::untagged());

        let posts = store.find_all(EntityKind::Post).await.unwrap();
        assert_eq!(posts.len(), 2);
        let questions = store.find_all(EntityKind::Question).await.unwrap();
        assert!(questions.is_empty());
        assert_eq!(store.query_count(), 2);
    }

    #[tokio::test]
    async fn seed_document_loads() {
        let store = MemoryEntityStore::from_json(
            r#"{"opportunity":[{"category":"scholarship"},{"category":"internship"}],"mentorship":[{}]}"#,
        )
        .unwrap();
        assert_eq!(store.find_all(EntityKind::Opportunity).await.unwrap().len(), 2);
        assert_eq!(store.find_all(EntityKind::Mentorship).await.unwrap().len(), 1);
    }

    #[test]
    fn bad_seed_is_rejected() {
        assert!(MemoryEntityStore::from_json(r#"{"unicorn":[]}"#).is_err());
    }

    #[tokio::test]
    async fn notifications_get_ids_and_are_unread() {
        let store = MemoryNotificationStore::new();
        let stored = store
            .create_notification(NewNotification {
                recipient: UserId::from_raw("u1"),
                sender: UserId::from_raw("u2"),
                kind: "message".into(),
                content: "hello".into(),
                link: Some("/chat/1".into()),
            })
            .await
            .unwrap();
        assert!(stored.id.starts_with("notif_"));
        assert!(!stored.read);
        assert_eq!(store.all().len(), 1);
    }
}
