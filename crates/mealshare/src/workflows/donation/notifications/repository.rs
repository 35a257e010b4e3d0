use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::domain::{Notification, NotificationId};
use crate::workflows::donation::listings::UserId;

/// Storage abstraction for persisted in-app notifications.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: Notification) -> Result<Notification, RepositoryError>;

    /// Newest first.
    async fn list_for(
        &self,
        recipient: &UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError>;

    /// Mark a notification read on behalf of its recipient. Idempotent.
    async fn mark_read(
        &self,
        id: &NotificationId,
        recipient: &UserId,
    ) -> Result<Notification, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("notification not found")]
    NotFound,
    #[error("notification belongs to another recipient")]
    NotRecipient,
    #[error("notification repository unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Default)]
pub struct InMemoryNotificationRepository {
    records: Mutex<HashMap<NotificationId, Notification>>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> RepositoryError {
    RepositoryError::Unavailable("notification mutex poisoned".to_string())
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn insert(&self, notification: Notification) -> Result<Notification, RepositoryError> {
        let mut guard = self.records.lock().map_err(poisoned)?;
        guard.insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn list_for(
        &self,
        recipient: &UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let guard = self.records.lock().map_err(poisoned)?;
        let mut items: Vec<Notification> = guard
            .values()
            .filter(|item| &item.recipient == recipient && (!unread_only || !item.read))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn mark_read(
        &self,
        id: &NotificationId,
        recipient: &UserId,
    ) -> Result<Notification, RepositoryError> {
        let mut guard = self.records.lock().map_err(poisoned)?;
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if &record.recipient != recipient {
            return Err(RepositoryError::NotRecipient);
        }
        record.read = true;
        Ok(record.clone())
    }
}
