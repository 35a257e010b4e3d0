use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::workflows::donation::listings::{ListingId, ListingStatus, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub Uuid);

impl NotificationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    NewListing,
    Claim,
    ExpiringSoon,
    Completed,
    EventReminder,
}

/// Fully formed notification handed to the dispatcher; identity and timestamps are assigned on persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationDraft {
    pub recipient: UserId,
    pub listing_id: Option<ListingId>,
    pub kind: NotificationKind,
    pub message: String,
    pub urgent: bool,
    pub metadata: Map<String, Value>,
}

impl NotificationDraft {
    pub fn new(recipient: UserId, kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            recipient,
            listing_id: None,
            kind,
            message: message.into(),
            urgent: false,
            metadata: Map::new(),
        }
    }

    pub fn for_listing(mut self, listing_id: ListingId) -> Self {
        self.listing_id = Some(listing_id);
        self
    }

    pub fn urgent(mut self) -> Self {
        self.urgent = true;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: UserId,
    pub listing_id: Option<ListingId>,
    pub kind: NotificationKind,
    pub message: String,
    pub urgent: bool,
    pub read: bool,
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn from_draft(draft: NotificationDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id: NotificationId::generate(),
            recipient: draft.recipient,
            listing_id: draft.listing_id,
            kind: draft.kind,
            message: draft.message,
            urgent: draft.urgent,
            read: false,
            metadata: draft.metadata,
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: UserId,
    pub subject: String,
    pub body: String,
}

/// Broadcast-only updates for every connected stream subscriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    ListingPublished {
        listing_id: ListingId,
        title: String,
        latitude: f64,
        longitude: f64,
        available_until: DateTime<Utc>,
    },
    ListingClosed {
        listing_id: ListingId,
        status: ListingStatus,
    },
}

/// Item carried on the live stream channel.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    Notification(Notification),
    Feed(FeedEvent),
}
