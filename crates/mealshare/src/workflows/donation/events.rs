use chrono::{DateTime, Utc};
use serde::Serialize;

use super::listings::{GeoPoint, Listing, ListingId, ListingStatus, UserId};

/// Side effects produced by a state transition.
///
/// Transitions return these instead of delivering anything themselves; the
/// dispatcher turns them into notifications, e-mails, and feed broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Published {
        listing_id: ListingId,
        title: String,
        donor: UserId,
        geo: GeoPoint,
        available_until: DateTime<Utc>,
    },
    Claimed {
        listing_id: ListingId,
        title: String,
        donor: UserId,
        receiver: UserId,
        receiver_name: String,
    },
    ClaimCodeIssued {
        listing_id: ListingId,
        title: String,
        receiver: UserId,
        code: String,
        expires_at: DateTime<Utc>,
        pickup_address: String,
    },
    PickupCompleted {
        listing_id: ListingId,
        title: String,
        donor: UserId,
        receiver: UserId,
        reward_tokens: u64,
    },
    ExpiringSoon {
        listing_id: ListingId,
        title: String,
        receiver: UserId,
        available_until: DateTime<Utc>,
    },
    Expired {
        listing_id: ListingId,
        title: String,
        donor: UserId,
        previous_status: ListingStatus,
    },
}

impl LifecycleEvent {
    pub fn published(listing: &Listing) -> Self {
        LifecycleEvent::Published {
            listing_id: listing.id,
            title: listing.title.clone(),
            donor: listing.created_by.clone(),
            geo: listing.geo,
            available_until: listing.available_until,
        }
    }

    pub fn listing_id(&self) -> ListingId {
        match self {
            LifecycleEvent::Published { listing_id, .. }
            | LifecycleEvent::Claimed { listing_id, .. }
            | LifecycleEvent::ClaimCodeIssued { listing_id, .. }
            | LifecycleEvent::PickupCompleted { listing_id, .. }
            | LifecycleEvent::ExpiringSoon { listing_id, .. }
            | LifecycleEvent::Expired { listing_id, .. } => *listing_id,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Published { .. } => "published",
            LifecycleEvent::Claimed { .. } => "claimed",
            LifecycleEvent::ClaimCodeIssued { .. } => "claim_code_issued",
            LifecycleEvent::PickupCompleted { .. } => "pickup_completed",
            LifecycleEvent::ExpiringSoon { .. } => "expiring_soon",
            LifecycleEvent::Expired { .. } => "expired",
        }
    }
}

/// Result of a pure transition: the record to commit plus the events to dispatch once it lands.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub listing: Listing,
    pub events: Vec<LifecycleEvent>,
}
