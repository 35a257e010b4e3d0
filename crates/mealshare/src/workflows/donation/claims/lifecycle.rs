//! Pure claim-lifecycle transitions.
//!
//! Each function inspects a listing snapshot and either rejects the transition or
//! returns the next record plus the events it produces. Nothing here touches the
//! store or a delivery channel; callers commit the record with a conditional write
//! and hand the events to the dispatcher afterwards.

use chrono::{DateTime, Duration, Utc};

use super::error::ClaimError;
use super::rewards::RewardTable;
use crate::workflows::donation::events::{LifecycleEvent, TransitionOutcome};
use crate::workflows::donation::listings::{ClaimToken, Listing, ListingStatus, UserId};

/// Inputs for `published -> claimed`.
#[derive(Debug, Clone)]
pub struct ClaimAttempt {
    pub receiver: UserId,
    pub receiver_name: Option<String>,
    pub code: String,
    pub token_ttl: Duration,
}

pub fn claim(
    listing: &Listing,
    attempt: ClaimAttempt,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, ClaimError> {
    if !listing.is_open_at(now) {
        let status = if listing.status == ListingStatus::Published {
            ListingStatus::Expired
        } else {
            listing.status
        };
        return Err(ClaimError::NotAvailable { status });
    }

    let mut next = listing.clone();
    next.status = ListingStatus::Claimed;
    next.claimed_by = Some(attempt.receiver.clone());
    next.claimant_name = attempt.receiver_name.clone();
    next.claimed_at = Some(now);
    if next.response_time_minutes.is_none() {
        next.response_time_minutes = Some((now - listing.created_at).num_minutes().max(0));
    }
    let token = ClaimToken {
        code: attempt.code,
        issued_at: now,
        expires_at: now + attempt.token_ttl,
        verified: false,
        verified_at: None,
        verified_by: None,
    };

    let receiver_name = attempt
        .receiver_name
        .unwrap_or_else(|| attempt.receiver.0.clone());
    let events = vec![
        LifecycleEvent::Claimed {
            listing_id: listing.id,
            title: listing.title.clone(),
            donor: listing.created_by.clone(),
            receiver: attempt.receiver.clone(),
            receiver_name,
        },
        LifecycleEvent::ClaimCodeIssued {
            listing_id: listing.id,
            title: listing.title.clone(),
            receiver: attempt.receiver,
            code: token.code.clone(),
            expires_at: token.expires_at,
            pickup_address: listing.location.address.clone(),
        },
    ];
    next.claim_token = Some(token);

    Ok(TransitionOutcome {
        listing: next,
        events,
    })
}

/// `claimed -> completed` on presentation of the pickup code.
///
/// Checks run in a fixed order: code match, token expiry, single use, status.
pub fn verify_pickup(
    listing: &Listing,
    code: &str,
    verifier: &UserId,
    rewards: &RewardTable,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, ClaimError> {
    let token = match &listing.claim_token {
        Some(token) if token.code == code => token,
        _ => return Err(ClaimError::CodeUnknown),
    };
    if token.is_expired_at(now) {
        return Err(ClaimError::CodeExpired {
            expired_at: token.expires_at,
        });
    }
    if token.verified || listing.status == ListingStatus::Completed {
        return Err(ClaimError::CodeAlreadyUsed);
    }
    if listing.status != ListingStatus::Claimed {
        return Err(ClaimError::NotAvailable {
            status: listing.status,
        });
    }
    let receiver = listing
        .claimed_by
        .clone()
        .ok_or(ClaimError::NotAvailable {
            status: listing.status,
        })?;

    let reward_tokens = rewards.reward_for(listing.quantity, listing.unit);
    let mut next = listing.clone();
    next.status = ListingStatus::Completed;
    next.reward_tokens = Some(reward_tokens);
    if let Some(token) = next.claim_token.as_mut() {
        token.verified = true;
        token.verified_at = Some(now);
        token.verified_by = Some(verifier.clone());
    }

    let events = vec![LifecycleEvent::PickupCompleted {
        listing_id: listing.id,
        title: listing.title.clone(),
        donor: listing.created_by.clone(),
        receiver,
        reward_tokens,
    }];

    Ok(TransitionOutcome {
        listing: next,
        events,
    })
}

/// `published|claimed -> expired` once the availability window has closed.
pub fn expire(listing: &Listing, now: DateTime<Utc>) -> Result<TransitionOutcome, ClaimError> {
    let closable = matches!(
        listing.status,
        ListingStatus::Published | ListingStatus::Claimed
    );
    if !closable || listing.available_until >= now {
        return Err(ClaimError::NotAvailable {
            status: listing.status,
        });
    }

    let mut next = listing.clone();
    next.status = ListingStatus::Expired;
    next.claimed_by = None;
    next.claimant_name = None;

    let events = vec![LifecycleEvent::Expired {
        listing_id: listing.id,
        title: listing.title.clone(),
        donor: listing.created_by.clone(),
        previous_status: listing.status,
    }];

    Ok(TransitionOutcome {
        listing: next,
        events,
    })
}

/// Warning for a claimed listing whose window closes within `window`. `None` when
/// the listing is not eligible or was already warned.
pub fn expiring_soon(
    listing: &Listing,
    now: DateTime<Utc>,
    window: Duration,
) -> Option<LifecycleEvent> {
    if listing.status != ListingStatus::Claimed || listing.expiry_notified {
        return None;
    }
    if listing.available_until <= now || listing.available_until > now + window {
        return None;
    }
    let receiver = listing.claimed_by.clone()?;
    Some(LifecycleEvent::ExpiringSoon {
        listing_id: listing.id,
        title: listing.title.clone(),
        receiver,
        available_until: listing.available_until,
    })
}
