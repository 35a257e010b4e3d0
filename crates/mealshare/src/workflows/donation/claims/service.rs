use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::code::generate_claim_code;
use super::error::ClaimError;
use super::lifecycle::{self, ClaimAttempt};
use super::rewards::RewardTable;
use crate::clock::Clock;
use crate::config::ClaimConfig;
use crate::workflows::donation::auth::Caller;
use crate::workflows::donation::listings::{
    Listing, ListingId, ListingStatus, ListingStore, StoreError, UserId,
};
use crate::workflows::donation::notifications::{dispatch_events, Dispatch};

/// Attempts per transition before a persistently stale read is reported as a conflict.
const MAX_COMMIT_ATTEMPTS: usize = 3;

/// What a receiver gets back after a successful claim.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimReceipt {
    pub listing_id: ListingId,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub claimed_at: DateTime<Utc>,
    pub response_time_minutes: Option<i64>,
    pub pickup_address: String,
    pub pickup_instructions: String,
    pub available_until: DateTime<Utc>,
    pub donor_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupReceipt {
    pub listing_id: ListingId,
    pub status: ListingStatus,
    pub reward_tokens: u64,
    pub verified_at: DateTime<Utc>,
    pub receiver: Option<UserId>,
}

/// Claim and pickup-verification workflow over a listing store.
pub struct ClaimService<S> {
    store: Arc<S>,
    dispatcher: Arc<dyn Dispatch>,
    clock: Arc<dyn Clock>,
    config: ClaimConfig,
    rewards: RewardTable,
}

impl<S> ClaimService<S>
where
    S: ListingStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        dispatcher: Arc<dyn Dispatch>,
        clock: Arc<dyn Clock>,
        config: ClaimConfig,
        rewards: RewardTable,
    ) -> Self {
        Self {
            store,
            dispatcher,
            clock,
            config,
            rewards,
        }
    }

    pub fn rewards(&self) -> &RewardTable {
        &self.rewards
    }

    /// Reserve a published listing for the calling receiver and mint its pickup code.
    pub async fn claim(
        &self,
        caller: &Caller,
        listing_id: &ListingId,
    ) -> Result<ClaimReceipt, ClaimError> {
        if !caller.role.can_claim() {
            return Err(ClaimError::Forbidden("only receivers can claim listings"));
        }

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let current = self
                .store
                .fetch(listing_id)
                .await?
                .ok_or(ClaimError::NotFound)?;
            let now = self.clock.now();
            let outcome = lifecycle::claim(
                &current,
                ClaimAttempt {
                    receiver: caller.user.clone(),
                    receiver_name: caller.name.clone(),
                    code: generate_claim_code(self.config.token_length),
                    token_ttl: self.config.token_ttl(),
                },
                now,
            )?;

            match self
                .store
                .commit(ListingStatus::Published, outcome.listing, now)
                .await
            {
                Ok(stored) => {
                    tracing::info!(
                        listing_id = %stored.id,
                        status = %stored.status,
                        claimant = %caller.user,
                        response_time_minutes = stored.response_time_minutes,
                        "listing claimed"
                    );
                    dispatch_events(self.dispatcher.as_ref(), outcome.events).await;
                    return receipt_for_claim(&stored);
                }
                Err(StoreError::Stale { .. }) if attempt < MAX_COMMIT_ATTEMPTS => {
                    tracing::debug!(%listing_id, attempt, "claim read went stale, retrying");
                }
                Err(error) => {
                    if error.is_race() {
                        tracing::debug!(%listing_id, %error, "claim lost race");
                    }
                    return Err(lost_claim(error));
                }
            }
        }

        Err(ClaimError::NotAvailable {
            status: ListingStatus::Published,
        })
    }

    /// Consume the pickup code presented by the receiver and complete the listing.
    pub async fn verify_pickup(
        &self,
        caller: &Caller,
        code: &str,
        listing_id: &ListingId,
    ) -> Result<PickupReceipt, ClaimError> {
        if !caller.role.can_verify_pickup() {
            return Err(ClaimError::Forbidden("only donors can verify pickups"));
        }
        let code = code.trim();
        if code.is_empty() {
            return Err(ClaimError::Validation("pickup code is required".to_string()));
        }

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let current = self
                .store
                .find_by_claim_code(code)
                .await?
                .filter(|listing| &listing.id == listing_id)
                .ok_or(ClaimError::CodeUnknown)?;
            if current.created_by != caller.user {
                return Err(ClaimError::Forbidden(
                    "only the listing's donor can verify its pickup",
                ));
            }

            let now = self.clock.now();
            let outcome =
                lifecycle::verify_pickup(&current, code, &caller.user, &self.rewards, now)?;

            match self
                .store
                .commit(ListingStatus::Claimed, outcome.listing, now)
                .await
            {
                Ok(stored) => {
                    let reward_tokens = stored.reward_tokens.unwrap_or_default();
                    tracing::info!(
                        listing_id = %stored.id,
                        status = %stored.status,
                        reward_tokens,
                        "pickup verified"
                    );
                    dispatch_events(self.dispatcher.as_ref(), outcome.events).await;
                    return Ok(PickupReceipt {
                        listing_id: stored.id,
                        status: stored.status,
                        reward_tokens,
                        verified_at: now,
                        receiver: stored.claimed_by,
                    });
                }
                Err(StoreError::Stale { .. }) if attempt < MAX_COMMIT_ATTEMPTS => {
                    tracing::debug!(%listing_id, attempt, "verification read went stale, retrying");
                }
                Err(StoreError::Conflict {
                    found: ListingStatus::Completed,
                    ..
                }) => {
                    tracing::debug!(%listing_id, "pickup code consumed concurrently");
                    return Err(ClaimError::CodeAlreadyUsed);
                }
                Err(error) => return Err(lost_claim(error)),
            }
        }

        Err(ClaimError::CodeAlreadyUsed)
    }
}

fn lost_claim(error: StoreError) -> ClaimError {
    match error {
        StoreError::Stale { .. } => ClaimError::NotAvailable {
            status: ListingStatus::Claimed,
        },
        other => other.into(),
    }
}

fn receipt_for_claim(listing: &Listing) -> Result<ClaimReceipt, ClaimError> {
    let token = listing.claim_token.as_ref().ok_or_else(|| {
        ClaimError::Store(StoreError::Unavailable(
            "claimed listing stored without a pickup code".to_string(),
        ))
    })?;
    Ok(ClaimReceipt {
        listing_id: listing.id,
        code: token.code.clone(),
        expires_at: token.expires_at,
        claimed_at: listing.claimed_at.unwrap_or(token.issued_at),
        response_time_minutes: listing.response_time_minutes,
        pickup_address: listing.location.address.clone(),
        pickup_instructions: listing.pickup_instructions.clone(),
        available_until: listing.available_until,
        donor_name: listing.display_donor().to_string(),
    })
}
