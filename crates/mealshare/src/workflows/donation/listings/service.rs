use std::sync::Arc;

use super::domain::{Listing, ListingId, ListingPatch, ListingStatus, NewListing};
use super::geo::{round_one_decimal, NearbyListing, NearbyQuery, MAX_RADIUS_KM};
use super::store::{ListingStore, StoreError};
use super::validation::{validate_new, validate_patch, ListingValidationError};
use crate::clock::Clock;
use crate::workflows::donation::auth::{Caller, Role};
use crate::workflows::donation::events::LifecycleEvent;
use crate::workflows::donation::notifications::{dispatch_events, Dispatch};

/// Donor-facing listing management and receiver-facing discovery.
pub struct ListingService<S> {
    store: Arc<S>,
    dispatcher: Arc<dyn Dispatch>,
    clock: Arc<dyn Clock>,
}

impl<S> ListingService<S>
where
    S: ListingStore + 'static,
{
    pub fn new(store: Arc<S>, dispatcher: Arc<dyn Dispatch>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            dispatcher,
            clock,
        }
    }

    /// Validate and publish a new listing on behalf of a donor.
    pub async fn create(&self, caller: &Caller, new: NewListing) -> Result<Listing, ListingError> {
        if !caller.role.can_publish() {
            return Err(ListingError::Forbidden("only donors can publish listings"));
        }
        validate_new(&new)?;

        let now = self.clock.now();
        let listing = Listing::publish(new, caller.user.clone(), caller.name.clone(), now);
        let stored = self.store.insert(listing).await?;
        tracing::info!(
            listing_id = %stored.id,
            status = %stored.status,
            donor = %stored.created_by,
            "listing published"
        );

        if stored.status == ListingStatus::Published {
            dispatch_events(
                self.dispatcher.as_ref(),
                vec![LifecycleEvent::published(&stored)],
            )
            .await;
        }
        Ok(stored)
    }

    pub async fn get(&self, id: &ListingId) -> Result<Listing, ListingError> {
        self.store.fetch(id).await?.ok_or(ListingError::NotFound)
    }

    /// Apply a donor's edit while the listing is still published.
    pub async fn update(
        &self,
        caller: &Caller,
        id: &ListingId,
        patch: ListingPatch,
    ) -> Result<Listing, ListingError> {
        let current = self.get(id).await?;
        if current.created_by != caller.user {
            return Err(ListingError::Forbidden("only the creating donor can edit a listing"));
        }
        if current.status != ListingStatus::Published {
            return Err(ListingError::NotEditable {
                status: current.status,
            });
        }
        validate_patch(&patch, current.available_from, current.available_until)?;

        let next = apply_patch(current, patch);
        let now = self.clock.now();
        let stored = self
            .store
            .commit(ListingStatus::Published, next, now)
            .await
            .map_err(|error| match error {
                StoreError::Conflict { found, .. } => ListingError::NotEditable { status: found },
                StoreError::Stale { .. } => ListingError::NotEditable {
                    status: ListingStatus::Published,
                },
                other => other.into(),
            })?;
        tracing::info!(listing_id = %stored.id, status = %stored.status, "listing updated");

        if stored.status == ListingStatus::Expired {
            let event = LifecycleEvent::Expired {
                listing_id: stored.id,
                title: stored.title.clone(),
                donor: stored.created_by.clone(),
                previous_status: ListingStatus::Published,
            };
            dispatch_events(self.dispatcher.as_ref(), vec![event]).await;
        }
        Ok(stored)
    }

    /// Listings the caller created (donors) or claimed (receivers), newest first.
    pub async fn mine(&self, caller: &Caller) -> Result<Vec<Listing>, ListingError> {
        let listings = match caller.role {
            Role::Receiver => self.store.claimed_by(&caller.user).await?,
            Role::Donor | Role::Admin => self.store.created_by(&caller.user).await?,
        };
        Ok(listings)
    }

    /// Published, still-open listings within the query radius, nearest first.
    pub async fn find_nearby(
        &self,
        caller: &Caller,
        query: NearbyQuery,
    ) -> Result<Vec<NearbyListing>, ListingError> {
        if !caller.role.can_browse() {
            return Err(ListingError::Forbidden("caller cannot browse listings"));
        }
        if !query.center.is_valid() {
            return Err(ListingError::InvalidQuery(format!(
                "coordinates out of range (lat {}, lng {})",
                query.center.latitude, query.center.longitude
            )));
        }
        if !query.radius_km.is_finite() || query.radius_km <= 0.0 || query.radius_km > MAX_RADIUS_KM
        {
            return Err(ListingError::InvalidQuery(format!(
                "radius must be within (0, {MAX_RADIUS_KM}] km"
            )));
        }
        if query.limit == 0 {
            return Err(ListingError::InvalidQuery(
                "limit must be at least 1".to_string(),
            ));
        }

        let now = self.clock.now();
        let mut results = self.store.nearby(&query, now).await?;
        for result in &mut results {
            result.distance_km = round_one_decimal(result.distance_km);
        }
        Ok(results)
    }
}

fn apply_patch(mut listing: Listing, patch: ListingPatch) -> Listing {
    if let Some(title) = patch.title {
        listing.title = title.trim().to_string();
    }
    if let Some(quantity) = patch.quantity {
        listing.quantity = quantity;
    }
    if let Some(from) = patch.available_from {
        listing.available_from = from;
    }
    if let Some(until) = patch.available_until {
        listing.available_until = until;
    }
    if let Some(location) = patch.location {
        listing.location = location;
    }
    if let Some(instructions) = patch.pickup_instructions {
        listing.pickup_instructions = instructions;
    }
    if let Some(flag) = patch.allow_partial_pickup {
        listing.allow_partial_pickup = flag;
    }
    if let Some(flag) = patch.requires_insulated_transport {
        listing.requires_insulated_transport = flag;
    }
    listing
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ListingError {
    #[error(transparent)]
    Validation(#[from] ListingValidationError),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("listing not found")]
    NotFound,
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("listing can no longer be edited (status {status})")]
    NotEditable { status: ListingStatus },
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ListingError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => ListingError::NotFound,
            other => ListingError::Store(other),
        }
    }
}
