use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{Listing, ListingId, ListingStatus, UserId};
use super::geo::{rank_nearby, NearbyListing, NearbyQuery};
use super::store::{ListingStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    listings: HashMap<ListingId, Listing>,
    claim_codes: HashMap<String, ListingId>,
}

impl Tables {
    fn index_claim_code(&mut self, listing: &Listing) {
        if let Some(token) = &listing.claim_token {
            self.claim_codes.insert(token.code.clone(), listing.id);
        }
    }
}

/// Process-local listing store.
///
/// A single mutex guards the table and the claim-code index, so each conditional
/// write observes and mutates a record without interleaving.
#[derive(Debug, Default)]
pub struct InMemoryListingStore {
    tables: Mutex<Tables>,
}

impl InMemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("listing store mutex poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|tables| tables.listings.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn newest_first(mut listings: Vec<Listing>) -> Vec<Listing> {
    listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    listings
}

#[async_trait]
impl ListingStore for InMemoryListingStore {
    async fn insert(&self, mut listing: Listing) -> Result<Listing, StoreError> {
        let mut tables = self.lock()?;
        if tables.listings.contains_key(&listing.id) {
            let found = tables.listings[&listing.id].status;
            return Err(StoreError::Conflict {
                expected: listing.status,
                found,
            });
        }
        listing.normalize(listing.updated_at);
        listing.revision = 1;
        tables.index_claim_code(&listing);
        tables.listings.insert(listing.id, listing.clone());
        Ok(listing)
    }

    async fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, StoreError> {
        let tables = self.lock()?;
        Ok(tables.listings.get(id).cloned())
    }

    async fn find_by_claim_code(&self, code: &str) -> Result<Option<Listing>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .claim_codes
            .get(code)
            .and_then(|id| tables.listings.get(id))
            .cloned())
    }

    async fn update_status(
        &self,
        id: &ListingId,
        from: ListingStatus,
        to: ListingStatus,
        now: DateTime<Utc>,
    ) -> Result<Listing, StoreError> {
        if !from.can_transition_to(to) {
            return Err(StoreError::IllegalTransition { from, to });
        }

        let mut tables = self.lock()?;
        let listing = tables.listings.get_mut(id).ok_or(StoreError::NotFound)?;
        if listing.status != from {
            return Err(StoreError::Conflict {
                expected: from,
                found: listing.status,
            });
        }

        listing.status = to;
        listing.updated_at = now;
        listing.revision += 1;
        listing.normalize(now);
        Ok(listing.clone())
    }

    async fn commit(
        &self,
        expected_status: ListingStatus,
        mut next: Listing,
        now: DateTime<Utc>,
    ) -> Result<Listing, StoreError> {
        let mut tables = self.lock()?;
        let current = tables.listings.get(&next.id).ok_or(StoreError::NotFound)?;
        if current.status != expected_status {
            return Err(StoreError::Conflict {
                expected: expected_status,
                found: current.status,
            });
        }
        if current.revision != next.revision {
            return Err(StoreError::Stale {
                expected: next.revision,
                found: current.revision,
            });
        }
        if next.status != expected_status && !expected_status.can_transition_to(next.status) {
            return Err(StoreError::IllegalTransition {
                from: expected_status,
                to: next.status,
            });
        }

        next.updated_at = now;
        next.revision += 1;
        next.normalize(now);
        tables.index_claim_code(&next);
        tables.listings.insert(next.id, next.clone());
        Ok(next)
    }

    async fn nearby(
        &self,
        query: &NearbyQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<NearbyListing>, StoreError> {
        let tables = self.lock()?;
        Ok(rank_nearby(tables.listings.values(), query, now))
    }

    async fn claimed_closing_before(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Listing>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .listings
            .values()
            .filter(|listing| {
                listing.status == ListingStatus::Claimed
                    && !listing.expiry_notified
                    && listing.available_until > now
                    && listing.available_until <= until
            })
            .cloned()
            .collect())
    }

    async fn latch_expiry_notified(
        &self,
        id: &ListingId,
        expected: ListingStatus,
    ) -> Result<bool, StoreError> {
        let mut tables = self.lock()?;
        let listing = tables.listings.get_mut(id).ok_or(StoreError::NotFound)?;
        if listing.status != expected || listing.expiry_notified {
            return Ok(false);
        }
        listing.expiry_notified = true;
        listing.revision += 1;
        Ok(true)
    }

    async fn overdue(&self, now: DateTime<Utc>) -> Result<Vec<Listing>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .listings
            .values()
            .filter(|listing| {
                matches!(
                    listing.status,
                    ListingStatus::Published | ListingStatus::Claimed
                ) && listing.available_until < now
            })
            .cloned()
            .collect())
    }

    async fn created_by(&self, user: &UserId) -> Result<Vec<Listing>, StoreError> {
        let tables = self.lock()?;
        let listings = tables
            .listings
            .values()
            .filter(|listing| &listing.created_by == user)
            .cloned()
            .collect();
        Ok(newest_first(listings))
    }

    async fn claimed_by(&self, user: &UserId) -> Result<Vec<Listing>, StoreError> {
        let tables = self.lock()?;
        let listings = tables
            .listings
            .values()
            .filter(|listing| listing.claimed_by.as_ref() == Some(user))
            .cloned()
            .collect();
        Ok(newest_first(listings))
    }
}
