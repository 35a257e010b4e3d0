use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{Listing, ListingId, ListingStatus, UserId};
use super::geo::{NearbyListing, NearbyQuery};

/// Persistence seam for listings.
///
/// Every status change goes through a conditional write keyed on the status (and,
/// for full-record commits, the revision) the caller last observed. Implementations
/// must evaluate the condition and apply the write as one indivisible step.
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn insert(&self, listing: Listing) -> Result<Listing, StoreError>;

    async fn fetch(&self, id: &ListingId) -> Result<Option<Listing>, StoreError>;

    /// Lookup through the claim-code index.
    async fn find_by_claim_code(&self, code: &str) -> Result<Option<Listing>, StoreError>;

    /// Move `id` from `from` to `to` only if it is currently `from`.
    async fn update_status(
        &self,
        id: &ListingId,
        from: ListingStatus,
        to: ListingStatus,
        now: DateTime<Utc>,
    ) -> Result<Listing, StoreError>;

    /// Replace the stored record with `next` only if the stored record still has
    /// `expected_status` and `next.revision`.
    async fn commit(
        &self,
        expected_status: ListingStatus,
        next: Listing,
        now: DateTime<Utc>,
    ) -> Result<Listing, StoreError>;

    async fn nearby(
        &self,
        query: &NearbyQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<NearbyListing>, StoreError>;

    /// Claimed listings closing in `(now, until]` that have not been warned yet.
    async fn claimed_closing_before(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Listing>, StoreError>;

    /// Flip `expiry_notified` from false to true, but only while the listing still has
    /// `expected` status. Returns `false` when the flag was already set or the status moved.
    async fn latch_expiry_notified(
        &self,
        id: &ListingId,
        expected: ListingStatus,
    ) -> Result<bool, StoreError>;

    /// Published or claimed listings whose window closed before `now`.
    async fn overdue(&self, now: DateTime<Utc>) -> Result<Vec<Listing>, StoreError>;

    async fn created_by(&self, user: &UserId) -> Result<Vec<Listing>, StoreError>;

    async fn claimed_by(&self, user: &UserId) -> Result<Vec<Listing>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("listing not found")]
    NotFound,
    #[error("listing status is {found}, expected {expected}")]
    Conflict {
        expected: ListingStatus,
        found: ListingStatus,
    },
    #[error("listing changed since it was read (revision {expected} vs {found})")]
    Stale { expected: u64, found: u64 },
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition {
        from: ListingStatus,
        to: ListingStatus,
    },
    #[error("listing store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// True for the failures a lost race produces, as opposed to infrastructure errors.
    pub fn is_race(&self) -> bool {
        matches!(self, StoreError::Conflict { .. } | StoreError::Stale { .. })
    }
}
