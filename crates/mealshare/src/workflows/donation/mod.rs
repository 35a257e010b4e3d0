//! Food-donation marketplace: listings, claims with pickup codes, notifications,
//! the expiration sweep, and donor analytics.

pub mod analytics;
pub mod auth;
pub mod claims;
pub mod events;
pub mod listings;
pub mod marketplace;
pub mod notifications;
pub mod router;
pub mod sweeper;

#[cfg(test)]
mod tests;

pub use analytics::{DonorAnalytics, DonorSummary, ResponseTrend};
pub use auth::{Caller, Role};
pub use claims::{ClaimError, ClaimReceipt, ClaimService, PickupReceipt, RewardTable};
pub use events::{LifecycleEvent, TransitionOutcome};
pub use listings::{
    InMemoryListingStore, Listing, ListingError, ListingId, ListingService, ListingStatus,
    ListingStore, NewListing, StoreError, UserId,
};
pub use marketplace::{InMemoryMarketplace, Marketplace};
pub use notifications::{
    Dispatch, InMemoryNotificationRepository, Mailer, Notification, NotificationHub, PushGateway,
};
pub use router::donation_router;
pub use sweeper::{ExpirationSweeper, SweepReport};
