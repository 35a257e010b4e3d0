//! Listing records, validation, proximity search, and the storage seam.

pub mod domain;
pub mod geo;
pub mod memory;
pub mod service;
pub mod store;
pub mod validation;

pub use domain::{
    ClaimToken, FoodType, FoodUnit, Freshness, GeoPoint, Listing, ListingId, ListingPatch,
    ListingStatus, NewListing, PickupLocation, UserId,
};
pub use geo::{haversine_km, DietFilter, NearbyListing, NearbyQuery, MAX_NEARBY_RESULTS};
pub use memory::InMemoryListingStore;
pub use service::{ListingError, ListingService};
pub use store::{ListingStore, StoreError};
pub use validation::ListingValidationError;
