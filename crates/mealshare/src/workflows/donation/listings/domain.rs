use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier wrapper for donated food listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListingId(pub Uuid);

impl ListingId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque identity of a donor, receiver, or operator as forwarded by the auth gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodUnit {
    Meals,
    Kg,
    Trays,
    Boxes,
}

impl FoodUnit {
    pub const fn label(self) -> &'static str {
        match self {
            FoodUnit::Meals => "meals",
            FoodUnit::Kg => "kg",
            FoodUnit::Trays => "trays",
            FoodUnit::Boxes => "boxes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    FreshlyCooked,
    Chilled,
    Frozen,
    Packaged,
}

/// Food-type tags attached by the donor. Diet filters are derived from these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodType {
    Vegetarian,
    Vegan,
    NonVegetarian,
    Bakery,
    Fruits,
    Dairy,
    Beverages,
}

impl FoodType {
    pub const fn label(self) -> &'static str {
        match self {
            FoodType::Vegetarian => "vegetarian",
            FoodType::Vegan => "vegan",
            FoodType::NonVegetarian => "non_vegetarian",
            FoodType::Bakery => "bakery",
            FoodType::Fruits => "fruits",
            FoodType::Dairy => "dairy",
            FoodType::Beverages => "beverages",
        }
    }
}

/// Lifecycle of a listing. `Completed` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Draft,
    Published,
    Claimed,
    Completed,
    Expired,
}

impl ListingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ListingStatus::Draft => "draft",
            ListingStatus::Published => "published",
            ListingStatus::Claimed => "claimed",
            ListingStatus::Completed => "completed",
            ListingStatus::Expired => "expired",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ListingStatus::Completed | ListingStatus::Expired)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub const fn can_transition_to(self, next: ListingStatus) -> bool {
        matches!(
            (self, next),
            (ListingStatus::Draft, ListingStatus::Published)
                | (ListingStatus::Published, ListingStatus::Claimed)
                | (ListingStatus::Published, ListingStatus::Expired)
                | (ListingStatus::Claimed, ListingStatus::Completed)
                | (ListingStatus::Claimed, ListingStatus::Expired)
        )
    }

    pub const fn allows_claimant(self) -> bool {
        matches!(self, ListingStatus::Claimed | ListingStatus::Completed)
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// WGS84 point stored in GeoJSON order (longitude first).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Pickup address as entered by the donor along with its geocoded coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupLocation {
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl PickupLocation {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.longitude, self.latitude)
    }
}

/// Single-use pickup code minted when a receiver claims a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimToken {
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<UserId>,
}

impl ClaimToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Donor-supplied payload for a new listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewListing {
    pub title: String,
    pub food_types: Vec<FoodType>,
    pub quantity: f64,
    pub unit: FoodUnit,
    pub freshness: Freshness,
    pub available_from: DateTime<Utc>,
    pub available_until: DateTime<Utc>,
    pub location: PickupLocation,
    #[serde(default)]
    pub pickup_instructions: String,
    #[serde(default)]
    pub allow_partial_pickup: bool,
    #[serde(default)]
    pub requires_insulated_transport: bool,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Partial update a donor may apply while the listing is still published.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub available_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub available_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<PickupLocation>,
    #[serde(default)]
    pub pickup_instructions: Option<String>,
    #[serde(default)]
    pub allow_partial_pickup: Option<bool>,
    #[serde(default)]
    pub requires_insulated_transport: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub title: String,
    pub food_types: BTreeSet<FoodType>,
    pub quantity: f64,
    pub unit: FoodUnit,
    pub freshness: Freshness,
    pub available_from: DateTime<Utc>,
    pub available_until: DateTime<Utc>,
    pub location: PickupLocation,
    pub geo: GeoPoint,
    pub pickup_instructions: String,
    pub allow_partial_pickup: bool,
    pub requires_insulated_transport: bool,
    pub images: Vec<String>,
    pub status: ListingStatus,
    pub created_by: UserId,
    pub donor_name: Option<String>,
    pub claimed_by: Option<UserId>,
    pub claimant_name: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub response_time_minutes: Option<i64>,
    pub expiry_notified: bool,
    pub claim_token: Option<ClaimToken>,
    pub reward_tokens: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
}

impl Listing {
    /// Build a published listing from an already validated payload.
    pub fn publish(
        new: NewListing,
        creator: UserId,
        donor_name: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let geo = new.location.point();
        Self {
            id: ListingId::generate(),
            title: new.title.trim().to_string(),
            food_types: new.food_types.into_iter().collect(),
            quantity: new.quantity,
            unit: new.unit,
            freshness: new.freshness,
            available_from: new.available_from,
            available_until: new.available_until,
            location: new.location,
            geo,
            pickup_instructions: new.pickup_instructions,
            allow_partial_pickup: new.allow_partial_pickup,
            requires_insulated_transport: new.requires_insulated_transport,
            images: new.images,
            status: ListingStatus::Published,
            created_by: creator,
            donor_name,
            claimed_by: None,
            claimant_name: None,
            claimed_at: None,
            response_time_minutes: None,
            expiry_notified: false,
            claim_token: None,
            reward_tokens: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    /// Re-derive the fields every write must keep consistent.
    ///
    /// The geographic point mirrors the address coordinates, and a listing whose
    /// window has closed is forced to `Expired` unless it already completed.
    pub fn normalize(&mut self, now: DateTime<Utc>) {
        self.geo = self.location.point();
        if self.available_until < now && !self.status.is_terminal() {
            self.status = ListingStatus::Expired;
        }
        if !self.status.allows_claimant() {
            self.claimed_by = None;
            self.claimant_name = None;
        }
    }

    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ListingStatus::Published && self.available_until >= now
    }

    pub fn is_vegetarian(&self) -> bool {
        !self.food_types.contains(&FoodType::NonVegetarian)
            && (self.food_types.contains(&FoodType::Vegetarian)
                || self.food_types.contains(&FoodType::Vegan))
    }

    pub fn is_vegan(&self) -> bool {
        !self.food_types.contains(&FoodType::NonVegetarian)
            && self.food_types.contains(&FoodType::Vegan)
    }

    pub fn display_donor(&self) -> &str {
        self.donor_name.as_deref().unwrap_or(self.created_by.0.as_str())
    }
}
