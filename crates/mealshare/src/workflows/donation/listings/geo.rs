use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{GeoPoint, Listing};

/// Mean Earth radius in kilometres (IUGG).
const EARTH_RADIUS_KM: f64 = 6371.0088;

pub const MAX_NEARBY_RESULTS: usize = 50;
pub const MAX_RADIUS_KM: f64 = 50.0;

/// Great-circle distance between two points using the haversine formula.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DietFilter {
    Vegetarian,
    Vegan,
}

/// Parameters of a proximity search.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuery {
    pub center: GeoPoint,
    pub radius_km: f64,
    pub diet: Option<DietFilter>,
    pub text: Option<String>,
    pub limit: usize,
}

impl NearbyQuery {
    pub fn new(center: GeoPoint, radius_km: f64) -> Self {
        Self {
            center,
            radius_km,
            diet: None,
            text: None,
            limit: MAX_NEARBY_RESULTS,
        }
    }

    fn matches(&self, listing: &Listing) -> bool {
        let diet_ok = match self.diet {
            None => true,
            Some(DietFilter::Vegetarian) => listing.is_vegetarian(),
            Some(DietFilter::Vegan) => listing.is_vegan(),
        };
        if !diet_ok {
            return false;
        }

        match self.text.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                // Tags match whole labels only, so "vegetarian" never hits "non_vegetarian".
                let tag_needle = needle.replace([' ', '-'], "_");
                listing.title.to_lowercase().contains(&needle)
                    || listing.location.address.to_lowercase().contains(&needle)
                    || listing
                        .food_types
                        .iter()
                        .any(|tag| tag.label() == tag_needle)
            }
        }
    }
}

/// Listing annotated with its distance from the query point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyListing {
    pub listing: Listing,
    pub distance_km: f64,
}

/// Filter, order, and cap candidate listings for a proximity query.
///
/// Only published listings whose window has not closed are eligible.
pub fn rank_nearby<'a, I>(candidates: I, query: &NearbyQuery, now: DateTime<Utc>) -> Vec<NearbyListing>
where
    I: IntoIterator<Item = &'a Listing>,
{
    let mut ranked: Vec<NearbyListing> = candidates
        .into_iter()
        .filter(|listing| listing.is_open_at(now))
        .filter(|listing| query.matches(listing))
        .filter_map(|listing| {
            let distance_km = haversine_km(query.center, listing.geo);
            (distance_km <= query.radius_km).then(|| NearbyListing {
                listing: listing.clone(),
                distance_km,
            })
        })
        .collect();

    ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    ranked.truncate(query.limit.min(MAX_NEARBY_RESULTS));
    ranked
}
