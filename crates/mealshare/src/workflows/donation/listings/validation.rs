use chrono::{DateTime, Utc};

use super::domain::{ListingPatch, NewListing, PickupLocation};

pub const MAX_IMAGES: usize = 5;
pub const MAX_TITLE_LEN: usize = 120;

/// Reasons a listing payload is rejected before anything is written.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ListingValidationError {
    #[error("title must not be empty")]
    MissingTitle,
    #[error("title exceeds 120 characters")]
    TitleTooLong,
    #[error("at least one food type is required")]
    MissingFoodTypes,
    #[error("quantity must be a positive number (found {0})")]
    NonPositiveQuantity(f64),
    #[error("availability window must start before it ends ({from} >= {until})")]
    InvalidWindow {
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    },
    #[error("at most 5 images are allowed (found {0})")]
    TooManyImages(usize),
    #[error("pickup address must not be empty")]
    MissingAddress,
    #[error("coordinates out of range (lat {latitude}, lng {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

pub fn validate_new(listing: &NewListing) -> Result<(), ListingValidationError> {
    validate_title(&listing.title)?;
    if listing.food_types.is_empty() {
        return Err(ListingValidationError::MissingFoodTypes);
    }
    validate_quantity(listing.quantity)?;
    validate_window(listing.available_from, listing.available_until)?;
    if listing.images.len() > MAX_IMAGES {
        return Err(ListingValidationError::TooManyImages(listing.images.len()));
    }
    validate_location(&listing.location)
}

/// Validate the fields a patch touches. Window checks use the merged values so a
/// patch that moves only one end cannot invert the window.
pub fn validate_patch(
    patch: &ListingPatch,
    current_from: DateTime<Utc>,
    current_until: DateTime<Utc>,
) -> Result<(), ListingValidationError> {
    if let Some(title) = &patch.title {
        validate_title(title)?;
    }
    if let Some(quantity) = patch.quantity {
        validate_quantity(quantity)?;
    }
    let from = patch.available_from.unwrap_or(current_from);
    let until = patch.available_until.unwrap_or(current_until);
    validate_window(from, until)?;
    if let Some(location) = &patch.location {
        validate_location(location)?;
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<(), ListingValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ListingValidationError::MissingTitle);
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(ListingValidationError::TitleTooLong);
    }
    Ok(())
}

fn validate_quantity(quantity: f64) -> Result<(), ListingValidationError> {
    if quantity.is_finite() && quantity > 0.0 {
        Ok(())
    } else {
        Err(ListingValidationError::NonPositiveQuantity(quantity))
    }
}

fn validate_window(
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<(), ListingValidationError> {
    if from < until {
        Ok(())
    } else {
        Err(ListingValidationError::InvalidWindow { from, until })
    }
}

fn validate_location(location: &PickupLocation) -> Result<(), ListingValidationError> {
    if location.address.trim().is_empty() {
        return Err(ListingValidationError::MissingAddress);
    }
    if !location.point().is_valid() {
        return Err(ListingValidationError::InvalidCoordinates {
            latitude: location.latitude,
            longitude: location.longitude,
        });
    }
    Ok(())
}
