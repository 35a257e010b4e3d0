use chrono::{DateTime, Utc};

use crate::workflows::donation::listings::{ListingStatus, StoreError};

/// Every distinguishable reason a claim or pickup verification can fail.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClaimError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("listing not found")]
    NotFound,
    #[error("listing not available (status {status})")]
    NotAvailable { status: ListingStatus },
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("unknown pickup code")]
    CodeUnknown,
    #[error("pickup code expired at {expired_at}")]
    CodeExpired { expired_at: DateTime<Utc> },
    #[error("pickup code already used")]
    CodeAlreadyUsed,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ClaimError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => ClaimError::NotFound,
            StoreError::Conflict { found, .. } => ClaimError::NotAvailable { status: found },
            other => ClaimError::Store(other),
        }
    }
}
