//! Claim and pickup verification: the listing state machine's receiver-facing half.

pub mod code;
pub mod error;
pub mod lifecycle;
pub mod rewards;
pub mod service;

pub use code::generate_claim_code;
pub use error::ClaimError;
pub use lifecycle::ClaimAttempt;
pub use rewards::RewardTable;
pub use service::{ClaimReceipt, ClaimService, PickupReceipt};
