use async_trait::async_trait;

use super::domain::{EmailMessage, Notification};

/// Outbound web-push adapter. Implementations wrap the provider SDK.
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn push(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Outbound e-mail adapter.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, from: &str, message: &EmailMessage) -> Result<(), DeliveryError>;
}

/// Delivery failure reported by a channel. Never propagated past the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("subscription gone for recipient {0}")]
    SubscriptionGone(String),
    #[error("delivery transport unavailable: {0}")]
    Transport(String),
}
