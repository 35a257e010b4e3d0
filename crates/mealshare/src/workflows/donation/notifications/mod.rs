//! In-app notifications, e-mail and push delivery, and the live update stream.

pub mod channels;
pub mod domain;
pub mod hub;
pub mod repository;

pub use channels::{DeliveryError, Mailer, PushGateway};
pub use domain::{
    EmailMessage, FeedEvent, Notification, NotificationDraft, NotificationId, NotificationKind,
    StreamMessage,
};
pub use hub::{dispatch_events, Dispatch, DispatchError, NotificationHub};
pub use repository::{InMemoryNotificationRepository, NotificationRepository, RepositoryError};
