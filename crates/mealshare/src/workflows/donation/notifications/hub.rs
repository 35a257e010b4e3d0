use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::channels::{DeliveryError, Mailer, PushGateway};
use super::domain::{
    EmailMessage, FeedEvent, Notification, NotificationDraft, NotificationId, NotificationKind,
    StreamMessage,
};
use super::repository::{NotificationRepository, RepositoryError};
use crate::clock::Clock;
use crate::config::DeliveryConfig;
use crate::workflows::donation::events::LifecycleEvent;
use crate::workflows::donation::listings::{ListingStatus, UserId};

const STREAM_CAPACITY: usize = 256;

/// Delivery seam used by the lifecycle services.
///
/// `dispatch` persists before it delivers; the returned record is the stored one.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, draft: NotificationDraft) -> Result<Notification, DispatchError>;

    async fn email(&self, message: EmailMessage) -> Result<(), DeliveryError>;

    fn announce(&self, event: FeedEvent);
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Persists notifications, fans them out to the live stream, and relays push and e-mail.
pub struct NotificationHub<R> {
    repository: Arc<R>,
    push: Arc<dyn PushGateway>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    config: DeliveryConfig,
    stream: broadcast::Sender<StreamMessage>,
}

impl<R> NotificationHub<R>
where
    R: NotificationRepository + 'static,
{
    pub fn new(
        repository: Arc<R>,
        push: Arc<dyn PushGateway>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        config: DeliveryConfig,
    ) -> Self {
        let (stream, _) = broadcast::channel(STREAM_CAPACITY);
        Self {
            repository,
            push,
            mailer,
            clock,
            config,
            stream,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamMessage> {
        self.stream.subscribe()
    }

    pub async fn list(
        &self,
        recipient: &UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError> {
        self.repository.list_for(recipient, unread_only).await
    }

    pub async fn mark_read(
        &self,
        id: &NotificationId,
        recipient: &UserId,
    ) -> Result<Notification, RepositoryError> {
        self.repository.mark_read(id, recipient).await
    }

    fn broadcast(&self, message: StreamMessage) {
        // No subscribers is not an error.
        let _ = self.stream.send(message);
    }
}

#[async_trait]
impl<R> Dispatch for NotificationHub<R>
where
    R: NotificationRepository + 'static,
{
    async fn dispatch(&self, draft: NotificationDraft) -> Result<Notification, DispatchError> {
        let notification = Notification::from_draft(draft, self.clock.now());
        let stored = self.repository.insert(notification).await?;

        self.broadcast(StreamMessage::Notification(stored.clone()));
        if let Err(error) = self.push.push(&stored).await {
            tracing::warn!(
                notification_id = %stored.id,
                recipient = %stored.recipient,
                %error,
                "push delivery failed"
            );
        }

        Ok(stored)
    }

    async fn email(&self, message: EmailMessage) -> Result<(), DeliveryError> {
        self.mailer.send(&self.config.mail_from, &message).await
    }

    fn announce(&self, event: FeedEvent) {
        self.broadcast(StreamMessage::Feed(event));
    }
}

/// Turn transition events into deliveries. Failures are logged and never surface to the caller.
pub async fn dispatch_events<D>(dispatcher: &D, events: Vec<LifecycleEvent>)
where
    D: Dispatch + ?Sized,
{
    for event in events {
        let name = event.name();
        let listing_id = event.listing_id();
        let result = deliver(dispatcher, event).await;
        if let Err(error) = result {
            tracing::warn!(event = name, %listing_id, %error, "event delivery failed");
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum DeliveryFailure {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

async fn deliver<D>(dispatcher: &D, event: LifecycleEvent) -> Result<(), DeliveryFailure>
where
    D: Dispatch + ?Sized,
{
    match event {
        LifecycleEvent::Published {
            listing_id,
            title,
            geo,
            available_until,
            ..
        } => {
            dispatcher.announce(FeedEvent::ListingPublished {
                listing_id,
                title,
                latitude: geo.latitude,
                longitude: geo.longitude,
                available_until,
            });
        }
        LifecycleEvent::Claimed {
            listing_id,
            title,
            donor,
            receiver,
            receiver_name,
        } => {
            let to_donor = NotificationDraft::new(
                donor,
                NotificationKind::Claim,
                format!("Your listing \"{title}\" was claimed by {receiver_name}."),
            )
            .for_listing(listing_id)
            .with_metadata("receiver", receiver.0.clone());
            dispatcher.dispatch(to_donor).await?;

            let to_receiver = NotificationDraft::new(
                receiver,
                NotificationKind::Claim,
                format!("You claimed \"{title}\". Show your pickup code to the donor."),
            )
            .for_listing(listing_id);
            dispatcher.dispatch(to_receiver).await?;
        }
        LifecycleEvent::ClaimCodeIssued {
            title,
            receiver,
            code,
            expires_at,
            pickup_address,
            ..
        } => {
            let body = format!(
                "Your pickup code for \"{title}\" is {code}.\n\
                 Pickup address: {pickup_address}\n\
                 The code is valid until {}.",
                expires_at.to_rfc3339()
            );
            dispatcher
                .email(EmailMessage {
                    to: receiver,
                    subject: format!("Pickup code for {title}"),
                    body,
                })
                .await?;
        }
        LifecycleEvent::PickupCompleted {
            listing_id,
            title,
            donor,
            receiver,
            reward_tokens,
        } => {
            let to_donor = NotificationDraft::new(
                donor,
                NotificationKind::Completed,
                format!("Pickup of \"{title}\" is complete. You earned {reward_tokens} tokens."),
            )
            .for_listing(listing_id)
            .with_metadata("reward_tokens", reward_tokens);
            dispatcher.dispatch(to_donor).await?;

            let to_receiver = NotificationDraft::new(
                receiver,
                NotificationKind::Completed,
                format!("Pickup of \"{title}\" confirmed."),
            )
            .for_listing(listing_id);
            dispatcher.dispatch(to_receiver).await?;
        }
        LifecycleEvent::ExpiringSoon {
            listing_id,
            title,
            receiver,
            available_until,
        } => {
            let draft = NotificationDraft::new(
                receiver,
                NotificationKind::ExpiringSoon,
                format!(
                    "The pickup window for \"{title}\" closes at {}.",
                    available_until.format("%H:%M UTC")
                ),
            )
            .for_listing(listing_id)
            .urgent()
            .with_metadata("available_until", available_until.to_rfc3339());
            dispatcher.dispatch(draft).await?;
        }
        LifecycleEvent::Expired { listing_id, .. } => {
            dispatcher.announce(FeedEvent::ListingClosed {
                listing_id,
                status: ListingStatus::Expired,
            });
        }
    }
    Ok(())
}
