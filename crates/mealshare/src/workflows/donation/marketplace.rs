use std::sync::Arc;

use super::analytics::DonorAnalytics;
use super::claims::ClaimService;
use super::listings::{InMemoryListingStore, ListingStore};
use super::notifications::{
    Dispatch, InMemoryNotificationRepository, Mailer, NotificationHub, NotificationRepository,
    PushGateway,
};
use super::sweeper::ExpirationSweeper;
use crate::clock::Clock;
use crate::config::AppConfig;

/// Every donation workflow wired over one listing store and one notification hub.
pub struct Marketplace<S, R> {
    pub listings: super::listings::ListingService<S>,
    pub claims: ClaimService<S>,
    pub sweeper: Arc<ExpirationSweeper<S>>,
    pub analytics: DonorAnalytics<S>,
    pub notifications: Arc<NotificationHub<R>>,
}

pub type InMemoryMarketplace = Marketplace<InMemoryListingStore, InMemoryNotificationRepository>;

impl<S, R> Marketplace<S, R>
where
    S: ListingStore + 'static,
    R: NotificationRepository + 'static,
{
    pub fn new(
        store: Arc<S>,
        notifications: Arc<NotificationHub<R>>,
        clock: Arc<dyn Clock>,
        config: &AppConfig,
    ) -> Self {
        let dispatcher: Arc<dyn Dispatch> = notifications.clone();
        Self {
            listings: super::listings::ListingService::new(
                store.clone(),
                dispatcher.clone(),
                clock.clone(),
            ),
            claims: ClaimService::new(
                store.clone(),
                dispatcher.clone(),
                clock.clone(),
                config.claims,
                config.rewards,
            ),
            sweeper: Arc::new(ExpirationSweeper::new(
                store.clone(),
                dispatcher,
                clock.clone(),
                config.sweeper,
            )),
            analytics: DonorAnalytics::new(store, clock, config.rewards),
            notifications,
        }
    }
}

impl InMemoryMarketplace {
    /// Process-local wiring used by the API binary, the demo, and tests.
    pub fn in_memory(
        push: Arc<dyn PushGateway>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        config: &AppConfig,
    ) -> Self {
        let hub = Arc::new(NotificationHub::new(
            Arc::new(InMemoryNotificationRepository::new()),
            push,
            mailer,
            clock.clone(),
            config.delivery.clone(),
        ));
        Self::new(Arc::new(InMemoryListingStore::new()), hub, clock, config)
    }
}
