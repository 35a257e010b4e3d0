//! Periodic expiration sweep.
//!
//! Pass one warns receivers whose claimed pickup window closes soon; pass two
//! expires published or claimed listings whose window has already closed. The
//! warning latch is flipped before the warning is dispatched, so a crash between
//! the two can lose a warning but never duplicate one.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;

use super::claims::lifecycle;
use super::listings::{ListingStatus, ListingStore, StoreError};
use super::notifications::{dispatch_events, Dispatch};
use crate::clock::Clock;
use crate::config::SweeperConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub notifications_sent: usize,
    pub listings_expired: usize,
    pub lost_races: usize,
}

pub struct ExpirationSweeper<S> {
    store: Arc<S>,
    dispatcher: Arc<dyn Dispatch>,
    clock: Arc<dyn Clock>,
    config: SweeperConfig,
}

impl<S> ExpirationSweeper<S>
where
    S: ListingStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        dispatcher: Arc<dyn Dispatch>,
        clock: Arc<dyn Clock>,
        config: SweeperConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            clock,
            config,
        }
    }

    /// Run both passes once. Safe to call repeatedly and concurrently with lifecycle requests.
    pub async fn sweep(&self) -> Result<SweepReport, StoreError> {
        let now = self.clock.now();
        let window = self.config.warning_window();
        let mut report = SweepReport::default();

        let closing = self.store.claimed_closing_before(now, now + window).await?;
        for listing in closing {
            let Some(event) = lifecycle::expiring_soon(&listing, now, window) else {
                continue;
            };
            if !self
                .store
                .latch_expiry_notified(&listing.id, ListingStatus::Claimed)
                .await?
            {
                continue;
            }
            dispatch_events(self.dispatcher.as_ref(), vec![event]).await;
            report.notifications_sent += 1;
        }

        let overdue = self.store.overdue(now).await?;
        for listing in overdue {
            let Ok(outcome) = lifecycle::expire(&listing, now) else {
                continue;
            };
            match self
                .store
                .update_status(&listing.id, listing.status, ListingStatus::Expired, now)
                .await
            {
                Ok(stored) => {
                    tracing::info!(
                        listing_id = %stored.id,
                        status = %stored.status,
                        previous = %listing.status,
                        "listing expired"
                    );
                    dispatch_events(self.dispatcher.as_ref(), outcome.events).await;
                    report.listings_expired += 1;
                }
                Err(error) if error.is_race() => {
                    tracing::debug!(listing_id = %listing.id, %error, "expiry lost race");
                    report.lost_races += 1;
                }
                Err(error) => return Err(error),
            }
        }

        tracing::info!(
            notifications_sent = report.notifications_sent,
            listings_expired = report.listings_expired,
            lost_races = report.lost_races,
            "expiration sweep finished"
        );
        Ok(report)
    }

    /// Run the sweep on the configured cadence until the task is aborted.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let period = self.config.interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(error) = self.sweep().await {
                    tracing::error!(%error, "expiration sweep failed");
                }
            }
        })
    }
}
