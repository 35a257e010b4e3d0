use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::auth::Caller;
use super::claims::RewardTable;
use super::listings::{Listing, ListingError, ListingStatus, ListingStore};
use crate::clock::Clock;

const TREND_WINDOW_DAYS: i64 = 30;
/// Relative change in average response time below which the trend counts as steady.
const STEADY_TOLERANCE: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseTrend {
    Improving,
    Declining,
    Steady,
    InsufficientData,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub draft: usize,
    pub published: usize,
    pub claimed: usize,
    pub completed: usize,
    pub expired: usize,
}

impl StatusCounts {
    fn record(&mut self, status: ListingStatus) {
        match status {
            ListingStatus::Draft => self.draft += 1,
            ListingStatus::Published => self.published += 1,
            ListingStatus::Claimed => self.claimed += 1,
            ListingStatus::Completed => self.completed += 1,
            ListingStatus::Expired => self.expired += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorSummary {
    pub total_listings: usize,
    pub by_status: StatusCounts,
    pub meals_rescued: f64,
    pub tokens_earned: u64,
    pub average_response_minutes: Option<f64>,
    pub response_trend: ResponseTrend,
}

/// Summarize a donor's listings as of `now`.
pub fn summarize(listings: &[Listing], rewards: &RewardTable, now: DateTime<Utc>) -> DonorSummary {
    let mut by_status = StatusCounts::default();
    let mut meals_rescued = 0.0;
    let mut tokens_earned = 0;
    let mut response_times = Vec::new();

    for listing in listings {
        by_status.record(listing.status);
        if listing.status == ListingStatus::Completed {
            meals_rescued += rewards.meal_equivalent(listing.quantity, listing.unit);
            tokens_earned += listing.reward_tokens.unwrap_or_default();
        }
        if let Some(minutes) = listing.response_time_minutes {
            response_times.push(minutes);
        }
    }

    DonorSummary {
        total_listings: listings.len(),
        by_status,
        meals_rescued: (meals_rescued * 10.0_f64).round() / 10.0,
        tokens_earned,
        average_response_minutes: average(&response_times),
        response_trend: response_trend(listings, now),
    }
}

/// Compare the mean response time of claims in the last window against the window before it.
pub fn response_trend(listings: &[Listing], now: DateTime<Utc>) -> ResponseTrend {
    let window = Duration::days(TREND_WINDOW_DAYS);
    let current_start = now - window;
    let prior_start = current_start - window;

    let mut current = Vec::new();
    let mut prior = Vec::new();
    for listing in listings {
        let (Some(claimed_at), Some(minutes)) = (listing.claimed_at, listing.response_time_minutes)
        else {
            continue;
        };
        if claimed_at > current_start && claimed_at <= now {
            current.push(minutes);
        } else if claimed_at > prior_start && claimed_at <= current_start {
            prior.push(minutes);
        }
    }

    match (average(&current), average(&prior)) {
        (Some(current), Some(prior)) => {
            if prior <= f64::EPSILON {
                return if current <= f64::EPSILON {
                    ResponseTrend::Steady
                } else {
                    ResponseTrend::Declining
                };
            }
            let change = (current - prior) / prior;
            if change < -STEADY_TOLERANCE {
                ResponseTrend::Improving
            } else if change > STEADY_TOLERANCE {
                ResponseTrend::Declining
            } else {
                ResponseTrend::Steady
            }
        }
        _ => ResponseTrend::InsufficientData,
    }
}

fn average(values: &[i64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let total: i64 = values.iter().sum();
    Some(total as f64 / values.len() as f64)
}

/// Read-side service backing the donor dashboard.
pub struct DonorAnalytics<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    rewards: RewardTable,
}

impl<S> DonorAnalytics<S>
where
    S: ListingStore + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, rewards: RewardTable) -> Self {
        Self {
            store,
            clock,
            rewards,
        }
    }

    pub async fn summary(&self, caller: &Caller) -> Result<DonorSummary, ListingError> {
        if !caller.role.can_view_analytics() {
            return Err(ListingError::Forbidden("donor analytics are only available to donors"));
        }
        let listings = self.store.created_by(&caller.user).await?;
        Ok(summarize(&listings, &self.rewards, self.clock.now()))
    }
}
