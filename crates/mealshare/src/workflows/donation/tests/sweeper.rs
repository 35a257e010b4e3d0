use super::common::*;
use chrono::Duration;

use crate::workflows::donation::claims::ClaimError;
use crate::workflows::donation::listings::{
    InMemoryListingStore, Listing, ListingStatus, ListingStore,
};
use crate::workflows::donation::notifications::NotificationKind;
use crate::workflows::donation::SweepReport;

async fn expiring_soon_count(h: &Harness) -> usize {
    h.market
        .notifications
        .list(&receiver().user, false)
        .await
        .expect("inbox")
        .iter()
        .filter(|n| n.kind == NotificationKind::ExpiringSoon)
        .count()
}

#[tokio::test]
async fn warns_claimants_once_per_listing() {
    let h = harness();
    let listing = h
        .market
        .listings
        .create(&donor(), new_listing(base_time()))
        .await
        .expect("create");
    h.clock.advance(Duration::minutes(10));
    h.market
        .claims
        .claim(&receiver(), &listing.id)
        .await
        .expect("claim");

    let first = h.market.sweeper.sweep().await.expect("sweep");
    assert_eq!(first.notifications_sent, 1);
    assert_eq!(first.listings_expired, 0);

    h.clock.advance(Duration::minutes(30));
    let second = h.market.sweeper.sweep().await.expect("sweep");
    assert_eq!(second, SweepReport::default());
    assert_eq!(expiring_soon_count(&h).await, 1);

    let stored = h.market.listings.get(&listing.id).await.expect("fetch");
    assert!(stored.expiry_notified);
    assert_eq!(stored.status, ListingStatus::Claimed);

    let warning = h
        .market
        .notifications
        .list(&receiver().user, true)
        .await
        .expect("inbox")
        .into_iter()
        .find(|n| n.kind == NotificationKind::ExpiringSoon)
        .expect("warning");
    assert!(warning.urgent);
    assert_eq!(warning.listing_id, Some(listing.id));
}

#[tokio::test]
async fn skips_unclaimed_and_distant_listings() {
    let h = harness();
    h.market
        .listings
        .create(&donor(), new_listing(base_time()))
        .await
        .expect("create");
    let mut later = new_listing(base_time());
    later.available_until = base_time() + Duration::hours(6);
    let distant = h
        .market
        .listings
        .create(&donor(), later)
        .await
        .expect("create");
    h.market
        .claims
        .claim(&receiver(), &distant.id)
        .await
        .expect("claim");

    let report = h.market.sweeper.sweep().await.expect("sweep");
    assert_eq!(report.notifications_sent, 0);
    assert_eq!(expiring_soon_count(&h).await, 0);
}

#[tokio::test]
async fn expires_overdue_published_listings_once() {
    let h = harness();
    let listing = h
        .market
        .listings
        .create(&donor(), new_listing(base_time()))
        .await
        .expect("create");

    h.clock.advance(Duration::hours(3));
    let first = h.market.sweeper.sweep().await.expect("sweep");
    assert_eq!(first.listings_expired, 1);
    let after_first = h.market.listings.get(&listing.id).await.expect("fetch");
    assert_eq!(after_first.status, ListingStatus::Expired);

    let second = h.market.sweeper.sweep().await.expect("sweep");
    assert_eq!(second, SweepReport::default());
    let after_second = h.market.listings.get(&listing.id).await.expect("fetch");
    assert_eq!(after_first, after_second);

    let claim = h.market.claims.claim(&receiver(), &listing.id).await;
    assert_eq!(
        claim.expect_err("expired listing"),
        ClaimError::NotAvailable {
            status: ListingStatus::Expired
        }
    );
}

#[tokio::test]
async fn expires_overdue_claims_and_clears_claimant() {
    let h = harness();
    let listing = h
        .market
        .listings
        .create(&donor(), new_listing(base_time()))
        .await
        .expect("create");
    h.market
        .claims
        .claim(&receiver(), &listing.id)
        .await
        .expect("claim");

    h.clock.advance(Duration::hours(3));
    let report = h.market.sweeper.sweep().await.expect("sweep");
    assert_eq!(report.listings_expired, 1);

    let stored = h.market.listings.get(&listing.id).await.expect("fetch");
    assert_eq!(stored.status, ListingStatus::Expired);
    assert!(stored.claimed_by.is_none());
}

#[tokio::test]
async fn leaves_completed_listings_alone() {
    let h = harness();
    let listing = h
        .market
        .listings
        .create(&donor(), new_listing(base_time()))
        .await
        .expect("create");
    let receipt = h
        .market
        .claims
        .claim(&receiver(), &listing.id)
        .await
        .expect("claim");
    h.market
        .claims
        .verify_pickup(&donor(), &receipt.code, &listing.id)
        .await
        .expect("verify");

    h.clock.advance(Duration::hours(3));
    let report = h.market.sweeper.sweep().await.expect("sweep");
    assert_eq!(report, SweepReport::default());
    let stored = h.market.listings.get(&listing.id).await.expect("fetch");
    assert_eq!(stored.status, ListingStatus::Completed);
}

#[tokio::test]
async fn warning_latch_only_holds_for_the_expected_status() {
    let store = InMemoryListingStore::new();
    let mut completed = Listing::publish(
        new_listing(base_time()),
        donor().user,
        None,
        base_time(),
    );
    completed.status = ListingStatus::Completed;
    let completed = store.insert(completed).await.expect("insert");

    let latched = store
        .latch_expiry_notified(&completed.id, ListingStatus::Claimed)
        .await
        .expect("latch");
    assert!(!latched);
    let stored = store
        .fetch(&completed.id)
        .await
        .expect("fetch")
        .expect("listing");
    assert!(!stored.expiry_notified);
    assert_eq!(stored.revision, completed.revision);
}

#[tokio::test]
async fn pickup_completed_before_the_latch_gets_no_warning() {
    let h = harness();
    let listing = h
        .market
        .listings
        .create(&donor(), new_listing(base_time()))
        .await
        .expect("create");
    let receipt = h
        .market
        .claims
        .claim(&receiver(), &listing.id)
        .await
        .expect("claim");
    h.market
        .claims
        .verify_pickup(&donor(), &receipt.code, &listing.id)
        .await
        .expect("verify");

    let report = h.market.sweeper.sweep().await.expect("sweep");
    assert_eq!(report.notifications_sent, 0);
    assert_eq!(expiring_soon_count(&h).await, 0);
    let stored = h.market.listings.get(&listing.id).await.expect("fetch");
    assert!(!stored.expiry_notified);
}
