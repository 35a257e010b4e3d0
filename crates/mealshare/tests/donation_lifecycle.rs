use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use mealshare::clock::ManualClock;
use mealshare::config::AppConfig;
use mealshare::workflows::donation::listings::{
    FoodType, FoodUnit, Freshness, NearbyQuery, NewListing, PickupLocation,
};
use mealshare::workflows::donation::notifications::{
    DeliveryError, EmailMessage, Mailer, Notification, PushGateway,
};
use mealshare::workflows::donation::{
    Caller, ClaimError, InMemoryMarketplace, ListingStatus, Role,
};

struct Silent;

#[async_trait]
impl PushGateway for Silent {
    async fn push(&self, _notification: &Notification) -> Result<(), DeliveryError> {
        Ok(())
    }
}

#[async_trait]
impl Mailer for Silent {
    async fn send(&self, _from: &str, _message: &EmailMessage) -> Result<(), DeliveryError> {
        Ok(())
    }
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 14, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn marketplace() -> (Arc<InMemoryMarketplace>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start()));
    let market = InMemoryMarketplace::in_memory(
        Arc::new(Silent),
        Arc::new(Silent),
        clock.clone(),
        &AppConfig::default(),
    );
    (Arc::new(market), clock)
}

fn donor() -> Caller {
    Caller::new("campus-canteen", Role::Donor)
}

fn receiver(id: &str) -> Caller {
    Caller::new(id, Role::Receiver)
}

fn sixty_meals(now: DateTime<Utc>) -> NewListing {
    NewListing {
        title: "Lunch surplus".to_string(),
        food_types: vec![FoodType::Vegetarian, FoodType::Bakery],
        quantity: 60.0,
        unit: FoodUnit::Meals,
        freshness: Freshness::FreshlyCooked,
        available_from: now,
        available_until: now + Duration::hours(2),
        location: PickupLocation {
            address: "Main campus canteen".to_string(),
            latitude: 12.9716,
            longitude: 77.5946,
        },
        pickup_instructions: String::new(),
        allow_partial_pickup: true,
        requires_insulated_transport: false,
        images: vec!["https://img.example/lunch.jpg".to_string()],
    }
}

#[tokio::test]
async fn sixty_meal_listing_runs_from_publish_to_reward() {
    let (market, clock) = marketplace();
    let listing = market
        .listings
        .create(&donor(), sixty_meals(start()))
        .await
        .expect("create");

    let nearby = market
        .listings
        .find_nearby(
            &receiver("r-1"),
            NearbyQuery::new(listing.location.point(), 1.0),
        )
        .await
        .expect("nearby");
    assert_eq!(nearby.len(), 1);

    clock.advance(Duration::minutes(10));
    let receipt = market
        .claims
        .claim(&receiver("r-1"), &listing.id)
        .await
        .expect("claim");
    assert_eq!(receipt.response_time_minutes, Some(10));

    let pickup = market
        .claims
        .verify_pickup(&donor(), &receipt.code, &listing.id)
        .await
        .expect("verify");
    assert_eq!(pickup.reward_tokens, 120);

    let stored = market.listings.get(&listing.id).await.expect("fetch");
    assert_eq!(stored.status, ListingStatus::Completed);
    assert_eq!(stored.response_time_minutes, Some(10));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_have_exactly_one_winner() {
    let (market, _clock) = marketplace();
    let listing = market
        .listings
        .create(&donor(), sixty_meals(start()))
        .await
        .expect("create");

    let mut handles = Vec::new();
    for index in 0..8 {
        let market = market.clone();
        let id = listing.id;
        handles.push(tokio::spawn(async move {
            let caller = receiver(&format!("r-{index}"));
            let outcome = market.claims.claim(&caller, &id).await;
            outcome.map(|_| caller.user)
        }));
    }

    let mut winners = Vec::new();
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.expect("task") {
            Ok(user) => winners.push(user),
            Err(ClaimError::NotAvailable { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected claim error: {other}"),
        }
    }
    assert_eq!(winners.len(), 1);
    assert_eq!(conflicts, 7);

    let stored = market.listings.get(&listing.id).await.expect("fetch");
    assert_eq!(stored.status, ListingStatus::Claimed);
    assert_eq!(stored.claimed_by.as_ref(), winners.first());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_scans_of_one_code_complete_once() {
    let (market, _clock) = marketplace();
    let listing = market
        .listings
        .create(&donor(), sixty_meals(start()))
        .await
        .expect("create");
    let receipt = market
        .claims
        .claim(&receiver("r-1"), &listing.id)
        .await
        .expect("claim");

    let mut handles = Vec::new();
    for _ in 0..4 {
        let market = market.clone();
        let code = receipt.code.clone();
        let id = listing.id;
        handles.push(tokio::spawn(async move {
            market.claims.verify_pickup(&donor(), &code, &id).await
        }));
    }

    let mut completed = 0;
    for handle in handles {
        match handle.await.expect("task") {
            Ok(_) => completed += 1,
            Err(error) => assert_eq!(error, ClaimError::CodeAlreadyUsed),
        }
    }
    assert_eq!(completed, 1);
}

#[tokio::test]
async fn swept_listing_cannot_be_claimed() {
    let (market, clock) = marketplace();
    let listing = market
        .listings
        .create(&donor(), sixty_meals(start()))
        .await
        .expect("create");

    clock.advance(Duration::hours(2) + Duration::minutes(1));
    let report = market.sweeper.sweep().await.expect("sweep");
    assert_eq!(report.listings_expired, 1);

    let error = market
        .claims
        .claim(&receiver("r-1"), &listing.id)
        .await
        .expect_err("expired");
    assert!(matches!(error, ClaimError::NotAvailable { .. }));
}

#[tokio::test]
async fn sweeping_twice_matches_sweeping_once() {
    let (market, clock) = marketplace();
    let claimed = market
        .listings
        .create(&donor(), sixty_meals(start()))
        .await
        .expect("create");
    market
        .claims
        .claim(&receiver("r-1"), &claimed.id)
        .await
        .expect("claim");
    let mut short = sixty_meals(start());
    short.available_until = start() + Duration::minutes(30);
    let stale = market
        .listings
        .create(&donor(), short)
        .await
        .expect("create");

    clock.advance(Duration::minutes(45));
    let first = market.sweeper.sweep().await.expect("first sweep");
    assert_eq!(first.notifications_sent, 1);
    assert_eq!(first.listings_expired, 1);
    let claimed_after = market.listings.get(&claimed.id).await.expect("fetch");
    let stale_after = market.listings.get(&stale.id).await.expect("fetch");

    let second = market.sweeper.sweep().await.expect("second sweep");
    assert_eq!(second.notifications_sent, 0);
    assert_eq!(second.listings_expired, 0);
    assert_eq!(
        market.listings.get(&claimed.id).await.expect("fetch"),
        claimed_after
    );
    assert_eq!(
        market.listings.get(&stale.id).await.expect("fetch"),
        stale_after
    );
    assert_eq!(stale_after.status, ListingStatus::Expired);
}
