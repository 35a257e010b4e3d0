use crate::infra::{LoggingMailer, LoggingPushGateway};
use chrono::{Duration, Utc};
use clap::Args;
use mealshare::clock::ManualClock;
use mealshare::config::AppConfig;
use mealshare::error::AppError;
use mealshare::workflows::donation::listings::{
    FoodType, FoodUnit, Freshness, NearbyQuery, NewListing, PickupLocation,
};
use mealshare::workflows::donation::{Caller, InMemoryMarketplace, Role};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Quantity of surplus food offered by the donor
    #[arg(long, default_value_t = 60.0)]
    pub(crate) quantity: f64,
    /// Unit for the quantity: meals, kg, trays, or boxes
    #[arg(long, value_parser = parse_unit, default_value = "meals")]
    pub(crate) unit: FoodUnit,
    /// Minutes between publication and the receiver's claim
    #[arg(long, default_value_t = 10)]
    pub(crate) response_minutes: i64,
    /// Print the donor dashboard as JSON after the walkthrough
    #[arg(long)]
    pub(crate) json: bool,
}

fn parse_unit(raw: &str) -> Result<FoodUnit, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "meals" => Ok(FoodUnit::Meals),
        "kg" => Ok(FoodUnit::Kg),
        "trays" => Ok(FoodUnit::Trays),
        "boxes" => Ok(FoodUnit::Boxes),
        other => Err(format!("unknown unit '{other}'")),
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        quantity,
        unit,
        response_minutes,
        json,
    } = args;

    let start = Utc::now();
    let clock = Arc::new(ManualClock::new(start));
    let config = AppConfig::default();
    let market = InMemoryMarketplace::in_memory(
        Arc::new(LoggingPushGateway),
        Arc::new(LoggingMailer),
        clock.clone(),
        &config,
    );

    let donor = Caller::new("demo-canteen", Role::Donor).named("Campus Canteen");
    let receiver = Caller::new("demo-shelter", Role::Receiver).named("Riverside Shelter");

    println!("Surplus food marketplace demo");
    let listing = market
        .listings
        .create(
            &donor,
            NewListing {
                title: "Evening buffet surplus".to_string(),
                food_types: vec![FoodType::Vegetarian, FoodType::Bakery],
                quantity,
                unit,
                freshness: Freshness::FreshlyCooked,
                available_from: start,
                available_until: start + Duration::hours(2),
                location: PickupLocation {
                    address: "Campus canteen loading bay".to_string(),
                    latitude: 12.9716,
                    longitude: 77.5946,
                },
                pickup_instructions: "Ask for the duty manager".to_string(),
                allow_partial_pickup: false,
                requires_insulated_transport: true,
                images: Vec::new(),
            },
        )
        .await?;
    println!(
        "- published '{}' ({} {}) until {}",
        listing.title,
        listing.quantity,
        listing.unit.label(),
        listing.available_until.format("%H:%M UTC")
    );

    let mut query = NearbyQuery::new(listing.location.point(), 5.0);
    query.text = Some("buffet".to_string());
    let nearby = market.listings.find_nearby(&receiver, query).await?;
    for hit in &nearby {
        println!(
            "- receiver sees '{}' {:.2} km away",
            hit.listing.title, hit.distance_km
        );
    }

    clock.advance(Duration::minutes(response_minutes));
    let receipt = market.claims.claim(&receiver, &listing.id).await?;
    println!(
        "- claimed after {} min, pickup code valid until {}",
        receipt
            .response_time_minutes
            .map_or_else(|| "?".to_string(), |minutes| minutes.to_string()),
        receipt.expires_at.format("%Y-%m-%d %H:%M UTC")
    );

    clock.advance(Duration::minutes(25));
    let report = market.sweeper.sweep().await?;
    println!(
        "- sweep: {} warnings, {} expired",
        report.notifications_sent, report.listings_expired
    );

    let pickup = market
        .claims
        .verify_pickup(&donor, &receipt.code, &listing.id)
        .await?;
    println!(
        "- pickup verified, {} reward tokens credited to {}",
        pickup.reward_tokens, donor.user
    );

    let inbox = market.notifications.list(&receiver.user, false).await?;
    println!("- receiver inbox holds {} notifications", inbox.len());

    let summary = market.analytics.summary(&donor).await?;
    if json {
        match serde_json::to_string_pretty(&summary) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => eprintln!("unable to render summary: {err}"),
        }
    } else {
        println!(
            "Donor dashboard: {} listings | {:.1} meals rescued | {} tokens",
            summary.total_listings, summary.meals_rescued, summary.tokens_earned
        );
    }

    Ok(())
}
