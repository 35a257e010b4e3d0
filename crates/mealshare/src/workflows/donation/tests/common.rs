use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::clock::ManualClock;
use crate::config::AppConfig;
use crate::workflows::donation::auth::{Caller, Role, USER_ID_HEADER, USER_ROLE_HEADER};
use crate::workflows::donation::listings::{
    FoodType, FoodUnit, Freshness, NewListing, PickupLocation,
};
use crate::workflows::donation::notifications::{
    DeliveryError, EmailMessage, Mailer, Notification, PushGateway,
};
use crate::workflows::donation::{donation_router, InMemoryMarketplace};

pub(super) fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn donor() -> Caller {
    Caller::new("donor-canteen", Role::Donor).named("North Canteen")
}

pub(super) fn other_donor() -> Caller {
    Caller::new("donor-bakery", Role::Donor)
}

pub(super) fn receiver() -> Caller {
    Caller::new("receiver-ngo", Role::Receiver).named("Food Bridge NGO")
}

pub(super) fn second_receiver() -> Caller {
    Caller::new("receiver-student", Role::Receiver)
}

pub(super) fn admin() -> Caller {
    Caller::new("ops", Role::Admin)
}

/// Mumbai CST; the default pickup point.
pub(super) fn cst() -> PickupLocation {
    PickupLocation {
        address: "CST Canteen, Fort, Mumbai".to_string(),
        latitude: 18.9398,
        longitude: 72.8355,
    }
}

pub(super) fn new_listing(now: DateTime<Utc>) -> NewListing {
    NewListing {
        title: "Veg biryani trays".to_string(),
        food_types: vec![FoodType::Vegetarian],
        quantity: 60.0,
        unit: FoodUnit::Meals,
        freshness: Freshness::FreshlyCooked,
        available_from: now,
        available_until: now + Duration::hours(2),
        location: cst(),
        pickup_instructions: "Ask at the service counter".to_string(),
        allow_partial_pickup: false,
        requires_insulated_transport: true,
        images: Vec::new(),
    }
}

pub(super) fn listing_at(
    now: DateTime<Utc>,
    title: &str,
    latitude: f64,
    longitude: f64,
    food_types: Vec<FoodType>,
) -> NewListing {
    NewListing {
        title: title.to_string(),
        food_types,
        location: PickupLocation {
            address: format!("{title} pickup point"),
            latitude,
            longitude,
        },
        ..new_listing(now)
    }
}

#[derive(Default)]
pub(super) struct RecordingMailer {
    pub(super) sent: Mutex<Vec<(String, EmailMessage)>>,
}

impl RecordingMailer {
    pub(super) fn messages(&self) -> Vec<(String, EmailMessage)> {
        self.sent.lock().expect("mailer mutex").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, from: &str, message: &EmailMessage) -> Result<(), DeliveryError> {
        self.sent
            .lock()
            .expect("mailer mutex")
            .push((from.to_string(), message.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct RecordingPush {
    pub(super) pushed: Mutex<Vec<Notification>>,
}

#[async_trait]
impl PushGateway for RecordingPush {
    async fn push(&self, notification: &Notification) -> Result<(), DeliveryError> {
        self.pushed
            .lock()
            .expect("push mutex")
            .push(notification.clone());
        Ok(())
    }
}

pub(super) struct FailingPush;

#[async_trait]
impl PushGateway for FailingPush {
    async fn push(&self, notification: &Notification) -> Result<(), DeliveryError> {
        Err(DeliveryError::SubscriptionGone(notification.recipient.0.clone()))
    }
}

pub(super) struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _from: &str, _message: &EmailMessage) -> Result<(), DeliveryError> {
        Err(DeliveryError::Transport("smtp down".to_string()))
    }
}

pub(super) struct Harness {
    pub(super) market: Arc<InMemoryMarketplace>,
    pub(super) clock: Arc<ManualClock>,
    pub(super) mailer: Arc<RecordingMailer>,
    pub(super) push: Arc<RecordingPush>,
}

pub(super) fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(base_time()));
    let mailer = Arc::new(RecordingMailer::default());
    let push = Arc::new(RecordingPush::default());
    let market = Arc::new(InMemoryMarketplace::in_memory(
        push.clone(),
        mailer.clone(),
        clock.clone(),
        &AppConfig::default(),
    ));
    Harness {
        market,
        clock,
        mailer,
        push,
    }
}

pub(super) fn failing_harness() -> Harness {
    let clock = Arc::new(ManualClock::new(base_time()));
    let market = Arc::new(InMemoryMarketplace::in_memory(
        Arc::new(FailingPush),
        Arc::new(FailingMailer),
        clock.clone(),
        &AppConfig::default(),
    ));
    Harness {
        market,
        clock,
        mailer: Arc::new(RecordingMailer::default()),
        push: Arc::new(RecordingPush::default()),
    }
}

impl Harness {
    pub(super) fn router(&self) -> Router {
        donation_router(self.market.clone())
    }
}

pub(super) fn request(
    method: &str,
    uri: &str,
    caller: Option<&Caller>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(caller) = caller {
        builder = builder
            .header(USER_ID_HEADER, caller.user.0.as_str())
            .header(USER_ROLE_HEADER, caller.role.label());
    }
    match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&value).expect("serialize body")))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

pub(super) async fn read_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
