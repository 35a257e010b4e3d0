use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Router,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use super::auth::Caller;
use super::claims::ClaimError;
use super::listings::{
    DietFilter, GeoPoint, ListingError, ListingId, ListingPatch, ListingStore, NearbyQuery,
    NewListing,
};
use super::marketplace::Marketplace;
use super::notifications::{NotificationId, NotificationRepository, RepositoryError, StreamMessage};

const DEFAULT_RADIUS_KM: f64 = 5.0;

type Shared<S, R> = Arc<Marketplace<S, R>>;

/// Router exposing listing, claim, notification, and analytics endpoints.
pub fn donation_router<S, R>(marketplace: Arc<Marketplace<S, R>>) -> Router
where
    S: ListingStore + 'static,
    R: NotificationRepository + 'static,
{
    Router::new()
        .route("/api/v1/listings", post(create_listing::<S, R>))
        .route("/api/v1/listings/nearby", get(nearby_listings::<S, R>))
        .route("/api/v1/listings/mine", get(my_listings::<S, R>))
        .route("/api/v1/listings/verify-pickup", post(verify_pickup::<S, R>))
        .route(
            "/api/v1/listings/check-expirations",
            post(check_expirations::<S, R>),
        )
        .route(
            "/api/v1/listings/:listing_id",
            get(get_listing::<S, R>).patch(update_listing::<S, R>),
        )
        .route(
            "/api/v1/listings/:listing_id/claim",
            post(claim_listing::<S, R>),
        )
        .route("/api/v1/notifications", get(list_notifications::<S, R>))
        .route(
            "/api/v1/notifications/stream",
            get(notification_stream::<S, R>),
        )
        .route(
            "/api/v1/notifications/:notification_id/read",
            post(mark_notification_read::<S, R>),
        )
        .route("/api/v1/analytics/donor", get(donor_analytics::<S, R>))
        .with_state(marketplace)
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({ "error": message.into() });
    (status, axum::Json(payload)).into_response()
}

fn listing_error_response(error: ListingError) -> Response {
    let status = match &error {
        ListingError::Validation(_) | ListingError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
        ListingError::NotFound => StatusCode::NOT_FOUND,
        ListingError::Forbidden(_) => StatusCode::FORBIDDEN,
        ListingError::NotEditable { .. } => StatusCode::CONFLICT,
        ListingError::Store(_) => {
            tracing::error!(%error, "listing request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_body(status, error.to_string())
}

fn claim_error_response(error: ClaimError) -> Response {
    let status = match &error {
        ClaimError::Validation(_) => StatusCode::BAD_REQUEST,
        ClaimError::NotFound | ClaimError::CodeUnknown => StatusCode::NOT_FOUND,
        ClaimError::NotAvailable { .. } | ClaimError::CodeAlreadyUsed => StatusCode::CONFLICT,
        ClaimError::Forbidden(_) => StatusCode::FORBIDDEN,
        ClaimError::CodeExpired { .. } => StatusCode::GONE,
        ClaimError::Store(_) => {
            tracing::error!(%error, "claim request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_body(status, error.to_string())
}

pub(crate) async fn create_listing<S, R>(
    State(market): State<Shared<S, R>>,
    caller: Caller,
    axum::Json(new): axum::Json<NewListing>,
) -> Response
where
    S: ListingStore + 'static,
    R: NotificationRepository + 'static,
{
    match market.listings.create(&caller, new).await {
        Ok(listing) => {
            let payload = json!({ "id": listing.id, "listing": listing });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => listing_error_response(error),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NearbyParams {
    lat: f64,
    lng: f64,
    #[serde(default)]
    radius_km: Option<f64>,
    #[serde(default)]
    veg_only: bool,
    #[serde(default)]
    vegan_only: bool,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

impl NearbyParams {
    fn into_query(self) -> NearbyQuery {
        let mut query = NearbyQuery::new(
            GeoPoint::new(self.lng, self.lat),
            self.radius_km.unwrap_or(DEFAULT_RADIUS_KM),
        );
        query.diet = if self.vegan_only {
            Some(DietFilter::Vegan)
        } else if self.veg_only {
            Some(DietFilter::Vegetarian)
        } else {
            None
        };
        query.text = self.query.filter(|text| !text.trim().is_empty());
        if let Some(limit) = self.limit {
            query.limit = limit.min(query.limit);
        }
        query
    }
}

pub(crate) async fn nearby_listings<S, R>(
    State(market): State<Shared<S, R>>,
    caller: Caller,
    Query(params): Query<NearbyParams>,
) -> Response
where
    S: ListingStore + 'static,
    R: NotificationRepository + 'static,
{
    match market.listings.find_nearby(&caller, params.into_query()).await {
        Ok(results) => {
            let payload = json!({ "count": results.len(), "listings": results });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => listing_error_response(error),
    }
}

pub(crate) async fn my_listings<S, R>(
    State(market): State<Shared<S, R>>,
    caller: Caller,
) -> Response
where
    S: ListingStore + 'static,
    R: NotificationRepository + 'static,
{
    match market.listings.mine(&caller).await {
        Ok(listings) => (StatusCode::OK, axum::Json(listings)).into_response(),
        Err(error) => listing_error_response(error),
    }
}

pub(crate) async fn get_listing<S, R>(
    State(market): State<Shared<S, R>>,
    _caller: Caller,
    Path(listing_id): Path<Uuid>,
) -> Response
where
    S: ListingStore + 'static,
    R: NotificationRepository + 'static,
{
    match market.listings.get(&ListingId(listing_id)).await {
        Ok(listing) => (StatusCode::OK, axum::Json(listing)).into_response(),
        Err(error) => listing_error_response(error),
    }
}

pub(crate) async fn update_listing<S, R>(
    State(market): State<Shared<S, R>>,
    caller: Caller,
    Path(listing_id): Path<Uuid>,
    axum::Json(patch): axum::Json<ListingPatch>,
) -> Response
where
    S: ListingStore + 'static,
    R: NotificationRepository + 'static,
{
    match market
        .listings
        .update(&caller, &ListingId(listing_id), patch)
        .await
    {
        Ok(listing) => (StatusCode::OK, axum::Json(listing)).into_response(),
        Err(error) => listing_error_response(error),
    }
}

pub(crate) async fn claim_listing<S, R>(
    State(market): State<Shared<S, R>>,
    caller: Caller,
    Path(listing_id): Path<Uuid>,
) -> Response
where
    S: ListingStore + 'static,
    R: NotificationRepository + 'static,
{
    match market.claims.claim(&caller, &ListingId(listing_id)).await {
        Ok(receipt) => (StatusCode::OK, axum::Json(receipt)).into_response(),
        Err(error) => claim_error_response(error),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VerifyPickupRequest {
    #[serde(alias = "qrCode")]
    code: String,
    listing_id: Uuid,
}

pub(crate) async fn verify_pickup<S, R>(
    State(market): State<Shared<S, R>>,
    caller: Caller,
    axum::Json(request): axum::Json<VerifyPickupRequest>,
) -> Response
where
    S: ListingStore + 'static,
    R: NotificationRepository + 'static,
{
    match market
        .claims
        .verify_pickup(&caller, &request.code, &ListingId(request.listing_id))
        .await
    {
        Ok(receipt) => (StatusCode::OK, axum::Json(receipt)).into_response(),
        Err(error) => claim_error_response(error),
    }
}

pub(crate) async fn check_expirations<S, R>(
    State(market): State<Shared<S, R>>,
    caller: Caller,
) -> Response
where
    S: ListingStore + 'static,
    R: NotificationRepository + 'static,
{
    if !caller.role.can_run_sweep() {
        return error_body(StatusCode::FORBIDDEN, "only operators can trigger a sweep");
    }
    match market.sweeper.sweep().await {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => {
            tracing::error!(%error, "on-demand sweep failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NotificationParams {
    #[serde(default)]
    unread_only: bool,
}

pub(crate) async fn list_notifications<S, R>(
    State(market): State<Shared<S, R>>,
    caller: Caller,
    Query(params): Query<NotificationParams>,
) -> Response
where
    S: ListingStore + 'static,
    R: NotificationRepository + 'static,
{
    match market
        .notifications
        .list(&caller.user, params.unread_only)
        .await
    {
        Ok(items) => (StatusCode::OK, axum::Json(items)).into_response(),
        Err(error) => error_body(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
    }
}

pub(crate) async fn mark_notification_read<S, R>(
    State(market): State<Shared<S, R>>,
    caller: Caller,
    Path(notification_id): Path<Uuid>,
) -> Response
where
    S: ListingStore + 'static,
    R: NotificationRepository + 'static,
{
    match market
        .notifications
        .mark_read(&NotificationId(notification_id), &caller.user)
        .await
    {
        Ok(notification) => (StatusCode::OK, axum::Json(notification)).into_response(),
        Err(RepositoryError::NotFound) => {
            error_body(StatusCode::NOT_FOUND, "notification not found")
        }
        Err(RepositoryError::NotRecipient) => error_body(
            StatusCode::FORBIDDEN,
            "notification belongs to another recipient",
        ),
        Err(other) => error_body(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

pub(crate) async fn notification_stream<S, R>(
    State(market): State<Shared<S, R>>,
    caller: Caller,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: ListingStore + 'static,
    R: NotificationRepository + 'static,
{
    let recipient = caller.user;
    tracing::debug!(%recipient, "notification stream opened");
    let stream = BroadcastStream::new(market.notifications.subscribe()).filter_map(move |item| {
        let event = match item {
            Ok(StreamMessage::Notification(notification))
                if notification.recipient == recipient =>
            {
                Event::default()
                    .event("notification")
                    .json_data(&notification)
                    .ok()
            }
            Ok(StreamMessage::Feed(feed)) => Event::default().event("listing").json_data(&feed).ok(),
            // Other recipients' notifications and lag notices are skipped.
            _ => None,
        };
        futures::future::ready(event.map(Ok))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub(crate) async fn donor_analytics<S, R>(
    State(market): State<Shared<S, R>>,
    caller: Caller,
) -> Response
where
    S: ListingStore + 'static,
    R: NotificationRepository + 'static,
{
    match market.analytics.summary(&caller).await {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(error) => listing_error_response(error),
    }
}
