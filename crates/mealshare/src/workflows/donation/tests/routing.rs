use super::common::*;
use axum::http::StatusCode;
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;

fn listing_body() -> Value {
    serde_json::to_value(new_listing(base_time())).expect("listing json")
}

async fn create_via_router(h: &Harness) -> String {
    let response = h
        .router()
        .oneshot(request(
            "POST",
            "/api/v1/listings",
            Some(&donor()),
            Some(listing_body()),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    body["id"].as_str().expect("id").to_string()
}

async fn claim_via_router(h: &Harness, id: &str) -> (StatusCode, Value) {
    let response = h
        .router()
        .oneshot(request(
            "POST",
            &format!("/api/v1/listings/{id}/claim"),
            Some(&receiver()),
            None,
        ))
        .await
        .expect("response");
    let status = response.status();
    (status, read_json(response).await)
}

async fn verify_via_router(h: &Harness, id: &str, code: &str) -> (StatusCode, Value) {
    let response = h
        .router()
        .oneshot(request(
            "POST",
            "/api/v1/listings/verify-pickup",
            Some(&donor()),
            Some(json!({ "code": code, "listingId": id })),
        ))
        .await
        .expect("response");
    let status = response.status();
    (status, read_json(response).await)
}

#[tokio::test]
async fn create_requires_identity_headers() {
    let h = harness();
    let response = h
        .router()
        .oneshot(request("POST", "/api/v1/listings", None, Some(listing_body())))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_maps_role_and_validation_failures() {
    let h = harness();
    let as_receiver = h
        .router()
        .oneshot(request(
            "POST",
            "/api/v1/listings",
            Some(&receiver()),
            Some(listing_body()),
        ))
        .await
        .expect("response");
    assert_eq!(as_receiver.status(), StatusCode::FORBIDDEN);

    let mut invalid = listing_body();
    invalid["quantity"] = json!(0);
    let response = h
        .router()
        .oneshot(request(
            "POST",
            "/api/v1/listings",
            Some(&donor()),
            Some(invalid),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert!(body["error"].as_str().expect("error").contains("quantity"));
}

#[tokio::test]
async fn nearby_route_returns_rounded_sorted_results() {
    let h = harness();
    create_via_router(&h).await;

    let response = h
        .router()
        .oneshot(request(
            "GET",
            "/api/v1/listings/nearby?lat=18.9353&lng=72.8270&radiusKm=5&vegOnly=true",
            Some(&receiver()),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["count"], json!(1));
    let distance = body["listings"][0]["distance_km"].as_f64().expect("distance");
    assert!((distance - 1.0).abs() < 0.11, "distance was {distance}");

    let too_wide = h
        .router()
        .oneshot(request(
            "GET",
            "/api/v1/listings/nearby?lat=18.9&lng=72.8&radiusKm=80",
            Some(&receiver()),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(too_wide.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn nearby_route_rejects_zero_limit_and_caps_large_ones() {
    let h = harness();
    create_via_router(&h).await;

    let zero = h
        .router()
        .oneshot(request(
            "GET",
            "/api/v1/listings/nearby?lat=18.9353&lng=72.8270&radiusKm=5&limit=0",
            Some(&receiver()),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(zero.status(), StatusCode::BAD_REQUEST);
    let body = read_json(zero).await;
    assert!(body["error"].as_str().expect("error").contains("limit"));

    let large = h
        .router()
        .oneshot(request(
            "GET",
            "/api/v1/listings/nearby?lat=18.9353&lng=72.8270&radiusKm=5&limit=100000",
            Some(&receiver()),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(large.status(), StatusCode::OK);
    assert_eq!(read_json(large).await["count"], json!(1));
}

#[tokio::test]
async fn claim_route_distinguishes_missing_and_taken() {
    let h = harness();
    let id = create_via_router(&h).await;

    let (status, body) = claim_via_router(&h, &id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"].as_str().expect("code").len(), 24);

    let (status, _) = claim_via_router(&h, &id).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = claim_via_router(&h, &uuid::Uuid::new_v4().to_string()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn verify_route_maps_code_failures() {
    let h = harness();
    let id = create_via_router(&h).await;
    let (_, claim) = claim_via_router(&h, &id).await;
    let code = claim["code"].as_str().expect("code").to_string();

    let (status, _) = verify_via_router(&h, &id, "not-the-code").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = verify_via_router(&h, &id, &code).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rewardTokens"], json!(120));
    assert_eq!(body["status"], json!("completed"));

    let (status, _) = verify_via_router(&h, &id, &code).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn verify_route_reports_expired_codes_as_gone() {
    let h = harness();
    let id = create_via_router(&h).await;
    let (_, claim) = claim_via_router(&h, &id).await;
    let code = claim["code"].as_str().expect("code").to_string();

    h.clock.advance(Duration::hours(25));
    let (status, _) = verify_via_router(&h, &id, &code).await;
    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
async fn check_expirations_is_operator_only() {
    let h = harness();
    create_via_router(&h).await;
    h.clock.advance(Duration::hours(3));

    let forbidden = h
        .router()
        .oneshot(request(
            "POST",
            "/api/v1/listings/check-expirations",
            Some(&receiver()),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let response = h
        .router()
        .oneshot(request(
            "POST",
            "/api/v1/listings/check-expirations",
            Some(&admin()),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["listingsExpired"], json!(1));
    assert_eq!(body["notificationsSent"], json!(0));
}

#[tokio::test]
async fn notifications_can_be_listed_and_marked_read() {
    let h = harness();
    let id = create_via_router(&h).await;
    claim_via_router(&h, &id).await;

    let response = h
        .router()
        .oneshot(request(
            "GET",
            "/api/v1/notifications?unreadOnly=true",
            Some(&donor()),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let items = body.as_array().expect("array");
    assert_eq!(items.len(), 1);
    let notification_id = items[0]["id"].as_str().expect("id").to_string();

    let stranger = h
        .router()
        .oneshot(request(
            "POST",
            &format!("/api/v1/notifications/{notification_id}/read"),
            Some(&receiver()),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(stranger.status(), StatusCode::FORBIDDEN);

    let response = h
        .router()
        .oneshot(request(
            "POST",
            &format!("/api/v1/notifications/{notification_id}/read"),
            Some(&donor()),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["read"], json!(true));

    let unread = h
        .router()
        .oneshot(request(
            "GET",
            "/api/v1/notifications?unreadOnly=true",
            Some(&donor()),
            None,
        ))
        .await
        .expect("response");
    let body = read_json(unread).await;
    assert!(body.as_array().expect("array").is_empty());
}

#[tokio::test]
async fn listing_detail_and_donor_analytics_routes() {
    let h = harness();
    let id = create_via_router(&h).await;

    let detail = h
        .router()
        .oneshot(request(
            "GET",
            &format!("/api/v1/listings/{id}"),
            Some(&receiver()),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(detail.status(), StatusCode::OK);
    assert_eq!(read_json(detail).await["status"], json!("published"));

    let analytics = h
        .router()
        .oneshot(request(
            "GET",
            "/api/v1/analytics/donor",
            Some(&donor()),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(analytics.status(), StatusCode::OK);
    let body = read_json(analytics).await;
    assert_eq!(body["totalListings"], json!(1));
    assert_eq!(body["byStatus"]["published"], json!(1));
}
