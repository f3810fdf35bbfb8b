//! End-to-end scenarios through the HTTP router.

use axum::http::{Method, StatusCode};
use chrono::Duration as ChronoDuration;
use safeconnect_test_utils::{seed_journey, seed_user, t0};
use serde_json::{json, Value};

#[path = "support/harness.rs"]
mod harness;
use harness::{settle, Harness};

async fn create_user(h: &Harness, name: &str, phone: &str) -> String {
    let (status, body) = h
        .call(
            Method::POST,
            "/api/users",
            Some(json!({ "name": name, "phone": phone })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_str().expect("user id").to_string()
}

async fn add_contact(h: &Harness, user_id: &str, name: &str, phone: &str) {
    let (status, body) = h
        .call(
            Method::POST,
            &format!("/api/users/{}/contacts", user_id),
            Some(json!({ "name": name, "phone": phone, "relationship": "Sibling" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
}

async fn start_journey(h: &Harness, user_id: &str) -> (StatusCode, Value) {
    h.call(
        Method::POST,
        "/api/journeys",
        Some(json!({
            "userId": user_id,
            "startLocation": "Office",
            "destination": "Home",
            "estimatedDuration": 30,
            "bufferTime": 10,
        })),
    )
    .await
}

fn overdue_count(alerts: &Value) -> usize {
    alerts
        .as_array()
        .expect("alert list")
        .iter()
        .filter(|a| a["type"] == "overdue")
        .count()
}

#[tokio::test(start_paused = true)]
async fn test_sos_without_contacts_is_recorded() {
    let h = Harness::new();
    let user_id = create_user(&h, "Alex", "+1 555 010 0100").await;

    let (status, body) = h
        .call(
            Method::POST,
            "/api/alerts",
            Some(json!({ "userId": user_id, "type": "sos", "latitude": 40.7, "longitude": -74.0 })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["alert"]["type"], "sos");
    assert_eq!(body["alert"]["status"], "sent");
    assert_eq!(body["delivery"]["status"], "no_contacts");
    assert_eq!(body["delivery"]["anySucceeded"], false);
    assert!(body["delivery"]["actionHint"].is_string());

    let (_, alerts) = h
        .call(Method::GET, &format!("/api/users/{}/alerts", user_id), None)
        .await;
    assert_eq!(alerts.as_array().map(Vec::len), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_second_active_journey_conflicts() {
    let h = Harness::new();
    let user_id = create_user(&h, "Alex", "+15550100").await;

    let (status, journey) = start_journey(&h, &user_id).await;
    assert_eq!(status, StatusCode::CREATED, "{}", journey);
    assert_eq!(journey["status"], "active");

    let (status, body) = start_journey(&h, &user_id).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ACTIVE_JOURNEY_EXISTS");

    let (status, active) = h
        .call(
            Method::GET,
            &format!("/api/users/{}/journeys/active", user_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(active["id"], journey["id"]);
}

#[tokio::test(start_paused = true)]
async fn test_late_check_in_after_escalation() {
    let h = Harness::new();
    let user_id = create_user(&h, "Alex", "+15550100").await;
    add_contact(&h, &user_id, "Sam", "+15550001").await;

    let (_, journey) = start_journey(&h, &user_id).await;
    let journey_id = journey["id"].as_str().expect("journey id").to_string();

    h.advance_minutes(40).await;
    let (_, current) = h
        .call(Method::GET, &format!("/api/journeys/{}", journey_id), None)
        .await;
    assert_eq!(current["status"], "overdue");

    let (status, finished) = h
        .call(
            Method::PATCH,
            &format!("/api/journeys/{}", journey_id),
            Some(json!({ "status": "completed" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", finished);
    assert_eq!(finished["status"], "completed");
    assert!(finished["completedAt"].is_string());

    h.advance_minutes(60).await;
    let (_, alerts) = h
        .call(Method::GET, &format!("/api/users/{}/alerts", user_id), None)
        .await;
    assert_eq!(overdue_count(&alerts), 1);
    assert!(h
        .gateway
        .texts_to("+15550001")
        .iter()
        .any(|t| t.contains("arrived safely")));
}

#[tokio::test(start_paused = true)]
async fn test_manual_overdue_claims_the_deadline() {
    let h = Harness::new();
    let user_id = create_user(&h, "Alex", "+15550100").await;
    let (_, journey) = start_journey(&h, &user_id).await;
    let journey_id = journey["id"].as_str().expect("journey id").to_string();

    let overdue = json!({ "userId": user_id, "type": "overdue", "journeyId": journey_id });
    let (status, body) = h
        .call(Method::POST, "/api/alerts", Some(overdue.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["alert"]["journeyId"], journey["id"]);

    let (status, body) = h.call(Method::POST, "/api/alerts", Some(overdue)).await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);

    // The deadline timer was claimed and never fires on its own
    h.advance_minutes(60).await;
    let (_, alerts) = h
        .call(Method::GET, &format!("/api/users/{}/alerts", user_id), None)
        .await;
    assert_eq!(overdue_count(&alerts), 1);
}

#[tokio::test(start_paused = true)]
async fn test_untracked_journey_escalates_once() {
    let h = Harness::new();
    let user = seed_user(h.store(), "Alex", "+15550100").await;
    let journey = seed_journey(
        h.store(),
        user.id,
        30,
        Some(10),
        t0() - ChronoDuration::minutes(90),
    )
    .await;
    let overdue = json!({
        "userId": user.id.to_string(),
        "type": "overdue",
        "journeyId": journey.id.to_string(),
    });

    let (first, second) = tokio::join!(
        h.call(Method::POST, "/api/alerts", Some(overdue.clone())),
        h.call(Method::POST, "/api/alerts", Some(overdue)),
    );
    let statuses = [first.0, second.0];
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CREATED).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count(), 1);

    let summary = h.state.engine.recover(h.store()).await.expect("recover");
    assert_eq!(summary.fired, 0);
    settle().await;
    assert_eq!(h.overdue_alerts(user.id).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_overdue_alert_requires_journey() {
    let h = Harness::new();
    let user_id = create_user(&h, "Alex", "+15550100").await;

    let (status, body) = h
        .call(
            Method::POST,
            "/api/alerts",
            Some(json!({ "userId": user_id, "type": "overdue" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");
}

#[tokio::test(start_paused = true)]
async fn test_alert_resolution() {
    let h = Harness::new();
    let user_id = create_user(&h, "Alex", "+15550100").await;
    let (_, created) = h
        .call(
            Method::POST,
            "/api/alerts",
            Some(json!({ "userId": user_id, "type": "sos" })),
        )
        .await;
    let alert_id = created["alert"]["id"].as_str().expect("alert id").to_string();

    let (status, resolved) = h
        .call(
            Method::PATCH,
            &format!("/api/alerts/{}", alert_id),
            Some(json!({ "status": "resolved" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", resolved);
    assert_eq!(resolved["status"], "resolved");
    assert!(resolved["resolvedAt"].is_string());
}

#[tokio::test(start_paused = true)]
async fn test_errors_are_json() {
    let h = Harness::new();

    let (status, body) = h.call(Method::GET, "/api/journeys/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_FORMAT");
    assert!(body["error"].is_string());

    let (status, body) = h
        .call(
            Method::GET,
            "/api/users/0190a4f2-7c3e-7000-8000-000000000000",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "USER_NOT_FOUND");
}

#[tokio::test(start_paused = true)]
async fn test_verification_round_trip() {
    let h = Harness::new();

    let (status, body) = h
        .call(Method::POST, "/api/otp/send", Some(json!({ "phone": "+15550001234" })))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);

    let text = h.gateway.texts_to("+15550001234").pop().expect("code text");
    let code: String = text.chars().filter(char::is_ascii_digit).take(6).collect();

    let (status, body) = h
        .call(
            Method::POST,
            "/api/otp/verify",
            Some(json!({ "phone": "+15550001234", "code": "000000" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["valid"], false);

    let (status, body) = h
        .call(
            Method::POST,
            "/api/otp/verify",
            Some(json!({ "phone": "+15550001234", "code": code })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["valid"], true);

    let (status, body) = h.call(Method::POST, "/api/otp/send", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");
}

#[tokio::test(start_paused = true)]
async fn test_health_probes() {
    let h = Harness::new();

    let (status, _) = h.call(Method::GET, "/health/live", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = h.call(Method::GET, "/health/ready", None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    h.store.set_unavailable(true);
    let (status, _) = h.call(Method::GET, "/health/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
