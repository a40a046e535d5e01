//! Integration tests for the hort-gate HTTP API
//!
//! Covers device authentication, request validation, the scan endpoint
//! envelope, capacity conflicts, ping and status.

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use helpers::*;
use hort_common::config::{CutoffTime, GateConfig};
use hort_gate::{build_router, AppState};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::path::PathBuf;
use tower::util::ServiceExt; // for `oneshot`

fn test_config() -> GateConfig {
    GateConfig {
        port: 0,
        database_path: PathBuf::from(":memory:"),
        daily_cutoff: CutoffTime::parse("23:59").unwrap(),
        device_online_window_secs: 300,
    }
}

fn setup_app(pool: SqlitePool) -> axum::Router {
    build_router(AppState::new(pool, test_config()))
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("x-device-token", token);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("x-device-token", token);
    }
    builder.body(Body::empty()).unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

// =============================================================================
// Health and authentication
// =============================================================================

#[tokio::test]
async fn health_needs_no_token() {
    let pool = setup_pool().await;
    let app = setup_app(pool);

    let response = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "hort-gate");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn scan_without_token_is_unauthorized() {
    let pool = setup_pool().await;
    let app = setup_app(pool);

    let request = post_json("/checkin", None, json!({"student_rfid": "tag-1"}));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn scan_with_unknown_token_is_unauthorized() {
    let pool = setup_pool().await;
    let app = setup_app(pool);

    let request = post_json(
        "/checkin",
        Some("not-a-token"),
        json!({"student_rfid": "tag-1"}),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Request validation
// =============================================================================

#[tokio::test]
async fn empty_rfid_is_a_bad_request() {
    let pool = setup_pool().await;
    seed_device(&pool, "Terminal 1", "tok-1", None).await;
    let app = setup_app(pool);

    let request = post_json("/checkin", Some("tok-1"), json!({"student_rfid": ""}));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("student_rfid"));
}

#[tokio::test]
async fn unknown_action_is_a_bad_request() {
    let pool = setup_pool().await;
    seed_device(&pool, "Terminal 1", "tok-1", None).await;
    seed_tagged_student(&pool, "Anna", "tag-anna", None).await;
    let app = setup_app(pool);

    let request = post_json(
        "/checkin",
        Some("tok-1"),
        json!({"student_rfid": "tag-anna", "action": "teleport"}),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_tag_is_not_found() {
    let pool = setup_pool().await;
    seed_device(&pool, "Terminal 1", "tok-1", None).await;
    let app = setup_app(pool);

    let request = post_json(
        "/checkin",
        Some("tok-1"),
        json!({"student_rfid": "ghost-tag", "room_id": 1}),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = extract_json(response.into_body()).await;
    assert!(body["message"].as_str().unwrap().contains("ghost-tag"));
}

// =============================================================================
// Scan envelope
// =============================================================================

#[tokio::test]
async fn checkin_returns_the_full_envelope() {
    let pool = setup_pool().await;
    let room = seed_room(&pool, "Bauzimmer", None).await;
    let activity = seed_activity(&pool, "Lego", 20).await;
    seed_session(&pool, activity, room, None).await;
    let student = seed_tagged_student(&pool, "Anna", "tag-anna", None).await;
    seed_device(&pool, "Terminal 1", "tok-1", None).await;
    let app = setup_app(pool);

    let request = post_json(
        "/checkin",
        Some("tok-1"),
        json!({"student_rfid": "tag-anna", "room_id": room}),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["action"], "checked_in");
    assert_eq!(body["student_id"], student);
    assert_eq!(body["student_name"], "Anna Muster");
    assert_eq!(body["room_name"], "Bauzimmer");
    assert!(body["visit_id"].is_number());
    assert!(body["processed_at"].is_string());
    assert_eq!(body["daily_checkout_available"], false);
    assert_eq!(body["active_students"], 1);
    assert!(body.get("previous_room").is_none());
}

#[tokio::test]
async fn transfer_includes_previous_room() {
    let pool = setup_pool().await;
    let room_a = seed_room(&pool, "Bauzimmer", None).await;
    let room_b = seed_room(&pool, "Leseecke", None).await;
    let act_a = seed_activity(&pool, "Lego", 20).await;
    let act_b = seed_activity(&pool, "Lesen", 20).await;
    seed_session(&pool, act_a, room_a, None).await;
    seed_session(&pool, act_b, room_b, None).await;
    seed_tagged_student(&pool, "Ben", "tag-ben", None).await;
    seed_device(&pool, "Terminal 1", "tok-1", None).await;
    let app = setup_app(pool);

    let first = post_json(
        "/checkin",
        Some("tok-1"),
        json!({"student_rfid": "tag-ben", "room_id": room_a}),
    );
    app.clone().oneshot(first).await.unwrap();

    let second = post_json(
        "/checkin",
        Some("tok-1"),
        json!({"student_rfid": "tag-ben", "room_id": room_b}),
    );
    let response = app.oneshot(second).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["action"], "transferred");
    assert_eq!(body["previous_room"], "Bauzimmer");
    assert_eq!(body["room_name"], "Leseecke");
}

#[tokio::test]
async fn full_room_returns_conflict() {
    let pool = setup_pool().await;
    let room = seed_room(&pool, "Werkraum", Some(1)).await;
    let activity = seed_activity(&pool, "Werken", 20).await;
    seed_session(&pool, activity, room, None).await;
    seed_tagged_student(&pool, "Finn", "tag-finn", None).await;
    seed_tagged_student(&pool, "Greta", "tag-greta", None).await;
    seed_device(&pool, "Terminal 1", "tok-1", None).await;
    let app = setup_app(pool);

    let first = post_json(
        "/checkin",
        Some("tok-1"),
        json!({"student_rfid": "tag-finn", "room_id": room}),
    );
    app.clone().oneshot(first).await.unwrap();

    let second = post_json(
        "/checkin",
        Some("tok-1"),
        json!({"student_rfid": "tag-greta", "room_id": room}),
    );
    let response = app.oneshot(second).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = extract_json(response.into_body()).await;
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("1/1"), "counts in message: {}", message);
}

// =============================================================================
// Ping and status
// =============================================================================

#[tokio::test]
async fn ping_refreshes_device_liveness() {
    let pool = setup_pool().await;
    let dev_id = seed_device(&pool, "Terminal 1", "tok-1", None).await;
    let app = setup_app(pool.clone());

    let response = app
        .oneshot(post_json("/ping", Some("tok-1"), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["device_id"], dev_id);
    assert_eq!(body["device_name"], "Terminal 1");
    assert_eq!(body["is_online"], true);
    assert_eq!(body["session_active"], false);
    assert!(body["ping_time"].is_string());

    let last_seen: Option<String> =
        sqlx::query_scalar("SELECT last_seen FROM devices WHERE id = ?")
            .bind(dev_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(last_seen.is_some(), "ping must persist last_seen");
}

#[tokio::test]
async fn ping_reports_a_bound_session() {
    let pool = setup_pool().await;
    let room = seed_room(&pool, "Bauzimmer", None).await;
    let activity = seed_activity(&pool, "Lego", 20).await;
    let dev_id = seed_device(&pool, "Terminal 1", "tok-1", None).await;
    seed_session(&pool, activity, room, Some(dev_id)).await;
    let app = setup_app(pool);

    let response = app
        .oneshot(post_json("/ping", Some("tok-1"), json!({})))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["session_active"], true);
}

#[tokio::test]
async fn status_reports_device_identity() {
    let pool = setup_pool().await;
    let dev_id = seed_device(&pool, "Terminal 1", "tok-1", None).await;
    let app = setup_app(pool);

    // Never pinged: offline
    let response = app
        .clone()
        .oneshot(get("/status", Some("tok-1")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["device_id"], dev_id);
    assert_eq!(body["is_online"], false);

    // After a ping the device counts as online
    app.clone()
        .oneshot(post_json("/ping", Some("tok-1"), json!({})))
        .await
        .unwrap();
    let response = app.oneshot(get("/status", Some("tok-1"))).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["is_online"], true);
}
