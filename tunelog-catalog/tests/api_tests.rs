//! Integration tests for tunelog-catalog API endpoints
//!
//! Covers routing, both authentication classes, and the cache-serving
//! paths that need no live catalog. The external clients point at an
//! unroutable local port, so any accidental fetch fails fast and shows up
//! in the counts instead of hanging the tests.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot` method
use tunelog_catalog::services::catalog_client::CatalogClient;
use tunelog_catalog::services::knowledge_graph::KnowledgeGraphClient;
use tunelog_catalog::{build_router, db, AppState};
use tunelog_common::api::auth::calculate_hash;

/// Test helper: in-memory database with schema applied
async fn setup_test_db() -> SqlitePool {
    let pool = tunelog_common::db::connect_memory()
        .await
        .expect("Should connect to in-memory database");
    db::schema::initialize_schema(&pool)
        .await
        .expect("Should initialize schema");
    pool
}

/// Test helper: app whose external clients point at an unroutable port
fn setup_app(pool: SqlitePool, shared_secret: i64) -> axum::Router {
    let catalog = CatalogClient::new(
        "Tunelog-test/0.0 ( test@example.com )".to_string(),
        "http://127.0.0.1:9/ws/2".to_string(),
        Duration::from_millis(10),
    )
    .expect("Should build catalog client");
    let graph = KnowledgeGraphClient::new(
        "Tunelog-test/0.0 ( test@example.com )".to_string(),
        "http://127.0.0.1:9/sparql".to_string(),
    )
    .expect("Should build graph client");

    let state = AppState::new(pool, shared_secret, catalog, graph);
    build_router(state)
}

/// Test helper: user with an active session, returning the bearer token
async fn setup_user_session(pool: &SqlitePool, user_id: &str) -> String {
    db::sessions::create_user(pool, user_id, "Test Listener")
        .await
        .expect("Should create user");
    db::sessions::create_session(pool, user_id, Duration::from_secs(3600))
        .await
        .expect("Should create session")
}

/// Test helper: extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn get_with_token(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

// =============================================================================
// Health endpoint
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let pool = setup_test_db().await;
    let app = setup_app(pool, 0);

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "tunelog-catalog");
    assert!(body["version"].is_string());
}

// =============================================================================
// Session authentication
// =============================================================================

#[tokio::test]
async fn test_new_releases_requires_session() {
    let pool = setup_test_db().await;
    let app = setup_app(pool, 0);

    let response = app.oneshot(get("/api/new-releases")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = extract_json(response.into_body()).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_new_releases_rejects_unknown_token() {
    let pool = setup_test_db().await;
    let app = setup_app(pool, 0);

    let response = app
        .oneshot(get_with_token("/api/new-releases", "no-such-token"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_release_status_requires_session() {
    let pool = setup_test_db().await;
    let app = setup_app(pool, 0);

    let response = app
        .oneshot(get("/api/release-status/events?ids=rg-1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// New releases
// =============================================================================

#[tokio::test]
async fn test_new_releases_empty_follow_list() {
    let pool = setup_test_db().await;
    let token = setup_user_session(&pool, "user-1").await;
    let app = setup_app(pool, 0);

    let response = app
        .oneshot(get_with_token("/api/new-releases", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["releases"].as_array().unwrap().len(), 0);
    assert_eq!(body["counts"]["attempted"], 0);
    assert_eq!(body["counts"]["skipped_fresh"], 0);
}

#[tokio::test]
async fn test_new_releases_served_from_fresh_cache_without_fetch() {
    let pool = setup_test_db().await;
    let token = setup_user_session(&pool, "user-1").await;

    db::follows::follow_artist(&pool, "user-1", "artist-a", "Artist A")
        .await
        .unwrap();

    let payload = r#"[{"id":"rg-1","title":"Cached Album","first-release-date":"2026-06-01","primary-type":"Album","secondary-types":[]}]"#;
    db::cache::save_release_entry(&pool, "artist-a", payload, now_ms())
        .await
        .unwrap();

    let app = setup_app(pool, 0);
    let response = app
        .oneshot(get_with_token("/api/new-releases", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let releases = body["releases"].as_array().unwrap();
    assert_eq!(releases.len(), 1);
    assert_eq!(releases[0]["artist_mbid"], "artist-a");
    assert_eq!(releases[0]["release_groups"][0]["id"], "rg-1");
    assert_eq!(body["counts"]["attempted"], 0);
    assert_eq!(body["counts"]["skipped_fresh"], 1);
}

#[tokio::test]
async fn test_new_releases_counts_unreachable_upstream_as_failure() {
    let pool = setup_test_db().await;
    let token = setup_user_session(&pool, "user-1").await;

    db::follows::follow_artist(&pool, "user-1", "artist-a", "Artist A")
        .await
        .unwrap();

    // No cache row: the handler must attempt one fetch, which fails fast
    // against the unroutable client, and still answer 200
    let app = setup_app(pool, 0);
    let response = app
        .oneshot(get_with_token("/api/new-releases", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["counts"]["attempted"], 1);
    assert_eq!(body["counts"]["failed"], 1);
    assert_eq!(body["counts"]["succeeded"], 0);
    assert_eq!(body["releases"].as_array().unwrap().len(), 0);
}

// =============================================================================
// Shared-secret authentication on prewarm routes
// =============================================================================

#[tokio::test]
async fn test_prewarm_auth_disabled_with_zero_secret() {
    let pool = setup_test_db().await;
    let app = setup_app(pool, 0);

    // No followed artists: a pass with nothing to do
    let response = app
        .oneshot(post_json("/api/prewarm/artist-releases", &json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["counts"]["attempted"], 0);
    assert_eq!(body["counts"]["succeeded"], 0);
    assert_eq!(body["counts"]["failed"], 0);
}

#[tokio::test]
async fn test_prewarm_rejects_missing_auth_fields() {
    let pool = setup_test_db().await;
    let app = setup_app(pool, 42);

    let response = app
        .oneshot(post_json("/api/prewarm/artist-releases", &json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_prewarm_rejects_wrong_hash() {
    let pool = setup_test_db().await;
    let app = setup_app(pool, 42);

    let body = json!({
        "timestamp": now_ms(),
        "hash": "0000000000000000000000000000000000000000000000000000000000000000",
    });

    let response = app
        .oneshot(post_json("/api/prewarm/artist-releases", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_prewarm_rejects_stale_timestamp() {
    let pool = setup_test_db().await;
    let app = setup_app(pool, 42);

    let mut body = json!({
        "timestamp": now_ms() - 5000,
        "hash": "",
    });
    let hash = calculate_hash(&body, 42);
    body["hash"] = json!(hash);

    let response = app
        .oneshot(post_json("/api/prewarm/artist-releases", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_prewarm_accepts_valid_credential() {
    let pool = setup_test_db().await;
    let app = setup_app(pool, 42);

    let mut body = json!({
        "timestamp": now_ms(),
        "hash": "",
    });
    let hash = calculate_hash(&body, 42);
    body["hash"] = json!(hash);

    let response = app
        .oneshot(post_json("/api/prewarm/artist-releases", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json_body = extract_json(response.into_body()).await;
    assert_eq!(json_body["counts"]["attempted"], 0);
}

#[tokio::test]
async fn test_prewarm_images_auth_disabled_empty_pass() {
    let pool = setup_test_db().await;
    let app = setup_app(pool, 0);

    let response = app
        .oneshot(post_json("/api/prewarm/artist-images", &json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["counts"]["attempted"], 0);
}

// =============================================================================
// Release-status parameter validation
// =============================================================================

#[tokio::test]
async fn test_release_status_rejects_empty_id_list() {
    let pool = setup_test_db().await;
    let token = setup_user_session(&pool, "user-1").await;
    let app = setup_app(pool, 0);

    let response = app
        .oneshot(get_with_token("/api/release-status/events?ids=", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_release_status_streams_for_cached_items() {
    let pool = setup_test_db().await;
    let token = setup_user_session(&pool, "user-1").await;

    db::cache::save_status_entry(&pool, "rg-1", true, now_ms())
        .await
        .unwrap();

    let app = setup_app(pool, 0);
    let response = app
        .oneshot(get_with_token("/api/release-status/events?ids=rg-1", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(content_type.starts_with("text/event-stream"));

    // Fully cached: the stream completes without touching the catalog
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Stream should complete");
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("event: complete"));
    assert!(text.contains("official"));
}
