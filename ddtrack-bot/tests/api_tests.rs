use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use ddtrack_bot::create_app;
use ddtrack_core::{TickOutcome, TickReport, TrackerStatus};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::sync::watch;
use tower::ServiceExt;
// for `oneshot` method

/// Helper to create app with default test configuration
fn create_test_app(status: watch::Receiver<TrackerStatus>) -> axum::Router {
    let config = ddtrack_bot::config::Config::default();
    create_app(status, config.request_body_limit, config.request_timeout)
}

/// Helper to send a request and get response
async fn send_request(app: axum::Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(uri)
        .method(method)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();

    // Try to parse as JSON, or return empty object
    let json = if body_bytes.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(json!({}))
    };

    (status, json)
}

fn ticked_status() -> TrackerStatus {
    TrackerStatus {
        tracked_players: 3,
        active_notifications: 2,
        last_tick_at: Some(1_760_000_000),
        last_outcome: Some(TickOutcome::Applied(TickReport {
            sent: 2,
            edited: 0,
            deleted: 1,
            failed: 0,
        })),
        consecutive_source_failures: 0,
        channel: Some(1_234_567_890_123_456_789),
    }
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let (_tx, rx) = watch::channel(TrackerStatus::default());
    let app = create_test_app(rx);

    let (status, _body) = send_request(app, "GET", "/health").await;

    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// STATUS ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_status_before_first_tick_is_unavailable() {
    let (_tx, rx) = watch::channel(TrackerStatus::default());
    let app = create_test_app(rx);

    let (status, body) = send_request(app, "GET", "/status").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Tracker is starting");
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn test_status_reports_latest_tick() {
    let (tx, rx) = watch::channel(TrackerStatus::default());
    let app = create_test_app(rx);
    tx.send_replace(ticked_status());

    let (status, body) = send_request(app, "GET", "/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tracked_players"], 3);
    assert_eq!(body["active_notifications"], 2);
    assert_eq!(body["last_tick_at"], 1_760_000_000);
    assert_eq!(body["channel"], "1234567890123456789");
    assert_eq!(body["source_reachable"], true);
    assert_eq!(body["last_outcome"]["outcome"], "applied");
    assert_eq!(body["last_outcome"]["detail"]["sent"], 2);
    assert_eq!(body["last_outcome"]["detail"]["deleted"], 1);
}

#[tokio::test]
async fn test_status_after_source_failure() {
    let (tx, rx) = watch::channel(TrackerStatus::default());
    let app = create_test_app(rx);
    tx.send_replace(TrackerStatus {
        consecutive_source_failures: 2,
        last_outcome: Some(TickOutcome::Skipped("HTTP 502".to_string())),
        ..ticked_status()
    });

    let (status, body) = send_request(app, "GET", "/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source_reachable"], false);
    assert_eq!(body["consecutive_source_failures"], 2);
    assert_eq!(body["last_outcome"]["outcome"], "skipped");
    assert_eq!(body["last_outcome"]["detail"], "HTTP 502");
}

#[tokio::test]
async fn test_unchanged_outcome_has_no_detail() {
    let (tx, rx) = watch::channel(TrackerStatus::default());
    let app = create_test_app(rx);
    tx.send_replace(TrackerStatus {
        last_outcome: Some(TickOutcome::Unchanged),
        ..ticked_status()
    });

    let (_status, body) = send_request(app, "GET", "/status").await;

    assert_eq!(body["last_outcome"], json!({ "outcome": "unchanged" }));
}

// =============================================================================
// ROUTING TESTS
// =============================================================================

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let (_tx, rx) = watch::channel(TrackerStatus::default());
    let app = create_test_app(rx);

    let (status, body) = send_request(app, "GET", "/connect").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn test_status_rejects_post() {
    let (_tx, rx) = watch::channel(TrackerStatus::default());
    let app = create_test_app(rx);

    let (status, _body) = send_request(app, "POST", "/status").await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
