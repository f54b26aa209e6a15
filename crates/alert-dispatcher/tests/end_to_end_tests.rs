//! End-to-end tests for the alert dispatcher.
//!
//! The HTTP router is driven in-process with `oneshot`, and the real
//! `SlackClient` talks to a wiremock server standing in for the Slack Web API
//! and interactive response URLs.

use alert_dispatcher::{
    interactive::InteractionProcessor,
    server::{build_router, AppState},
    signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER},
    ChannelRouter, Dispatcher, Priority, RoutingTable, SignatureVerifier, SlackClient,
};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SIGNING_SECRET: &str = "e2e-signing-secret";

// =============================================================================
// Helpers
// =============================================================================

fn routing_table() -> RoutingTable {
    RoutingTable::new("#alerts")
        .unwrap()
        .with_priority_channel(Priority::P0, "#p0-infra-alerts")
        .with_priority_channel(Priority::P1, "#p1-infra-alerts")
        .with_priority_channel(Priority::P2, "#p2-infra-alerts")
        .with_alert_channel("orders-db-replica-lag", "#orders-db")
}

fn app(slack: &MockServer) -> Router {
    let client = Arc::new(
        SlackClient::new("xoxb-e2e", slack.uri(), Duration::from_secs(5)).unwrap(),
    );
    build_router(AppState {
        dispatcher: Dispatcher::new(ChannelRouter::new(Arc::new(routing_table())), client.clone()),
        interactions: InteractionProcessor::new(SignatureVerifier::new(SIGNING_SECRET), client),
    })
}

async fn mount_post_message(slack: &MockServer, channel: &str) {
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .and(body_partial_json(json!({ "channel": channel })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(slack)
        .await;
}

async fn post_json(app: Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn signed_callback(body: &str, timestamp: i64) -> Request<Body> {
    let timestamp = timestamp.to_string();
    let signature = SignatureVerifier::new(SIGNING_SECRET)
        .sign(&timestamp, body.as_bytes())
        .unwrap();
    Request::post("/slack/events")
        .header("content-type", "application/x-www-form-urlencoded")
        .header(TIMESTAMP_HEADER, timestamp)
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn form_body(payload: &Value) -> String {
    serde_urlencoded::to_string([("payload", payload.to_string())]).unwrap()
}

// =============================================================================
// Webhook delivery
// =============================================================================

#[tokio::test]
async fn test_modern_webhook_routes_by_channel_tag() {
    let slack = MockServer::start().await;
    mount_post_message(&slack, "#p1-infra-alerts").await;

    let body = json!({
        "receiver": "alert-dispatcher",
        "status": "firing",
        "alerts": [{
            "status": "firing",
            "labels": {"alertname": "checkout-latency", "channel": "P1", "team": "payments"},
            "annotations": {"description": "p99 above 2s for 5m"},
            "startsAt": "2025-07-23T13:30:00Z"
        }],
        "commonLabels": {"alertname": "checkout-latency", "channel": "P1"}
    });

    let (status, json) = post_json(app(&slack), "/grafana/webhook", &body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "processed");
    assert_eq!(json["channel"], "#p1-infra-alerts");
    assert_eq!(json["priority"], "P1");
    assert_eq!(json["matched_by"], "priority_default");
}

#[tokio::test]
async fn test_explicit_mapping_wins_over_priority() {
    let slack = MockServer::start().await;
    mount_post_message(&slack, "#orders-db").await;

    let body = json!({
        "receiver": "alert-dispatcher",
        "status": "firing",
        "alerts": [{
            "status": "firing",
            "labels": {"alertname": "orders-db-replica-lag", "channel": "P0"}
        }]
    });

    let (status, json) = post_json(app(&slack), "/grafana/webhook", &body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["channel"], "#orders-db");
    assert_eq!(json["matched_by"], "explicit_mapping");
    assert_eq!(json["priority"], "P0");
}

#[tokio::test]
async fn test_unrecognized_body_is_rejected_without_delivery() {
    let slack = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(0)
        .mount(&slack)
        .await;

    let (status, _) = post_json(app(&slack), "/grafana/webhook", &json!(["not", "an", "alert"])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_slack_api_error_is_server_error() {
    let slack = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": false, "error": "channel_not_found" })),
        )
        .mount(&slack)
        .await;

    let body = json!({
        "AlarmName": "prod-api-5xx",
        "NewStateValue": "ALARM",
        "NewStateReason": "Threshold Crossed"
    });

    let (status, _) = post_json(app(&slack), "/grafana/webhook", &body).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

// =============================================================================
// Interactive callbacks
// =============================================================================

#[tokio::test]
async fn test_signed_acknowledge_replaces_message() {
    let slack = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/actions/T1/42/respond"))
        .and(body_partial_json(json!({ "replace_original": true })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&slack)
        .await;

    let payload = json!({
        "type": "block_actions",
        "user": {"id": "U123", "username": "jdoe", "name": "jdoe"},
        "response_url": format!("{}/actions/T1/42/respond", slack.uri()),
        "actions": [{"action_id": "acknowledge", "value": "cloudwatch_42", "type": "button"}],
        "message": {"text": "🚨 *CloudWatch Alarm: disk-full*\n• *Reason:* Threshold Crossed", "blocks": []}
    });
    let request = signed_callback(&form_body(&payload), chrono::Utc::now().timestamp());

    let response = app(&slack).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let requests = slack.received_requests().await.unwrap();
    let reply: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let text = reply["text"].as_str().unwrap();
    assert!(text.starts_with("✅ *Alert 'disk-full' acknowledged by jdoe*"));
}

#[tokio::test]
async fn test_stale_callback_is_unauthorized() {
    let slack = MockServer::start().await;
    let payload = json!({
        "type": "block_actions",
        "response_url": format!("{}/actions/T1/42/respond", slack.uri()),
        "actions": [{"action_id": "dismiss", "value": "grafana_1"}]
    });
    let request = signed_callback(
        &form_body(&payload),
        chrono::Utc::now().timestamp() - 600,
    );

    let response = app(&slack).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(slack.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_callback_without_actions_is_bad_request() {
    let slack = MockServer::start().await;
    let payload = json!({
        "type": "block_actions",
        "response_url": format!("{}/actions/T1/42/respond", slack.uri()),
        "actions": []
    });
    let request = signed_callback(&form_body(&payload), chrono::Utc::now().timestamp());

    let response = app(&slack).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
