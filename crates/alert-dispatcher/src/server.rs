//! HTTP server for Slack interactive callbacks and direct Grafana webhooks.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::DispatchError;
use crate::interactive::InteractionProcessor;
use crate::pipeline::Dispatcher;
use crate::signature::CallbackHeaders;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Alert pipeline for webhook bodies.
    pub dispatcher: Dispatcher,
    /// Interactive callback handler.
    pub interactions: InteractionProcessor,
}

/// Build the HTTP router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/slack/events", post(slack_events_handler))
        .route("/grafana/webhook", post(grafana_webhook_handler))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP status for a pipeline error.
#[must_use]
pub fn status_for(error: &DispatchError) -> StatusCode {
    if error.is_unauthorized() {
        StatusCode::UNAUTHORIZED
    } else if error.is_bad_input() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Health check endpoint.
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Readiness check endpoint.
async fn readiness_check() -> Json<Value> {
    Json(json!({ "status": "ready" }))
}

/// Handle acknowledge/dismiss button presses.
async fn slack_events_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, StatusCode> {
    let callback_headers = CallbackHeaders::from_header_map(|name| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    });
    let now = chrono::Utc::now().timestamp();

    match state.interactions.handle(&callback_headers, &body, now).await {
        Ok(outcome) => {
            info!(state = ?outcome.state, "Interactive callback handled");
            Ok(Json(json!({ "status": "ok" })))
        }
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                error!(error = %e, "Interactive callback failed");
            } else {
                warn!(error = %e, status = %status, "Interactive callback rejected");
            }
            Err(status)
        }
    }
}

/// Handle a Grafana (legacy or unified alerting) webhook delivered directly.
async fn grafana_webhook_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, StatusCode> {
    match state.dispatcher.dispatch_bytes(&body).await {
        Ok(prepared) => Ok(Json(json!({
            "status": "processed",
            "channel": prepared.route.channel,
            "priority": prepared.priority,
            "matched_by": prepared.route.matched_by,
        }))),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                error!(error = %e, "Failed to deliver webhook alert");
            } else {
                warn!(error = %e, "Rejected webhook body");
            }
            Err(status)
        }
    }
}
