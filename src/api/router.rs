use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use crate::state::AppState;
use crate::api::handlers::{health, scheduler};
use tower_http::{
    trace::TraceLayer,
    classify::ServerErrorsFailureClass,
};
use tracing::{info_span, Span, error, info, warn};
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Caller-supplied request id, or a fresh v7 id when absent or unreadable.
fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::now_v7().to_string())
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "No such route" })))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/scheduler/ticks", post(scheduler::trigger_tick))
        .fallback(not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    info_span!(
                        "http_request",
                        request_id = %request_id(request.headers()),
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                })
                .on_request(())
                .on_response(|response: &axum::http::Response<Body>, latency: Duration, _span: &Span| {
                    let status = response.status();
                    if status.is_client_error() {
                        warn!(status = status.as_u16(), latency_ms = latency.as_millis(), "request rejected");
                    } else {
                        info!(status = status.as_u16(), latency_ms = latency.as_millis(), "request served");
                    }
                })
                .on_failure(|failure: ServerErrorsFailureClass, latency: Duration, _span: &Span| {
                    error!(latency_ms = latency.as_millis(), "request failed: {}", failure);
                })
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_prefers_caller_header() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, "cron-2026-06-01T04:30".parse().unwrap());
        assert_eq!(request_id(&headers), "cron-2026-06-01T04:30");
    }

    #[test]
    fn request_id_is_generated_when_missing() {
        let id = request_id(&HeaderMap::new());
        assert!(Uuid::parse_str(&id).is_ok());
    }
}
