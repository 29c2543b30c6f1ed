use axum::{response::IntoResponse, Json};
use serde_json::json;

/// Liveness only; store reachability shows up in tick results instead.
pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": env!("CARGO_PKG_NAME") }))
}
