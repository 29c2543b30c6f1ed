use axum::{extract::State, response::IntoResponse, Json};
use crate::state::AppState;
use crate::error::AppError;
use std::sync::Arc;
use tracing::{error, info};

/// Runs one scheduler tick synchronously. Per-job failures are reported in the
/// summary; only a failed scan of the job store is an error response.
pub async fn trigger_tick(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let summary = state.scheduler.run_tick().await.map_err(|e| {
        error!("Triggered tick could not scan the job store: {:?}", e);
        AppError::InternalWithMsg(format!("scheduler tick failed: {}", e))
    })?;
    info!(
        "Triggered tick finished: {} found, {} succeeded",
        summary.jobs_found, summary.jobs_succeeded
    );
    Ok(Json(summary))
}
