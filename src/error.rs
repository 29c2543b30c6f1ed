use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::domain::models::job::{FailureKind, JobStatus};
use crate::domain::models::payment::PaymentFailureCode;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    #[error("Internal server error")]
    Internal,
    #[error("Internal server error: {0}")]
    InternalWithMsg(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Database(e) => {
                error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Timeout(msg) => {
                error!("Store timeout: {}", msg);
                (StatusCode::GATEWAY_TIMEOUT, "Store timed out".to_string())
            }
            AppError::Corrupt(msg) => {
                error!("Corrupt record: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
            }
            AppError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string()),
            AppError::InternalWithMsg(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Rejected lifecycle transitions. The stored job is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot move job from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
    #[error("attempts exhausted ({attempts}/{max_attempts})")]
    AttemptsExhausted { attempts: i32, max_attempts: i32 },
    #[error("completion requires a booking id and a pnr")]
    MissingBookingReference,
    #[error("failure requires a reason")]
    MissingFailureReason,
    #[error("last failure ({0}) is not retryable")]
    NotRetryable(FailureKind),
    #[error("job is leased until {0}")]
    LeaseActive(chrono::DateTime<chrono::Utc>),
    #[error("job {0} was modified concurrently")]
    VersionConflict(String),
}

/// Step-level failures inside one job execution.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NoInventory(String),
    #[error("Payment failed ({code}): {message}")]
    Payment { code: PaymentFailureCode, message: String },
    #[error(transparent)]
    Infrastructure(#[from] AppError),
    #[error("job ownership lost: {0}")]
    Lost(#[from] TransitionError),
}

impl ExecutionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ExecutionError::Validation(_) => FailureKind::Validation,
            ExecutionError::NoInventory(_) => FailureKind::NoInventory,
            ExecutionError::Payment { .. } => FailureKind::Payment,
            ExecutionError::Infrastructure(_) | ExecutionError::Lost(_) => FailureKind::Transient,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}
