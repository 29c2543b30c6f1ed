use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobEventType {
    ExecutionStarted,
    JobDetails,
    ValidationFailed,
    TrainSelected,
    TrainSearch,
    TrainSearchSuccess,
    TrainSearchDetails,
    AlternateDateSearch,
    TrainSearchFailed,
    FareCalculation,
    BookingCreated,
    BookingRecovered,
    DuplicateBookingSuspected,
    PaymentCreated,
    WalletDebited,
    WalletDebitReversed,
    PaymentSucceeded,
    PaymentFailed,
    PaymentReconciliationRequired,
    ExecutionCompleted,
    ExecutionRetry,
    ExecutionFailed,
    JobRetryOffered,
    JobLeaseExpired,
    JobRequeued,
}

impl JobEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobEventType::ExecutionStarted => "EXECUTION_STARTED",
            JobEventType::JobDetails => "JOB_DETAILS",
            JobEventType::ValidationFailed => "VALIDATION_FAILED",
            JobEventType::TrainSelected => "TRAIN_SELECTED",
            JobEventType::TrainSearch => "TRAIN_SEARCH",
            JobEventType::TrainSearchSuccess => "TRAIN_SEARCH_SUCCESS",
            JobEventType::TrainSearchDetails => "TRAIN_SEARCH_DETAILS",
            JobEventType::AlternateDateSearch => "ALTERNATE_DATE_SEARCH",
            JobEventType::TrainSearchFailed => "TRAIN_SEARCH_FAILED",
            JobEventType::FareCalculation => "FARE_CALCULATION",
            JobEventType::BookingCreated => "BOOKING_CREATED",
            JobEventType::BookingRecovered => "BOOKING_RECOVERED",
            JobEventType::DuplicateBookingSuspected => "DUPLICATE_BOOKING_SUSPECTED",
            JobEventType::PaymentCreated => "PAYMENT_CREATED",
            JobEventType::WalletDebited => "WALLET_DEBITED",
            JobEventType::WalletDebitReversed => "WALLET_DEBIT_REVERSED",
            JobEventType::PaymentSucceeded => "PAYMENT_SUCCEEDED",
            JobEventType::PaymentFailed => "PAYMENT_FAILED",
            JobEventType::PaymentReconciliationRequired => "PAYMENT_RECONCILIATION_REQUIRED",
            JobEventType::ExecutionCompleted => "EXECUTION_COMPLETED",
            JobEventType::ExecutionRetry => "EXECUTION_RETRY",
            JobEventType::ExecutionFailed => "EXECUTION_FAILED",
            JobEventType::JobRetryOffered => "JOB_RETRY_OFFERED",
            JobEventType::JobLeaseExpired => "JOB_LEASE_EXPIRED",
            JobEventType::JobRequeued => "JOB_REQUEUED",
        }
    }
}

impl fmt::Display for JobEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit record.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JobEvent {
    pub event_id: String,
    pub job_id: String,
    pub event_type: JobEventType,
    pub description: String,
    pub details: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(job_id: &str, event_type: JobEventType, description: String, details: Option<Value>) -> Self {
        Self {
            event_id: Uuid::now_v7().to_string(),
            job_id: job_id.to_string(),
            event_type,
            description,
            details,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_serde_name() {
        let t = JobEventType::PaymentReconciliationRequired;
        assert_eq!(serde_json::to_string(&t).unwrap(), format!("\"{}\"", t));
    }

    #[test]
    fn serde_uses_screaming_snake_names() {
        let json = serde_json::to_string(&JobEventType::DuplicateBookingSuspected).unwrap();
        assert_eq!(json, "\"DUPLICATE_BOOKING_SUSPECTED\"");
    }
}
