use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ExecutionStatus {
    Started,
    Success,
    Failed,
    RetryScheduled,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExecutionStatus::Started => "started",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::RetryScheduled => "retry_scheduled",
        })
    }
}

/// Execution history milestone for one attempt.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JobExecution {
    pub execution_id: String,
    pub job_id: String,
    pub attempt_number: i32,
    pub execution_status: ExecutionStatus,
    pub booking_id: Option<String>,
    pub payment_id: Option<String>,
    pub pnr: Option<String>,
    pub error_message: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl JobExecution {
    pub fn milestone(job_id: &str, attempt_number: i32, execution_status: ExecutionStatus) -> Self {
        Self {
            execution_id: Uuid::now_v7().to_string(),
            job_id: job_id.to_string(),
            attempt_number,
            execution_status,
            booking_id: None,
            payment_id: None,
            pnr: None,
            error_message: None,
            recorded_at: Utc::now(),
        }
    }
}
