use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tracing::{error, info};

use crate::domain::models::job_event::{JobEvent, JobEventType};
use crate::domain::ports::JobEventRepository;
use crate::domain::services::deadline;
use crate::error::AppError;

/// Append-only job audit trail. Write failures never reach the caller.
pub struct AuditLogger {
    repo: Arc<dyn JobEventRepository>,
    timeout: Duration,
    failures: AtomicU64,
}

impl AuditLogger {
    pub fn new(repo: Arc<dyn JobEventRepository>, timeout: Duration) -> Self {
        Self { repo, timeout, failures: AtomicU64::new(0) }
    }

    pub async fn log(&self, job_id: &str, event_type: JobEventType, description: impl Into<String>, details: Option<Value>) {
        let event = JobEvent::new(job_id, event_type, description.into(), details);
        info!(job_id, event_type = %event.event_type, "{}", event.description);

        if let Err(e) = deadline::within(self.timeout, "job_events.append", self.repo.append(&event)).await {
            self.failures.fetch_add(1, Ordering::Relaxed);
            error!(job_id, event_type = %event.event_type, error = %e, "Failed to write audit event");
        }
    }

    pub async fn get_events(&self, job_id: &str) -> Result<Vec<JobEvent>, AppError> {
        deadline::within(self.timeout, "job_events.list_by_job", self.repo.list_by_job(job_id)).await
    }

    /// Audit writes that failed since startup.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
