use crate::domain::{
    models::job_event::{JobEvent, JobEventType},
    ports::JobEventRepository,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};

pub struct SqliteJobEventRepo {
    pool: SqlitePool,
}

impl SqliteJobEventRepo {
    pub fn new(pool: SqlitePool) -> Self { Self { pool } }
}

#[derive(FromRow)]
struct JobEventRow {
    event_id: String,
    job_id: String,
    event_type: JobEventType,
    description: String,
    details: Option<Json<Value>>,
    timestamp: DateTime<Utc>,
}

impl From<JobEventRow> for JobEvent {
    fn from(row: JobEventRow) -> Self {
        JobEvent {
            event_id: row.event_id,
            job_id: row.job_id,
            event_type: row.event_type,
            description: row.description,
            details: row.details.map(|d| d.0),
            timestamp: row.timestamp,
        }
    }
}

#[async_trait]
impl JobEventRepository for SqliteJobEventRepo {
    async fn append(&self, event: &JobEvent) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO job_events (event_id, job_id, event_type, description, details, timestamp) VALUES (?, ?, ?, ?, ?, ?)"
        )
            .bind(&event.event_id).bind(&event.job_id).bind(event.event_type)
            .bind(&event.description).bind(event.details.as_ref().map(Json)).bind(event.timestamp)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    async fn list_by_job(&self, job_id: &str) -> Result<Vec<JobEvent>, AppError> {
        let mut events: Vec<JobEvent> = sqlx::query_as::<_, JobEventRow>(
            "SELECT * FROM job_events WHERE job_id = ? ORDER BY timestamp ASC, event_id ASC"
        )
            .bind(job_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?
            .into_iter()
            .map(JobEvent::from)
            .collect();
        // TEXT timestamps with varying fractional digits do not always sort lexically.
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.event_id.cmp(&b.event_id)));
        Ok(events)
    }
}
