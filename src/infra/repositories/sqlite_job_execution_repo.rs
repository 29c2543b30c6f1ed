use crate::domain::{
    models::job_execution::{ExecutionStatus, JobExecution},
    ports::JobExecutionRepository,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

pub struct SqliteJobExecutionRepo {
    pool: SqlitePool,
}

impl SqliteJobExecutionRepo {
    pub fn new(pool: SqlitePool) -> Self { Self { pool } }
}

#[derive(FromRow)]
struct JobExecutionRow {
    execution_id: String,
    job_id: String,
    attempt_number: i32,
    execution_status: ExecutionStatus,
    booking_id: Option<String>,
    payment_id: Option<String>,
    pnr: Option<String>,
    error_message: Option<String>,
    recorded_at: DateTime<Utc>,
}

impl From<JobExecutionRow> for JobExecution {
    fn from(row: JobExecutionRow) -> Self {
        JobExecution {
            execution_id: row.execution_id,
            job_id: row.job_id,
            attempt_number: row.attempt_number,
            execution_status: row.execution_status,
            booking_id: row.booking_id,
            payment_id: row.payment_id,
            pnr: row.pnr,
            error_message: row.error_message,
            recorded_at: row.recorded_at,
        }
    }
}

#[async_trait]
impl JobExecutionRepository for SqliteJobExecutionRepo {
    async fn record(&self, execution: &JobExecution) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO job_executions (execution_id, job_id, attempt_number, execution_status, booking_id, payment_id, pnr, error_message, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
            .bind(&execution.execution_id).bind(&execution.job_id).bind(execution.attempt_number)
            .bind(execution.execution_status).bind(&execution.booking_id).bind(&execution.payment_id)
            .bind(&execution.pnr).bind(&execution.error_message).bind(execution.recorded_at)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    async fn list_by_job(&self, job_id: &str) -> Result<Vec<JobExecution>, AppError> {
        let rows = sqlx::query_as::<_, JobExecutionRow>(
            "SELECT * FROM job_executions WHERE job_id = ? ORDER BY attempt_number ASC, recorded_at ASC, execution_id ASC"
        )
            .bind(job_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(rows.into_iter().map(JobExecution::from).collect())
    }
}
