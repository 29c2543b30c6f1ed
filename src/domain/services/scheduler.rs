use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::models::job::{Job, JobStatus};
use crate::domain::models::job_event::JobEventType;
use crate::domain::ports::JobRepository;
use crate::domain::services::audit::AuditLogger;
use crate::domain::services::deadline;
use crate::domain::services::executor::{ExecutionOutcome, ExecutionResult, JobExecutor};
use crate::error::AppError;

/// Instant at which a job's booking window opens, if it has a time of day.
pub fn due_at(job: &Job, tz: Tz) -> Option<DateTime<Utc>> {
    let time = job.execution_time?;
    let local = tz.from_local_datetime(&job.execution_date.and_time(time));
    local.earliest().or_else(|| local.latest()).map(|dt| dt.with_timezone(&Utc))
}

/// Scheduled jobs become due `window` before their execution time; past-due jobs stay due.
pub fn is_due(job: &Job, now: DateTime<Utc>, tz: Tz, window: chrono::Duration) -> bool {
    if job.status != JobStatus::Scheduled {
        return false;
    }
    if job.execution_date > now.with_timezone(&tz).date_naive() {
        return false;
    }
    if let Some(next) = job.next_execution_time
        && next > now
    {
        return false;
    }
    match (job.execution_time, due_at(job, tz)) {
        (None, _) => true,
        (Some(_), Some(due)) => due - window <= now,
        // Local time falls in a DST gap.
        (Some(_), None) => true,
    }
}

fn sort_key(job: &Job) -> NaiveDateTime {
    job.execution_date.and_time(job.execution_time.unwrap_or(NaiveTime::MIN))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Offer {
    Due,
    Retry,
    LeaseExpired,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobError {
    pub job_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TickSummary {
    pub execution_start: DateTime<Utc>,
    pub execution_end: DateTime<Utc>,
    pub duration_seconds: f64,
    pub jobs_found: usize,
    pub jobs_executed: usize,
    pub jobs_succeeded: usize,
    pub jobs_failed: usize,
    pub jobs_retried: usize,
    pub jobs_skipped: usize,
    pub audit_failures: u64,
    pub errors: Vec<JobError>,
}

impl TickSummary {
    fn start(execution_start: DateTime<Utc>, jobs_found: usize) -> Self {
        Self {
            execution_start,
            execution_end: execution_start,
            duration_seconds: 0.0,
            jobs_found,
            jobs_executed: 0,
            jobs_succeeded: 0,
            jobs_failed: 0,
            jobs_retried: 0,
            jobs_skipped: 0,
            audit_failures: 0,
            errors: Vec::new(),
        }
    }

    fn record(&mut self, result: ExecutionResult) {
        match result.outcome {
            ExecutionOutcome::Completed { .. } => {
                self.jobs_executed += 1;
                self.jobs_succeeded += 1;
            }
            ExecutionOutcome::Retrying { error } => {
                self.jobs_executed += 1;
                self.jobs_retried += 1;
                self.errors.push(JobError { job_id: result.job_id, error });
            }
            ExecutionOutcome::Failed { error } => {
                self.jobs_executed += 1;
                self.jobs_failed += 1;
                self.errors.push(JobError { job_id: result.job_id, error });
            }
            ExecutionOutcome::Skipped { .. } => self.jobs_skipped += 1,
        }
    }

    fn record_crash(&mut self, job_id: String, error: String) {
        self.jobs_executed += 1;
        self.jobs_failed += 1;
        self.errors.push(JobError { job_id, error });
    }

    fn finish(&mut self, execution_end: DateTime<Utc>, audit_failures: u64) {
        self.execution_end = execution_end;
        self.duration_seconds = (execution_end - self.execution_start).num_milliseconds() as f64 / 1000.0;
        self.audit_failures = audit_failures;
    }
}

pub struct JobScheduler {
    jobs: Arc<dyn JobRepository>,
    audit: Arc<AuditLogger>,
    executor: Arc<JobExecutor>,
    config: EngineConfig,
}

impl JobScheduler {
    pub fn new(jobs: Arc<dyn JobRepository>, audit: Arc<AuditLogger>, executor: Arc<JobExecutor>, config: EngineConfig) -> Self {
        Self { jobs, audit, executor, config }
    }

    /// Due scheduled jobs, retryable failures and lease-expired claims, earliest first,
    /// each at most once and capped at the scan limit.
    pub async fn scan_due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<Job>, AppError> {
        let tz = self.config.timezone;
        let today = now.with_timezone(&tz).date_naive();
        let timeout = self.config.store_timeout;

        let mut candidates: Vec<(Job, Offer)> = Vec::new();
        for status in [JobStatus::Scheduled, JobStatus::Failed, JobStatus::InProgress] {
            let jobs = deadline::within(timeout, "jobs.find_by_status", self.jobs.find_by_status(status, today)).await?;
            for job in jobs {
                let offer = match job.status {
                    JobStatus::Scheduled if is_due(&job, now, tz, self.config.execution_window) => Offer::Due,
                    JobStatus::Failed
                        if job.attempts_remaining() && job.failure_kind.is_none_or(|k| k.is_retryable()) =>
                    {
                        Offer::Retry
                    }
                    JobStatus::InProgress if job.lease_expires_at.is_none_or(|expires| expires <= now) => {
                        Offer::LeaseExpired
                    }
                    _ => continue,
                };
                candidates.push((job, offer));
            }
        }

        let mut seen = HashSet::new();
        candidates.retain(|(job, _)| seen.insert(job.job_id.clone()));
        candidates.sort_by_key(|(job, _)| sort_key(job));
        candidates.truncate(self.config.scan_limit);

        let mut due = Vec::with_capacity(candidates.len());
        for (job, offer) in candidates {
            match offer {
                Offer::Due => {}
                Offer::Retry => {
                    self.audit
                        .log(
                            &job.job_id,
                            JobEventType::JobRetryOffered,
                            format!(
                                "Failed job re-offered for attempt {} of {}",
                                job.execution_attempts + 1,
                                job.max_attempts
                            ),
                            Some(json!({ "previous_failure": job.failure_reason, "failure_kind": job.failure_kind })),
                        )
                        .await;
                }
                Offer::LeaseExpired => {
                    self.audit
                        .log(
                            &job.job_id,
                            JobEventType::JobLeaseExpired,
                            "In-progress job lease expired; re-offering for recovery",
                            Some(json!({
                                "lease_expires_at": job.lease_expires_at,
                                "attempts": job.execution_attempts,
                            })),
                        )
                        .await;
                }
            }
            due.push(job);
        }
        Ok(due)
    }

    /// One scheduler pass: scan, execute with bounded concurrency, summarise.
    pub async fn run_tick(&self) -> Result<TickSummary, AppError> {
        let tick_id = Uuid::now_v7();
        let span = info_span!("scheduler_tick", tick_id = %tick_id);

        async move {
            let started = Utc::now();
            let audit_failures_before = self.audit.failure_count();

            let jobs = self.scan_due_jobs(started).await?;
            info!(jobs_found = jobs.len(), "Scan complete");
            let mut summary = TickSummary::start(started, jobs.len());

            let permits = Arc::new(Semaphore::new(self.config.max_concurrent_jobs.max(1)));
            let mut running = JoinSet::new();

            for job in jobs {
                let permit = permits.clone().acquire_owned().await.map_err(|_| AppError::Internal)?;
                let executor = self.executor.clone();
                let job_id = job.job_id.clone();
                running.spawn(
                    async move {
                        let _permit = permit;
                        let attempt = tokio::spawn(async move { executor.execute(job).await });
                        (job_id, attempt.await)
                    }
                    .in_current_span(),
                );
            }

            while let Some(joined) = running.join_next().await {
                match joined {
                    Ok((_, Ok(result))) => summary.record(result),
                    Ok((job_id, Err(crash))) => {
                        error!(job_id = %job_id, error = %crash, "Job execution crashed");
                        summary.record_crash(job_id, format!("execution crashed: {}", crash));
                    }
                    Err(e) => error!(error = %e, "Worker task failed"),
                }
            }

            summary.finish(Utc::now(), self.audit.failure_count().saturating_sub(audit_failures_before));
            info!(
                jobs_found = summary.jobs_found,
                jobs_executed = summary.jobs_executed,
                jobs_succeeded = summary.jobs_succeeded,
                jobs_failed = summary.jobs_failed,
                jobs_retried = summary.jobs_retried,
                jobs_skipped = summary.jobs_skipped,
                audit_failures = summary.audit_failures,
                duration_seconds = summary.duration_seconds,
                "Scheduler tick finished"
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }
}
