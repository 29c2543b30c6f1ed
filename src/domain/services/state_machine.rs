use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;

use crate::domain::models::job::{FailureKind, Job, JobStatus};
use crate::domain::models::job_event::JobEventType;
use crate::domain::ports::JobRepository;
use crate::domain::services::audit::AuditLogger;
use crate::domain::services::deadline;
use crate::error::{ExecutionError, TransitionError};

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Scheduled, or InProgress with an expired lease, to InProgress.
    Claim { lease_ttl: chrono::Duration },
    Complete {
        booking_id: String,
        pnr: String,
        payment_id: Option<String>,
        journey_date: NaiveDate,
    },
    Fail { reason: String, kind: FailureKind },
    /// InProgress back to Scheduled behind a backoff gate.
    Retry {
        reason: String,
        kind: FailureKind,
        next_execution_time: DateTime<Utc>,
    },
    /// Failed back to Scheduled.
    Requeue,
}

impl Transition {
    pub fn target(&self) -> JobStatus {
        match self {
            Transition::Claim { .. } => JobStatus::InProgress,
            Transition::Complete { .. } => JobStatus::Completed,
            Transition::Fail { .. } => JobStatus::Failed,
            Transition::Retry { .. } | Transition::Requeue => JobStatus::Scheduled,
        }
    }

    pub fn event_type(&self) -> JobEventType {
        match self {
            Transition::Claim { .. } => JobEventType::ExecutionStarted,
            Transition::Complete { .. } => JobEventType::ExecutionCompleted,
            Transition::Fail { .. } => JobEventType::ExecutionFailed,
            Transition::Retry { .. } => JobEventType::ExecutionRetry,
            Transition::Requeue => JobEventType::JobRequeued,
        }
    }
}

/// Computes the job that results from `transition`. Pure; nothing is persisted.
pub fn apply(job: &Job, transition: &Transition, now: DateTime<Utc>) -> Result<Job, TransitionError> {
    let invalid = || TransitionError::InvalidTransition { from: job.status, to: transition.target() };
    let exhausted = || TransitionError::AttemptsExhausted {
        attempts: job.execution_attempts,
        max_attempts: job.max_attempts,
    };

    let mut next = job.clone();
    next.updated_at = now;

    match transition {
        Transition::Claim { lease_ttl } => {
            match job.status {
                JobStatus::Scheduled => {}
                JobStatus::InProgress => {
                    if let Some(expires) = job.lease_expires_at
                        && expires > now
                    {
                        return Err(TransitionError::LeaseActive(expires));
                    }
                }
                JobStatus::Completed | JobStatus::Failed => return Err(invalid()),
            }
            if !job.attempts_remaining() {
                return Err(exhausted());
            }
            next.status = JobStatus::InProgress;
            next.execution_attempts += 1;
            next.last_execution_time = Some(now);
            next.lease_expires_at = Some(now + *lease_ttl);
            next.next_execution_time = None;
        }
        Transition::Complete { booking_id, pnr, payment_id, journey_date } => {
            if job.status != JobStatus::InProgress {
                return Err(invalid());
            }
            if booking_id.trim().is_empty() || pnr.trim().is_empty() {
                return Err(TransitionError::MissingBookingReference);
            }
            next.status = JobStatus::Completed;
            next.booking_id = Some(booking_id.clone());
            next.pnr = Some(pnr.clone());
            next.payment_id = payment_id.clone();
            next.journey_date = *journey_date;
            next.completed_at = Some(now);
            next.lease_expires_at = None;
            next.failure_reason = None;
            next.failure_kind = None;
        }
        Transition::Fail { reason, kind } => {
            if !matches!(job.status, JobStatus::Scheduled | JobStatus::InProgress) {
                return Err(invalid());
            }
            if reason.trim().is_empty() {
                return Err(TransitionError::MissingFailureReason);
            }
            next.status = JobStatus::Failed;
            next.failure_reason = Some(reason.clone());
            next.failure_kind = Some(*kind);
            next.failure_time = Some(now);
            next.lease_expires_at = None;
        }
        Transition::Retry { reason, kind, next_execution_time } => {
            if job.status != JobStatus::InProgress {
                return Err(invalid());
            }
            if reason.trim().is_empty() {
                return Err(TransitionError::MissingFailureReason);
            }
            if !job.attempts_remaining() {
                return Err(exhausted());
            }
            next.status = JobStatus::Scheduled;
            next.failure_reason = Some(reason.clone());
            next.failure_kind = Some(*kind);
            next.next_execution_time = Some(*next_execution_time);
            next.lease_expires_at = None;
        }
        Transition::Requeue => {
            if job.status != JobStatus::Failed {
                return Err(invalid());
            }
            if let Some(kind) = job.failure_kind
                && !kind.is_retryable()
            {
                return Err(TransitionError::NotRetryable(kind));
            }
            if !job.attempts_remaining() {
                return Err(exhausted());
            }
            next.status = JobStatus::Scheduled;
            next.next_execution_time = None;
        }
    }

    Ok(next)
}

/// Persists transitions with a version check and records one audit event per transition.
pub struct JobLifecycle {
    jobs: Arc<dyn JobRepository>,
    audit: Arc<AuditLogger>,
    timeout: Duration,
}

impl JobLifecycle {
    pub fn new(jobs: Arc<dyn JobRepository>, audit: Arc<AuditLogger>, timeout: Duration) -> Self {
        Self { jobs, audit, timeout }
    }

    pub async fn transition(&self, job: &Job, transition: Transition) -> Result<Job, ExecutionError> {
        let next = apply(job, &transition, Utc::now())?;

        let saved = deadline::within(self.timeout, "jobs.save_if_version", self.jobs.save_if_version(&next, job.version))
            .await?
            .ok_or_else(|| TransitionError::VersionConflict(job.job_id.clone()))?;

        let (description, details) = describe(job, &saved, &transition);
        self.audit.log(&saved.job_id, transition.event_type(), description, Some(details)).await;
        Ok(saved)
    }
}

fn describe(before: &Job, after: &Job, transition: &Transition) -> (String, serde_json::Value) {
    match transition {
        Transition::Claim { .. } => (
            format!("Execution attempt {} of {} started", after.execution_attempts, after.max_attempts),
            json!({
                "attempt": after.execution_attempts,
                "max_attempts": after.max_attempts,
                "previous_status": before.status,
                "lease_expires_at": after.lease_expires_at,
            }),
        ),
        Transition::Complete { booking_id, pnr, payment_id, journey_date } => (
            format!("Job completed with booking {} (PNR {})", booking_id, pnr),
            json!({
                "booking_id": booking_id,
                "pnr": pnr,
                "payment_id": payment_id,
                "journey_date": journey_date,
                "attempt": after.execution_attempts,
            }),
        ),
        Transition::Fail { reason, kind } => (
            format!("Job failed after {} attempt(s): {}", after.execution_attempts, reason),
            json!({
                "attempts": after.execution_attempts,
                "max_attempts": after.max_attempts,
                "failure_kind": kind,
                "reason": reason,
            }),
        ),
        Transition::Retry { reason, kind, next_execution_time } => (
            format!(
                "Attempt {} of {} failed, retry scheduled at {}: {}",
                after.execution_attempts, after.max_attempts, next_execution_time, reason
            ),
            json!({
                "attempt": after.execution_attempts,
                "max_attempts": after.max_attempts,
                "failure_kind": kind,
                "next_execution_time": next_execution_time,
                "reason": reason,
            }),
        ),
        Transition::Requeue => (
            format!(
                "Job requeued after failure ({} of {} attempts used)",
                after.execution_attempts, after.max_attempts
            ),
            json!({
                "attempts": after.execution_attempts,
                "previous_failure": before.failure_reason,
            }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::job::{BookingContact, JobType, NewJobParams, PassengerInfo};
    use crate::domain::models::payment::PaymentMethod;

    fn job() -> Job {
        let journey = NaiveDate::from_ymd_opt(2026, 5, 10).unwrap();
        Job::new(NewJobParams {
            user_id: "user-1".into(),
            job_type: JobType::Tatkal,
            origin_station_code: "NDLS".into(),
            destination_station_code: "HWH".into(),
            journey_date: journey,
            booking_time: None,
            travel_class: "3A".into(),
            passengers: vec![PassengerInfo {
                name: "Asha".into(),
                age: 30,
                gender: "F".into(),
                berth_preference: None,
                is_senior: false,
                id_type: None,
                id_number: None,
            }],
            booking_contact: BookingContact { email: "asha@example.com".into(), phone: "9000000000".into() },
            payment_method: PaymentMethod::Wallet,
            auto_book_alternate_date: false,
            train_details: None,
            requested_on: journey,
        })
    }

    fn claim() -> Transition {
        Transition::Claim { lease_ttl: chrono::Duration::minutes(15) }
    }

    #[test]
    fn claim_increments_attempts_and_sets_lease() {
        let now = Utc::now();
        let claimed = apply(&job(), &claim(), now).unwrap();
        assert_eq!(claimed.status, JobStatus::InProgress);
        assert_eq!(claimed.execution_attempts, 1);
        assert_eq!(claimed.last_execution_time, Some(now));
        assert_eq!(claimed.lease_expires_at, Some(now + chrono::Duration::minutes(15)));
    }

    #[test]
    fn active_lease_blocks_second_claim() {
        let now = Utc::now();
        let claimed = apply(&job(), &claim(), now).unwrap();
        let err = apply(&claimed, &claim(), now + chrono::Duration::minutes(1)).unwrap_err();
        assert!(matches!(err, TransitionError::LeaseActive(_)));

        let reclaimed = apply(&claimed, &claim(), now + chrono::Duration::minutes(16)).unwrap();
        assert_eq!(reclaimed.execution_attempts, 2);
    }

    #[test]
    fn completion_requires_booking_reference() {
        let claimed = apply(&job(), &claim(), Utc::now()).unwrap();
        let err = apply(
            &claimed,
            &Transition::Complete {
                booking_id: "b-1".into(),
                pnr: " ".into(),
                payment_id: None,
                journey_date: claimed.journey_date,
            },
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, TransitionError::MissingBookingReference);
    }

    #[test]
    fn completed_jobs_are_immutable() {
        let claimed = apply(&job(), &claim(), Utc::now()).unwrap();
        let done = apply(
            &claimed,
            &Transition::Complete {
                booking_id: "b-1".into(),
                pnr: "PNR0123456789".into(),
                payment_id: Some("p-1".into()),
                journey_date: claimed.journey_date,
            },
            Utc::now(),
        )
        .unwrap();
        assert!(done.completed_at.is_some());

        for t in [
            claim(),
            Transition::Fail { reason: "late".into(), kind: FailureKind::Transient },
            Transition::Requeue,
        ] {
            assert!(matches!(apply(&done, &t, Utc::now()), Err(TransitionError::InvalidTransition { .. })));
        }
    }

    #[test]
    fn retry_is_refused_on_the_last_attempt() {
        let mut j = job();
        j.execution_attempts = j.max_attempts - 1;
        let claimed = apply(&j, &claim(), Utc::now()).unwrap();
        let err = apply(
            &claimed,
            &Transition::Retry {
                reason: "store timeout".into(),
                kind: FailureKind::Transient,
                next_execution_time: Utc::now(),
            },
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, TransitionError::AttemptsExhausted { attempts: 3, max_attempts: 3 });
    }

    #[test]
    fn failure_requires_reason() {
        let claimed = apply(&job(), &claim(), Utc::now()).unwrap();
        let err = apply(&claimed, &Transition::Fail { reason: String::new(), kind: FailureKind::Transient }, Utc::now())
            .unwrap_err();
        assert_eq!(err, TransitionError::MissingFailureReason);
    }

    #[test]
    fn requeue_respects_failure_kind_and_attempts() {
        let claimed = apply(&job(), &claim(), Utc::now()).unwrap();
        let failed = apply(
            &claimed,
            &Transition::Fail { reason: "sold out".into(), kind: FailureKind::NoInventory },
            Utc::now(),
        )
        .unwrap();
        let requeued = apply(&failed, &Transition::Requeue, Utc::now()).unwrap();
        assert_eq!(requeued.status, JobStatus::Scheduled);
        assert_eq!(requeued.execution_attempts, 1);

        let invalid = apply(
            &claimed,
            &Transition::Fail { reason: "no passengers".into(), kind: FailureKind::Validation },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(
            apply(&invalid, &Transition::Requeue, Utc::now()).unwrap_err(),
            TransitionError::NotRetryable(FailureKind::Validation)
        );
    }

    #[test]
    fn failed_jobs_must_be_requeued_before_claim() {
        let claimed = apply(&job(), &claim(), Utc::now()).unwrap();
        let failed = apply(
            &claimed,
            &Transition::Fail { reason: "sold out".into(), kind: FailureKind::NoInventory },
            Utc::now(),
        )
        .unwrap();
        assert!(matches!(apply(&failed, &claim(), Utc::now()), Err(TransitionError::InvalidTransition { .. })));
    }
}
