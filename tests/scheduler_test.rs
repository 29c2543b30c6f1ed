mod common;

use chrono::{Duration, NaiveTime, Utc};
use common::*;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use tatkal_engine::domain::models::{
    job::{FailureKind, JobStatus},
    job_event::JobEventType,
    payment::PaymentMethod,
};

#[tokio::test]
async fn test_scan_selects_due_retryable_and_stale_jobs_once() {
    let app = TestApp::new().await;
    let now = Utc::now();

    let due = app.insert_job(&due_job("u-due", days_from_today(1), PaymentMethod::Upi)).await;

    let mut future = due_job("u-future", days_from_today(5), PaymentMethod::Upi);
    future.execution_date = days_from_today(3);
    let future = app.insert_job(&future).await;

    let mut backing_off = due_job("u-backoff", days_from_today(1), PaymentMethod::Upi);
    backing_off.execution_attempts = 1;
    backing_off.next_execution_time = Some(now + Duration::minutes(10));
    let backing_off = app.insert_job(&backing_off).await;

    let mut retryable = due_job("u-retry", days_from_today(1), PaymentMethod::Upi);
    retryable.status = JobStatus::Failed;
    retryable.execution_attempts = 1;
    retryable.failure_reason = Some("No trains found".to_string());
    retryable.failure_kind = Some(FailureKind::NoInventory);
    let retryable = app.insert_job(&retryable).await;

    let mut exhausted = due_job("u-exhausted", days_from_today(1), PaymentMethod::Upi);
    exhausted.status = JobStatus::Failed;
    exhausted.execution_attempts = exhausted.max_attempts;
    exhausted.failure_reason = Some("Payment failed".to_string());
    exhausted.failure_kind = Some(FailureKind::Payment);
    let exhausted = app.insert_job(&exhausted).await;

    let mut stale = due_job("u-stale", days_from_today(1), PaymentMethod::Upi);
    stale.status = JobStatus::InProgress;
    stale.execution_attempts = 1;
    stale.lease_expires_at = Some(now - Duration::minutes(1));
    let stale = app.insert_job(&stale).await;

    let mut leased = due_job("u-leased", days_from_today(1), PaymentMethod::Upi);
    leased.status = JobStatus::InProgress;
    leased.execution_attempts = 1;
    leased.lease_expires_at = Some(now + Duration::minutes(10));
    let leased = app.insert_job(&leased).await;

    let offered = app.state.scheduler.scan_due_jobs(now).await.unwrap();
    let ids: Vec<&str> = offered.iter().map(|j| j.job_id.as_str()).collect();
    let unique: HashSet<&str> = ids.iter().copied().collect();
    assert_eq!(ids.len(), unique.len());

    assert!(unique.contains(due.job_id.as_str()));
    assert!(unique.contains(retryable.job_id.as_str()));
    assert!(unique.contains(stale.job_id.as_str()));
    assert!(!unique.contains(future.job_id.as_str()));
    assert!(!unique.contains(backing_off.job_id.as_str()));
    assert!(!unique.contains(exhausted.job_id.as_str()));
    assert!(!unique.contains(leased.job_id.as_str()));
    assert_eq!(ids.len(), 3);

    assert!(app.event_types(&retryable.job_id).await.contains(&JobEventType::JobRetryOffered));
    assert!(app.event_types(&stale.job_id).await.contains(&JobEventType::JobLeaseExpired));
    assert!(app.event_types(&due.job_id).await.is_empty());
}

#[tokio::test]
async fn test_scan_orders_earliest_first_and_respects_limit() {
    let app = TestApp::with_engine(tatkal_engine::config::EngineConfig {
        scan_limit: 2,
        ..Default::default()
    })
    .await;
    let now = Utc::now();

    let mut ids = Vec::new();
    for days_ago in [1u64, 3, 2] {
        let mut job = due_job("u-order", days_from_today(1), PaymentMethod::Upi);
        job.execution_date = today() - chrono::Days::new(days_ago);
        job.execution_time = NaiveTime::from_hms_opt(10, 0, 0);
        ids.push((days_ago, app.insert_job(&job).await.job_id));
    }

    let offered = app.state.scheduler.scan_due_jobs(now).await.unwrap();
    assert_eq!(offered.len(), 2);
    let expected_first = ids.iter().find(|(d, _)| *d == 3).unwrap().1.clone();
    let expected_second = ids.iter().find(|(d, _)| *d == 2).unwrap().1.clone();
    assert_eq!(offered[0].job_id, expected_first);
    assert_eq!(offered[1].job_id, expected_second);
}

#[tokio::test]
async fn test_tick_summarises_outcomes() {
    let app = TestApp::new().await;
    app.insert_train(&rajdhani("12302", &ALL_DAYS, dec!(600))).await;
    app.insert_wallet("rich", dec!(10000)).await;
    app.insert_wallet("poor", dec!(100)).await;

    let ok = app.insert_job(&due_job("rich", days_from_today(1), PaymentMethod::Wallet)).await;
    let short = app.insert_job(&due_job("poor", days_from_today(1), PaymentMethod::Wallet)).await;
    let mut invalid = due_job("rich", days_from_today(1), PaymentMethod::Upi);
    invalid.travel_class = String::new();
    let invalid = app.insert_job(&invalid).await;

    let summary = app.state.scheduler.run_tick().await.unwrap();
    assert_eq!(summary.jobs_found, 3);
    assert_eq!(summary.jobs_executed, 3);
    assert_eq!(summary.jobs_succeeded, 1);
    assert_eq!(summary.jobs_retried, 1);
    assert_eq!(summary.jobs_failed, 1);
    assert_eq!(summary.jobs_skipped, 0);
    assert_eq!(summary.errors.len(), 2);
    assert!(summary.execution_end >= summary.execution_start);

    assert_eq!(app.reload_job(&ok.job_id).await.status, JobStatus::Completed);
    assert_eq!(app.reload_job(&short.job_id).await.status, JobStatus::Scheduled);
    assert_eq!(app.reload_job(&invalid.job_id).await.status, JobStatus::Failed);

    // The short-funded job now waits out its backoff; nothing is due.
    let again = app.state.scheduler.run_tick().await.unwrap();
    assert_eq!(again.jobs_found, 0);
}

#[tokio::test]
async fn test_stale_job_without_attempts_left_is_failed() {
    let app = TestApp::new().await;
    let mut stale = due_job("u-crashed", days_from_today(1), PaymentMethod::Upi);
    stale.status = JobStatus::InProgress;
    stale.execution_attempts = stale.max_attempts;
    stale.lease_expires_at = Some(Utc::now() - Duration::minutes(5));
    let stale = app.insert_job(&stale).await;

    let summary = app.state.scheduler.run_tick().await.unwrap();
    assert_eq!(summary.jobs_found, 1);
    assert_eq!(summary.jobs_failed, 1);

    let job = app.reload_job(&stale.job_id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.execution_attempts, job.max_attempts);
    assert!(job.failure_reason.unwrap().starts_with("Attempts exhausted"));

    let next = app.state.scheduler.scan_due_jobs(Utc::now()).await.unwrap();
    assert!(next.is_empty());
}

#[tokio::test]
async fn test_retried_failed_job_completes_on_next_pass() {
    let app = TestApp::new().await;
    app.insert_train(&rajdhani("12302", &ALL_DAYS, dec!(600))).await;

    let mut failed = due_job("u-second-chance", days_from_today(1), PaymentMethod::Upi);
    failed.status = JobStatus::Failed;
    failed.execution_attempts = 1;
    failed.failure_reason = Some("Timed out: trains.find_by_station exceeded 5000ms".to_string());
    failed.failure_kind = Some(FailureKind::Transient);
    let failed = app.insert_job(&failed).await;

    let summary = app.state.scheduler.run_tick().await.unwrap();
    assert_eq!(summary.jobs_succeeded, 1);

    let job = app.reload_job(&failed.job_id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.execution_attempts, 2);

    let events = app.event_types(&job.job_id).await;
    let offered = events.iter().position(|t| *t == JobEventType::JobRetryOffered).unwrap();
    let requeued = events.iter().position(|t| *t == JobEventType::JobRequeued).unwrap();
    let started = events.iter().position(|t| *t == JobEventType::ExecutionStarted).unwrap();
    assert!(offered < requeued && requeued < started);
}
