mod common;

use chrono::{Duration, TimeZone, Utc};
use common::*;
use rust_decimal_macros::dec;
use serde_json::json;
use tatkal_engine::error::AppError;
use tatkal_engine::domain::models::{
    job::{FailureKind, GstDetails, JobStatus, JobType, TrainDetails},
    job_event::{JobEvent, JobEventType},
    job_execution::{ExecutionStatus, JobExecution},
    payment::PaymentMethod,
    wallet::{DebitOutcome, Wallet, WalletStatus},
};
use std::collections::HashMap;

#[tokio::test]
async fn test_save_if_version_rejects_stale_writer() {
    let app = TestApp::new().await;
    let job = app.insert_job(&due_job("u-cas", days_from_today(2), PaymentMethod::Upi)).await;
    assert_eq!(job.version, 0);

    let mut first = job.clone();
    first.status = JobStatus::InProgress;
    first.execution_attempts = 1;
    let saved = app.stores().jobs.save_if_version(&first, job.version).await.unwrap().unwrap();
    assert_eq!(saved.version, 1);
    assert_eq!(saved.status, JobStatus::InProgress);

    let mut second = job.clone();
    second.status = JobStatus::Failed;
    second.failure_reason = Some("late writer".to_string());
    let rejected = app.stores().jobs.save_if_version(&second, job.version).await.unwrap();
    assert!(rejected.is_none());

    let stored = app.reload_job(&job.job_id).await;
    assert_eq!(stored.status, JobStatus::InProgress);
    assert_eq!(stored.version, 1);
    assert!(stored.failure_reason.is_none());
}

#[tokio::test]
async fn test_job_structured_fields_survive_storage() {
    let app = TestApp::new().await;
    let mut job = due_job("u-fields", days_from_today(4), PaymentMethod::Netbanking);
    job.gst_details = Some(GstDetails {
        gstin: "07AAACR5055K1Z5".to_string(),
        company_name: "Ravi Traders".to_string(),
        company_address: None,
    });
    job.train_details = Some(TrainDetails {
        train_number: "12951".to_string(),
        train_name: Some("Mumbai Rajdhani".to_string()),
        departure_time: Some("16:35".to_string()),
        arrival_time: None,
        duration: None,
        class_prices: HashMap::from([("3A".to_string(), dec!(2150.50))]),
    });
    job.failure_kind = Some(FailureKind::NoInventory);
    job.next_execution_time = Some(Utc.with_ymd_and_hms(2026, 3, 1, 4, 30, 0).unwrap());
    let job = app.insert_job(&job).await;

    let stored = app.reload_job(&job.job_id).await;
    assert_eq!(stored.passengers, job.passengers);
    assert_eq!(stored.booking_contact, job.booking_contact);
    assert_eq!(stored.gst_details, job.gst_details);
    assert_eq!(stored.train_details, job.train_details);
    assert_eq!(stored.payment_method, PaymentMethod::Netbanking);
    assert_eq!(stored.failure_kind, Some(FailureKind::NoInventory));
    assert_eq!(stored.next_execution_time, job.next_execution_time);
    assert_eq!(stored.journey_date, job.journey_date);
    assert_eq!(stored.execution_time, None);
    assert_eq!(stored.max_attempts, job.max_attempts);
}

#[tokio::test]
async fn test_find_by_status_filters_on_execution_date() {
    let app = TestApp::new().await;
    let today_job = app.insert_job(&due_job("u-a", days_from_today(1), PaymentMethod::Upi)).await;
    let mut later = due_job("u-b", days_from_today(6), PaymentMethod::Upi);
    later.execution_date = days_from_today(5);
    let later = app.insert_job(&later).await;

    let through_today = app.stores().jobs.find_by_status(JobStatus::Scheduled, today()).await.unwrap();
    assert_eq!(through_today.len(), 1);
    assert_eq!(through_today[0].job_id, today_job.job_id);

    let through_later = app.stores().jobs.find_by_status(JobStatus::Scheduled, days_from_today(5)).await.unwrap();
    assert_eq!(through_later.len(), 2);
    assert_eq!(through_later[1].job_id, later.job_id);

    let failed = app.stores().jobs.find_by_status(JobStatus::Failed, days_from_today(5)).await.unwrap();
    assert!(failed.is_empty());
}

#[tokio::test]
async fn test_train_lookup_by_route_station() {
    let app = TestApp::new().await;
    app.insert_train(&rajdhani("12302", &ALL_DAYS, dec!(600))).await;
    app.insert_train(&rajdhani("12306", &["Sun"], dec!(550))).await;

    let mut elsewhere = rajdhani("12951", &ALL_DAYS, dec!(700));
    elsewhere.source_station = "MMCT".to_string();
    elsewhere.route = vec!["MMCT".to_string(), "BRC".to_string(), "NDLS".to_string()];
    app.insert_train(&elsewhere).await;

    let through_cnb = app.stores().trains.find_by_station("CNB").await.unwrap();
    let ids: Vec<&str> = through_cnb.iter().map(|t| t.train_id.as_str()).collect();
    assert_eq!(ids, vec!["12302", "12306"]);

    let through_ndls = app.stores().trains.find_by_station("NDLS").await.unwrap();
    assert_eq!(through_ndls.len(), 3);

    assert!(app.stores().trains.find_by_station("SBC").await.unwrap().is_empty());

    let mut repriced = rajdhani("12302", &ALL_DAYS, dec!(640));
    repriced.seat_availability.insert("3A".to_string(), 0);
    app.insert_train(&repriced).await;
    let stored = app.stores().trains.find_by_id("12302").await.unwrap().unwrap();
    assert_eq!(stored.price_for("3A"), Some(dec!(640)));
    assert_eq!(stored.seats_in("3A"), 0);
}

#[tokio::test]
async fn test_events_list_in_timestamp_order() {
    let app = TestApp::new().await;
    let base = Utc.with_ymd_and_hms(2026, 5, 10, 4, 0, 0).unwrap();

    let mut late = JobEvent::new("job-x", JobEventType::ExecutionCompleted, "done".to_string(), None);
    late.timestamp = base + Duration::milliseconds(1500);
    let mut early = JobEvent::new("job-x", JobEventType::ExecutionStarted, "start".to_string(), Some(json!({ "attempt": 1 })));
    early.timestamp = base;
    let mut middle = JobEvent::new("job-x", JobEventType::TrainSelected, "train".to_string(), None);
    middle.timestamp = base + Duration::microseconds(250);
    let other = JobEvent::new("job-y", JobEventType::JobDetails, "other".to_string(), None);

    for event in [&late, &early, &other, &middle] {
        app.stores().job_events.append(event).await.unwrap();
    }

    let listed = app.stores().job_events.list_by_job("job-x").await.unwrap();
    let types: Vec<JobEventType> = listed.iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![JobEventType::ExecutionStarted, JobEventType::TrainSelected, JobEventType::ExecutionCompleted]
    );
    assert_eq!(listed[0].details, Some(json!({ "attempt": 1 })));
}

#[tokio::test]
async fn test_execution_history_orders_by_attempt() {
    let app = TestApp::new().await;
    let mut second = JobExecution::milestone("job-h", 2, ExecutionStatus::Started);
    second.recorded_at = Utc::now() - Duration::minutes(1);
    let mut first = JobExecution::milestone("job-h", 1, ExecutionStatus::RetryScheduled);
    first.error_message = Some("No trains found".to_string());
    first.recorded_at = Utc::now();

    app.stores().job_executions.record(&second).await.unwrap();
    app.stores().job_executions.record(&first).await.unwrap();

    let history = app.stores().job_executions.list_by_job("job-h").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].attempt_number, 1);
    assert_eq!(history[0].execution_status, ExecutionStatus::RetryScheduled);
    assert_eq!(history[1].attempt_number, 2);
}

#[tokio::test]
async fn test_debit_classifies_unusable_wallets() {
    let app = TestApp::new().await;
    let wallets = &app.stores().wallets;

    let mut suspended = Wallet::new("u-frozen".to_string(), dec!(5000));
    suspended.status = WalletStatus::Suspended;
    let suspended = wallets.create(&suspended).await.unwrap();

    assert_eq!(
        wallets.conditional_debit(&suspended.wallet_id, dec!(10)).await.unwrap(),
        DebitOutcome::WalletUnavailable
    );
    assert_eq!(
        wallets.conditional_debit("no-such-wallet", dec!(10)).await.unwrap(),
        DebitOutcome::WalletNotFound
    );
    let stored = wallets.find_by_id(&suspended.wallet_id).await.unwrap().unwrap();
    assert_eq!(stored.balance, dec!(5000));
}

#[tokio::test]
async fn test_debit_and_credit_keep_paise_precision() {
    let app = TestApp::new().await;
    let wallet = app.insert_wallet("u-paise", dec!(100.10)).await;
    let wallets = &app.stores().wallets;

    assert_eq!(
        wallets.conditional_debit(&wallet.wallet_id, dec!(100.11)).await.unwrap(),
        DebitOutcome::InsufficientFunds { balance: dec!(100.10) }
    );
    assert_eq!(
        wallets.conditional_debit(&wallet.wallet_id, dec!(0.10)).await.unwrap(),
        DebitOutcome::Debited { new_balance: dec!(100.00) }
    );
    assert_eq!(wallets.credit(&wallet.wallet_id, dec!(82.50)).await.unwrap(), dec!(182.50));
    assert!(wallets.conditional_debit(&wallet.wallet_id, dec!(0)).await.is_err());

    let by_user = wallets.find_by_user("u-paise").await.unwrap().unwrap();
    assert_eq!(by_user.wallet_id, wallet.wallet_id);
    assert_eq!(by_user.balance, dec!(182.50));
}

#[tokio::test]
async fn test_enum_columns_store_their_wire_names() {
    let app = TestApp::new().await;
    let mut job = due_job("u-enums", days_from_today(3), PaymentMethod::CashOnDelivery);
    job.job_type = JobType::PremiumTatkal;
    job.status = JobStatus::InProgress;
    job.failure_kind = Some(FailureKind::NoInventory);
    let job = app.insert_job(&job).await;

    let (job_type, status, payment_method, failure_kind): (String, String, String, String) = sqlx::query_as(
        "SELECT job_type, status, payment_method, failure_kind FROM jobs WHERE job_id = ?",
    )
    .bind(&job.job_id)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(job_type, "Premium Tatkal");
    assert_eq!(status, "In Progress");
    assert_eq!(payment_method, "cash_on_delivery");
    assert_eq!(failure_kind, "no_inventory");

    let found = app.stores().jobs.find_by_status(JobStatus::InProgress, days_from_today(3)).await.unwrap();
    assert!(found.iter().any(|j| j.job_id == job.job_id));
}

#[tokio::test]
async fn test_unknown_enum_value_is_a_decode_error() {
    let app = TestApp::new().await;
    let job = app.insert_job(&due_job("u-bad-enum", days_from_today(2), PaymentMethod::Upi)).await;
    sqlx::query("UPDATE jobs SET status = 'Running' WHERE job_id = ?")
        .bind(&job.job_id)
        .execute(&app.pool)
        .await
        .unwrap();

    let err = app.stores().jobs.find_by_id(&job.job_id).await.unwrap_err();
    assert!(matches!(err, AppError::Database(_)), "{:?}", err);
}
