use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::models::booking::{BookedPassenger, Booking, BookingStatus};
use crate::domain::models::job::{FailureKind, Job, JobStatus, MAX_PASSENGERS};
use crate::domain::models::job_event::JobEventType;
use crate::domain::models::job_execution::{ExecutionStatus, JobExecution};
use crate::domain::models::payment::PaymentStatus;
use crate::domain::models::train::Train;
use crate::domain::ports::StoreClients;
use crate::domain::services::audit::AuditLogger;
use crate::domain::services::deadline;
use crate::domain::services::fare::{self, FareBreakdown};
use crate::domain::services::payment::PaymentSettlement;
use crate::domain::services::seating;
use crate::domain::services::state_machine::{JobLifecycle, Transition};
use crate::domain::services::train_finder::TrainFinder;
use crate::error::{ExecutionError, TransitionError};

const ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_9b7d_4c3a_8e51_7d2f_0b9a_c4e3);

/// Booking id for one attempt of a job. Re-running the same attempt yields the same id.
pub fn booking_id_for(job_id: &str, attempt: i32) -> String {
    Uuid::new_v5(&ID_NAMESPACE, format!("{}/{}/booking", job_id, attempt).as_bytes()).to_string()
}

pub fn payment_id_for(job_id: &str, attempt: i32) -> String {
    Uuid::new_v5(&ID_NAMESPACE, format!("{}/{}/payment", job_id, attempt).as_bytes()).to_string()
}

/// `PNR` followed by ten random digits.
pub fn generate_pnr<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("PNR{:010}", rng.gen_range(0..10_000_000_000u64))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Completed {
        booking_id: String,
        pnr: String,
        payment_id: Option<String>,
    },
    /// Failed attempt with a retry scheduled.
    Retrying { error: String },
    /// Terminal failure.
    Failed { error: String },
    /// The job could not be claimed; nothing was attempted.
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub job_id: String,
    #[serde(flatten)]
    pub outcome: ExecutionOutcome,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        matches!(self.outcome, ExecutionOutcome::Completed { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ExecutionOutcome::Retrying { error } | ExecutionOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }
}

struct SelectedTrain {
    train_id: String,
    train_name: String,
    /// Catalog entry, when the train is known to the catalog.
    catalog: Option<Train>,
    journey_date: NaiveDate,
}

pub struct JobExecutor {
    stores: StoreClients,
    audit: Arc<AuditLogger>,
    lifecycle: JobLifecycle,
    finder: TrainFinder,
    settlement: PaymentSettlement,
    config: EngineConfig,
}

impl JobExecutor {
    pub fn new(stores: StoreClients, audit: Arc<AuditLogger>, config: EngineConfig) -> Self {
        let timeout = config.store_timeout;
        Self {
            lifecycle: JobLifecycle::new(stores.jobs.clone(), audit.clone(), timeout),
            finder: TrainFinder::new(stores.trains.clone(), audit.clone(), timeout, config.alternate_date_window_days),
            settlement: PaymentSettlement::new(
                stores.bookings.clone(),
                stores.payments.clone(),
                stores.wallets.clone(),
                stores.wallet_transactions.clone(),
                audit.clone(),
                timeout,
            ),
            stores,
            audit,
            config,
        }
    }

    /// Runs one attempt of `job`. Never returns an error: every failure is
    /// reflected on the job and in the result.
    pub async fn execute(&self, job: Job) -> ExecutionResult {
        let span = info_span!("job_execution", job_id = %job.job_id, attempt = job.execution_attempts + 1);
        async move {
            let job_id = job.job_id.clone();
            let outcome = self.run(job).await;
            match &outcome {
                ExecutionOutcome::Completed { pnr, .. } => info!(pnr = %pnr, "Job completed"),
                ExecutionOutcome::Retrying { error } => warn!(error = %error, "Attempt failed, retry scheduled"),
                ExecutionOutcome::Failed { error } => error!(error = %error, "Job failed"),
                ExecutionOutcome::Skipped { reason } => info!(reason = %reason, "Job skipped"),
            }
            ExecutionResult { job_id, outcome }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, job: Job) -> ExecutionOutcome {
        let job = if job.status == JobStatus::Failed {
            match self.lifecycle.transition(&job, Transition::Requeue).await {
                Ok(requeued) => requeued,
                Err(e) => return ExecutionOutcome::Skipped { reason: e.to_string() },
            }
        } else {
            job
        };

        let claimed = match self.lifecycle.transition(&job, Transition::Claim { lease_ttl: self.config.lease_ttl }).await {
            Ok(claimed) => claimed,
            Err(ExecutionError::Lost(TransitionError::AttemptsExhausted { attempts, max_attempts })) => {
                return self.abandon(&job, attempts, max_attempts).await;
            }
            Err(e) => return ExecutionOutcome::Skipped { reason: e.to_string() },
        };

        self.record(JobExecution::milestone(&claimed.job_id, claimed.execution_attempts, ExecutionStatus::Started))
            .await;

        match self.run_steps(&claimed).await {
            Ok(completed) => {
                let mut milestone =
                    JobExecution::milestone(&completed.job_id, completed.execution_attempts, ExecutionStatus::Success);
                milestone.booking_id = completed.booking_id.clone();
                milestone.payment_id = completed.payment_id.clone();
                milestone.pnr = completed.pnr.clone();
                self.record(milestone).await;

                ExecutionOutcome::Completed {
                    booking_id: completed.booking_id.unwrap_or_default(),
                    pnr: completed.pnr.unwrap_or_default(),
                    payment_id: completed.payment_id,
                }
            }
            Err(err) => self.handle_failure(&claimed, err).await,
        }
    }

    /// A lease-expired job whose attempts are all used up. Fail it so it stops being re-offered.
    async fn abandon(&self, job: &Job, attempts: i32, max_attempts: i32) -> ExecutionOutcome {
        let reason = match job.failure_reason.as_deref() {
            Some(previous) => format!("Attempts exhausted ({}/{}): {}", attempts, max_attempts, previous),
            None => format!("Attempts exhausted ({}/{}) without completion", attempts, max_attempts),
        };
        let kind = job.failure_kind.unwrap_or(FailureKind::Transient);
        match self.lifecycle.transition(job, Transition::Fail { reason: reason.clone(), kind }).await {
            Ok(_) => ExecutionOutcome::Failed { error: reason },
            Err(e) => ExecutionOutcome::Skipped { reason: e.to_string() },
        }
    }

    async fn handle_failure(&self, claimed: &Job, err: ExecutionError) -> ExecutionOutcome {
        if let ExecutionError::Lost(lost) = &err {
            return ExecutionOutcome::Skipped { reason: lost.to_string() };
        }

        let reason = err.to_string();
        let kind = err.kind();
        let terminal = !err.is_retryable() || !claimed.attempts_remaining();

        let (transition, status) = if terminal {
            (Transition::Fail { reason: reason.clone(), kind }, ExecutionStatus::Failed)
        } else {
            (
                Transition::Retry {
                    reason: reason.clone(),
                    kind,
                    next_execution_time: Utc::now() + self.config.retry_backoff,
                },
                ExecutionStatus::RetryScheduled,
            )
        };

        let mut milestone = JobExecution::milestone(&claimed.job_id, claimed.execution_attempts, status);
        milestone.error_message = Some(reason.clone());

        match self.lifecycle.transition(claimed, transition).await {
            Ok(_) => {
                self.record(milestone).await;
                if terminal {
                    ExecutionOutcome::Failed { error: reason }
                } else {
                    ExecutionOutcome::Retrying { error: reason }
                }
            }
            Err(ExecutionError::Lost(lost)) => ExecutionOutcome::Skipped { reason: lost.to_string() },
            Err(e) => {
                // Job stays InProgress; its lease expiry brings it back.
                error!(error = %e, "Could not record failure on job");
                ExecutionOutcome::Failed { error: format!("{}; status update failed: {}", reason, e) }
            }
        }
    }

    async fn run_steps(&self, job: &Job) -> Result<Job, ExecutionError> {
        self.audit
            .log(
                &job.job_id,
                JobEventType::JobDetails,
                format!(
                    "{} job {} -> {} on {} in {} for {} passenger(s)",
                    job.job_type.as_str(),
                    job.origin_station_code,
                    job.destination_station_code,
                    job.journey_date,
                    job.travel_class,
                    job.passengers.len()
                ),
                Some(json!({
                    "job_type": job.job_type,
                    "origin": job.origin_station_code,
                    "destination": job.destination_station_code,
                    "journey_date": job.journey_date,
                    "travel_class": job.travel_class,
                    "passenger_count": job.passengers.len(),
                    "senior_count": job.senior_count(),
                    "payment_method": job.payment_method,
                    "auto_book_alternate_date": job.auto_book_alternate_date,
                    "train_details": job.train_details,
                })),
            )
            .await;

        // Class codes are matched exactly from here on.
        let mut job = job.clone();
        job.travel_class = job.travel_class.trim().to_uppercase();
        let job = &job;

        if let Err(problems) = self.validate(job) {
            let reason = format!("Job validation failed: {}", problems.join("; "));
            self.audit
                .log(&job.job_id, JobEventType::ValidationFailed, reason.clone(), Some(json!({ "problems": problems })))
                .await;
            return Err(ExecutionError::Validation(reason));
        }

        if let Some(completed) = self.recover_existing_booking(job).await? {
            return Ok(completed);
        }

        let selected = self.select_train(job).await?;

        let job_fare = job
            .train_details
            .as_ref()
            .and_then(|td| {
                td.class_prices
                    .iter()
                    .find(|(class, _)| class.trim().eq_ignore_ascii_case(&job.travel_class))
                    .map(|(_, price)| *price)
            });
        let train_fare = selected.catalog.as_ref().and_then(|t| t.price_for(&job.travel_class));
        let (base_fare, source) = fare::resolve_base_fare(train_fare, job_fare, &job.travel_class);
        let breakdown = fare::compute_fare(base_fare, &job.passengers);
        self.audit
            .log(
                &job.job_id,
                JobEventType::FareCalculation,
                format!(
                    "Fare {} + tax {} = {} for {} passenger(s)",
                    breakdown.subtotal,
                    breakdown.tax,
                    breakdown.total,
                    job.passengers.len()
                ),
                Some(json!({ "breakdown": breakdown, "base_fare_source": source })),
            )
            .await;

        let booking = self.create_booking(job, &selected, &breakdown).await?;

        let payment = self
            .settlement
            .settle(&booking, payment_id_for(&job.job_id, job.execution_attempts))
            .await?;

        self.lifecycle
            .transition(
                job,
                Transition::Complete {
                    booking_id: booking.booking_id.clone(),
                    pnr: booking.pnr.clone(),
                    payment_id: Some(payment.payment_id),
                    journey_date: selected.journey_date,
                },
            )
            .await
    }

    fn validate(&self, job: &Job) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();
        if job.user_id.trim().is_empty() {
            problems.push("user_id is missing".to_string());
        }
        if job.origin_station_code.trim().is_empty() {
            problems.push("origin station is missing".to_string());
        }
        if job.destination_station_code.trim().is_empty() {
            problems.push("destination station is missing".to_string());
        }
        if job.travel_class.trim().is_empty() {
            problems.push("travel class is missing".to_string());
        }
        if job.passengers.is_empty() {
            problems.push("at least one passenger is required".to_string());
        }
        if job.passengers.len() > MAX_PASSENGERS {
            problems.push(format!(
                "at most {} passengers per booking, got {}",
                MAX_PASSENGERS,
                job.passengers.len()
            ));
        }
        if job.passengers.iter().any(|p| p.name.trim().is_empty()) {
            problems.push("every passenger needs a name".to_string());
        }
        let today = Utc::now().with_timezone(&self.config.timezone).date_naive();
        if job.journey_date < today {
            problems.push(format!("journey date {} is in the past", job.journey_date));
        }
        if problems.is_empty() { Ok(()) } else { Err(problems) }
    }

    /// A paid booking left behind by an earlier attempt completes the job.
    /// Any other leftover is surfaced for manual reconciliation.
    async fn recover_existing_booking(&self, job: &Job) -> Result<Option<Job>, ExecutionError> {
        let timeout = self.config.store_timeout;
        let existing =
            deadline::within(timeout, "bookings.find_by_job", self.stores.bookings.find_by_job(&job.job_id)).await?;
        if existing.is_empty() {
            return Ok(None);
        }

        for booking in existing.iter().filter(|b| b.booking_status == BookingStatus::Confirmed) {
            let Some(payment_id) = booking.payment_id.as_deref() else { continue };
            let payment =
                deadline::within(timeout, "payments.find_by_id", self.stores.payments.find_by_id(payment_id)).await?;
            if payment.is_some_and(|p| p.payment_status == PaymentStatus::Success) {
                self.audit
                    .log(
                        &job.job_id,
                        JobEventType::BookingRecovered,
                        format!("Found paid booking {} (PNR {}) from an earlier attempt", booking.booking_id, booking.pnr),
                        Some(json!({ "booking_id": booking.booking_id, "pnr": booking.pnr, "payment_id": payment_id })),
                    )
                    .await;
                let completed = self
                    .lifecycle
                    .transition(
                        job,
                        Transition::Complete {
                            booking_id: booking.booking_id.clone(),
                            pnr: booking.pnr.clone(),
                            payment_id: Some(payment_id.to_string()),
                            journey_date: booking.journey_date,
                        },
                    )
                    .await?;
                return Ok(Some(completed));
            }
        }

        let leftovers: Vec<_> = existing
            .iter()
            .filter(|b| b.booking_status == BookingStatus::Confirmed)
            .map(|b| json!({ "booking_id": b.booking_id, "pnr": b.pnr, "payment_id": b.payment_id }))
            .collect();
        if !leftovers.is_empty() {
            self.audit
                .log(
                    &job.job_id,
                    JobEventType::DuplicateBookingSuspected,
                    format!("{} unpaid booking(s) from earlier attempts need reconciliation", leftovers.len()),
                    Some(json!({ "bookings": leftovers })),
                )
                .await;
        }
        Ok(None)
    }

    async fn select_train(&self, job: &Job) -> Result<SelectedTrain, ExecutionError> {
        if let Some(details) = &job.train_details {
            let catalog = self.finder.get_train(&details.train_number).await?;
            let train_name = details
                .train_name
                .clone()
                .or_else(|| catalog.as_ref().map(|t| t.train_name.clone()))
                .unwrap_or_else(|| format!("{}-{} Express", job.origin_station_code, job.destination_station_code));
            self.audit
                .log(
                    &job.job_id,
                    JobEventType::TrainSelected,
                    format!("Using specified train: {} - {}", details.train_number, train_name),
                    Some(json!({ "train_details": details, "in_catalog": catalog.is_some() })),
                )
                .await;
            return Ok(SelectedTrain {
                train_id: details.train_number.clone(),
                train_name,
                catalog,
                journey_date: job.journey_date,
            });
        }

        let found = self.finder.search_with_fallback(job).await?;
        self.audit
            .log(
                &job.job_id,
                JobEventType::TrainSelected,
                format!(
                    "Selected train {} - {} on {}",
                    found.train.train_id, found.train.train_name, found.journey_date
                ),
                Some(json!({
                    "train_id": found.train.train_id,
                    "departure_time": found.train.departure_time,
                    "available_seats": found.train.seats_in(&job.travel_class),
                    "journey_date": found.journey_date,
                    "is_alternate_date": found.alternate,
                })),
            )
            .await;
        Ok(SelectedTrain {
            train_id: found.train.train_id.clone(),
            train_name: found.train.train_name.clone(),
            catalog: Some(found.train),
            journey_date: found.journey_date,
        })
    }

    async fn create_booking(&self, job: &Job, selected: &SelectedTrain, breakdown: &FareBreakdown) -> Result<Booking, ExecutionError> {
        let (pnr, seats) = {
            let mut rng = rand::thread_rng();
            let pnr = generate_pnr(&mut rng);
            let seats = seating::allocate_seats(&mut rng, &job.travel_class, job.passengers.len()).ok_or_else(|| {
                ExecutionError::Validation(format!(
                    "{} passengers do not fit in one {} coach",
                    job.passengers.len(),
                    job.travel_class
                ))
            })?;
            (pnr, seats)
        };

        let now = Utc::now();
        let booking = Booking {
            booking_id: booking_id_for(&job.job_id, job.execution_attempts),
            pnr,
            job_id: job.job_id.clone(),
            user_id: job.user_id.clone(),
            train_id: selected.train_id.clone(),
            train_name: selected.train_name.clone(),
            journey_date: selected.journey_date,
            origin_station_code: job.origin_station_code.clone(),
            destination_station_code: job.destination_station_code.clone(),
            travel_class: job.travel_class.clone(),
            passengers: job
                .passengers
                .iter()
                .cloned()
                .zip(seats)
                .map(|(passenger, seat)| BookedPassenger { passenger, seat })
                .collect(),
            fare: breakdown.subtotal,
            tax: breakdown.tax,
            total_amount: breakdown.total,
            price_details: breakdown.price_details(),
            booking_status: BookingStatus::Confirmed,
            payment_method: job.payment_method.clone(),
            payment_id: None,
            booking_email: job.booking_contact.email.clone(),
            booking_phone: job.booking_contact.phone.clone(),
            created_at: now,
            updated_at: now,
        };

        let booking = deadline::within(self.config.store_timeout, "bookings.create", self.stores.bookings.create(&booking))
            .await?;
        self.audit
            .log(
                &job.job_id,
                JobEventType::BookingCreated,
                format!("Booking {} created with PNR {}", booking.booking_id, booking.pnr),
                Some(json!({
                    "booking_id": booking.booking_id,
                    "pnr": booking.pnr,
                    "train_id": booking.train_id,
                    "journey_date": booking.journey_date,
                    "seats": booking.passengers.iter().map(|p| p.seat.as_str()).collect::<Vec<_>>(),
                    "total_amount": booking.total_amount,
                })),
            )
            .await;
        Ok(booking)
    }

    async fn record(&self, execution: JobExecution) {
        if let Err(e) = deadline::within(
            self.config.store_timeout,
            "job_executions.record",
            self.stores.job_executions.record(&execution),
        )
        .await
        {
            error!(error = %e, status = %execution.execution_status, "Failed to record execution milestone");
        }
    }
}
