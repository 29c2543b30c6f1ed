use crate::domain::models::job::{BookingContact, FailureKind, GstDetails, Job, JobStatus, JobType, PassengerInfo, TrainDetails};
use crate::domain::models::payment::PaymentMethod;
use crate::domain::ports::JobRepository;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};

pub struct SqliteJobRepo {
    pool: SqlitePool,
}

impl SqliteJobRepo {
    pub fn new(pool: SqlitePool) -> Self { Self { pool } }
}

#[derive(FromRow)]
struct JobRow {
    job_id: String,
    user_id: String,
    job_type: JobType,
    origin_station_code: String,
    origin_station_name: Option<String>,
    destination_station_code: String,
    destination_station_name: Option<String>,
    journey_date: NaiveDate,
    execution_date: NaiveDate,
    execution_time: Option<NaiveTime>,
    travel_class: String,
    passengers: Json<Vec<PassengerInfo>>,
    booking_contact: Json<BookingContact>,
    payment_method: PaymentMethod,
    auto_upgrade: bool,
    auto_book_alternate_date: bool,
    opt_for_insurance: bool,
    gst_details: Option<Json<GstDetails>>,
    train_details: Option<Json<TrainDetails>>,
    notes: Option<String>,
    status: JobStatus,
    execution_attempts: i32,
    max_attempts: i32,
    failure_reason: Option<String>,
    failure_kind: Option<FailureKind>,
    booking_id: Option<String>,
    pnr: Option<String>,
    payment_id: Option<String>,
    next_execution_time: Option<DateTime<Utc>>,
    lease_expires_at: Option<DateTime<Utc>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_execution_time: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    failure_time: Option<DateTime<Utc>>,
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        Job {
            job_id: row.job_id,
            user_id: row.user_id,
            job_type: row.job_type,
            origin_station_code: row.origin_station_code,
            origin_station_name: row.origin_station_name,
            destination_station_code: row.destination_station_code,
            destination_station_name: row.destination_station_name,
            journey_date: row.journey_date,
            execution_date: row.execution_date,
            execution_time: row.execution_time,
            travel_class: row.travel_class,
            passengers: row.passengers.0,
            booking_contact: row.booking_contact.0,
            payment_method: row.payment_method,
            auto_upgrade: row.auto_upgrade,
            auto_book_alternate_date: row.auto_book_alternate_date,
            opt_for_insurance: row.opt_for_insurance,
            gst_details: row.gst_details.map(|g| g.0),
            train_details: row.train_details.map(|t| t.0),
            notes: row.notes,
            status: row.status,
            execution_attempts: row.execution_attempts,
            max_attempts: row.max_attempts,
            failure_reason: row.failure_reason,
            failure_kind: row.failure_kind,
            booking_id: row.booking_id,
            pnr: row.pnr,
            payment_id: row.payment_id,
            next_execution_time: row.next_execution_time,
            lease_expires_at: row.lease_expires_at,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_execution_time: row.last_execution_time,
            completed_at: row.completed_at,
            failure_time: row.failure_time,
        }
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepo {
    async fn create(&self, job: &Job) -> Result<Job, AppError> {
        let row = sqlx::query_as::<_, JobRow>(
            "INSERT INTO jobs (job_id, user_id, job_type, origin_station_code, origin_station_name, destination_station_code, destination_station_name,
                journey_date, execution_date, execution_time, travel_class, passengers, booking_contact, payment_method, auto_upgrade,
                auto_book_alternate_date, opt_for_insurance, gst_details, train_details, notes, status, execution_attempts, max_attempts,
                failure_reason, failure_kind, booking_id, pnr, payment_id, next_execution_time, lease_expires_at, version, created_at,
                updated_at, last_execution_time, completed_at, failure_time)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *"
        )
            .bind(&job.job_id).bind(&job.user_id).bind(job.job_type)
            .bind(&job.origin_station_code).bind(&job.origin_station_name)
            .bind(&job.destination_station_code).bind(&job.destination_station_name)
            .bind(job.journey_date).bind(job.execution_date).bind(job.execution_time)
            .bind(&job.travel_class).bind(Json(&job.passengers)).bind(Json(&job.booking_contact))
            .bind(&job.payment_method).bind(job.auto_upgrade).bind(job.auto_book_alternate_date)
            .bind(job.opt_for_insurance).bind(job.gst_details.as_ref().map(Json)).bind(job.train_details.as_ref().map(Json))
            .bind(&job.notes).bind(job.status).bind(job.execution_attempts).bind(job.max_attempts)
            .bind(&job.failure_reason).bind(job.failure_kind)
            .bind(&job.booking_id).bind(&job.pnr).bind(&job.payment_id)
            .bind(job.next_execution_time).bind(job.lease_expires_at).bind(job.version)
            .bind(job.created_at).bind(job.updated_at).bind(job.last_execution_time)
            .bind(job.completed_at).bind(job.failure_time)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(row.into())
    }

    async fn find_by_id(&self, job_id: &str) -> Result<Option<Job>, AppError> {
        sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE job_id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
            .map(|row| row.map(Job::from))
    }

    async fn find_by_status(&self, status: JobStatus, execution_date_through: NaiveDate) -> Result<Vec<Job>, AppError> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs WHERE status = ? AND execution_date <= ? ORDER BY execution_date ASC, execution_time ASC"
        )
            .bind(status)
            .bind(execution_date_through)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(rows.into_iter().map(Job::from).collect())
    }

    async fn save_if_version(&self, job: &Job, expected_version: i64) -> Result<Option<Job>, AppError> {
        let row = sqlx::query_as::<_, JobRow>(
            "UPDATE jobs SET journey_date = ?, status = ?, execution_attempts = ?, failure_reason = ?, failure_kind = ?,
                booking_id = ?, pnr = ?, payment_id = ?, next_execution_time = ?, lease_expires_at = ?, updated_at = ?,
                last_execution_time = ?, completed_at = ?, failure_time = ?, version = version + 1
             WHERE job_id = ? AND version = ?
             RETURNING *"
        )
            .bind(job.journey_date).bind(job.status).bind(job.execution_attempts)
            .bind(&job.failure_reason).bind(job.failure_kind)
            .bind(&job.booking_id).bind(&job.pnr).bind(&job.payment_id)
            .bind(job.next_execution_time).bind(job.lease_expires_at).bind(job.updated_at)
            .bind(job.last_execution_time).bind(job.completed_at).bind(job.failure_time)
            .bind(&job.job_id).bind(expected_version)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(row.map(Job::from))
    }
}
