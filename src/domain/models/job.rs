use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::payment::PaymentMethod;

pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;
pub const MAX_PASSENGERS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
pub enum JobStatus {
    Scheduled,
    #[serde(rename = "In Progress")]
    #[sqlx(rename = "In Progress")]
    InProgress,
    Completed,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStatus::Scheduled => "Scheduled",
            JobStatus::InProgress => "In Progress",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
pub enum JobType {
    Tatkal,
    #[serde(rename = "Premium Tatkal")]
    #[sqlx(rename = "Premium Tatkal")]
    PremiumTatkal,
    General,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Tatkal => "Tatkal",
            JobType::PremiumTatkal => "Premium Tatkal",
            JobType::General => "General",
        }
    }

    /// Tatkal windows open the day before the journey.
    pub fn execution_date_for(&self, journey_date: NaiveDate, requested_on: NaiveDate) -> NaiveDate {
        match self {
            JobType::Tatkal | JobType::PremiumTatkal => journey_date
                .checked_sub_days(Days::new(1))
                .unwrap_or(journey_date),
            JobType::General => requested_on,
        }
    }
}

/// Class of the last failure; drives whether a `Failed` job may run again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    NoInventory,
    Payment,
    Transient,
}

impl FailureKind {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FailureKind::Validation)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::Validation => "validation",
            FailureKind::NoInventory => "no_inventory",
            FailureKind::Payment => "payment",
            FailureKind::Transient => "transient",
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PassengerInfo {
    pub name: String,
    pub age: u32,
    pub gender: String,
    #[serde(default)]
    pub berth_preference: Option<String>,
    #[serde(default)]
    pub is_senior: bool,
    #[serde(default)]
    pub id_type: Option<String>,
    #[serde(default)]
    pub id_number: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BookingContact {
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GstDetails {
    pub gstin: String,
    pub company_name: String,
    #[serde(default)]
    pub company_address: Option<String>,
}

/// A train pinned by the user when the job was created.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TrainDetails {
    pub train_number: String,
    #[serde(default)]
    pub train_name: Option<String>,
    #[serde(default)]
    pub departure_time: Option<String>,
    #[serde(default)]
    pub arrival_time: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub class_prices: HashMap<String, Decimal>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Job {
    pub job_id: String,
    pub user_id: String,
    pub job_type: JobType,
    pub origin_station_code: String,
    pub origin_station_name: Option<String>,
    pub destination_station_code: String,
    pub destination_station_name: Option<String>,
    pub journey_date: NaiveDate,
    pub execution_date: NaiveDate,
    pub execution_time: Option<NaiveTime>,
    pub travel_class: String,
    pub passengers: Vec<PassengerInfo>,
    pub booking_contact: BookingContact,
    pub payment_method: PaymentMethod,
    pub auto_upgrade: bool,
    pub auto_book_alternate_date: bool,
    pub opt_for_insurance: bool,
    pub gst_details: Option<GstDetails>,
    pub train_details: Option<TrainDetails>,
    pub notes: Option<String>,
    pub status: JobStatus,
    pub execution_attempts: i32,
    pub max_attempts: i32,
    pub failure_reason: Option<String>,
    pub failure_kind: Option<FailureKind>,
    pub booking_id: Option<String>,
    pub pnr: Option<String>,
    pub payment_id: Option<String>,
    pub next_execution_time: Option<DateTime<Utc>>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_execution_time: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_time: Option<DateTime<Utc>>,
}

pub struct NewJobParams {
    pub user_id: String,
    pub job_type: JobType,
    pub origin_station_code: String,
    pub destination_station_code: String,
    pub journey_date: NaiveDate,
    pub booking_time: Option<NaiveTime>,
    pub travel_class: String,
    pub passengers: Vec<PassengerInfo>,
    pub booking_contact: BookingContact,
    pub payment_method: PaymentMethod,
    pub auto_book_alternate_date: bool,
    pub train_details: Option<TrainDetails>,
    /// Local calendar date on which the job was requested.
    pub requested_on: NaiveDate,
}

impl Job {
    pub fn new(params: NewJobParams) -> Self {
        let now = Utc::now();
        let execution_date = params
            .job_type
            .execution_date_for(params.journey_date, params.requested_on);

        Self {
            job_id: Uuid::new_v4().to_string(),
            user_id: params.user_id,
            job_type: params.job_type,
            origin_station_code: params.origin_station_code,
            origin_station_name: None,
            destination_station_code: params.destination_station_code,
            destination_station_name: None,
            journey_date: params.journey_date,
            execution_date,
            execution_time: params.booking_time,
            travel_class: params.travel_class,
            passengers: params.passengers,
            booking_contact: params.booking_contact,
            payment_method: params.payment_method,
            auto_upgrade: false,
            auto_book_alternate_date: params.auto_book_alternate_date,
            opt_for_insurance: false,
            gst_details: None,
            train_details: params.train_details,
            notes: None,
            status: JobStatus::Scheduled,
            execution_attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            failure_reason: None,
            failure_kind: None,
            booking_id: None,
            pnr: None,
            payment_id: None,
            next_execution_time: None,
            lease_expires_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
            last_execution_time: None,
            completed_at: None,
            failure_time: None,
        }
    }

    pub fn attempts_remaining(&self) -> bool {
        self.execution_attempts < self.max_attempts
    }

    pub fn senior_count(&self) -> usize {
        self.passengers.iter().filter(|p| p.is_senior).count()
    }
}
