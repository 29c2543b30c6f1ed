#![allow(dead_code)]

use tatkal_engine::{
    api::router::create_router,
    config::{Config, EngineConfig},
    domain::models::{
        job::{BookingContact, Job, JobType, NewJobParams, PassengerInfo},
        job_event::{JobEvent, JobEventType},
        payment::PaymentMethod,
        train::Train,
        wallet::{DebitOutcome, Wallet, WalletTransaction},
    },
    domain::ports::{JobEventRepository, StoreClients, TrainCatalog, WalletLedger, WalletRepository},
    error::AppError,
    infra::factory::{build_state, connect_sqlite, run_sqlite_migrations, sqlite_stores},
    state::AppState,
};
use async_trait::async_trait;
use axum::Router;
use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct TestApp {
    pub router: Router,
    pub pool: Pool<Sqlite>,
    pub db_filename: String,
    pub state: Arc<AppState>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(EngineConfig::default(), |stores| stores).await
    }

    pub async fn with_engine(engine: EngineConfig) -> Self {
        Self::build(engine, |stores| stores).await
    }

    /// Builds the app with some store clients swapped for fault-injecting doubles.
    pub async fn build<F>(engine: EngineConfig, customize: F) -> Self
    where
        F: FnOnce(StoreClients) -> StoreClients,
    {
        let db_filename = format!("test_{}.db", Uuid::new_v4());
        let db_url = format!("sqlite://{}?mode=rwc", db_filename);

        let pool = connect_sqlite(&db_url).await;
        run_sqlite_migrations(&pool).await;

        let config = Config {
            database_url: db_url,
            port: 0,
            scan_interval: Duration::from_secs(300),
            engine,
        };

        let stores = customize(sqlite_stores(pool.clone()));
        let state = Arc::new(build_state(config, stores));
        let router = create_router(state.clone());

        Self { router, pool, db_filename, state }
    }

    pub fn stores(&self) -> &StoreClients {
        &self.state.stores
    }

    pub async fn insert_job(&self, job: &Job) -> Job {
        self.stores().jobs.create(job).await.expect("Failed to insert job")
    }

    pub async fn reload_job(&self, job_id: &str) -> Job {
        self.stores().jobs.find_by_id(job_id).await.unwrap().expect("Job disappeared")
    }

    pub async fn insert_train(&self, train: &Train) {
        self.stores().trains.upsert(train).await.expect("Failed to insert train");
    }

    pub async fn insert_wallet(&self, user_id: &str, balance: Decimal) -> Wallet {
        self.stores()
            .wallets
            .create(&Wallet::new(user_id.to_string(), balance))
            .await
            .expect("Failed to insert wallet")
    }

    pub async fn event_types(&self, job_id: &str) -> Vec<JobEventType> {
        self.state
            .audit
            .get_events(job_id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_filename);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_filename));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_filename));
    }
}

pub fn today() -> NaiveDate {
    Utc::now().with_timezone(&chrono_tz::Asia::Kolkata).date_naive()
}

pub fn days_from_today(days: u64) -> NaiveDate {
    today().checked_add_days(Days::new(days)).unwrap()
}

pub fn passenger(name: &str, age: u32, is_senior: bool) -> PassengerInfo {
    PassengerInfo {
        name: name.to_string(),
        age,
        gender: "F".to_string(),
        berth_preference: None,
        is_senior,
        id_type: None,
        id_number: None,
    }
}

/// Two adults and one senior.
pub fn family() -> Vec<PassengerInfo> {
    vec![passenger("Asha", 34, false), passenger("Ravi", 36, false), passenger("Kamala", 67, true)]
}

/// A General job that is due right now: it executes today with no time of day.
pub fn due_job(user_id: &str, journey_date: NaiveDate, payment_method: PaymentMethod) -> Job {
    Job::new(NewJobParams {
        user_id: user_id.to_string(),
        job_type: JobType::General,
        origin_station_code: "NDLS".to_string(),
        destination_station_code: "HWH".to_string(),
        journey_date,
        booking_time: None,
        travel_class: "3A".to_string(),
        passengers: family(),
        booking_contact: BookingContact {
            email: "asha@example.in".to_string(),
            phone: "9800000000".to_string(),
        },
        payment_method,
        auto_book_alternate_date: false,
        train_details: None,
        requested_on: today(),
    })
}

/// NDLS -> CNB -> HWH, running on the given weekdays with 3A at `fare`.
pub fn rajdhani(train_id: &str, days_of_run: &[&str], fare: Decimal) -> Train {
    Train {
        train_id: train_id.to_string(),
        train_name: format!("Rajdhani {}", train_id),
        source_station: "NDLS".to_string(),
        route: vec!["NDLS".to_string(), "CNB".to_string(), "HWH".to_string()],
        days_of_run: days_of_run.iter().map(|d| d.to_string()).collect(),
        classes_available: vec!["3A".to_string(), "SL".to_string()],
        seat_availability: HashMap::from([("3A".to_string(), 40), ("SL".to_string(), 200)]),
        class_prices: HashMap::from([("3A".to_string(), fare), ("SL".to_string(), Decimal::from(350))]),
        departure_time: Some("16:55".to_string()),
        arrival_time: Some("09:55".to_string()),
        duration: Some("17h 00m".to_string()),
    }
}

pub fn weekday(date: NaiveDate) -> String {
    date.format("%a").to_string()
}

pub const ALL_DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Audit store that is always down.
pub struct UnavailableEventStore;

#[async_trait]
impl JobEventRepository for UnavailableEventStore {
    async fn append(&self, _event: &JobEvent) -> Result<(), AppError> {
        Err(AppError::InternalWithMsg("audit store unavailable".to_string()))
    }

    async fn list_by_job(&self, _job_id: &str) -> Result<Vec<JobEvent>, AppError> {
        Err(AppError::InternalWithMsg("audit store unavailable".to_string()))
    }
}

/// Ledger that rejects every append.
pub struct RejectingLedger;

#[async_trait]
impl WalletLedger for RejectingLedger {
    async fn append(&self, _txn: &WalletTransaction) -> Result<WalletTransaction, AppError> {
        Err(AppError::InternalWithMsg("ledger unavailable".to_string()))
    }

    async fn list_by_wallet(&self, _wallet_id: &str) -> Result<Vec<WalletTransaction>, AppError> {
        Ok(Vec::new())
    }
}

/// Catalog that answers after `delay`.
pub struct SlowCatalog {
    pub inner: Arc<dyn TrainCatalog>,
    pub delay: Duration,
}

#[async_trait]
impl TrainCatalog for SlowCatalog {
    async fn upsert(&self, train: &Train) -> Result<Train, AppError> {
        self.inner.upsert(train).await
    }

    async fn find_by_id(&self, train_id: &str) -> Result<Option<Train>, AppError> {
        tokio::time::sleep(self.delay).await;
        self.inner.find_by_id(train_id).await
    }

    async fn find_by_station(&self, station_code: &str) -> Result<Vec<Train>, AppError> {
        tokio::time::sleep(self.delay).await;
        self.inner.find_by_station(station_code).await
    }
}

/// Which wallet call `FailingWallets` breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletFault {
    /// `find_by_user` errors before any balance is touched.
    Lookup,
    /// `conditional_debit` errors, so the caller cannot tell whether it applied.
    Debit,
}

/// Wallet store that fails one call and passes the rest to `inner`.
pub struct FailingWallets {
    pub inner: Arc<dyn WalletRepository>,
    pub fault: WalletFault,
}

#[async_trait]
impl WalletRepository for FailingWallets {
    async fn create(&self, wallet: &Wallet) -> Result<Wallet, AppError> {
        self.inner.create(wallet).await
    }

    async fn find_by_id(&self, wallet_id: &str) -> Result<Option<Wallet>, AppError> {
        self.inner.find_by_id(wallet_id).await
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Option<Wallet>, AppError> {
        if self.fault == WalletFault::Lookup {
            return Err(AppError::InternalWithMsg("wallet store down".to_string()));
        }
        self.inner.find_by_user(user_id).await
    }

    async fn conditional_debit(&self, wallet_id: &str, amount: Decimal) -> Result<DebitOutcome, AppError> {
        if self.fault == WalletFault::Debit {
            return Err(AppError::Timeout("wallets.conditional_debit exceeded 250ms".to_string()));
        }
        self.inner.conditional_debit(wallet_id, amount).await
    }

    async fn credit(&self, wallet_id: &str, amount: Decimal) -> Result<Decimal, AppError> {
        self.inner.credit(wallet_id, amount).await
    }
}
