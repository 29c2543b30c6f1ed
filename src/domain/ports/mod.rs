use crate::domain::models::{
    booking::{Booking, BookingStatus},
    job::{Job, JobStatus},
    job_event::JobEvent,
    job_execution::JobExecution,
    payment::Payment,
    train::Train,
    wallet::{DebitOutcome, Wallet, WalletTransaction},
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &Job) -> Result<Job, AppError>;
    async fn find_by_id(&self, job_id: &str) -> Result<Option<Job>, AppError>;
    /// Jobs in `status` whose execution date is on or before `execution_date_through`.
    async fn find_by_status(&self, status: JobStatus, execution_date_through: NaiveDate) -> Result<Vec<Job>, AppError>;
    /// Compare-and-swap write. Returns the stored job (version bumped) or `None`
    /// when the stored version no longer equals `expected_version`.
    async fn save_if_version(&self, job: &Job, expected_version: i64) -> Result<Option<Job>, AppError>;
}

#[async_trait]
pub trait TrainCatalog: Send + Sync {
    async fn upsert(&self, train: &Train) -> Result<Train, AppError>;
    async fn find_by_id(&self, train_id: &str) -> Result<Option<Train>, AppError>;
    /// Trains whose route passes through `station_code`.
    async fn find_by_station(&self, station_code: &str) -> Result<Vec<Train>, AppError>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn create(&self, booking: &Booking) -> Result<Booking, AppError>;
    async fn find_by_id(&self, booking_id: &str) -> Result<Option<Booking>, AppError>;
    async fn find_by_job(&self, job_id: &str) -> Result<Vec<Booking>, AppError>;
    async fn update_status(&self, booking_id: &str, status: BookingStatus) -> Result<(), AppError>;
    async fn link_payment(&self, booking_id: &str, payment_id: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: &Payment) -> Result<Payment, AppError>;
    async fn find_by_id(&self, payment_id: &str) -> Result<Option<Payment>, AppError>;
    async fn update(&self, payment: &Payment) -> Result<Payment, AppError>;
}

#[async_trait]
pub trait WalletRepository: Send + Sync {
    async fn create(&self, wallet: &Wallet) -> Result<Wallet, AppError>;
    async fn find_by_id(&self, wallet_id: &str) -> Result<Option<Wallet>, AppError>;
    async fn find_by_user(&self, user_id: &str) -> Result<Option<Wallet>, AppError>;
    /// Atomically subtracts `amount` only if the wallet is active and holds at least `amount`.
    async fn conditional_debit(&self, wallet_id: &str, amount: Decimal) -> Result<DebitOutcome, AppError>;
    /// Atomically adds `amount`, returning the new balance.
    async fn credit(&self, wallet_id: &str, amount: Decimal) -> Result<Decimal, AppError>;
}

#[async_trait]
pub trait WalletLedger: Send + Sync {
    async fn append(&self, txn: &WalletTransaction) -> Result<WalletTransaction, AppError>;
    async fn list_by_wallet(&self, wallet_id: &str) -> Result<Vec<WalletTransaction>, AppError>;
}

#[async_trait]
pub trait JobEventRepository: Send + Sync {
    async fn append(&self, event: &JobEvent) -> Result<(), AppError>;
    /// Ordered by `(timestamp, event_id)`.
    async fn list_by_job(&self, job_id: &str) -> Result<Vec<JobEvent>, AppError>;
}

#[async_trait]
pub trait JobExecutionRepository: Send + Sync {
    async fn record(&self, execution: &JobExecution) -> Result<(), AppError>;
    async fn list_by_job(&self, job_id: &str) -> Result<Vec<JobExecution>, AppError>;
}

/// Every persistence port the engine talks to, built once at startup.
#[derive(Clone)]
pub struct StoreClients {
    pub jobs: Arc<dyn JobRepository>,
    pub trains: Arc<dyn TrainCatalog>,
    pub bookings: Arc<dyn BookingRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub wallets: Arc<dyn WalletRepository>,
    pub wallet_transactions: Arc<dyn WalletLedger>,
    pub job_events: Arc<dyn JobEventRepository>,
    pub job_executions: Arc<dyn JobExecutionRepository>,
}
