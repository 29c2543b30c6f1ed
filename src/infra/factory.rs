use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{ConnectOptions, SqlitePool};
use tracing::info;
use tracing::log::LevelFilter;

use crate::config::Config;
use crate::domain::ports::StoreClients;
use crate::domain::services::audit::AuditLogger;
use crate::domain::services::executor::JobExecutor;
use crate::domain::services::scheduler::JobScheduler;
use crate::state::AppState;
use crate::infra::repositories::{
    sqlite_booking_repo::SqliteBookingRepo, sqlite_job_event_repo::SqliteJobEventRepo,
    sqlite_job_execution_repo::SqliteJobExecutionRepo, sqlite_job_repo::SqliteJobRepo,
    sqlite_payment_repo::SqlitePaymentRepo, sqlite_train_repo::SqliteTrainRepo,
    sqlite_wallet_repo::SqliteWalletRepo, sqlite_wallet_txn_repo::SqliteWalletTxnRepo,
};

pub async fn bootstrap_state(config: &Config) -> AppState {
    info!("Initializing SQLite connection with WAL Mode...");
    let pool = connect_sqlite(&config.database_url).await;
    run_sqlite_migrations(&pool).await;

    build_state(config.clone(), sqlite_stores(pool))
}

pub async fn connect_sqlite(database_url: &str) -> SqlitePool {
    let opts = SqliteConnectOptions::from_str(database_url)
        .expect("Invalid SQLite connection string")
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .log_statements(LevelFilter::Debug)
        .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await
        .expect("Failed to connect to SQLite")
}

pub async fn run_sqlite_migrations(pool: &SqlitePool) {
    sqlx::migrate!("./migrations/sqlite")
        .run(pool)
        .await
        .expect("Failed to run SQLite migrations");
}

pub fn sqlite_stores(pool: SqlitePool) -> StoreClients {
    StoreClients {
        jobs: Arc::new(SqliteJobRepo::new(pool.clone())),
        trains: Arc::new(SqliteTrainRepo::new(pool.clone())),
        bookings: Arc::new(SqliteBookingRepo::new(pool.clone())),
        payments: Arc::new(SqlitePaymentRepo::new(pool.clone())),
        wallets: Arc::new(SqliteWalletRepo::new(pool.clone())),
        wallet_transactions: Arc::new(SqliteWalletTxnRepo::new(pool.clone())),
        job_events: Arc::new(SqliteJobEventRepo::new(pool.clone())),
        job_executions: Arc::new(SqliteJobExecutionRepo::new(pool)),
    }
}

/// Wires the engine services on top of an arbitrary set of stores.
pub fn build_state(config: Config, stores: StoreClients) -> AppState {
    let engine = config.engine.clone();
    let audit = Arc::new(AuditLogger::new(stores.job_events.clone(), engine.store_timeout));
    let executor = Arc::new(JobExecutor::new(stores.clone(), audit.clone(), engine.clone()));
    let scheduler = Arc::new(JobScheduler::new(stores.jobs.clone(), audit.clone(), executor.clone(), engine));

    AppState {
        config,
        stores,
        audit,
        executor,
        scheduler,
    }
}
