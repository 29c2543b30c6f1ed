use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::AppError;

pub mod sqlite_booking_repo;
pub mod sqlite_job_event_repo;
pub mod sqlite_job_execution_repo;
pub mod sqlite_job_repo;
pub mod sqlite_payment_repo;
pub mod sqlite_train_repo;
pub mod sqlite_wallet_repo;
pub mod sqlite_wallet_txn_repo;

/// Money is stored as TEXT so no precision is lost; a value that no longer parses is corruption.
pub(crate) fn parse_decimal(column: &str, raw: &str) -> Result<Decimal, AppError> {
    Decimal::from_str(raw).map_err(|e| AppError::Corrupt(format!("{} = '{}': {}", column, raw, e)))
}
