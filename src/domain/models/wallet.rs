use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum WalletStatus {
    Active,
    Suspended,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Wallet {
    pub wallet_id: String,
    pub user_id: String,
    pub balance: Decimal,
    pub status: WalletStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(user_id: String, balance: Decimal) -> Self {
        let now = Utc::now();
        Self {
            wallet_id: Uuid::new_v4().to_string(),
            user_id,
            balance,
            status: WalletStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Result of an atomic conditional balance change at the store boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebitOutcome {
    Debited { new_balance: Decimal },
    InsufficientFunds { balance: Decimal },
    WalletUnavailable,
    WalletNotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum TransactionType {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum TransactionSource {
    Booking,
    Refund,
    Topup,
    Withdrawal,
    Promo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
        })
    }
}

/// Ledger entry. Immutable once its status is final.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WalletTransaction {
    pub txn_id: String,
    pub wallet_id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub txn_type: TransactionType,
    pub amount: Decimal,
    pub source: TransactionSource,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    pub fn booking_debit(wallet: &Wallet, amount: Decimal, booking_id: &str, notes: String) -> Self {
        Self {
            txn_id: Uuid::new_v4().to_string(),
            wallet_id: wallet.wallet_id.clone(),
            user_id: wallet.user_id.clone(),
            txn_type: TransactionType::Debit,
            amount,
            source: TransactionSource::Booking,
            reference_id: Some(booking_id.to_string()),
            notes: Some(notes),
            status: TransactionStatus::Success,
            created_at: Utc::now(),
        }
    }
}

pub const MINOR_UNITS_PER_RUPEE: i64 = 100;

/// Converts an amount into paise. Amounts with sub-paise precision are rejected.
pub fn to_minor_units(amount: Decimal) -> Result<i64, AppError> {
    let scaled = amount * Decimal::from(MINOR_UNITS_PER_RUPEE);
    if scaled != scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero) {
        return Err(AppError::Validation(format!("amount {} has sub-paise precision", amount)));
    }
    scaled
        .to_i64()
        .ok_or_else(|| AppError::Validation(format!("amount {} out of range", amount)))
}

pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn minor_unit_conversion_is_exact() {
        assert_eq!(to_minor_units(dec!(1732.5)).unwrap(), 173_250);
        assert_eq!(to_minor_units(dec!(3000)).unwrap(), 300_000);
        assert_eq!(from_minor_units(126_750), dec!(1267.5));
    }

    #[test]
    fn sub_paise_amounts_are_rejected() {
        assert!(matches!(to_minor_units(dec!(10.005)), Err(AppError::Validation(_))));
    }
}
