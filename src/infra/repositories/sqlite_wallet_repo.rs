use crate::domain::{
    models::wallet::{from_minor_units, to_minor_units, DebitOutcome, Wallet, WalletStatus},
    ports::WalletRepository,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqlitePool};

/// Balances are held as integer paise so the conditional debit is a single
/// comparison inside SQLite.
pub struct SqliteWalletRepo {
    pool: SqlitePool,
}

impl SqliteWalletRepo {
    pub fn new(pool: SqlitePool) -> Self { Self { pool } }
}

#[derive(FromRow)]
struct WalletRow {
    wallet_id: String,
    user_id: String,
    balance_minor: i64,
    status: WalletStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WalletRow> for Wallet {
    fn from(row: WalletRow) -> Self {
        Wallet {
            wallet_id: row.wallet_id,
            user_id: row.user_id,
            balance: from_minor_units(row.balance_minor),
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl WalletRepository for SqliteWalletRepo {
    async fn create(&self, wallet: &Wallet) -> Result<Wallet, AppError> {
        let row = sqlx::query_as::<_, WalletRow>(
            "INSERT INTO wallets (wallet_id, user_id, balance_minor, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING *"
        )
            .bind(&wallet.wallet_id).bind(&wallet.user_id).bind(to_minor_units(wallet.balance)?)
            .bind(wallet.status).bind(wallet.created_at).bind(wallet.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(row.into())
    }

    async fn find_by_id(&self, wallet_id: &str) -> Result<Option<Wallet>, AppError> {
        sqlx::query_as::<_, WalletRow>("SELECT * FROM wallets WHERE wallet_id = ?")
            .bind(wallet_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
            .map(|row| row.map(Wallet::from))
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Option<Wallet>, AppError> {
        sqlx::query_as::<_, WalletRow>("SELECT * FROM wallets WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
            .map(|row| row.map(Wallet::from))
    }

    async fn conditional_debit(&self, wallet_id: &str, amount: Decimal) -> Result<DebitOutcome, AppError> {
        let minor = to_minor_units(amount)?;
        if minor <= 0 {
            return Err(AppError::Validation(format!("debit amount must be positive, got {}", amount)));
        }

        let debited: Option<i64> = sqlx::query_scalar(
            "UPDATE wallets SET balance_minor = balance_minor - ?, updated_at = ?
             WHERE wallet_id = ? AND status = ? AND balance_minor >= ?
             RETURNING balance_minor"
        )
            .bind(minor).bind(Utc::now()).bind(wallet_id)
            .bind(WalletStatus::Active).bind(minor)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;

        if let Some(balance_minor) = debited {
            return Ok(DebitOutcome::Debited { new_balance: from_minor_units(balance_minor) });
        }

        // Nothing matched: read back to tell the caller which guard rejected it.
        Ok(match self.find_by_id(wallet_id).await? {
            None => DebitOutcome::WalletNotFound,
            Some(w) if w.status != WalletStatus::Active => DebitOutcome::WalletUnavailable,
            Some(w) => DebitOutcome::InsufficientFunds { balance: w.balance },
        })
    }

    async fn credit(&self, wallet_id: &str, amount: Decimal) -> Result<Decimal, AppError> {
        let minor = to_minor_units(amount)?;
        if minor <= 0 {
            return Err(AppError::Validation(format!("credit amount must be positive, got {}", amount)));
        }

        let balance_minor: i64 = sqlx::query_scalar(
            "UPDATE wallets SET balance_minor = balance_minor + ?, updated_at = ? WHERE wallet_id = ? RETURNING balance_minor"
        )
            .bind(minor).bind(Utc::now()).bind(wallet_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?
            .ok_or_else(|| AppError::NotFound(format!("Wallet {} not found", wallet_id)))?;
        Ok(from_minor_units(balance_minor))
    }
}
