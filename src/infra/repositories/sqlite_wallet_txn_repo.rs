use crate::domain::{
    models::wallet::{TransactionSource, TransactionStatus, TransactionType, WalletTransaction},
    ports::WalletLedger,
};
use crate::error::AppError;
use crate::infra::repositories::parse_decimal;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

pub struct SqliteWalletTxnRepo {
    pool: SqlitePool,
}

impl SqliteWalletTxnRepo {
    pub fn new(pool: SqlitePool) -> Self { Self { pool } }
}

#[derive(FromRow)]
struct WalletTxnRow {
    txn_id: String,
    wallet_id: String,
    user_id: String,
    txn_type: TransactionType,
    amount: String,
    source: TransactionSource,
    reference_id: Option<String>,
    notes: Option<String>,
    status: TransactionStatus,
    created_at: DateTime<Utc>,
}

impl TryFrom<WalletTxnRow> for WalletTransaction {
    type Error = AppError;

    fn try_from(row: WalletTxnRow) -> Result<Self, Self::Error> {
        Ok(WalletTransaction {
            amount: parse_decimal("wallet_transactions.amount", &row.amount)?,
            txn_type: row.txn_type,
            source: row.source,
            status: row.status,
            txn_id: row.txn_id,
            wallet_id: row.wallet_id,
            user_id: row.user_id,
            reference_id: row.reference_id,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl WalletLedger for SqliteWalletTxnRepo {
    async fn append(&self, txn: &WalletTransaction) -> Result<WalletTransaction, AppError> {
        let row = sqlx::query_as::<_, WalletTxnRow>(
            "INSERT INTO wallet_transactions (txn_id, wallet_id, user_id, txn_type, amount, source, reference_id, notes, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *"
        )
            .bind(&txn.txn_id).bind(&txn.wallet_id).bind(&txn.user_id).bind(txn.txn_type)
            .bind(txn.amount.to_string()).bind(txn.source).bind(&txn.reference_id)
            .bind(&txn.notes).bind(txn.status).bind(txn.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;
        row.try_into()
    }

    async fn list_by_wallet(&self, wallet_id: &str) -> Result<Vec<WalletTransaction>, AppError> {
        sqlx::query_as::<_, WalletTxnRow>("SELECT * FROM wallet_transactions WHERE wallet_id = ? ORDER BY created_at ASC")
            .bind(wallet_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?
            .into_iter()
            .map(WalletTransaction::try_from)
            .collect()
    }
}
