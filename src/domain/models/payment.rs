use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum PaymentMethod {
    Wallet,
    Upi,
    Card,
    Netbanking,
    CashOnDelivery,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Upi => "upi",
            PaymentMethod::Card => "card",
            PaymentMethod::Netbanking => "netbanking",
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
        })
    }
}

/// Machine-readable reason recorded on a failed payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum PaymentFailureCode {
    WalletNotFound,
    WalletUnavailable,
    InsufficientBalance,
    LedgerWriteFailed,
    /// The wallet or payment store failed before any money moved.
    WalletStoreError,
}

impl fmt::Display for PaymentFailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PaymentFailureCode::WalletNotFound => "wallet_not_found",
            PaymentFailureCode::WalletUnavailable => "wallet_unavailable",
            PaymentFailureCode::InsufficientBalance => "insufficient_balance",
            PaymentFailureCode::LedgerWriteFailed => "ledger_write_failed",
            PaymentFailureCode::WalletStoreError => "wallet_store_error",
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GatewayResponse {
    pub method: String,
    pub status: PaymentStatus,
    pub timestamp: DateTime<Utc>,
    pub transaction_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Payment {
    pub payment_id: String,
    pub booking_id: String,
    pub user_id: String,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub transaction_reference: Option<String>,
    pub gateway_response: Option<GatewayResponse>,
    pub failure_code: Option<PaymentFailureCode>,
    pub error_message: Option<String>,
    pub initiated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn pending(payment_id: String, booking_id: String, user_id: String, amount: Decimal, method: PaymentMethod) -> Self {
        Self {
            payment_id,
            booking_id,
            user_id,
            amount,
            payment_method: method,
            payment_status: PaymentStatus::Pending,
            transaction_reference: None,
            gateway_response: None,
            failure_code: None,
            error_message: None,
            initiated_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn mark_success(&mut self, transaction_id: String, now: DateTime<Utc>) {
        self.payment_status = PaymentStatus::Success;
        self.transaction_reference = Some(transaction_id.clone());
        self.completed_at = Some(now);
        self.gateway_response = Some(GatewayResponse {
            method: self.payment_method.as_str().to_string(),
            status: PaymentStatus::Success,
            timestamp: now,
            transaction_id: Some(transaction_id),
            error: None,
        });
    }

    pub fn mark_failed(&mut self, code: PaymentFailureCode, message: String, now: DateTime<Utc>) {
        self.payment_status = PaymentStatus::Failed;
        self.failure_code = Some(code);
        self.completed_at = Some(now);
        self.gateway_response = Some(GatewayResponse {
            method: self.payment_method.as_str().to_string(),
            status: PaymentStatus::Failed,
            timestamp: now,
            transaction_id: None,
            error: Some(message.clone()),
        });
        self.error_message = Some(message);
    }
}
