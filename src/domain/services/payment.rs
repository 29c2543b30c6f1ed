use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::models::booking::{Booking, BookingStatus};
use crate::domain::models::job_event::JobEventType;
use crate::domain::models::payment::{Payment, PaymentFailureCode, PaymentMethod};
use crate::domain::models::wallet::{DebitOutcome, WalletStatus, WalletTransaction};
use crate::domain::ports::{BookingRepository, PaymentRepository, WalletLedger, WalletRepository};
use crate::domain::services::audit::AuditLogger;
use crate::domain::services::deadline;
use crate::error::ExecutionError;

/// Creates the payment for a booking and settles it against the user's wallet
/// or the simulated gateway.
pub struct PaymentSettlement {
    bookings: Arc<dyn BookingRepository>,
    payments: Arc<dyn PaymentRepository>,
    wallets: Arc<dyn WalletRepository>,
    ledger: Arc<dyn WalletLedger>,
    audit: Arc<AuditLogger>,
    timeout: Duration,
}

impl PaymentSettlement {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        payments: Arc<dyn PaymentRepository>,
        wallets: Arc<dyn WalletRepository>,
        ledger: Arc<dyn WalletLedger>,
        audit: Arc<AuditLogger>,
        timeout: Duration,
    ) -> Self {
        Self { bookings, payments, wallets, ledger, audit, timeout }
    }

    /// Any failure after the payment row exists closes the attempt. When no
    /// money moved the payment is stored as failed and the booking cancelled.
    /// When the debit outcome is unknown both are left as they are and a
    /// reconciliation event is written instead.
    pub async fn settle(&self, booking: &Booking, payment_id: String) -> Result<Payment, ExecutionError> {
        let job_id = booking.job_id.as_str();
        let pending = Payment::pending(
            payment_id,
            booking.booking_id.clone(),
            booking.user_id.clone(),
            booking.total_amount,
            booking.payment_method.clone(),
        );

        let mut payment =
            deadline::within(self.timeout, "payments.create", self.payments.create(&pending)).await?;
        self.audit
            .log(
                job_id,
                JobEventType::PaymentCreated,
                format!("Payment {} created for {} via {}", payment.payment_id, payment.amount, payment.payment_method),
                Some(json!({
                    "payment_id": payment.payment_id,
                    "booking_id": payment.booking_id,
                    "amount": payment.amount,
                    "payment_method": payment.payment_method,
                })),
            )
            .await;

        let collected = self.collect(booking, &payment).await;
        let reference = match collected {
            Ok(reference) => reference,
            Err(Unsettled::Declined(e)) => return Err(self.close_failed(booking, payment, e).await),
            Err(Unsettled::Indeterminate(e)) => return Err(self.hold_for_reconciliation(booking, &payment, e).await),
        };

        payment.mark_success(reference, Utc::now());
        match deadline::within(self.timeout, "payments.update", self.payments.update(&payment)).await {
            Ok(payment) => {
                self.audit
                    .log(
                        job_id,
                        JobEventType::PaymentSucceeded,
                        format!("Payment {} succeeded", payment.payment_id),
                        Some(json!({
                            "payment_id": payment.payment_id,
                            "transaction_reference": payment.transaction_reference,
                        })),
                    )
                    .await;
                Ok(payment)
            }
            // Money has moved but the payment row still says pending.
            Err(e) => Err(self.hold_for_reconciliation(booking, &payment, e.into()).await),
        }
    }

    async fn collect(&self, booking: &Booking, payment: &Payment) -> Result<String, Unsettled> {
        deadline::within(
            self.timeout,
            "bookings.link_payment",
            self.bookings.link_payment(&booking.booking_id, &payment.payment_id),
        )
        .await
        .map_err(|e| Unsettled::Declined(e.into()))?;

        match payment.payment_method {
            PaymentMethod::Wallet => self.debit_wallet(booking).await,
            ref method => Ok(format!("{}-{}", method.as_str().to_uppercase(), Uuid::new_v4().simple())),
        }
    }

    /// Stores the payment as failed and cancels the booking, then hands back `cause`.
    /// Store errors here are logged; the job is already on its failure path.
    async fn close_failed(&self, booking: &Booking, mut payment: Payment, cause: ExecutionError) -> ExecutionError {
        let job_id = booking.job_id.as_str();
        let (code, message) = match &cause {
            ExecutionError::Payment { code, message } => (*code, message.clone()),
            other => (PaymentFailureCode::WalletStoreError, other.to_string()),
        };
        warn!(job_id, %code, "Payment failed: {}", message);

        payment.mark_failed(code, message.clone(), Utc::now());
        if let Err(e) = deadline::within(self.timeout, "payments.update", self.payments.update(&payment)).await {
            error!(job_id, payment_id = %payment.payment_id, error = %e, "Could not store failed payment");
        }
        if let Err(e) = deadline::within(
            self.timeout,
            "bookings.update_status",
            self.bookings.update_status(&booking.booking_id, BookingStatus::Cancelled),
        )
        .await
        {
            error!(job_id, booking_id = %booking.booking_id, error = %e, "Could not cancel booking after failed payment");
        }

        self.audit
            .log(
                job_id,
                JobEventType::PaymentFailed,
                format!("Payment {} failed: {}", payment.payment_id, message),
                Some(json!({
                    "payment_id": payment.payment_id,
                    "booking_id": booking.booking_id,
                    "failure_code": code,
                    "amount": payment.amount,
                })),
            )
            .await;
        cause
    }

    async fn hold_for_reconciliation(&self, booking: &Booking, payment: &Payment, cause: ExecutionError) -> ExecutionError {
        let job_id = booking.job_id.as_str();
        error!(
            job_id,
            payment_id = %payment.payment_id,
            booking_id = %booking.booking_id,
            error = %cause,
            "Payment outcome unknown; booking kept for reconciliation"
        );
        self.audit
            .log(
                job_id,
                JobEventType::PaymentReconciliationRequired,
                format!("Outcome of payment {} is unknown: {}", payment.payment_id, cause),
                Some(json!({
                    "payment_id": payment.payment_id,
                    "booking_id": booking.booking_id,
                    "user_id": booking.user_id,
                    "amount": payment.amount,
                    "payment_method": payment.payment_method,
                    "error": cause.to_string(),
                })),
            )
            .await;
        cause
    }

    /// Returns the ledger transaction id of the applied debit.
    async fn debit_wallet(&self, booking: &Booking) -> Result<String, Unsettled> {
        let job_id = booking.job_id.as_str();
        let amount = booking.total_amount;

        let wallet = deadline::within(self.timeout, "wallets.find_by_user", self.wallets.find_by_user(&booking.user_id))
            .await
            .map_err(|e| Unsettled::Declined(e.into()))?
            .ok_or_else(|| {
                declined(PaymentFailureCode::WalletNotFound, format!("Wallet not found for user {}", booking.user_id))
            })?;

        if wallet.status == WalletStatus::Suspended {
            return Err(declined(
                PaymentFailureCode::WalletUnavailable,
                format!("Wallet {} is suspended", wallet.wallet_id),
            ));
        }
        if wallet.balance < amount {
            return Err(insufficient(amount, wallet.balance));
        }

        // A failed or timed-out debit may still have been applied by the store.
        let outcome = deadline::within(
            self.timeout,
            "wallets.conditional_debit",
            self.wallets.conditional_debit(&wallet.wallet_id, amount),
        )
        .await
        .map_err(|e| Unsettled::Indeterminate(e.into()))?;

        let new_balance = match outcome {
            DebitOutcome::Debited { new_balance } => new_balance,
            DebitOutcome::InsufficientFunds { balance } => return Err(insufficient(amount, balance)),
            DebitOutcome::WalletUnavailable => {
                return Err(declined(
                    PaymentFailureCode::WalletUnavailable,
                    format!("Wallet {} is suspended", wallet.wallet_id),
                ));
            }
            DebitOutcome::WalletNotFound => {
                return Err(declined(
                    PaymentFailureCode::WalletNotFound,
                    format!("Wallet {} not found", wallet.wallet_id),
                ));
            }
        };

        let txn = WalletTransaction::booking_debit(
            &wallet,
            amount,
            &booking.booking_id,
            format!("Payment for booking {}", booking.pnr),
        );

        if let Err(e) = deadline::within(self.timeout, "wallet_transactions.append", self.ledger.append(&txn)).await {
            error!(job_id, wallet_id = %wallet.wallet_id, error = %e, "Ledger append failed, reversing debit");
            let restored = self.reverse_debit(&wallet.wallet_id, amount).await;
            self.audit
                .log(
                    job_id,
                    JobEventType::WalletDebitReversed,
                    format!("Debit of {} reversed on wallet {} after ledger write failure", amount, wallet.wallet_id),
                    Some(json!({
                        "wallet_id": wallet.wallet_id,
                        "amount": amount,
                        "balance_after_reversal": restored,
                        "ledger_error": e.to_string(),
                    })),
                )
                .await;
            let cause = payment_error(PaymentFailureCode::LedgerWriteFailed, format!("Ledger write failed: {}", e));
            return Err(match restored {
                Some(_) => Unsettled::Declined(cause),
                None => Unsettled::Indeterminate(cause),
            });
        }

        info!(job_id, wallet_id = %wallet.wallet_id, %amount, %new_balance, "Wallet debited");
        self.audit
            .log(
                job_id,
                JobEventType::WalletDebited,
                format!("Debited {} from wallet {}", amount, wallet.wallet_id),
                Some(json!({
                    "wallet_id": wallet.wallet_id,
                    "txn_id": txn.txn_id,
                    "amount": amount,
                    "balance_before": new_balance + amount,
                    "balance_after": new_balance,
                })),
            )
            .await;

        Ok(txn.txn_id)
    }

    async fn reverse_debit(&self, wallet_id: &str, amount: Decimal) -> Option<Decimal> {
        match deadline::within(self.timeout, "wallets.credit", self.wallets.credit(wallet_id, amount)).await {
            Ok(balance) => Some(balance),
            Err(e) => {
                error!(wallet_id, %amount, error = %e, "Debit reversal failed; wallet needs manual reconciliation");
                None
            }
        }
    }
}

/// Why a settlement produced no transaction reference.
enum Unsettled {
    /// No money moved.
    Declined(ExecutionError),
    /// The wallet may have been debited.
    Indeterminate(ExecutionError),
}

fn payment_error(code: PaymentFailureCode, message: String) -> ExecutionError {
    ExecutionError::Payment { code, message }
}

fn declined(code: PaymentFailureCode, message: String) -> Unsettled {
    Unsettled::Declined(payment_error(code, message))
}

fn insufficient(required: Decimal, available: Decimal) -> Unsettled {
    declined(
        PaymentFailureCode::InsufficientBalance,
        format!("Insufficient balance: required {}, available {}", required, available),
    )
}
