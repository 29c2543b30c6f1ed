use crate::domain::{
    models::payment::{GatewayResponse, Payment, PaymentFailureCode, PaymentMethod, PaymentStatus},
    ports::PaymentRepository,
};
use crate::error::AppError;
use crate::infra::repositories::parse_decimal;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};

pub struct SqlitePaymentRepo {
    pool: SqlitePool,
}

impl SqlitePaymentRepo {
    pub fn new(pool: SqlitePool) -> Self { Self { pool } }
}

#[derive(FromRow)]
struct PaymentRow {
    payment_id: String,
    booking_id: String,
    user_id: String,
    amount: String,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    transaction_reference: Option<String>,
    gateway_response: Option<Json<GatewayResponse>>,
    failure_code: Option<PaymentFailureCode>,
    error_message: Option<String>,
    initiated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            amount: parse_decimal("payments.amount", &row.amount)?,
            payment_method: row.payment_method,
            payment_status: row.payment_status,
            failure_code: row.failure_code,
            payment_id: row.payment_id,
            booking_id: row.booking_id,
            user_id: row.user_id,
            transaction_reference: row.transaction_reference,
            gateway_response: row.gateway_response.map(|g| g.0),
            error_message: row.error_message,
            initiated_at: row.initiated_at,
            completed_at: row.completed_at,
        })
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepo {
    async fn create(&self, payment: &Payment) -> Result<Payment, AppError> {
        let row = sqlx::query_as::<_, PaymentRow>(
            "INSERT INTO payments (payment_id, booking_id, user_id, amount, payment_method, payment_status, transaction_reference,
                gateway_response, failure_code, error_message, initiated_at, completed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *"
        )
            .bind(&payment.payment_id).bind(&payment.booking_id).bind(&payment.user_id)
            .bind(payment.amount.to_string()).bind(&payment.payment_method).bind(payment.payment_status)
            .bind(&payment.transaction_reference).bind(payment.gateway_response.as_ref().map(Json))
            .bind(payment.failure_code).bind(&payment.error_message)
            .bind(payment.initiated_at).bind(payment.completed_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;
        row.try_into()
    }

    async fn find_by_id(&self, payment_id: &str) -> Result<Option<Payment>, AppError> {
        sqlx::query_as::<_, PaymentRow>("SELECT * FROM payments WHERE payment_id = ?")
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?
            .map(Payment::try_from)
            .transpose()
    }

    async fn update(&self, payment: &Payment) -> Result<Payment, AppError> {
        let row = sqlx::query_as::<_, PaymentRow>(
            "UPDATE payments SET payment_status = ?, transaction_reference = ?, gateway_response = ?, failure_code = ?,
                error_message = ?, completed_at = ?
             WHERE payment_id = ?
             RETURNING *"
        )
            .bind(payment.payment_status).bind(&payment.transaction_reference)
            .bind(payment.gateway_response.as_ref().map(Json)).bind(payment.failure_code)
            .bind(&payment.error_message).bind(payment.completed_at)
            .bind(&payment.payment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?
            .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", payment.payment_id)))?;
        row.try_into()
    }
}
