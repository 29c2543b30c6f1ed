use crate::domain::{
    models::booking::{BookedPassenger, Booking, BookingStatus, PriceDetails},
    models::payment::PaymentMethod,
    ports::BookingRepository,
};
use crate::error::AppError;
use crate::infra::repositories::parse_decimal;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};

pub struct SqliteBookingRepo {
    pool: SqlitePool,
}

impl SqliteBookingRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct BookingRow {
    booking_id: String,
    pnr: String,
    job_id: String,
    user_id: String,
    train_id: String,
    train_name: String,
    journey_date: NaiveDate,
    origin_station_code: String,
    destination_station_code: String,
    travel_class: String,
    passengers: Json<Vec<BookedPassenger>>,
    fare: String,
    tax: String,
    total_amount: String,
    price_details: Json<PriceDetails>,
    booking_status: BookingStatus,
    payment_method: PaymentMethod,
    payment_id: Option<String>,
    booking_email: String,
    booking_phone: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = AppError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            fare: parse_decimal("bookings.fare", &row.fare)?,
            tax: parse_decimal("bookings.tax", &row.tax)?,
            total_amount: parse_decimal("bookings.total_amount", &row.total_amount)?,
            booking_id: row.booking_id,
            pnr: row.pnr,
            job_id: row.job_id,
            user_id: row.user_id,
            train_id: row.train_id,
            train_name: row.train_name,
            journey_date: row.journey_date,
            origin_station_code: row.origin_station_code,
            destination_station_code: row.destination_station_code,
            travel_class: row.travel_class,
            passengers: row.passengers.0,
            price_details: row.price_details.0,
            booking_status: row.booking_status,
            payment_method: row.payment_method,
            payment_id: row.payment_id,
            booking_email: row.booking_email,
            booking_phone: row.booking_phone,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepo {
    async fn create(&self, booking: &Booking) -> Result<Booking, AppError> {
        let row = sqlx::query_as::<_, BookingRow>(
            "INSERT INTO bookings (booking_id, pnr, job_id, user_id, train_id, train_name, journey_date, origin_station_code, destination_station_code,
                travel_class, passengers, fare, tax, total_amount, price_details, booking_status, payment_method, payment_id, booking_email,
                booking_phone, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *"
        )
            .bind(&booking.booking_id).bind(&booking.pnr).bind(&booking.job_id).bind(&booking.user_id)
            .bind(&booking.train_id).bind(&booking.train_name).bind(booking.journey_date)
            .bind(&booking.origin_station_code).bind(&booking.destination_station_code).bind(&booking.travel_class)
            .bind(Json(&booking.passengers)).bind(booking.fare.to_string()).bind(booking.tax.to_string())
            .bind(booking.total_amount.to_string()).bind(Json(&booking.price_details))
            .bind(booking.booking_status).bind(&booking.payment_method).bind(&booking.payment_id)
            .bind(&booking.booking_email).bind(&booking.booking_phone).bind(booking.created_at).bind(booking.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;
        row.try_into()
    }

    async fn find_by_id(&self, booking_id: &str) -> Result<Option<Booking>, AppError> {
        sqlx::query_as::<_, BookingRow>("SELECT * FROM bookings WHERE booking_id = ?")
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?
            .map(Booking::try_from)
            .transpose()
    }

    async fn find_by_job(&self, job_id: &str) -> Result<Vec<Booking>, AppError> {
        sqlx::query_as::<_, BookingRow>("SELECT * FROM bookings WHERE job_id = ? ORDER BY created_at ASC")
            .bind(job_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?
            .into_iter()
            .map(Booking::try_from)
            .collect()
    }

    async fn update_status(&self, booking_id: &str, status: BookingStatus) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE bookings SET booking_status = ?, updated_at = ? WHERE booking_id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(booking_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Booking {} not found", booking_id)));
        }
        Ok(())
    }

    async fn link_payment(&self, booking_id: &str, payment_id: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE bookings SET payment_id = ?, updated_at = ? WHERE booking_id = ?")
            .bind(payment_id)
            .bind(Utc::now())
            .bind(booking_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Booking {} not found", booking_id)));
        }
        Ok(())
    }
}
