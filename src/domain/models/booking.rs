use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::models::job::PassengerInfo;
use crate::domain::models::payment::PaymentMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BookedPassenger {
    #[serde(flatten)]
    pub passenger: PassengerInfo,
    pub seat: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PriceDetails {
    pub base_fare_per_adult: Decimal,
    pub base_fare_per_senior: Decimal,
    pub adult_count: u32,
    pub senior_count: u32,
    pub adult_fare_total: Decimal,
    pub senior_fare_total: Decimal,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub discount_applied: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Booking {
    pub booking_id: String,
    pub pnr: String,
    pub job_id: String,
    pub user_id: String,
    pub train_id: String,
    pub train_name: String,
    pub journey_date: NaiveDate,
    pub origin_station_code: String,
    pub destination_station_code: String,
    pub travel_class: String,
    pub passengers: Vec<BookedPassenger>,
    /// Fare before tax.
    pub fare: Decimal,
    pub tax: Decimal,
    pub total_amount: Decimal,
    pub price_details: PriceDetails,
    pub booking_status: BookingStatus,
    pub payment_method: PaymentMethod,
    pub payment_id: Option<String>,
    pub booking_email: String,
    pub booking_phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
