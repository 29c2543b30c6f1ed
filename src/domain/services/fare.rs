use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::domain::models::booking::PriceDetails;
use crate::domain::models::job::PassengerInfo;

pub const SENIOR_DISCOUNT: Decimal = dec!(0.25);
pub const TAX_RATE: Decimal = dec!(0.05);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FareBreakdown {
    pub base_fare: Decimal,
    pub senior_fare: Decimal,
    pub adult_count: u32,
    pub senior_count: u32,
    pub adult_total: Decimal,
    pub senior_total: Decimal,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl FareBreakdown {
    pub fn price_details(&self) -> PriceDetails {
        PriceDetails {
            base_fare_per_adult: self.base_fare,
            base_fare_per_senior: self.senior_fare,
            adult_count: self.adult_count,
            senior_count: self.senior_count,
            adult_fare_total: self.adult_total,
            senior_fare_total: self.senior_total,
            subtotal: self.subtotal,
            tax: self.tax,
            total: self.total,
            discount_applied: (self.senior_count > 0).then(|| "25% senior citizen discount".to_string()),
        }
    }
}

/// Where the base class fare came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FareSource {
    Train,
    JobTrainDetails,
    Fallback,
}

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Static per-class fares used when neither the train nor the job carries one.
pub fn fallback_fare(travel_class: &str) -> Decimal {
    match travel_class {
        "1A" => dec!(1200),
        "2A" => dec!(800),
        "3A" => dec!(600),
        "SL" => dec!(400),
        "2S" => dec!(200),
        _ => dec!(500),
    }
}

/// First positive fare wins: train table, then the job's pinned train, then the static table.
pub fn resolve_base_fare(train_fare: Option<Decimal>, job_fare: Option<Decimal>, travel_class: &str) -> (Decimal, FareSource) {
    if let Some(fare) = train_fare.filter(|f| *f > Decimal::ZERO) {
        return (fare, FareSource::Train);
    }
    if let Some(fare) = job_fare.filter(|f| *f > Decimal::ZERO) {
        return (fare, FareSource::JobTrainDetails);
    }
    (fallback_fare(travel_class), FareSource::Fallback)
}

pub fn compute_fare(base_fare: Decimal, passengers: &[PassengerInfo]) -> FareBreakdown {
    let senior_count = passengers.iter().filter(|p| p.is_senior).count() as u32;
    let adult_count = passengers.len() as u32 - senior_count;

    let senior_fare = round_money(base_fare * (Decimal::ONE - SENIOR_DISCOUNT));
    let adult_total = base_fare * Decimal::from(adult_count);
    let senior_total = senior_fare * Decimal::from(senior_count);
    let subtotal = round_money(adult_total + senior_total);
    let tax = round_money(subtotal * TAX_RATE);

    FareBreakdown {
        base_fare,
        senior_fare,
        adult_count,
        senior_count,
        adult_total,
        senior_total,
        subtotal,
        tax,
        total: subtotal + tax,
    }
}
