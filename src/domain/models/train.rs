use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Catalog entry. Read-only from the engine's point of view.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Train {
    pub train_id: String,
    pub train_name: String,
    pub source_station: String,
    /// Ordered station codes.
    pub route: Vec<String>,
    /// Weekday abbreviations, e.g. `Mon`, `Tue`.
    pub days_of_run: Vec<String>,
    pub classes_available: Vec<String>,
    pub seat_availability: HashMap<String, i32>,
    pub class_prices: HashMap<String, Decimal>,
    pub departure_time: Option<String>,
    pub arrival_time: Option<String>,
    pub duration: Option<String>,
}

impl Train {
    pub fn seats_in(&self, travel_class: &str) -> i32 {
        self.seat_availability.get(travel_class).copied().unwrap_or(0)
    }

    pub fn price_for(&self, travel_class: &str) -> Option<Decimal> {
        self.class_prices
            .get(travel_class)
            .copied()
            .filter(|fare| *fare > Decimal::ZERO)
    }

    pub fn runs_on(&self, day_abbr: &str) -> bool {
        self.days_of_run.iter().any(|d| d.eq_ignore_ascii_case(day_abbr))
    }

    /// Sort key used to order search results; trains without a departure time sort last.
    pub fn departure_key(&self) -> &str {
        self.departure_time.as_deref().unwrap_or("23:59")
    }
}
