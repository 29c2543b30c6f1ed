use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use serde_json::json;
use tracing::debug;

use crate::domain::models::job::Job;
use crate::domain::models::job_event::JobEventType;
use crate::domain::models::train::Train;
use crate::domain::ports::TrainCatalog;
use crate::domain::services::audit::AuditLogger;
use crate::domain::services::deadline;
use crate::error::{AppError, ExecutionError};

/// Extracts `NDLS` from `New Delhi (NDLS)`; plain codes pass through trimmed.
pub fn station_code(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(body) = trimmed.strip_suffix(')')
        && let Some(open) = body.rfind('(')
    {
        let code = body[open + 1..].trim();
        if !code.is_empty() {
            return code.to_string();
        }
    }
    trimmed.to_string()
}

/// Why a catalog train was not offered for a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    NoRoute,
    MissingOrigin(String),
    MissingDestination(String),
    RouteOrder { origin_index: usize, destination_index: usize },
    NoRunDays,
    NotRunning { day: String, runs_on: Vec<String> },
    ClassNotOffered { travel_class: String, available: Vec<String> },
    SoldOut { travel_class: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub train_id: String,
    pub train_name: String,
    pub reason: RejectionReason,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Train {} ({}) ", self.train_id, self.train_name)?;
        match &self.reason {
            RejectionReason::NoRoute => write!(f, "has no valid route information"),
            RejectionReason::MissingOrigin(code) => write!(f, "does not pass through origin station {}", code),
            RejectionReason::MissingDestination(code) => {
                write!(f, "does not pass through destination station {}", code)
            }
            RejectionReason::RouteOrder { origin_index, destination_index } => write!(
                f,
                "route order mismatch: origin at {}, destination at {}",
                origin_index, destination_index
            ),
            RejectionReason::NoRunDays => write!(f, "has no days of run"),
            RejectionReason::NotRunning { day, runs_on } => {
                write!(f, "does not run on {} (runs on: {})", day, runs_on.join(", "))
            }
            RejectionReason::ClassNotOffered { travel_class, available } => write!(
                f,
                "does not offer {} class. Available classes: {}",
                travel_class,
                available.join(", ")
            ),
            RejectionReason::SoldOut { travel_class } => {
                write!(f, "has no available seats in {} class", travel_class)
            }
        }
    }
}

fn check(train: &Train, origin: &str, destination: &str, day: &str, travel_class: &str) -> Option<RejectionReason> {
    if train.route.is_empty() {
        return Some(RejectionReason::NoRoute);
    }
    let Some(origin_index) = train.route.iter().position(|s| s == origin) else {
        return Some(RejectionReason::MissingOrigin(origin.to_string()));
    };
    let Some(destination_index) = train.route.iter().position(|s| s == destination) else {
        return Some(RejectionReason::MissingDestination(destination.to_string()));
    };
    if origin_index >= destination_index {
        return Some(RejectionReason::RouteOrder { origin_index, destination_index });
    }
    if train.days_of_run.is_empty() {
        return Some(RejectionReason::NoRunDays);
    }
    if !train.runs_on(day) {
        return Some(RejectionReason::NotRunning { day: day.to_string(), runs_on: train.days_of_run.clone() });
    }
    if !train.classes_available.iter().any(|c| c == travel_class) {
        return Some(RejectionReason::ClassNotOffered {
            travel_class: travel_class.to_string(),
            available: train.classes_available.clone(),
        });
    }
    if train.seats_in(travel_class) <= 0 {
        return Some(RejectionReason::SoldOut { travel_class: travel_class.to_string() });
    }
    None
}

/// Splits catalog candidates into bookable trains (earliest departure first) and rejections.
pub fn filter_trains(
    candidates: Vec<Train>,
    origin: &str,
    destination: &str,
    date: NaiveDate,
    travel_class: &str,
) -> (Vec<Train>, Vec<Rejection>) {
    let day = date.format("%a").to_string();
    let mut available = Vec::new();
    let mut rejections = Vec::new();

    for train in candidates {
        match check(&train, origin, destination, &day, travel_class) {
            Some(reason) => {
                debug!(train_id = %train.train_id, ?reason, "Train rejected");
                rejections.push(Rejection {
                    train_id: train.train_id.clone(),
                    train_name: train.train_name.clone(),
                    reason,
                });
            }
            None => available.push(train),
        }
    }

    available.sort_by(|a, b| a.departure_key().cmp(b.departure_key()));
    (available, rejections)
}

#[derive(Debug, Clone)]
pub struct DateSearch {
    pub date: NaiveDate,
    pub trains: Vec<Train>,
    /// Human-readable reasons, one per rejected train plus a summary line when nothing matched.
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TrainMatch {
    pub train: Train,
    pub journey_date: NaiveDate,
    pub alternate: bool,
}

pub struct TrainFinder {
    catalog: Arc<dyn TrainCatalog>,
    audit: Arc<AuditLogger>,
    timeout: Duration,
    alternate_window_days: u32,
}

impl TrainFinder {
    pub fn new(catalog: Arc<dyn TrainCatalog>, audit: Arc<AuditLogger>, timeout: Duration, alternate_window_days: u32) -> Self {
        Self { catalog, audit, timeout, alternate_window_days }
    }

    pub async fn get_train(&self, train_id: &str) -> Result<Option<Train>, AppError> {
        deadline::within(self.timeout, "trains.find_by_id", self.catalog.find_by_id(train_id)).await
    }

    /// Searches one date and records the outcome on the job's audit trail.
    pub async fn find_trains(
        &self,
        job_id: &str,
        origin: &str,
        destination: &str,
        date: NaiveDate,
        travel_class: &str,
    ) -> Result<DateSearch, AppError> {
        let origin_code = station_code(origin);
        let destination_code = station_code(destination);

        let candidates =
            deadline::within(self.timeout, "trains.find_by_station", self.catalog.find_by_station(&origin_code)).await?;
        let candidate_count = candidates.len();
        let (trains, rejections) = filter_trains(candidates, &origin_code, &destination_code, date, travel_class);

        let mut reasons: Vec<String> = rejections.iter().map(ToString::to_string).collect();
        if candidate_count == 0 {
            reasons.push(format!("No trains found passing through station {}", origin_code));
        } else if trains.is_empty() && reasons.is_empty() {
            reasons.push(format!(
                "No trains found from {} to {} on {} for {} class",
                origin_code, destination_code, date, travel_class
            ));
        }

        if trains.is_empty() {
            self.audit
                .log(
                    job_id,
                    JobEventType::TrainSearchDetails,
                    format!("No trains found for {}. Reasons:\n- {}", date, reasons.join("\n- ")),
                    Some(json!({
                        "origin": origin_code,
                        "destination": destination_code,
                        "date": date,
                        "day_of_week": date.format("%A").to_string(),
                        "travel_class": travel_class,
                        "trains_checked": candidate_count,
                        "reasons": reasons,
                    })),
                )
                .await;
        } else {
            self.audit
                .log(
                    job_id,
                    JobEventType::TrainSearchSuccess,
                    format!("Found {} train(s) with {} seats on {}", trains.len(), travel_class, date),
                    Some(json!({
                        "date": date,
                        "travel_class": travel_class,
                        "trains": trains
                            .iter()
                            .map(|t| json!({
                                "train_id": t.train_id,
                                "departure_time": t.departure_time,
                                "available_seats": t.seats_in(travel_class),
                            }))
                            .collect::<Vec<_>>(),
                    })),
                )
                .await;
        }

        Ok(DateSearch { date, trains, reasons })
    }

    /// Searches the journey date, then each following day up to the configured window
    /// when the job allows alternate dates. Stops at the first date with a bookable train.
    pub async fn search_with_fallback(&self, job: &Job) -> Result<TrainMatch, ExecutionError> {
        self.audit
            .log(
                &job.job_id,
                JobEventType::TrainSearch,
                "Searching for available trains",
                Some(json!({
                    "origin": job.origin_station_code,
                    "destination": job.destination_station_code,
                    "journey_date": job.journey_date,
                    "travel_class": job.travel_class,
                    "auto_book_alternate_date": job.auto_book_alternate_date,
                })),
            )
            .await;

        let first = self
            .find_trains(
                &job.job_id,
                &job.origin_station_code,
                &job.destination_station_code,
                job.journey_date,
                &job.travel_class,
            )
            .await?;
        if let Some(train) = first.trains.into_iter().next() {
            return Ok(TrainMatch { train, journey_date: job.journey_date, alternate: false });
        }

        let mut all_reasons = first.reasons;

        if job.auto_book_alternate_date {
            self.audit
                .log(
                    &job.job_id,
                    JobEventType::AlternateDateSearch,
                    format!(
                        "No trains on {}; checking the next {} days",
                        job.journey_date, self.alternate_window_days
                    ),
                    Some(json!({ "days_to_check": self.alternate_window_days })),
                )
                .await;

            for offset in 1..=self.alternate_window_days {
                let Some(date) = job.journey_date.checked_add_days(Days::new(offset as u64)) else {
                    break;
                };
                let search = self
                    .find_trains(
                        &job.job_id,
                        &job.origin_station_code,
                        &job.destination_station_code,
                        date,
                        &job.travel_class,
                    )
                    .await?;
                if let Some(train) = search.trains.into_iter().next() {
                    return Ok(TrainMatch { train, journey_date: date, alternate: true });
                }
                all_reasons.extend(search.reasons.into_iter().map(|r| format!("{}: {}", date, r)));
            }
        }

        let scope = if job.auto_book_alternate_date {
            format!("for the next {} days", self.alternate_window_days)
        } else {
            format!("for journey date {}", job.journey_date)
        };
        let mut reason = format!("No trains found with available seats in {} class {}", job.travel_class, scope);
        if !all_reasons.is_empty() {
            reason.push_str(".\nReasons:\n- ");
            reason.push_str(&all_reasons.join("\n- "));
        }

        let days_checked = if job.auto_book_alternate_date { self.alternate_window_days } else { 0 };
        self.audit
            .log(
                &job.job_id,
                JobEventType::TrainSearchFailed,
                reason.clone(),
                Some(json!({
                    "travel_class": job.travel_class,
                    "journey_date": job.journey_date,
                    "auto_book_alternate_date": job.auto_book_alternate_date,
                    "days_checked": days_checked,
                    "error_count": all_reasons.len(),
                })),
            )
            .await;

        Err(ExecutionError::NoInventory(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn train(id: &str, route: &[&str], days: &[&str], seats: i32, departure: Option<&str>) -> Train {
        Train {
            train_id: id.into(),
            train_name: format!("{} Express", id),
            source_station: route.first().map(|s| s.to_string()).unwrap_or_default(),
            route: route.iter().map(|s| s.to_string()).collect(),
            days_of_run: days.iter().map(|s| s.to_string()).collect(),
            classes_available: vec!["3A".into(), "SL".into()],
            seat_availability: HashMap::from([("3A".to_string(), seats)]),
            class_prices: HashMap::new(),
            departure_time: departure.map(String::from),
            arrival_time: None,
            duration: None,
        }
    }

    // 2026-05-11 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 11).unwrap()
    }

    #[test]
    fn station_code_strips_name() {
        assert_eq!(station_code("New Delhi (NDLS)"), "NDLS");
        assert_eq!(station_code("  HWH "), "HWH");
        assert_eq!(station_code("Howrah ()"), "Howrah ()");
    }

    #[test]
    fn filters_by_route_day_class_and_seats() {
        let candidates = vec![
            train("12301", &["NDLS", "CNB", "HWH"], &["Mon"], 10, Some("16:50")),
            train("12302", &["HWH", "CNB", "NDLS"], &["Mon"], 10, None),
            train("12303", &["NDLS", "HWH"], &["Tue"], 10, None),
            train("12304", &["NDLS", "HWH"], &["mon"], 0, None),
            train("12305", &["NDLS", "PNBE"], &["Mon"], 10, None),
            train("12306", &["NDLS", "HWH"], &["Mon"], 4, Some("06:15")),
        ];
        let (trains, rejections) = filter_trains(candidates, "NDLS", "HWH", monday(), "3A");

        let ids: Vec<_> = trains.iter().map(|t| t.train_id.as_str()).collect();
        assert_eq!(ids, vec!["12306", "12301"]);
        assert_eq!(rejections.len(), 4);
        assert!(matches!(rejections[0].reason, RejectionReason::RouteOrder { origin_index: 2, destination_index: 0 }));
        assert!(matches!(rejections[1].reason, RejectionReason::NotRunning { .. }));
        assert!(matches!(rejections[2].reason, RejectionReason::SoldOut { .. }));
        assert!(matches!(rejections[3].reason, RejectionReason::MissingDestination(_)));
    }

    #[test]
    fn class_not_offered_is_reported() {
        let (trains, rejections) =
            filter_trains(vec![train("12951", &["NDLS", "HWH"], &["Mon"], 5, None)], "NDLS", "HWH", monday(), "1A");
        assert!(trains.is_empty());
        assert_eq!(
            rejections[0].to_string(),
            "Train 12951 (12951 Express) does not offer 1A class. Available classes: 3A, SL"
        );
    }

    #[test]
    fn trains_without_departure_sort_last() {
        let candidates = vec![
            train("A", &["NDLS", "HWH"], &["Mon"], 1, None),
            train("B", &["NDLS", "HWH"], &["Mon"], 1, Some("23:00")),
        ];
        let (trains, _) = filter_trains(candidates, "NDLS", "HWH", monday(), "3A");
        assert_eq!(trains[0].train_id, "B");
    }
}
