use std::collections::HashMap;

use crate::domain::{models::train::Train, ports::TrainCatalog};
use crate::error::AppError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};

pub struct SqliteTrainRepo {
    pool: SqlitePool,
}

impl SqliteTrainRepo {
    pub fn new(pool: SqlitePool) -> Self { Self { pool } }
}

#[derive(FromRow)]
struct TrainRow {
    train_id: String,
    train_name: String,
    source_station: String,
    route: Json<Vec<String>>,
    days_of_run: Json<Vec<String>>,
    classes_available: Json<Vec<String>>,
    seat_availability: Json<HashMap<String, i32>>,
    class_prices: Json<HashMap<String, Decimal>>,
    departure_time: Option<String>,
    arrival_time: Option<String>,
    duration: Option<String>,
}

impl From<TrainRow> for Train {
    fn from(row: TrainRow) -> Self {
        Train {
            train_id: row.train_id,
            train_name: row.train_name,
            source_station: row.source_station,
            route: row.route.0,
            days_of_run: row.days_of_run.0,
            classes_available: row.classes_available.0,
            seat_availability: row.seat_availability.0,
            class_prices: row.class_prices.0,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            duration: row.duration,
        }
    }
}

#[async_trait]
impl TrainCatalog for SqliteTrainRepo {
    async fn upsert(&self, train: &Train) -> Result<Train, AppError> {
        let row = sqlx::query_as::<_, TrainRow>(
            "INSERT INTO trains (train_id, train_name, source_station, route, days_of_run, classes_available, seat_availability, class_prices, departure_time, arrival_time, duration)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(train_id) DO UPDATE SET
                train_name = excluded.train_name, source_station = excluded.source_station, route = excluded.route,
                days_of_run = excluded.days_of_run, classes_available = excluded.classes_available,
                seat_availability = excluded.seat_availability, class_prices = excluded.class_prices,
                departure_time = excluded.departure_time, arrival_time = excluded.arrival_time, duration = excluded.duration
             RETURNING *"
        )
            .bind(&train.train_id).bind(&train.train_name).bind(&train.source_station)
            .bind(Json(&train.route)).bind(Json(&train.days_of_run)).bind(Json(&train.classes_available))
            .bind(Json(&train.seat_availability)).bind(Json(&train.class_prices))
            .bind(&train.departure_time).bind(&train.arrival_time).bind(&train.duration)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(row.into())
    }

    async fn find_by_id(&self, train_id: &str) -> Result<Option<Train>, AppError> {
        let row = sqlx::query_as::<_, TrainRow>("SELECT * FROM trains WHERE train_id = ?")
            .bind(train_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(row.map(Train::from))
    }

    async fn find_by_station(&self, station_code: &str) -> Result<Vec<Train>, AppError> {
        let rows = sqlx::query_as::<_, TrainRow>(
            "SELECT * FROM trains
             WHERE EXISTS (SELECT 1 FROM json_each(trains.route) WHERE json_each.value = ?)
             ORDER BY train_id ASC"
        )
            .bind(station_code)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(rows.into_iter().map(Train::from).collect())
    }
}
