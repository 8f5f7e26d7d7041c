use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::driver::OperationalStatus;
use crate::entities::pricing_rule::{self, VehicleClass};
use crate::error::AppResult;
use crate::services::pricing::{self, FareQuote, TripMetrics};
use crate::services::{availability, bookings, drivers, ratings};
use crate::AppState;

/// Current pricing catalog
pub async fn list_pricing(State(state): State<AppState>) -> AppResult<Json<Vec<pricing_rule::Model>>> {
    Ok(Json(pricing::list_rules(&state.db).await?))
}

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub vehicle_class: VehicleClass,
    pub pickup_at: DateTime<Utc>,
    pub dropoff_at: DateTime<Utc>,
    pub distance_km: Option<Decimal>,
}

/// Price a prospective trip without booking it
pub async fn quote_fare(
    State(state): State<AppState>,
    Query(query): Query<QuoteQuery>,
) -> AppResult<Json<FareQuote>> {
    bookings::validate_window(query.pickup_at, query.dropoff_at)?;
    let distance_km = pricing::normalize_distance(query.distance_km)?;

    let trip = TripMetrics::from_schedule(query.pickup_at, query.dropoff_at, distance_km);
    let quote = pricing::quote(&state.db, query.vehicle_class, &trip, &state.config.peak).await?;
    Ok(Json(quote))
}

#[derive(Debug, Serialize)]
pub struct AvailableDriver {
    pub id: Uuid,
    pub car_model: String,
    pub vehicle_class: VehicleClass,
    pub capacity: i32,
    pub average_rating: Decimal,
    pub rating_count: u64,
}

/// Drivers currently accepting bookings
pub async fn list_available_drivers(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<AvailableDriver>>> {
    let available = drivers::list(&state.db, Some(OperationalStatus::Available)).await?;

    let mut responses = Vec::with_capacity(available.len());
    for d in available {
        let rating = ratings::summary_for_driver(&state.db, d.id).await?;
        responses.push(AvailableDriver {
            id: d.id,
            car_model: d.car_model,
            vehicle_class: d.vehicle_class,
            capacity: d.capacity,
            average_rating: rating.average,
            rating_count: rating.count,
        });
    }

    Ok(Json(responses))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub pickup_at: DateTime<Utc>,
    pub dropoff_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub driver_id: Uuid,
    pub available: bool,
}

/// Whether a driver is free for a window right now. Booking re-checks atomically.
pub async fn driver_availability(
    State(state): State<AppState>,
    Path(driver_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<AvailabilityResponse>> {
    bookings::validate_window(query.pickup_at, query.dropoff_at)?;

    let driver = drivers::get(&state.db, driver_id).await?;
    let free = availability::is_available(&state.db, driver.id, query.pickup_at, query.dropoff_at, None).await?;

    Ok(Json(AvailabilityResponse {
        driver_id,
        available: free && driver.operational_status == OperationalStatus::Available,
    }))
}
