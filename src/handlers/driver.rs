use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::booking;
use crate::entities::driver::{self, OperationalStatus};
use crate::error::{AppError, AppResult};
use crate::services::bookings::{self, BookingView};
use crate::services::drivers;
use crate::services::lifecycle::Transition;
use crate::services::statistics::{self, DriverStatistics};
use crate::utils::jwt::Claims;
use crate::AppState;

/// Vehicles operated by the logged-in driver
pub async fn my_vehicles(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<driver::Model>>> {
    Ok(Json(drivers::owned_by(&state.db, claims.sub).await?))
}

/// Bookings across all of the driver's vehicles, newest pickup first
pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<BookingView>>> {
    let vehicles = drivers::owned_by(&state.db, claims.sub).await?;

    let mut all = Vec::new();
    for v in &vehicles {
        all.extend(bookings::list_by_driver(&state.db, v.id).await?);
    }
    all.sort_by(|a, b| b.pickup_at.cmp(&a.pickup_at));

    Ok(Json(bookings::with_names(&state.db, all).await?))
}

async fn assigned_booking(state: &AppState, claims: &Claims, booking_id: Uuid) -> AppResult<booking::Model> {
    let booking = bookings::get(&state.db, booking_id).await?;
    let vehicle = drivers::get(&state.db, booking.driver_id).await?;

    if vehicle.owner_user_id != claims.sub {
        return Err(AppError::Forbidden(
            "You are not assigned to this booking".to_string(),
        ));
    }
    Ok(booking)
}

async fn apply(
    state: &AppState,
    claims: &Claims,
    booking_id: Uuid,
    transition: Transition,
) -> AppResult<Json<booking::Model>> {
    assigned_booking(state, claims, booking_id).await?;
    Ok(Json(bookings::transition(&state.db, booking_id, transition).await?))
}

pub async fn confirm_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<booking::Model>> {
    apply(&state, &claims, booking_id, Transition::Confirm).await
}

pub async fn complete_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<booking::Model>> {
    apply(&state, &claims, booking_id, Transition::Complete).await
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<booking::Model>> {
    apply(&state, &claims, booking_id, Transition::Cancel).await
}

#[derive(Debug, Deserialize)]
pub struct OperationalStatusRequest {
    pub status: OperationalStatus,
}

/// Take a vehicle on or off duty
pub async fn set_vehicle_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(driver_id): Path<Uuid>,
    Json(payload): Json<OperationalStatusRequest>,
) -> AppResult<Json<driver::Model>> {
    drivers::get_owned(&state.db, driver_id, claims.sub).await?;
    Ok(Json(
        drivers::set_operational_status(&state.db, driver_id, payload.status).await?,
    ))
}

pub async fn my_statistics(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<DriverStatistics>>> {
    let vehicles = drivers::owned_by(&state.db, claims.sub).await?;

    let mut stats = Vec::with_capacity(vehicles.len());
    for v in &vehicles {
        stats.push(statistics::driver_statistics(&state.db, v.id).await?);
    }
    Ok(Json(stats))
}
