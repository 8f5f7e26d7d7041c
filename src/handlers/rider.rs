use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::{booking, rating};
use crate::error::{AppError, AppResult};
use crate::services::bookings::{self, BookingView, NewBooking};
use crate::services::ratings::{self, NewRating};
use crate::services::statistics::{self, RiderStatistics};
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub driver_id: Uuid,
    pub passenger_count: i32,
    pub pickup_at: DateTime<Utc>,
    pub dropoff_at: DateTime<Utc>,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub distance_km: Option<Decimal>,
    pub notes: Option<String>,
}

/// Book a driver for a time window
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateBookingRequest>,
) -> AppResult<(StatusCode, Json<booking::Model>)> {
    let booking = bookings::create(
        &state.db,
        &state.config.peak,
        NewBooking {
            rider_id: claims.sub,
            driver_id: payload.driver_id,
            passenger_count: payload.passenger_count,
            pickup_at: payload.pickup_at,
            dropoff_at: payload.dropoff_at,
            pickup_location: payload.pickup_location,
            dropoff_location: payload.dropoff_location,
            distance_km: payload.distance_km,
            notes: payload.notes,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

/// List the logged-in rider's bookings
pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<BookingView>>> {
    let mine = bookings::list_by_rider(&state.db, claims.sub).await?;
    Ok(Json(bookings::with_names(&state.db, mine).await?))
}

async fn own_booking(state: &AppState, claims: &Claims, booking_id: Uuid) -> AppResult<booking::Model> {
    let booking = bookings::get(&state.db, booking_id).await?;
    if booking.rider_id != claims.sub {
        return Err(AppError::Forbidden(
            "You can only access your own bookings".to_string(),
        ));
    }
    Ok(booking)
}

pub async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<BookingView>> {
    let booking = own_booking(&state, &claims, booking_id).await?;
    let view = bookings::with_names(&state.db, vec![booking])
        .await?
        .pop()
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
    Ok(Json(view))
}

/// Cancel one of the rider's bookings. Cancelling twice is a no-op.
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<booking::Model>> {
    own_booking(&state, &claims, booking_id).await?;
    Ok(Json(bookings::cancel(&state.db, booking_id).await?))
}

/// Rate the driver of a completed trip
pub async fn rate_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<NewRating>,
) -> AppResult<(StatusCode, Json<rating::Model>)> {
    let rating = ratings::submit(&state.db, claims.sub, booking_id, payload).await?;
    Ok((StatusCode::CREATED, Json(rating)))
}

pub async fn get_rating(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<rating::Model>> {
    own_booking(&state, &claims, booking_id).await?;
    ratings::for_booking(&state.db, booking_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Booking has not been rated".to_string()))
}

pub async fn my_statistics(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<RiderStatistics>> {
    Ok(Json(statistics::rider_statistics(&state.db, claims.sub).await?))
}
