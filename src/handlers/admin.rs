use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus, PaymentStatus};
use crate::entities::driver::{self, OperationalStatus};
use crate::entities::pricing_rule::{self, VehicleClass};
use crate::entities::rating;
use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::services::bookings::{self, BookingFilter, BookingView};
use crate::services::drivers::{self, NewDriver, UpdateDriver};
use crate::services::lifecycle::Transition;
use crate::services::pricing::{self, PricingRuleInput};
use crate::services::statistics::{self, BookingStatistics, DailyPoint, DriverStatistics, RiderStatistics};
use crate::services::users::{self, NewUser, UserProfile};
use crate::services::ratings;
use crate::AppState;

// ============ Booking Management ============

/// List bookings matching the filters (admin)
pub async fn list_bookings(
    State(state): State<AppState>,
    Query(filter): Query<BookingFilter>,
) -> AppResult<Json<Vec<BookingView>>> {
    Ok(Json(bookings::list(&state.db, &filter).await?))
}

#[derive(Debug, Serialize)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: BookingView,
    pub rating: Option<rating::Model>,
}

pub async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<BookingDetail>> {
    let booking = bookings::get(&state.db, booking_id).await?;
    let view = bookings::with_names(&state.db, vec![booking])
        .await?
        .pop()
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
    let rating = ratings::for_booking(&state.db, booking_id).await?;

    Ok(Json(BookingDetail { booking: view, rating }))
}

/// Permanently delete a booking together with its rating (admin)
pub async fn delete_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    bookings::delete(&state.db, booking_id).await?;
    Ok(Json(serde_json::json!({ "message": "Booking deleted" })))
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub transition: Transition,
}

/// Drive a booking through the normal lifecycle (admin)
pub async fn transition_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<TransitionRequest>,
) -> AppResult<Json<booking::Model>> {
    Ok(Json(
        bookings::transition(&state.db, booking_id, payload.transition).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub pickup_at: DateTime<Utc>,
    pub dropoff_at: DateTime<Utc>,
}

/// Move an active booking to a new window; the fare is recomputed
pub async fn reschedule_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<RescheduleRequest>,
) -> AppResult<Json<booking::Model>> {
    Ok(Json(
        bookings::reschedule(
            &state.db,
            &state.config.peak,
            booking_id,
            payload.pickup_at,
            payload.dropoff_at,
        )
        .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct OverrideStatusRequest {
    pub status: BookingStatus,
}

/// Force a booking into any status, bypassing the lifecycle (admin)
pub async fn override_booking_status(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<OverrideStatusRequest>,
) -> AppResult<Json<booking::Model>> {
    Ok(Json(
        bookings::override_status(&state.db, booking_id, payload.status).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct PaymentStatusRequest {
    pub payment_status: PaymentStatus,
}

pub async fn set_payment_status(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<PaymentStatusRequest>,
) -> AppResult<Json<booking::Model>> {
    Ok(Json(
        bookings::set_payment_status(&state.db, booking_id, payload.payment_status).await?,
    ))
}

// ============ Statistics ============

pub async fn booking_statistics(
    State(state): State<AppState>,
    Query(filter): Query<BookingFilter>,
) -> AppResult<Json<BookingStatistics>> {
    Ok(Json(statistics::booking_statistics(&state.db, &filter).await?))
}

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

pub async fn daily_statistics(
    State(state): State<AppState>,
    Query(range): Query<DateRangeQuery>,
) -> AppResult<Json<Vec<DailyPoint>>> {
    Ok(Json(statistics::daily_series(&state.db, range.from, range.to).await?))
}

pub async fn driver_leaderboard(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<DriverStatistics>>> {
    Ok(Json(statistics::driver_leaderboard(&state.db).await?))
}

pub async fn driver_statistics(
    State(state): State<AppState>,
    Path(driver_id): Path<Uuid>,
) -> AppResult<Json<DriverStatistics>> {
    Ok(Json(statistics::driver_statistics(&state.db, driver_id).await?))
}

pub async fn rider_statistics(
    State(state): State<AppState>,
    Path(rider_id): Path<Uuid>,
) -> AppResult<Json<RiderStatistics>> {
    let rider = users::get(&state.db, rider_id).await?;
    if rider.role != UserRole::Rider {
        return Err(AppError::Validation("User is not a rider".to_string()));
    }
    Ok(Json(statistics::rider_statistics(&state.db, rider_id).await?))
}

// ============ Pricing ============

pub async fn list_pricing(State(state): State<AppState>) -> AppResult<Json<Vec<pricing_rule::Model>>> {
    Ok(Json(pricing::list_rules(&state.db).await?))
}

/// Create or replace the rule for a vehicle class. Existing bookings keep their fare.
pub async fn upsert_pricing(
    State(state): State<AppState>,
    Path(vehicle_class): Path<VehicleClass>,
    Json(payload): Json<PricingRuleInput>,
) -> AppResult<Json<pricing_rule::Model>> {
    Ok(Json(
        pricing::upsert_rule(&state.db, vehicle_class, payload).await?,
    ))
}

// ============ Driver Management ============

#[derive(Debug, Deserialize)]
pub struct DriverListQuery {
    pub status: Option<OperationalStatus>,
}

pub async fn list_drivers(
    State(state): State<AppState>,
    Query(query): Query<DriverListQuery>,
) -> AppResult<Json<Vec<driver::Model>>> {
    Ok(Json(drivers::list(&state.db, query.status).await?))
}

pub async fn create_driver(
    State(state): State<AppState>,
    Json(payload): Json<NewDriver>,
) -> AppResult<(StatusCode, Json<driver::Model>)> {
    let driver = drivers::create(&state.db, payload).await?;
    Ok((StatusCode::CREATED, Json(driver)))
}

pub async fn get_driver(
    State(state): State<AppState>,
    Path(driver_id): Path<Uuid>,
) -> AppResult<Json<driver::Model>> {
    Ok(Json(drivers::get(&state.db, driver_id).await?))
}

pub async fn update_driver(
    State(state): State<AppState>,
    Path(driver_id): Path<Uuid>,
    Json(payload): Json<UpdateDriver>,
) -> AppResult<Json<driver::Model>> {
    Ok(Json(drivers::update(&state.db, driver_id, payload).await?))
}

#[derive(Debug, Deserialize)]
pub struct OperationalStatusRequest {
    pub status: OperationalStatus,
}

pub async fn set_driver_status(
    State(state): State<AppState>,
    Path(driver_id): Path<Uuid>,
    Json(payload): Json<OperationalStatusRequest>,
) -> AppResult<Json<driver::Model>> {
    Ok(Json(
        drivers::set_operational_status(&state.db, driver_id, payload.status).await?,
    ))
}

pub async fn delete_driver(
    State(state): State<AppState>,
    Path(driver_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    drivers::delete(&state.db, driver_id).await?;
    Ok(Json(serde_json::json!({ "message": "Driver deleted" })))
}

// ============ User Management ============

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> AppResult<Json<Vec<user::Model>>> {
    Ok(Json(users::list(&state.db, query.role).await?))
}

/// Register an account issued by the identity provider (admin)
pub async fn provision_user(
    State(state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> AppResult<(StatusCode, Json<user::Model>)> {
    let user = users::provision(&state.db, payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn user_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserProfile>> {
    Ok(Json(users::profile(&state.db, user_id).await?))
}
